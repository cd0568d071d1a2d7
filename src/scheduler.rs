//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了延迟I/O调度器，组合按频率排序的值缓存、待写缓冲区、
//! 串行操作队列和分块处理。
//!
//! 调度器由应用显式创建并持有（通常在启动时创建一次，通过 `Arc` 注入到
//! 需要它的组件），在关闭时调用 [`DeferredScheduler::cleanup`]。

use crate::backend::FrequencyCache;
use crate::config::SchedulerConfig;
use crate::error::{CacheError, Result};
use crate::metrics::Metrics;
use crate::sync::batch_writer::{BatchWriter, SimulatedSink, WriteSink};
use crate::sync::common::{BatchOp, FlushHandle};
use crate::sync::queue::OperationQueue;
use crate::sync::stream;
use crate::utils::{lock, spawn_periodic};
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

const COMPONENT: &str = "scheduler";

/// 调度器统计信息
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SchedulerStats {
    /// 值缓存条目数
    pub cached_entries: usize,
    /// 值缓存估算总字节数
    pub cached_bytes: u64,
    /// 待写缓冲区中的键数
    pub pending_writes: usize,
    /// 排队中尚未开始的操作数
    pub queued_operations: usize,
    /// 是否存在活动的排空任务
    pub draining: bool,
}

/// 延迟I/O调度器
pub struct DeferredScheduler<V> {
    config: SchedulerConfig,
    cache: Arc<FrequencyCache<String, V>>,
    writer: BatchWriter<V>,
    queue: OperationQueue,
    metrics: Arc<Metrics>,
    closed: AtomicBool,
    shutdown: CancellationToken,
    maintenance: Mutex<Option<JoinHandle<()>>>,
}

impl<V> DeferredScheduler<V>
where
    V: Clone + Serialize + Send + 'static,
{
    /// 创建使用模拟提交的调度器
    pub fn new(config: SchedulerConfig) -> Self {
        let sink = Arc::new(SimulatedSink::new(config.commit_delay()));
        Self::with_sink(config, sink)
    }

    /// 创建使用指定提交目标的调度器
    pub fn with_sink(config: SchedulerConfig, sink: Arc<dyn WriteSink<V>>) -> Self {
        Self::with_sink_and_metrics(config, sink, Metrics::shared())
    }

    /// 创建使用指定提交目标和共享指标的调度器
    ///
    /// `maintenance_interval_secs > 0` 且当前处于tokio运行时中时，
    /// 启动后台维护任务定期清理过期条目并检查内存预算
    pub fn with_sink_and_metrics(
        config: SchedulerConfig,
        sink: Arc<dyn WriteSink<V>>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let cache = Arc::new(FrequencyCache::new(&config, metrics.clone()));
        let writer = BatchWriter::new(config.batch_size, sink, metrics.clone());
        let shutdown = CancellationToken::new();

        let maintenance = if config.maintenance_interval_secs > 0 {
            let weak = Arc::downgrade(&cache);
            spawn_periodic(
                "DeferredScheduler maintenance",
                config.maintenance_interval(),
                shutdown.clone(),
                move || {
                    let Some(cache) = weak.upgrade() else {
                        return false;
                    };
                    let expired = cache.purge_expired();
                    let evicted = cache.enforce_memory_limit();
                    if expired + evicted > 0 {
                        debug!(
                            "DeferredScheduler maintenance: expired={}, evicted={}",
                            expired, evicted
                        );
                    }
                    true
                },
            )
        } else {
            None
        };

        info!(
            "DeferredScheduler created: max_memory_cache_bytes={}, batch_size={}",
            config.max_memory_cache_bytes, config.batch_size
        );

        Self {
            config,
            cache,
            writer,
            queue: OperationQueue::new(),
            metrics,
            closed: AtomicBool::new(false),
            shutdown,
            maintenance: Mutex::new(maintenance),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::Destroyed("DeferredScheduler"));
        }
        Ok(())
    }

    /// 缓存值
    ///
    /// # 参数
    ///
    /// * `key` - 缓存键
    /// * `value` - 缓存值
    /// * `force` - 为 `true` 时忽略大小上限
    ///
    /// # 返回值
    ///
    /// 值被缓存时返回 `true`，因过大被跳过时返回 `false`
    pub fn cache_data(&self, key: impl Into<String>, value: V, force: bool) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.cache.insert(key.into(), value, force))
    }

    /// 读取缓存值
    ///
    /// 命中时增加访问计数，不刷新过期时间
    pub fn get_cached_data(&self, key: &str) -> Result<Option<V>> {
        self.ensure_open()?;
        Ok(self.cache.get(key))
    }

    /// 总估算大小超过预算时驱逐最少使用的条目
    pub fn enforce_memory_limit(&self) -> Result<usize> {
        self.ensure_open()?;
        Ok(self.cache.enforce_memory_limit())
    }

    /// 驱逐访问次数最少的25%条目
    pub fn evict_least_used(&self) -> Result<usize> {
        self.ensure_open()?;
        Ok(self.cache.evict_least_used())
    }

    /// 延迟写入
    ///
    /// 同一个键在刷新前多次写入只保留最后一次的值。
    /// 缓冲区达到 `batch_size` 时自动刷新，并返回该次刷新的完成信号。
    /// 返回成功的写入一定会被某次提交包含，包括 [`cleanup`](Self::cleanup) 的最后一次提交。
    pub fn deferred_write(&self, key: impl Into<String>, value: V) -> Result<Option<FlushHandle>> {
        self.ensure_open()?;
        let key = key.into();
        debug!("deferred_write: key={}", key);
        let full = self
            .writer
            .write(key, value)
            .map_err(|_| CacheError::Destroyed("DeferredScheduler"))?;
        if full {
            debug!(
                "deferred_write: 缓冲区达到 {}，自动刷新",
                self.writer.batch_size()
            );
            return self.flush_inner().map(Some);
        }
        Ok(None)
    }

    /// 刷新待写缓冲区
    ///
    /// 原子地取出并清空缓冲区，把提交任务加入队列。
    /// 缓冲区为空时返回已完成的信号，不入队。
    pub fn flush_pending_writes(&self) -> Result<FlushHandle> {
        self.ensure_open()?;
        self.flush_inner()
    }

    fn flush_inner(&self) -> Result<FlushHandle> {
        tokio::runtime::Handle::try_current().map_err(|e| CacheError::Runtime(e.to_string()))?;
        self.enqueue_commit(self.writer.take_snapshot())
    }

    fn enqueue_commit(&self, batch: Vec<(String, V)>) -> Result<FlushHandle> {
        if batch.is_empty() {
            return Ok(FlushHandle::ready(0));
        }

        let (tx, rx) = oneshot::channel();
        let sink = self.writer.sink();
        let metrics = self.metrics.clone();
        let job = async move {
            let result = BatchWriter::commit(sink, batch, metrics).await;
            let failure = result.as_ref().err().map(|e| e.to_string());
            let _ = tx.send(result);
            match failure {
                Some(message) => Err(anyhow::anyhow!(message)),
                None => Ok(()),
            }
        }
        .boxed();

        self.queue.enqueue("flush", job)?;
        Ok(FlushHandle::pending(rx))
    }

    /// 批量执行操作
    ///
    /// 所有操作作为一个任务排队，按提交顺序逐个执行。
    /// 任一操作失败则整个批次失败，后续操作不再执行，也不返回部分结果。
    #[instrument(skip_all, level = "debug", fields(ops = operations.len()))]
    pub async fn batch_operation<T>(&self, operations: Vec<BatchOp<T>>) -> Result<Vec<T>>
    where
        T: Send + 'static,
    {
        self.ensure_open()?;
        let (tx, rx) = oneshot::channel();
        let metrics = self.metrics.clone();

        let job = async move {
            let start = Instant::now();
            let result = run_batch(operations).await;
            metrics.record_duration(COMPONENT, "batch", start.elapsed().as_secs_f64());
            let failure = result.as_ref().err().map(|e| e.to_string());
            metrics.record_request(
                COMPONENT,
                "batch",
                if failure.is_some() { "error" } else { "ok" },
            );
            let _ = tx.send(result);
            match failure {
                Some(message) => Err(anyhow::anyhow!(message)),
                None => Ok(()),
            }
        }
        .boxed();

        self.queue.enqueue("batch", job)?;
        rx.await.map_err(|_| {
            CacheError::Cancelled("batch operation was dropped before it ran".to_string())
        })?
    }

    /// 分块处理集合
    ///
    /// 每个分块之间让出执行权，不会在整个集合处理期间阻塞当前线程
    pub async fn stream_process<T, R, F, Fut>(
        &self,
        items: Vec<T>,
        processor: F,
        chunk_size: usize,
    ) -> Result<Vec<R>>
    where
        F: FnMut(Vec<T>) -> Fut,
        Fut: Future<Output = anyhow::Result<Vec<R>>>,
    {
        self.ensure_open()?;
        stream::stream_process(items, processor, chunk_size).await
    }

    /// 清理调度器
    ///
    /// 提交剩余的待写条目并等待完成，清空值缓存，丢弃尚未开始的排队操作，
    /// 停止后台维护任务。之后的任何操作都返回 [`CacheError::Destroyed`]。
    #[instrument(skip(self), level = "info")]
    pub async fn cleanup(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(CacheError::Destroyed("DeferredScheduler"));
        }

        // 关闭写入器与取出剩余条目在同一次加锁内完成
        match self.enqueue_commit(self.writer.close()) {
            Ok(handle) => match handle.wait().await {
                Ok(committed) => debug!("cleanup: 提交剩余 {} 个待写条目", committed),
                Err(e) => warn!("cleanup: 提交剩余待写条目失败: {}", e),
            },
            Err(e) => warn!("cleanup: 无法刷新待写缓冲区: {}", e),
        }

        self.cache.clear();
        let dropped = self.queue.clear();
        self.shutdown.cancel();
        if let Some(handle) = lock(&self.maintenance).take() {
            handle.abort();
        }

        info!("DeferredScheduler cleaned up: dropped_operations={}", dropped);
        Ok(())
    }

    /// 获取统计信息
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            cached_entries: self.cache.len(),
            cached_bytes: self.cache.total_bytes(),
            pending_writes: self.writer.pending_len(),
            queued_operations: self.queue.len(),
            draining: self.queue.is_draining(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl<V> Drop for DeferredScheduler<V> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// 逐个执行批量操作，panic 视为该操作失败
async fn run_batch<T>(operations: Vec<BatchOp<T>>) -> Result<Vec<T>> {
    let mut results = Vec::with_capacity(operations.len());
    for (index, operation) in operations.into_iter().enumerate() {
        let outcome = match panic::catch_unwind(AssertUnwindSafe(operation)) {
            Ok(future) => AssertUnwindSafe(future).catch_unwind().await,
            Err(payload) => Err(payload),
        };
        let source = match outcome {
            Ok(Ok(value)) => {
                results.push(value);
                continue;
            }
            Ok(Err(source)) => source,
            Err(payload) => anyhow::anyhow!("operation panicked: {}", panic_message(&*payload)),
        };
        return Err(CacheError::BatchFailed { index, source });
    }
    Ok(results)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
