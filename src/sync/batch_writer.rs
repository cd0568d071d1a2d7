//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了待写缓冲区，用于把大量零散写入合并为批量提交。

use crate::error::{CacheError, Result};
use crate::metrics::Metrics;
use crate::utils::lock;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

const COMPONENT: &str = "batch_writer";

/// 批量提交的目标
///
/// 持久化后端的边界，提交一个已合并的快照
#[async_trait]
pub trait WriteSink<V>: Send + Sync {
    /// 提交一批写入，键按字典序排列且互不相同
    async fn commit(&self, batch: Vec<(String, V)>) -> anyhow::Result<()>;
}

/// 模拟提交
///
/// 以固定的短暂延迟代替真实I/O，总是成功
#[derive(Debug, Clone)]
pub struct SimulatedSink {
    delay: Duration,
}

impl SimulatedSink {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl<V: Send + 'static> WriteSink<V> for SimulatedSink {
    async fn commit(&self, batch: Vec<(String, V)>) -> anyhow::Result<()> {
        tokio::time::sleep(self.delay).await;
        debug!("SimulatedSink: committed {} writes", batch.len());
        Ok(())
    }
}

struct WriteBuffer<V> {
    entries: BTreeMap<String, V>,
    closed: bool,
}

/// 批量写入器
///
/// 同一个键多次写入只保留最后一次的值
pub struct BatchWriter<V> {
    /// 缓冲区，关闭标志与条目在同一把锁内
    buffer: Mutex<WriteBuffer<V>>,
    /// 自动刷新阈值
    batch_size: usize,
    /// 提交目标
    sink: Arc<dyn WriteSink<V>>,
    metrics: Arc<Metrics>,
}

impl<V: Send + 'static> BatchWriter<V> {
    /// 创建新的批量写入器
    ///
    /// # 参数
    ///
    /// * `batch_size` - 缓冲区达到该大小时应当刷新
    /// * `sink` - 提交目标
    /// * `metrics` - 指标实例
    pub fn new(batch_size: usize, sink: Arc<dyn WriteSink<V>>, metrics: Arc<Metrics>) -> Self {
        Self {
            buffer: Mutex::new(WriteBuffer {
                entries: BTreeMap::new(),
                closed: false,
            }),
            batch_size: batch_size.max(1),
            sink,
            metrics,
        }
    }

    fn lock(&self) -> MutexGuard<'_, WriteBuffer<V>> {
        lock(&self.buffer)
    }

    /// 将写入加入缓冲区
    ///
    /// # 返回值
    ///
    /// 缓冲区达到批量大小时返回 `true`，调用方应当刷新；
    /// 写入器已关闭时返回 [`CacheError::Destroyed`]，写入不会进入缓冲区
    pub fn write(&self, key: String, value: V) -> Result<bool> {
        let mut buffer = self.lock();
        if buffer.closed {
            return Err(CacheError::Destroyed("BatchWriter"));
        }
        let replaced = buffer.entries.insert(key, value).is_some();
        let len = buffer.entries.len();
        drop(buffer);

        self.metrics.set_pending_writes(COMPONENT, len);
        if replaced {
            self.metrics.record_request(COMPONENT, "write", "coalesced");
        }
        Ok(len >= self.batch_size)
    }

    /// 取出并清空缓冲区
    pub fn take_snapshot(&self) -> Vec<(String, V)> {
        let snapshot = std::mem::take(&mut self.lock().entries);
        self.metrics.set_pending_writes(COMPONENT, 0);
        snapshot.into_iter().collect()
    }

    /// 关闭写入器并取出剩余条目
    ///
    /// 与取快照在同一次加锁内完成，之后的写入都会失败，
    /// 因此返回成功的写入一定包含在某个快照中
    pub fn close(&self) -> Vec<(String, V)> {
        let snapshot = {
            let mut buffer = self.lock();
            buffer.closed = true;
            std::mem::take(&mut buffer.entries)
        };
        self.metrics.set_pending_writes(COMPONENT, 0);
        snapshot.into_iter().collect()
    }

    /// 缓冲区中的键数
    pub fn pending_len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn sink(&self) -> Arc<dyn WriteSink<V>> {
        self.sink.clone()
    }

    /// 提交快照，返回提交的条目数
    pub async fn commit(
        sink: Arc<dyn WriteSink<V>>,
        batch: Vec<(String, V)>,
        metrics: Arc<Metrics>,
    ) -> Result<usize> {
        let count = batch.len();
        let start = Instant::now();
        let result = sink.commit(batch).await;
        metrics.record_duration(COMPONENT, "commit", start.elapsed().as_secs_f64());

        match result {
            Ok(()) => {
                metrics.record_request(COMPONENT, "commit", "ok");
                info!("成功批量提交 {} 个待写条目", count);
                Ok(count)
            }
            Err(e) => {
                metrics.record_request(COMPONENT, "commit", "error");
                error!("批量提交失败，丢弃 {} 个待写条目: {:#}", count, e);
                Err(CacheError::CommitFailed(format!(
                    "{} pending writes lost: {:#}",
                    count, e
                )))
            }
        }
    }
}
