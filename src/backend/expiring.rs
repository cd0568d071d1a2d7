//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了有界过期缓存：按容量和存活时间双重约束的内存缓存。
//!
//! 读取命中会刷新条目时间戳，因此驱逐顺序等价于"带TTL的LRU"。

use super::entry::CacheEntry;
use crate::config::ExpiringCacheConfig;
use crate::error::{CacheError, Result};
use crate::metrics::Metrics;
use crate::serialization::estimate_size;
use crate::utils::{lock, spawn_periodic};
use ahash::AHashMap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::borrow::Borrow;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

const COMPONENT: &str = "expiring";

/// 缓存统计信息
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CacheStats {
    /// 当前条目数（包含尚未清理的过期条目）
    pub size: usize,
    /// 所有条目访问计数之和除以条目数
    pub hit_rate: f64,
    /// 最早的条目时间戳
    pub oldest_entry_timestamp: Option<DateTime<Utc>>,
    /// 最新的条目时间戳
    pub newest_entry_timestamp: Option<DateTime<Utc>>,
}

struct Store<K, V> {
    entries: AHashMap<K, CacheEntry<V>>,
    next_seq: u64,
    destroyed: bool,
}

impl<K: Hash + Eq + Clone, V> Store<K, V> {
    fn new() -> Self {
        Self {
            entries: AHashMap::new(),
            next_seq: 0,
            destroyed: false,
        }
    }

    /// 时间戳最小的键，时间戳相同按插入顺序
    fn oldest_key(&self) -> Option<K> {
        self.entries
            .iter()
            .min_by_key(|(_, e)| (e.created_at, e.seq))
            .map(|(k, _)| k.clone())
    }

    fn purge_expired(&mut self, now: Instant, ttl: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_expired(now, ttl));
        before - self.entries.len()
    }
}

/// 有界过期缓存
///
/// 所有读写都在一次加锁内完成，不跨越任何 `.await`
pub struct ExpiringCache<K, V> {
    store: Arc<Mutex<Store<K, V>>>,
    max_size: usize,
    ttl: Duration,
    metrics: Arc<Metrics>,
    shutdown: CancellationToken,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl<K, V> ExpiringCache<K, V>
where
    K: Hash + Eq + Clone + Debug + Send + 'static,
    V: Clone + Serialize + Send + 'static,
{
    /// 创建新的有界过期缓存
    ///
    /// `cleanup_interval_secs > 0` 且当前处于tokio运行时中时启动后台清理任务
    pub fn new(config: ExpiringCacheConfig) -> Self {
        Self::with_metrics(config, Metrics::shared())
    }

    /// 使用共享的指标实例创建缓存
    pub fn with_metrics(config: ExpiringCacheConfig, metrics: Arc<Metrics>) -> Self {
        let store = Arc::new(Mutex::new(Store::new()));
        let shutdown = CancellationToken::new();
        let ttl = config.ttl();
        let sweeper = if config.cleanup_interval_secs > 0 {
            let weak: Weak<Mutex<Store<K, V>>> = Arc::downgrade(&store);
            let sweep_metrics = metrics.clone();
            spawn_periodic(
                "ExpiringCache sweep",
                config.cleanup_interval(),
                shutdown.clone(),
                move || {
                    let Some(store) = weak.upgrade() else {
                        return false;
                    };
                    let removed = lock(&store).purge_expired(Instant::now(), ttl);
                    if removed > 0 {
                        sweep_metrics.record_evictions(COMPONENT, "expired", removed);
                        debug!("ExpiringCache sweep: removed={}", removed);
                    }
                    true
                },
            )
        } else {
            None
        };

        Self {
            store,
            max_size: config.max_size.max(1),
            ttl,
            metrics,
            shutdown,
            sweeper: Mutex::new(sweeper),
        }
    }

    fn live(&self) -> Result<MutexGuard<'_, Store<K, V>>> {
        let store = lock(&self.store);
        if store.destroyed {
            return Err(CacheError::Destroyed("ExpiringCache"));
        }
        Ok(store)
    }

    /// 设置缓存值
    ///
    /// 容量已满且键不存在时，先驱逐时间戳最小的条目
    pub fn set(&self, key: K, value: V) -> Result<()> {
        let size = estimate_size(&value);
        let mut store = self.live()?;

        if store.entries.len() >= self.max_size && !store.entries.contains_key(&key) {
            if let Some(victim) = store.oldest_key() {
                store.entries.remove(&victim);
                self.metrics.record_evictions(COMPONENT, "capacity", 1);
                debug!("ExpiringCache set: 容量已满，驱逐 key={:?}", victim);
            }
        }

        let seq = match store.entries.get(&key) {
            Some(existing) => existing.seq,
            None => {
                let seq = store.next_seq;
                store.next_seq += 1;
                seq
            }
        };
        debug!("ExpiringCache set: key={:?}, size={}", key, size);
        store.entries.insert(key, CacheEntry::new(value, size, 1, seq));
        Ok(())
    }

    /// 获取缓存值
    ///
    /// 命中时增加访问计数并刷新时间戳；过期条目会被顺带删除
    pub fn get<Q>(&self, key: &Q) -> Result<Option<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
    {
        let mut store = self.live()?;
        let now = Instant::now();

        match store.entries.get_mut(key) {
            None => {}
            Some(entry) if entry.is_expired(now, self.ttl) => {}
            Some(entry) => {
                entry.touch(now);
                self.metrics.record_request(COMPONENT, "get", "hit");
                return Ok(Some(entry.value.clone()));
            }
        }

        if store.entries.remove(key).is_some() {
            self.metrics.record_evictions(COMPONENT, "expired", 1);
            debug!("ExpiringCache get: key={:?}, expired=true, removed", key);
        }
        self.metrics.record_request(COMPONENT, "get", "miss");
        Ok(None)
    }

    /// 检查键是否存在且未过期
    ///
    /// 不修改访问计数和时间戳
    pub fn has<Q>(&self, key: &Q) -> Result<bool>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
    {
        let mut store = self.live()?;
        let expired = match store.entries.get(key) {
            None => return Ok(false),
            Some(entry) => entry.is_expired(Instant::now(), self.ttl),
        };
        if expired {
            store.entries.remove(key);
            self.metrics.record_evictions(COMPONENT, "expired", 1);
            debug!("ExpiringCache has: key={:?}, expired=true, removed", key);
        }
        Ok(!expired)
    }

    /// 删除缓存项，返回键是否存在
    pub fn delete<Q>(&self, key: &Q) -> Result<bool>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
    {
        let removed = self.live()?.entries.remove(key).is_some();
        debug!("ExpiringCache delete: key={:?}, removed={}", key, removed);
        Ok(removed)
    }

    /// 清空缓存
    pub fn clear(&self) -> Result<()> {
        self.live()?.entries.clear();
        debug!("ExpiringCache clear: 缓存已清空");
        Ok(())
    }

    /// 当前条目数，包含尚未清理的过期条目
    pub fn size(&self) -> Result<usize> {
        Ok(self.live()?.entries.len())
    }

    /// 立即清理所有过期条目，返回清理数量
    pub fn purge_expired(&self) -> Result<usize> {
        let removed = self.live()?.purge_expired(Instant::now(), self.ttl);
        self.metrics.record_evictions(COMPONENT, "expired", removed);
        Ok(removed)
    }

    /// 获取统计信息
    pub fn get_stats(&self) -> Result<CacheStats> {
        let store = self.live()?;
        let size = store.entries.len();
        let total_accesses: u64 = store.entries.values().map(|e| e.access_count).sum();
        let hit_rate = if size == 0 {
            0.0
        } else {
            total_accesses as f64 / size as f64
        };

        let now = Instant::now();
        let wall_now = Utc::now();
        let to_wall = |at: Instant| {
            let age = chrono::Duration::from_std(now.saturating_duration_since(at))
                .unwrap_or_else(|_| chrono::Duration::zero());
            wall_now - age
        };

        Ok(CacheStats {
            size,
            hit_rate,
            oldest_entry_timestamp: store.entries.values().map(|e| e.created_at).min().map(to_wall),
            newest_entry_timestamp: store.entries.values().map(|e| e.created_at).max().map(to_wall),
        })
    }

    /// 销毁缓存
    ///
    /// 停止后台清理并清空所有条目，之后的任何操作都返回 [`CacheError::Destroyed`]
    #[instrument(skip(self), level = "debug")]
    pub fn destroy(&self) -> Result<()> {
        {
            let mut store = self.live()?;
            store.entries.clear();
            store.destroyed = true;
        }
        self.shutdown.cancel();
        if let Some(handle) = lock(&self.sweeper).take() {
            handle.abort();
        }
        info!("ExpiringCache destroyed");
        Ok(())
    }

    /// 共享的指标实例
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// 配置的存活时间
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl<K, V> Drop for ExpiringCache<K, V> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
