//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了调度器使用的值缓存：按估算字节数限制总内存，
//! 超出预算时按访问次数驱逐最少使用的25%条目。
//!
//! 与有界过期缓存不同，读取命中只增加访问计数，不刷新时间戳。

use super::entry::CacheEntry;
use crate::config::SchedulerConfig;
use crate::metrics::Metrics;
use crate::serialization::estimate_size;
use crate::utils::lock;
use ahash::AHashMap;
use serde::Serialize;
use std::borrow::Borrow;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

const COMPONENT: &str = "frequency";

struct State<K, V> {
    entries: AHashMap<K, CacheEntry<V>>,
    next_seq: u64,
}

impl<K: Hash + Eq + Clone, V> State<K, V> {
    fn total_bytes(&self) -> u64 {
        self.entries.values().map(|e| e.estimated_size_bytes).sum()
    }

    /// 按 (访问次数, 插入序号) 升序移除前 len/4 个条目
    fn evict_least_used(&mut self) -> usize {
        let count = self.entries.len() / 4;
        if count == 0 {
            return 0;
        }

        let mut ranked: Vec<(u64, u64, K)> = self
            .entries
            .iter()
            .map(|(k, e)| (e.access_count, e.seq, k.clone()))
            .collect();
        ranked.sort_unstable_by_key(|(access_count, seq, _)| (*access_count, *seq));

        for (_, _, key) in ranked.into_iter().take(count) {
            self.entries.remove(&key);
        }
        count
    }
}

/// 按访问频率排序的内存预算缓存
pub struct FrequencyCache<K, V> {
    state: Mutex<State<K, V>>,
    max_memory_bytes: u64,
    expiry: Duration,
    max_unforced_size: u64,
    metrics: Arc<Metrics>,
}

impl<K, V> FrequencyCache<K, V>
where
    K: Hash + Eq + Clone + Debug,
    V: Clone + Serialize,
{
    pub fn new(config: &SchedulerConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            state: Mutex::new(State {
                entries: AHashMap::new(),
                next_seq: 0,
            }),
            max_memory_bytes: config.max_memory_cache_bytes as u64,
            expiry: config.cache_expiry(),
            max_unforced_size: config.max_unforced_size(),
            metrics,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<K, V>> {
        lock(&self.state)
    }

    /// 写入值
    ///
    /// 未强制且估算大小超过压缩阈值的10倍时不缓存，返回 `false`。
    /// 否则先执行内存限制检查，再插入（访问计数归零）。
    pub fn insert(&self, key: K, value: V, force: bool) -> bool {
        let size = estimate_size(&value);
        if !force && size > self.max_unforced_size {
            self.metrics.record_request(COMPONENT, "insert", "skipped");
            debug!(
                "FrequencyCache insert: key={:?}, size={} 超过上限 {}，跳过",
                key, size, self.max_unforced_size
            );
            return false;
        }

        let mut state = self.lock();
        self.enforce_locked(&mut state);

        let seq = match state.entries.get(&key) {
            Some(existing) => existing.seq,
            None => {
                let seq = state.next_seq;
                state.next_seq += 1;
                seq
            }
        };
        state.entries.insert(key, CacheEntry::new(value, size, 0, seq));
        self.metrics.record_request(COMPONENT, "insert", "ok");
        true
    }

    /// 读取值
    ///
    /// 命中时只增加访问计数；过期条目被顺带删除
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
    {
        let mut state = self.lock();
        let now = Instant::now();

        match state.entries.get_mut(key) {
            None => {}
            Some(entry) if entry.is_expired(now, self.expiry) => {}
            Some(entry) => {
                entry.hit();
                self.metrics.record_request(COMPONENT, "get", "hit");
                return Some(entry.value.clone());
            }
        }

        if state.entries.remove(key).is_some() {
            self.metrics.record_evictions(COMPONENT, "expired", 1);
            debug!("FrequencyCache get: key={:?}, expired=true, removed", key);
        }
        self.metrics.record_request(COMPONENT, "get", "miss");
        None
    }

    fn enforce_locked(&self, state: &mut State<K, V>) -> usize {
        let total = state.total_bytes();
        if total <= self.max_memory_bytes {
            return 0;
        }
        let evicted = state.evict_least_used();
        self.metrics.record_evictions(COMPONENT, "memory", evicted);
        debug!(
            "FrequencyCache: total={} 超过预算 {}，驱逐 {} 个条目，剩余 {} 字节",
            total,
            self.max_memory_bytes,
            evicted,
            state.total_bytes()
        );
        evicted
    }

    /// 总估算大小超过预算时驱逐最少使用的条目，返回驱逐数量
    pub fn enforce_memory_limit(&self) -> usize {
        let mut state = self.lock();
        self.enforce_locked(&mut state)
    }

    /// 无条件驱逐访问次数最少的25%条目（向下取整），返回驱逐数量
    pub fn evict_least_used(&self) -> usize {
        let evicted = self.lock().evict_least_used();
        self.metrics.record_evictions(COMPONENT, "least_used", evicted);
        evicted
    }

    /// 清理过期条目，返回清理数量
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.lock();
        let before = state.entries.len();
        let expiry = self.expiry;
        state.entries.retain(|_, e| !e.is_expired(now, expiry));
        let removed = before - state.entries.len();
        self.metrics.record_evictions(COMPONENT, "expired", removed);
        removed
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// 所有条目估算大小之和
    pub fn total_bytes(&self) -> u64 {
        self.lock().total_bytes()
    }

    /// 某个条目的访问次数
    pub fn access_count<Q>(&self, key: &Q) -> Option<u64>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lock().entries.get(key).map(|e| e.access_count)
    }
}
