//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了两种缓存共用的缓存条目。

use std::time::Duration;
use tokio::time::Instant;

/// 缓存条目
///
/// `seq` 为键首次插入时分配的序号，覆盖写入时保留，
/// 用于在时间戳或访问计数相同时按插入顺序决胜
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_at: Instant,
    pub access_count: u64,
    pub estimated_size_bytes: u64,
    pub seq: u64,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, estimated_size_bytes: u64, access_count: u64, seq: u64) -> Self {
        Self {
            value,
            created_at: Instant::now(),
            access_count,
            estimated_size_bytes,
            seq,
        }
    }

    /// 条目年龄严格大于 `ttl` 时视为过期，恰好等于 `ttl` 时仍然有效
    pub fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.created_at) > ttl
    }

    /// 命中并刷新时间戳（按最近访问排序的缓存使用）
    pub fn touch(&mut self, now: Instant) {
        self.access_count += 1;
        self.created_at = now;
    }

    /// 仅增加访问计数（按访问频率排序的缓存使用）
    pub fn hit(&mut self) {
        self.access_count += 1;
    }
}
