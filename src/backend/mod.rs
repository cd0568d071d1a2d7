//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了两种内存缓存后端：按最近访问排序的有界过期缓存，
//! 以及调度器使用的按访问频率排序的内存预算缓存。

pub mod entry;
pub mod expiring;
pub mod frequency;
pub mod memoize;

pub use entry::CacheEntry;
pub use expiring::{CacheStats, ExpiringCache};
pub use frequency::FrequencyCache;
pub use memoize::Memoized;
