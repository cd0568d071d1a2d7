//! oxstash - 有界过期缓存与延迟I/O调度库
//!
//! 提供两个相互独立的组件：
//!
//! - [`ExpiringCache`]：容量有界、按TTL过期的键值缓存，支持函数记忆化
//! - [`DeferredScheduler`]：按访问频率驱逐的内存预算值缓存、待写合并缓冲区、
//!   串行操作队列和分块处理

#![doc(html_root_url = "https://docs.rs/oxstash/0.1.0")]

pub use serde;
pub use serde::{Deserialize, Serialize};
pub use serde_json;
pub use tokio;

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod scheduler;
pub mod serialization;
pub mod sync;
pub mod telemetry;
pub mod utils;

// Re-export commonly used items
pub use backend::{CacheStats, ExpiringCache, FrequencyCache, Memoized};
pub use config::{Config, ExpiringCacheConfig, SchedulerConfig};
pub use error::{CacheError, Result};
pub use metrics::Metrics;
pub use scheduler::{DeferredScheduler, SchedulerStats};
pub use sync::batch_writer::{SimulatedSink, WriteSink};
pub use sync::common::{batch_op, BatchOp, FlushHandle};

/// oxstash 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
