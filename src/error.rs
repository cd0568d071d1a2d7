//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存与延迟I/O调度器的错误类型和处理机制。

use thiserror::Error;

/// 缓存系统错误类型枚举
///
/// 缓存未命中不是错误，统一以 `Ok(None)` 表示
#[derive(Error, Debug)]
pub enum CacheError {
    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// 配置错误
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// 组件已被销毁（destroy/cleanup 之后继续调用）
    #[error("Use after destroy: {0}")]
    Destroyed(&'static str),

    /// 批量操作中某个操作失败，整个批次失败
    #[error("Batch operation failed at index {index}: {source}")]
    BatchFailed {
        /// 失败操作在批次中的位置
        index: usize,
        #[source]
        source: anyhow::Error,
    },

    /// 分块处理中某个分块失败
    #[error("Stream chunk {index} failed: {source}")]
    ChunkFailed {
        /// 失败分块的序号
        index: usize,
        #[source]
        source: anyhow::Error,
    },

    /// 待写缓冲区提交失败
    #[error("Commit failed: {0}")]
    CommitFailed(String),

    /// 排队中的操作在执行前被丢弃
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// 当前不在tokio运行时中
    #[error("Runtime unavailable: {0}")]
    Runtime(String),

    /// IO错误
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// 缓存操作结果类型别名
///
/// 简化错误处理，所有缓存操作都返回此类型
pub type Result<T> = std::result::Result<T, CacheError>;
