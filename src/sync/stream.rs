//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了分块处理：把大集合切成有界大小的分块逐个处理，分块之间让出执行权。

use crate::error::{CacheError, Result};
use std::future::Future;
use tracing::debug;

/// 默认分块大小
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// 分块处理集合
///
/// # 参数
///
/// * `items` - 待处理的集合
/// * `processor` - 每个分块调用一次，结果按顺序拼接
/// * `chunk_size` - 分块最大长度，必须大于0
///
/// # 返回值
///
/// 返回拼接后的结果；任一分块失败时返回 [`CacheError::ChunkFailed`]
pub async fn stream_process<T, R, F, Fut>(
    items: Vec<T>,
    mut processor: F,
    chunk_size: usize,
) -> Result<Vec<R>>
where
    F: FnMut(Vec<T>) -> Fut,
    Fut: Future<Output = anyhow::Result<Vec<R>>>,
{
    if chunk_size == 0 {
        return Err(CacheError::ConfigError(
            "chunk_size must be greater than zero".to_string(),
        ));
    }

    let total = items.len();
    let mut results = Vec::with_capacity(total);
    let mut remaining = items.into_iter().peekable();
    let mut index = 0;

    while remaining.peek().is_some() {
        if index > 0 {
            tokio::task::yield_now().await;
        }
        let chunk: Vec<T> = remaining.by_ref().take(chunk_size).collect();
        let output = processor(chunk)
            .await
            .map_err(|source| CacheError::ChunkFailed { index, source })?;
        results.extend(output);
        index += 1;
    }

    debug!(
        "stream_process: items={}, chunks={}, results={}",
        total,
        index,
        results.len()
    );
    Ok(results)
}
