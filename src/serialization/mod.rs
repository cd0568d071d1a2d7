//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存键的规范化序列化以及缓存值的大小估算。

pub mod json;

use crate::error::Result;
use serde::Serialize;
use tracing::debug;

pub use json::JsonSerializer;

/// 序列化失败时使用的估算大小（字节）
pub const FALLBACK_SIZE_BYTES: u64 = 1024;

/// 序列化器特征
///
/// 定义将值转换为规范化文本形式的接口
pub trait Serializer: Send + Sync {
    /// 序列化值为规范化字符串
    ///
    /// 逻辑上相同的值必须得到完全相同的字符串
    fn canonical_string<T: Serialize + ?Sized>(&self, value: &T) -> Result<String>;
}

/// 使用默认JSON序列化器生成规范化字符串
///
/// 用作记忆化函数的缓存键
pub fn canonical_string<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    JsonSerializer::new().canonical_string(value)
}

/// 估算值的内存占用（字节）
///
/// 粗略估算：规范化字符串的 UTF-16 长度 × 2。
/// 序列化失败时返回 [`FALLBACK_SIZE_BYTES`]，从不返回错误。
pub fn estimate_size<T: Serialize + ?Sized>(value: &T) -> u64 {
    match canonical_string(value) {
        Ok(text) => text.encode_utf16().count() as u64 * 2,
        Err(e) => {
            debug!("estimate_size: 序列化失败，使用默认大小: {}", e);
            FALLBACK_SIZE_BYTES
        }
    }
}
