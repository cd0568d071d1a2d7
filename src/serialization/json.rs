//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了JSON序列化器的实现。

use super::Serializer;
use crate::error::{CacheError, Result};
use serde::Serialize;

/// JSON序列化器
///
/// 基于serde_json，先转换为 `serde_json::Value` 使对象键有序，再输出紧凑文本
#[derive(Clone, Debug, Default)]
pub struct JsonSerializer;

impl JsonSerializer {
    /// 创建新的JSON序列化器
    pub fn new() -> Self {
        Self
    }
}

impl Serializer for JsonSerializer {
    /// 序列化值为规范化JSON字符串
    ///
    /// # 参数
    ///
    /// * `value` - 要序列化的值
    ///
    /// # 返回值
    ///
    /// 返回规范化字符串或序列化错误
    fn canonical_string<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        let tree =
            serde_json::to_value(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
        serde_json::to_string(&tree).map_err(|e| CacheError::Serialization(e.to_string()))
    }
}
