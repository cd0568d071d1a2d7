//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了基于有界过期缓存的纯函数记忆化包装。

use super::expiring::ExpiringCache;
use crate::error::Result;
use crate::serialization::canonical_string;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, warn};

/// 记忆化函数
///
/// 缓存键为参数元组的规范化序列化结果，序列化相同的参数只会计算一次
pub struct Memoized<A, R, F> {
    cache: Arc<ExpiringCache<String, R>>,
    f: F,
    _args: PhantomData<fn(A)>,
}

impl<A, R, F> Memoized<A, R, F>
where
    A: Serialize,
    R: Clone + Serialize + Send + 'static,
    F: Fn(A) -> R,
{
    pub fn new(cache: Arc<ExpiringCache<String, R>>, f: F) -> Self {
        Self {
            cache,
            f,
            _args: PhantomData,
        }
    }

    /// 调用函数
    ///
    /// 命中缓存时直接返回缓存值，否则计算、写入缓存并返回。
    /// 参数无法序列化时退化为不带缓存的直接调用。
    pub fn call(&self, args: A) -> Result<R> {
        let key = match canonical_string(&args) {
            Ok(key) => key,
            Err(e) => {
                warn!("memoize: 参数无法序列化，跳过缓存: {}", e);
                return Ok((self.f)(args));
            }
        };

        if let Some(hit) = self.cache.get(key.as_str())? {
            debug!("memoize: key={}, hit=true", key);
            return Ok(hit);
        }

        let result = (self.f)(args);
        self.cache.set(key, result.clone())?;
        Ok(result)
    }

    /// 背后的缓存
    pub fn cache(&self) -> &Arc<ExpiringCache<String, R>> {
        &self.cache
    }
}

impl<V> ExpiringCache<String, V>
where
    V: Clone + Serialize + Send + 'static,
{
    /// 用当前缓存包装一个纯函数
    pub fn memoize<A, F>(self: &Arc<Self>, f: F) -> Memoized<A, V, F>
    where
        A: Serialize,
        F: Fn(A) -> V,
    {
        Memoized::new(self.clone(), f)
    }
}
