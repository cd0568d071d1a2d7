//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存系统的配置结构和解析逻辑。

use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const CONFIG_VERSION: u32 = 1;

/// 顶层配置
///
/// 可以从TOML文件加载，所有字段都有默认值
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_version: Option<u32>,
    /// 有界过期缓存配置
    #[serde(default)]
    pub expiring_cache: ExpiringCacheConfig,
    /// 延迟I/O调度器配置
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// 有界过期缓存配置
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ExpiringCacheConfig {
    /// 最大条目数
    pub max_size: usize,
    /// 条目存活时间（秒）
    pub ttl_secs: u64,
    /// 后台清理间隔（秒），0表示禁用自动清理
    pub cleanup_interval_secs: u64,
}

impl Default for ExpiringCacheConfig {
    fn default() -> Self {
        Self {
            max_size: 100,
            ttl_secs: 300,             // 5 minutes
            cleanup_interval_secs: 60, // 1 minute
        }
    }
}

impl ExpiringCacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

/// 延迟I/O调度器配置
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// 值缓存的内存预算（字节）
    pub max_memory_cache_bytes: usize,
    /// 值缓存条目过期时间（秒）
    pub cache_expiry_secs: u64,
    /// 待写缓冲区自动刷新阈值
    pub batch_size: usize,
    /// 压缩阈值（字节），超过其10倍的值默认不缓存
    pub compression_threshold_bytes: usize,
    /// 模拟提交延迟（毫秒）
    pub commit_delay_ms: u64,
    /// 后台维护间隔（秒），0表示禁用
    pub maintenance_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_memory_cache_bytes: 50 * 1024 * 1024, // 50MB
            cache_expiry_secs: 300,
            batch_size: 100,
            compression_threshold_bytes: 1024, // 1KB
            commit_delay_ms: 10,
            maintenance_interval_secs: 60,
        }
    }
}

impl SchedulerConfig {
    pub fn cache_expiry(&self) -> Duration {
        Duration::from_secs(self.cache_expiry_secs)
    }

    pub fn commit_delay(&self) -> Duration {
        Duration::from_millis(self.commit_delay_ms)
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs)
    }

    /// 不强制缓存时允许的最大估算大小
    pub fn max_unforced_size(&self) -> u64 {
        self.compression_threshold_bytes as u64 * 10
    }
}

impl Config {
    /// 从TOML字符串解析配置并验证
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| CacheError::ConfigError(e.to_string()))?;
        config.validate().map_err(CacheError::ConfigError)?;
        Ok(config)
    }

    /// 从TOML文件加载配置并验证
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// 验证配置
    ///
    /// 检查配置的有效性，确保所有值都在合理范围内
    pub fn validate(&self) -> std::result::Result<(), String> {
        // 验证配置版本
        if let Some(version) = self.config_version {
            if version > CONFIG_VERSION {
                return Err(format!(
                    "Configuration version {} is not supported. Current version is {}.",
                    version, CONFIG_VERSION
                ));
            }
        }

        let expiring = &self.expiring_cache;
        if expiring.max_size == 0 {
            return Err("expiring_cache.max_size cannot be zero".to_string());
        }

        if expiring.ttl_secs == 0 {
            return Err("expiring_cache.ttl_secs cannot be zero".to_string());
        }

        if expiring.ttl_secs > 86400 * 30 {
            return Err("expiring_cache.ttl_secs cannot exceed 30 days (2592000 seconds)".to_string());
        }

        // 清理间隔必须小于等于 TTL
        if expiring.cleanup_interval_secs > expiring.ttl_secs {
            return Err(format!(
                "expiring_cache.cleanup_interval_secs ({}) must be <= ttl_secs ({})",
                expiring.cleanup_interval_secs, expiring.ttl_secs
            ));
        }

        let scheduler = &self.scheduler;
        if scheduler.max_memory_cache_bytes == 0 {
            return Err("scheduler.max_memory_cache_bytes cannot be zero".to_string());
        }

        if scheduler.cache_expiry_secs == 0 {
            return Err("scheduler.cache_expiry_secs cannot be zero".to_string());
        }

        if scheduler.batch_size == 0 {
            return Err("scheduler.batch_size cannot be zero".to_string());
        }

        if scheduler.batch_size > 10000 {
            return Err("scheduler.batch_size cannot exceed 10000".to_string());
        }

        if scheduler.compression_threshold_bytes == 0 {
            return Err("scheduler.compression_threshold_bytes cannot be zero".to_string());
        }

        if scheduler.commit_delay_ms > 60000 {
            return Err("scheduler.commit_delay_ms cannot exceed 60000 ms".to_string());
        }

        Ok(())
    }
}
