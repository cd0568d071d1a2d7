//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存与调度器的指标收集功能。
//!
//! 指标按实例持有，通过 `Arc<Metrics>` 在组件之间共享。

use crate::utils::lock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{span, Level};

/// 指标收集器
///
/// 用于收集和存储缓存系统的各种运行时指标
#[derive(Clone, Debug, Default)]
pub struct Metrics {
    /// 请求总数统计
    /// key: "component:op:result"
    pub requests_total: Arc<Mutex<HashMap<String, u64>>>,
    /// 驱逐条目数
    /// key: "component:reason"
    pub evictions_total: Arc<Mutex<HashMap<String, u64>>>,
    /// 操作耗时（累积时间和计数）
    /// key: "component:op" -> (total_duration_secs, count)
    pub operation_duration: Arc<Mutex<HashMap<String, (f64, u64)>>>,
    /// 待写缓冲区大小
    pub pending_writes: Arc<Mutex<HashMap<String, usize>>>,
}

impl Metrics {
    /// 创建共享的指标实例
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 记录请求指标
    ///
    /// # 参数
    ///
    /// * `component` - 组件名称（expiring/frequency/scheduler）
    /// * `op` - 操作类型（get/set/flush/batch）
    /// * `result` - 操作结果（hit/miss/ok/error）
    pub fn record_request(&self, component: &str, op: &str, result: &str) {
        let span = span!(Level::TRACE, "cache_request", component, op, result);
        let _enter = span.enter();
        let key = format!("{}:{}:{}", component, op, result);
        *lock(&self.requests_total).entry(key).or_insert(0) += 1;
    }

    /// 记录驱逐数量
    pub fn record_evictions(&self, component: &str, reason: &str, count: usize) {
        if count == 0 {
            return;
        }
        let key = format!("{}:{}", component, reason);
        *lock(&self.evictions_total).entry(key).or_insert(0) += count as u64;
    }

    /// 记录操作耗时
    pub fn record_duration(&self, component: &str, op: &str, duration_secs: f64) {
        let key = format!("{}:{}", component, op);
        let mut map = lock(&self.operation_duration);
        let entry = map.entry(key).or_insert((0.0, 0));
        entry.0 += duration_secs;
        entry.1 += 1;
    }

    /// 设置待写缓冲区大小
    pub fn set_pending_writes(&self, component: &str, size: usize) {
        lock(&self.pending_writes).insert(component.to_string(), size);
    }

    /// 读取某个请求计数
    pub fn request_count(&self, component: &str, op: &str, result: &str) -> u64 {
        let key = format!("{}:{}:{}", component, op, result);
        lock(&self.requests_total).get(&key).copied().unwrap_or(0)
    }

    /// 读取某个驱逐计数
    pub fn eviction_count(&self, component: &str, reason: &str) -> u64 {
        let key = format!("{}:{}", component, reason);
        lock(&self.evictions_total).get(&key).copied().unwrap_or(0)
    }

    /// 获取指标字符串
    ///
    /// 将所有指标格式化为Prometheus风格的文本，按键排序输出
    pub fn render(&self) -> String {
        let mut output = String::new();

        let mut reqs: Vec<_> = lock(&self.requests_total)
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        reqs.sort();
        for (k, v) in reqs {
            let parts: Vec<&str> = k.split(':').collect();
            if parts.len() == 3 {
                output.push_str(&format!(
                    "cache_requests_total{{component=\"{}\", operation=\"{}\", result=\"{}\"}} {}\n",
                    parts[0], parts[1], parts[2], v
                ));
            }
        }

        let mut evictions: Vec<_> = lock(&self.evictions_total)
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        evictions.sort();
        for (k, v) in evictions {
            if let Some((component, reason)) = k.split_once(':') {
                output.push_str(&format!(
                    "cache_evictions_total{{component=\"{}\", reason=\"{}\"}} {}\n",
                    component, reason, v
                ));
            }
        }

        let mut durations: Vec<_> = lock(&self.operation_duration)
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        durations.sort_by(|a, b| a.0.cmp(&b.0));
        for (k, (total, count)) in durations {
            if let Some((component, op)) = k.split_once(':') {
                output.push_str(&format!(
                    "cache_operation_duration_seconds_sum{{component=\"{}\", operation=\"{}\"}} {}\n",
                    component, op, total
                ));
                output.push_str(&format!(
                    "cache_operation_duration_seconds_count{{component=\"{}\", operation=\"{}\"}} {}\n",
                    component, op, count
                ));
            }
        }

        let mut pending: Vec<_> = lock(&self.pending_writes)
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        pending.sort();
        for (k, v) in pending {
            output.push_str(&format!(
                "cache_pending_writes{{component=\"{}\"}} {}\n",
                k, v
            ));
        }
        output
    }
}
