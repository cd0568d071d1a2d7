//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了日志初始化。

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// 初始化 tracing 日志
///
/// 优先使用 `RUST_LOG` 环境变量，否则使用传入的过滤规则。
/// 全局 subscriber 已存在时静默跳过，可以安全地重复调用。
///
/// # 参数
///
/// * `default_filter` - 默认过滤规则（例如 "info" 或 "oxstash=debug"）
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .ok();
}
