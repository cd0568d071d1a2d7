//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 统一工具模块
//!
//! 提供各组件共用的工具函数，包括：
//! - 忽略锁中毒的加锁
//! - 可取消的周期性后台任务

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// 加锁，锁中毒时继续使用内部数据
///
/// 所有临界区都是单次扫描或修改，不会留下半完成的状态
pub fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 启动周期性后台任务
///
/// 第一次执行在一个周期之后。`tick` 返回 `false` 或 `shutdown` 被取消时任务结束。
/// 当前不在tokio运行时中时不启动任务并返回 `None`。
///
/// # 参数
///
/// * `name` - 任务名称，用于日志
/// * `period` - 执行周期
/// * `shutdown` - 取消令牌
/// * `tick` - 每个周期执行一次
pub fn spawn_periodic<F>(
    name: &'static str,
    period: Duration,
    shutdown: CancellationToken,
    mut tick: F,
) -> Option<JoinHandle<()>>
where
    F: FnMut() -> bool + Send + 'static,
{
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        warn!("{}: 不在tokio运行时中，后台任务未启动", name);
        return None;
    };

    Some(runtime.spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if !tick() {
                        break;
                    }
                }
            }
        }
        debug!("{}: 后台任务已停止", name);
    }))
}
