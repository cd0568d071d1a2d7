//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了串行操作队列：任务按提交顺序逐个执行，同一时刻只有一个排空任务。

use super::common::Job;
use crate::error::{CacheError, Result};
use crate::utils::lock;
use futures::FutureExt;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, warn};

struct QueuedJob {
    id: u64,
    name: &'static str,
    job: Job,
}

#[derive(Default)]
struct QueueState {
    jobs: VecDeque<QueuedJob>,
    draining: bool,
    next_id: u64,
}

/// 排空任务在完成前被丢弃（例如所在的运行时关闭）时复位排空标志，
/// 之后的入队会重新启动排空任务。随任务一起创建，任务未被轮询就丢弃时同样生效。
struct DrainGuard {
    state: Arc<Mutex<QueueState>>,
    armed: bool,
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        if self.armed {
            lock(&self.state).draining = false;
            warn!("queue drain task dropped before the queue was empty");
        }
    }
}

/// 串行操作队列
///
/// 状态机：Idle -> Draining -> Idle。空闲时入队会启动一个排空任务；
/// 排空期间入队只追加到队尾。排空标志与队列在同一把锁内维护。
#[derive(Clone, Default)]
pub struct OperationQueue {
    state: Arc<Mutex<QueueState>>,
}

impl OperationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 将任务加入队尾
    ///
    /// # 参数
    ///
    /// * `name` - 任务名称，用于日志
    /// * `job` - 待执行的任务
    ///
    /// # 返回值
    ///
    /// 当前不在tokio运行时中时返回错误，任务不会入队
    pub fn enqueue(&self, name: &'static str, job: Job) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| CacheError::Runtime(e.to_string()))?;

        let start_drain = {
            let mut state = lock(&self.state);
            let id = state.next_id;
            state.next_id += 1;
            state.jobs.push_back(QueuedJob { id, name, job });
            debug!("queue enqueue: id={}, name={}, queued={}", id, name, state.jobs.len());
            if state.draining {
                false
            } else {
                state.draining = true;
                true
            }
        };

        if start_drain {
            runtime.spawn(Self::drain(DrainGuard {
                state: self.state.clone(),
                armed: true,
            }));
        }
        Ok(())
    }

    /// 排空队列
    ///
    /// 失败和panic都只记录日志，不影响后续任务
    async fn drain(mut guard: DrainGuard) {
        loop {
            let next = {
                let mut queue = lock(&guard.state);
                match queue.jobs.pop_front() {
                    Some(next) => next,
                    None => {
                        queue.draining = false;
                        guard.armed = false;
                        break;
                    }
                }
            };

            match AssertUnwindSafe(next.job).catch_unwind().await {
                Ok(Ok(())) => debug!("queue job done: id={}, name={}", next.id, next.name),
                Ok(Err(e)) => warn!(
                    "queue job failed: id={}, name={}, error={:#}",
                    next.id, next.name, e
                ),
                Err(_) => error!("queue job panicked: id={}, name={}", next.id, next.name),
            }
        }
        debug!("queue drained");
    }

    /// 丢弃所有尚未开始的任务，返回丢弃数量
    pub fn clear(&self) -> usize {
        let dropped: Vec<QueuedJob> = lock(&self.state).jobs.drain(..).collect();
        if !dropped.is_empty() {
            debug!("queue clear: dropped={}", dropped.len());
        }
        dropped.len()
    }

    /// 尚未开始的任务数
    pub fn len(&self) -> usize {
        lock(&self.state).jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.state).jobs.is_empty()
    }

    /// 是否存在活动的排空任务
    pub fn is_draining(&self) -> bool {
        lock(&self.state).draining
    }
}
