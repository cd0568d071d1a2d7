//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了延迟操作的公共类型

use crate::error::{CacheError, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::{Future, IntoFuture};
use tokio::sync::oneshot;

/// 排队执行的任务
///
/// Future 在被轮询前不会执行任何工作，出队时才开始运行
pub type Job = BoxFuture<'static, anyhow::Result<()>>;

/// 批量操作中的单个操作
pub type BatchOp<T> = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<T>> + Send>;

/// 将异步闭包包装为批量操作
pub fn batch_op<T, F, Fut>(f: F) -> BatchOp<T>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    Box::new(move || f().boxed())
}

enum FlushState {
    Ready(usize),
    Pending(oneshot::Receiver<Result<usize>>),
}

/// 刷新完成信号
///
/// 在对应的提交任务运行结束后完成，结果为提交的条目数
pub struct FlushHandle {
    state: FlushState,
}

impl FlushHandle {
    /// 已完成的刷新（例如缓冲区为空）
    pub fn ready(committed: usize) -> Self {
        Self {
            state: FlushState::Ready(committed),
        }
    }

    pub(crate) fn pending(rx: oneshot::Receiver<Result<usize>>) -> Self {
        Self {
            state: FlushState::Pending(rx),
        }
    }

    /// 等待提交完成
    pub async fn wait(self) -> Result<usize> {
        match self.state {
            FlushState::Ready(committed) => Ok(committed),
            FlushState::Pending(rx) => rx.await.map_err(|_| {
                CacheError::Cancelled("flush was dropped before it ran".to_string())
            })?,
        }
    }
}

impl IntoFuture for FlushHandle {
    type Output = Result<usize>;
    type IntoFuture = BoxFuture<'static, Result<usize>>;

    fn into_future(self) -> Self::IntoFuture {
        self.wait().boxed()
    }
}
