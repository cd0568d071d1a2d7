//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了延迟I/O的同步机制，包括操作队列、待写合并和分块处理。

pub mod batch_writer;
pub mod common;
pub mod queue;
pub mod stream;
