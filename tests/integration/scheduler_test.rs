//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 延迟I/O调度器集成测试：值缓存、批量操作和分块处理

use oxstash::config::SchedulerConfig;
use oxstash::{batch_op, CacheError, DeferredScheduler};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[path = "../common/mod.rs"]
mod common;

fn config(max_memory_cache_bytes: usize) -> SchedulerConfig {
    SchedulerConfig {
        max_memory_cache_bytes,
        maintenance_interval_secs: 0,
        ..Default::default()
    }
}

/// 48个字符的字符串，估算大小为 (48 + 2) * 2 = 100 字节
fn value() -> String {
    "x".repeat(48)
}

/// 测试超出内存预算时驱逐访问次数最少的25%
#[tokio::test]
async fn test_memory_limit_evicts_least_used_quarter() {
    common::setup_logging();
    let scheduler: DeferredScheduler<String> = DeferredScheduler::new(config(750));

    for i in 0..8 {
        assert!(scheduler.cache_data(format!("k{}", i), value(), false).unwrap());
    }
    // 插入前检查，第8次插入时总量 700 未超预算
    assert_eq!(scheduler.stats().cached_entries, 8);
    assert_eq!(scheduler.stats().cached_bytes, 800);

    for i in 0..6 {
        scheduler.get_cached_data(&format!("k{}", i)).unwrap();
    }

    assert_eq!(scheduler.enforce_memory_limit().unwrap(), 2);
    let stats = scheduler.stats();
    assert_eq!(stats.cached_entries, 6);
    assert_eq!(stats.cached_bytes, 600);
    assert!(scheduler.get_cached_data("k6").unwrap().is_none());
    assert!(scheduler.get_cached_data("k7").unwrap().is_none());
    assert_eq!(
        scheduler.metrics().eviction_count("frequency", "memory"),
        2
    );

    // 已在预算内，不再驱逐
    assert_eq!(scheduler.enforce_memory_limit().unwrap(), 0);
}

/// 测试下一次插入前执行内存限制检查
#[tokio::test]
async fn test_insert_enforces_limit_first() {
    let scheduler: DeferredScheduler<String> = DeferredScheduler::new(config(750));
    for i in 0..8 {
        scheduler.cache_data(format!("k{}", i), value(), false).unwrap();
    }
    // 800 > 750，先驱逐 8/4 = 2 个，再插入
    scheduler.cache_data("k8", value(), false).unwrap();
    assert_eq!(scheduler.stats().cached_entries, 7);
    assert!(scheduler.get_cached_data("k8").unwrap().is_some());
}

/// 测试过大的值默认不缓存，强制时缓存
#[tokio::test]
async fn test_oversized_values_require_force() {
    let scheduler: DeferredScheduler<String> = DeferredScheduler::new(config(1024 * 1024));
    let big = "y".repeat(6000);

    assert!(!scheduler.cache_data("big", big.clone(), false).unwrap());
    assert!(scheduler.get_cached_data("big").unwrap().is_none());

    assert!(scheduler.cache_data("big", big.clone(), true).unwrap());
    assert_eq!(scheduler.get_cached_data("big").unwrap(), Some(big));
}

/// 测试值缓存条目过期
#[tokio::test(start_paused = true)]
async fn test_cached_values_expire() {
    let scheduler: DeferredScheduler<u32> = DeferredScheduler::new(SchedulerConfig {
        cache_expiry_secs: 5,
        maintenance_interval_secs: 0,
        ..Default::default()
    });
    scheduler.cache_data("k", 1, false).unwrap();

    tokio::time::advance(Duration::from_secs(5)).await;
    assert_eq!(scheduler.get_cached_data("k").unwrap(), Some(1));

    tokio::time::advance(Duration::from_millis(1)).await;
    assert_eq!(scheduler.get_cached_data("k").unwrap(), None);
}

/// 测试分块处理：2500 个元素，分块大小 1000
#[tokio::test]
async fn test_stream_process_chunks() {
    let scheduler: DeferredScheduler<u32> = DeferredScheduler::new(config(1024));
    let items: Vec<u32> = (1..=2500).collect();
    let mut sizes = Vec::new();

    let results = scheduler
        .stream_process(
            items,
            |chunk| {
                sizes.push(chunk.len());
                async move { Ok(chunk.into_iter().map(|n| n * 2).collect::<Vec<_>>()) }
            },
            1000,
        )
        .await
        .unwrap();

    assert_eq!(sizes, vec![1000, 1000, 500]);
    assert_eq!(results.len(), 2500);
    assert_eq!(results[0], 2);
    assert_eq!(results[2499], 5000);
    assert!(results.windows(2).all(|w| w[0] < w[1]));
}

/// 测试分块之间让出执行权，其他任务可以在中途运行
#[tokio::test]
async fn test_stream_process_yields_between_chunks() {
    let scheduler: DeferredScheduler<u32> = DeferredScheduler::new(config(1024));
    let ran = Arc::new(AtomicBool::new(false));
    let flag = ran.clone();
    tokio::spawn(async move {
        flag.store(true, Ordering::SeqCst);
    });

    let mut observed = Vec::new();
    scheduler
        .stream_process(
            (0..30u32).collect(),
            |chunk| {
                observed.push(ran.load(Ordering::SeqCst));
                async move { Ok(chunk) }
            },
            10,
        )
        .await
        .unwrap();

    // 单线程运行时：第一个分块之前没有让出，之后的分块都在让出之后
    assert_eq!(observed, vec![false, true, true]);
}

/// 测试批量操作按顺序返回全部结果
#[tokio::test]
async fn test_batch_operation_results_in_order() {
    let scheduler: DeferredScheduler<u32> = DeferredScheduler::new(config(1024));
    let ops = (0..5u32)
        .map(|i| {
            batch_op(move || async move {
                tokio::time::sleep(Duration::from_millis((5 - i) as u64)).await;
                Ok(i * i)
            })
        })
        .collect();

    let results = scheduler.batch_operation(ops).await.unwrap();
    assert_eq!(results, vec![0, 1, 4, 9, 16]);
}

/// 测试批量操作失败时不返回部分结果，后续操作不执行
#[tokio::test]
async fn test_batch_operation_failure() {
    let scheduler: DeferredScheduler<u32> = DeferredScheduler::new(config(1024));
    let executed = Arc::new(AtomicUsize::new(0));

    let first = executed.clone();
    let third = executed.clone();
    let ops = vec![
        batch_op(move || async move {
            first.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        }),
        batch_op(|| async { Err(anyhow::anyhow!("disk full")) }),
        batch_op(move || async move {
            third.fetch_add(1, Ordering::SeqCst);
            Ok(3)
        }),
    ];

    let err = scheduler.batch_operation(ops).await.unwrap_err();
    match err {
        CacheError::BatchFailed { index, source } => {
            assert_eq!(index, 1);
            assert!(source.to_string().contains("disk full"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(executed.load(Ordering::SeqCst), 1);

    // 队列继续处理之后的操作
    let ok = scheduler
        .batch_operation(vec![batch_op(|| async { Ok(7) })])
        .await
        .unwrap();
    assert_eq!(ok, vec![7]);
}

/// 测试批量中的操作 panic 时报告该操作的位置，后续操作不执行
#[tokio::test]
async fn test_batch_operation_panic_reports_index() {
    common::setup_logging();
    let scheduler: DeferredScheduler<u32> = DeferredScheduler::new(config(1024));
    let executed = Arc::new(AtomicUsize::new(0));

    let third = executed.clone();
    let ops = vec![
        batch_op(|| async { Ok(1) }),
        batch_op(|| async {
            if true {
                panic!("index out of range");
            }
            Ok(2)
        }),
        batch_op(move || async move {
            third.fetch_add(1, Ordering::SeqCst);
            Ok(3)
        }),
    ];

    match scheduler.batch_operation(ops).await {
        Err(CacheError::BatchFailed { index, source }) => {
            assert_eq!(index, 1);
            assert!(source.to_string().contains("index out of range"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(executed.load(Ordering::SeqCst), 0);

    // 队列继续处理之后的操作
    let ok = scheduler
        .batch_operation(vec![batch_op(|| async { Ok(9) })])
        .await
        .unwrap();
    assert_eq!(ok, vec![9]);
}

/// 测试并发提交的批量操作按提交顺序串行执行
#[tokio::test(start_paused = true)]
async fn test_batches_run_in_submission_order() {
    let scheduler: DeferredScheduler<u32> = DeferredScheduler::new(config(1024));
    let order = Arc::new(Mutex::new(Vec::new()));

    let make = |name: &'static str, delay_ms: u64| {
        let order = order.clone();
        vec![batch_op(move || async move {
            order.lock().unwrap().push(format!("{}:start", name));
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            order.lock().unwrap().push(format!("{}:end", name));
            Ok(delay_ms)
        })]
    };

    let (a, b, c) = tokio::join!(
        scheduler.batch_operation(make("a", 30)),
        scheduler.batch_operation(make("b", 20)),
        scheduler.batch_operation(make("c", 10)),
    );
    assert_eq!(a.unwrap(), vec![30]);
    assert_eq!(b.unwrap(), vec![20]);
    assert_eq!(c.unwrap(), vec![10]);

    assert_eq!(
        *order.lock().unwrap(),
        vec!["a:start", "a:end", "b:start", "b:end", "c:start", "c:end"]
    );
}

/// 测试空批次
#[tokio::test]
async fn test_empty_batch() {
    let scheduler: DeferredScheduler<u32> = DeferredScheduler::new(config(1024));
    let results: Vec<u32> = scheduler.batch_operation(Vec::new()).await.unwrap();
    assert!(results.is_empty());
}
