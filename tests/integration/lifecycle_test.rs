//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 生命周期管理集成测试

use common::RecordingSink;
use oxstash::config::{ExpiringCacheConfig, SchedulerConfig};
use oxstash::{batch_op, CacheError, DeferredScheduler, ExpiringCache};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

#[path = "../common/mod.rs"]
mod common;

/// 测试缓存销毁后所有操作快速失败
#[tokio::test]
async fn test_expiring_cache_destroy() {
    common::setup_logging();
    let cache: ExpiringCache<String, u32> = ExpiringCache::new(ExpiringCacheConfig::default());
    cache.set("k".to_string(), 1).unwrap();

    cache.destroy().unwrap();

    assert!(matches!(cache.get("k"), Err(CacheError::Destroyed(_))));
    assert!(matches!(
        cache.set("k".to_string(), 2),
        Err(CacheError::Destroyed(_))
    ));
    assert!(matches!(cache.has("k"), Err(CacheError::Destroyed(_))));
    assert!(matches!(cache.size(), Err(CacheError::Destroyed(_))));
    assert!(matches!(cache.get_stats(), Err(CacheError::Destroyed(_))));
    assert!(matches!(cache.destroy(), Err(CacheError::Destroyed(_))));
}

/// 测试清理时提交剩余的待写条目，之后的操作快速失败
#[tokio::test]
async fn test_cleanup_flushes_and_closes() {
    common::setup_logging();
    let sink = RecordingSink::new();
    let scheduler: DeferredScheduler<u32> = DeferredScheduler::with_sink(
        SchedulerConfig {
            batch_size: 100,
            ..Default::default()
        },
        sink.clone(),
    );

    scheduler.cache_data("cached", 1, false).unwrap();
    for i in 0..3 {
        scheduler.deferred_write(format!("w{}", i), i).unwrap();
    }

    scheduler.cleanup().await.unwrap();
    assert!(scheduler.is_closed());
    assert_eq!(sink.committed(), 3);

    let stats = scheduler.stats();
    assert_eq!(stats.cached_entries, 0);
    assert_eq!(stats.pending_writes, 0);

    assert!(matches!(
        scheduler.cache_data("k", 1, false),
        Err(CacheError::Destroyed(_))
    ));
    assert!(matches!(
        scheduler.get_cached_data("cached"),
        Err(CacheError::Destroyed(_))
    ));
    assert!(matches!(
        scheduler.deferred_write("k", 1),
        Err(CacheError::Destroyed(_))
    ));
    assert!(matches!(
        scheduler.flush_pending_writes(),
        Err(CacheError::Destroyed(_))
    ));
    assert!(matches!(
        scheduler.batch_operation(vec![batch_op(|| async { Ok(1) })]).await,
        Err(CacheError::Destroyed(_))
    ));
    assert!(matches!(
        scheduler.cleanup().await,
        Err(CacheError::Destroyed(_))
    ));
}

/// 测试清理时丢弃尚未开始的排队操作
#[tokio::test]
async fn test_cleanup_cancels_queued_operations() {
    common::setup_logging();
    let scheduler: Arc<DeferredScheduler<u32>> = Arc::new(DeferredScheduler::new(SchedulerConfig {
        maintenance_interval_secs: 0,
        ..Default::default()
    }));

    let (started_tx, started_rx) = oneshot::channel::<()>();
    let (gate_tx, gate_rx) = oneshot::channel::<()>();
    let running = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move {
            scheduler
                .batch_operation(vec![batch_op(move || async move {
                    let _ = started_tx.send(());
                    let _ = gate_rx.await;
                    Ok(1)
                })])
                .await
        })
    };
    started_rx.await.unwrap();

    let queued = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move {
            scheduler
                .batch_operation(vec![batch_op(|| async { Ok(2) })])
                .await
        })
    };
    while scheduler.stats().queued_operations == 0 {
        tokio::task::yield_now().await;
    }

    // 待写缓冲区为空，清理不需要等待队列
    scheduler.cleanup().await.unwrap();
    assert!(matches!(
        queued.await.unwrap(),
        Err(CacheError::Cancelled(_))
    ));

    // 已经开始的操作正常完成
    gate_tx.send(()).unwrap();
    assert_eq!(running.await.unwrap().unwrap(), vec![1]);
}

/// 测试后台维护任务执行内存限制和过期清理
#[tokio::test(start_paused = true)]
async fn test_maintenance_enforces_memory_limit() {
    common::setup_logging();
    let scheduler: DeferredScheduler<String> = DeferredScheduler::new(SchedulerConfig {
        max_memory_cache_bytes: 750,
        cache_expiry_secs: 10,
        maintenance_interval_secs: 1,
        ..Default::default()
    });

    // 每个值估算 100 字节，插入前检查不会触发驱逐
    for i in 0..8 {
        scheduler
            .cache_data(format!("k{}", i), "x".repeat(48), false)
            .unwrap();
    }
    assert_eq!(scheduler.stats().cached_bytes, 800);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    let stats = scheduler.stats();
    assert_eq!(stats.cached_entries, 6);
    assert_eq!(stats.cached_bytes, 600);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(scheduler.stats().cached_entries, 0);

    scheduler.cleanup().await.unwrap();
}

/// 测试清理与并发写入交错时，返回成功的写入全部被提交
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cleanup_commits_every_accepted_write() {
    common::setup_logging();
    let sink = RecordingSink::new();
    let scheduler: Arc<DeferredScheduler<u32>> = Arc::new(DeferredScheduler::with_sink(
        SchedulerConfig {
            batch_size: 10000,
            maintenance_interval_secs: 0,
            ..Default::default()
        },
        sink.clone(),
    ));

    let mut writers = Vec::new();
    for w in 0..4u32 {
        let scheduler = scheduler.clone();
        writers.push(tokio::spawn(async move {
            let mut accepted = 0usize;
            for i in 0..2000u32 {
                match scheduler.deferred_write(format!("w{}:{}", w, i), i) {
                    Ok(_) => accepted += 1,
                    Err(CacheError::Destroyed(_)) => break,
                    Err(e) => panic!("unexpected error: {:?}", e),
                }
                if i % 50 == 0 {
                    tokio::task::yield_now().await;
                }
            }
            accepted
        }));
    }

    tokio::time::sleep(Duration::from_millis(1)).await;
    scheduler.cleanup().await.unwrap();

    let mut accepted = 0;
    for writer in writers {
        accepted += writer.await.unwrap();
    }
    assert_eq!(sink.committed(), accepted);
    assert_eq!(scheduler.stats().pending_writes, 0);
}

/// 测试运行时在操作执行中关闭后，调度器在新的运行时上继续处理操作
#[test]
fn test_queue_recovers_after_runtime_shutdown() {
    common::setup_logging();
    let scheduler: Arc<DeferredScheduler<u32>> = Arc::new(DeferredScheduler::new(SchedulerConfig {
        maintenance_interval_secs: 0,
        ..Default::default()
    }));

    let first = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    first.block_on(async {
        let (started_tx, started_rx) = oneshot::channel::<()>();
        let long_running = scheduler.clone();
        tokio::spawn(async move {
            long_running
                .batch_operation(vec![batch_op(move || async move {
                    let _ = started_tx.send(());
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(1)
                })])
                .await
        });
        started_rx.await.unwrap();
        assert!(scheduler.stats().draining);
    });
    drop(first);

    let stats = scheduler.stats();
    assert!(!stats.draining);
    assert_eq!(stats.queued_operations, 0);

    let second = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    second.block_on(async {
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            scheduler.batch_operation(vec![batch_op(|| async { Ok(7) })]),
        )
        .await
        .expect("batch completes on the new runtime");
        assert_eq!(result.unwrap(), vec![7]);
    });
}
