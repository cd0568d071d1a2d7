//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了合成负载命令的实现，用于观察缓存和调度器的行为。

use crate::backend::ExpiringCache;
use crate::cli::SimulateArgs;
use crate::config::Config;
use crate::metrics::Metrics;
use crate::scheduler::DeferredScheduler;
use crate::sync::batch_writer::SimulatedSink;
use crate::sync::common::batch_op;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

pub async fn execute(args: &SimulateArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Invalid configuration: {}", path.display()))?,
        None => Config::default(),
    };
    let keys = args.keys.max(1);
    let metrics = Metrics::shared();
    let start = Instant::now();

    let cache: Arc<ExpiringCache<String, u64>> = Arc::new(ExpiringCache::with_metrics(
        config.expiring_cache.clone(),
        metrics.clone(),
    ));
    for i in 0..keys {
        cache.set(format!("key:{}", i), i as u64)?;
    }
    // 每三个键读一次，另有一半读取落在不存在的键上
    for i in (0..keys * 2).step_by(3) {
        cache.get(format!("key:{}", i).as_str())?;
    }

    let square = cache.memoize(|(n,): (u64,)| n * n);
    for i in 0..keys as u64 {
        square.call((i % 16,))?;
    }

    let scheduler: DeferredScheduler<u64> = DeferredScheduler::with_sink_and_metrics(
        config.scheduler.clone(),
        Arc::new(SimulatedSink::new(config.scheduler.commit_delay())),
        metrics.clone(),
    );
    for i in 0..keys {
        scheduler.cache_data(format!("value:{}", i), i as u64, false)?;
    }
    for i in (0..keys).step_by(2) {
        scheduler.get_cached_data(&format!("value:{}", i))?;
    }

    let mut auto_flushes = Vec::new();
    for i in 0..args.writes {
        if let Some(handle) = scheduler.deferred_write(format!("write:{}", i % keys), i as u64)? {
            auto_flushes.push(handle);
        }
    }
    let mut committed = 0;
    for handle in auto_flushes {
        committed += handle.await?;
    }
    committed += scheduler.flush_pending_writes()?.await?;

    let ops = (0..4u64)
        .map(|i| batch_op(move || async move { Ok(i * 10) }))
        .collect();
    let batch = scheduler.batch_operation(ops).await?;

    let items: Vec<u64> = (1..=args.items as u64).collect();
    let mut chunks = 0usize;
    let doubled = scheduler
        .stream_process(
            items,
            |chunk| {
                chunks += 1;
                async move { Ok(chunk.into_iter().map(|n| n * 2).collect::<Vec<_>>()) }
            },
            args.chunk_size,
        )
        .await?;

    let cache_stats = cache.get_stats()?;
    let scheduler_stats = scheduler.stats();
    info!("simulation finished in {:?}", start.elapsed());

    if args.prometheus {
        println!("{}", metrics.render());
    } else if args.json {
        let output = serde_json::json!({
            "expiring_cache": cache_stats,
            "scheduler": scheduler_stats,
            "committed_writes": committed,
            "batch_results": batch,
            "stream": { "chunks": chunks, "results": doubled.len() },
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("=== Expiring Cache ===\n");
        println!("Size:      {}", cache_stats.size);
        println!("Hit Rate:  {:.2}", cache_stats.hit_rate);
        println!("TTL:       {:?}", cache.ttl());
        if let Some(oldest) = cache_stats.oldest_entry_timestamp {
            println!("Oldest:    {}", oldest.to_rfc3339());
        }
        if let Some(newest) = cache_stats.newest_entry_timestamp {
            println!("Newest:    {}", newest.to_rfc3339());
        }

        println!("\n=== Deferred Scheduler ===\n");
        println!("Cached Entries:   {}", scheduler_stats.cached_entries);
        println!("Cached Bytes:     {}", scheduler_stats.cached_bytes);
        println!("Committed Writes: {}", committed);
        println!("Batch Results:    {:?}", batch);
        println!("Stream Chunks:    {} ({} results)", chunks, doubled.len());

        println!("\n=== Metrics ===\n");
        print!("{}", metrics.render());
    }

    scheduler.cleanup().await?;
    cache.destroy()?;
    Ok(())
}
