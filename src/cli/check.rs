//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了配置检查命令的实现。

use crate::cli::CheckArgs;
use crate::config::Config;
use anyhow::{Context, Result};

pub async fn execute(args: &CheckArgs) -> Result<()> {
    let config = Config::from_file(&args.config)
        .with_context(|| format!("Invalid configuration: {}", args.config.display()))?;

    println!("=== Effective Configuration ===\n");
    println!("{}", toml::to_string_pretty(&config)?);
    println!(
        "Unforced cache limit: {} bytes",
        config.scheduler.max_unforced_size()
    );
    Ok(())
}
