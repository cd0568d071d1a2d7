//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了CLI命令行接口。

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "oxstash")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(long, global = true, default_value = "info", help = "Default log filter")]
    pub log: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(name = "check", about = "Validate a configuration file")]
    Check(CheckArgs),

    #[command(name = "simulate", about = "Run a synthetic cache and scheduler workload")]
    Simulate(SimulateArgs),
}

#[derive(Parser, Debug)]
pub struct CheckArgs {
    #[arg(short, long, help = "Path to the TOML configuration file")]
    pub config: PathBuf,
}

#[derive(Parser, Debug)]
pub struct SimulateArgs {
    #[arg(short, long, help = "Path to the TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, default_value_t = 500, help = "Number of distinct keys")]
    pub keys: usize,

    #[arg(long, default_value_t = 1000, help = "Number of deferred writes")]
    pub writes: usize,

    #[arg(long, default_value_t = 2500, help = "Number of items to stream")]
    pub items: usize,

    #[arg(long, default_value_t = crate::sync::stream::DEFAULT_CHUNK_SIZE, help = "Stream chunk size")]
    pub chunk_size: usize,

    #[arg(short, long, help = "Output in JSON format")]
    pub json: bool,

    #[arg(short, long, help = "Output metrics in Prometheus format")]
    pub prometheus: bool,
}

mod check;
mod simulate;

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    crate::telemetry::init_tracing(&cli.log);

    match &cli.command {
        Commands::Check(args) => check::execute(args).await,
        Commands::Simulate(args) => simulate::execute(args).await,
    }
}
