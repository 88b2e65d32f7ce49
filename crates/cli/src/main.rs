//! # Sync Coordinator CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - 模拟存储上的重置 / 初始同步等待
//! - 单条冲突裁决

mod cli;
mod commands;
mod error;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use observability::{MetricsTelemetry, ObservabilityConfig};
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_info, run_reset, run_resolve, run_validate, run_wait};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Sync Coordinator CLI starting"
    );

    let telemetry = Arc::new(MetricsTelemetry::new());

    let result = match &cli.command {
        Commands::Reset(args) => run_reset(args, telemetry.clone()).await,
        Commands::Wait(args) => run_wait(args, telemetry.clone()).await,
        Commands::Resolve(args) => run_resolve(args, telemetry.clone()),
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    if cli.stats {
        println!("{}", telemetry.summary());
    }

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Initialize logging based on CLI options
fn init_logging(cli: &Cli) -> Result<()> {
    let (default_log_level, force_log_level) = if cli.quiet {
        ("warn", true)
    } else {
        let level = match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        (level, false)
    };

    let mut config = ObservabilityConfig {
        log_format: cli.log_format.into(),
        default_log_level: default_log_level.to_string(),
        force_log_level,
        metrics_addr: None,
    };
    if cli.metrics_port != 0 {
        config = config.with_metrics_port(cli.metrics_port);
    }

    observability::init_with_config(config)
}
