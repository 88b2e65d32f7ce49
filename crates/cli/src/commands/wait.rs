//! `wait` command implementation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use contracts::{DataStore, InitialSyncResult};
use observability::MetricsTelemetry;
use serde::Serialize;
use store_harness::{InProcessBus, SimulatedStore, SyncScript};
use sync_coordinator::{LifecycleCoordinator, SyncStatus};
use tokio::time::Instant;
use tracing::info;

use super::load_config;
use crate::cli::WaitArgs;
use crate::error::CliError;

/// Wait report for JSON output
#[derive(Serialize)]
struct WaitReport {
    timeout_ms: u64,
    #[serde(flatten)]
    result: InitialSyncResult,
    elapsed_ms: u64,
    status: SyncStatus,
}

/// Execute the `wait` command
///
/// Starts a simulated store scripted by `--sync` and waits for its initial sync.
/// Exits with an error unless the store reported ready.
pub async fn run_wait(args: &WaitArgs, telemetry: Arc<MetricsTelemetry>) -> Result<()> {
    let mut config = load_config(&args.config)?;
    if let Some(timeout_ms) = args.timeout_ms {
        config.initial_sync.timeout_ms = timeout_ms;
    }
    let timeout_ms = config.initial_sync.timeout_ms;

    let bus = InProcessBus::new();
    let script = SyncScript {
        outcome: args.sync.into(),
        after: Duration::from_millis(args.after_ms),
    };
    let store = SimulatedStore::new().with_bus(bus.clone(), script);
    let coordinator = LifecycleCoordinator::with_telemetry(bus, config, telemetry);
    let tracker = coordinator.track_status();

    info!(timeout_ms, sync = ?args.sync, "Waiting for initial sync");

    let started = Instant::now();
    // The waiter subscribes on its first poll, before `start` emits anything
    let (result, started_store) = tokio::join!(coordinator.wait_for_initial_sync(), store.start());
    started_store.map_err(CliError::from)?;
    let elapsed = started.elapsed();
    tracker.detach();

    let ready = result.is_ready();
    let report = WaitReport {
        timeout_ms,
        result,
        elapsed_ms: elapsed.as_millis() as u64,
        status: tracker.snapshot(),
    };

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize wait report")?;
        println!("{}", json);
    } else {
        print_wait_report(&report);
    }

    if ready {
        Ok(())
    } else {
        anyhow::bail!("Initial sync did not complete: {}", report.result.outcome.as_str())
    }
}

fn print_wait_report(report: &WaitReport) {
    let secs = report.elapsed_ms as f64 / 1000.0;
    let mark = if report.result.is_ready() { "✓" } else { "✗" };
    match &report.result.event {
        Some(event) => println!(
            "{} Initial sync {} after {:.2}s ({})",
            mark,
            report.result.outcome.as_str(),
            secs,
            event
        ),
        None => println!(
            "{} Initial sync {} after {:.2}s (limit {} ms)",
            mark,
            report.result.outcome.as_str(),
            secs,
            report.timeout_ms
        ),
    }
    println!("  Sync state: {}", report.status.sync_state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    fn wait_args(extra: &[&str]) -> WaitArgs {
        let argv = ["sync-coordinator", "wait"].into_iter().chain(extra.iter().copied());
        match Cli::parse_from(argv).command {
            Commands::Wait(args) => args,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_ready() {
        let telemetry = Arc::new(MetricsTelemetry::new());
        run_wait(&wait_args(&["--after-ms", "200", "--json"]), Arc::clone(&telemetry))
            .await
            .unwrap();
        assert_eq!(telemetry.summary().sync_ready, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_failed_is_error() {
        let err = run_wait(
            &wait_args(&["--sync", "failed", "--json"]),
            Arc::new(MetricsTelemetry::new()),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_timeout_override() {
        let telemetry = Arc::new(MetricsTelemetry::new());
        let started = Instant::now();
        let result = run_wait(
            &wait_args(&["--sync", "silent", "--timeout-ms", "1500", "--json"]),
            Arc::clone(&telemetry),
        )
        .await;
        assert!(result.is_err());
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1500));
        assert!(elapsed < Duration::from_millis(1600));
        assert_eq!(telemetry.summary().sync_timeout, 1);
    }
}
