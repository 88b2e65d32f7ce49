//! `reset` command implementation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use contracts::{
    CoordinatorConfig, InitialSyncResult, ResetMode, ResetOptions, ResetResult, ResetStep,
    StepOutcome,
};
use observability::MetricsTelemetry;
use serde::Serialize;
use store_harness::{InProcessBus, SimulatedStore, StepBehavior, StoreState, SyncScript};
use sync_coordinator::{worst_case_duration, LifecycleCoordinator, ResetPreset, SyncStatus};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::load_config;
use crate::cli::ResetArgs;
use crate::error::CliError;

/// Reset report for JSON output
#[derive(Serialize)]
struct ResetReport {
    mode: ResetMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    preset: Option<ResetPreset>,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<ResetResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    elapsed_ms: u64,
    store: StoreReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    sync: Option<InitialSyncResult>,
    status: SyncStatus,
}

#[derive(Serialize)]
struct StoreReport {
    state: StoreState,
    calls: Vec<ResetStep>,
    completed: Vec<ResetStep>,
    records: usize,
    pending_writes: usize,
}

impl StoreReport {
    fn capture(store: &SimulatedStore) -> Self {
        Self {
            state: store.state(),
            calls: store.calls(),
            completed: store.completed(),
            records: store.record_count(),
            pending_writes: store.pending_writes(),
        }
    }
}

/// Execute the `reset` command
pub async fn run_reset(args: &ResetArgs, telemetry: Arc<MetricsTelemetry>) -> Result<()> {
    let config = load_config(&args.config)?;
    let options = match args.preset {
        Some(preset) => preset.options(),
        None => reset_options(args, &config),
    };

    let bus = InProcessBus::new();
    let store = Arc::new(build_store(args, &bus));
    let coordinator = LifecycleCoordinator::with_telemetry(bus, config, telemetry);
    let tracker = coordinator.track_status();

    info!(
        mode = options.mode.as_str(),
        preset = ?args.preset.map(|p| p.as_str()),
        worst_case_ms = worst_case_duration(&options).as_millis() as u64,
        "Resetting simulated store"
    );

    let started = Instant::now();
    let reset = async {
        match args.preset {
            Some(preset) => coordinator.run_preset(preset, Arc::clone(&store)).await,
            None => coordinator.reset_local_store(Arc::clone(&store), &options).await,
        }
    };
    // Subscribed by the time the drain report lands: `join!` polls the reset first.
    let drain = async {
        if let Some(after_ms) = args.drain_after_ms {
            store.drain_outbox(Duration::from_millis(after_ms));
        }
    };
    let (outcome, ()) = tokio::join!(reset, drain);
    let elapsed = started.elapsed();

    let (result, error) = match outcome {
        Ok(result) => (Some(result), None),
        Err(e) => (None, Some(e)),
    };

    let sync = match result {
        Some(_) if args.wait_sync => Some(wait_sync(&coordinator, &tracker.snapshot()).await),
        _ => None,
    };
    tracker.detach();

    let report = ResetReport {
        mode: options.mode,
        preset: args.preset,
        ok: error.is_none(),
        result,
        error: error.as_ref().map(ToString::to_string),
        elapsed_ms: elapsed.as_millis() as u64,
        store: StoreReport::capture(&store),
        sync,
        status: tracker.snapshot(),
    };

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize reset report")?;
        println!("{}", json);
    } else {
        print_reset_report(&report);
    }

    match error {
        Some(e) => Err(CliError::from(e).into()),
        None => Ok(()),
    }
}

/// Configured options with CLI overrides applied
fn reset_options(args: &ResetArgs, config: &CoordinatorConfig) -> ResetOptions {
    let mut options = config.reset;
    if let Some(mode) = args.mode {
        options.mode = mode.into();
    }
    if args.skip_outbox_wait {
        options = options.skip_outbox_wait();
    }
    options
}

fn build_store(args: &ResetArgs, bus: &InProcessBus) -> SimulatedStore {
    let script = SyncScript {
        outcome: args.sync.into(),
        after: Duration::from_millis(args.sync_after_ms),
    };
    let mut store = SimulatedStore::new()
        .with_records(args.records)
        .with_pending_writes(args.pending_writes)
        .with_bus(bus.clone(), script);

    // Later injections win for a step named twice
    let injections = [
        (&args.slow, StepBehavior::Delay(Duration::from_millis(args.slow_ms))),
        (&args.fail, StepBehavior::Fail("injected failure".to_string())),
        (&args.hang, StepBehavior::Hang),
    ];
    for (steps, behavior) in injections {
        for &step in steps {
            debug!(step = ?step, behavior = ?behavior, "Injecting store behavior");
            store = store.with_step(step.into(), behavior.clone());
        }
    }
    store
}

/// The ready event may already have been seen while a preset settled
async fn wait_sync(
    coordinator: &LifecycleCoordinator<InProcessBus>,
    status: &SyncStatus,
) -> InitialSyncResult {
    if status.is_ready {
        debug!("Initial sync already reported ready");
        return InitialSyncResult::ready(contracts::event_names::SYNC_QUERIES_READY);
    }
    let result = coordinator.wait_for_initial_sync().await;
    if !result.is_ready() {
        warn!(outcome = result.outcome.as_str(), "Store did not become ready after reset");
    }
    result
}

fn outcome_label(outcome: StepOutcome) -> &'static str {
    match outcome {
        StepOutcome::Ok => "ok",
        StepOutcome::TimedOut => "timed out (proceeded)",
    }
}

fn print_reset_report(report: &ResetReport) {
    let secs = report.elapsed_ms as f64 / 1000.0;
    match (&report.result, &report.error) {
        (Some(result), _) => {
            println!("✓ Reset completed ({}) in {:.2}s", report.mode.as_str(), secs);
            if let Some(preset) = report.preset {
                println!("  Preset: {}", preset);
            }
            println!(
                "  Outbox drained: {}",
                if result.outbox_empty_observed { "yes" } else { "no" }
            );
            println!("  Stop:  {}", outcome_label(result.stop));
            if let Some(clear) = result.clear {
                println!("  Clear: {}", outcome_label(clear));
            }
            println!("  Start: {}", outcome_label(result.start));
        }
        (None, error) => {
            println!("✗ Reset failed ({}) after {:.2}s", report.mode.as_str(), secs);
            if let Some(error) = error {
                println!("\n  Error: {}", error);
            }
        }
    }

    let store = &report.store;
    let calls: Vec<&str> = store.calls.iter().map(|s| s.as_str()).collect();
    println!(
        "\n  Store: {:?}, calls [{}], {} records, {} pending writes",
        store.state,
        calls.join(", "),
        store.records,
        store.pending_writes
    );

    if let Some(sync) = &report.sync {
        match &sync.event {
            Some(event) => println!("  Sync:  {} ({})", sync.outcome.as_str(), event),
            None => println!("  Sync:  {}", sync.outcome.as_str()),
        }
    }
}
