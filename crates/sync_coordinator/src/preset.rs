//! Reset presets used by developer tooling.
//!
//! A preset is a canonical [`ResetOptions`] plus a settle delay that gives background
//! sync time to begin before the caller continues.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use contracts::{
    DataStore, LifecycleBus, LifecycleTelemetry, ResetMode, ResetOptions, ResetResult,
    StepPolicy, DEFAULT_OUTBOX_TIMEOUT_MS, DEFAULT_STEP_TIMEOUT_MS,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::reset::{reset_local_store_with, ResetError};
use crate::telemetry::TracingTelemetry;

/// Named reset recipe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPreset {
    /// Restart the engine so it re-runs its sync queries; local data is kept
    ForceFullSync,
    /// Wipe local data, then restart
    ClearCacheAndResync,
}

impl ResetPreset {
    /// Every preset
    pub const ALL: [ResetPreset; 2] = [
        ResetPreset::ForceFullSync,
        ResetPreset::ClearCacheAndResync,
    ];

    /// Canonical options for this preset
    pub fn options(&self) -> ResetOptions {
        let mode = match self {
            ResetPreset::ForceFullSync => ResetMode::Restart,
            ResetPreset::ClearCacheAndResync => ResetMode::ClearAndRestart,
        };
        ResetOptions {
            mode,
            wait_for_outbox_empty: true,
            outbox_timeout_ms: DEFAULT_OUTBOX_TIMEOUT_MS,
            stop: StepPolicy::proceed(DEFAULT_STEP_TIMEOUT_MS),
            clear: StepPolicy::abort(DEFAULT_STEP_TIMEOUT_MS),
            start: StepPolicy::abort(DEFAULT_STEP_TIMEOUT_MS),
        }
    }

    /// Post-reset settle delay
    pub fn settle_delay(&self) -> Duration {
        match self {
            ResetPreset::ForceFullSync => Duration::from_millis(2_000),
            ResetPreset::ClearCacheAndResync => Duration::from_millis(5_000),
        }
    }

    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            ResetPreset::ForceFullSync => "force_full_sync",
            ResetPreset::ClearCacheAndResync => "clear_cache_and_resync",
        }
    }
}

impl fmt::Display for ResetPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResetPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "force_full_sync" => Ok(ResetPreset::ForceFullSync),
            "clear_cache_and_resync" => Ok(ResetPreset::ClearCacheAndResync),
            other => Err(format!(
                "unknown preset '{other}', expected force_full_sync or clear_cache_and_resync"
            )),
        }
    }
}

/// Run `preset`, then wait its settle delay
#[instrument(name = "run_preset", skip(store, bus, telemetry), fields(preset = %preset))]
pub async fn run_preset_with<S, B>(
    preset: ResetPreset,
    store: Arc<S>,
    bus: &B,
    telemetry: Arc<dyn LifecycleTelemetry>,
) -> Result<ResetResult, ResetError>
where
    S: DataStore + Send + Sync + 'static,
    B: LifecycleBus + ?Sized,
{
    info!("starting reset preset");
    match reset_local_store_with(store, bus, &preset.options(), telemetry).await {
        Ok(result) => {
            tokio::time::sleep(preset.settle_delay()).await;
            info!(settle_ms = preset.settle_delay().as_millis() as u64, "reset preset settled");
            Ok(result)
        }
        Err(e) => {
            error!(error = %e, "reset preset failed");
            Err(e)
        }
    }
}

/// Restart the store to force a full re-sync, keeping local data
pub async fn force_full_sync<S, B>(store: Arc<S>, bus: &B) -> Result<ResetResult, ResetError>
where
    S: DataStore + Send + Sync + 'static,
    B: LifecycleBus + ?Sized,
{
    run_preset_with(
        ResetPreset::ForceFullSync,
        store,
        bus,
        Arc::new(TracingTelemetry),
    )
    .await
}

/// Wipe the local cache and re-sync from the backend
pub async fn clear_cache_and_resync<S, B>(
    store: Arc<S>,
    bus: &B,
) -> Result<ResetResult, ResetError>
where
    S: DataStore + Send + Sync + 'static,
    B: LifecycleBus + ?Sized,
{
    run_preset_with(
        ResetPreset::ClearCacheAndResync,
        store,
        bus,
        Arc::new(TracingTelemetry),
    )
    .await
}
