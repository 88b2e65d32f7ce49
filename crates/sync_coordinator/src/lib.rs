//! # Sync Coordinator
//!
//! 本地数据存储的同步生命周期协调器。
//!
//! 负责：
//! - 生命周期通知解析与事件名归一化
//! - 初始同步等待（有界）
//! - outbox 清空等待（有界、尽力而为）
//! - 有时限的 stop → [clear] → start 重置流程
//! - 本地/远端记录冲突裁决
//!
//! ## 使用示例
//!
//! ```ignore
//! use sync_coordinator::{reset_local_store, wait_for_initial_sync};
//! use contracts::{InitialSyncOptions, ResetMode, ResetOptions};
//!
//! let sync = wait_for_initial_sync(&bus, &InitialSyncOptions::default()).await;
//! if !sync.is_ready() {
//!     let options = ResetOptions::new(ResetMode::ClearAndRestart);
//!     let result = reset_local_store(store, &bus, &options).await?;
//!     tracing::info!(?result, "store reset");
//! }
//! ```

mod bus;
mod conflict;
mod coordinator;
mod initial_sync;
mod normalizer;
mod outbox;
mod preset;
mod race;
mod reset;
mod status;
mod telemetry;

use std::sync::Arc;

pub use bus::{subscribe, Subscription};
pub use conflict::{clinical_app_rules, is_truthy, ConflictPolicy};
pub use coordinator::LifecycleCoordinator;
pub use initial_sync::wait_for_initial_sync_with;
pub use normalizer::{canonical_name, canonicalize, parse};
pub use outbox::wait_for_outbox_empty_with;
pub use preset::{clear_cache_and_resync, force_full_sync, run_preset_with, ResetPreset};
pub use reset::{reset_local_store_with, worst_case_duration, ResetError};
pub use status::{NetworkStatus, SyncState, SyncStatus, SyncStatusTracker};
pub use telemetry::TracingTelemetry;

// Re-export contracts types
pub use contracts::{
    ConflictContext, ConflictDecision, DataStore, InitialSyncOptions, InitialSyncResult,
    LifecycleBus, NormalizedEvent, OutboxWaitOptions, ResetMode, ResetOptions, ResetResult,
    ResetStep, StepOutcome, SyncOutcome,
};

/// Wait for initial sync, reporting through tracing
pub async fn wait_for_initial_sync<B>(bus: &B, options: &InitialSyncOptions) -> InitialSyncResult
where
    B: LifecycleBus + ?Sized,
{
    wait_for_initial_sync_with(bus, options, Arc::new(TracingTelemetry)).await
}

/// Wait for the outbox to drain, reporting through tracing
pub async fn wait_for_outbox_empty<B>(bus: &B, options: &OutboxWaitOptions) -> bool
where
    B: LifecycleBus + ?Sized,
{
    wait_for_outbox_empty_with(bus, options, Arc::new(TracingTelemetry)).await
}

/// Reset the local store, reporting through tracing
pub async fn reset_local_store<S, B>(
    store: Arc<S>,
    bus: &B,
    options: &ResetOptions,
) -> Result<ResetResult, ResetError>
where
    S: DataStore + Send + Sync + 'static,
    B: LifecycleBus + ?Sized,
{
    reset_local_store_with(store, bus, options, Arc::new(TracingTelemetry)).await
}

/// Subscribe to normalized lifecycle events
pub fn subscribe_to_lifecycle_events<B, F>(bus: &B, handler: F) -> Subscription
where
    B: LifecycleBus + ?Sized,
    F: Fn(NormalizedEvent) + Send + Sync + 'static,
{
    subscribe(bus, handler)
}
