//! LifecycleTelemetry trait - injectable logging/metrics port
//!
//! The coordinator reports through this port instead of global output, so its core
//! logic stays testable without capturing process-wide state.

use std::time::Duration;

use crate::{
    ConflictContext, ContractError, DecisionSource, InitialSyncResult, NormalizedEvent, ResetMode, ResetResult,
    ResetStep, StepOutcome,
};

/// Which waiter is reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaiterKind {
    InitialSync,
    OutboxDrain,
}

impl WaiterKind {
    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            WaiterKind::InitialSync => "initial_sync",
            WaiterKind::OutboxDrain => "outbox_drain",
        }
    }
}

/// Lifecycle telemetry port
///
/// All methods default to no-ops; implementors override what they record.
pub trait LifecycleTelemetry: Send + Sync {
    /// A normalized event reached a waiter
    fn event_observed(&self, waiter: WaiterKind, event: &NormalizedEvent) {
        let _ = (waiter, event);
    }

    /// Initial-sync wait resolved
    fn initial_sync_resolved(&self, result: &InitialSyncResult, elapsed: Duration) {
        let _ = (result, elapsed);
    }

    /// Outbox-drain wait resolved
    fn outbox_drain_resolved(&self, empty: bool, elapsed: Duration) {
        let _ = (empty, elapsed);
    }

    /// A reset step settled or proceeded past its deadline
    fn step_finished(&self, step: ResetStep, outcome: StepOutcome, elapsed: Duration) {
        let _ = (step, outcome, elapsed);
    }

    /// A reset step hit its deadline with abort policy
    fn step_aborted(&self, step: ResetStep, timeout: Duration) {
        let _ = (step, timeout);
    }

    /// The store rejected a reset step
    fn step_failed(&self, step: ResetStep, error: &ContractError, elapsed: Duration) {
        let _ = (step, error, elapsed);
    }

    /// A reset sequence completed
    fn reset_finished(&self, mode: ResetMode, result: &ResetResult, elapsed: Duration) {
        let _ = (mode, result, elapsed);
    }

    /// A conflict was resolved
    fn conflict_resolved(&self, conflict: &ConflictContext, source: DecisionSource) {
        let _ = (conflict, source);
    }
}

/// Telemetry that records nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl LifecycleTelemetry for NoopTelemetry {}
