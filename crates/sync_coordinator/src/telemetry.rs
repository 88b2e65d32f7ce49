//! Tracing-backed telemetry port.

use std::time::Duration;

use contracts::{
    ConflictContext, ContractError, DecisionSource, InitialSyncResult, LifecycleTelemetry, NormalizedEvent,
    ResetMode, ResetResult, ResetStep, StepOutcome, WaiterKind,
};
use tracing::{debug, info, trace, warn};

/// Reports every lifecycle fact as a structured `tracing` event
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl LifecycleTelemetry for TracingTelemetry {
    fn event_observed(&self, waiter: WaiterKind, event: &NormalizedEvent) {
        trace!(waiter = waiter.as_str(), event = %event.event, "lifecycle event observed");
    }

    fn initial_sync_resolved(&self, result: &InitialSyncResult, elapsed: Duration) {
        let elapsed_ms = elapsed.as_millis() as u64;
        if result.is_ready() {
            info!(
                outcome = %result.outcome,
                event = ?result.event,
                elapsed_ms,
                "initial sync resolved"
            );
        } else {
            warn!(
                outcome = %result.outcome,
                event = ?result.event,
                elapsed_ms,
                "initial sync not ready"
            );
        }
    }

    fn outbox_drain_resolved(&self, empty: bool, elapsed: Duration) {
        debug!(empty, elapsed_ms = elapsed.as_millis() as u64, "outbox wait resolved");
    }

    fn step_finished(&self, step: ResetStep, outcome: StepOutcome, elapsed: Duration) {
        debug!(
            step = step.as_str(),
            outcome = outcome.as_str(),
            elapsed_ms = elapsed.as_millis() as u64,
            "reset step finished"
        );
    }

    fn step_aborted(&self, step: ResetStep, timeout: Duration) {
        warn!(
            step = step.as_str(),
            timeout_ms = timeout.as_millis() as u64,
            "reset step aborted"
        );
    }

    fn step_failed(&self, step: ResetStep, error: &ContractError, elapsed: Duration) {
        warn!(
            step = step.as_str(),
            error = %error,
            elapsed_ms = elapsed.as_millis() as u64,
            "reset step failed"
        );
    }

    fn reset_finished(&self, mode: ResetMode, result: &ResetResult, elapsed: Duration) {
        info!(
            mode = mode.as_str(),
            any_timed_out = result.any_timed_out(),
            elapsed_ms = elapsed.as_millis() as u64,
            "reset finished"
        );
    }

    fn conflict_resolved(&self, conflict: &ConflictContext, source: DecisionSource) {
        debug!(
            model = %conflict.model_family,
            operation = %conflict.operation,
            source = source.as_str(),
            "conflict decision"
        );
    }
}
