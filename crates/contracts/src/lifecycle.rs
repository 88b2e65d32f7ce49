//! Lifecycle outcomes - waiter and reset results.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Initial sync outcome
///
/// Immutable once a waiter resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// A ready event arrived before the deadline
    Ready,
    /// A failure event arrived before the deadline
    Failed,
    /// The deadline elapsed first
    Timeout,
}

impl SyncOutcome {
    /// Stable lowercase name (used for logs/metrics labels)
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOutcome::Ready => "ready",
            SyncOutcome::Failed => "failed",
            SyncOutcome::Timeout => "timeout",
        }
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of an initial-sync wait
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialSyncResult {
    /// Outcome
    pub outcome: SyncOutcome,

    /// Canonical name of the triggering event (absent on timeout)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
}

impl InitialSyncResult {
    /// Ready, triggered by `event`
    pub fn ready(event: impl Into<String>) -> Self {
        Self {
            outcome: SyncOutcome::Ready,
            event: Some(event.into()),
        }
    }

    /// Failed, triggered by `event`
    pub fn failed(event: impl Into<String>) -> Self {
        Self {
            outcome: SyncOutcome::Failed,
            event: Some(event.into()),
        }
    }

    /// Deadline elapsed
    pub fn timeout() -> Self {
        Self {
            outcome: SyncOutcome::Timeout,
            event: None,
        }
    }

    /// Whether the store reported ready
    pub fn is_ready(&self) -> bool {
        self.outcome == SyncOutcome::Ready
    }
}

/// Reset mode, chosen per invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetMode {
    /// stop → start
    #[default]
    Restart,
    /// stop → clear → start
    ClearAndRestart,
}

impl ResetMode {
    /// Steps run by this mode, in order
    pub fn steps(&self) -> &'static [ResetStep] {
        match self {
            ResetMode::Restart => &[ResetStep::Stop, ResetStep::Start],
            ResetMode::ClearAndRestart => &[ResetStep::Stop, ResetStep::Clear, ResetStep::Start],
        }
    }

    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            ResetMode::Restart => "restart",
            ResetMode::ClearAndRestart => "clear_and_restart",
        }
    }
}

impl fmt::Display for ResetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Individual reset step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetStep {
    Stop,
    Clear,
    Start,
}

impl ResetStep {
    /// Human-readable label used in timeout errors
    pub fn label(&self) -> &'static str {
        match self {
            ResetStep::Stop => "DataStore.stop()",
            ResetStep::Clear => "DataStore.clear()",
            ResetStep::Start => "DataStore.start()",
        }
    }

    /// Stable lowercase name (metrics label)
    pub fn as_str(&self) -> &'static str {
        match self {
            ResetStep::Stop => "stop",
            ResetStep::Clear => "clear",
            ResetStep::Start => "start",
        }
    }
}

impl fmt::Display for ResetStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one reset step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// The store call settled before the deadline
    Ok,
    /// The deadline elapsed and the step was configured to proceed
    TimedOut,
}

impl StepOutcome {
    /// Stable lowercase name, identical to the serialized form
    pub fn as_str(&self) -> &'static str {
        match self {
            StepOutcome::Ok => "ok",
            StepOutcome::TimedOut => "timed_out",
        }
    }
}

/// Result of one `reset` call
///
/// Returned to the caller, never retained by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetResult {
    /// Whether an outbox-empty signal was seen before stopping
    pub outbox_empty_observed: bool,
    /// Stop step outcome
    pub stop: StepOutcome,
    /// Clear step outcome (only in `ClearAndRestart`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear: Option<StepOutcome>,
    /// Start step outcome
    pub start: StepOutcome,
}

impl ResetResult {
    /// Whether any step proceeded past its deadline
    pub fn any_timed_out(&self) -> bool {
        self.stop == StepOutcome::TimedOut
            || self.clear == Some(StepOutcome::TimedOut)
            || self.start == StepOutcome::TimedOut
    }
}
