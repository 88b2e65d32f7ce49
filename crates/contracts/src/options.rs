//! Waiter and reset options contracts that can be shared across crates.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::event_names::{
    LEGACY_READY, LEGACY_SYNC_QUERIES_FAILED, SYNC_QUERIES_ERROR, SYNC_QUERIES_READY,
};
use crate::{ResetMode, ResetStep};

/// Default initial-sync deadline
pub const DEFAULT_INITIAL_SYNC_TIMEOUT_MS: u64 = 15_000;
/// Default outbox-drain deadline
pub const DEFAULT_OUTBOX_TIMEOUT_MS: u64 = 2_000;
/// Default per-step reset deadline
pub const DEFAULT_STEP_TIMEOUT_MS: u64 = 5_000;

/// Initial-sync waiter options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialSyncOptions {
    /// Deadline in milliseconds before resolving with `Timeout`
    pub timeout_ms: u64,
    /// Event names signalling ready (canonicalized before matching)
    pub ready_events: Vec<String>,
    /// Event names signalling failure (canonicalized before matching)
    pub failure_events: Vec<String>,
}

impl Default for InitialSyncOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_INITIAL_SYNC_TIMEOUT_MS,
            ready_events: vec![LEGACY_READY.to_string(), SYNC_QUERIES_READY.to_string()],
            failure_events: vec![
                LEGACY_SYNC_QUERIES_FAILED.to_string(),
                SYNC_QUERIES_ERROR.to_string(),
            ],
        }
    }
}

impl InitialSyncOptions {
    /// Defaults with a custom deadline
    pub fn with_timeout_ms(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            ..Default::default()
        }
    }

    /// Deadline as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Outbox-drain waiter options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboxWaitOptions {
    /// Deadline in milliseconds before giving up with `false`
    pub timeout_ms: u64,
}

impl Default for OutboxWaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_OUTBOX_TIMEOUT_MS,
        }
    }
}

impl OutboxWaitOptions {
    /// Deadline as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Time box for one reset step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepPolicy {
    /// Deadline in milliseconds
    #[serde(default = "default_step_timeout_ms")]
    pub timeout_ms: u64,
    /// Proceed with `TimedOut` instead of aborting when the deadline elapses
    pub proceed_on_timeout: bool,
}

fn default_step_timeout_ms() -> u64 {
    DEFAULT_STEP_TIMEOUT_MS
}

impl StepPolicy {
    /// Proceed-on-timeout policy with the given deadline
    pub fn proceed(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            proceed_on_timeout: true,
        }
    }

    /// Abort-on-timeout policy with the given deadline
    pub fn abort(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            proceed_on_timeout: false,
        }
    }

    /// Default policy for a step
    ///
    /// A hung stop must not block recovery; skipping clear or start would leave the
    /// store in an undefined state.
    pub fn default_for(step: ResetStep) -> Self {
        match step {
            ResetStep::Stop => Self::proceed(DEFAULT_STEP_TIMEOUT_MS),
            ResetStep::Clear | ResetStep::Start => Self::abort(DEFAULT_STEP_TIMEOUT_MS),
        }
    }

    /// Deadline as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_stop_policy() -> StepPolicy {
    StepPolicy::default_for(ResetStep::Stop)
}

fn default_clear_policy() -> StepPolicy {
    StepPolicy::default_for(ResetStep::Clear)
}

fn default_start_policy() -> StepPolicy {
    StepPolicy::default_for(ResetStep::Start)
}

fn default_true() -> bool {
    true
}

fn default_outbox_timeout_ms() -> u64 {
    DEFAULT_OUTBOX_TIMEOUT_MS
}

/// Reset orchestrator options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetOptions {
    /// Reset mode
    #[serde(default)]
    pub mode: ResetMode,

    /// Wait briefly for the outbox to drain before stopping
    #[serde(default = "default_true")]
    pub wait_for_outbox_empty: bool,

    /// Outbox wait deadline in milliseconds
    #[serde(default = "default_outbox_timeout_ms")]
    pub outbox_timeout_ms: u64,

    /// Stop step policy
    #[serde(default = "default_stop_policy")]
    pub stop: StepPolicy,

    /// Clear step policy (only used in `ClearAndRestart`)
    #[serde(default = "default_clear_policy")]
    pub clear: StepPolicy,

    /// Start step policy
    #[serde(default = "default_start_policy")]
    pub start: StepPolicy,
}

impl Default for ResetOptions {
    fn default() -> Self {
        Self::new(ResetMode::Restart)
    }
}

impl ResetOptions {
    /// Default options for `mode`
    pub fn new(mode: ResetMode) -> Self {
        Self {
            mode,
            wait_for_outbox_empty: true,
            outbox_timeout_ms: DEFAULT_OUTBOX_TIMEOUT_MS,
            stop: default_stop_policy(),
            clear: default_clear_policy(),
            start: default_start_policy(),
        }
    }

    /// Disable the pre-stop outbox wait
    pub fn skip_outbox_wait(mut self) -> Self {
        self.wait_for_outbox_empty = false;
        self
    }

    /// Policy for `step`
    pub fn policy(&self, step: ResetStep) -> StepPolicy {
        match step {
            ResetStep::Stop => self.stop,
            ResetStep::Clear => self.clear,
            ResetStep::Start => self.start,
        }
    }

    /// Outbox wait options derived from these options
    pub fn outbox_wait(&self) -> OutboxWaitOptions {
        OutboxWaitOptions {
            timeout_ms: self.outbox_timeout_ms,
        }
    }
}
