//! CoordinatorConfig - Config Loader output
//!
//! Describes waiter deadlines, the default reset policy and conflict rules.

use serde::{Deserialize, Serialize};

use crate::{ConflictPolicyConfig, InitialSyncOptions, OutboxWaitOptions, ResetOptions};

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete coordinator configuration
///
/// Every section is optional in the file and falls back to its defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Initial-sync waiter
    #[serde(default)]
    pub initial_sync: InitialSyncOptions,

    /// Outbox-drain waiter (standalone use)
    #[serde(default)]
    pub outbox: OutboxWaitOptions,

    /// Default reset options
    #[serde(default)]
    pub reset: ResetOptions,

    /// Conflict policy
    #[serde(default)]
    pub conflict: ConflictPolicyConfig,
}
