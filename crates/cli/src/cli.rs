//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use contracts::{OpType, ResetMode, ResetStep};
use std::path::PathBuf;
use store_harness::ScriptedSync;
use sync_coordinator::ResetPreset;

/// Sync Coordinator - lifecycle tooling for an offline-first local data store
#[derive(Parser, Debug)]
#[command(
    name = "sync-coordinator",
    author,
    version,
    about = "Local data store sync lifecycle coordinator",
    long_about = "Drives the sync lifecycle of an offline-first local data store.\n\n\
                  Waits for initial sync, runs bounded stop/clear/start resets against \n\
                  a simulated store and resolves local/remote record conflicts."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "SYNC_COORDINATOR_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "SYNC_COORDINATOR_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", global = true, env = "SYNC_COORDINATOR_METRICS_PORT")]
    pub metrics_port: u16,

    /// Print lifecycle statistics when the command finishes
    #[arg(long, global = true)]
    pub stats: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reset a simulated local store (stop, optional clear, start)
    Reset(ResetArgs),

    /// Start a simulated store and wait for its initial sync
    Wait(WaitArgs),

    /// Resolve one local/remote record conflict
    Resolve(ResolveArgs),

    /// Validate configuration file
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Shared `--config` flag
#[derive(Args, Debug, Clone)]
pub struct ConfigArg {
    /// Path to configuration file (TOML or JSON); defaults apply when omitted
    #[arg(short, long, env = "SYNC_COORDINATOR_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Arguments for the `reset` command
#[derive(Parser, Debug, Clone)]
pub struct ResetArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Reset mode (overrides the configured mode)
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Run a named preset instead (force_full_sync, clear_cache_and_resync)
    #[arg(long, conflicts_with = "mode")]
    pub preset: Option<ResetPreset>,

    /// Skip waiting for the outbox to drain before stopping
    #[arg(long, conflicts_with = "preset")]
    pub skip_outbox_wait: bool,

    /// Make these store calls never settle
    #[arg(long, value_enum, value_delimiter = ',')]
    pub hang: Vec<StepArg>,

    /// Make these store calls reject
    #[arg(long, value_enum, value_delimiter = ',')]
    pub fail: Vec<StepArg>,

    /// Make these store calls settle after `--slow-ms`
    #[arg(long, value_enum, value_delimiter = ',')]
    pub slow: Vec<StepArg>,

    /// Delay applied to `--slow` calls
    #[arg(long, default_value = "1000")]
    pub slow_ms: u64,

    /// Records held by the simulated store
    #[arg(long, default_value = "0")]
    pub records: usize,

    /// Unsynced local writes held by the simulated store
    #[arg(long, default_value = "0")]
    pub pending_writes: usize,

    /// Report the outbox drained after this many milliseconds
    #[arg(long)]
    pub drain_after_ms: Option<u64>,

    /// Sync outcome the store reports after `start`
    #[arg(long, value_enum, default_value = "ready")]
    pub sync: SyncArg,

    /// Delay before the post-start sync outcome is reported
    #[arg(long, default_value = "500")]
    pub sync_after_ms: u64,

    /// After a successful reset, wait for the initial sync to finish
    #[arg(long)]
    pub wait_sync: bool,

    /// Output result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `wait` command
#[derive(Parser, Debug, Clone)]
pub struct WaitArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Sync outcome the simulated store reports
    #[arg(long, value_enum, default_value = "ready")]
    pub sync: SyncArg,

    /// Delay before the sync outcome is reported
    #[arg(long, default_value = "1000")]
    pub after_ms: u64,

    /// Wait timeout (overrides the configured timeout)
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Output result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `resolve` command
#[derive(Parser, Debug, Clone)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// JSON file holding the conflict ({model_family, local, remote, operation})
    #[arg(short, long, conflicts_with_all = ["family", "op", "local", "remote"])]
    pub input: Option<PathBuf>,

    /// Model family of the conflicting record
    #[arg(long, required_unless_present = "input")]
    pub family: Option<String>,

    /// Operation that produced the conflict
    #[arg(long, value_enum, required_unless_present = "input")]
    pub op: Option<OpArg>,

    /// Local record as a JSON object
    #[arg(long, default_value = "{}")]
    pub local: String,

    /// Remote record as a JSON object
    #[arg(long, default_value = "{}")]
    pub remote: String,

    /// Use the built-in clinical app rules instead of the configured ones
    #[arg(long)]
    pub clinical: bool,

    /// Output result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "coordinator.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show conflict rules
    #[arg(long)]
    pub rules: bool,

    /// Show reset presets
    #[arg(long)]
    pub presets: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}

/// Reset mode
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeArg {
    Restart,
    ClearAndRestart,
}

impl From<ModeArg> for ResetMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Restart => ResetMode::Restart,
            ModeArg::ClearAndRestart => ResetMode::ClearAndRestart,
        }
    }
}

/// Store call
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepArg {
    Stop,
    Clear,
    Start,
}

impl From<StepArg> for ResetStep {
    fn from(step: StepArg) -> Self {
        match step {
            StepArg::Stop => ResetStep::Stop,
            StepArg::Clear => ResetStep::Clear,
            StepArg::Start => ResetStep::Start,
        }
    }
}

/// Scripted sync outcome
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncArg {
    Ready,
    Failed,
    Silent,
}

impl From<SyncArg> for ScriptedSync {
    fn from(sync: SyncArg) -> Self {
        match sync {
            SyncArg::Ready => ScriptedSync::Ready,
            SyncArg::Failed => ScriptedSync::Failed,
            SyncArg::Silent => ScriptedSync::Silent,
        }
    }
}

/// Conflict operation
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpArg {
    Create,
    Update,
    Delete,
}

impl From<OpArg> for OpType {
    fn from(op: OpArg) -> Self {
        match op {
            OpArg::Create => OpType::Create,
            OpArg::Update => OpType::Update,
            OpArg::Delete => OpType::Delete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_reset_with_injections() {
        let cli = Cli::parse_from([
            "sync-coordinator",
            "reset",
            "--mode",
            "clear-and-restart",
            "--hang",
            "stop,clear",
            "--fail",
            "start",
        ]);
        let Commands::Reset(args) = cli.command else {
            panic!("expected reset command");
        };
        assert_eq!(args.mode, Some(ModeArg::ClearAndRestart));
        assert_eq!(args.hang, [StepArg::Stop, StepArg::Clear]);
        assert_eq!(args.fail, [StepArg::Start]);
        assert!(args.preset.is_none());
    }

    #[test]
    fn test_parse_preset_accepts_dashes() {
        let cli = Cli::parse_from(["sync-coordinator", "reset", "--preset", "clear-cache-and-resync"]);
        let Commands::Reset(args) = cli.command else {
            panic!("expected reset command");
        };
        assert_eq!(args.preset, Some(ResetPreset::ClearCacheAndResync));
    }

    #[test]
    fn test_preset_conflicts_with_mode() {
        let result = Cli::try_parse_from([
            "sync-coordinator",
            "reset",
            "--preset",
            "force_full_sync",
            "--mode",
            "restart",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_requires_family_without_input() {
        assert!(Cli::try_parse_from(["sync-coordinator", "resolve", "--op", "update"]).is_err());
        assert!(Cli::try_parse_from(["sync-coordinator", "resolve", "--input", "c.json"]).is_ok());
    }
}
