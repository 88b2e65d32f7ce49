//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{CoordinatorConfig, FamilyRule, ResetStep};
use serde::Serialize;
use sync_coordinator::{canonicalize, worst_case_duration, ResetPreset};
use tracing::info;

use super::load_config;
use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    initial_sync: InitialSyncInfo,
    outbox_timeout_ms: u64,
    reset: ResetInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    rules: Vec<FamilyRule>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    backfill_keys: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    presets: Vec<PresetInfo>,
}

#[derive(Serialize)]
struct InitialSyncInfo {
    timeout_ms: u64,
    ready_events: Vec<String>,
    failure_events: Vec<String>,
}

#[derive(Serialize)]
struct ResetInfo {
    mode: String,
    wait_for_outbox_empty: bool,
    steps: Vec<StepInfo>,
    worst_case_ms: u64,
}

#[derive(Serialize)]
struct StepInfo {
    step: ResetStep,
    timeout_ms: u64,
    proceed_on_timeout: bool,
}

#[derive(Serialize)]
struct PresetInfo {
    name: ResetPreset,
    mode: String,
    settle_delay_ms: u64,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = ?args.config.config, "Loading configuration info");

    let config = load_config(&args.config)?;

    if args.json {
        let info = build_config_info(&config, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config, args);
    }

    Ok(())
}

fn canonical_events(names: &[String]) -> Vec<String> {
    names.iter().map(|name| canonicalize(name).to_string()).collect()
}

fn build_config_info(config: &CoordinatorConfig, args: &InfoArgs) -> ConfigInfo {
    let reset = &config.reset;
    let steps = reset
        .mode
        .steps()
        .iter()
        .map(|&step| {
            let policy = reset.policy(step);
            StepInfo {
                step,
                timeout_ms: policy.timeout_ms,
                proceed_on_timeout: policy.proceed_on_timeout,
            }
        })
        .collect();

    let presets = if args.presets {
        ResetPreset::ALL
            .iter()
            .map(|&preset| PresetInfo {
                name: preset,
                mode: preset.options().mode.as_str().to_string(),
                settle_delay_ms: preset.settle_delay().as_millis() as u64,
            })
            .collect()
    } else {
        Vec::new()
    };

    let (rules, backfill_keys) = if args.rules {
        (
            config.conflict.families.clone(),
            config.conflict.backfill_keys.clone(),
        )
    } else {
        (Vec::new(), Vec::new())
    };

    ConfigInfo {
        version: format!("{:?}", config.version),
        initial_sync: InitialSyncInfo {
            timeout_ms: config.initial_sync.timeout_ms,
            ready_events: canonical_events(&config.initial_sync.ready_events),
            failure_events: canonical_events(&config.initial_sync.failure_events),
        },
        outbox_timeout_ms: config.outbox.timeout_ms,
        reset: ResetInfo {
            mode: reset.mode.as_str().to_string(),
            wait_for_outbox_empty: reset.wait_for_outbox_empty,
            steps,
            worst_case_ms: worst_case_duration(reset).as_millis() as u64,
        },
        rules,
        backfill_keys,
        presets,
    }
}

fn print_config_info(config: &CoordinatorConfig, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║             Sync Coordinator Configuration                   ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let sync = &config.initial_sync;
    println!("⏳ Initial Sync");
    println!("   ├─ Version: {:?}", config.version);
    println!("   ├─ Timeout: {} ms", sync.timeout_ms);
    println!("   ├─ Ready on: {}", canonical_events(&sync.ready_events).join(", "));
    println!("   └─ Failed on: {}", canonical_events(&sync.failure_events).join(", "));

    let reset = &config.reset;
    println!("\n🔄 Reset ({})", reset.mode.as_str());
    if reset.wait_for_outbox_empty {
        println!("   ├─ Outbox wait: {} ms", reset.outbox_timeout_ms);
    } else {
        println!("   ├─ Outbox wait: disabled");
    }
    for &step in reset.mode.steps() {
        let policy = reset.policy(step);
        let on_timeout = if policy.proceed_on_timeout { "proceed" } else { "abort" };
        println!("   ├─ {}: {} ms, {} on timeout", step.label(), policy.timeout_ms, on_timeout);
    }
    println!("   └─ Worst case: {} ms", worst_case_duration(reset).as_millis());

    let conflict = &config.conflict;
    println!("\n⚖️  Conflict Rules ({})", conflict.families.len());
    if args.rules {
        for (i, rule) in conflict.families.iter().enumerate() {
            let is_last = i == conflict.families.len() - 1;
            let prefix = if is_last { "└─" } else { "├─" };
            let merge = match &rule.update_merge {
                Some(merge) => format!(
                    ", merge local={:?} remote={:?}",
                    merge.prefer_local, merge.prefer_remote
                ),
                None => String::new(),
            };
            println!(
                "   {} {} (identified by {}{})",
                prefix,
                rule.family,
                rule.identifying_fields.join("/"),
                merge
            );
        }
        if !conflict.backfill_keys.is_empty() {
            println!("   Backfill: {}", conflict.backfill_keys.join(", "));
        }
    }

    if args.presets {
        println!("\n🧰 Presets");
        for preset in ResetPreset::ALL {
            println!(
                "   • {} ({}, settle {} ms)",
                preset,
                preset.options().mode.as_str(),
                preset.settle_delay().as_millis()
            );
        }
    }

    println!();
}
