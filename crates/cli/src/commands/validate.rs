//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{CoordinatorConfig, ResetStep};
use serde::Serialize;
use sync_coordinator::worst_case_duration;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    initial_sync_timeout_ms: u64,
    reset_mode: String,
    reset_worst_case_ms: u64,
    family_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    initial_sync_timeout_ms: config.initial_sync.timeout_ms,
                    reset_mode: config.reset.mode.as_str().to_string(),
                    reset_worst_case_ms: worst_case_duration(&config.reset).as_millis() as u64,
                    family_count: config.conflict.families.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &CoordinatorConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.conflict.families.is_empty() {
        warnings.push("No conflict rules configured - remote always wins".to_string());
    }

    for step in [ResetStep::Clear, ResetStep::Start] {
        if config.reset.policy(step).proceed_on_timeout {
            warnings.push(format!(
                "reset.{} proceeds on timeout - a hung {} is reported as success",
                step.as_str(),
                step.label()
            ));
        }
    }

    if config.reset.wait_for_outbox_empty
        && config.reset.outbox_timeout_ms >= config.initial_sync.timeout_ms
    {
        warnings.push(
            "reset.outbox_timeout_ms is not shorter than initial_sync.timeout_ms".to_string(),
        );
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Initial sync timeout: {} ms", summary.initial_sync_timeout_ms);
            println!("  Reset mode: {}", summary.reset_mode);
            println!("  Reset worst case: {} ms", summary.reset_worst_case_ms);
            println!("  Conflict families: {}", summary.family_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
