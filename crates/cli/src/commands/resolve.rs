//! `resolve` command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};
use contracts::{ConflictContext, ConflictDecision, Record};
use observability::MetricsTelemetry;
use serde_json::Value;
use sync_coordinator::{clinical_app_rules, ConflictPolicy};
use tracing::info;

use super::load_config;
use crate::cli::ResolveArgs;
use crate::error::{CliError, Result as CliResult};

/// Execute the `resolve` command
pub fn run_resolve(args: &ResolveArgs, telemetry: Arc<MetricsTelemetry>) -> Result<()> {
    let rules = if args.clinical {
        clinical_app_rules()
    } else {
        load_config(&args.config)?.conflict
    };
    let conflict = read_conflict(args)?;

    info!(
        family = %conflict.model_family,
        operation = %conflict.operation,
        clinical = args.clinical,
        "Resolving conflict"
    );

    let policy = ConflictPolicy::with_telemetry(rules, telemetry);
    let decision = policy.resolve(&conflict);

    if args.json {
        let json =
            serde_json::to_string_pretty(&decision).context("Failed to serialize decision")?;
        println!("{}", json);
    } else {
        print_decision(&conflict, &decision);
    }
    Ok(())
}

fn read_conflict(args: &ResolveArgs) -> CliResult<ConflictContext> {
    if let Some(path) = &args.input {
        let content = std::fs::read_to_string(path)?;
        return Ok(serde_json::from_str(&content)?);
    }

    let family = args
        .family
        .clone()
        .ok_or_else(|| CliError::invalid_argument("--family", "required without --input"))?;
    let operation = args
        .op
        .ok_or_else(|| CliError::invalid_argument("--op", "required without --input"))?;

    Ok(ConflictContext {
        model_family: family,
        local: parse_record("--local", &args.local)?,
        remote: parse_record("--remote", &args.remote)?,
        operation: operation.into(),
        attempts: 0,
    })
}

fn parse_record(name: &str, raw: &str) -> CliResult<Record> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(record) => Ok(record),
        other => Err(CliError::invalid_argument(
            name,
            format!("expected a JSON object, got {other}"),
        )),
    }
}

fn print_decision(conflict: &ConflictContext, decision: &ConflictDecision) {
    println!(
        "✓ {} conflict on {} resolved: {}",
        conflict.operation,
        conflict.model_family,
        decision.source.as_str()
    );
    let keys: Vec<&str> = decision.record.keys().map(String::as_str).collect();
    println!("  Fields: {}", keys.join(", "));
    if let Some(deleted) = decision.record.get(contracts::DELETED_FIELD) {
        println!("  {}: {}", contracts::DELETED_FIELD, deleted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use contracts::{DecisionSource, OpType};
    use serde_json::json;
    use std::io::Write;

    fn resolve_args(extra: &[&str]) -> ResolveArgs {
        let argv = ["sync-coordinator", "resolve"].into_iter().chain(extra.iter().copied());
        match Cli::parse_from(argv).command {
            Commands::Resolve(args) => args,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_read_conflict_from_args() {
        let args = resolve_args(&[
            "--family",
            "Task",
            "--op",
            "delete",
            "--remote",
            r#"{"id": "t1"}"#,
        ]);
        let conflict = read_conflict(&args).unwrap();
        assert_eq!(conflict.model_family, "Task");
        assert_eq!(conflict.operation, OpType::Delete);
        assert!(conflict.local.is_empty());
        assert_eq!(conflict.remote.get("id"), Some(&json!("t1")));
    }

    #[test]
    fn test_read_conflict_rejects_non_object_record() {
        let args = resolve_args(&["--family", "Task", "--op", "update", "--local", "[1, 2]"]);
        let err = read_conflict(&args).unwrap_err();
        assert!(matches!(err, CliError::InvalidArgument { ref name, .. } if name == "--local"));
    }

    #[test]
    fn test_read_conflict_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "{}",
            json!({
                "model_family": "DataPoint",
                "operation": "delete",
                "local": { "value": 3 },
                "remote": { "pk": "p", "sk": "s" }
            })
        )
        .unwrap();

        let args = resolve_args(&["--input", file.path().to_str().unwrap()]);
        let conflict = read_conflict(&args).unwrap();
        assert_eq!(conflict.model_family, "DataPoint");
        assert_eq!(conflict.attempts, 0);
    }

    #[test]
    fn test_run_resolve_counts_conflict() {
        let telemetry = Arc::new(MetricsTelemetry::new());
        let args = resolve_args(&[
            "--clinical",
            "--family",
            "DataPoint",
            "--op",
            "delete",
            "--local",
            r#"{"value": 1}"#,
            "--remote",
            r#"{"pk": "p1", "sk": "s1"}"#,
            "--json",
        ]);
        run_resolve(&args, Arc::clone(&telemetry)).unwrap();
        assert_eq!(telemetry.summary().conflicts, 1);

        let policy = ConflictPolicy::new(clinical_app_rules());
        let decision = policy.resolve(&read_conflict(&args).unwrap());
        assert_eq!(decision.source, DecisionSource::Tombstone);
    }
}
