//! 配置校验模块
//!
//! 校验规则：
//! - 所有超时 > 0 且 <= 10 分钟
//! - ready / failure 事件集合非空，归一化后互不相交
//! - 冲突规则的 family 唯一，且每个至少有一个标识字段
//! - UPDATE 合并字段不能同时偏好本地与远端
//! - backfill key 不能为空

use std::collections::HashSet;

use contracts::{ConflictPolicyConfig, ContractError, CoordinatorConfig, InitialSyncOptions};
use contracts::event_names::canonicalize;

/// 单个超时上限 (10 分钟)
pub const MAX_TIMEOUT_MS: u64 = 10 * 60 * 1000;

/// 校验 CoordinatorConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &CoordinatorConfig) -> Result<(), ContractError> {
    validate_timeouts(config)?;
    validate_event_sets(&config.initial_sync)?;
    validate_conflict(&config.conflict)?;
    Ok(())
}

fn check_timeout(field: &str, timeout_ms: u64) -> Result<(), ContractError> {
    if timeout_ms == 0 || timeout_ms > MAX_TIMEOUT_MS {
        return Err(ContractError::config_validation(
            field,
            format!("timeout must be in 1..={MAX_TIMEOUT_MS} ms, got {timeout_ms}"),
        ));
    }
    Ok(())
}

/// 校验超时范围
fn validate_timeouts(config: &CoordinatorConfig) -> Result<(), ContractError> {
    let reset = &config.reset;
    for (field, timeout_ms) in [
        ("initial_sync.timeout_ms", config.initial_sync.timeout_ms),
        ("outbox.timeout_ms", config.outbox.timeout_ms),
        ("reset.outbox_timeout_ms", reset.outbox_timeout_ms),
        ("reset.stop.timeout_ms", reset.stop.timeout_ms),
        ("reset.clear.timeout_ms", reset.clear.timeout_ms),
        ("reset.start.timeout_ms", reset.start.timeout_ms),
    ] {
        check_timeout(field, timeout_ms)?;
    }
    Ok(())
}

fn canonical_set<'a>(
    field: &str,
    names: &'a [String],
) -> Result<HashSet<&'a str>, ContractError> {
    if names.is_empty() {
        return Err(ContractError::config_validation(field, "event list cannot be empty"));
    }
    names
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            if name.trim().is_empty() {
                Err(ContractError::config_validation(
                    format!("{field}[{idx}]"),
                    "event name cannot be blank",
                ))
            } else {
                Ok(canonicalize(name))
            }
        })
        .collect()
}

/// 校验 ready / failure 事件集合
fn validate_event_sets(options: &InitialSyncOptions) -> Result<(), ContractError> {
    let ready = canonical_set("initial_sync.ready_events", &options.ready_events)?;
    let failed = canonical_set("initial_sync.failure_events", &options.failure_events)?;

    let mut overlap: Vec<&str> = ready.intersection(&failed).copied().collect();
    if !overlap.is_empty() {
        overlap.sort_unstable();
        return Err(ContractError::config_validation(
            "initial_sync.ready_events / initial_sync.failure_events",
            format!("events listed as both ready and failure: {}", overlap.join(", ")),
        ));
    }
    Ok(())
}

/// 校验冲突规则
fn validate_conflict(conflict: &ConflictPolicyConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, rule) in conflict.families.iter().enumerate() {
        if rule.family.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("conflict.families[{idx}].family"),
                "family name cannot be empty",
            ));
        }
        if !seen.insert(rule.family.as_str()) {
            return Err(ContractError::config_validation(
                format!("conflict.families[family={}]", rule.family),
                "duplicate family",
            ));
        }
        if rule.identifying_fields.is_empty()
            || rule.identifying_fields.iter().any(|f| f.trim().is_empty())
        {
            return Err(ContractError::config_validation(
                format!("conflict.families[{}].identifying_fields", rule.family),
                "at least one non-blank identifying field is required",
            ));
        }
        if let Some(merge) = &rule.update_merge {
            let local: HashSet<_> = merge.prefer_local.iter().collect();
            if let Some(field) = merge.prefer_remote.iter().find(|f| local.contains(f)) {
                return Err(ContractError::config_validation(
                    format!("conflict.families[{}].update_merge", rule.family),
                    format!("field '{field}' cannot prefer both local and remote"),
                ));
            }
        }
    }

    if let Some(idx) = conflict.backfill_keys.iter().position(|k| k.trim().is_empty()) {
        return Err(ContractError::config_validation(
            format!("conflict.backfill_keys[{idx}]"),
            "backfill key cannot be blank",
        ));
    }
    Ok(())
}
