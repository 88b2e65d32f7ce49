//! Conflict resolution policy.
//!
//! Pure decision function over (local, remote, operation). Families without a rule
//! resolve remote-wins. Families with a rule get DELETE protection: a remote tombstone is
//! never resurrected, and a stale local shadow (no identifying fields) is tombstoned
//! instead of being written back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use contracts::{
    ConflictContext, ConflictDecision, ConflictHandler, ConflictPolicyConfig, ConflictRegistry,
    DecisionSource, FamilyRule, LifecycleTelemetry, OpType, Record, UpdateMerge, DELETED_FIELD,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::telemetry::TracingTelemetry;

/// JavaScript-style truthiness of an optional field
///
/// Absent, `null`, `false`, `0`, `NaN` and `""` are falsy; everything else is truthy.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

fn is_present(value: Option<&Value>) -> bool {
    !matches!(value, None | Some(Value::Null))
}

/// Conflict resolution policy
pub struct ConflictPolicy {
    config: ConflictPolicyConfig,
    telemetry: Arc<dyn LifecycleTelemetry>,
    installed: AtomicBool,
}

impl Default for ConflictPolicy {
    fn default() -> Self {
        Self::new(ConflictPolicyConfig::default())
    }
}

impl std::fmt::Debug for ConflictPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConflictPolicy")
            .field("config", &self.config)
            .field("installed", &self.is_installed())
            .finish()
    }
}

impl ConflictPolicy {
    /// Policy reporting through tracing
    pub fn new(config: ConflictPolicyConfig) -> Self {
        Self::with_telemetry(config, Arc::new(TracingTelemetry))
    }

    pub fn with_telemetry(
        config: ConflictPolicyConfig,
        telemetry: Arc<dyn LifecycleTelemetry>,
    ) -> Self {
        Self {
            config,
            telemetry,
            installed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &ConflictPolicyConfig {
        &self.config
    }

    /// Pick the authoritative record for `conflict`
    ///
    /// Never fails. The decision is computed fresh on every call.
    pub fn resolve(&self, conflict: &ConflictContext) -> ConflictDecision {
        let decision = match self.config.rule_for(&conflict.model_family) {
            None => self.remote_wins(conflict),
            Some(rule) => match conflict.operation {
                OpType::Delete => self.resolve_delete(rule, conflict),
                OpType::Update => match &rule.update_merge {
                    Some(merge) => self.merge_update(merge, conflict),
                    None => self.remote_wins(conflict),
                },
                OpType::Create => self.remote_wins(conflict),
            },
        };

        debug!(
            model = %conflict.model_family,
            operation = %conflict.operation,
            attempts = conflict.attempts,
            source = decision.source.as_str(),
            "conflict resolved"
        );
        self.telemetry.conflict_resolved(conflict, decision.source);
        decision
    }

    fn remote_wins(&self, conflict: &ConflictContext) -> ConflictDecision {
        ConflictDecision {
            source: DecisionSource::Remote,
            record: self.backfill(conflict.remote.clone(), &conflict.local),
        }
    }

    fn resolve_delete(&self, rule: &FamilyRule, conflict: &ConflictContext) -> ConflictDecision {
        // a remote tombstone passes through untouched
        if is_truthy(conflict.remote.get(DELETED_FIELD)) {
            return ConflictDecision {
                source: DecisionSource::Remote,
                record: conflict.remote.clone(),
            };
        }

        // no identifying fields means nothing can mark the local record as stale
        let incomplete = !rule.identifying_fields.is_empty()
            && rule
                .identifying_fields
                .iter()
                .all(|field| !is_truthy(conflict.local.get(field)));

        if incomplete {
            let mut tombstone = conflict.remote.clone();
            tombstone.insert(DELETED_FIELD.to_string(), Value::Bool(true));
            ConflictDecision {
                source: DecisionSource::Tombstone,
                record: self.backfill(tombstone, &conflict.local),
            }
        } else {
            ConflictDecision {
                source: DecisionSource::Local,
                record: self.backfill(conflict.local.clone(), &conflict.remote),
            }
        }
    }

    fn merge_update(&self, merge: &UpdateMerge, conflict: &ConflictContext) -> ConflictDecision {
        let (local, remote) = (&conflict.local, &conflict.remote);
        let mut merged = remote.clone();

        let mut take = |field: &String, first: &Record, second: &Record| {
            let value = [first.get(field), second.get(field)]
                .into_iter()
                .find(|v| is_truthy(*v))
                .flatten()
                .or_else(|| second.get(field));
            match value {
                Some(value) => {
                    merged.insert(field.clone(), value.clone());
                }
                None => {
                    merged.remove(field);
                }
            }
        };

        for field in &merge.prefer_local {
            take(field, local, remote);
        }
        for field in &merge.prefer_remote {
            take(field, remote, local);
        }

        ConflictDecision {
            source: DecisionSource::Merged,
            record: self.backfill(merged, local),
        }
    }

    /// Copy configured key fields from `other` where `record` has none
    fn backfill(&self, mut record: Record, other: &Record) -> Record {
        for key in &self.config.backfill_keys {
            if is_present(record.get(key)) {
                continue;
            }
            if let Some(value) = other.get(key).filter(|v| is_present(Some(*v))) {
                record.insert(key.clone(), value.clone());
            }
        }
        record
    }

    /// Register this policy on `registry`
    ///
    /// Only the first call registers; later calls are logged no-ops. Returns whether
    /// this call registered.
    pub fn install<R>(self: &Arc<Self>, registry: &R) -> bool
    where
        R: ConflictRegistry + ?Sized,
    {
        if self.installed.swap(true, Ordering::SeqCst) {
            debug!("conflict policy already installed, skipping");
            return false;
        }

        registry.register_conflict_handler(Arc::clone(self) as Arc<dyn ConflictHandler>);
        info!(
            families = ?self.config.families.iter().map(|r| r.family.as_str()).collect::<Vec<_>>(),
            "conflict policy installed"
        );
        true
    }

    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::SeqCst)
    }
}

impl ConflictHandler for ConflictPolicy {
    fn resolve(&self, conflict: &ConflictContext) -> Record {
        ConflictPolicy::resolve(self, conflict).into_record()
    }
}

/// Family rules the clinical task app ships with
///
/// Task UPDATEs keep local progress (status, answers) and remote scheduling times.
pub fn clinical_app_rules() -> ConflictPolicyConfig {
    let pk_sk = ["pk", "sk"];
    let mut families = vec![
        FamilyRule::new("Task", &["title", "description"]).with_update_merge(UpdateMerge {
            prefer_local: ["status", "activityAnswer", "activityResponse"]
                .map(String::from)
                .to_vec(),
            prefer_remote: [
                "startTimeInMillSec",
                "expireTimeInMillSec",
                "endTimeInMillSec",
            ]
            .map(String::from)
            .to_vec(),
        }),
        FamilyRule::new("Activity", &["name", "title"]),
        FamilyRule::new("Question", &["question", "questionId"]),
    ];
    families.extend(
        [
            "DataPoint",
            "DataPointInstance",
            "TaskAnswer",
            "TaskResult",
            "TaskHistory",
        ]
        .into_iter()
        .map(|family| FamilyRule::new(family, &pk_sk)),
    );

    ConflictPolicyConfig {
        families,
        backfill_keys: ["pk", "sk", "id"].map(String::from).to_vec(),
    }
}
