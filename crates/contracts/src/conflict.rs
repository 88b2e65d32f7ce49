//! Conflict resolution contracts - engine callback shape and policy configuration.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Loosely-typed engine record
pub type Record = Map<String, Value>;

/// Tombstone marker field
pub const DELETED_FIELD: &str = "_deleted";

/// Mutation kind that produced a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpType {
    Create,
    Update,
    Delete,
}

impl OpType {
    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            OpType::Create => "create",
            OpType::Update => "update",
            OpType::Delete => "delete",
        }
    }
}

impl fmt::Display for OpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One local/remote disagreement, as handed over by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictContext {
    /// Model family identifier (e.g. "DataPoint")
    pub model_family: String,
    /// Proposed local record
    pub local: Record,
    /// Incoming remote record
    pub remote: Record,
    /// Operation kind
    pub operation: OpType,
    /// Retry attempt count
    #[serde(default)]
    pub attempts: u32,
}

/// Which side the accepted record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    /// Remote record, unchanged (apart from key backfill)
    Remote,
    /// Local record, unchanged (apart from key backfill)
    Local,
    /// Remote record marked deleted
    Tombstone,
    /// Field-level merge of both sides
    Merged,
}

impl DecisionSource {
    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionSource::Remote => "remote",
            DecisionSource::Local => "local",
            DecisionSource::Tombstone => "tombstone",
            DecisionSource::Merged => "merged",
        }
    }
}

/// Record chosen as authoritative for one conflict
///
/// Computed fresh per conflict, never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictDecision {
    /// Where the record came from
    pub source: DecisionSource,
    /// The accepted record
    pub record: Record,
}

impl ConflictDecision {
    /// Consume and return the accepted record
    pub fn into_record(self) -> Record {
        self.record
    }
}

/// Conflict callback invoked by the storage engine
///
/// Must never fail: every conflict yields a concrete record.
pub trait ConflictHandler: Send + Sync {
    /// Pick the authoritative record for `conflict`
    fn resolve(&self, conflict: &ConflictContext) -> Record;
}

/// Engine hook accepting a conflict handler
pub trait ConflictRegistry {
    /// Register `handler`, replacing any previous one
    fn register_conflict_handler(&self, handler: Arc<dyn ConflictHandler>);
}

/// Field preferences applied to UPDATE conflicts of one family
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateMerge {
    /// Fields taken from local when truthy there, else from remote
    pub prefer_local: Vec<String>,
    /// Fields taken from remote when truthy there, else from local
    pub prefer_remote: Vec<String>,
}

/// Specialized handling for one model family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyRule {
    /// Model family identifier
    pub family: String,

    /// Fields identifying a complete local record.
    ///
    /// A local record lacking all of them is a stale/partial shadow.
    pub identifying_fields: Vec<String>,

    /// Optional UPDATE merge (remote wins outright when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_merge: Option<UpdateMerge>,
}

impl FamilyRule {
    /// Rule without an UPDATE merge
    pub fn new(family: impl Into<String>, identifying_fields: &[&str]) -> Self {
        Self {
            family: family.into(),
            identifying_fields: identifying_fields.iter().map(|f| f.to_string()).collect(),
            update_merge: None,
        }
    }

    /// Attach an UPDATE merge
    pub fn with_update_merge(mut self, merge: UpdateMerge) -> Self {
        self.update_merge = Some(merge);
        self
    }
}

/// Conflict policy configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictPolicyConfig {
    /// Specialized families; all others resolve remote-wins
    pub families: Vec<FamilyRule>,

    /// Key fields copied from the other side when missing on the accepted record
    pub backfill_keys: Vec<String>,
}

impl Default for ConflictPolicyConfig {
    fn default() -> Self {
        Self {
            families: vec![FamilyRule::new("DataPoint", &["pk", "sk"])],
            backfill_keys: Vec::new(),
        }
    }
}

impl ConflictPolicyConfig {
    /// Find the rule for `family`
    pub fn rule_for(&self, family: &str) -> Option<&FamilyRule> {
        self.families.iter().find(|rule| rule.family == family)
    }
}
