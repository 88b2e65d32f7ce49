//! 生命周期指标收集模块
//!
//! 通过 `LifecycleTelemetry` 端口收集协调器的等待、重置与冲突指标。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use contracts::event_names;
use contracts::{
    ConflictContext, ContractError, DecisionSource, InitialSyncResult, LifecycleTelemetry, NormalizedEvent,
    ResetMode, ResetResult, ResetStep, StepOutcome, SyncOutcome, WaiterKind,
};
use metrics::{counter, histogram};

fn millis(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}

/// 事件名标签：已知事件取规范名，其余归为 "other"
pub fn event_label(event: &str) -> &'static str {
    event_names::known(event).unwrap_or("other")
}

/// 记录等待器观察到的事件
pub fn record_event_observed(waiter: WaiterKind, event: &str) {
    counter!(
        "sync_coordinator_events_observed_total",
        "waiter" => waiter.as_str(),
        "event" => event_label(event)
    )
    .increment(1);
}

/// 记录初始同步等待结果
pub fn record_initial_sync(outcome: SyncOutcome, elapsed: Duration) {
    counter!("sync_coordinator_initial_sync_total", "outcome" => outcome.as_str()).increment(1);
    histogram!("sync_coordinator_initial_sync_wait_ms", "outcome" => outcome.as_str())
        .record(millis(elapsed));
}

/// 记录 outbox 等待结果
pub fn record_outbox_drain(empty: bool, elapsed: Duration) {
    let result = if empty { "empty" } else { "timeout" };
    counter!("sync_coordinator_outbox_wait_total", "result" => result).increment(1);
    histogram!("sync_coordinator_outbox_wait_ms").record(millis(elapsed));
}

/// 记录单个重置步骤
pub fn record_reset_step(step: ResetStep, outcome: &'static str, elapsed: Duration) {
    counter!(
        "sync_coordinator_reset_steps_total",
        "step" => step.as_str(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("sync_coordinator_reset_step_ms", "step" => step.as_str()).record(millis(elapsed));
}

/// 记录完整重置
pub fn record_reset(mode: ResetMode, result: &ResetResult, elapsed: Duration) {
    counter!(
        "sync_coordinator_resets_total",
        "mode" => mode.as_str(),
        "degraded" => if result.any_timed_out() { "true" } else { "false" }
    )
    .increment(1);
    histogram!("sync_coordinator_reset_ms", "mode" => mode.as_str()).record(millis(elapsed));
}

/// 记录冲突裁决
pub fn record_conflict(family: &str, source: DecisionSource) {
    counter!(
        "sync_coordinator_conflicts_total",
        "model" => family.to_string(),
        "source" => source.as_str()
    )
    .increment(1);
}

/// 生命周期统计聚合器
///
/// 在内存中聚合遥测数据，便于 CLI 输出摘要。
#[derive(Debug, Clone, Default)]
pub struct LifecycleStatsAggregator {
    /// 初始同步结果计数
    pub initial_sync: HashMap<SyncOutcome, u64>,

    /// outbox 等待：观察到清空 / 超时
    pub outbox_empty: u64,
    pub outbox_timeout: u64,

    /// 重置次数（成功完成）
    pub resets: u64,

    /// 以超时继续的步骤数
    pub steps_timed_out: u64,

    /// 超时中止的步骤数
    pub steps_aborted: u64,

    /// 存储拒绝的步骤数
    pub steps_failed: u64,

    /// 各来源的冲突裁决计数
    pub conflicts: HashMap<DecisionSource, u64>,

    /// 初始同步等待耗时 (ms)
    pub initial_sync_wait: RunningStats,

    /// 重置耗时 (ms)
    pub reset_duration: RunningStats,
}

impl LifecycleStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_initial_sync(&mut self, result: &InitialSyncResult, elapsed: Duration) {
        *self.initial_sync.entry(result.outcome).or_insert(0) += 1;
        self.initial_sync_wait.push(millis(elapsed));
    }

    pub fn record_outbox_drain(&mut self, empty: bool) {
        if empty {
            self.outbox_empty += 1;
        } else {
            self.outbox_timeout += 1;
        }
    }

    pub fn record_step(&mut self, outcome: StepOutcome) {
        if outcome == StepOutcome::TimedOut {
            self.steps_timed_out += 1;
        }
    }

    pub fn record_step_aborted(&mut self) {
        self.steps_aborted += 1;
    }

    pub fn record_step_failed(&mut self) {
        self.steps_failed += 1;
    }

    pub fn record_reset(&mut self, elapsed: Duration) {
        self.resets += 1;
        self.reset_duration.push(millis(elapsed));
    }

    pub fn record_conflict(&mut self, source: DecisionSource) {
        *self.conflicts.entry(source).or_insert(0) += 1;
    }

    /// 生成摘要报告
    pub fn summary(&self) -> LifecycleSummary {
        let count = |outcome| self.initial_sync.get(&outcome).copied().unwrap_or(0);
        LifecycleSummary {
            sync_ready: count(SyncOutcome::Ready),
            sync_failed: count(SyncOutcome::Failed),
            sync_timeout: count(SyncOutcome::Timeout),
            outbox_empty: self.outbox_empty,
            outbox_timeout: self.outbox_timeout,
            resets: self.resets,
            steps_timed_out: self.steps_timed_out,
            steps_aborted: self.steps_aborted,
            steps_failed: self.steps_failed,
            conflicts: self.conflicts.values().sum(),
            initial_sync_wait_ms: StatsSummary::from(&self.initial_sync_wait),
            reset_ms: StatsSummary::from(&self.reset_duration),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 生命周期摘要
#[derive(Debug, Clone, Default)]
pub struct LifecycleSummary {
    pub sync_ready: u64,
    pub sync_failed: u64,
    pub sync_timeout: u64,
    pub outbox_empty: u64,
    pub outbox_timeout: u64,
    pub resets: u64,
    pub steps_timed_out: u64,
    pub steps_aborted: u64,
    pub steps_failed: u64,
    pub conflicts: u64,
    pub initial_sync_wait_ms: StatsSummary,
    pub reset_ms: StatsSummary,
}

impl std::fmt::Display for LifecycleSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Sync Lifecycle Summary ===")?;
        writeln!(
            f,
            "Initial sync: ready={} failed={} timeout={}",
            self.sync_ready, self.sync_failed, self.sync_timeout
        )?;
        writeln!(
            f,
            "Outbox waits: empty={} timeout={}",
            self.outbox_empty, self.outbox_timeout
        )?;
        writeln!(
            f,
            "Resets: {} (steps timed out: {}, aborted: {}, failed: {})",
            self.resets, self.steps_timed_out, self.steps_aborted, self.steps_failed
        )?;
        writeln!(f, "Conflicts resolved: {}", self.conflicts)?;
        writeln!(f, "Initial sync wait (ms): {}", self.initial_sync_wait_ms)?;
        writeln!(f, "Reset duration (ms): {}", self.reset_ms)
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count(),
            min: stats.min(),
            max: stats.max(),
            mean: stats.mean(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.count {
            0 => write!(f, "N/A"),
            n => write!(
                f,
                "min={:.1}, max={:.1}, mean={:.1} (n={n})",
                self.min, self.max, self.mean
            ),
        }
    }
}

/// 在线 min/max/mean
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningStats {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

/// `metrics`-backed telemetry port
///
/// Emits `sync_coordinator_*` counters/histograms to whatever recorder is installed
/// (none = no-op) and keeps an in-memory [`LifecycleStatsAggregator`].
#[derive(Debug, Clone, Default)]
pub struct MetricsTelemetry {
    stats: Arc<Mutex<LifecycleStatsAggregator>>,
}

impl MetricsTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_stats(&self, update: impl FnOnce(&mut LifecycleStatsAggregator)) {
        update(&mut self.stats.lock().unwrap_or_else(PoisonError::into_inner));
    }

    /// Copy of the aggregated statistics
    pub fn stats(&self) -> LifecycleStatsAggregator {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn summary(&self) -> LifecycleSummary {
        self.stats().summary()
    }
}

impl LifecycleTelemetry for MetricsTelemetry {
    fn event_observed(&self, waiter: WaiterKind, event: &NormalizedEvent) {
        record_event_observed(waiter, &event.event);
    }

    fn initial_sync_resolved(&self, result: &InitialSyncResult, elapsed: Duration) {
        record_initial_sync(result.outcome, elapsed);
        self.with_stats(|stats| stats.record_initial_sync(result, elapsed));
    }

    fn outbox_drain_resolved(&self, empty: bool, elapsed: Duration) {
        record_outbox_drain(empty, elapsed);
        self.with_stats(|stats| stats.record_outbox_drain(empty));
    }

    fn step_finished(&self, step: ResetStep, outcome: StepOutcome, elapsed: Duration) {
        record_reset_step(step, outcome.as_str(), elapsed);
        self.with_stats(|stats| stats.record_step(outcome));
    }

    fn step_aborted(&self, step: ResetStep, timeout: Duration) {
        record_reset_step(step, "aborted", timeout);
        self.with_stats(|stats| stats.record_step_aborted());
    }

    fn step_failed(&self, step: ResetStep, _error: &ContractError, elapsed: Duration) {
        record_reset_step(step, "failed", elapsed);
        self.with_stats(|stats| stats.record_step_failed());
    }

    fn reset_finished(&self, mode: ResetMode, result: &ResetResult, elapsed: Duration) {
        record_reset(mode, result, elapsed);
        self.with_stats(|stats| stats.record_reset(elapsed));
    }

    fn conflict_resolved(&self, conflict: &ConflictContext, source: DecisionSource) {
        record_conflict(&conflict.model_family, source);
        self.with_stats(|stats| stats.record_conflict(source));
    }
}
