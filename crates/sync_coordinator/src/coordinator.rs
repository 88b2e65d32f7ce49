//! `LifecycleCoordinator` - one handle over bus, telemetry and conflict policy.

use std::sync::Arc;

use contracts::{
    ConflictRegistry, CoordinatorConfig, DataStore, InitialSyncResult, LifecycleBus,
    LifecycleTelemetry, NormalizedEvent, ResetOptions, ResetResult,
};
use tracing::debug;

use crate::bus::{subscribe, Subscription};
use crate::conflict::ConflictPolicy;
use crate::initial_sync::wait_for_initial_sync_with;
use crate::outbox::wait_for_outbox_empty_with;
use crate::preset::{run_preset_with, ResetPreset};
use crate::reset::{reset_local_store_with, ResetError};
use crate::status::SyncStatusTracker;
use crate::telemetry::TracingTelemetry;

/// Lifecycle coordinator
///
/// Holds no per-wait state: each call creates its own subscription and timer and tears
/// them down before returning.
///
/// # Example
///
/// ```ignore
/// let coordinator = LifecycleCoordinator::new(bus, config);
/// coordinator.install_conflict_policy(&engine);
/// let sync = coordinator.wait_for_initial_sync().await;
/// if !sync.is_ready() {
///     coordinator.reset_local_store(store, &ResetOptions::default()).await?;
/// }
/// ```
pub struct LifecycleCoordinator<B: LifecycleBus> {
    bus: B,
    config: CoordinatorConfig,
    telemetry: Arc<dyn LifecycleTelemetry>,
    conflict_policy: Arc<ConflictPolicy>,
}

impl<B: LifecycleBus> LifecycleCoordinator<B> {
    /// Coordinator reporting through tracing
    pub fn new(bus: B, config: CoordinatorConfig) -> Self {
        Self::with_telemetry(bus, config, Arc::new(TracingTelemetry))
    }

    pub fn with_telemetry(
        bus: B,
        config: CoordinatorConfig,
        telemetry: Arc<dyn LifecycleTelemetry>,
    ) -> Self {
        let conflict_policy = Arc::new(ConflictPolicy::with_telemetry(
            config.conflict.clone(),
            Arc::clone(&telemetry),
        ));
        Self {
            bus,
            config,
            telemetry,
            conflict_policy,
        }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn conflict_policy(&self) -> &Arc<ConflictPolicy> {
        &self.conflict_policy
    }

    /// Subscribe `handler` to normalized lifecycle events
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(NormalizedEvent) + Send + Sync + 'static,
    {
        subscribe(&self.bus, handler)
    }

    /// Wait for initial sync using the configured options
    pub async fn wait_for_initial_sync(&self) -> InitialSyncResult {
        wait_for_initial_sync_with(
            &self.bus,
            &self.config.initial_sync,
            Arc::clone(&self.telemetry),
        )
        .await
    }

    /// Wait for the outbox to drain using the configured options
    pub async fn wait_for_outbox_empty(&self) -> bool {
        wait_for_outbox_empty_with(&self.bus, &self.config.outbox, Arc::clone(&self.telemetry))
            .await
    }

    /// Reset `store` with explicit options
    pub async fn reset_local_store<S>(
        &self,
        store: Arc<S>,
        options: &ResetOptions,
    ) -> Result<ResetResult, ResetError>
    where
        S: DataStore + Send + Sync + 'static,
    {
        reset_local_store_with(store, &self.bus, options, Arc::clone(&self.telemetry)).await
    }

    /// Reset `store` with the configured options
    pub async fn reset_with_config<S>(&self, store: Arc<S>) -> Result<ResetResult, ResetError>
    where
        S: DataStore + Send + Sync + 'static,
    {
        let options = self.config.reset;
        self.reset_local_store(store, &options).await
    }

    /// Run a named reset preset, including its settle delay
    pub async fn run_preset<S>(
        &self,
        preset: ResetPreset,
        store: Arc<S>,
    ) -> Result<ResetResult, ResetError>
    where
        S: DataStore + Send + Sync + 'static,
    {
        run_preset_with(preset, store, &self.bus, Arc::clone(&self.telemetry)).await
    }

    /// Start tracking sync status
    pub fn track_status(&self) -> SyncStatusTracker {
        SyncStatusTracker::attach(&self.bus)
    }

    /// Register the conflict policy on the engine (first call only)
    pub fn install_conflict_policy<R>(&self, registry: &R) -> bool
    where
        R: ConflictRegistry + ?Sized,
    {
        let installed = self.conflict_policy.install(registry);
        debug!(installed, "install conflict policy requested");
        installed
    }
}
