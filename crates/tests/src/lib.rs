//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 模拟存储上的 e2e 生命周期测试（配置 → 等待 → 重置 → 冲突裁决）

#[cfg(test)]
mod contract_tests {
    use contracts::{raw_notification, CoordinatorConfig, ResetMode, ResetResult, StepOutcome};
    use serde_json::json;

    #[test]
    fn test_config_serde_round_trip() {
        let mut config = CoordinatorConfig {
            conflict: sync_coordinator::clinical_app_rules(),
            ..Default::default()
        };
        config.reset.mode = ResetMode::ClearAndRestart;
        config.initial_sync.timeout_ms = 9_000;

        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["reset"]["mode"], "clear_and_restart");
        assert_eq!(value["initial_sync"]["timeout_ms"], 9_000);
        assert_eq!(value["conflict"]["families"][0]["family"], "Task");

        let reloaded: CoordinatorConfig = serde_json::from_value(value).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_raw_notification_shape() {
        let raw = raw_notification("outboxStatus", json!({ "isEmpty": true }));
        assert_eq!(
            raw,
            json!({ "payload": { "event": "outboxStatus", "data": { "isEmpty": true } } })
        );
    }

    #[test]
    fn test_reset_result_wire_format() {
        let result = ResetResult {
            outbox_empty_observed: false,
            stop: StepOutcome::TimedOut,
            clear: None,
            start: StepOutcome::Ok,
        };
        assert_eq!(
            serde_json::to_value(result).unwrap(),
            json!({ "outbox_empty_observed": false, "stop": "timed_out", "start": "ok" })
        );
    }

    #[test]
    fn test_default_config_snapshot() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.initial_sync.timeout_ms, 15_000);
        assert_eq!(config.outbox.timeout_ms, 2_000);
        assert_eq!(config.reset.mode, ResetMode::Restart);
        assert!(config.reset.wait_for_outbox_empty);
        assert!(config.reset.stop.proceed_on_timeout);
        assert!(!config.reset.clear.proceed_on_timeout);
        assert!(!config.reset.start.proceed_on_timeout);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Duration;

    use config_loader::ConfigLoader;
    use contracts::{
        ConflictContext, CoordinatorConfig, DataStore, OpType, ResetMode, ResetOptions,
        ResetStep, StepOutcome, SyncOutcome, DATASTORE_CHANNEL,
    };
    use observability::MetricsTelemetry;
    use serde_json::{json, Value};
    use store_harness::{InProcessBus, SimulatedStore, StepBehavior, StoreState, SyncScript};
    use sync_coordinator::{
        clinical_app_rules, LifecycleCoordinator, ResetPreset, SyncState,
    };
    use tokio::time::Instant;

    fn record(value: Value) -> contracts::Record {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn coordinator(
        bus: &InProcessBus,
        config: CoordinatorConfig,
    ) -> (LifecycleCoordinator<InProcessBus>, Arc<MetricsTelemetry>) {
        let telemetry = Arc::new(MetricsTelemetry::new());
        let coordinator = LifecycleCoordinator::with_telemetry(
            bus.clone(),
            config,
            Arc::clone(&telemetry) as Arc<dyn contracts::LifecycleTelemetry>,
        );
        (coordinator, telemetry)
    }

    /// End-to-end: config file -> coordinator -> store start -> initial sync ready
    #[tokio::test(start_paused = true)]
    async fn test_e2e_config_file_to_initial_sync() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[initial_sync]\ntimeout_ms = 3000").unwrap();
        let config = ConfigLoader::load_from_path(file.path()).unwrap();

        let bus = InProcessBus::new();
        let store = SimulatedStore::new()
            .with_bus(bus.clone(), SyncScript::ready_after(Duration::from_millis(800)));
        let (coordinator, telemetry) = coordinator(&bus, config);

        let started = Instant::now();
        let (result, start) = tokio::join!(coordinator.wait_for_initial_sync(), store.start());
        start.unwrap();

        assert_eq!(result.outcome, SyncOutcome::Ready);
        assert_eq!(result.event.as_deref(), Some("syncQueriesReady"));
        assert!(started.elapsed() < Duration::from_millis(3000));
        assert_eq!(bus.listener_count(DATASTORE_CHANNEL), 0);
        assert_eq!(telemetry.summary().sync_ready, 1);
    }

    /// Full recovery: outbox drains, store is wiped and restarted, sync completes again
    #[tokio::test(start_paused = true)]
    async fn test_e2e_clear_and_restart_recovery() {
        let bus = InProcessBus::new();
        let store = Arc::new(
            SimulatedStore::new()
                .with_records(10)
                .with_pending_writes(3)
                .with_bus(bus.clone(), SyncScript::ready_after(Duration::from_millis(300))),
        );
        let (coordinator, telemetry) = coordinator(&bus, CoordinatorConfig::default());
        let tracker = coordinator.track_status();

        let options = ResetOptions::new(ResetMode::ClearAndRestart);
        let (result, ()) = tokio::join!(
            coordinator.reset_local_store(Arc::clone(&store), &options),
            async { store.drain_outbox(Duration::from_millis(100)) }
        );
        let result = result.unwrap();

        assert!(result.outbox_empty_observed);
        assert_eq!(result.stop, StepOutcome::Ok);
        assert_eq!(result.clear, Some(StepOutcome::Ok));
        assert_eq!(result.start, StepOutcome::Ok);
        assert_eq!(
            store.calls(),
            [ResetStep::Stop, ResetStep::Clear, ResetStep::Start]
        );
        assert_eq!(store.record_count(), 0);
        assert_eq!(store.pending_writes(), 0);
        assert_eq!(store.state(), StoreState::Running);

        let sync = coordinator.wait_for_initial_sync().await;
        assert!(sync.is_ready());

        let status = tracker.snapshot();
        assert_eq!(status.sync_state, SyncState::Synced);
        assert!(status.is_ready);
        assert_eq!(status.outbox_empty, Some(true));

        tracker.detach();
        assert_eq!(bus.listener_count(DATASTORE_CHANNEL), 0);

        let summary = telemetry.summary();
        assert_eq!(summary.resets, 1);
        assert_eq!(summary.outbox_empty, 1);
        assert_eq!(summary.sync_ready, 1);
    }

    /// A hung clear aborts the reset: start is never attempted, the store stays stopped
    #[tokio::test(start_paused = true)]
    async fn test_e2e_hung_clear_aborts_before_start() {
        let bus = InProcessBus::new();
        let store = Arc::new(
            SimulatedStore::new()
                .with_records(5)
                .with_step(ResetStep::Clear, StepBehavior::Hang)
                .with_bus(bus.clone(), SyncScript::silent()),
        );
        let (coordinator, telemetry) = coordinator(&bus, CoordinatorConfig::default());

        let options = ResetOptions::new(ResetMode::ClearAndRestart).skip_outbox_wait();
        let started = Instant::now();
        let err = coordinator
            .reset_local_store(Arc::clone(&store), &options)
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(err.step(), ResetStep::Clear);
        assert!(started.elapsed() >= Duration::from_millis(5_000));
        assert_eq!(store.calls(), [ResetStep::Stop, ResetStep::Clear]);
        assert_eq!(store.state(), StoreState::Stopped);
        assert_eq!(store.record_count(), 5);

        let summary = telemetry.summary();
        assert_eq!(summary.steps_aborted, 1);
        assert_eq!(summary.resets, 0);
    }

    /// A hung stop proceeds; the whole reset stays within its worst-case bound
    #[tokio::test(start_paused = true)]
    async fn test_e2e_hung_stop_is_bounded() {
        let bus = InProcessBus::new();
        let store = Arc::new(
            SimulatedStore::new()
                .with_step(ResetStep::Stop, StepBehavior::Hang)
                .with_bus(bus.clone(), SyncScript::ready_after(Duration::from_millis(50))),
        );
        let (coordinator, _telemetry) = coordinator(&bus, CoordinatorConfig::default());

        let options = ResetOptions::default();
        let started = Instant::now();
        let result = coordinator
            .reset_local_store(Arc::clone(&store), &options)
            .await
            .unwrap();

        assert_eq!(result.stop, StepOutcome::TimedOut);
        assert!(!result.outbox_empty_observed);
        assert!(result.any_timed_out());
        assert!(started.elapsed() <= sync_coordinator::worst_case_duration(&options));
        assert_eq!(store.completed(), [ResetStep::Start]);
    }

    /// Preset runs its reset, then holds for the settle delay
    #[tokio::test(start_paused = true)]
    async fn test_e2e_preset_settles() {
        let bus = InProcessBus::new();
        let store = Arc::new(
            SimulatedStore::new()
                .with_records(2)
                .with_bus(bus.clone(), SyncScript::ready_after(Duration::from_millis(100))),
        );
        let (coordinator, _telemetry) = coordinator(&bus, CoordinatorConfig::default());
        let tracker = coordinator.track_status();

        let started = Instant::now();
        let (result, ()) = tokio::join!(
            coordinator.run_preset(ResetPreset::ClearCacheAndResync, Arc::clone(&store)),
            async { store.drain_outbox(Duration::from_millis(10)) }
        );
        let result = result.unwrap();

        assert_eq!(result.clear, Some(StepOutcome::Ok));
        assert!(started.elapsed() >= Duration::from_millis(5_000));
        assert_eq!(store.record_count(), 0);
        // background sync finished during the settle delay
        assert!(tracker.snapshot().is_ready);
    }

    /// Engine-side conflicts go through the installed clinical policy
    #[tokio::test]
    async fn test_e2e_conflict_policy_through_engine_hook() {
        let bus = InProcessBus::new();
        let store = SimulatedStore::new().with_bus(bus.clone(), SyncScript::silent());
        let config = CoordinatorConfig {
            conflict: clinical_app_rules(),
            ..Default::default()
        };
        let (coordinator, telemetry) = coordinator(&bus, config);
        let tracker = coordinator.track_status();

        assert!(coordinator.install_conflict_policy(&store));
        assert!(!coordinator.install_conflict_policy(&store));
        assert_eq!(store.handler_registrations(), 1);

        let merged = store
            .simulate_conflict(&ConflictContext {
                model_family: "Task".into(),
                local: record(json!({ "title": "Walk", "status": "COMPLETED", "pk": "p1" })),
                remote: record(json!({
                    "title": "Walk",
                    "status": "OPEN",
                    "startTimeInMillSec": 100,
                    "sk": "s1"
                })),
                operation: OpType::Update,
                attempts: 1,
            })
            .unwrap();
        assert_eq!(
            Value::Object(merged),
            json!({
                "title": "Walk",
                "status": "COMPLETED",
                "startTimeInMillSec": 100,
                "pk": "p1",
                "sk": "s1"
            })
        );

        let passthrough = store
            .simulate_conflict(&ConflictContext {
                model_family: "DataPoint".into(),
                local: record(json!({ "value": 1 })),
                remote: record(json!({ "pk": "p", "sk": "s", "_deleted": true })),
                operation: OpType::Delete,
                attempts: 0,
            })
            .unwrap();
        assert_eq!(
            Value::Object(passthrough),
            json!({ "pk": "p", "sk": "s", "_deleted": true })
        );

        assert_eq!(tracker.snapshot().conflict_count, 2);
        assert_eq!(telemetry.summary().conflicts, 2);
    }

    /// Noise on the channel never resolves a waiter
    #[tokio::test(start_paused = true)]
    async fn test_e2e_noise_is_ignored() {
        let bus = InProcessBus::new();
        let (coordinator, _telemetry) = coordinator(&bus, CoordinatorConfig::default());

        let publisher = bus.clone();
        let noise = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            publisher.publish_raw(DATASTORE_CHANNEL, &json!("garbage"));
            publisher.publish_raw(DATASTORE_CHANNEL, &json!({ "payload": { "event": "" } }));
            publisher.publish(DATASTORE_CHANNEL, "networkStatus", json!({ "active": true }));
            publisher.publish("auth", "ready", json!({}));
            tokio::time::sleep(Duration::from_millis(10)).await;
            publisher.publish(DATASTORE_CHANNEL, "syncQueriesFailed", json!({}));
        });

        let result = coordinator.wait_for_initial_sync().await;
        noise.await.unwrap();

        assert_eq!(result.outcome, SyncOutcome::Failed);
        assert_eq!(result.event.as_deref(), Some("syncQueriesError"));
    }

    /// Independent waiters each get their own subscription and timer
    #[tokio::test(start_paused = true)]
    async fn test_e2e_concurrent_waiters() {
        let bus = InProcessBus::new();
        let store = SimulatedStore::new()
            .with_bus(bus.clone(), SyncScript::ready_after(Duration::from_millis(200)));
        let (coordinator, telemetry) = coordinator(&bus, CoordinatorConfig::default());

        let (first, second, outbox, start) = tokio::join!(
            coordinator.wait_for_initial_sync(),
            coordinator.wait_for_initial_sync(),
            coordinator.wait_for_outbox_empty(),
            store.start()
        );
        start.unwrap();

        assert!(first.is_ready());
        assert!(second.is_ready());
        assert!(!outbox);
        assert_eq!(bus.listener_count(DATASTORE_CHANNEL), 0);
        assert_eq!(bus.unsubscribe_count(), 3);

        let summary = telemetry.summary();
        assert_eq!(summary.sync_ready, 2);
        assert_eq!(summary.outbox_timeout, 1);
    }
}
