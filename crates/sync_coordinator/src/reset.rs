//! Reset orchestrator - bounded-time stop → [clear] → start sequence.
//!
//! Steps run strictly in order, never concurrently. Each step races its store call
//! against a deadline; a call that loses the race is never cancelled, it is moved onto a
//! detached task and left to finish on its own.
//!
//! The sequence is not transactional and is not serialized against concurrent
//! invocations. Callers that may reset from several places must serialize themselves.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use contracts::{
    ContractError, DataStore, LifecycleBus, LifecycleTelemetry, ResetMode, ResetOptions,
    ResetResult, ResetStep, StepOutcome, StepPolicy,
};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::outbox::wait_for_outbox_empty_with;
use crate::race::{race_deadline, Race};

/// In-flight store call
type StepFuture = Pin<Box<dyn Future<Output = Result<(), ContractError>> + Send>>;

/// Reset failure
#[derive(Debug, Error)]
pub enum ResetError {
    /// A step with abort policy hit its deadline
    #[error("{} timed out after {timeout_ms}ms", step.label())]
    StepTimeout { step: ResetStep, timeout_ms: u64 },

    /// The store rejected a step
    #[error("{} failed: {source}", step.label())]
    Store {
        step: ResetStep,
        #[source]
        source: ContractError,
    },
}

impl ResetError {
    /// Step the sequence stopped at
    pub fn step(&self) -> ResetStep {
        match self {
            ResetError::StepTimeout { step, .. } | ResetError::Store { step, .. } => *step,
        }
    }

    /// Whether this is a deadline failure rather than a store rejection
    pub fn is_timeout(&self) -> bool {
        matches!(self, ResetError::StepTimeout { .. })
    }
}

fn step_future<S>(store: &Arc<S>, step: ResetStep) -> StepFuture
where
    S: DataStore + Send + Sync + 'static,
{
    let store = Arc::clone(store);
    match step {
        ResetStep::Stop => Box::pin(async move { store.stop().await }),
        ResetStep::Clear => Box::pin(async move { store.clear().await }),
        ResetStep::Start => Box::pin(async move { store.start().await }),
    }
}

/// Let a timed-out store call run to completion on its own
fn detach(step: ResetStep, action: StepFuture) {
    tokio::spawn(async move {
        match action.await {
            Ok(()) => debug!(step = step.as_str(), "timed-out step completed late"),
            Err(e) => warn!(step = step.as_str(), error = %e, "timed-out step failed late"),
        }
    });
}

/// Run one step under `policy`
pub(crate) async fn run_step(
    step: ResetStep,
    action: StepFuture,
    policy: StepPolicy,
    telemetry: &dyn LifecycleTelemetry,
) -> Result<StepOutcome, ResetError> {
    let started = Instant::now();
    let mut action = action;

    match race_deadline(&mut action, policy.timeout()).await {
        Race::Settled(Ok(())) => {
            debug!(
                step = step.as_str(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "step completed"
            );
            telemetry.step_finished(step, StepOutcome::Ok, started.elapsed());
            Ok(StepOutcome::Ok)
        }
        Race::Settled(Err(source)) => {
            error!(step = step.as_str(), error = %source, "step failed");
            telemetry.step_failed(step, &source, started.elapsed());
            Err(ResetError::Store { step, source })
        }
        Race::Expired => {
            detach(step, action);
            if policy.proceed_on_timeout {
                warn!(
                    step = step.as_str(),
                    timeout_ms = policy.timeout_ms,
                    "step timed out, proceeding"
                );
                telemetry.step_finished(step, StepOutcome::TimedOut, started.elapsed());
                Ok(StepOutcome::TimedOut)
            } else {
                error!(
                    step = step.as_str(),
                    timeout_ms = policy.timeout_ms,
                    "step timed out, aborting reset"
                );
                telemetry.step_aborted(step, policy.timeout());
                Err(ResetError::StepTimeout {
                    step,
                    timeout_ms: policy.timeout_ms,
                })
            }
        }
    }
}

/// Reset the local store: optional outbox wait, then stop → [clear] → start
#[instrument(
    name = "reset_local_store",
    skip(store, bus, options, telemetry),
    fields(mode = %options.mode)
)]
pub async fn reset_local_store_with<S, B>(
    store: Arc<S>,
    bus: &B,
    options: &ResetOptions,
    telemetry: Arc<dyn LifecycleTelemetry>,
) -> Result<ResetResult, ResetError>
where
    S: DataStore + Send + Sync + 'static,
    B: LifecycleBus + ?Sized,
{
    let started = Instant::now();

    let outbox_empty_observed = if options.wait_for_outbox_empty {
        wait_for_outbox_empty_with(bus, &options.outbox_wait(), Arc::clone(&telemetry)).await
    } else {
        false
    };

    let port: &dyn LifecycleTelemetry = telemetry.as_ref();
    let run = move |step: ResetStep| {
        run_step(step, step_future(&store, step), options.policy(step), port)
    };

    let stop = run(ResetStep::Stop).await?;
    let clear = match options.mode {
        ResetMode::ClearAndRestart => Some(run(ResetStep::Clear).await?),
        ResetMode::Restart => None,
    };
    let start = run(ResetStep::Start).await?;

    let result = ResetResult {
        outbox_empty_observed,
        stop,
        clear,
        start,
    };

    info!(
        outbox_empty_observed,
        stop = stop.as_str(),
        clear = ?clear.map(|c| c.as_str()),
        start = start.as_str(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "local store reset complete"
    );
    telemetry.reset_finished(options.mode, &result, started.elapsed());
    Ok(result)
}

/// Upper bound on how long a reset with `options` can take before returning
pub fn worst_case_duration(options: &ResetOptions) -> Duration {
    let outbox = if options.wait_for_outbox_empty {
        options.outbox_wait().timeout()
    } else {
        Duration::ZERO
    };
    options
        .mode
        .steps()
        .iter()
        .map(|step| options.policy(*step).timeout())
        .fold(outbox, |total, step| total + step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{NoopTelemetry, DATASTORE_CHANNEL};
    use serde_json::json;
    use store_harness::{InProcessBus, SimulatedStore, StepBehavior};

    fn noop() -> Arc<dyn LifecycleTelemetry> {
        Arc::new(NoopTelemetry)
    }

    #[derive(Default)]
    struct FailureLog(std::sync::Mutex<Vec<(ResetStep, String)>>);

    impl LifecycleTelemetry for FailureLog {
        fn step_failed(&self, step: ResetStep, error: &ContractError, _elapsed: Duration) {
            self.0.lock().unwrap().push((step, error.to_string()));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_calls_stop_then_start() {
        let store = Arc::new(SimulatedStore::new());
        let bus = InProcessBus::new();

        let result = reset_local_store_with(
            Arc::clone(&store),
            &bus,
            &ResetOptions::new(ResetMode::Restart).skip_outbox_wait(),
            noop(),
        )
        .await
        .unwrap();

        assert_eq!(store.calls(), vec![ResetStep::Stop, ResetStep::Start]);
        assert_eq!(result.stop, StepOutcome::Ok);
        assert_eq!(result.clear, None);
        assert_eq!(result.start, StepOutcome::Ok);
        assert!(!result.outbox_empty_observed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_and_restart_order() {
        let store = Arc::new(SimulatedStore::new());
        let bus = InProcessBus::new();

        let result = reset_local_store_with(
            Arc::clone(&store),
            &bus,
            &ResetOptions::new(ResetMode::ClearAndRestart).skip_outbox_wait(),
            noop(),
        )
        .await
        .unwrap();

        assert_eq!(
            store.calls(),
            vec![ResetStep::Stop, ResetStep::Clear, ResetStep::Start]
        );
        assert_eq!(result.clear, Some(StepOutcome::Ok));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_stop_proceeds_with_default_policy() {
        let store = Arc::new(SimulatedStore::new().with_step(ResetStep::Stop, StepBehavior::Hang));
        let bus = InProcessBus::new();
        let started = Instant::now();

        let result = reset_local_store_with(
            Arc::clone(&store),
            &bus,
            &ResetOptions::default().skip_outbox_wait(),
            noop(),
        )
        .await
        .unwrap();

        assert_eq!(result.stop, StepOutcome::TimedOut);
        assert_eq!(result.start, StepOutcome::Ok);
        assert!(result.any_timed_out());
        assert!(started.elapsed() >= Duration::from_millis(5_000));
        assert_eq!(store.calls(), vec![ResetStep::Stop, ResetStep::Start]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_start_errors_with_label() {
        let store =
            Arc::new(SimulatedStore::new().with_step(ResetStep::Start, StepBehavior::Hang));
        let bus = InProcessBus::new();

        let err = reset_local_store_with(
            Arc::clone(&store),
            &bus,
            &ResetOptions::default().skip_outbox_wait(),
            noop(),
        )
        .await
        .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(err.step(), ResetStep::Start);
        assert_eq!(err.to_string(), "DataStore.start() timed out after 5000ms");
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_clear_aborts_before_start() {
        let store =
            Arc::new(SimulatedStore::new().with_step(ResetStep::Clear, StepBehavior::Hang));
        let bus = InProcessBus::new();

        let err = reset_local_store_with(
            Arc::clone(&store),
            &bus,
            &ResetOptions::new(ResetMode::ClearAndRestart).skip_outbox_wait(),
            noop(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.step(), ResetStep::Clear);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.calls(), vec![ResetStep::Stop, ResetStep::Clear]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_step_is_not_cancelled() {
        let store = Arc::new(SimulatedStore::new().with_step(
            ResetStep::Stop,
            StepBehavior::Delay(Duration::from_millis(8_000)),
        ));
        let bus = InProcessBus::new();

        let result = reset_local_store_with(
            Arc::clone(&store),
            &bus,
            &ResetOptions::default().skip_outbox_wait(),
            noop(),
        )
        .await
        .unwrap();
        assert_eq!(result.stop, StepOutcome::TimedOut);
        assert!(!store.completed().contains(&ResetStep::Stop));

        tokio::time::sleep(Duration::from_millis(5_000)).await;
        assert!(store.completed().contains(&ResetStep::Stop));
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_error_propagates_unchanged() {
        let store = Arc::new(SimulatedStore::new().with_step(
            ResetStep::Stop,
            StepBehavior::Fail("engine busy".to_string()),
        ));
        let bus = InProcessBus::new();

        let err = reset_local_store_with(
            Arc::clone(&store),
            &bus,
            &ResetOptions::default().skip_outbox_wait(),
            noop(),
        )
        .await
        .unwrap_err();

        match err {
            ResetError::Store { step, source } => {
                assert_eq!(step, ResetStep::Stop);
                assert!(matches!(
                    source,
                    ContractError::Store { ref message, .. } if message == "engine busy"
                ));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.calls(), vec![ResetStep::Stop]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_error_is_reported_to_telemetry() {
        let store = Arc::new(SimulatedStore::new().with_step(
            ResetStep::Start,
            StepBehavior::Fail("engine busy".to_string()),
        ));
        let bus = InProcessBus::new();
        let log = Arc::new(FailureLog::default());

        let err = reset_local_store_with(
            Arc::clone(&store),
            &bus,
            &ResetOptions::default().skip_outbox_wait(),
            Arc::clone(&log) as Arc<dyn LifecycleTelemetry>,
        )
        .await
        .unwrap_err();

        assert_eq!(err.step(), ResetStep::Start);
        assert_eq!(
            log.0.lock().unwrap().as_slice(),
            &[(ResetStep::Start, "store start failed: engine busy".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_refused_after_hung_stop() {
        let store = Arc::new(SimulatedStore::new().with_step(ResetStep::Stop, StepBehavior::Hang));
        let bus = InProcessBus::new();

        let err = reset_local_store_with(
            Arc::clone(&store),
            &bus,
            &ResetOptions::new(ResetMode::ClearAndRestart).skip_outbox_wait(),
            noop(),
        )
        .await
        .unwrap_err();

        match err {
            ResetError::Store { step, source } => {
                assert_eq!(step, ResetStep::Clear);
                assert!(matches!(source, ContractError::StoreState { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.calls(), vec![ResetStep::Stop, ResetStep::Clear]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_outbox_result_is_recorded() {
        let store = Arc::new(SimulatedStore::new());
        let bus = Arc::new(InProcessBus::new());
        let publisher = Arc::clone(&bus);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            publisher.publish(DATASTORE_CHANNEL, "outboxStatus", json!({ "isEmpty": true }));
        });

        let result = reset_local_store_with(
            Arc::clone(&store),
            bus.as_ref(),
            &ResetOptions::default(),
            noop(),
        )
        .await
        .unwrap();

        assert!(result.outbox_empty_observed);
        assert_eq!(bus.unsubscribe_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_outbox_timeout_does_not_block_reset() {
        let store = Arc::new(SimulatedStore::new());
        let bus = InProcessBus::new();

        let result =
            reset_local_store_with(Arc::clone(&store), &bus, &ResetOptions::default(), noop())
                .await
                .unwrap();

        assert!(!result.outbox_empty_observed);
        assert_eq!(store.calls(), vec![ResetStep::Stop, ResetStep::Start]);
    }

    #[test]
    fn test_worst_case_duration() {
        assert_eq!(
            worst_case_duration(&ResetOptions::default()),
            Duration::from_millis(12_000)
        );
        assert_eq!(
            worst_case_duration(&ResetOptions::new(ResetMode::ClearAndRestart).skip_outbox_wait()),
            Duration::from_millis(15_000)
        );
    }
}
