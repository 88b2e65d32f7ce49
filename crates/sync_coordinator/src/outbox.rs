//! Outbox-drain waiter.
//!
//! Best-effort heuristic used before halting the sync engine while local writes may
//! still be queued. False positives and negatives are acceptable; blocking is not.

use std::sync::Arc;

use contracts::event_names::OUTBOX_STATUS;
use contracts::{LifecycleBus, LifecycleTelemetry, NormalizedEvent, OutboxWaitOptions, WaiterKind};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::normalizer::canonical_name;
use crate::race::first_matching_event;

/// `true` only for an outbox-status event whose `data.isEmpty` is the boolean `true`
pub(crate) fn reports_empty_outbox(event: &NormalizedEvent) -> bool {
    canonical_name(event) == OUTBOX_STATUS
        && event.data.get("isEmpty").and_then(|v| v.as_bool()) == Some(true)
}

/// Wait until the outbox reports empty, giving up with `false` at the deadline
#[instrument(
    name = "wait_for_outbox_empty",
    skip(bus, options, telemetry),
    fields(timeout_ms = options.timeout_ms)
)]
pub async fn wait_for_outbox_empty_with<B>(
    bus: &B,
    options: &OutboxWaitOptions,
    telemetry: Arc<dyn LifecycleTelemetry>,
) -> bool
where
    B: LifecycleBus + ?Sized,
{
    let started = Instant::now();
    let observer = Arc::clone(&telemetry);

    let empty = first_matching_event(
        bus,
        options.timeout(),
        move |event| {
            if canonical_name(event) != OUTBOX_STATUS {
                return None;
            }
            observer.event_observed(WaiterKind::OutboxDrain, event);
            debug!(is_empty = ?event.data.get("isEmpty"), "observed outbox status");
            reports_empty_outbox(event).then_some(true)
        },
        || false,
    )
    .await;

    if !empty {
        warn!(timeout_ms = options.timeout_ms, "timed out waiting for outbox empty");
    }
    telemetry.outbox_drain_resolved(empty, started.elapsed());
    empty
}
