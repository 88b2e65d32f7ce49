//! Event bus adapter - filtered subscription over a `LifecycleBus`.

use std::sync::{Arc, Mutex, PoisonError};

use contracts::{LifecycleBus, NormalizedEvent, RawNotification, Unsubscribe, DATASTORE_CHANNEL};
use tracing::trace;

use crate::normalizer::parse;

/// Live subscription on the lifecycle channel
///
/// [`Subscription::unsubscribe`] detaches from the underlying bus exactly once, no
/// matter how often it is called. Dropping the subscription also detaches.
pub struct Subscription {
    detach: Mutex<Option<Unsubscribe>>,
}

impl Subscription {
    fn new(detach: Unsubscribe) -> Self {
        Self {
            detach: Mutex::new(Some(detach)),
        }
    }

    /// Detach from the bus (idempotent)
    pub fn unsubscribe(&self) {
        let detach = self
            .detach
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(detach) = detach {
            detach();
        }
    }

    /// Whether the subscription is still attached
    pub fn is_active(&self) -> bool {
        self.detach
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Subscribe to lifecycle events
///
/// Every raw notification is parsed; only well-formed events reach `handler`.
pub fn subscribe<B, F>(bus: &B, handler: F) -> Subscription
where
    B: LifecycleBus + ?Sized,
    F: Fn(NormalizedEvent) + Send + Sync + 'static,
{
    let detach = bus.listen(
        DATASTORE_CHANNEL,
        Arc::new(move |raw: &RawNotification| match parse(raw) {
            Some(event) => handler(event),
            None => trace!("dropping malformed lifecycle notification"),
        }),
    );
    Subscription::new(detach)
}
