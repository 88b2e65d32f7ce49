//! Single-resolution race primitives.
//!
//! Every wait in the coordinator is "something happens" racing a deadline and must
//! settle exactly once. [`race_deadline`] is the one future-vs-timer combinator;
//! [`Resolver`] turns callback-driven event delivery into such a future, guarded by one
//! `resolved` flag and one [`Resolver::finish`] entry point shared by every path.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use contracts::{LifecycleBus, NormalizedEvent};
use tokio::sync::Notify;

use crate::bus::{subscribe, Subscription};

/// Outcome of racing a future against a deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Race<T> {
    /// The future completed first
    Settled(T),
    /// The deadline elapsed first
    Expired,
}

/// Race `fut` against `deadline`
///
/// `fut` is polled before the timer on every wake-up, so a future that is already
/// complete always wins, even with a zero deadline. When the deadline wins the future
/// is dropped; callers that must not cancel pass `&mut` a pinned future and keep it.
pub(crate) async fn race_deadline<F: Future>(fut: F, deadline: Duration) -> Race<F::Output> {
    tokio::select! {
        biased;
        output = fut => Race::Settled(output),
        _ = tokio::time::sleep(deadline) => Race::Expired,
    }
}

struct ResolverState<T> {
    resolved: bool,
    outcome: Option<T>,
    subscription: Option<Subscription>,
}

/// Resolve-once cell shared between an event handler and a timer
pub(crate) struct Resolver<T> {
    state: Mutex<ResolverState<T>>,
    settled: Notify,
}

impl<T> Resolver<T> {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ResolverState {
                resolved: false,
                outcome: None,
                subscription: None,
            }),
            settled: Notify::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, ResolverState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hand the subscription to tear down on resolution
    ///
    /// If resolution already happened (an event raced the registration), the
    /// subscription is detached right away.
    pub(crate) fn attach(&self, subscription: Subscription) {
        let mut state = self.lock();
        if state.resolved {
            drop(state);
            subscription.unsubscribe();
        } else {
            state.subscription = Some(subscription);
        }
    }

    /// Resolve with `value`; returns `false` if already resolved
    ///
    /// The winning call detaches the subscription before waking the waiter.
    pub(crate) fn finish(&self, value: T) -> bool {
        let subscription = {
            let mut state = self.lock();
            if state.resolved {
                return false;
            }
            state.resolved = true;
            state.outcome = Some(value);
            state.subscription.take()
        };

        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
        self.settled.notify_one();
        true
    }

    /// Resolve without an outcome (the waiter went away)
    pub(crate) fn abandon(&self) {
        let subscription = {
            let mut state = self.lock();
            state.resolved = true;
            state.subscription.take()
        };
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
    }

    pub(crate) fn is_resolved(&self) -> bool {
        self.lock().resolved
    }

    fn take_outcome(&self) -> Option<T> {
        self.lock().outcome.take()
    }

    async fn settled(&self) {
        self.settled.notified().await
    }
}

/// Tears the resolver down if the waiting future is dropped mid-wait
struct AbandonOnDrop<'a, T>(&'a Resolver<T>);

impl<T> Drop for AbandonOnDrop<'_, T> {
    fn drop(&mut self) {
        self.0.abandon();
    }
}

/// Wait until `resolver` settles or `deadline` elapses, whichever comes first
///
/// The timer path goes through the same [`Resolver::finish`] as the event path, so
/// whichever runs first decides the outcome and the other becomes a no-op.
pub(crate) async fn settle_once<T>(
    resolver: &Resolver<T>,
    deadline: Duration,
    on_timeout: impl Fn() -> T,
) -> T {
    let _teardown = AbandonOnDrop(resolver);

    if let Race::Expired = race_deadline(resolver.settled(), deadline).await {
        resolver.finish(on_timeout());
    }

    resolver.take_outcome().unwrap_or_else(on_timeout)
}

/// Resolve on the first event `matcher` maps to a value, or `on_timeout()` at the deadline
///
/// Events arriving after resolution are never handed to `matcher`.
pub(crate) async fn first_matching_event<B, T, M>(
    bus: &B,
    deadline: Duration,
    matcher: M,
    on_timeout: impl Fn() -> T,
) -> T
where
    B: LifecycleBus + ?Sized,
    T: Send + 'static,
    M: Fn(&NormalizedEvent) -> Option<T> + Send + Sync + 'static,
{
    let resolver = Resolver::new();
    let handler_resolver = Arc::clone(&resolver);

    let subscription = subscribe(bus, move |event| {
        if handler_resolver.is_resolved() {
            return;
        }
        if let Some(value) = matcher(&event) {
            handler_resolver.finish(value);
        }
    });
    resolver.attach(subscription);

    settle_once(&resolver, deadline, on_timeout).await
}
