//! LifecycleBus trait - notification channel abstraction
//!
//! Any publish/subscribe primitive (topic, emitter, signal) satisfies it; no vendor
//! type leaks into the coordinator.

use std::sync::Arc;

use crate::RawNotification;

/// Raw notification callback type
///
/// Uses `Arc` so the bus can snapshot its listeners and dispatch without holding locks.
pub type RawCallback = Arc<dyn Fn(&RawNotification) + Send + Sync>;

/// Detach handle returned by [`LifecycleBus::listen`]
///
/// Consumed on call, so the bus itself never sees a double detach through one handle.
pub type Unsubscribe = Box<dyn FnOnce() + Send>;

/// Notification channel trait
///
/// # Example
///
/// ```ignore
/// let unsubscribe = bus.listen("datastore", Arc::new(|raw| {
///     println!("notification: {raw}");
/// }));
/// // ... later ...
/// unsubscribe();
/// ```
pub trait LifecycleBus: Send + Sync {
    /// Register `callback` on `channel`
    ///
    /// Callbacks may be invoked from any thread at any time until the returned
    /// handle is called. Implementations must tolerate the handle being called from
    /// inside a callback.
    fn listen(&self, channel: &str, callback: RawCallback) -> Unsubscribe;
}

impl<B: LifecycleBus + ?Sized> LifecycleBus for Arc<B> {
    fn listen(&self, channel: &str, callback: RawCallback) -> Unsubscribe {
        (**self).listen(channel, callback)
    }
}
