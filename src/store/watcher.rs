//! Change observation for the shared store.
//!
//! Three independent signal channels drive a single `reload-from-store`
//! callback:
//!
//! 1. the native cross-context broadcast (writes by *other* contexts),
//! 2. the synthetic same-context signal the writer dispatches after its
//!    own write,
//! 3. a low-frequency polling timer that fires unconditionally.
//!
//! The callback must be idempotent: it re-reads the authoritative value
//! from the store and updates local render state, nothing else. That
//! makes the protocol safe against missed, duplicated, or reordered
//! signals at the cost of staleness bounded by the polling interval.

use std::sync::Arc;
use std::time::Duration;

use smol::Timer;

use super::StoreContext;

/// Default polling-fallback interval.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Disposable handle for a registration (watcher, command, listener).
/// Dropping it tears the registration down exactly once; [`detach`]
/// leaves it running for the life of the process.
///
/// [`detach`]: Subscription::detach
pub struct Subscription {
    cleanups: Vec<Box<dyn FnOnce()>>,
    tasks: Vec<smol::Task<()>>,
}

impl Subscription {
    pub fn new() -> Self {
        Self {
            cleanups: Vec::new(),
            tasks: Vec::new(),
        }
    }

    pub fn on_drop(mut self, cleanup: impl FnOnce() + 'static) -> Self {
        self.cleanups.push(Box::new(cleanup));
        self
    }

    pub fn with_task(mut self, task: smol::Task<()>) -> Self {
        self.tasks.push(task);
        self
    }

    /// Merge several registrations into one disposable handle.
    pub fn join(subs: impl IntoIterator<Item = Subscription>) -> Self {
        let mut joined = Self::new();
        for mut sub in subs {
            joined.cleanups.append(&mut sub.cleanups);
            joined.tasks.append(&mut sub.tasks);
        }
        joined
    }

    /// Keep the registration alive without holding the handle.
    pub fn detach(mut self) {
        for task in self.tasks.drain(..) {
            task.detach();
        }
        self.cleanups.clear();
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Tasks cancel when dropped; run the explicit cleanups once.
        for cleanup in self.cleanups.drain(..) {
            cleanup();
        }
    }
}

/// Observe one store key from a mounted UI region. The callback runs on
/// any of the three signal channels and should re-read the key via the
/// context it rendered from.
pub fn watch_key(
    context: &StoreContext,
    key: &str,
    callback: impl Fn() + Send + Sync + 'static,
) -> Subscription {
    watch_key_with_interval(context, key, POLL_INTERVAL, callback)
}

/// Same as [`watch_key`] with an explicit polling interval. Tests use a
/// short interval; production code sticks with [`POLL_INTERVAL`].
pub fn watch_key_with_interval(
    context: &StoreContext,
    key: &str,
    poll_interval: Duration,
    callback: impl Fn() + Send + Sync + 'static,
) -> Subscription {
    let callback = Arc::new(callback);
    let store = context.shared().clone();
    let (sub_id, rx) = store.register_sub(context.id(), Some(key.to_string()));

    // Channels 1 and 2 arrive on the same receiver; the writer id in
    // the event distinguishes them, but the reaction is identical.
    let signal_cb = callback.clone();
    let signal_task = smol::spawn(async move {
        while rx.recv().await.is_ok() {
            signal_cb();
        }
    });

    // Channel 3: unconditional re-read. Covers late-mounted listeners
    // and writes from other processes sharing the profile file.
    let poll_cb = callback.clone();
    let poll_task = smol::spawn(async move {
        loop {
            Timer::after(poll_interval).await;
            poll_cb();
        }
    });

    Subscription::new()
        .with_task(signal_task)
        .with_task(poll_task)
        .on_drop(move || store.unregister_sub(sub_id))
}
