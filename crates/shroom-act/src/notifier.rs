//! Tick fan-out.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::Ticks;

/// Fan-out of published ticks to any number of async waiters.
///
/// Every waiter parked in [`TickListener::wait_next`] when a tick is
/// published observes that same tick. Publishing is cheap; nothing blocks
/// on slow listeners.
#[derive(Clone)]
pub struct TickNotifier {
    tx: Arc<watch::Sender<Ticks>>,
}

impl TickNotifier {
    /// A notifier whose last tick starts at zero.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Ticks::ZERO);
        Self { tx: Arc::new(tx) }
    }

    /// Publish tick `now` to every listener.
    pub fn publish(&self, now: Ticks) {
        let _ = self.tx.send(now);
    }

    /// The most recently published tick.
    #[must_use]
    pub fn last_tick(&self) -> Ticks {
        *self.tx.borrow()
    }

    /// A new listener; it only observes ticks published after this call.
    #[must_use]
    pub fn subscribe(&self) -> TickListener {
        let mut rx = self.tx.subscribe();
        rx.borrow_and_update();
        TickListener { rx }
    }
}

impl Default for TickNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TickNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickNotifier").field("last_tick", &self.last_tick()).finish()
    }
}

/// One waiter's view of a [`TickNotifier`].
#[derive(Debug)]
pub struct TickListener {
    rx: watch::Receiver<Ticks>,
}

impl TickListener {
    /// Wait for the next published tick.
    ///
    /// Returns `None` when `cancel` fires first or the notifier is gone -
    /// cancellation is a clean unwind, not an error.
    pub async fn wait_next(&mut self, cancel: &CancellationToken) -> Option<Ticks> {
        tokio::select! {
            () = cancel.cancelled() => None,
            changed = self.rx.changed() => match changed {
                Ok(()) => Some(*self.rx.borrow_and_update()),
                Err(_) => None,
            },
        }
    }

    /// The most recently published tick.
    #[must_use]
    pub fn last_tick(&self) -> Ticks {
        *self.rx.borrow()
    }
}
