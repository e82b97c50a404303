//! Fixed-interval tick scheduler.
//!
//! One background task drives every registered actor. Per tick, at target
//! time `T`:
//!
//! 1. Snapshot the registry (registration order).
//! 2. For each actor: drain its mailbox, then its tick hook.
//! 3. For each actor: its tick-end hook.
//! 4. Publish `T` on the notifier.
//! 5. Sleep until `T + interval`; a late tick runs immediately, never
//!    skipped.
//!
//! A panicking hook is caught, logged with the actor's name and the tick,
//! and isolated to that actor for that tick; the loop never halts. Actors
//! are touched strictly serially, which is what lets hooks take `&mut`
//! state without locks of their own.

use std::{
    panic::AssertUnwindSafe,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{GlobalClock, TickDriven, TickListener, TickNotifier, Ticks};

/// Scheduler construction and registration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// The tick interval must be positive.
    #[error("tick interval must be greater than zero")]
    ZeroInterval,

    /// An actor with this name is already registered.
    #[error("actor {0:?} is already registered")]
    DuplicateActor(String),
}

/// Proof of registration; consumed to unregister.
#[derive(Debug, PartialEq, Eq)]
pub struct Subscription {
    id: u64,
}

struct Slot {
    id: u64,
    name: String,
    actor: Arc<Mutex<Box<dyn TickDriven>>>,
}

struct Registry {
    slots: Vec<Slot>,
    next_id: u64,
}

struct SchedulerInner {
    registry: Mutex<Registry>,
    clock: GlobalClock,
    interval: Duration,
    notifier: TickNotifier,
}

impl SchedulerInner {
    fn lock_registry(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The tick loop and its actor registry.
///
/// Cloning shares the scheduler. Add and remove go through the registry
/// mutex; the loop snapshots at the start of each tick, so a registration
/// made mid-tick takes effect at the next tick.
#[derive(Clone)]
pub struct TickScheduler {
    inner: Arc<SchedulerInner>,
}

impl TickScheduler {
    /// Create a scheduler ticking every `interval`.
    pub fn new(clock: GlobalClock, interval: Duration) -> Result<Self, SchedulerError> {
        if interval.is_zero() {
            return Err(SchedulerError::ZeroInterval);
        }
        Ok(Self {
            inner: Arc::new(SchedulerInner {
                registry: Mutex::new(Registry { slots: Vec::new(), next_id: 0 }),
                clock,
                interval,
                notifier: TickNotifier::new(),
            }),
        })
    }

    /// The clock this scheduler runs on.
    #[must_use]
    pub fn clock(&self) -> GlobalClock {
        self.inner.clock
    }

    /// The configured tick interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    /// The notifier ticks are published on.
    #[must_use]
    pub fn notifier(&self) -> TickNotifier {
        self.inner.notifier.clone()
    }

    /// Subscribe a listener to published ticks.
    #[must_use]
    pub fn subscribe(&self) -> TickListener {
        self.inner.notifier.subscribe()
    }

    /// Register an actor; it joins the snapshot of the next tick.
    ///
    /// Names are unique: a second registration under the same name is
    /// rejected.
    pub fn register(
        &self,
        actor: impl TickDriven + 'static,
    ) -> Result<Subscription, SchedulerError> {
        let name = actor.name().to_string();
        let mut registry = self.inner.lock_registry();
        if registry.slots.iter().any(|s| s.name == name) {
            return Err(SchedulerError::DuplicateActor(name));
        }
        let id = registry.next_id;
        registry.next_id += 1;
        registry.slots.push(Slot { id, name, actor: Arc::new(Mutex::new(Box::new(actor))) });
        Ok(Subscription { id })
    }

    /// Remove a registered actor, dropping it after the current tick (if
    /// one is running) releases its snapshot reference.
    ///
    /// Returns `true` if the subscription was still live.
    pub fn unregister(&self, sub: Subscription) -> bool {
        let mut registry = self.inner.lock_registry();
        let before = registry.slots.len();
        registry.slots.retain(|s| s.id != sub.id);
        registry.slots.len() != before
    }

    /// Actors currently registered.
    #[must_use]
    pub fn actor_count(&self) -> usize {
        self.inner.lock_registry().slots.len()
    }

    /// Start the loop; it stops after finishing the tick in progress when
    /// `cancel` fires.
    pub fn start(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { run_loop(&inner, cancel).await })
    }
}

impl std::fmt::Debug for TickScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickScheduler")
            .field("interval", &self.inner.interval)
            .field("actors", &self.actor_count())
            .finish()
    }
}

async fn run_loop(inner: &SchedulerInner, cancel: CancellationToken) {
    let mut target = inner.clock.now();

    tracing::debug!(interval_ms = inner.interval.as_millis() as u64, "tick loop started");

    loop {
        if cancel.is_cancelled() {
            break;
        }

        run_tick(inner, target);

        target = target + inner.interval;
        let deadline = tokio::time::Instant::from_std(inner.clock.instant_at(target));
        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep_until(deadline) => {},
        }
    }

    tracing::debug!("tick loop stopped");
}

fn run_tick(inner: &SchedulerInner, now: Ticks) {
    let snapshot: Vec<(String, Arc<Mutex<Box<dyn TickDriven>>>)> = {
        let registry = inner.lock_registry();
        registry.slots.iter().map(|s| (s.name.clone(), Arc::clone(&s.actor))).collect()
    };

    for (name, actor) in &snapshot {
        let mut guard = actor.lock().unwrap_or_else(PoisonError::into_inner);
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| guard.drive_tick(now)));
        if result.is_err() {
            tracing::error!(actor = %name, tick = %now, "tick hook panicked");
        }
    }

    for (name, actor) in &snapshot {
        let mut guard = actor.lock().unwrap_or_else(PoisonError::into_inner);
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| guard.drive_tick_end(now)));
        if result.is_err() {
            tracing::error!(actor = %name, tick = %now, "tick-end hook panicked");
        }
    }

    inner.notifier.publish(now);
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use tokio_util::sync::CancellationToken;

    use super::{SchedulerError, TickScheduler};
    use crate::{Actor, ActorHost, GlobalClock, Ticks};

    type Events = Arc<Mutex<Vec<String>>>;

    struct Probe {
        name: String,
        events: Events,
    }

    impl Probe {
        fn new(name: &str, events: Events) -> ActorHost<Probe> {
            ActorHost::new(Probe { name: name.to_string(), events })
        }

        fn push(&self, event: &str) {
            if let Ok(mut events) = self.events.lock() {
                events.push(event.to_string());
            }
        }
    }

    impl Actor for Probe {
        type Msg = String;

        fn name(&self) -> &str {
            &self.name
        }

        fn on_message(&mut self, msg: String, _now: Ticks) {
            self.push(&format!("message:{msg}"));
        }

        fn on_tick(&mut self, _now: Ticks) {
            self.push("tick");
        }

        fn on_tick_end(&mut self, _now: Ticks) {
            self.push("end");
        }
    }

    fn events() -> Events {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[test]
    fn zero_interval_is_rejected() {
        let clock = GlobalClock::start();
        assert_eq!(
            TickScheduler::new(clock, Duration::ZERO).err(),
            Some(SchedulerError::ZeroInterval)
        );
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let clock = GlobalClock::start();
        let sched = TickScheduler::new(clock, Duration::from_millis(5)).unwrap();

        let ev = events();
        sched.register(Probe::new("a", ev.clone())).unwrap();
        let err = sched.register(Probe::new("a", ev)).unwrap_err();
        assert_eq!(err, SchedulerError::DuplicateActor("a".to_string()));
    }

    #[test]
    fn unregister_consumes_the_subscription() {
        let clock = GlobalClock::start();
        let sched = TickScheduler::new(clock, Duration::from_millis(5)).unwrap();

        let sub = sched.register(Probe::new("a", events())).unwrap();
        assert_eq!(sched.actor_count(), 1);
        assert!(sched.unregister(sub));
        assert_eq!(sched.actor_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn message_precedes_tick_precedes_end_within_one_tick() {
        let clock = GlobalClock::start();
        let sched = TickScheduler::new(clock, Duration::from_millis(5)).unwrap();

        let ev = events();
        let host = Probe::new("probe", ev.clone());
        let handle = host.handle();
        sched.register(host).unwrap();

        assert!(handle.try_post("hello".to_string()).is_ok());

        let cancel = CancellationToken::new();
        let loop_task = sched.start(cancel.clone());

        let mut listener = sched.subscribe();
        listener.wait_next(&cancel).await;

        cancel.cancel();
        loop_task.await.unwrap();

        let seen = ev.lock().unwrap();
        assert_eq!(&seen[..3], ["message:hello", "tick", "end"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn tick_end_runs_after_every_actor_ticked() {
        let clock = GlobalClock::start();
        let sched = TickScheduler::new(clock, Duration::from_millis(5)).unwrap();

        let ev = events();
        sched.register(Probe::new("first", ev.clone())).unwrap();
        sched.register(Probe::new("second", ev.clone())).unwrap();

        let cancel = CancellationToken::new();
        let loop_task = sched.start(cancel.clone());
        let mut listener = sched.subscribe();
        listener.wait_next(&cancel).await;
        cancel.cancel();
        loop_task.await.unwrap();

        let seen = ev.lock().unwrap();
        assert_eq!(&seen[..4], ["tick", "tick", "end", "end"]);
    }

    struct Faulty;

    impl Actor for Faulty {
        type Msg = ();

        fn name(&self) -> &str {
            "faulty"
        }

        fn on_message(&mut self, (): (), _now: Ticks) {}

        #[allow(clippy::panic)]
        fn on_tick(&mut self, _now: Ticks) {
            panic!("boom");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn a_panicking_actor_does_not_halt_the_loop() {
        let clock = GlobalClock::start();
        let sched = TickScheduler::new(clock, Duration::from_millis(5)).unwrap();

        let ev = events();
        sched.register(ActorHost::new(Faulty)).unwrap();
        sched.register(Probe::new("healthy", ev.clone())).unwrap();

        let cancel = CancellationToken::new();
        let loop_task = sched.start(cancel.clone());

        // Two full ticks despite the panicking neighbour.
        let mut listener = sched.subscribe();
        listener.wait_next(&cancel).await;
        listener.wait_next(&cancel).await;
        cancel.cancel();
        loop_task.await.unwrap();

        let seen = ev.lock().unwrap();
        assert!(seen.iter().filter(|e| e.as_str() == "tick").count() >= 2);
    }
}
