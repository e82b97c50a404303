//! Room timer.
//!
//! Binds a delay queue to one room actor and a tick notifier. The loop is
//! the timing substrate for everything a room schedules "later": wait for
//! the next published tick, drain every due entry, and post each one to the
//! room as a deferred action - non-blocking first, falling back to the
//! blocking post so due work is never lost to a full mailbox.

use std::sync::Arc;

use shroom_act::{DelayQueue, TickNotifier, Ticks};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{RoomHandle, RoomMsg, RoomSession, room::RoomAction};

/// Tick-driven dispatcher of delayed room actions.
pub struct RoomTimer<S: RoomSession> {
    queue: Arc<DelayQueue<RoomAction<S>>>,
    room: RoomHandle<S>,
    notifier: TickNotifier,
}

impl<S: RoomSession> Clone for RoomTimer<S> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            room: self.room.clone(),
            notifier: self.notifier.clone(),
        }
    }
}

impl<S: RoomSession> RoomTimer<S> {
    /// Create a timer for `room`, driven by `notifier`.
    #[must_use]
    pub fn new(room: RoomHandle<S>, notifier: TickNotifier) -> Self {
        Self { queue: Arc::new(DelayQueue::new()), room, notifier }
    }

    /// Schedule `action` to run in the room at the tick `due`.
    pub fn schedule_at<F>(&self, due: Ticks, action: F)
    where
        F: FnOnce(&mut crate::RoomActor<S>, Ticks) + Send + 'static,
    {
        self.queue.enqueue(due, Box::new(action));
    }

    /// Schedule `action` to run `delay_ms` milliseconds after the
    /// notifier's most recent tick.
    pub fn schedule_after_millis<F>(&self, delay_ms: u64, action: F)
    where
        F: FnOnce(&mut crate::RoomActor<S>, Ticks) + Send + 'static,
    {
        self.schedule_at(self.notifier.last_tick() + delay_ms, action);
    }

    /// Entries not yet due.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Start the dispatch loop; it exits when `cancel` fires.
    pub fn start(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let timer = self.clone();
        tokio::spawn(async move {
            let mut listener = timer.notifier.subscribe();
            while let Some(now) = listener.wait_next(&cancel).await {
                for action in timer.queue.drain_due(now) {
                    match timer.room.mailbox().try_post(RoomMsg::Action(action)) {
                        Ok(()) => {},
                        Err(msg) => timer.room.mailbox().post(msg).await,
                    }
                }
            }
        })
    }
}

impl<S: RoomSession> std::fmt::Debug for RoomTimer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomTimer")
            .field("room", &self.room.id())
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicU64, Ordering},
        },
        time::Duration,
    };

    use shroom_act::{GlobalClock, TickScheduler, Ticks};
    use tokio_util::sync::CancellationToken;

    use super::RoomTimer;
    use crate::{ChannelId, MapId, RoomId, RoomServer, RoomSession, SessionId, WorldId};

    struct NullSession;

    impl RoomSession for NullSession {
        fn id(&self) -> SessionId {
            SessionId(0)
        }

        fn tick(&mut self, _now: Ticks) {}

        fn tick_end(&mut self, _now: Ticks) {}
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn delayed_action_fires_at_or_after_its_due_tick() {
        let clock = GlobalClock::start();
        let scheduler = TickScheduler::new(clock, Duration::from_millis(5)).unwrap();
        let server: RoomServer<NullSession> = RoomServer::new(scheduler.clone());

        let world = server.create_world(WorldId(1)).unwrap();
        let channel = server.create_channel(&world, ChannelId(1)).unwrap();
        let room = server.create_room(&channel, RoomId::of_map(MapId(1))).unwrap();

        let timer = RoomTimer::new(room, server.notifier());
        let fired_at = Arc::new(AtomicU64::new(0));

        let cancel = CancellationToken::new();
        let timer_task = timer.start(cancel.clone());
        let loop_task = scheduler.start(cancel.clone());

        {
            let fired_at = Arc::clone(&fired_at);
            timer.schedule_after_millis(20, move |_room, now| {
                fired_at.store(now.millis().max(1), Ordering::SeqCst);
            });
        }
        assert_eq!(timer.pending(), 1);

        // 5 ms ticks: the action must run once now >= 20 ms.
        tokio::time::sleep(Duration::from_millis(120)).await;
        cancel.cancel();
        let _ = tokio::join!(timer_task, loop_task);

        let at = fired_at.load(Ordering::SeqCst);
        assert!(at >= 20, "action fired too early, at {at}ms");
        assert_eq!(timer.pending(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn actions_fire_in_due_order() {
        let clock = GlobalClock::start();
        let scheduler = TickScheduler::new(clock, Duration::from_millis(5)).unwrap();
        let server: RoomServer<NullSession> = RoomServer::new(scheduler.clone());

        let world = server.create_world(WorldId(1)).unwrap();
        let channel = server.create_channel(&world, ChannelId(1)).unwrap();
        let room = server.create_room(&channel, RoomId::of_map(MapId(1))).unwrap();

        let timer = RoomTimer::new(room, server.notifier());
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let cancel = CancellationToken::new();
        let timer_task = timer.start(cancel.clone());
        let loop_task = scheduler.start(cancel.clone());

        for (delay, tag) in [(40u64, "late"), (10, "early")] {
            let order = Arc::clone(&order);
            timer.schedule_after_millis(delay, move |_room, _now| {
                if let Ok(mut order) = order.lock() {
                    order.push(tag);
                }
            });
        }

        tokio::time::sleep(Duration::from_millis(150)).await;
        cancel.cancel();
        let _ = tokio::join!(timer_task, loop_task);

        let seen = order.lock().unwrap().clone();
        assert_eq!(seen, vec!["early", "late"]);
    }
}
