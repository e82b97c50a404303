//! Actor trait and host cell.

use crate::{Mailbox, MailboxHandle, OverflowPolicy, Ticks};

/// A tick-driven entity with a private mailbox.
///
/// The scheduler guarantees serial access: between consecutive ticks no one
/// else touches the actor's state, so hooks take `&mut self` without any
/// locking discipline on the implementor's part.
///
/// Per tick, in order: every pending message through
/// [`Actor::on_message`], then [`Actor::on_tick`]; after every actor in the
/// snapshot has ticked, [`Actor::on_tick_end`].
pub trait Actor: Send + 'static {
    /// Message type delivered through the mailbox.
    type Msg: Send + 'static;

    /// Stable name, used for registration and diagnostics.
    fn name(&self) -> &str;

    /// Handle one mailbox message.
    fn on_message(&mut self, msg: Self::Msg, now: Ticks);

    /// Core tick hook, after the mailbox drain.
    fn on_tick(&mut self, now: Ticks) {
        let _ = now;
    }

    /// End-of-tick hook, after every actor's tick phase.
    fn on_tick_end(&mut self, now: Ticks) {
        let _ = now;
    }
}

/// Scheduler-facing view of a hosted actor.
///
/// Implemented by [`ActorHost`]; the scheduler drives registered actors
/// exclusively through this trait.
pub trait TickDriven: Send {
    /// The hosted actor's name.
    fn name(&self) -> &str;

    /// Tick phase: drain the mailbox, then the core tick hook.
    fn drive_tick(&mut self, now: Ticks);

    /// End-of-tick phase.
    fn drive_tick_end(&mut self, now: Ticks);
}

/// Owns an [`Actor`] together with its [`Mailbox`].
///
/// Mailbox draining happens inside the tick phase, so a message enqueued
/// before a tick begins is observed during that tick, strictly before the
/// core tick hook.
pub struct ActorHost<A: Actor> {
    actor: A,
    mailbox: Mailbox<A::Msg>,
    scratch: Vec<A::Msg>,
}

impl<A: Actor> ActorHost<A> {
    /// Default mailbox capacity.
    pub const DEFAULT_MAILBOX_CAPACITY: usize = 1024;

    /// Host `actor` with the default bounded drop-oldest mailbox.
    #[must_use]
    pub fn new(actor: A) -> Self {
        Self::with_mailbox(actor, Self::DEFAULT_MAILBOX_CAPACITY, OverflowPolicy::default())
    }

    /// Host `actor` with an explicit mailbox capacity and overflow policy.
    #[must_use]
    pub fn with_mailbox(actor: A, capacity: usize, policy: OverflowPolicy) -> Self {
        Self { actor, mailbox: Mailbox::new(capacity, policy), scratch: Vec::new() }
    }

    /// Posting handle for this actor's mailbox.
    #[must_use]
    pub fn handle(&self) -> MailboxHandle<A::Msg> {
        self.mailbox.handle()
    }

    /// Messages lost to mailbox overflow so far.
    #[must_use]
    pub fn dropped_messages(&self) -> u64 {
        self.mailbox.dropped()
    }

    /// The hosted actor.
    #[must_use]
    pub fn actor(&self) -> &A {
        &self.actor
    }

    /// The hosted actor, mutably. Only sound from the scheduler's serial
    /// dispatch or before registration.
    pub fn actor_mut(&mut self) -> &mut A {
        &mut self.actor
    }
}

impl<A: Actor> TickDriven for ActorHost<A> {
    fn name(&self) -> &str {
        self.actor.name()
    }

    fn drive_tick(&mut self, now: Ticks) {
        self.mailbox.drain_into(&mut self.scratch);
        for msg in self.scratch.drain(..) {
            self.actor.on_message(msg, now);
        }
        self.actor.on_tick(now);
    }

    fn drive_tick_end(&mut self, now: Ticks) {
        self.actor.on_tick_end(now);
    }
}

#[cfg(test)]
mod tests {
    use super::{Actor, ActorHost, TickDriven};
    use crate::Ticks;

    struct Recorder {
        events: Vec<String>,
    }

    impl Actor for Recorder {
        type Msg = String;

        fn name(&self) -> &str {
            "recorder"
        }

        fn on_message(&mut self, msg: String, _now: Ticks) {
            self.events.push(format!("message:{msg}"));
        }

        fn on_tick(&mut self, _now: Ticks) {
            self.events.push("tick".to_string());
        }

        fn on_tick_end(&mut self, _now: Ticks) {
            self.events.push("end".to_string());
        }
    }

    #[test]
    fn messages_precede_the_core_tick() {
        let mut host = ActorHost::new(Recorder { events: Vec::new() });
        let handle = host.handle();
        assert!(handle.try_post("a".to_string()).is_ok());
        assert!(handle.try_post("b".to_string()).is_ok());

        host.drive_tick(Ticks::from_millis(1));
        host.drive_tick_end(Ticks::from_millis(1));

        assert_eq!(host.actor().events, vec!["message:a", "message:b", "tick", "end"]);
    }

    #[test]
    fn tick_without_messages_still_runs_hooks() {
        let mut host = ActorHost::new(Recorder { events: Vec::new() });
        host.drive_tick(Ticks::ZERO);
        host.drive_tick_end(Ticks::ZERO);
        assert_eq!(host.actor().events, vec!["tick", "end"]);
    }
}
