//! Room actor.
//!
//! A room owns the sessions pinned to it: an ordered list for deterministic
//! iteration plus membership by session id. Commands arrive through the
//! mailbox; deferred room actions run at the start of the tick core phase,
//! before sessions are driven, and are cleared afterwards.

use std::collections::HashSet;

use shroom_act::{Actor, Ticks};

use crate::{RoomId, SessionId};

/// A session as a room sees it.
pub trait RoomSession: Send + 'static {
    /// The session's id.
    fn id(&self) -> SessionId;

    /// Tick-phase work: drain inbound traffic, drive logic.
    fn tick(&mut self, now: Ticks);

    /// End-of-tick work: slow-consumer handling, logic tick-end.
    fn tick_end(&mut self, now: Ticks);
}

/// Deferred work executed inside the room's tick core phase.
pub type RoomAction<S> = Box<dyn FnOnce(&mut RoomActor<S>, Ticks) + Send>;

/// Commands a room accepts.
pub enum RoomMsg<S: RoomSession> {
    /// Adopt a session. Duplicates (same id) are ignored.
    AddSession(S),
    /// Remove and dispose a session.
    RemoveSession(SessionId),
    /// Run an action at the next tick core phase.
    Action(RoomAction<S>),
}

impl<S: RoomSession> std::fmt::Debug for RoomMsg<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AddSession(s) => f.debug_tuple("AddSession").field(&s.id()).finish(),
            Self::RemoveSession(id) => f.debug_tuple("RemoveSession").field(id).finish(),
            Self::Action(_) => f.write_str("Action(..)"),
        }
    }
}

/// One room: an instance of a map holding sessions.
pub struct RoomActor<S: RoomSession> {
    name: String,
    id: RoomId,
    sessions: Vec<S>,
    members: HashSet<SessionId>,
    pending: Vec<RoomAction<S>>,
}

impl<S: RoomSession> RoomActor<S> {
    /// Create an empty room.
    #[must_use]
    pub fn new(id: RoomId) -> Self {
        Self {
            name: format!("room-{id}"),
            id,
            sessions: Vec::new(),
            members: HashSet::new(),
            pending: Vec::new(),
        }
    }

    /// This room's id.
    #[must_use]
    pub fn id(&self) -> RoomId {
        self.id
    }

    /// Sessions currently in the room.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Whether a session id is present.
    #[must_use]
    pub fn contains(&self, id: SessionId) -> bool {
        self.members.contains(&id)
    }

    /// Mutable access to a member session.
    pub fn session_mut(&mut self, id: SessionId) -> Option<&mut S> {
        self.sessions.iter_mut().find(|s| s.id() == id)
    }

    fn add_session(&mut self, session: S) {
        let id = session.id();
        if !self.members.insert(id) {
            tracing::warn!(room = %self.id, session = %id, "duplicate session add ignored");
            return;
        }
        tracing::debug!(room = %self.id, session = %id, "session joined");
        self.sessions.push(session);
    }

    fn remove_session(&mut self, id: SessionId) {
        if !self.members.remove(&id) {
            return;
        }
        if let Some(pos) = self.sessions.iter().position(|s| s.id() == id) {
            // Disposes the session: its pump cancels when it drops.
            let session = self.sessions.remove(pos);
            drop(session);
            tracing::debug!(room = %self.id, session = %id, "session left");
        }
    }
}

impl<S: RoomSession> Actor for RoomActor<S> {
    type Msg = RoomMsg<S>;

    fn name(&self) -> &str {
        &self.name
    }

    fn on_message(&mut self, msg: RoomMsg<S>, _now: Ticks) {
        match msg {
            RoomMsg::AddSession(session) => self.add_session(session),
            RoomMsg::RemoveSession(id) => self.remove_session(id),
            RoomMsg::Action(action) => self.pending.push(action),
        }
    }

    fn on_tick(&mut self, now: Ticks) {
        let pending = std::mem::take(&mut self.pending);
        for action in pending {
            action(self, now);
        }

        for session in &mut self.sessions {
            session.tick(now);
        }
    }

    fn on_tick_end(&mut self, now: Ticks) {
        for session in &mut self.sessions {
            session.tick_end(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    use shroom_act::{Actor, Ticks};

    use super::{RoomActor, RoomMsg, RoomSession};
    use crate::{MapId, RoomId, SessionId};

    struct FakeSession {
        id: SessionId,
        ticks: u32,
        tick_ends: u32,
        drop_count: Arc<AtomicU32>,
    }

    impl RoomSession for FakeSession {
        fn id(&self) -> SessionId {
            self.id
        }

        fn tick(&mut self, _now: Ticks) {
            self.ticks += 1;
        }

        fn tick_end(&mut self, _now: Ticks) {
            self.tick_ends += 1;
        }
    }

    impl Drop for FakeSession {
        fn drop(&mut self) {
            self.drop_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn room() -> RoomActor<FakeSession> {
        RoomActor::new(RoomId::of_map(MapId(100_000_000)))
    }

    fn session(id: u32, drops: &Arc<AtomicU32>) -> FakeSession {
        FakeSession { id: SessionId(id), ticks: 0, tick_ends: 0, drop_count: Arc::clone(drops) }
    }

    #[test]
    fn add_drives_and_remove_disposes() {
        let drops = Arc::new(AtomicU32::new(0));
        let mut room = room();
        let now = Ticks::from_millis(1);

        room.on_message(RoomMsg::AddSession(session(1, &drops)), now);
        room.on_tick(now);
        room.on_tick_end(now);
        assert_eq!(room.session_count(), 1);
        assert!(room.contains(SessionId(1)));

        let s = room.session_mut(SessionId(1)).map(|s| (s.ticks, s.tick_ends));
        assert_eq!(s, Some((1, 1)));

        room.on_message(RoomMsg::RemoveSession(SessionId(1)), now);
        assert_eq!(room.session_count(), 0);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn duplicate_add_is_ignored() {
        let drops = Arc::new(AtomicU32::new(0));
        let mut room = room();
        let now = Ticks::ZERO;

        room.on_message(RoomMsg::AddSession(session(7, &drops)), now);
        room.on_message(RoomMsg::AddSession(session(7, &drops)), now);
        assert_eq!(room.session_count(), 1);
        // The rejected duplicate was dropped.
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remove_of_unknown_session_is_a_noop() {
        let mut room = room();
        room.on_message(RoomMsg::RemoveSession(SessionId(9)), Ticks::ZERO);
        assert_eq!(room.session_count(), 0);
    }

    #[test]
    fn deferred_actions_run_before_session_ticks_and_clear() {
        let drops = Arc::new(AtomicU32::new(0));
        let mut room = room();
        let now = Ticks::from_millis(5);

        room.on_message(RoomMsg::AddSession(session(1, &drops)), now);
        room.on_message(
            RoomMsg::Action(Box::new(|room, _now| {
                // Runs before the session's first tick of this round.
                let ticks = room.session_mut(SessionId(1)).map(|s| s.ticks);
                assert_eq!(ticks, Some(0));
            })),
            now,
        );

        room.on_tick(now);
        room.on_tick(now);
        // Second tick: the action queue was cleared, sessions ticked twice.
        let ticks = room.session_mut(SessionId(1)).map(|s| s.ticks);
        assert_eq!(ticks, Some(2));
    }
}
