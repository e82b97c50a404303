//! Channel actor.
//!
//! A channel belongs to exactly one world and tracks the rooms running
//! under it. Room registration flows through the mailbox from
//! [`crate::RoomServer`]; deferred channel actions run at the next tick
//! core phase, then clear.

use std::collections::HashMap;

use shroom_act::{Actor, MailboxHandle, Ticks};

use crate::{ChannelId, RoomId, RoomMsg, RoomSession};

/// Deferred work executed inside the channel's tick core phase.
pub type ChannelAction<S> = Box<dyn FnOnce(&mut ChannelActor<S>, Ticks) + Send>;

/// Commands a channel accepts.
pub enum ChannelMsg<S: RoomSession> {
    /// Track a room actor under this channel.
    RegisterRoom {
        /// The room's id.
        id: RoomId,
        /// Posting handle to the room's mailbox.
        handle: MailboxHandle<RoomMsg<S>>,
    },
    /// Stop tracking a room.
    RemoveRoom(RoomId),
    /// Run an action at the next tick core phase.
    Action(ChannelAction<S>),
}

impl<S: RoomSession> std::fmt::Debug for ChannelMsg<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RegisterRoom { id, .. } => f.debug_tuple("RegisterRoom").field(id).finish(),
            Self::RemoveRoom(id) => f.debug_tuple("RemoveRoom").field(id).finish(),
            Self::Action(_) => f.write_str("Action(..)"),
        }
    }
}

/// One channel of a world.
pub struct ChannelActor<S: RoomSession> {
    name: String,
    id: ChannelId,
    rooms: HashMap<RoomId, MailboxHandle<RoomMsg<S>>>,
    pending: Vec<ChannelAction<S>>,
}

impl<S: RoomSession> ChannelActor<S> {
    /// Create an empty channel.
    #[must_use]
    pub fn new(id: ChannelId) -> Self {
        Self {
            name: format!("channel-{id}"),
            id,
            rooms: HashMap::new(),
            pending: Vec::new(),
        }
    }

    /// This channel's id.
    #[must_use]
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Rooms currently registered.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Posting handle for a registered room.
    #[must_use]
    pub fn room(&self, id: RoomId) -> Option<&MailboxHandle<RoomMsg<S>>> {
        self.rooms.get(&id)
    }
}

impl<S: RoomSession> Actor for ChannelActor<S> {
    type Msg = ChannelMsg<S>;

    fn name(&self) -> &str {
        &self.name
    }

    fn on_message(&mut self, msg: ChannelMsg<S>, _now: Ticks) {
        match msg {
            ChannelMsg::RegisterRoom { id, handle } => {
                if self.rooms.insert(id, handle).is_some() {
                    tracing::warn!(channel = %self.id, room = %id, "room re-registered");
                } else {
                    tracing::debug!(channel = %self.id, room = %id, "room registered");
                }
            },
            ChannelMsg::RemoveRoom(id) => {
                if self.rooms.remove(&id).is_some() {
                    tracing::debug!(channel = %self.id, room = %id, "room removed");
                }
            },
            ChannelMsg::Action(action) => self.pending.push(action),
        }
    }

    fn on_tick(&mut self, now: Ticks) {
        let pending = std::mem::take(&mut self.pending);
        for action in pending {
            action(self, now);
        }
    }
}

#[cfg(test)]
mod tests {
    use shroom_act::{Actor, Mailbox, OverflowPolicy, Ticks};

    use super::{ChannelActor, ChannelMsg};
    use crate::{ChannelId, MapId, RoomId, RoomMsg, RoomSession, SessionId};

    struct NullSession;

    impl RoomSession for NullSession {
        fn id(&self) -> SessionId {
            SessionId(0)
        }

        fn tick(&mut self, _now: Ticks) {}

        fn tick_end(&mut self, _now: Ticks) {}
    }

    #[test]
    fn register_and_remove_rooms() {
        let mut channel: ChannelActor<NullSession> = ChannelActor::new(ChannelId(1));
        let mailbox: Mailbox<RoomMsg<NullSession>> = Mailbox::new(8, OverflowPolicy::DropOldest);
        let room_id = RoomId::of_map(MapId(100_000_000));

        channel.on_message(
            ChannelMsg::RegisterRoom { id: room_id, handle: mailbox.handle() },
            Ticks::ZERO,
        );
        assert_eq!(channel.room_count(), 1);
        assert!(channel.room(room_id).is_some());

        channel.on_message(ChannelMsg::RemoveRoom(room_id), Ticks::ZERO);
        assert_eq!(channel.room_count(), 0);
    }

    #[test]
    fn deferred_actions_run_once_at_tick() {
        let mut channel: ChannelActor<NullSession> = ChannelActor::new(ChannelId(2));
        channel.on_message(
            ChannelMsg::Action(Box::new(|channel, _now| {
                assert_eq!(channel.id(), ChannelId(2));
            })),
            Ticks::ZERO,
        );

        channel.on_tick(Ticks::ZERO);
        // Cleared: a second tick runs nothing.
        channel.on_tick(Ticks::ZERO);
    }
}
