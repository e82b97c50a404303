//! World actor.
//!
//! The root of the topology. A world tracks its channels; channels are
//! registered and removed through the mailbox by [`crate::RoomServer`],
//! never by direct map access from other tasks.

use std::collections::HashMap;

use shroom_act::{Actor, MailboxHandle, Ticks};

use crate::{ChannelId, ChannelMsg, RoomSession, WorldId};

/// Deferred work executed inside the world's tick core phase.
pub type WorldAction<S> = Box<dyn FnOnce(&mut WorldActor<S>, Ticks) + Send>;

/// Commands a world accepts.
pub enum WorldMsg<S: RoomSession> {
    /// Track a channel actor under this world.
    RegisterChannel {
        /// The channel's id.
        id: ChannelId,
        /// Posting handle to the channel's mailbox.
        handle: MailboxHandle<ChannelMsg<S>>,
    },
    /// Stop tracking a channel.
    RemoveChannel(ChannelId),
    /// Run an action at the next tick core phase.
    Action(WorldAction<S>),
}

impl<S: RoomSession> std::fmt::Debug for WorldMsg<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RegisterChannel { id, .. } => f.debug_tuple("RegisterChannel").field(id).finish(),
            Self::RemoveChannel(id) => f.debug_tuple("RemoveChannel").field(id).finish(),
            Self::Action(_) => f.write_str("Action(..)"),
        }
    }
}

/// One game world.
pub struct WorldActor<S: RoomSession> {
    name: String,
    id: WorldId,
    channels: HashMap<ChannelId, MailboxHandle<ChannelMsg<S>>>,
    pending: Vec<WorldAction<S>>,
}

impl<S: RoomSession> WorldActor<S> {
    /// Create an empty world.
    #[must_use]
    pub fn new(id: WorldId) -> Self {
        Self {
            name: format!("world-{id}"),
            id,
            channels: HashMap::new(),
            pending: Vec::new(),
        }
    }

    /// This world's id.
    #[must_use]
    pub fn id(&self) -> WorldId {
        self.id
    }

    /// Channels currently registered.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Posting handle for a registered channel.
    #[must_use]
    pub fn channel(&self, id: ChannelId) -> Option<&MailboxHandle<ChannelMsg<S>>> {
        self.channels.get(&id)
    }
}

impl<S: RoomSession> Actor for WorldActor<S> {
    type Msg = WorldMsg<S>;

    fn name(&self) -> &str {
        &self.name
    }

    fn on_message(&mut self, msg: WorldMsg<S>, _now: Ticks) {
        match msg {
            WorldMsg::RegisterChannel { id, handle } => {
                if self.channels.insert(id, handle).is_some() {
                    tracing::warn!(world = %self.id, channel = %id, "channel re-registered");
                } else {
                    tracing::debug!(world = %self.id, channel = %id, "channel registered");
                }
            },
            WorldMsg::RemoveChannel(id) => {
                if self.channels.remove(&id).is_some() {
                    tracing::debug!(world = %self.id, channel = %id, "channel removed");
                }
            },
            WorldMsg::Action(action) => self.pending.push(action),
        }
    }

    fn on_tick(&mut self, now: Ticks) {
        let pending = std::mem::take(&mut self.pending);
        for action in pending {
            action(self, now);
        }
    }
}
