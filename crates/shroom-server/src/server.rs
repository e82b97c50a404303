//! Topology construction.
//!
//! [`RoomServer`] is the one place actors come to life. Every `create_*`
//! call does three things: registers the actor with the tick scheduler,
//! posts a register command to the parent actor, and records a dispose
//! closure that undoes both - posting the matching remove command and
//! unregistering the scheduler subscription.

use std::{
    marker::PhantomData,
    sync::{Arc, Mutex, PoisonError},
};

use shroom_act::{ActorHost, MailboxHandle, TickNotifier, TickScheduler};

use crate::{
    ChannelActor, ChannelId, ChannelMsg, RoomActor, RoomId, RoomMsg, RoomSession, ServerError,
    SessionId, WorldActor, WorldId, WorldMsg,
};

type Disposer = Arc<Mutex<Option<Box<dyn FnOnce() + Send>>>>;

fn run_disposer(disposer: &Disposer) {
    let taken = disposer.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(f) = taken {
        f();
    }
}

/// Handle to a live world actor.
pub struct WorldHandle<S: RoomSession> {
    id: WorldId,
    mailbox: MailboxHandle<WorldMsg<S>>,
    disposer: Disposer,
}

impl<S: RoomSession> Clone for WorldHandle<S> {
    fn clone(&self) -> Self {
        Self { id: self.id, mailbox: self.mailbox.clone(), disposer: Arc::clone(&self.disposer) }
    }
}

impl<S: RoomSession> WorldHandle<S> {
    /// The world's id.
    #[must_use]
    pub fn id(&self) -> WorldId {
        self.id
    }

    /// Posting handle to the world's mailbox.
    #[must_use]
    pub fn mailbox(&self) -> MailboxHandle<WorldMsg<S>> {
        self.mailbox.clone()
    }

    /// Unregister the world from the scheduler. Idempotent.
    pub fn dispose(&self) {
        run_disposer(&self.disposer);
    }
}

impl<S: RoomSession> std::fmt::Debug for WorldHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldHandle").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Handle to a live channel actor.
pub struct ChannelHandle<S: RoomSession> {
    id: ChannelId,
    mailbox: MailboxHandle<ChannelMsg<S>>,
    disposer: Disposer,
}

impl<S: RoomSession> Clone for ChannelHandle<S> {
    fn clone(&self) -> Self {
        Self { id: self.id, mailbox: self.mailbox.clone(), disposer: Arc::clone(&self.disposer) }
    }
}

impl<S: RoomSession> ChannelHandle<S> {
    /// The channel's id.
    #[must_use]
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Posting handle to the channel's mailbox.
    #[must_use]
    pub fn mailbox(&self) -> MailboxHandle<ChannelMsg<S>> {
        self.mailbox.clone()
    }

    /// Post the remove command to the parent world and unregister from the
    /// scheduler. Idempotent.
    pub fn dispose(&self) {
        run_disposer(&self.disposer);
    }
}

impl<S: RoomSession> std::fmt::Debug for ChannelHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelHandle").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Handle to a live room actor.
pub struct RoomHandle<S: RoomSession> {
    id: RoomId,
    mailbox: MailboxHandle<RoomMsg<S>>,
    disposer: Disposer,
}

impl<S: RoomSession> Clone for RoomHandle<S> {
    fn clone(&self) -> Self {
        Self { id: self.id, mailbox: self.mailbox.clone(), disposer: Arc::clone(&self.disposer) }
    }
}

impl<S: RoomSession> RoomHandle<S> {
    /// The room's id.
    #[must_use]
    pub fn id(&self) -> RoomId {
        self.id
    }

    /// Posting handle to the room's mailbox.
    #[must_use]
    pub fn mailbox(&self) -> MailboxHandle<RoomMsg<S>> {
        self.mailbox.clone()
    }

    /// Post a session into the room, waiting for mailbox space if needed.
    pub async fn add_session(&self, session: S) {
        self.mailbox.post(RoomMsg::AddSession(session)).await;
    }

    /// Post a session removal, waiting for mailbox space if needed.
    pub async fn remove_session(&self, id: SessionId) {
        self.mailbox.post(RoomMsg::RemoveSession(id)).await;
    }

    /// Post the remove command to the parent channel and unregister from
    /// the scheduler. Idempotent.
    pub fn dispose(&self) {
        run_disposer(&self.disposer);
    }
}

impl<S: RoomSession> std::fmt::Debug for RoomHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomHandle").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Builds and tears down the world → channel → room topology on one tick
/// scheduler.
pub struct RoomServer<S: RoomSession> {
    scheduler: TickScheduler,
    _session: PhantomData<fn() -> S>,
}

impl<S: RoomSession> RoomServer<S> {
    /// Wrap a scheduler.
    #[must_use]
    pub fn new(scheduler: TickScheduler) -> Self {
        Self { scheduler, _session: PhantomData }
    }

    /// The underlying scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &TickScheduler {
        &self.scheduler
    }

    /// The scheduler's tick notifier.
    #[must_use]
    pub fn notifier(&self) -> TickNotifier {
        self.scheduler.notifier()
    }

    /// Create and register a world actor.
    pub fn create_world(&self, id: WorldId) -> Result<WorldHandle<S>, ServerError> {
        let host = ActorHost::new(WorldActor::<S>::new(id));
        let mailbox = host.handle();
        let sub = self.scheduler.register(host)?;

        let scheduler = self.scheduler.clone();
        let disposer: Disposer = Arc::new(Mutex::new(Some(Box::new(move || {
            scheduler.unregister(sub);
        }))));

        tracing::info!(world = %id, "world created");
        Ok(WorldHandle { id, mailbox, disposer })
    }

    /// Create a channel actor, register it, and announce it to its world.
    pub fn create_channel(
        &self,
        world: &WorldHandle<S>,
        id: ChannelId,
    ) -> Result<ChannelHandle<S>, ServerError> {
        let host = ActorHost::new(ChannelActor::<S>::new(id));
        let mailbox = host.handle();
        let sub = self.scheduler.register(host)?;

        let _ = world.mailbox().try_post(WorldMsg::RegisterChannel { id, handle: mailbox.clone() });

        let scheduler = self.scheduler.clone();
        let parent = world.mailbox();
        let disposer: Disposer = Arc::new(Mutex::new(Some(Box::new(move || {
            let _ = parent.try_post(WorldMsg::RemoveChannel(id));
            scheduler.unregister(sub);
        }))));

        tracing::info!(world = %world.id(), channel = %id, "channel created");
        Ok(ChannelHandle { id, mailbox, disposer })
    }

    /// Create a room actor, register it, and announce it to its channel.
    pub fn create_room(
        &self,
        channel: &ChannelHandle<S>,
        id: RoomId,
    ) -> Result<RoomHandle<S>, ServerError> {
        let host = ActorHost::new(RoomActor::<S>::new(id));
        let mailbox = host.handle();
        let sub = self.scheduler.register(host)?;

        let _ =
            channel.mailbox().try_post(ChannelMsg::RegisterRoom { id, handle: mailbox.clone() });

        let scheduler = self.scheduler.clone();
        let parent = channel.mailbox();
        let disposer: Disposer = Arc::new(Mutex::new(Some(Box::new(move || {
            let _ = parent.try_post(ChannelMsg::RemoveRoom(id));
            scheduler.unregister(sub);
        }))));

        tracing::info!(channel = %channel.id(), room = %id, "room created");
        Ok(RoomHandle { id, mailbox, disposer })
    }
}

impl<S: RoomSession> std::fmt::Debug for RoomServer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomServer").field("scheduler", &self.scheduler).finish()
    }
}
