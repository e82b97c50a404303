//! Network session.
//!
//! A session marries one connection pump to one gameplay logic object and
//! lives inside exactly one room actor. The room drives it on the tick:
//! the tick phase drains inbound packets into the logic, the tick-end
//! phase services the slow-consumer flag raised by a failed `try_send`
//! during the tick.

use shroom_act::Ticks;
use shroom_net::{ConnPump, NetResult, Packet, PacketReader, PumpHandle};
use tokio_util::sync::CancellationToken;

use crate::{RoomSession, SessionId};

/// Gameplay logic driven by a [`Session`].
///
/// Implementations hold the in-game state for one player; every hook runs
/// on the tick loop, so no synchronisation is needed inside.
pub trait SessionLogic: Send + 'static {
    /// Handle one inbound packet. The packet is disposed by the session
    /// right after this returns.
    fn handle_packet(&mut self, reader: &mut PacketReader<'_>, now: Ticks);

    /// Per-tick work after the inbound drain.
    fn on_tick(&mut self, now: Ticks) {
        let _ = now;
    }

    /// End-of-tick work, after slow-consumer handling.
    fn on_tick_end(&mut self, now: Ticks) {
        let _ = now;
    }

    /// The outbound queue overflowed during this tick. Decide here: shed
    /// load, schedule removal, or just recover.
    fn on_slow_consumer(&mut self, now: Ticks) {
        let _ = now;
    }

    /// A packet was accepted into the outbound queue.
    fn on_send_succeeded(&mut self) {}
}

/// One connected player: pump + logic + slow-consumer flag.
pub struct Session<L: SessionLogic> {
    id: SessionId,
    pump: ConnPump,
    logic: L,
    slow: bool,
}

impl<L: SessionLogic> Session<L> {
    /// Bind `logic` to a pumped connection.
    #[must_use]
    pub fn new(id: SessionId, pump: ConnPump, logic: L) -> Self {
        Self { id, pump, logic, slow: false }
    }

    /// The session's id.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.id
    }

    /// The pump's control handle.
    #[must_use]
    pub fn pump_handle(&self) -> PumpHandle {
        self.pump.handle()
    }

    /// The logic object.
    #[must_use]
    pub fn logic(&self) -> &L {
        &self.logic
    }

    /// The logic object, mutably.
    pub fn logic_mut(&mut self) -> &mut L {
        &mut self.logic
    }

    /// Whether the outbound queue overflowed during the current tick.
    #[must_use]
    pub fn is_slow(&self) -> bool {
        self.slow
    }

    /// Non-blocking send. On overflow the packet is dropped, the session
    /// is marked slow for this tick, and `false` comes back.
    pub fn try_send(&mut self, packet: Packet) -> bool {
        if self.pump.try_send(packet) {
            self.logic.on_send_succeeded();
            true
        } else {
            self.slow = true;
            false
        }
    }

    /// Blocking send: waits for outbound space unless `cancel` fires.
    pub async fn send_async(&mut self, packet: Packet, cancel: &CancellationToken) -> NetResult<()> {
        tokio::select! {
            () = cancel.cancelled() => Err(shroom_net::NetError::PumpClosed),
            res = self.pump.send(packet) => {
                res?;
                self.logic.on_send_succeeded();
                Ok(())
            },
        }
    }
}

impl<L: SessionLogic> RoomSession for Session<L> {
    fn id(&self) -> SessionId {
        self.id
    }

    fn tick(&mut self, now: Ticks) {
        while let Some(packet) = self.pump.try_recv() {
            let mut reader = packet.reader();
            self.logic.handle_packet(&mut reader, now);
            drop(packet);
        }
        self.logic.on_tick(now);
    }

    fn tick_end(&mut self, now: Ticks) {
        if self.slow {
            self.logic.on_slow_consumer(now);
            self.slow = false;
        }
        self.logic.on_tick_end(now);
    }
}

impl<L: SessionLogic> Drop for Session<L> {
    // Disposing the session tears the connection down with it.
    fn drop(&mut self) {
        self.pump.handle().cancel();
    }
}

impl<L: SessionLogic> std::fmt::Debug for Session<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("id", &self.id).field("slow", &self.slow).finish()
    }
}
