//! Player session logic.
//!
//! The gameplay-side object a [`crate::Session`] drives. Opcode-by-opcode
//! gameplay lives elsewhere; this object owns the loaded character, keeps
//! the per-tick bookkeeping honest, and enforces the slow-consumer policy:
//! a client whose outbound queue overflows for too many consecutive ticks
//! is disconnected.

use shroom_act::Ticks;
use shroom_net::{PacketReader, PumpHandle};

use crate::{SessionId, SessionLogic, store::Character};

/// Consecutive slow ticks before the connection is dropped.
const SLOW_TICK_LIMIT: u32 = 20;

/// Logic object for one connected player.
pub struct PlayerSession {
    session_id: SessionId,
    character: Character,
    pump: PumpHandle,
    slow_ticks: u32,
    slow_this_tick: bool,
    packets_seen: u64,
}

impl PlayerSession {
    /// Bind a loaded character to a connection's pump handle.
    #[must_use]
    pub fn new(session_id: SessionId, character: Character, pump: PumpHandle) -> Self {
        Self { session_id, character, pump, slow_ticks: 0, slow_this_tick: false, packets_seen: 0 }
    }

    /// The loaded character.
    #[must_use]
    pub fn character(&self) -> &Character {
        &self.character
    }

    /// Inbound packets handled so far.
    #[must_use]
    pub fn packets_seen(&self) -> u64 {
        self.packets_seen
    }

    /// Consecutive slow ticks observed.
    #[must_use]
    pub fn slow_ticks(&self) -> u32 {
        self.slow_ticks
    }
}

impl SessionLogic for PlayerSession {
    fn handle_packet(&mut self, reader: &mut PacketReader<'_>, _now: Ticks) {
        self.packets_seen += 1;
        match reader.read_u16() {
            Ok(opcode) => {
                tracing::trace!(session = %self.session_id, opcode, "inbound packet");
            },
            Err(e) => {
                tracing::warn!(session = %self.session_id, "short packet: {e}");
            },
        }
    }

    fn on_tick(&mut self, _now: Ticks) {}

    fn on_tick_end(&mut self, _now: Ticks) {
        // A tick with no overflow resets the strike counter.
        if !self.slow_this_tick {
            self.slow_ticks = 0;
        }
        self.slow_this_tick = false;
    }

    fn on_slow_consumer(&mut self, now: Ticks) {
        self.slow_this_tick = true;
        self.slow_ticks += 1;
        tracing::warn!(
            session = %self.session_id,
            strikes = self.slow_ticks,
            tick = %now,
            "slow consumer"
        );
        if self.slow_ticks >= SLOW_TICK_LIMIT {
            tracing::warn!(session = %self.session_id, "slow consumer limit hit, disconnecting");
            self.pump.cancel();
        }
    }
}

impl std::fmt::Debug for PlayerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerSession")
            .field("session_id", &self.session_id)
            .field("character", &self.character.id)
            .finish_non_exhaustive()
    }
}
