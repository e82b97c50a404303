//! Channel connection handling.
//!
//! A freshly accepted channel connection is nothing but a migration-ticket
//! bearer. The gateway hands it a handshake with fresh random round keys,
//! pumps it, and demands the migration handshake as the very first packet:
//! the client session id, account id, and character id the login service
//! put in the ticket. Only when the ticket consumes cleanly and the
//! character loads does a [`Session`] exist and join the room.
//!
//! Whatever happens after that - client disconnect, pump cancellation,
//! root shutdown - the tail of the handler posts the session's removal and
//! tells the session manager, exactly once.

use std::{net::SocketAddr, sync::Arc};

use shroom_crypto::{RoundKey, SharedCryptoContext, ShroomVersion};
use shroom_net::{ConnPump, FramedConn, Handshake, LocaleCode, Packet, PumpConfig};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::{
    AccountId, CharacterId, PlayerSession, RoomHandle, ServerError, Session, SessionManager,
    store::{Character, CharacterStore, StoreError},
};

/// Smallest legal migration handshake: `u64` + two `i32`s.
const MIN_MIGRATION_LEN: usize = 8 + 4 + 4;

/// Why a channel migration was rejected.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// The connection closed before sending its first packet.
    #[error("connection closed before the migration handshake")]
    Disconnected,

    /// First packet shorter than the migration handshake.
    #[error("migration handshake too short ({0} bytes)")]
    ShortHandshake(usize),

    /// No ticket: absent, expired, or presented from the wrong address.
    #[error("ticket missing, expired, or address-mismatched")]
    TicketRejected,

    /// The packet's ids do not match the ticket's.
    #[error("ticket identity mismatch")]
    IdentityMismatch,

    /// The ticket's character is gone from the store.
    #[error("character {0} not found")]
    UnknownCharacter(CharacterId),

    /// Character store failure during authentication.
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

/// Accepts channel connections and migrates ticketed clients into a room.
pub struct ChannelGateway<C: CharacterStore> {
    ctx: SharedCryptoContext,
    manager: SessionManager<C>,
    room: RoomHandle<Session<PlayerSession>>,
    version: ShroomVersion,
    sub_version: String,
    locale: LocaleCode,
    pump_config: PumpConfig,
}

impl<C: CharacterStore> Clone for ChannelGateway<C> {
    fn clone(&self) -> Self {
        Self {
            ctx: Arc::clone(&self.ctx),
            manager: self.manager.clone(),
            room: self.room.clone(),
            version: self.version,
            sub_version: self.sub_version.clone(),
            locale: self.locale,
            pump_config: self.pump_config,
        }
    }
}

impl<C: CharacterStore> ChannelGateway<C> {
    /// Create a gateway feeding `room`.
    #[must_use]
    pub fn new(
        ctx: SharedCryptoContext,
        manager: SessionManager<C>,
        room: RoomHandle<Session<PlayerSession>>,
        version: ShroomVersion,
        sub_version: String,
        locale: LocaleCode,
    ) -> Self {
        Self {
            ctx,
            manager,
            room,
            version,
            sub_version,
            locale,
            pump_config: PumpConfig::default(),
        }
    }

    /// Accept-loop over `listener` until `cancel` fires.
    pub async fn serve(self, listener: TcpListener, cancel: CancellationToken) {
        loop {
            let accepted = tokio::select! {
                () = cancel.cancelled() => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    let gateway = self.clone();
                    let cancel = cancel.clone();
                    tokio::spawn(async move {
                        if let Err(e) = gateway.handle_connection(stream, peer, cancel).await {
                            tracing::debug!(%peer, "channel connection ended: {e}");
                        }
                    });
                },
                Err(e) => {
                    tracing::warn!("channel accept failed: {e}");
                },
            }
        }
    }

    /// Drive one connection from accept to teardown.
    pub async fn handle_connection(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        cancel: CancellationToken,
    ) -> Result<(), ServerError> {
        let _ = stream.set_nodelay(true);

        let handshake = self.fresh_handshake()?;
        let conn = FramedConn::accept(stream, Arc::clone(&self.ctx), &handshake).await?;
        let mut pump = ConnPump::spawn(conn, self.pump_config, &cancel);

        let character = match self.authenticate(&mut pump, peer, &cancel).await {
            Ok(character) => character,
            Err(e) => {
                tracing::warn!(%peer, "channel migration rejected: {e}");
                let handle = pump.handle();
                handle.cancel();
                handle.done().await;
                return Err(e.into());
            },
        };

        let (session_id, logic) = self.manager.create_player_session(pump.handle(), character);
        let pump_handle = pump.handle();
        let session = Session::new(session_id, pump, logic);

        self.room.add_session(session).await;
        tracing::info!(%peer, session = %session_id, room = %self.room.id(), "client migrated in");

        // Runs until client disconnect or cancellation, whichever first.
        pump_handle.done().await;

        self.room.remove_session(session_id).await;
        self.manager.notify_closed(session_id);
        Ok(())
    }

    /// Validate the first inbound packet against a migration ticket.
    async fn authenticate(
        &self,
        pump: &mut ConnPump,
        peer: SocketAddr,
        cancel: &CancellationToken,
    ) -> Result<Character, MigrationError> {
        let packet: Packet = tokio::select! {
            () = cancel.cancelled() => return Err(MigrationError::Disconnected),
            pkt = pump.recv() => pkt.ok_or(MigrationError::Disconnected)?,
        };

        if packet.len() < MIN_MIGRATION_LEN {
            return Err(MigrationError::ShortHandshake(packet.len()));
        }

        let mut r = packet.reader();
        let (client_session_id, account_id, character_id) = match (
            r.read_u64(),
            r.read_i32(),
            r.read_i32(),
        ) {
            (Ok(sid), Ok(acc), Ok(chr)) => (sid, acc, chr),
            _ => return Err(MigrationError::ShortHandshake(packet.len())),
        };

        let ticket = self
            .manager
            .try_consume_ticket(client_session_id, peer)
            .ok_or(MigrationError::TicketRejected)?;

        if ticket.account_id != AccountId(account_id as u32)
            || ticket.character_id != CharacterId(character_id as u32)
        {
            return Err(MigrationError::IdentityMismatch);
        }

        self.manager
            .load_character(ticket.character_id)?
            .ok_or(MigrationError::UnknownCharacter(ticket.character_id))
    }

    /// A handshake with fresh random round keys for one connection.
    fn fresh_handshake(&self) -> Result<Handshake, ServerError> {
        Ok(Handshake {
            version: self.version,
            sub_version: self.sub_version.clone(),
            send_key: random_round_key()?,
            recv_key: random_round_key()?,
            locale: self.locale,
        })
    }
}

impl<C: CharacterStore> std::fmt::Debug for ChannelGateway<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelGateway")
            .field("room", &self.room.id())
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// A random round key from the OS RNG.
pub(crate) fn random_round_key() -> Result<RoundKey, ServerError> {
    let mut bytes = [0u8; 4];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| ServerError::Config(format!("OS RNG unavailable: {e}")))?;
    Ok(RoundKey::from_bytes(bytes))
}
