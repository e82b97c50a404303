//! Login connection handling.
//!
//! The login surface is deliberately thin: it hands out guest accounts,
//! lists the topology, and issues the migration tickets the channel
//! gateways consume. A login connection is request/reply over one framed
//! connection - no session, no room, no tick involvement.

use std::{net::SocketAddr, sync::Arc};

use shroom_crypto::{SharedCryptoContext, ShroomVersion};
use shroom_net::{FramedConn, Handshake, LocaleCode, NetResult, Packet, PacketWriter};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::{
    ChannelId, ServerError, SessionManager, WorldId, handler::random_round_key, op,
    store::CharacterStore,
};

/// A channel as advertised to clients.
#[derive(Debug, Clone)]
pub struct ChannelEndpoint {
    /// The channel's id.
    pub id: ChannelId,
    /// Address clients connect to.
    pub addr: SocketAddr,
}

/// Accepts login connections, issues guest accounts and migration tickets.
pub struct LoginGateway<C: CharacterStore> {
    ctx: SharedCryptoContext,
    manager: SessionManager<C>,
    world: WorldId,
    channels: Vec<ChannelEndpoint>,
    version: ShroomVersion,
    sub_version: String,
    locale: LocaleCode,
}

impl<C: CharacterStore> Clone for LoginGateway<C> {
    fn clone(&self) -> Self {
        Self {
            ctx: Arc::clone(&self.ctx),
            manager: self.manager.clone(),
            world: self.world,
            channels: self.channels.clone(),
            version: self.version,
            sub_version: self.sub_version.clone(),
            locale: self.locale,
        }
    }
}

impl<C: CharacterStore> LoginGateway<C> {
    /// Create a gateway advertising `channels` of `world`.
    #[must_use]
    pub fn new(
        ctx: SharedCryptoContext,
        manager: SessionManager<C>,
        world: WorldId,
        channels: Vec<ChannelEndpoint>,
        version: ShroomVersion,
        sub_version: String,
        locale: LocaleCode,
    ) -> Self {
        Self { ctx, manager, world, channels, version, sub_version, locale }
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
                            tracing::debug!(%peer, "login connection ended: {e}");
                        }
                    });
                },
                Err(e) => {
                    tracing::warn!("login accept failed: {e}");
                },
            }
        }
    }

    /// Request/reply loop for one login connection.
    pub async fn handle_connection(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        cancel: CancellationToken,
    ) -> Result<(), ServerError> {
        let _ = stream.set_nodelay(true);

        let handshake = Handshake {
            version: self.version,
            sub_version: self.sub_version.clone(),
            send_key: random_round_key()?,
            recv_key: random_round_key()?,
            locale: self.locale,
        };
        let mut conn = FramedConn::accept(stream, Arc::clone(&self.ctx), &handshake).await?;

        loop {
            let packet = tokio::select! {
                () = cancel.cancelled() => break,
                pkt = conn.read_packet() => match pkt {
                    Ok(pkt) => pkt,
                    Err(e) => {
                        tracing::debug!(%peer, "login read ended: {e}");
                        break;
                    },
                },
            };

            let reply = match packet.opcode() {
                Some(op::GUEST_LOGIN_REQ) => Some(self.guest_login(&packet, peer)?),
                Some(op::WORLD_LIST_REQ) => Some(self.world_list()?),
                other => {
                    tracing::debug!(%peer, opcode = ?other, "unhandled login opcode");
                    None
                },
            };

            if let Some(reply) = reply {
                conn.send_packet(reply.as_ref()).await?;
            }
        }

        Ok(())
    }

    /// Create a guest account + default character, issue a ticket bound to
    /// `peer`, and describe the migration target.
    fn guest_login(&self, packet: &Packet, peer: SocketAddr) -> Result<Packet, ServerError> {
        let mut r = packet.reader();
        let _opcode = r.read_u16();
        let channel_index = usize::from(r.read_u16().unwrap_or(0)) % self.channels.len();
        let channel = &self.channels[channel_index];

        let account = self.manager.create_guest_account()?;
        let character = self.manager.ensure_default_character(account.id)?;
        let ticket = self.manager.create_ticket(account.id, character.id, peer)?;

        tracing::info!(
            %peer,
            account = %account.id,
            channel = %channel.id,
            "guest login, ticket issued"
        );

        let mut w = PacketWriter::new();
        w.write_opcode(op::MIGRATE_INFO);
        write_endpoint(&mut w, channel.addr)?;
        w.write_u64(ticket.client_session_id);
        w.write_i32(account.id.raw() as i32);
        w.write_i32(character.id.raw() as i32);
        Ok(w.into_packet())
    }

    /// Describe the world and its channels.
    fn world_list(&self) -> Result<Packet, ServerError> {
        let mut w = PacketWriter::new();
        w.write_opcode(op::WORLD_LIST);
        w.write_u32(self.world.raw());
        w.write_u8(self.channels.len() as u8);
        for channel in &self.channels {
            w.write_u32(channel.id.raw());
            write_endpoint(&mut w, channel.addr)?;
        }
        Ok(w.into_packet())
    }
}

impl<C: CharacterStore> std::fmt::Debug for LoginGateway<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginGateway")
            .field("world", &self.world)
            .field("channels", &self.channels.len())
            .finish_non_exhaustive()
    }
}

fn write_endpoint(w: &mut PacketWriter, addr: SocketAddr) -> NetResult<()> {
    w.write_str(&addr.ip().to_string())?;
    w.write_u16(addr.port());
    Ok(())
}
