//! Bidirectional connection pump.
//!
//! Wraps a framed connection with two bounded channels and two loops:
//!
//! - **inbound**: the receive loop pushes decoded packets; when the channel
//!   fills the loop suspends, which stops reading the socket and lets TCP
//!   backpressure reach the peer.
//! - **outbound**: session senders enqueue packets; the send loop writes
//!   them in order and drops each one right after its write completes. A
//!   failed write still drops the packet and shuts the pump down.
//!
//! [`ConnPump::try_send`] is the slow-consumer probe: it returns `false`
//! when the outbound queue is full instead of waiting. Cancelling the
//! pump's token stops both loops and drops the connection halves; the
//! completion handle resolves once both loops have exited.

use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;

use crate::{FramedConn, NetError, NetResult, Packet};

/// Channel bounds for a pump.
#[derive(Debug, Clone, Copy)]
pub struct PumpConfig {
    /// Inbound channel capacity (wire to session).
    pub inbound_capacity: usize,
    /// Outbound channel capacity (session to wire).
    pub outbound_capacity: usize,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self { inbound_capacity: 256, outbound_capacity: 128 }
    }
}

/// Cloneable control handle: cancellation plus completion.
#[derive(Debug, Clone)]
pub struct PumpHandle {
    cancel: CancellationToken,
    finished: CancellationToken,
}

impl PumpHandle {
    /// Stop both loops and drop the connection.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Resolves once both pump loops have exited.
    pub async fn done(&self) {
        self.finished.cancelled().await;
    }

    /// Whether the pump has fully shut down.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished.is_cancelled()
    }
}

/// The session-facing ends of a pumped connection.
pub struct ConnPump {
    inbound: mpsc::Receiver<Packet>,
    outbound: mpsc::Sender<Packet>,
    handle: PumpHandle,
}

impl ConnPump {
    /// Spawn the receive and send loops for `conn`.
    ///
    /// The pump's token is a child of `parent`: cancelling the parent tears
    /// down every pump under it.
    #[must_use]
    pub fn spawn<T>(conn: FramedConn<T>, config: PumpConfig, parent: &CancellationToken) -> Self
    where
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let cancel = parent.child_token();
        let finished = CancellationToken::new();

        let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_capacity);

        let (reader, writer) = conn.into_split();

        let read_task = tokio::spawn(read_loop(reader, inbound_tx, cancel.clone()));
        let write_task = tokio::spawn(write_loop(writer, outbound_rx, cancel.clone()));

        let finished_tx = finished.clone();
        tokio::spawn(async move {
            let _ = tokio::join!(read_task, write_task);
            finished_tx.cancel();
        });

        Self {
            inbound: inbound_rx,
            outbound: outbound_tx,
            handle: PumpHandle { cancel, finished },
        }
    }

    /// Control handle for cancellation and completion.
    #[must_use]
    pub fn handle(&self) -> PumpHandle {
        self.handle.clone()
    }

    /// Pop one inbound packet without waiting.
    pub fn try_recv(&mut self) -> Option<Packet> {
        self.inbound.try_recv().ok()
    }

    /// Await the next inbound packet; `None` once the receive loop is gone.
    pub async fn recv(&mut self) -> Option<Packet> {
        self.inbound.recv().await
    }

    /// Enqueue without waiting. `false` means the outbound queue was full
    /// (the slow-consumer signal) or the pump is gone; the packet is
    /// dropped either way.
    pub fn try_send(&self, packet: Packet) -> bool {
        self.outbound.try_send(packet).is_ok()
    }

    /// Enqueue, waiting for outbound space.
    pub async fn send(&self, packet: Packet) -> NetResult<()> {
        self.outbound.send(packet).await.map_err(|_| NetError::PumpClosed)
    }
}

impl std::fmt::Debug for ConnPump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnPump").field("finished", &self.handle.is_finished()).finish()
    }
}

async fn read_loop<R: AsyncRead + Unpin>(
    mut reader: crate::FrameReader<tokio::io::ReadHalf<R>>,
    inbound: mpsc::Sender<Packet>,
    cancel: CancellationToken,
) {
    loop {
        let packet = tokio::select! {
            () = cancel.cancelled() => break,
            res = reader.read_packet() => match res {
                Ok(packet) => packet,
                Err(e) => {
                    tracing::debug!("receive loop stopping: {e}");
                    break;
                },
            },
        };

        // A full inbound channel suspends us here; the socket stops being
        // read and TCP backpressure builds toward the peer.
        tokio::select! {
            () = cancel.cancelled() => break,
            res = inbound.send(packet) => {
                if res.is_err() {
                    break;
                }
            },
        }
    }
    cancel.cancel();
}

async fn write_loop<W: AsyncWrite + Unpin>(
    mut writer: crate::FrameWriter<tokio::io::WriteHalf<W>>,
    mut outbound: mpsc::Receiver<Packet>,
    cancel: CancellationToken,
) {
    loop {
        let packet = tokio::select! {
            () = cancel.cancelled() => break,
            msg = outbound.recv() => match msg {
                Some(packet) => packet,
                None => break,
            },
        };

        let result = writer.send_packet(packet.as_ref()).await;
        drop(packet);
        if let Err(e) = result {
            tracing::debug!("send loop stopping: {e}");
            break;
        }
    }
    let _ = writer.close().await;
    cancel.cancel();
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use shroom_crypto::{CryptoContext, RoundKey, ShroomVersion};
    use tokio_util::sync::CancellationToken;

    use super::{ConnPump, PumpConfig};
    use crate::{FramedConn, Handshake, LocaleCode, PacketWriter};

    fn handshake() -> Handshake {
        Handshake {
            version: ShroomVersion::new(95),
            sub_version: "1".to_string(),
            send_key: RoundKey::new(0x0101_0202),
            recv_key: RoundKey::new(0x0303_0404),
            locale: LocaleCode::Global,
        }
    }

    async fn pump_pair() -> (ConnPump, ConnPump) {
        let ctx = Arc::new(CryptoContext::default());
        let (client_io, server_io) = tokio::io::duplex(65536);
        let root = CancellationToken::new();

        let hs = handshake();
        let server_fut = FramedConn::accept(server_io, ctx.clone(), &hs);
        let client_fut = FramedConn::connect(client_io, ctx);
        let (server_conn, client_conn) = tokio::join!(server_fut, client_fut);

        let server = ConnPump::spawn(server_conn.unwrap(), PumpConfig::default(), &root);
        let client = ConnPump::spawn(client_conn.unwrap().0, PumpConfig::default(), &root);
        (server, client)
    }

    fn packet_of(text: &str) -> crate::Packet {
        let mut w = PacketWriter::new();
        w.write_str(text).unwrap();
        w.into_packet()
    }

    #[tokio::test]
    async fn packets_flow_both_ways_in_order() {
        let (mut server, mut client) = pump_pair().await;

        for i in 0..8 {
            client.send(packet_of(&format!("c{i}"))).await.unwrap();
        }
        for i in 0..8 {
            let pkt = server.recv().await.unwrap();
            assert_eq!(pkt.reader().read_str().unwrap(), format!("c{i}"));
        }

        server.send(packet_of("pong")).await.unwrap();
        let pkt = client.recv().await.unwrap();
        assert_eq!(pkt.reader().read_str().unwrap(), "pong");
    }

    #[tokio::test]
    async fn try_send_reports_full_outbound_queue() {
        let ctx = Arc::new(CryptoContext::default());
        // Tiny duplex buffer so the send loop itself backs up.
        let (client_io, server_io) = tokio::io::duplex(64);
        let root = CancellationToken::new();

        let hs = handshake();
        let server_fut = FramedConn::accept(server_io, ctx.clone(), &hs);
        let client_fut = FramedConn::connect(client_io, ctx);
        let (server_conn, client_conn) = tokio::join!(server_fut, client_fut);
        let _server_conn = server_conn.unwrap();

        let config = PumpConfig { inbound_capacity: 4, outbound_capacity: 2 };
        let client = ConnPump::spawn(client_conn.unwrap().0, config, &root);

        // Nobody drains the server side, so the queue must eventually refuse.
        let mut saw_full = false;
        for _ in 0..64 {
            if !client.try_send(packet_of("flood")) {
                saw_full = true;
                break;
            }
        }
        assert!(saw_full, "outbound queue never reported full");
    }

    #[tokio::test]
    async fn cancel_resolves_completion() {
        let (server, _client) = pump_pair().await;
        let handle = server.handle();
        assert!(!handle.is_finished());

        handle.cancel();
        handle.done().await;
        assert!(handle.is_finished());
    }

    #[tokio::test]
    async fn peer_disconnect_resolves_completion() {
        let (server, client) = pump_pair().await;
        let handle = server.handle();

        client.handle().cancel();
        client.handle().done().await;

        handle.done().await;
        assert!(handle.is_finished());
    }
}
