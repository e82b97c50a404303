//! Encrypted framed connection.
//!
//! Owns one byte stream and both cipher directions. The server writes the
//! plaintext handshake at accept time; the client reads it at connect time;
//! both then derive their cipher pair from the same key material. The
//! asymmetry is deliberate: the server's send direction must match the
//! client's receive direction, so the server sends with the receive key and
//! the inverted version.
//!
//! A framed connection is half-duplex-safe. One task may read while another
//! writes (see [`FramedConn::into_split`]); concurrent readers or concurrent
//! writers must be serialised externally - the connection pump does exactly
//! that.

use shroom_crypto::{PacketCipher, SharedCryptoContext, VersionBinding};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

use crate::{BufferPool, Handshake, NetError, NetResult, Packet};

/// Largest legal frame payload.
pub const MAX_PACKET_LEN: usize = 32767;

/// Reading half of a framed connection: header decode, exact-length payload
/// read, in-place decrypt.
pub struct FrameReader<R> {
    io: R,
    cipher: PacketCipher,
    header: [u8; 4],
    pool: BufferPool,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Build a reader from a stream half and its receive cipher.
    #[must_use]
    pub fn new(io: R, cipher: PacketCipher, pool: BufferPool) -> Self {
        Self { io, cipher, header: [0u8; 4], pool }
    }

    /// Read and decrypt the next frame.
    ///
    /// The payload buffer is rented only after the header validates and the
    /// length is in range; if the payload read fails the buffer returns to
    /// the pool before the error propagates.
    pub async fn read_packet(&mut self) -> NetResult<Packet> {
        self.io.read_exact(&mut self.header).await?;
        let len = self.cipher.decode_header(u32::from_le_bytes(self.header))?;
        if len == 0 || usize::from(len) > MAX_PACKET_LEN {
            return Err(NetError::FrameLength(usize::from(len)));
        }

        let mut buf = self.pool.rent(usize::from(len));
        self.io.read_exact(&mut buf).await?;
        self.cipher.decrypt(&mut buf);
        Ok(Packet::from_buf(buf))
    }
}

/// Writing half of a framed connection: header encode, in-place encrypt,
/// single write per frame.
pub struct FrameWriter<W> {
    io: W,
    cipher: PacketCipher,
    buf: Vec<u8>,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Build a writer from a stream half and its send cipher.
    #[must_use]
    pub fn new(io: W, cipher: PacketCipher) -> Self {
        Self { io, cipher, buf: Vec::with_capacity(MAX_PACKET_LEN + 4) }
    }

    /// Encrypt and write one frame as a single `len + 4` byte write.
    pub async fn send_packet(&mut self, data: &[u8]) -> NetResult<()> {
        if data.is_empty() || data.len() > MAX_PACKET_LEN {
            return Err(NetError::FrameLength(data.len()));
        }

        let header = self.cipher.encode_header(data.len() as u16);
        self.buf.clear();
        self.buf.extend_from_slice(&header.to_le_bytes());
        self.buf.extend_from_slice(data);
        self.cipher.encrypt(&mut self.buf[4..]);

        self.io.write_all(&self.buf).await?;
        self.io.flush().await?;
        Ok(())
    }

    /// Shut down the write side of the stream.
    pub async fn close(&mut self) -> NetResult<()> {
        self.io.shutdown().await?;
        Ok(())
    }
}

/// A handshaken, encrypted, length-prefixed framed connection.
pub struct FramedConn<T> {
    r: FrameReader<ReadHalf<T>>,
    w: FrameWriter<WriteHalf<T>>,
}

impl<T: AsyncRead + AsyncWrite + Unpin> FramedConn<T> {
    /// Server path: write the plaintext handshake, then derive send =
    /// `(recv_key, inverted)` and recv = `(send_key, plain)`.
    pub async fn accept(
        mut io: T,
        ctx: SharedCryptoContext,
        handshake: &Handshake,
    ) -> NetResult<Self> {
        handshake.write_to(&mut io).await?;

        let recv = PacketCipher::new(
            ctx.clone(),
            handshake.send_key,
            handshake.version,
            VersionBinding::Plain,
        );
        let send =
            PacketCipher::new(ctx, handshake.recv_key, handshake.version, VersionBinding::Inverted);

        Ok(Self::from_halves(io, recv, send))
    }

    /// Client path: read the plaintext handshake, then derive send =
    /// `(send_key, plain)` and recv = `(recv_key, inverted)`.
    pub async fn connect(mut io: T, ctx: SharedCryptoContext) -> NetResult<(Self, Handshake)> {
        let handshake = Handshake::read_from(&mut io).await?;

        let recv = PacketCipher::new(
            ctx.clone(),
            handshake.recv_key,
            handshake.version,
            VersionBinding::Inverted,
        );
        let send =
            PacketCipher::new(ctx, handshake.send_key, handshake.version, VersionBinding::Plain);

        Ok((Self::from_halves(io, recv, send), handshake))
    }

    fn from_halves(io: T, recv: PacketCipher, send: PacketCipher) -> Self {
        let (r, w) = tokio::io::split(io);
        Self {
            r: FrameReader::new(r, recv, BufferPool::global().clone()),
            w: FrameWriter::new(w, send),
        }
    }

    /// Read and decrypt the next frame.
    pub async fn read_packet(&mut self) -> NetResult<Packet> {
        self.r.read_packet().await
    }

    /// Encrypt and write one frame.
    pub async fn send_packet(&mut self, data: &[u8]) -> NetResult<()> {
        self.w.send_packet(data).await
    }

    /// Split into independent read and write halves, one per pump loop.
    #[must_use]
    pub fn into_split(self) -> (FrameReader<ReadHalf<T>>, FrameWriter<WriteHalf<T>>) {
        (self.r, self.w)
    }
}
