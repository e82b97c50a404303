//! Shroom wire layer.
//!
//! Everything between a TCP socket and a gameplay session lives here:
//!
//! - [`BufferPool`] / [`PooledBuf`]: process-wide byte pool with
//!   return-on-drop semantics
//! - [`Packet`]: exclusively owned pooled payload, first two bytes the
//!   little-endian opcode
//! - [`PacketReader`] / [`PacketWriter`]: little-endian primitive codec
//!   with Latin-1 strings and millisecond durations
//! - [`Handshake`]: the plaintext hello that seeds both cipher directions
//! - [`FramedConn`]: encrypted length-prefixed framing over any byte stream
//! - [`ConnPump`]: bounded inbound/outbound channels over a framed
//!   connection, with backpressure on both sides
//!
//! The pump is the only component that writes concurrently-produced packets
//! to a connection; the framed connection itself is half-duplex-safe only.

mod conn;
mod error;
mod handshake;
mod packet;
mod pool;
mod pump;
mod reader;
mod writer;

pub use conn::{FrameReader, FrameWriter, FramedConn, MAX_PACKET_LEN};
pub use error::NetError;
pub use handshake::{Handshake, LocaleCode, MAX_HANDSHAKE_LEN};
pub use packet::Packet;
pub use pool::{BufferPool, PooledBuf};
pub use pump::{ConnPump, PumpConfig, PumpHandle};
pub use reader::{DecodePacket, PacketReader};
pub use writer::{EncodePacket, PacketWriter};

/// Result alias for wire-layer operations.
pub type NetResult<T> = Result<T, NetError>;
