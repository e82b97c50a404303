//! Little-endian packet writer.

use std::time::Duration;

use crate::{BufferPool, NetError, NetResult, Packet, PooledBuf};

/// Encode a composite message onto a writer.
pub trait EncodePacket {
    /// Write the message's fields in wire order.
    fn encode(&self, w: &mut PacketWriter) -> NetResult<()>;
}

/// Incremental packet builder over a pooled buffer.
///
/// Mirrors every [`crate::PacketReader`] operation and finalises into a
/// [`Packet`] without copying: the written buffer becomes the packet's
/// buffer.
pub struct PacketWriter {
    buf: PooledBuf,
}

macro_rules! write_primitive {
    ($(($name:ident, $ty:ty)),* $(,)?) => {
        $(
            #[doc = concat!("Write a little-endian `", stringify!($ty), "`.")]
            pub fn $name(&mut self, value: $ty) {
                self.buf.extend_from_slice(&value.to_le_bytes());
            }
        )*
    };
}

impl PacketWriter {
    /// Create a writer renting from the global pool.
    #[must_use]
    pub fn new() -> Self {
        Self::with_pool(BufferPool::global())
    }

    /// Create a writer renting from `pool`.
    #[must_use]
    pub fn with_pool(pool: &BufferPool) -> Self {
        Self { buf: pool.rent_empty(128) }
    }

    /// Bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    write_primitive![
        (write_u8, u8),
        (write_i8, i8),
        (write_u16, u16),
        (write_i16, i16),
        (write_u32, u32),
        (write_i32, i32),
        (write_u64, u64),
        (write_i64, i64),
        (write_u128, u128),
        (write_i128, i128),
    ];

    /// Write the leading opcode.
    pub fn write_opcode(&mut self, opcode: u16) {
        self.write_u16(opcode);
    }

    /// Write a boolean as one byte.
    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(u8::from(value));
    }

    /// Write raw bytes.
    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Write a Latin-1 string with a 16-bit signed length prefix.
    pub fn write_str(&mut self, value: &str) -> NetResult<()> {
        let len = value.chars().count();
        if len > i16::MAX as usize {
            return Err(NetError::StringTooLong { len, field: i16::MAX as usize });
        }
        self.write_i16(len as i16);
        push_latin1(&mut self.buf, value)
    }

    /// Write a fixed-size zero-padded Latin-1 string field of `field` bytes.
    ///
    /// Fails if the value plus its trailing NUL exceeds the field.
    pub fn write_str_fixed(&mut self, value: &str, field: usize) -> NetResult<()> {
        let len = value.chars().count();
        if len + 1 > field {
            return Err(NetError::StringTooLong { len: len + 1, field });
        }
        push_latin1(&mut self.buf, value)?;
        for _ in len..field {
            self.buf.extend_from_slice(&[0]);
        }
        Ok(())
    }

    /// Write a duration as 16-bit milliseconds.
    pub fn write_duration_millis_u16(&mut self, value: Duration) {
        self.write_u16(value.as_millis() as u16);
    }

    /// Write a duration as 32-bit milliseconds.
    pub fn write_duration_millis_u32(&mut self, value: Duration) {
        self.write_u32(value.as_millis() as u32);
    }

    /// Write a composite message.
    pub fn write_encode<E: EncodePacket>(&mut self, value: &E) -> NetResult<()> {
        value.encode(self)
    }

    /// Finalise the written bytes into a [`Packet`] without copying.
    #[must_use]
    pub fn into_packet(self) -> Packet {
        Packet::from_buf(self.buf)
    }
}

impl Default for PacketWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PacketWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketWriter").field("len", &self.len()).finish()
    }
}

/// Encode `value` as Latin-1, one byte per character.
fn push_latin1(buf: &mut PooledBuf, value: &str) -> NetResult<()> {
    for c in value.chars() {
        let code = u32::from(c);
        if code > 0xFF {
            return Err(NetError::NonLatin1Char(c));
        }
        buf.extend_from_slice(&[code as u8]);
    }
    Ok(())
}
