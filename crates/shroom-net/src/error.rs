//! Wire-layer error types.

use shroom_crypto::CryptoError;

/// Errors surfaced by the wire layer.
///
/// Framing and cipher errors are fatal for the connection they occur on:
/// the codec never resynchronises a stream, clients must reconnect. Decode
/// errors terminate the current frame's processing and close the connection.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// Underlying stream error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Header integrity failure; indistinguishable from a desynced cipher.
    #[error("cipher: {0}")]
    Crypto(#[from] CryptoError),

    /// Frame length outside `1..=32767`.
    #[error("frame length {0} out of range")]
    FrameLength(usize),

    /// Handshake length prefix outside `1..=128`.
    #[error("handshake length {0} out of range")]
    HandshakeLength(u16),

    /// A length-prefixed string carried a negative length.
    #[error("negative string length {0}")]
    NegativeStringLength(i16),

    /// A string did not fit its length prefix or fixed field.
    #[error("string of {len} bytes exceeds field of {field} bytes")]
    StringTooLong {
        /// Encoded byte length of the value (fixed fields include the
        /// trailing NUL).
        len: usize,
        /// Capacity of the destination field.
        field: usize,
    },

    /// A string contained a character outside the Latin-1 range.
    #[error("character {0:?} is not representable in Latin-1")]
    NonLatin1Char(char),

    /// A read ran past the end of the packet.
    #[error("unexpected end of packet ({needed} bytes needed, {remaining} remaining)")]
    Eof {
        /// Bytes the read required.
        needed: usize,
        /// Bytes left in the packet.
        remaining: usize,
    },

    /// Unknown locale byte in a handshake.
    #[error("invalid locale {0}")]
    InvalidLocale(u8),

    /// The connection pump has shut down.
    #[error("connection pump closed")]
    PumpClosed,
}
