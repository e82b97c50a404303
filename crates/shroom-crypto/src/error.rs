//! Cipher error types.

/// Errors surfaced by the cipher layer.
///
/// A header-key mismatch is indistinguishable from a desynchronised cipher
/// stream; the only sound response is to close the connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    /// The decoded header key did not match the receive round key.
    #[error("packet header key mismatch (expected {expected:#06x}, got {got:#06x})")]
    HeaderKeyMismatch {
        /// High half of the local round key.
        expected: u16,
        /// Key recovered from the wire header.
        got: u16,
    },
}
