//! Shared immutable cipher context.

use std::sync::Arc;

use aes::{
    Aes256,
    cipher::{KeyInit, generic_array::GenericArray},
};

use crate::IgContext;

/// The legacy 32-byte keystream key.
const DEFAULT_AES_KEY: [u8; 32] = [
    0x13, 0x00, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x06, 0x00, 0x00, 0x00, 0xB4, 0x00, 0x00,
    0x00, 0x1B, 0x00, 0x00, 0x00, 0x0F, 0x00, 0x00, 0x00, 0x33, 0x00, 0x00, 0x00, 0x52, 0x00,
    0x00, 0x00,
];

/// Immutable state shared by every cipher on every connection: the expanded
/// AES key schedule and the round-key progression table.
///
/// Construct once per process and share via [`SharedCryptoContext`]; the
/// per-direction mutable state lives in [`crate::PacketCipher`].
#[derive(Clone)]
pub struct CryptoContext {
    aes: Aes256,
    ig: IgContext,
}

/// Cheaply cloneable handle to a [`CryptoContext`].
pub type SharedCryptoContext = Arc<CryptoContext>;

impl Default for CryptoContext {
    fn default() -> Self {
        Self::new(DEFAULT_AES_KEY, IgContext::default())
    }
}

impl CryptoContext {
    /// Build a context from an AES key and a key-schedule context.
    #[must_use]
    pub fn new(aes_key: [u8; 32], ig: IgContext) -> Self {
        let aes = Aes256::new(GenericArray::from_slice(&aes_key));
        Self { aes, ig }
    }

    /// Expanded AES key schedule for the keystream cipher.
    #[must_use]
    pub fn aes(&self) -> &Aes256 {
        &self.aes
    }

    /// Round-key progression table.
    #[must_use]
    pub fn ig(&self) -> &IgContext {
        &self.ig
    }
}

impl std::fmt::Debug for CryptoContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoContext").finish_non_exhaustive()
    }
}
