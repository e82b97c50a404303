//! Rolling round key.

use crate::IgContext;

/// 32-bit rolling key, one per connection direction.
///
/// The round key seeds the keystream cipher and supplies the header
/// integrity field. It advances through [`RoundKey::update`] exactly once
/// per encrypted or decrypted packet; sender and receiver stay in lockstep
/// because both apply the same progression at the same point in the frame
/// exchange.
///
/// Value semantics: updating returns the successor rather than mutating
/// shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoundKey(u32);

impl RoundKey {
    /// Wrap a raw key value.
    #[must_use]
    pub const fn new(key: u32) -> Self {
        Self(key)
    }

    /// Interpret four bytes as a little-endian key.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(u32::from_le_bytes(bytes))
    }

    /// Raw value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Little-endian byte form, as carried in the handshake.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    /// Expand into the 16-byte keystream seed by repeating the
    /// little-endian key four times.
    #[must_use]
    pub fn expand(self) -> [u8; 16] {
        let b = self.0.to_le_bytes();
        let mut seed = [0u8; 16];
        for chunk in seed.chunks_exact_mut(4) {
            chunk.copy_from_slice(&b);
        }
        seed
    }

    /// The 16-bit header key: the high half of the rolling key.
    #[must_use]
    pub const fn header_key(self) -> u16 {
        (self.0 >> 16) as u16
    }

    /// Advance to the successor key via the schedule in `ctx`.
    #[must_use]
    pub fn update(self, ctx: &IgContext) -> Self {
        Self(ctx.next_key(self.0))
    }
}
