//! Per-direction packet cipher state.

use crate::{CryptoError, RoundKey, SharedCryptoContext, ShroomVersion, header, keystream, shanda};

/// Which form of the protocol version a cipher direction binds.
///
/// The two directions of a connection are keyed with the plain version and
/// its bitwise inversion. The binding is fixed at construction so callers
/// never compute the inversion themselves: the client binds `Plain` for
/// sending and `Inverted` for receiving, the server the mirror image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionBinding {
    /// Bind the version as-is.
    Plain,
    /// Bind the bitwise inversion of the version.
    Inverted,
}

impl VersionBinding {
    fn bind(self, version: ShroomVersion) -> u16 {
        match self {
            Self::Plain => version.raw(),
            Self::Inverted => version.invert().raw(),
        }
    }
}

/// Cipher state for one direction of one connection.
///
/// Holds the current [`RoundKey`] and the direction-bound version word. The
/// key advances exactly once per packet, inside [`PacketCipher::encrypt`] /
/// [`PacketCipher::decrypt`]; headers must therefore be encoded or decoded
/// before the corresponding payload transform.
pub struct PacketCipher {
    ctx: SharedCryptoContext,
    key: RoundKey,
    version: u16,
    binding: VersionBinding,
}

impl PacketCipher {
    /// Create a cipher from an initial round key and a version binding.
    #[must_use]
    pub fn new(
        ctx: SharedCryptoContext,
        key: RoundKey,
        version: ShroomVersion,
        binding: VersionBinding,
    ) -> Self {
        let version = binding.bind(version);
        Self { ctx, key, version, binding }
    }

    /// Current round key.
    #[must_use]
    pub fn round_key(&self) -> RoundKey {
        self.key
    }

    /// The version binding this direction was constructed with.
    #[must_use]
    pub fn binding(&self) -> VersionBinding {
        self.binding
    }

    /// Encode the frame header for a payload of `len` bytes.
    ///
    /// Uses the current (pre-update) round key; call before [`Self::encrypt`].
    #[must_use]
    pub fn encode_header(&self, len: u16) -> u32 {
        header::encode(self.key, self.version, len)
    }

    /// Decode and validate a frame header, returning the payload length.
    ///
    /// Uses the current (pre-update) round key; call before [`Self::decrypt`].
    pub fn decode_header(&self, raw: u32) -> Result<u16, CryptoError> {
        header::decode(self.key, self.version, raw)
    }

    /// Lenient header decode: `None` instead of an error on mismatch.
    #[must_use]
    pub fn try_decode_header(&self, raw: u32) -> Option<u16> {
        header::try_decode(self.key, self.version, raw)
    }

    /// Encrypt a payload in place: scramble, then keystream, then advance
    /// the round key.
    pub fn encrypt(&mut self, data: &mut [u8]) {
        shanda::encrypt(data);
        keystream::apply(self.ctx.aes(), self.key, data);
        self.key = self.key.update(self.ctx.ig());
    }

    /// Decrypt a payload in place: keystream, advance the round key, then
    /// unscramble.
    pub fn decrypt(&mut self, data: &mut [u8]) {
        keystream::apply(self.ctx.aes(), self.key, data);
        self.key = self.key.update(self.ctx.ig());
        shanda::decrypt(data);
    }
}

impl std::fmt::Debug for PacketCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketCipher")
            .field("binding", &self.binding)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{PacketCipher, VersionBinding};
    use crate::{CryptoContext, RoundKey, ShroomVersion};

    fn pair(key: RoundKey) -> (PacketCipher, PacketCipher) {
        let ctx = Arc::new(CryptoContext::default());
        let version = ShroomVersion::new(95);
        // Server send binds the inverted version; client recv matches it.
        let tx = PacketCipher::new(ctx.clone(), key, version, VersionBinding::Inverted);
        let rx = PacketCipher::new(ctx, key, version, VersionBinding::Inverted);
        (tx, rx)
    }

    #[test]
    fn frame_round_trip_advances_both_keys_in_lockstep() {
        let key = RoundKey::new(0xAABB_CCDD);
        let (mut tx, mut rx) = pair(key);

        for round in 0..4 {
            let original = format!("payload {round}").into_bytes();
            let mut data = original.clone();

            let header = tx.encode_header(data.len() as u16);
            tx.encrypt(&mut data);

            let len = rx.decode_header(header).unwrap_or_else(|e| panic!("round {round}: {e}"));
            assert_eq!(usize::from(len), original.len());
            rx.decrypt(&mut data);

            assert_eq!(data, original);
            assert_eq!(tx.round_key(), rx.round_key());
        }
    }

    #[test]
    fn key_advances_once_per_packet() {
        let key = RoundKey::new(0x0101_0101);
        let (mut tx, _) = pair(key);
        let before = tx.round_key();
        tx.encrypt(&mut [0u8; 8]);
        let after = tx.round_key();
        assert_ne!(before, after);
        assert_eq!(after, before.update(&crate::IgContext::default()));
    }

    #[test]
    fn stale_header_is_rejected_after_update() {
        let key = RoundKey::new(0x4242_4242);
        let (mut tx, mut rx) = pair(key);

        let header = tx.encode_header(4);
        tx.encrypt(&mut [0u8; 4]);
        let mut data = [0u8; 4];
        assert!(rx.decode_header(header).is_ok());
        rx.decrypt(&mut data);

        // Key moved on; the old header no longer validates.
        assert!(rx.decode_header(header).is_err());
    }
}
