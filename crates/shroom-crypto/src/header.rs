//! Frame header integrity codec.
//!
//! The 4-byte header on every encrypted frame is not a bare length. The low
//! half mixes the round key's high bits with the direction-bound version
//! word; the high half mixes the low half with the payload length. A
//! receiver that holds the same round key recovers the length and, in the
//! same step, proves the sender's key state matches its own.
//!
//! ```text
//! low    = header_key ^ version
//! high   = low ^ len
//! header = low | high << 16        (written little-endian)
//! ```

use crate::{CryptoError, RoundKey};

/// Encode the header word for a payload of `len` bytes.
///
/// `version` is the direction-bound version word (plain or inverted; see
/// [`crate::VersionBinding`]).
#[must_use]
pub fn encode(key: RoundKey, version: u16, len: u16) -> u32 {
    let low = key.header_key() ^ version;
    let high = low ^ len;
    u32::from(low) | u32::from(high) << 16
}

/// Decode `header`, validating it against the local round key.
///
/// # Errors
///
/// [`CryptoError::HeaderKeyMismatch`] when the recovered key does not match
/// `key` - either the peer used a different key state or the stream is
/// desynchronised.
pub fn decode(key: RoundKey, version: u16, header: u32) -> Result<u16, CryptoError> {
    let low = (header & 0xFFFF) as u16;
    let high = (header >> 16) as u16;

    let got = low ^ version;
    let expected = key.header_key();
    if got != expected {
        return Err(CryptoError::HeaderKeyMismatch { expected, got });
    }

    Ok(low ^ high)
}

/// Lenient variant of [`decode`]: `None` instead of an error on mismatch.
#[must_use]
pub fn try_decode(key: RoundKey, version: u16, header: u32) -> Option<u16> {
    decode(key, version, header).ok()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::proptest;

    use super::{decode, encode, try_decode};
    use crate::{CryptoError, RoundKey, ShroomVersion};

    #[test]
    fn known_vector() {
        let key = RoundKey::from_bytes([0x52, 0x30, 0x78, 0xE8]);
        let version = ShroomVersion::new(65).invert().raw();
        assert_eq!(version, 65470);

        let header = encode(key, version, 44);
        assert_eq!(header, 401_217_478);
        assert_eq!(decode(key, version, header), Ok(44));
    }

    #[test]
    fn wrong_key_is_rejected() {
        let key = RoundKey::new(0xE878_3052);
        let other = RoundKey::new(0x1878_3052);
        let header = encode(key, 65470, 44);

        assert_eq!(
            decode(other, 65470, header),
            Err(CryptoError::HeaderKeyMismatch { expected: 0x1878, got: 0xE878 })
        );
        assert_eq!(try_decode(other, 65470, header), None);
    }

    #[test]
    fn wrong_version_is_rejected() {
        let key = RoundKey::new(0xE878_3052);
        let header = encode(key, 65470, 44);
        assert!(decode(key, 65471, header).is_err());
    }

    proptest! {
        #[test]
        fn round_trips_for_any_state(key in proptest::num::u32::ANY, version in proptest::num::u16::ANY, len in 1u16..=32767) {
            let key = RoundKey::new(key);
            let header = encode(key, version, len);
            assert_eq!(decode(key, version, header), Ok(len));
        }
    }
}
