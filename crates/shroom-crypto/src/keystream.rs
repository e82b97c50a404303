//! AES-ECB used as an OFB keystream.
//!
//! The payload is split into fragments: the first fragment is 1456 bytes,
//! every later full fragment 1460, the tail whatever remains. Each fragment
//! restarts the keystream from the expanded round key; within a fragment the
//! 16-byte state is AES-ECB encrypted repeatedly and XORed into the payload,
//! a partial final block consuming only as many keystream bytes as needed.
//!
//! XOR makes the transform its own inverse: apply it once to encrypt, once
//! to decrypt. The round key itself is not advanced here; the
//! [`crate::PacketCipher`] steps it after every packet.

use aes::{
    Aes256,
    cipher::{BlockEncrypt, generic_array::GenericArray},
};

use crate::RoundKey;

/// Length of the first keystream fragment.
pub const FIRST_FRAGMENT_LEN: usize = 1456;

/// Length of every fragment after the first.
pub const FRAGMENT_LEN: usize = 1460;

/// XOR the keystream derived from `key` into `data` in place.
pub fn apply(aes: &Aes256, key: RoundKey, data: &mut [u8]) {
    let seed = key.expand();
    let mut offset = 0;
    let mut fragment_len = FIRST_FRAGMENT_LEN;

    while offset < data.len() {
        let end = usize::min(offset + fragment_len, data.len());
        let mut state = seed;

        for chunk in data[offset..end].chunks_mut(16) {
            aes.encrypt_block(GenericArray::from_mut_slice(&mut state));
            for (byte, key_byte) in chunk.iter_mut().zip(state.iter()) {
                *byte ^= key_byte;
            }
        }

        offset = end;
        fragment_len = FRAGMENT_LEN;
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::{prop, proptest};

    use super::{FIRST_FRAGMENT_LEN, apply};
    use crate::{CryptoContext, RoundKey};

    #[test]
    fn apply_twice_is_identity() {
        let ctx = CryptoContext::default();
        let key = RoundKey::new(0xE878_3052);
        let original: Vec<u8> = (0..256u16).map(|i| i as u8).collect();

        let mut data = original.clone();
        apply(ctx.aes(), key, &mut data);
        assert_ne!(data, original);
        apply(ctx.aes(), key, &mut data);
        assert_eq!(data, original);
    }

    #[test]
    fn fragment_boundary_round_trips() {
        // Crosses the 1456-byte first fragment and one full 1460 fragment.
        let ctx = CryptoContext::default();
        let key = RoundKey::new(0x0BAD_F00D);
        let original: Vec<u8> = (0..(FIRST_FRAGMENT_LEN + 1460 + 7)).map(|i| i as u8).collect();

        let mut data = original.clone();
        apply(ctx.aes(), key, &mut data);
        apply(ctx.aes(), key, &mut data);
        assert_eq!(data, original);
    }

    #[test]
    fn keystream_restarts_per_fragment() {
        // The first byte after the fragment boundary reuses the first
        // keystream block, so identical plaintext encrypts identically.
        let ctx = CryptoContext::default();
        let key = RoundKey::new(0x1111_2222);

        let mut data = vec![0u8; FIRST_FRAGMENT_LEN + 16];
        apply(ctx.aes(), key, &mut data);
        assert_eq!(data[FIRST_FRAGMENT_LEN..FIRST_FRAGMENT_LEN + 16], data[..16]);
    }

    proptest! {
        #[test]
        fn symmetric_on_any_payload(
            input in prop::collection::vec(prop::num::u8::ANY, 0..4096),
            key in prop::num::u32::ANY,
        ) {
            let ctx = CryptoContext::default();
            let mut data = input.clone();
            apply(ctx.aes(), RoundKey::new(key), &mut data);
            apply(ctx.aes(), RoundKey::new(key), &mut data);
            assert_eq!(data, input);
        }
    }
}
