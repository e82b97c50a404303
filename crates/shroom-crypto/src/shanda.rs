//! Three-round symmetric byte scramble.
//!
//! Applied to every payload in addition to the keystream cipher. Each round
//! runs an even pass (front to back) and an odd pass (back to front); each
//! pass chains an 8-bit rolling state through the buffer and mixes in a
//! length counter that starts at the buffer length truncated to 8 bits and
//! decrements per byte. The truncation and wraparound are load-bearing:
//! buffers longer than 255 bytes must scramble exactly as the legacy client
//! does.
//!
//! The per-byte operation orders below are fixed by the wire protocol.
//! [`encrypt`] and [`decrypt`] are exact inverses; the empty buffer is a
//! no-op.

const ROUNDS: usize = 3;

/// Scramble `data` in place.
pub fn encrypt(data: &mut [u8]) {
    for _ in 0..ROUNDS {
        even_encrypt_pass(data);
        odd_encrypt_pass(data);
    }
}

/// Undo [`encrypt`] in place.
pub fn decrypt(data: &mut [u8]) {
    for _ in 0..ROUNDS {
        odd_decrypt_pass(data);
        even_decrypt_pass(data);
    }
}

/// Forward pass: rotate-left 3, add counter, chain-XOR, rotate-right by the
/// counter, complement, add 0x48.
fn even_encrypt_pass(data: &mut [u8]) {
    let len = data.len();
    let mut state = 0u8;
    for (i, counter) in (1..=len).rev().enumerate() {
        let counter = counter as u8;
        let mut c = data[i];
        c = c.rotate_left(3);
        c = c.wrapping_add(counter);
        c ^= state;
        state = c;
        c = c.rotate_right(u32::from(counter));
        c = !c;
        c = c.wrapping_add(0x48);
        data[i] = c;
    }
}

/// Backward pass: rotate-left 4, add counter, chain-XOR, XOR 0x13,
/// rotate-right 3.
fn odd_encrypt_pass(data: &mut [u8]) {
    let len = data.len();
    let mut state = 0u8;
    for counter in (1..=len).rev() {
        let i = counter - 1;
        let counter = counter as u8;
        let mut c = data[i];
        c = c.rotate_left(4);
        c = c.wrapping_add(counter);
        c ^= state;
        state = c;
        c ^= 0x13;
        c = c.rotate_right(3);
        data[i] = c;
    }
}

fn even_decrypt_pass(data: &mut [u8]) {
    let len = data.len();
    let mut state = 0u8;
    for (i, counter) in (1..=len).rev().enumerate() {
        let counter = counter as u8;
        let mut c = data[i];
        c = c.wrapping_sub(0x48);
        c = !c;
        c = c.rotate_left(u32::from(counter));
        let chained = c;
        c ^= state;
        state = chained;
        c = c.wrapping_sub(counter);
        c = c.rotate_right(3);
        data[i] = c;
    }
}

fn odd_decrypt_pass(data: &mut [u8]) {
    let len = data.len();
    let mut state = 0u8;
    for counter in (1..=len).rev() {
        let i = counter - 1;
        let counter = counter as u8;
        let mut c = data[i];
        c = c.rotate_left(3);
        c ^= 0x13;
        let chained = c;
        c ^= state;
        state = chained;
        c = c.wrapping_sub(counter);
        c = c.rotate_right(4);
        data[i] = c;
    }
}
