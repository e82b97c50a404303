//! Legacy Shroom packet cipher suite.
//!
//! Every byte on a Shroom connection passes through the primitives in this
//! crate. The construction is legacy obfuscation reproduced bit-for-bit for
//! client compatibility - it is NOT cryptographically secure and makes no
//! claim to be.
//!
//! # Layers
//!
//! - [`RoundKey`]: 32-bit rolling key, advanced once per packet via the
//!   immutable [`IgContext`] shuffle schedule
//! - [`shanda`]: three-round symmetric byte scramble
//! - [`keystream`]: AES-ECB used as an OFB keystream with fragmented
//!   application
//! - [`header`]: 4-byte frame header carrying an integrity check derived
//!   from the round key
//! - [`PacketCipher`]: per-direction composition of all of the above
//!
//! The send and receive directions of a connection each hold their own
//! [`PacketCipher`]; the two are distinguished by which form of the 16-bit
//! protocol version they bind (plain or bitwise-inverted).

mod context;
mod error;
pub mod header;
mod ig;
pub mod keystream;
mod packet_cipher;
mod round_key;
pub mod shanda;
mod version;

pub use context::{CryptoContext, SharedCryptoContext};
pub use error::CryptoError;
pub use ig::IgContext;
pub use packet_cipher::{PacketCipher, VersionBinding};
pub use round_key::RoundKey;
pub use version::ShroomVersion;
