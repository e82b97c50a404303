//! Character store.
//!
//! The server treats accounts and characters as an opaque external
//! collaborator behind this trait. The trait is synchronous and `Clone +
//! Send + Sync`; implementations share internal state, so clones access
//! the same data. Backends: [`MemoryCharacterStore`] (tests, default) and
//! [`RedbCharacterStore`] (embedded file-backed store).

mod memory;
mod redb;

use serde::{Deserialize, Serialize};

pub use self::{memory::MemoryCharacterStore, redb::RedbCharacterStore};
use crate::{AccountId, CharacterId, MapId};

/// Longest character name, in Latin-1 bytes.
pub const MAX_CHARACTER_NAME_LEN: usize = 12;

/// Map new characters start on.
pub const START_MAP: MapId = MapId(100_000_000);

/// An account record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account id.
    pub id: AccountId,
    /// Unique username.
    pub username: String,
}

/// A character record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    /// Character id.
    pub id: CharacterId,
    /// Owning account.
    pub account_id: AccountId,
    /// Display name, at most 12 Latin-1 bytes.
    pub name: String,
    /// Level, starting at 1.
    pub level: u8,
    /// Map the character is on.
    pub map_id: MapId,
    /// Unix seconds at creation.
    pub created_at_secs: u64,
}

/// Character store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Backend I/O failure.
    #[error("store io: {0}")]
    Io(String),

    /// Record (de)serialization failure.
    #[error("store serialization: {0}")]
    Serialization(String),

    /// Character name empty, too long, or not Latin-1.
    #[error("invalid character name {0:?}")]
    InvalidName(String),

    /// Operation referenced an account that does not exist.
    #[error("unknown account {0}")]
    UnknownAccount(AccountId),
}

/// Persistent accounts and characters.
pub trait CharacterStore: Clone + Send + Sync + 'static {
    /// Look an account up by username, creating it if absent.
    fn get_or_create_account(&self, username: &str) -> Result<Account, StoreError>;

    /// Create a fresh account with a generated unique guest username.
    fn create_guest_account(&self) -> Result<Account, StoreError>;

    /// Return the account's first character, creating a level-1 starter
    /// character when it has none.
    fn ensure_default_character(&self, account: AccountId) -> Result<Character, StoreError>;

    /// Create a character on `account`.
    fn create_character(
        &self,
        account: AccountId,
        name: &str,
        map: MapId,
    ) -> Result<Character, StoreError>;

    /// Load one character. `None` if the id is unknown.
    fn load_character(&self, id: CharacterId) -> Result<Option<Character>, StoreError>;

    /// Every character on an account, in id order.
    fn characters(&self, account: AccountId) -> Result<Vec<Character>, StoreError>;
}

/// Validate a character name: non-empty, ≤ 12 bytes, Latin-1 only.
pub(crate) fn validate_character_name(name: &str) -> Result<(), StoreError> {
    let len = name.chars().count();
    if len == 0 || len > MAX_CHARACTER_NAME_LEN || name.chars().any(|c| u32::from(c) > 0xFF) {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Current wall-clock time in Unix seconds; zero if the clock is wedged
/// before the epoch.
pub(crate) fn wall_clock_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}
