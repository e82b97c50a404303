//! Redb-backed character store.
//!
//! The embedded file-backed default for standalone deployments. Records are
//! stored as JSON values; id counters live in a small metadata table so ids
//! stay stable across restarts. Redb's ACID write transactions make every
//! operation crash-safe.

use std::{path::Path, sync::Arc};

use redb::{Database, ReadableTable, TableDefinition};

use super::{
    Account, Character, CharacterStore, START_MAP, StoreError, validate_character_name,
    wall_clock_secs,
};
use crate::{AccountId, CharacterId, MapId};

/// Table: account id → JSON [`Account`].
const ACCOUNTS: TableDefinition<u32, &[u8]> = TableDefinition::new("accounts");

/// Table: username → account id (unique-username index).
const ACCOUNT_NAMES: TableDefinition<&str, u32> = TableDefinition::new("account_names");

/// Table: character id → JSON [`Character`].
const CHARACTERS: TableDefinition<u32, &[u8]> = TableDefinition::new("characters");

/// Table: counter name → next id value.
const META: TableDefinition<&str, u32> = TableDefinition::new("meta");

const NEXT_ACCOUNT_ID: &str = "next_account_id";
const NEXT_CHARACTER_ID: &str = "next_character_id";

/// Durable character store backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (`Arc`).
#[derive(Clone)]
pub struct RedbCharacterStore {
    db: Arc<Database>,
}

impl RedbCharacterStore {
    /// Open or create a database at `path`, creating all tables.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        let txn = db.begin_write().map_err(io_err)?;
        {
            let _ = txn.open_table(ACCOUNTS).map_err(io_err)?;
            let _ = txn.open_table(ACCOUNT_NAMES).map_err(io_err)?;
            let _ = txn.open_table(CHARACTERS).map_err(io_err)?;
            let _ = txn.open_table(META).map_err(io_err)?;
        }
        txn.commit().map_err(io_err)?;

        Ok(Self { db: Arc::new(db) })
    }

    fn next_id(table: &mut redb::Table<'_, &'static str, u32>, key: &str) -> Result<u32, StoreError> {
        let next = table.get(key).map_err(io_err)?.map_or(1, |v| v.value());
        table.insert(key, next + 1).map_err(io_err)?;
        Ok(next)
    }

    fn characters_of(&self, account: AccountId) -> Result<Vec<Character>, StoreError> {
        let txn = self.db.begin_read().map_err(io_err)?;
        let table = txn.open_table(CHARACTERS).map_err(io_err)?;

        let mut chars = Vec::new();
        for entry in table.iter().map_err(io_err)? {
            let (_, value) = entry.map_err(io_err)?;
            let character: Character = decode(value.value())?;
            if character.account_id == account {
                chars.push(character);
            }
        }
        chars.sort_by_key(|c| c.id);
        Ok(chars)
    }

    fn account_exists(&self, account: AccountId) -> Result<bool, StoreError> {
        let txn = self.db.begin_read().map_err(io_err)?;
        let table = txn.open_table(ACCOUNTS).map_err(io_err)?;
        Ok(table.get(account.raw()).map_err(io_err)?.is_some())
    }

    fn insert_character(
        &self,
        account: AccountId,
        name: &str,
        map: MapId,
    ) -> Result<Character, StoreError> {
        validate_character_name(name)?;
        if !self.account_exists(account)? {
            return Err(StoreError::UnknownAccount(account));
        }

        let txn = self.db.begin_write().map_err(io_err)?;
        let character = {
            let mut meta = txn.open_table(META).map_err(io_err)?;
            let id = Self::next_id(&mut meta, NEXT_CHARACTER_ID)?;
            drop(meta);

            let character = Character {
                id: CharacterId(id),
                account_id: account,
                name: name.to_string(),
                level: 1,
                map_id: map,
                created_at_secs: wall_clock_secs(),
            };

            let mut table = txn.open_table(CHARACTERS).map_err(io_err)?;
            table.insert(id, encode(&character)?.as_slice()).map_err(io_err)?;
            character
        };
        txn.commit().map_err(io_err)?;

        Ok(character)
    }

    fn insert_account(&self, username: &str) -> Result<Account, StoreError> {
        let txn = self.db.begin_write().map_err(io_err)?;
        let account = {
            let mut meta = txn.open_table(META).map_err(io_err)?;
            let id = Self::next_id(&mut meta, NEXT_ACCOUNT_ID)?;
            drop(meta);

            let account = Account { id: AccountId(id), username: username.to_string() };

            let mut accounts = txn.open_table(ACCOUNTS).map_err(io_err)?;
            accounts.insert(id, encode(&account)?.as_slice()).map_err(io_err)?;
            drop(accounts);

            let mut names = txn.open_table(ACCOUNT_NAMES).map_err(io_err)?;
            names.insert(username, id).map_err(io_err)?;
            account
        };
        txn.commit().map_err(io_err)?;

        Ok(account)
    }
}

impl CharacterStore for RedbCharacterStore {
    fn get_or_create_account(&self, username: &str) -> Result<Account, StoreError> {
        {
            let txn = self.db.begin_read().map_err(io_err)?;
            let names = txn.open_table(ACCOUNT_NAMES).map_err(io_err)?;
            if let Some(id) = names.get(username).map_err(io_err)? {
                let accounts = txn.open_table(ACCOUNTS).map_err(io_err)?;
                if let Some(raw) = accounts.get(id.value()).map_err(io_err)? {
                    return decode(raw.value());
                }
            }
        }
        self.insert_account(username)
    }

    fn create_guest_account(&self) -> Result<Account, StoreError> {
        // Peek the counter to derive a username unique by construction.
        let next = {
            let txn = self.db.begin_read().map_err(io_err)?;
            let meta = txn.open_table(META).map_err(io_err)?;
            meta.get(NEXT_ACCOUNT_ID).map_err(io_err)?.map_or(1, |v| v.value())
        };
        self.insert_account(&format!("guest-{next}"))
    }

    fn ensure_default_character(&self, account: AccountId) -> Result<Character, StoreError> {
        if !self.account_exists(account)? {
            return Err(StoreError::UnknownAccount(account));
        }
        if let Some(existing) = self.characters_of(account)?.into_iter().next() {
            return Ok(existing);
        }
        let name = format!("Mush{}", account.raw());
        self.insert_character(account, &name, START_MAP)
    }

    fn create_character(
        &self,
        account: AccountId,
        name: &str,
        map: MapId,
    ) -> Result<Character, StoreError> {
        self.insert_character(account, name, map)
    }

    fn load_character(&self, id: CharacterId) -> Result<Option<Character>, StoreError> {
        let txn = self.db.begin_read().map_err(io_err)?;
        let table = txn.open_table(CHARACTERS).map_err(io_err)?;
        match table.get(id.raw()).map_err(io_err)? {
            Some(raw) => Ok(Some(decode(raw.value())?)),
            None => Ok(None),
        }
    }

    fn characters(&self, account: AccountId) -> Result<Vec<Character>, StoreError> {
        self.characters_of(account)
    }
}

impl std::fmt::Debug for RedbCharacterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbCharacterStore").finish_non_exhaustive()
    }
}

fn io_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Io(e.to_string())
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::RedbCharacterStore;
    use crate::store::{CharacterStore, START_MAP};

    fn open_temp() -> (tempfile::TempDir, RedbCharacterStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbCharacterStore::open(dir.path().join("characters.redb")).unwrap();
        (dir, store)
    }

    #[test]
    fn accounts_and_characters_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("characters.redb");

        let (account, character) = {
            let store = RedbCharacterStore::open(&path).unwrap();
            let account = store.get_or_create_account("alice").unwrap();
            let character = store.ensure_default_character(account.id).unwrap();
            (account, character)
        };

        let store = RedbCharacterStore::open(&path).unwrap();
        assert_eq!(store.get_or_create_account("alice").unwrap(), account);
        assert_eq!(store.load_character(character.id).unwrap(), Some(character));
    }

    #[test]
    fn guest_accounts_get_distinct_names() {
        let (_dir, store) = open_temp();
        let a = store.create_guest_account().unwrap();
        let b = store.create_guest_account().unwrap();
        assert_ne!(a.username, b.username);
    }

    #[test]
    fn default_character_starts_on_the_start_map() {
        let (_dir, store) = open_temp();
        let account = store.create_guest_account().unwrap();
        let character = store.ensure_default_character(account.id).unwrap();
        assert_eq!(character.map_id, START_MAP);
        assert_eq!(character.level, 1);

        let again = store.ensure_default_character(account.id).unwrap();
        assert_eq!(character, again);
    }

    #[test]
    fn characters_list_by_account() {
        let (_dir, store) = open_temp();
        let a = store.create_guest_account().unwrap();
        let b = store.create_guest_account().unwrap();

        store.create_character(a.id, "one", START_MAP).unwrap();
        store.create_character(b.id, "two", START_MAP).unwrap();
        store.create_character(a.id, "three", START_MAP).unwrap();

        let names: Vec<String> =
            store.characters(a.id).unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["one", "three"]);
    }
}
