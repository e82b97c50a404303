//! In-memory character store.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use super::{
    Account, Character, CharacterStore, START_MAP, StoreError, validate_character_name,
    wall_clock_secs,
};
use crate::{AccountId, CharacterId, MapId};

/// In-memory store for tests and the default configuration.
///
/// All state lives behind one mutex; clones share it.
#[derive(Clone, Default)]
pub struct MemoryCharacterStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    accounts: HashMap<AccountId, Account>,
    by_username: HashMap<String, AccountId>,
    characters: HashMap<CharacterId, Character>,
    next_account: u32,
    next_character: u32,
}

impl MemoryCharacterStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Accounts created so far.
    #[must_use]
    pub fn account_count(&self) -> usize {
        self.lock().accounts.len()
    }
}

impl Inner {
    fn create_account(&mut self, username: String) -> Account {
        self.next_account += 1;
        let account = Account { id: AccountId(self.next_account), username: username.clone() };
        self.by_username.insert(username, account.id);
        self.accounts.insert(account.id, account.clone());
        account
    }

    fn create_character(
        &mut self,
        account: AccountId,
        name: &str,
        map: MapId,
    ) -> Result<Character, StoreError> {
        if !self.accounts.contains_key(&account) {
            return Err(StoreError::UnknownAccount(account));
        }
        validate_character_name(name)?;

        self.next_character += 1;
        let character = Character {
            id: CharacterId(self.next_character),
            account_id: account,
            name: name.to_string(),
            level: 1,
            map_id: map,
            created_at_secs: wall_clock_secs(),
        };
        self.characters.insert(character.id, character.clone());
        Ok(character)
    }

    fn characters_of(&self, account: AccountId) -> Vec<Character> {
        let mut chars: Vec<Character> =
            self.characters.values().filter(|c| c.account_id == account).cloned().collect();
        chars.sort_by_key(|c| c.id);
        chars
    }
}

impl CharacterStore for MemoryCharacterStore {
    fn get_or_create_account(&self, username: &str) -> Result<Account, StoreError> {
        let mut inner = self.lock();
        if let Some(&id) = inner.by_username.get(username) {
            if let Some(account) = inner.accounts.get(&id) {
                return Ok(account.clone());
            }
        }
        Ok(inner.create_account(username.to_string()))
    }

    fn create_guest_account(&self) -> Result<Account, StoreError> {
        let mut inner = self.lock();
        let username = format!("guest-{}", inner.next_account + 1);
        Ok(inner.create_account(username))
    }

    fn ensure_default_character(&self, account: AccountId) -> Result<Character, StoreError> {
        let mut inner = self.lock();
        if !inner.accounts.contains_key(&account) {
            return Err(StoreError::UnknownAccount(account));
        }
        if let Some(existing) = inner.characters_of(account).into_iter().next() {
            return Ok(existing);
        }
        let name = format!("Mush{}", account.raw());
        inner.create_character(account, &name, START_MAP)
    }

    fn create_character(
        &self,
        account: AccountId,
        name: &str,
        map: MapId,
    ) -> Result<Character, StoreError> {
        self.lock().create_character(account, name, map)
    }

    fn load_character(&self, id: CharacterId) -> Result<Option<Character>, StoreError> {
        Ok(self.lock().characters.get(&id).cloned())
    }

    fn characters(&self, account: AccountId) -> Result<Vec<Character>, StoreError> {
        Ok(self.lock().characters_of(account))
    }
}

impl std::fmt::Debug for MemoryCharacterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCharacterStore")
            .field("accounts", &self.account_count())
            .finish()
    }
}
