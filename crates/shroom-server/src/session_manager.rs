//! Session manager.
//!
//! The only shared mutable state outside the actors: the active-session
//! registry and the migration-ticket map, each behind its own lock with
//! per-key atomic operations. The manager also fronts the character store
//! and mints player sessions for authenticated connections.
//!
//! Tickets are the login → channel credential: single-use, bound to the
//! client's IP, and TTL-bounded. Expiry is enforced lazily - every issue
//! and every consume sweeps dead entries first - so the map cannot leak
//! without sustained ticket churn.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU32, Ordering},
    },
    time::{Duration, Instant},
};

use shroom_net::PumpHandle;

use crate::{
    AccountId, CharacterId, PlayerSession, ServerError, SessionId,
    store::{Account, Character, CharacterStore, StoreError},
};

/// How long a freshly issued ticket stays valid.
pub const TICKET_TTL: Duration = Duration::from_secs(30);

/// One entry in the active-session registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    /// The session's id.
    pub session_id: SessionId,
    /// Authenticated account.
    pub account_id: AccountId,
    /// Loaded character.
    pub character_id: CharacterId,
}

/// A single-use login → channel migration credential.
#[derive(Debug, Clone)]
pub struct MigrationTicket {
    /// Random nonzero id the client echoes in its channel handshake.
    pub client_session_id: u64,
    /// Account the ticket was issued for.
    pub account_id: AccountId,
    /// Character the ticket was issued for.
    pub character_id: CharacterId,
    /// Endpoint the ticket is bound to; only the IP component is checked.
    pub remote_addr: SocketAddr,
    /// Instant the ticket stops being valid.
    pub expires_at: Instant,
}

struct Inner<C> {
    store: C,
    active: Mutex<HashMap<SessionId, ActiveSession>>,
    tickets: Mutex<HashMap<u64, MigrationTicket>>,
    next_session: AtomicU32,
    ticket_ttl: Duration,
}

/// Shared session registry, ticket issuer, and character store façade.
pub struct SessionManager<C: CharacterStore> {
    inner: Arc<Inner<C>>,
}

impl<C: CharacterStore> Clone for SessionManager<C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<C: CharacterStore> SessionManager<C> {
    /// Create a manager over `store` with the default ticket TTL.
    #[must_use]
    pub fn new(store: C) -> Self {
        Self::with_ticket_ttl(store, TICKET_TTL)
    }

    /// Create a manager with an explicit ticket TTL (tests).
    #[must_use]
    pub fn with_ticket_ttl(store: C, ticket_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                active: Mutex::new(HashMap::new()),
                tickets: Mutex::new(HashMap::new()),
                next_session: AtomicU32::new(1),
                ticket_ttl,
            }),
        }
    }

    // --- active session registry ---

    /// Sessions currently registered.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.lock_active().len()
    }

    /// Look an active session up by id.
    #[must_use]
    pub fn active_session(&self, id: SessionId) -> Option<ActiveSession> {
        self.lock_active().get(&id).cloned()
    }

    /// Remove a closed session from the registry. Idempotent.
    pub fn notify_closed(&self, id: SessionId) {
        if self.lock_active().remove(&id).is_some() {
            tracing::info!(session = %id, "session closed");
        }
    }

    // --- character store façade ---

    /// Look an account up by username, creating it if absent.
    pub fn get_or_create_account(&self, username: &str) -> Result<Account, StoreError> {
        self.inner.store.get_or_create_account(username)
    }

    /// Create a fresh guest account.
    pub fn create_guest_account(&self) -> Result<Account, StoreError> {
        self.inner.store.create_guest_account()
    }

    /// The account's first character, created if it has none.
    pub fn ensure_default_character(&self, account: AccountId) -> Result<Character, StoreError> {
        self.inner.store.ensure_default_character(account)
    }

    /// Load one character.
    pub fn load_character(&self, id: CharacterId) -> Result<Option<Character>, StoreError> {
        self.inner.store.load_character(id)
    }

    /// Every character on an account.
    pub fn get_characters(&self, account: AccountId) -> Result<Vec<Character>, StoreError> {
        self.inner.store.characters(account)
    }

    // --- migration tickets ---

    /// Issue a single-use migration ticket bound to `endpoint`'s IP.
    ///
    /// Sweeps expired tickets before inserting.
    pub fn create_ticket(
        &self,
        account_id: AccountId,
        character_id: CharacterId,
        endpoint: SocketAddr,
    ) -> Result<MigrationTicket, ServerError> {
        let now = Instant::now();
        let mut tickets = self.lock_tickets();
        sweep(&mut tickets, now);

        let client_session_id = loop {
            let id = random_u64()?;
            if id != 0 && !tickets.contains_key(&id) {
                break id;
            }
        };

        let ticket = MigrationTicket {
            client_session_id,
            account_id,
            character_id,
            remote_addr: endpoint,
            expires_at: now + self.inner.ticket_ttl,
        };
        tickets.insert(client_session_id, ticket.clone());

        tracing::debug!(account = %account_id, character = %character_id, "ticket issued");
        Ok(ticket)
    }

    /// Atomically consume a ticket.
    ///
    /// `None` if the id is absent, the ticket expired, or the caller's IP
    /// does not match the ticket's. A mismatched attempt still burns the
    /// ticket: it is single-use in every outcome.
    #[must_use]
    pub fn try_consume_ticket(
        &self,
        client_session_id: u64,
        endpoint: SocketAddr,
    ) -> Option<MigrationTicket> {
        let now = Instant::now();
        let mut tickets = self.lock_tickets();
        sweep(&mut tickets, now);

        let ticket = tickets.remove(&client_session_id)?;
        if ticket.expires_at <= now {
            return None;
        }
        if ticket.remote_addr.ip() != endpoint.ip() {
            tracing::warn!(
                expected = %ticket.remote_addr.ip(),
                got = %endpoint.ip(),
                "ticket consumed from wrong address"
            );
            return None;
        }
        Some(ticket)
    }

    /// Tickets currently outstanding (expired entries may linger until the
    /// next sweep).
    #[must_use]
    pub fn ticket_count(&self) -> usize {
        self.lock_tickets().len()
    }

    // --- session factory ---

    /// Build the logic object for an authenticated connection and register
    /// the session as active.
    pub fn create_player_session(
        &self,
        pump: PumpHandle,
        character: Character,
    ) -> (SessionId, PlayerSession) {
        let session_id = SessionId(self.inner.next_session.fetch_add(1, Ordering::Relaxed));
        let entry = ActiveSession {
            session_id,
            account_id: character.account_id,
            character_id: character.id,
        };
        self.lock_active().insert(session_id, entry);

        tracing::info!(
            session = %session_id,
            account = %character.account_id,
            character = %character.id,
            "player session created"
        );
        (session_id, PlayerSession::new(session_id, character, pump))
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, HashMap<SessionId, ActiveSession>> {
        self.inner.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_tickets(&self) -> std::sync::MutexGuard<'_, HashMap<u64, MigrationTicket>> {
        self.inner.tickets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: CharacterStore> std::fmt::Debug for SessionManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("active", &self.active_count())
            .field("tickets", &self.ticket_count())
            .finish()
    }
}

fn sweep(tickets: &mut HashMap<u64, MigrationTicket>, now: Instant) {
    tickets.retain(|_, t| t.expires_at > now);
}

fn random_u64() -> Result<u64, ServerError> {
    let mut bytes = [0u8; 8];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| ServerError::Config(format!("OS RNG unavailable: {e}")))?;
    Ok(u64::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use std::{
        net::SocketAddr,
        time::Duration,
    };

    use super::SessionManager;
    use crate::{SessionId, store::MemoryCharacterStore};

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    fn manager() -> SessionManager<MemoryCharacterStore> {
        SessionManager::new(MemoryCharacterStore::new())
    }

    #[test]
    fn ticket_is_single_use_and_ip_bound_only() {
        let manager = manager();
        let account = manager.create_guest_account().unwrap();
        let character = manager.ensure_default_character(account.id).unwrap();

        let ticket =
            manager.create_ticket(account.id, character.id, addr("127.0.0.1:0")).unwrap();
        assert_ne!(ticket.client_session_id, 0);

        // Different port, same IP: accepted.
        let consumed = manager
            .try_consume_ticket(ticket.client_session_id, addr("127.0.0.1:1234"))
            .unwrap();
        assert_eq!(consumed.account_id, account.id);
        assert_eq!(consumed.character_id, character.id);

        // Second consume: gone.
        assert!(manager.try_consume_ticket(ticket.client_session_id, addr("127.0.0.1:1234")).is_none());
    }

    #[test]
    fn wrong_ip_burns_the_ticket() {
        let manager = manager();
        let account = manager.create_guest_account().unwrap();
        let character = manager.ensure_default_character(account.id).unwrap();

        let ticket =
            manager.create_ticket(account.id, character.id, addr("127.0.0.1:0")).unwrap();

        assert!(manager.try_consume_ticket(ticket.client_session_id, addr("10.0.0.1:99")).is_none());
        // Burned: even the right IP fails now.
        assert!(manager.try_consume_ticket(ticket.client_session_id, addr("127.0.0.1:99")).is_none());
    }

    #[test]
    fn expired_tickets_are_swept_on_issue_and_consume() {
        let store = MemoryCharacterStore::new();
        let manager = SessionManager::with_ticket_ttl(store, Duration::from_millis(1));
        let account = manager.create_guest_account().unwrap();
        let character = manager.ensure_default_character(account.id).unwrap();

        let ticket =
            manager.create_ticket(account.id, character.id, addr("127.0.0.1:0")).unwrap();
        std::thread::sleep(Duration::from_millis(5));

        assert!(manager.try_consume_ticket(ticket.client_session_id, addr("127.0.0.1:0")).is_none());
        assert_eq!(manager.ticket_count(), 0);
    }

    #[test]
    fn concurrent_consume_yields_at_most_one_success() {
        let manager = manager();
        let account = manager.create_guest_account().unwrap();
        let character = manager.ensure_default_character(account.id).unwrap();
        let ticket =
            manager.create_ticket(account.id, character.id, addr("127.0.0.1:0")).unwrap();
        let id = ticket.client_session_id;

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                std::thread::spawn(move || {
                    manager.try_consume_ticket(id, addr("127.0.0.1:5")).is_some()
                })
            })
            .collect();

        let successes = threads
            .into_iter()
            .map(|t| matches!(t.join(), Ok(true)))
            .filter(|&won| won)
            .count();
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn factory_registers_and_notify_closed_is_idempotent() {
        use shroom_crypto::{CryptoContext, RoundKey, ShroomVersion};
        use shroom_net::{ConnPump, FramedConn, Handshake, LocaleCode, PumpConfig};
        use tokio_util::sync::CancellationToken;

        let manager = manager();
        let account = manager.create_guest_account().unwrap();
        let character = manager.ensure_default_character(account.id).unwrap();

        // Removing a never-registered session is a no-op.
        manager.notify_closed(SessionId(42));

        let ctx = std::sync::Arc::new(CryptoContext::default());
        let (client_io, server_io) = tokio::io::duplex(4096);
        let root = CancellationToken::new();
        let handshake = Handshake {
            version: ShroomVersion::new(95),
            sub_version: "1".to_string(),
            send_key: RoundKey::new(1),
            recv_key: RoundKey::new(2),
            locale: LocaleCode::Global,
        };
        let (conn, _) = tokio::join!(
            FramedConn::accept(server_io, ctx.clone(), &handshake),
            FramedConn::connect(client_io, ctx),
        );
        let pump = ConnPump::spawn(conn.unwrap(), PumpConfig::default(), &root);

        let (session_id, logic) =
            manager.create_player_session(pump.handle(), character.clone());
        assert_eq!(logic.character().id, character.id);
        assert_eq!(manager.active_count(), 1);
        let entry = manager.active_session(session_id).unwrap();
        assert_eq!(entry.account_id, account.id);

        manager.notify_closed(session_id);
        manager.notify_closed(session_id);
        assert_eq!(manager.active_count(), 0);
    }
}
