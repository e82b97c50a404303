//! Server error types.

use shroom_act::SchedulerError;
use shroom_net::NetError;

use crate::{handler::MigrationError, store::StoreError};

/// Errors that can occur in the server.
///
/// Configuration and bind errors are fatal at startup and carry a nonzero
/// exit; everything else is scoped to one connection or one operation and
/// is logged where it happens.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Invalid configuration (bad address, zero channels, zero interval).
    #[error("configuration error: {0}")]
    Config(String),

    /// Socket-level failure (bind, accept).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wire-layer failure on a connection.
    #[error("net error: {0}")]
    Net(#[from] NetError),

    /// Tick scheduler failure.
    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Character store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A channel migration handshake was rejected.
    #[error("migration rejected: {0}")]
    Migration(#[from] MigrationError),
}
