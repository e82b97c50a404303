//! Shroom game server.
//!
//! Composes the wire layer, the tick runtime, and the world topology into a
//! running server: a login listener that issues migration tickets, one
//! channel listener per channel that consumes them, and a single tick loop
//! driving every world, channel, and room actor.
//!
//! # Architecture
//!
//! ```text
//! TcpListener (login)      TcpListener (channel xN)
//!     │                        │
//!     └─ ConnPump per conn     └─ ConnPump per conn ── Session ──┐
//!                                                                │ AddSession
//!                      TickScheduler ── WorldActor               ▼
//!                            ├────────── ChannelActor ── RoomActor
//!                            └────────── RoomTimer (delay queue)
//! ```
//!
//! Network I/O runs on ordinary tokio tasks; gameplay state is touched only
//! from the tick loop. The session manager's active-session and ticket maps
//! are the sole pieces of shared mutable state, both internally
//! synchronised.

mod channel;
mod config;
mod error;
mod handler;
mod ids;
mod login;
mod ops;
mod player;
mod room;
mod server;
mod session;
mod session_manager;
pub mod store;
mod timer;
mod world;

pub use channel::{ChannelAction, ChannelActor, ChannelMsg};
pub use config::ServerConfig;
pub use error::ServerError;
pub use handler::{ChannelGateway, MigrationError};
pub use ids::{AccountId, ChannelId, CharacterId, MapId, RoomId, SessionId, WorldId};
pub use login::{ChannelEndpoint, LoginGateway};
pub use ops::op;
pub use player::PlayerSession;
pub use room::{RoomAction, RoomActor, RoomMsg, RoomSession};
pub use server::{ChannelHandle, RoomHandle, RoomServer, WorldHandle};
pub use session::{Session, SessionLogic};
pub use session_manager::{ActiveSession, MigrationTicket, SessionManager};
pub use timer::RoomTimer;
pub use world::{WorldAction, WorldActor, WorldMsg};
