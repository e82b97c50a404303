//! Server configuration.

use std::net::IpAddr;

use clap::Parser;

use crate::ServerError;

/// Shroom server configuration, from CLI flags or environment.
#[derive(Parser, Debug, Clone)]
#[command(name = "shroom-server")]
#[command(about = "Shroom legacy-protocol game server")]
#[command(version)]
pub struct ServerConfig {
    /// Address to bind listeners on.
    #[arg(long, env = "LISTEN_ADDRESS", default_value = "0.0.0.0")]
    pub listen_address: IpAddr,

    /// Address advertised to clients for channel migration.
    #[arg(long, env = "PUBLIC_ADDRESS", default_value = "127.0.0.1")]
    pub public_address: IpAddr,

    /// Login listener port.
    #[arg(long, env = "LOGIN_PORT", default_value_t = 8484)]
    pub login_port: u16,

    /// First channel listener port; channel `n` listens on start + n.
    #[arg(long, env = "CHANNEL_PORT_START", default_value_t = 8485)]
    pub channel_port_start: u16,

    /// Number of channels.
    #[arg(long, env = "CHANNELS", default_value_t = 2)]
    pub channels: u16,

    /// Gameplay tick interval in milliseconds.
    #[arg(long, env = "TICK_INTERVAL_MS", default_value_t = 50)]
    pub tick_interval_ms: u64,

    /// Character store: `memory:` or a redb database path.
    #[arg(long = "character-store", env = "CHARACTER_STORE_CONNECTION", default_value = "memory:")]
    pub character_store: String,

    /// Protocol version sent in the handshake.
    #[arg(long, env = "GAME_VERSION", default_value_t = 95)]
    pub game_version: u16,

    /// Sub-version string sent in the handshake.
    #[arg(long, env = "GAME_SUB_VERSION", default_value = "1")]
    pub sub_version: String,

    /// Log level when `RUST_LOG` is unset (trace, debug, info, warn, error).
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl ServerConfig {
    /// The listener port for channel index `idx`.
    #[must_use]
    pub fn channel_port(&self, idx: u16) -> u16 {
        self.channel_port_start + idx
    }

    /// Reject configurations that cannot start.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.channels == 0 {
            return Err(ServerError::Config("at least one channel is required".to_string()));
        }
        if self.tick_interval_ms == 0 {
            return Err(ServerError::Config("tick interval must be positive".to_string()));
        }
        if u32::from(self.channel_port_start) + u32::from(self.channels) > u32::from(u16::MAX) {
            return Err(ServerError::Config("channel port range overflows".to_string()));
        }
        Ok(())
    }
}
