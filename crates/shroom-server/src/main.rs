//! Shroom server binary.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: login on 8484, two channels on 8485/8486, in-memory store
//! shroom-server
//!
//! # File-backed character store and a single channel
//! shroom-server --character-store /var/lib/shroom/characters.redb --channels 1
//! ```

use std::{net::SocketAddr, sync::Arc, time::Duration};

use clap::Parser;
use shroom_act::{GlobalClock, TickScheduler};
use shroom_crypto::{CryptoContext, ShroomVersion};
use shroom_net::LocaleCode;
use shroom_server::{
    ChannelEndpoint, ChannelGateway, ChannelId, LoginGateway, PlayerSession, RoomId, RoomServer,
    RoomTimer, ServerConfig, Session, SessionManager, WorldId,
    store::{CharacterStore, MemoryCharacterStore, RedbCharacterStore, START_MAP},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Shroom server starting");
    config.validate()?;

    if config.character_store == "memory:" {
        run(config, MemoryCharacterStore::new()).await
    } else {
        let store = RedbCharacterStore::open(&config.character_store)?;
        tracing::info!(path = %config.character_store, "character store opened");
        run(config, store).await
    }
}

async fn run<C: CharacterStore>(
    config: ServerConfig,
    store: C,
) -> Result<(), Box<dyn std::error::Error>> {
    let root = CancellationToken::new();
    let ctx = Arc::new(CryptoContext::default());
    let manager = SessionManager::new(store);

    let clock = GlobalClock::start();
    let scheduler =
        TickScheduler::new(clock, Duration::from_millis(config.tick_interval_ms))?;
    let room_server: RoomServer<Session<PlayerSession>> = RoomServer::new(scheduler.clone());

    let version = ShroomVersion::new(config.game_version);
    let world_id = WorldId(1);
    let world = room_server.create_world(world_id)?;

    let mut endpoints = Vec::new();
    let mut listener_tasks = Vec::new();

    for idx in 0..config.channels {
        let channel_id = ChannelId(u32::from(idx) + 1);
        let channel = room_server.create_channel(&world, channel_id)?;
        let room = room_server.create_room(&channel, RoomId::of_map(START_MAP))?;

        let timer = RoomTimer::new(room.clone(), room_server.notifier());
        listener_tasks.push(timer.start(root.clone()));

        let port = config.channel_port(idx);
        let bind_addr = SocketAddr::new(config.listen_address, port);
        let listener = TcpListener::bind(bind_addr).await?;
        tracing::info!(channel = %channel_id, %bind_addr, "channel listening");

        endpoints.push(ChannelEndpoint {
            id: channel_id,
            addr: SocketAddr::new(config.public_address, port),
        });

        let gateway = ChannelGateway::new(
            Arc::clone(&ctx),
            manager.clone(),
            room,
            version,
            config.sub_version.clone(),
            LocaleCode::Global,
        );
        listener_tasks.push(tokio::spawn(gateway.serve(listener, root.clone())));
    }

    let login_addr = SocketAddr::new(config.listen_address, config.login_port);
    let login_listener = TcpListener::bind(login_addr).await?;
    tracing::info!(%login_addr, "login listening");

    let login = LoginGateway::new(
        Arc::clone(&ctx),
        manager.clone(),
        world_id,
        endpoints,
        version,
        config.sub_version.clone(),
        LocaleCode::Global,
    );
    listener_tasks.push(tokio::spawn(login.serve(login_listener, root.clone())));

    let tick_task = scheduler.start(root.clone());
    tracing::info!(
        channels = config.channels,
        tick_ms = config.tick_interval_ms,
        "server running"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");

    root.cancel();
    let _ = tick_task.await;
    for task in listener_tasks {
        let _ = task.await;
    }

    tracing::info!("shutdown complete");
    Ok(())
}
