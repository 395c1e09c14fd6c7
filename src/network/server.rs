//! WebSocket Game Server
//!
//! Async WebSocket server for multiplayer connections. Connection tasks
//! never touch the world: every inbound command is funneled over a single
//! mpsc channel into the game-loop task, which is the only owner of the
//! [`World`]. Outbound snapshots go the other way through per-player
//! senders and are fire-and-forget, so a slow client cannot stall the
//! simulation.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::interval;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use crate::core::rng::DeterministicRng;
use crate::game::battle;
use crate::game::commands::{self, Command, CommandReply};
use crate::game::tick::{self, TickConfig};
use crate::game::visibility;
use crate::game::world::{PlayerId, World};
use crate::network::auth::{validate_token, AuthConfig};
use crate::network::protocol::{
    AuthResult, ClientMessage, ErrorCode, ServerError, ServerMessage,
};
use crate::network::sync;
use crate::store;
use crate::{BROADCAST_RATE, TICK_RATE};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Simulation rate in ticks per second.
    pub tick_rate: u32,
    /// Snapshot broadcast rate in Hz; must not exceed the tick rate.
    pub broadcast_rate: u32,
    /// Units in a fresh player's starting group.
    pub starting_units: usize,
    /// Connections with no inbound traffic for this long are closed.
    pub idle_timeout: Duration,
    /// Where to save the world on shutdown, if anywhere.
    pub save_path: Option<PathBuf>,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".parse().unwrap(),
            max_connections: 1000,
            tick_rate: TICK_RATE,
            broadcast_rate: BROADCAST_RATE,
            starting_units: 3,
            idle_timeout: Duration::from_secs(300),
            save_path: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: std::env::var("HEXHOLD_BIND_ADDR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.bind_addr),
            max_connections: std::env::var("HEXHOLD_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_connections),
            tick_rate: std::env::var("HEXHOLD_TICK_RATE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.tick_rate),
            broadcast_rate: std::env::var("HEXHOLD_BROADCAST_RATE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.broadcast_rate),
            starting_units: std::env::var("HEXHOLD_STARTING_UNITS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.starting_units),
            idle_timeout: std::env::var("HEXHOLD_IDLE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.idle_timeout),
            save_path: std::env::var("HEXHOLD_SAVE_PATH").ok().map(PathBuf::from),
            version: defaults.version,
        }
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Events funneled into the game-loop task. This channel is the single
/// mutation path to the world.
enum LoopEvent {
    /// A client authenticated; attach its outbound sender.
    Join {
        player: PlayerId,
        sender: mpsc::Sender<ServerMessage>,
    },
    /// A client disconnected.
    Leave { player: PlayerId },
    /// A validated command from a connected player.
    Command { player: PlayerId, command: Command },
}

/// The game server. `clients` tracks the last inbound activity per
/// connection for the idle timeout.
pub struct GameServer {
    config: ServerConfig,
    auth: AuthConfig,
    clients: Arc<RwLock<BTreeMap<SocketAddr, Instant>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig, auth: AuthConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            auth,
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Run the server until shutdown, taking ownership of the world.
    #[instrument(skip(self, world))]
    pub async fn run(&self, world: World) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("Game server listening on {}", self.config.bind_addr);

        let (events_tx, events_rx) = mpsc::channel::<LoopEvent>(256);

        let loop_config = self.config.clone();
        let loop_shutdown = self.shutdown_tx.subscribe();
        let game_loop = tokio::spawn(async move {
            run_game_loop(world, events_rx, loop_config, loop_shutdown).await;
        });

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.clients.read().await.len();
                            if clients_count >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr, events_tx.clone());
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        // Dropping the last sender ends the game loop after it saves
        drop(events_tx);
        let _ = game_loop.await;

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(
        &self,
        stream: TcpStream,
        addr: SocketAddr,
        events_tx: mpsc::Sender<LoopEvent>,
    ) {
        let clients = self.clients.clone();
        let auth = self.auth.clone();
        let config = self.config.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);

            {
                let mut clients = clients.write().await;
                clients.insert(addr, Instant::now());
            }

            // Outbound pump: serializes and writes; dies with the socket
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            let mut player_id: Option<PlayerId> = None;
            let mut idle_check = interval(config.idle_timeout.max(Duration::from_secs(4)) / 4);

            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let client_msg = match ClientMessage::from_json(&text) {
                                    Ok(m) => m,
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", addr, e);
                                        let _ = msg_tx.send(ServerMessage::Error(ServerError {
                                            code: ErrorCode::InvalidInput,
                                            message: "Invalid message format".to_string(),
                                        })).await;
                                        continue;
                                    }
                                };

                                {
                                    let mut clients = clients.write().await;
                                    if let Some(last) = clients.get_mut(&addr) {
                                        *last = Instant::now();
                                    }
                                }

                                let keep_going = handle_client_message(
                                    addr,
                                    client_msg,
                                    &mut player_id,
                                    &auth,
                                    &config,
                                    &events_tx,
                                    &msg_tx,
                                ).await;
                                if !keep_going {
                                    break;
                                }
                            }
                            Some(Ok(Message::Ping(_))) => {
                                let _ = msg_tx.send(ServerMessage::Pong {
                                    timestamp: 0,
                                    server_time: wall_clock_millis(),
                                }).await;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = idle_check.tick() => {
                        let last = clients.read().await.get(&addr).copied();
                        if last.is_some_and(|t| t.elapsed() >= config.idle_timeout) {
                            info!("Client {} idle, closing connection", addr);
                            break;
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            sender_task.abort();

            if let Some(player) = player_id {
                let _ = events_tx.send(LoopEvent::Leave { player }).await;
            }
            {
                let mut clients = clients.write().await;
                clients.remove(&addr);
            }

            info!("Client {} cleaned up", addr);
        });
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

/// Dispatch one parsed client message. Returns false when the connection
/// should close.
async fn handle_client_message(
    addr: SocketAddr,
    msg: ClientMessage,
    player_id: &mut Option<PlayerId>,
    auth: &AuthConfig,
    config: &ServerConfig,
    events_tx: &mpsc::Sender<LoopEvent>,
    sender: &mpsc::Sender<ServerMessage>,
) -> bool {
    match msg {
        ClientMessage::Auth(request) => {
            let claims = match validate_token(&request.token, auth) {
                Ok(claims) => claims,
                Err(e) => {
                    warn!("Auth failed for {}: {}", addr, e);
                    let _ = sender
                        .send(ServerMessage::AuthResult(AuthResult {
                            success: false,
                            player_id: None,
                            error: Some(e.to_string()),
                            server_version: config.version.clone(),
                        }))
                        .await;
                    // Invalid credential: immediate disconnect
                    return false;
                }
            };

            let player = claims.player_id();
            *player_id = Some(player);

            let _ = sender
                .send(ServerMessage::AuthResult(AuthResult {
                    success: true,
                    player_id: Some(player),
                    error: None,
                    server_version: config.version.clone(),
                }))
                .await;
            let _ = events_tx
                .send(LoopEvent::Join {
                    player,
                    sender: sender.clone(),
                })
                .await;
            debug!("Client {} authenticated as {}", addr, player);
            true
        }
        ClientMessage::Ping { timestamp } => {
            let _ = sender
                .send(ServerMessage::Pong {
                    timestamp,
                    server_time: wall_clock_millis(),
                })
                .await;
            true
        }
        ClientMessage::Leave => false,
        other => {
            let Some(player) = *player_id else {
                let _ = sender
                    .send(ServerMessage::Error(ServerError {
                        code: ErrorCode::NotAuthenticated,
                        message: "Must authenticate first".to_string(),
                    }))
                    .await;
                return true;
            };
            if let Some(command) = other.to_command() {
                let _ = events_tx.send(LoopEvent::Command { player, command }).await;
            }
            true
        }
    }
}

/// The single mutation path: owns the world, drains events between ticks,
/// advances the simulation at the tick rate, and broadcasts filtered
/// snapshots at the slower broadcast rate.
async fn run_game_loop(
    mut world: World,
    mut events_rx: mpsc::Receiver<LoopEvent>,
    config: ServerConfig,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let tick_rate = config.tick_rate.max(1);
    let broadcast_every = broadcast_cadence(config.tick_rate, config.broadcast_rate);
    let dt = 1.0 / tick_rate as f64;

    let mut rng = DeterministicRng::from_seed_str(&world.seed, "battles");
    let tick_config = TickConfig::default();
    let mut senders: BTreeMap<PlayerId, mpsc::Sender<ServerMessage>> = BTreeMap::new();

    let tick_duration = Duration::from_micros(1_000_000 / tick_rate as u64);
    let mut tick_interval = interval(tick_duration);
    tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut tick_count: u64 = 0;
    let mut running = true;

    info!(
        tick_rate,
        broadcast_every, "game loop started"
    );

    while running {
        tokio::select! {
            _ = tick_interval.tick() => {}
            _ = shutdown_rx.recv() => {
                running = false;
            }
        }

        // Drain all pending events before advancing the simulation
        loop {
            match events_rx.try_recv() {
                Ok(event) => apply_event(&mut world, &config, &mut senders, event),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    running = false;
                    break;
                }
            }
        }

        if !running {
            break;
        }

        tick::advance(&mut world, &mut rng, &tick_config, battle::default_damage, dt);
        tick_count += 1;

        if tick_count % broadcast_every == 0 {
            broadcast_snapshots(&world, &senders);
        }
    }

    if let Some(path) = &config.save_path {
        match store::save_world(&world, path) {
            Ok(()) => info!(path = %path.display(), "world saved"),
            Err(e) => error!("Failed to save world: {}", e),
        }
    }
    info!("game loop stopped");
}

/// Apply one join/leave/command event inside the game-loop task.
fn apply_event(
    world: &mut World,
    config: &ServerConfig,
    senders: &mut BTreeMap<PlayerId, mpsc::Sender<ServerMessage>>,
    event: LoopEvent,
) {
    match event {
        LoopEvent::Join { player, sender } => {
            let first_time = !world
                .players
                .get(&player)
                .is_some_and(|p| p.initialized);
            world.ensure_player(player);
            if first_time {
                world.spawn_starting_group(player, config.starting_units);
            }
            visibility::recompute(world, player);

            // Map memory goes out once per connection, then snapshots
            if let Some(msg) = sync::discovered_tiles(world, player) {
                let _ = sender.try_send(msg);
            }
            senders.insert(player, sender);
        }
        LoopEvent::Leave { player } => {
            senders.remove(&player);
        }
        LoopEvent::Command { player, command } => {
            let reply = commands::apply(world, player, command);
            let Some(reply) = reply else {
                return;
            };
            let Some(sender) = senders.get(&player) else {
                return;
            };
            let message = match reply {
                CommandReply::Relation { a, b, relation } => {
                    ServerMessage::GamestateRelation { a, b, relation }
                }
                CommandReply::Tiles(tiles) => ServerMessage::GamestateTiles { tiles },
            };
            let _ = sender.try_send(message);
        }
    }
}

/// Ticks between snapshot broadcasts. The tick counter is 64-bit, so the
/// cadence is too.
fn broadcast_cadence(tick_rate: u32, broadcast_rate: u32) -> u64 {
    let tick_rate = tick_rate.max(1);
    u64::from((tick_rate / broadcast_rate.clamp(1, tick_rate)).max(1))
}

/// Push the filtered snapshot batch to every connected player. try_send
/// only: a full client queue drops this round rather than blocking.
fn broadcast_snapshots(world: &World, senders: &BTreeMap<PlayerId, mpsc::Sender<ServerMessage>>) {
    for (player, sender) in senders {
        for message in sync::snapshot(world, *player) {
            if sender.try_send(message).is_err() {
                debug!(player = %player, "snapshot dropped, client queue full");
                break;
            }
        }
    }
}

fn wall_clock_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hex::Hex;
    use crate::game::tile::{Biome, Tile};

    fn flat_world(radius: i32) -> World {
        let tiles = Hex::ZERO
            .range(radius)
            .into_iter()
            .map(|hex| {
                let mut tile = Tile::stub();
                tile.biome = Biome::Grassland;
                (hex, tile)
            })
            .collect();
        World::from_tiles("test".into(), radius, tiles)
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.tick_rate, TICK_RATE);
        assert_eq!(config.broadcast_rate, BROADCAST_RATE);
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.idle_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_broadcast_cadence() {
        // 10 Hz ticks at 2 Hz broadcasts: every 5th tick
        assert_eq!(broadcast_cadence(10, 2), 5);
        // Broadcast rate is clamped into [1, tick_rate]
        assert_eq!(broadcast_cadence(10, 0), 10);
        assert_eq!(broadcast_cadence(10, 100), 1);
        assert_eq!(broadcast_cadence(0, 0), 1);

        // The cadence divides a 64-bit tick counter
        let tick_count: u64 = u64::from(u32::MAX) + 7;
        assert_eq!(tick_count % broadcast_cadence(10, 2), 2);
    }

    #[tokio::test]
    async fn test_server_creation() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        };
        let server = GameServer::new(config, AuthConfig::default());
        assert_eq!(server.connection_count().await, 0);
        server.shutdown();
    }

    #[tokio::test]
    async fn test_join_spawns_once_and_sends_map_memory() {
        let mut world = flat_world(3);
        let config = ServerConfig::default();
        let mut senders = BTreeMap::new();
        let player = PlayerId::new([1; 16]);
        let (tx, mut rx) = mpsc::channel(16);

        apply_event(&mut world, &config, &mut senders, LoopEvent::Join {
            player,
            sender: tx.clone(),
        });
        assert_eq!(world.groups.len(), 1);
        assert!(matches!(
            rx.try_recv(),
            Ok(ServerMessage::GamestateTiles { .. })
        ));

        // Reconnect must not spawn a second group
        apply_event(&mut world, &config, &mut senders, LoopEvent::Join {
            player,
            sender: tx,
        });
        assert_eq!(world.groups.len(), 1);
    }

    #[tokio::test]
    async fn test_command_reply_routed_to_caller() {
        let mut world = flat_world(2);
        let config = ServerConfig::default();
        let mut senders = BTreeMap::new();
        let player = PlayerId::new([1; 16]);
        let other = PlayerId::new([2; 16]);
        let (tx, mut rx) = mpsc::channel(16);

        apply_event(&mut world, &config, &mut senders, LoopEvent::Join {
            player,
            sender: tx,
        });
        let _ = rx.try_recv(); // discard map memory

        apply_event(&mut world, &config, &mut senders, LoopEvent::Command {
            player,
            command: Command::QueryRelation { a: player, b: other },
        });
        assert!(matches!(
            rx.try_recv(),
            Ok(ServerMessage::GamestateRelation { .. })
        ));
    }

    #[tokio::test]
    async fn test_leave_detaches_sender() {
        let mut world = flat_world(2);
        let config = ServerConfig::default();
        let mut senders = BTreeMap::new();
        let player = PlayerId::new([1; 16]);
        let (tx, _rx) = mpsc::channel(16);

        apply_event(&mut world, &config, &mut senders, LoopEvent::Join {
            player,
            sender: tx,
        });
        assert_eq!(senders.len(), 1);
        apply_event(&mut world, &config, &mut senders, LoopEvent::Leave { player });
        assert!(senders.is_empty());
    }
}
