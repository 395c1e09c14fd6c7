//! Hexhold Game Server
//!
//! Authoritative server binary: loads or generates a world, then runs the
//! WebSocket server with its fixed-rate simulation loop until Ctrl-C.

use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;

use hexhold::game::visibility;
use hexhold::game::worldgen::{generate, GenConfig};
use hexhold::network::auth::AuthConfig;
use hexhold::network::server::{GameServer, ServerConfig};
use hexhold::{store, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = ServerConfig::from_env();
    let auth = AuthConfig::from_env();

    info!("Hexhold Server v{}", VERSION);
    info!("Tick Rate: {} Hz", config.tick_rate);
    info!("Broadcast Rate: {} Hz", config.broadcast_rate);
    if !auth.is_configured() {
        warn!("No AUTH_SECRET or AUTH_PUBLIC_KEY_PEM set; all logins will be rejected");
    }

    // Load an existing save if one is configured and present; otherwise
    // generate a fresh world. A corrupt save aborts instead of being
    // silently regenerated over.
    let world = match &config.save_path {
        Some(path) => match store::load_world(path)? {
            Some(mut world) => {
                // Visibility is derived state; rebuild it after a load
                visibility::recompute_all(&mut world);
                info!(seed = %world.seed, "resuming saved world");
                world
            }
            None => generate_fresh(),
        },
        None => generate_fresh(),
    };

    let server = std::sync::Arc::new(GameServer::new(config, auth));

    // Ctrl-C triggers a clean shutdown; run() returns only after the game
    // loop has stopped (and saved, when configured).
    let signal_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            signal_server.shutdown();
        }
    });

    server.run(world).await?;
    Ok(())
}

fn generate_fresh() -> hexhold::game::world::World {
    let gen_config = GenConfig {
        seed: std::env::var("HEXHOLD_SEED").unwrap_or_else(|_| "default".into()),
        radius: std::env::var("HEXHOLD_MAP_RADIUS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(20),
        ..Default::default()
    };
    info!(seed = %gen_config.seed, radius = gen_config.radius, "generating fresh world");
    generate(&gen_config)
}
