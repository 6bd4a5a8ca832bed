//! Cellwatch - joins a game server and logs the world it is shown.

use anyhow::anyhow;
use client::{Config, Directory, Session, World};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Cellwatch v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load()?;
    if let Ok(server) = std::env::var("CELLWATCH_SERVER") {
        config.session.server = Some(server);
    }

    let address = server_address(&config).await?;
    let mut session = Session::connect(&address, &config.session).await?;
    info!("Connected to {}", address);

    if let Some(nickname) = &config.player.nickname {
        session.set_nickname(nickname).await?;
        info!("Spawning as {:?}", nickname);
    }

    let world = session.world();
    let interval = config.watch.summary_interval_ticks;
    let mut processed: u64 = 0;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let outcome = loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutting down");
                break Ok(());
            }
            result = session.tick(true) => match result {
                Ok(true) => {
                    processed += 1;
                    if interval > 0 && processed % interval == 0 {
                        summarize(&*world.read().await, processed);
                    }
                }
                Ok(false) => {}
                Err(e) if !e.is_fatal() => warn!("Dropped message: {}", e),
                Err(e) => {
                    error!("Session ended: {}", e);
                    break Err(e);
                }
            },
        }
    };

    if let Err(e) = session.close().await {
        warn!("Error while closing: {}", e);
    }
    outcome?;
    Ok(())
}

/// Explicit server from config, otherwise ask the directory.
async fn server_address(config: &Config) -> anyhow::Result<String> {
    if let Some(server) = &config.session.server {
        return Ok(server.clone());
    }

    let directory = Directory::new(config.directory.clone());
    let region = match &config.player.region {
        Some(region) => region.clone(),
        None => {
            let (location, recommended) = directory.current_location().await?;
            info!("Located in {:?}", location);
            recommended
                .ok_or_else(|| anyhow!("No region configured and none recommended for {:?}", location))?
        }
    };

    info!("Joining {} ({})", region, config.player.game_mode);
    Ok(directory.resolve(&region, &config.player.game_mode).await?)
}

fn summarize(world: &World, processed: u64) {
    let leader = world
        .leaderboard()
        .first()
        .map(|entry| entry.name.as_str())
        .unwrap_or("-");
    info!(
        "[{}] {} cells visible, {} owned, leader {:?}",
        processed,
        world.cells().len(),
        world.my_ids().len(),
        leader
    );

    if let Some(border) = world.border() {
        info!("  Border: {}x{}", border.width(), border.height());
    }
    if let Some(scores) = world.team_scores() {
        info!(
            "  Teams: red {:.2}, green {:.2}, blue {:.2}",
            scores.red, scores.green, scores.blue
        );
    }
}
