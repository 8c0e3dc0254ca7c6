//! CampusNet client - headless entry point.
//!
//! Boots the engine: restores the session, hydrates the profile, pulls the
//! feed once, then stays up reconciling realtime changes until interrupted.

use anyhow::Result;
use campusnet_client::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("campusnet_client=debug")),
        )
        .init();

    let app = App::new(Config::from_env());
    app.spawn_session_watcher();
    app.bootstrap().await;

    let profile = app.user.profile();
    tracing::info!(
        name = %profile.name,
        level = profile.level,
        xp = profile.xp,
        "profile ready"
    );

    let posts = app.feed.refresh().await;
    tracing::info!(count = posts.len(), "feed synchronized");

    let change_feed = app.start_realtime();
    tokio::signal::ctrl_c().await?;
    tracing::info!(state = ?change_feed.state(), "shutting down");
    app.user.flush_sync().await;

    Ok(())
}
