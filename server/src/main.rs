use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use comicraft_server::auth::token::create_session_token;
use comicraft_server::config::ServerConfig;
use comicraft_server::db::pool::{create_pool, run_migrations};
use comicraft_server::engine::community_engine::CommunityEngine;
use comicraft_server::storage::local::LocalImageStore;
use comicraft_server::web::app_state::AppState;
use comicraft_server::web::rate_limit::ApiRateLimiters;
use comicraft_server::web::router::build_router;

/// How often idle rate-limit buckets are swept.
const RATE_LIMIT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Parser)]
#[command(name = "comicraft-server", version, about = "ComiCraft community server")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, default_value = "comicraft.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP and WebSocket server (default).
    Serve,
    /// Print a session token for a user, for local development.
    IssueToken {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        email: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = ServerConfig::load(&cli.config)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::IssueToken { user_id, email } => {
            let auth = config.to_auth_config();
            let token = create_session_token(
                &user_id,
                &email,
                &auth.jwt_secret,
                auth.session_expiry_hours,
            )
            .context("failed to sign session token")?;
            println!("{token}");
            Ok(())
        }
    }
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let auth_config = config.to_auth_config();
    if auth_config.uses_default_secret() {
        warn!("JWT_SECRET is not set; using the development default. Do not run like this in production.");
    }

    // Initialize database
    let pool = create_pool(&config.database.url)
        .await
        .context("failed to connect to database")?;
    run_migrations(&pool)
        .await
        .context("failed to run database migrations")?;

    tokio::fs::create_dir_all(&config.storage.media_dir)
        .await
        .with_context(|| {
            format!(
                "failed to create media directory {}",
                config.storage.media_dir.display()
            )
        })?;
    let images = Arc::new(LocalImageStore::new(
        &config.storage.media_dir,
        &auth_config.public_url,
    ));

    let max_image_size = config.max_image_bytes();
    let engine = Arc::new(CommunityEngine::new(pool, images, max_image_size));

    let rate_limiters = Arc::new(ApiRateLimiters::default());
    let sweep_limiters = rate_limiters.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            sweep_limiters.cleanup(RATE_LIMIT_SWEEP_INTERVAL);
        }
    });

    let app_state = Arc::new(AppState {
        engine,
        auth_config,
        media_dir: config.storage.media_dir.clone(),
        max_image_size,
        top_communities_limit: config.community.top_communities_limit,
    });

    let app = build_router(app_state, rate_limiters);

    let web_addr = &config.server.web_address;
    info!("ComiCraft server starting on {}", web_addr);

    let listener = tokio::net::TcpListener::bind(web_addr)
        .await
        .with_context(|| format!("failed to bind web listener on {web_addr}"))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")?;
    Ok(())
}
