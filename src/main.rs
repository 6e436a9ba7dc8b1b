//! ShopEase - An e-commerce backend

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shopease::{
    api::{self, AppState},
    config::Config,
    db,
};

#[derive(Debug, Parser)]
#[command(name = "shopease", version, about = "ShopEase e-commerce API server")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yml")]
    config: PathBuf,

    /// Clear every stored session token and exit
    #[arg(long)]
    reset_sessions: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shopease=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting ShopEase...");

    let config = Config::load_with_env(&cli.config)?;
    tracing::info!(path = %cli.config.display(), "Configuration loaded");
    if config.auth.uses_default_secret() {
        tracing::warn!("Using the built-in JWT secret; set SHOPEASE_AUTH_JWT_SECRET in production");
    }

    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    let state = AppState::new(pool.clone(), &config.auth);

    if cli.reset_sessions {
        let cleared = state.user_service.reset_sessions().await?;
        tracing::info!(cleared, "Stored sessions cleared");
        pool.close().await;
        return Ok(());
    }

    if config.database.seed_items {
        let seeded = db::seed::seed_items(&pool).await?;
        if seeded > 0 {
            tracing::info!(count = seeded, "Catalog seeded");
        }
    }

    let app = api::build_router(state, &config.server);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
