use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use payguard::config::Config;
use payguard::db::{create_pool, init_db, AppState};
use payguard::handlers;
use payguard::payments::StripeClient;
use payguard::rate_limit::{InMemoryRateLimiter, RateLimiter, RedisRateLimiter};
use payguard::security::origin::OriginAllowlist;

#[derive(Parser, Debug)]
#[command(name = "payguard")]
#[command(about = "One-time checkout service with webhook reconciliation")]
struct Cli {
    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "payguard=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }
    if config.stripe.secret_key.is_none() {
        tracing::warn!("STRIPE_SECRET_KEY is not set; checkout initiation will fail");
    }
    if config.stripe.price_id.is_empty() {
        tracing::warn!("STRIPE_PRICE_ID is not set; checkout initiation will fail");
    }
    if config.stripe.webhook_secret.is_none() {
        tracing::warn!("STRIPE_WEBHOOK_SECRET is not set; webhooks will be rejected");
    }

    // Create the database pool and initialize the schema
    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    // Pick the rate limit backend: shared Redis counter when configured,
    // per-process map otherwise (a documented relaxation, limits then apply
    // per process rather than cluster-wide)
    let limiter: Arc<dyn RateLimiter> = match config.redis_url {
        Some(ref url) => match RedisRateLimiter::connect(url, &config.rate_limit).await {
            Ok(limiter) => {
                tracing::info!("Rate limiting backed by redis");
                Arc::new(limiter)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to connect to redis ({}); falling back to in-process rate limiting",
                    e
                );
                Arc::new(InMemoryRateLimiter::new(&config.rate_limit))
            }
        },
        None => Arc::new(InMemoryRateLimiter::new(&config.rate_limit)),
    };

    let state = AppState {
        db: db_pool,
        stripe: StripeClient::new(&config.stripe),
        origins: Arc::new(OriginAllowlist::new(&config.allowed_origins)),
        limiter,
        app_url: config.app_url.clone(),
        dev_mode: config.dev_mode,
    };

    let app = handlers::router(state.clone())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start the server
    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();
    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("Payguard server listening on {}", addr);

    // Run with graceful shutdown; connect info enables IP-based rate limiting
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(&db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        }
        // Also remove WAL and SHM files if they exist
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received");
}
