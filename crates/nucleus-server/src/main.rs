//! Nucleus - authentication core for the nuclear history platform

use anyhow::{Context, Result};
use chrono::Duration;
use clap::Parser;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;

use config::{Config, Profile};
use nucleus_api::{AppState, create_router};
use nucleus_auth::{JwtManager, LockoutPolicy, SystemClock};
use nucleus_db::{Database, NewAccount, Role};

/// Password of the bootstrap admin outside production
const DEVELOPMENT_ADMIN_PASSWORD: &str = "nucleus-admin";

/// Shortest password accepted for the bootstrap admin
const MIN_ADMIN_PASSWORD_LEN: usize = 8;

/// Nucleus - authentication core for the nuclear history platform
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "NUCLEUS_CONFIG", default_value = "config/default.toml")]
    config: String,

    /// Bind address
    #[arg(long, env = "NUCLEUS_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "NUCLEUS_PORT")]
    port: Option<u16>,

    /// Token signing secret
    #[arg(long, env = "NUCLEUS_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Deployment profile (development or production)
    #[arg(long, env = "NUCLEUS_PROFILE")]
    profile: Option<Profile>,

    /// Password for the admin account created on an empty database
    #[arg(long, env = "NUCLEUS_ADMIN_PASSWORD", hide_env_values = true)]
    admin_password: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let mut config = Config::load(&args.config)?;
    if let Some(secret) = args.jwt_secret {
        config.auth.jwt_secret = secret;
    }
    if let Some(profile) = args.profile {
        config.profile = profile;
    }

    // Initialize logging
    init_logging(&config.logging.level, &config.logging.format);

    info!("Starting Nucleus v{} ({} profile)", env!("CARGO_PKG_VERSION"), config.profile);

    config.validate()?;

    // Create data directory
    if let Some(parent) = Path::new(&config.database.path).parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create data directory {:?}", parent))?;
    }

    // Initialize database
    let db_path = format!("sqlite:{}?mode=rwc", config.database.path);
    let db = Database::new(&db_path).await?;

    bootstrap_admin(&db, config.profile, args.admin_password).await?;

    // Initialize JWT manager
    let jwt = Arc::new(JwtManager::new(
        &config.auth.jwt_secret,
        config.auth.token_expiry_hours,
    ));

    let policy = LockoutPolicy::new(
        config.auth.max_failed_attempts,
        Duration::minutes(config.auth.lockout_minutes),
    );
    info!(
        "Lockout after {} failed attempts for {} minutes",
        policy.max_failed_attempts,
        policy.lock_duration.num_minutes()
    );

    // Create application state
    let state = AppState::new(db, jwt, policy, Arc::new(SystemClock));

    // Create router
    let app = create_router(state).layer(TraceLayer::new_for_http());

    // Determine bind address
    let bind_addr = args.bind.unwrap_or(config.server.bind_address);
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", bind_addr, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind_addr, port))?;

    info!("Listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Create the default admin account if no accounts exist
async fn bootstrap_admin(db: &Database, profile: Profile, password: Option<String>) -> Result<()> {
    if db.has_accounts().await? {
        return Ok(());
    }

    let password = match (password, profile) {
        (Some(password), _) if password.len() < MIN_ADMIN_PASSWORD_LEN => {
            anyhow::bail!(
                "NUCLEUS_ADMIN_PASSWORD must be at least {} characters",
                MIN_ADMIN_PASSWORD_LEN
            )
        }
        (Some(password), _) => password,
        (None, Profile::Development) => {
            warn!(
                "Creating default admin user with the development password; \
                 set NUCLEUS_ADMIN_PASSWORD to choose one"
            );
            DEVELOPMENT_ADMIN_PASSWORD.to_string()
        }
        (None, Profile::Production) => {
            anyhow::bail!("Database has no accounts; set NUCLEUS_ADMIN_PASSWORD to bootstrap one")
        }
    };

    info!("Creating default admin user");
    let password_hash = nucleus_auth::password::hash_password_blocking(&password).await?;
    db.insert_account(NewAccount {
        username: "admin".to_string(),
        email: "admin@localhost".to_string(),
        password_hash,
        role: Role::Admin,
    })
    .await?;
    info!("Default admin user created (username: admin)");

    Ok(())
}

/// Initialize logging
fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if format == "json" {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install CTRL+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
