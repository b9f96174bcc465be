//! Stagehand - theatre back-office service
//!
//! `stagehand serve` runs the HTTP API; `stagehand create-theater` bootstraps
//! a theater and its first administrator.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use sqlx::SqlitePool;
use stagehand_common::auth::{JwtKeys, Role};
use stagehand_common::config::{RootFolderInitializer, RootFolderResolver, TomlConfig};
use stagehand_common::db::{init_database, load_or_init_jwt_secret, RuntimeSettings};
use stagehand_server::db::theaters::{self, TheaterInput};
use stagehand_server::db::users::NewUser;
use stagehand_server::storage::LocalAttachmentStore;
use stagehand_server::{build_router, AppState};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "stagehand")]
#[command(about = "Theatre back-office service")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Folder holding the database and attachments
    #[arg(short, long, global = true)]
    root_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve(ServeArgs),
    /// Create a theater with its first administrator
    CreateTheater(CreateTheaterArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind (overrides config)
    #[arg(long)]
    host: Option<String>,
}

#[derive(Args, Debug)]
struct CreateTheaterArgs {
    #[arg(long)]
    name: String,

    #[arg(long)]
    city: Option<String>,

    #[arg(long)]
    admin_username: String,

    #[arg(long, default_value = "Administrator")]
    admin_full_name: String,

    #[arg(long, env = "STAGEHAND_ADMIN_PASSWORD", hide_env_values = true)]
    admin_password: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = TomlConfig::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    let level = config.logging.level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "stagehand={0},stagehand_server={0},stagehand_common={0},tower_http=info",
                    level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting Stagehand v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = RootFolderResolver::new()
        .with_cli_arg(cli.root_folder.clone())
        .with_toml(&config)
        .resolve();

    let initializer = RootFolderInitializer::new(root_folder);
    initializer.ensure_directory_exists()?;
    info!("Root folder: {}", initializer.root().display());

    let db_path = initializer.database_path();
    info!("Database path: {}", db_path.display());

    let pool = match init_database(&db_path).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    match cli.command {
        Command::Serve(args) => serve(pool, config, &initializer, args).await,
        Command::CreateTheater(args) => create_theater(&pool, args).await,
    }
}

async fn serve(
    pool: SqlitePool,
    config: TomlConfig,
    initializer: &RootFolderInitializer,
    args: ServeArgs,
) -> Result<()> {
    let secret = match config.auth.jwt_secret.clone() {
        Some(secret) => {
            info!("Using JWT secret from configuration");
            secret
        }
        None => load_or_init_jwt_secret(&pool).await?,
    };
    let jwt = JwtKeys::new(&secret, config.auth.issuer.clone());

    let settings = RuntimeSettings::load(&pool).await?;
    info!(
        "Scheduling: horizon {} days, events up to {} h, windows up to {} days",
        settings.schedule_horizon_days, settings.max_event_hours, settings.max_window_days
    );

    let store = LocalAttachmentStore::new(initializer.attachments_path(&config.storage));
    store.ensure_dir().await?;
    info!("Attachments: {}", store.dir().display());

    let state = AppState::new(pool, jwt, settings, Arc::new(store), &config);
    let app = build_router(state);

    let host = args.host.unwrap_or_else(|| config.server.host.clone());
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Stagehand listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn create_theater(pool: &SqlitePool, args: CreateTheaterArgs) -> Result<()> {
    if args.admin_password.is_empty() {
        bail!("--admin-password (or STAGEHAND_ADMIN_PASSWORD) must not be empty");
    }

    let input = TheaterInput {
        name: args.name,
        city: args.city,
    };
    let admin = NewUser {
        username: args.admin_username,
        full_name: args.admin_full_name,
        email: None,
        password: args.admin_password,
        role: Role::Admin,
    };

    let (theater, admin_id) = theaters::create_theater_with_admin(pool, &input, &admin)
        .await
        .context("Failed to create theater")?;

    println!(
        "Created theater {} '{}' with administrator '{}' (user {})",
        theater.id, theater.name, admin.username, admin_id
    );
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
