//! escrow-engine entry point: loads configuration, sets up tracing, and
//! either runs the HTTP server or applies database migrations.

use std::{
    future::Future,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use escrow_engine::{
    api::{self, AppState},
    config::EscrowConfig,
    order_service::OrderLifecycleService,
    store::postgres::PgStore,
    telemetry,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "escrow-engine", version, about = "Escrow order lifecycle service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve(ConfigArgs),
    /// Apply pending database migrations and exit
    Migrate(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    /// TOML configuration file; skipped if it does not exist
    #[arg(short, long, default_value = "escrow.toml")]
    config: PathBuf,
}

impl Command {
    fn config_path(&self) -> &Path {
        match self {
            Self::Serve(args) | Self::Migrate(args) => &args.config,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Missing .env is fine; production injects env vars directly.
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let config = EscrowConfig::load(Some(cli.command.config_path()))
        .context("failed to load configuration")?;
    telemetry::init(&config.log);
    config.validate().context("invalid configuration")?;

    let store = PgStore::connect(&config.database)
        .await
        .context("failed to connect to database")?;

    match cli.command {
        Command::Migrate(_) => {
            store.migrate().await.context("migration failed")?;
            info!("Migrations applied");
        }
        Command::Serve(_) => serve(config, store).await?,
    }

    Ok(())
}

async fn serve(config: EscrowConfig, store: PgStore) -> anyhow::Result<()> {
    let service = OrderLifecycleService::new(config.orders.clone(), Arc::new(store));

    let app = api::build_router(AppState::new(service))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(config.server.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind_addr))?;
    info!("escrow-engine listening on http://{}", config.server.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    Ok(())
}

async fn shutdown_signal() {
    wait_for_shutdown(tokio::signal::ctrl_c()).await
}

/// Resolve when `signal` fires. If the signal cannot be installed, never
/// resolve, so the server keeps running instead of stopping at startup.
async fn wait_for_shutdown<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => info!("Shutdown signal received"),
        Err(err) => {
            warn!("Cannot listen for shutdown signal, running until killed: {}", err);
            std::future::pending::<()>().await;
        }
    }
}
