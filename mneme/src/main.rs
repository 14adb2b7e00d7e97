use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mneme::api::{create_router, AppState};
use mneme::config::Config;

#[derive(Parser)]
#[command(name = "mneme")]
#[command(about = "Memory-augmented chat backend")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Chunk, embed and index a document into the document namespace
    Ingest {
        path: PathBuf,
        /// Source name stored with each chunk; defaults to the path
        #[arg(long)]
        source: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env();

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Ingest { path, source } => ingest(config, path, source).await,
    }
}

fn init_tracing() {
    let json = Config::log_format().is_some_and(|format| format.eq_ignore_ascii_case("json"));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mneme=info,tower_http=debug".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

async fn serve(config: Config) -> anyhow::Result<()> {
    if config.search.tavily_api_key.is_none() {
        tracing::warn!("TAVILY_API_KEY is not set - web search context will be empty");
    }
    if config.llm.api_key.is_none() {
        tracing::warn!("LLM_API_KEY is not set - hosted chat and scoring models will be unavailable");
    }
    tracing::info!(mode = ?config.memory.write_mode, "Memory write mode");

    let shutdown = CancellationToken::new();
    let state = AppState::from_config(config.clone(), shutdown.clone()).await?;
    let writer = state.orchestrator.writer().clone();
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Mneme starting on http://{}", addr);
    tracing::info!("  Health check: http://{}/api/v1/health", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    writer
        .drain(Duration::from_secs(config.server.shutdown_grace_secs))
        .await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn ingest(config: Config, path: PathBuf, source: Option<String>) -> anyhow::Result<()> {
    let state = AppState::from_config(config, CancellationToken::new()).await?;

    tracing::info!(path = %path.display(), "Ingesting document...");
    let report = state.ingestor.ingest_path(&path, source.as_deref()).await?;
    tracing::info!(source = %report.source, chunks = report.chunks, "Done");
    Ok(())
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, cancelling in-flight generations...");
    cancel_token.cancel();
}
