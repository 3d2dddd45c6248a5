use clap::Parser;
use dotenvy::dotenv;
use sheet_trimmer::config::WorkerConfig;
use sheet_trimmer::create_worker;
use sheet_trimmer::infrastructure::{load_aws_config, queue, storage};
use sheet_trimmer::services::transform::SpreadsheetTruncator;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Drains the upload queue and publishes the first rows of every spreadsheet.
/// All settings come from the environment (or a `.env` file).
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initial Environment & Logging Setup
    dotenv().ok();
    let _args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sheet_trimmer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting Sheet Trimmer...");

    let config = WorkerConfig::from_env()?;
    info!(
        "⚙️  Worker Config: Rows={}, Output Prefix={}",
        config.row_limit, config.output_prefix
    );

    // 2. Setup Shared Clients (constructed once, reused by every poll cycle)
    let aws_config = load_aws_config(&config).await;
    let storage_service = storage::setup_storage(&aws_config, &config).await;
    let queue_service = queue::setup_queue(&aws_config, &config);
    let transform = Arc::new(SpreadsheetTruncator::new(config.row_limit));

    let worker = create_worker(&config, queue_service, storage_service, transform);

    // 3. Run until terminated; a leased but unacknowledged message is simply redelivered
    tokio::select! {
        _ = worker.run() => {},
        _ = shutdown_signal() => {},
    }

    info!("👋 Worker exited.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, stopping worker...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, stopping worker...");
        },
    }
}
