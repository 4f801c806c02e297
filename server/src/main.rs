mod catalog;
mod config;
mod persistence;
mod progress;
mod service;
mod session;
#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use config::StoreBackend;
use persistence::sqlite::{migrate_json_to_sqlite, Database, SqliteProgressStore};
use persistence::{JsonProgressStore, ProgressStore};
use progress::{run_retry_worker, ProgressService, RetryPolicy};
use quiz::Catalog;
use quiz_proto::quiz_service_server::QuizServiceServer;
use service::QuizServiceImpl;
use session::SessionManager;
use tokio::sync::mpsc;
use tonic::transport::Server;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const RETRY_QUEUE_DEPTH: usize = 256;

/// Level progression and scoring engine for the quiz arena.
///
/// Flags override the matching QUIZ_* environment variables.
#[derive(Parser)]
#[command(name = "quiz-server", version)]
struct Args {
    /// Address to serve gRPC on.
    #[arg(long)]
    listen: Option<String>,

    /// Directory holding the progress database (or JSON files).
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Level catalog JSON file. Defaults to the built-in catalog.
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Progress store backend: sqlite or json.
    #[arg(long)]
    store: Option<StoreBackend>,

    /// Also write daily-rolling log files here.
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

/// Stdout logging with span durations, plus an optional non-blocking file
/// writer. The returned guard must live until shutdown to flush the file.
fn init_tracing(log_dir: Option<&Path>) -> std::io::Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = tracing_appender::rolling::daily(dir, "quiz-server");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_span_events(FmtSpan::CLOSE))
        .with(file_layer)
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let log_dir = args.log_dir.or_else(config::get_log_dir);
    let _log_guard = init_tracing(log_dir.as_deref())?;

    tracing::info!("Starting quiz gRPC server");

    let data_dir = args.data_dir.unwrap_or_else(config::get_data_dir);
    let catalog_path = args.catalog.or_else(config::get_catalog_path);
    let backend = args.store.unwrap_or_else(config::get_store_backend);
    let addr: SocketAddr = args.listen.unwrap_or_else(config::get_listen_addr).parse()?;

    tracing::info!(data_dir = %data_dir.display(), backend = ?backend, "Using data directory");

    let catalog = catalog::load_catalog(catalog_path.as_deref())?;

    match backend {
        StoreBackend::Sqlite => {
            let db = Database::open(&data_dir.join("quiz.db")).await?;
            let report = migrate_json_to_sqlite(db.pool(), &JsonProgressStore::new(&data_dir)).await?;
            if !report.skipped && (report.progress > 0 || report.sessions > 0) {
                tracing::info!(
                    progress = report.progress,
                    sessions = report.sessions,
                    "Imported JSON data into SQLite"
                );
            }
            let store = Arc::new(SqliteProgressStore::new(db.pool().clone()));
            serve(store, catalog, addr).await
        }
        StoreBackend::Json => {
            let store = Arc::new(JsonProgressStore::new(&data_dir));
            serve(store, catalog, addr).await
        }
    }
}

async fn serve<S: ProgressStore>(
    store: Arc<S>,
    catalog: Arc<Catalog>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    let progress = Arc::new(ProgressService::new(catalog, store));

    let policy = RetryPolicy {
        max_retries: config::get_reconcile_max_retries(),
        base_backoff: config::get_reconcile_backoff(),
    };
    let (retry_tx, retry_rx) = mpsc::channel(RETRY_QUEUE_DEPTH);
    tokio::spawn(run_retry_worker(progress.clone(), retry_rx, policy));

    let session_manager = Arc::new(SessionManager::new(
        progress.clone(),
        retry_tx,
        config::get_session_linger(),
    ));
    let service = QuizServiceImpl::new(progress, session_manager.clone());

    tracing::info!("Server listening on {}", addr);

    Server::builder()
        .add_service(QuizServiceServer::new(service))
        .serve_with_shutdown(addr, async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    let closed = session_manager.close_all().await;
    tracing::info!(sessions = closed, "Closed live sessions");

    Ok(())
}
