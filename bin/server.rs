// Expense Tracker - Web Server
// REST API over the expense store with Axum

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use expense_tracker::logging::init_tracing;
use expense_tracker::{router, ExpenseStore, StoreConfig, VERSION};

/// Server command-line arguments
#[derive(Parser, Debug, Clone)]
#[command(name = "expense-server", version, about = "Expense Tracker HTTP API")]
struct ServerArgs {
    /// Bind address
    #[arg(short, long, env = "EXPENSES_BIND", default_value = "127.0.0.1")]
    bind: String,

    /// Port to listen on
    #[arg(short, long, env = "EXPENSES_PORT", default_value_t = 5000)]
    port: u16,

    /// SQLite database file
    #[arg(long, env = "EXPENSES_DB", default_value = "expenses.db")]
    db: PathBuf,

    /// Directory served under /static (e.g. the browser dashboard)
    #[arg(long, env = "EXPENSES_STATIC_DIR")]
    static_dir: Option<PathBuf>,

    /// How long a connection waits on a locked database, in milliseconds
    #[arg(long, default_value_t = 5000)]
    busy_timeout_ms: u64,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServerArgs::parse();
    init_tracing(if args.debug { "debug" } else { "info" })?;

    info!("Expense Tracker v{}", VERSION);

    let store = ExpenseStore::new(StoreConfig {
        path: args.db.clone(),
        busy_timeout: Duration::from_millis(args.busy_timeout_ms),
    });
    store
        .init_schema()
        .with_context(|| format!("Failed to initialize database at {}", args.db.display()))?;

    if let Some(dir) = &args.static_dir {
        info!("Serving static files from {}", dir.display());
    }

    let app = router(store, args.static_dir.clone());

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", args.bind, args.port))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Server running on http://{}", addr);
    info!("Database: {}", args.db.display());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => warn!("Received Ctrl+C, shutting down"),
        _ = terminate => warn!("Received SIGTERM, shutting down"),
    }
}
