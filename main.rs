mod admin;
mod api;
mod auth;
mod config;
mod db;
mod error;
mod finalize;
mod models;
mod schema;
mod settings;
mod tracker;
mod user_management;

use crate::config::{AppPaths, PortalConfig};
use crate::db::DbPool;
use crate::error::{Error, Result};
use rusqlite::Connection;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

pub struct AppState {
    db: DbPool,
    config: PortalConfig,
}

impl AppState {
    /// Runs blocking SQLite work on a pooled connection off the async workers.
    pub async fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db.get()?;
            f(&conn)
        })
        .await
        .map_err(|e| Error::Init(format!("Task join error: {e}")))?
    }
}

fn prepare_database(db: &DbPool, config: &PortalConfig) -> Result<()> {
    let conn = db.get()?;
    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        auth::ensure_admin(&conn, email, password)?;
    } else {
        log::info!("PORTAL_ADMIN_EMAIL/PORTAL_ADMIN_PASSWORD not set, skipping admin bootstrap");
    }
    let purged = db::purge_expired_sessions(&conn, db::unix_now())?;
    if purged > 0 {
        log::info!("Purged {purged} expired sessions");
    }
    Ok(())
}

async fn serve() -> Result<()> {
    let config = PortalConfig::from_env()?;
    let paths = AppPaths::discover()?;
    log::info!("Data directory: {}", paths.root.display());
    let db_pool = db::init_database(&paths)?;
    prepare_database(&db_pool, &config)?;

    let bind = config.bind.clone();
    let app = api::router(Arc::new(AppState {
        db: db_pool,
        config,
    }));

    let listener = TcpListener::bind(&bind).await?;
    log::info!("Proofing portal listening on {bind}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
        log::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                log::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {e}");
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
}

#[tokio::main]
async fn main() {
    env_logger::init();

    if let Err(e) = serve().await {
        log::error!("Proofing portal failed: {e}");
        std::process::exit(1);
    }
}
