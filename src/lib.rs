//! spaced - virtual-space presence daemon
//!
//! Users join shared 2-D spaces over WebSocket, move one cell at a time and
//! see each other move. Accounts and spaces are served over HTTP from the
//! same listener.

pub mod api;
pub mod auth;
pub mod db;
pub mod init;
pub mod presence;
pub mod spaces;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use db::Database;
use presence::RoomRegistry;

/// Config file read when no explicit path is given
pub const DEFAULT_CONFIG_FILE: &str = "spaced.toml";

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// None = in-memory database
    pub db_path: Option<String>,
    /// Emit logs as JSON lines
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            db_path: None,
            log_json: false,
        }
    }
}

impl Config {
    /// Layer defaults, a TOML file and `SPACED_*` environment variables.
    ///
    /// A missing file is not an error.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let file = file.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed("SPACED_").only(&["bind_addr", "db_path", "log_json"]))
            .extract()?;
        Ok(config)
    }
}

/// The spaced server instance
pub struct Server {
    config: Config,
    db: Arc<Database>,
    registry: Arc<RoomRegistry>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Create a new server instance with an empty room registry
    pub async fn new(config: Config) -> Result<Self> {
        let db = Database::new(config.db_path.as_deref()).await?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            db: Arc::new(db),
            registry: Arc::new(RoomRegistry::new()),
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Get the database handle
    pub fn db(&self) -> Arc<Database> {
        self.db.clone()
    }

    /// Live rooms of this server
    pub fn registry(&self) -> Arc<RoomRegistry> {
        self.registry.clone()
    }

    fn router(&self) -> Router {
        api::router(self.db.clone(), self.registry.clone())
    }

    /// Bind the configured address and serve until shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until shutdown
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        info!("spaced listening on {}", local_addr);

        let router = self.router();
        let mut shutdown_rx = self.shutdown_rx.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_rx.changed().await.ok();
            })
            .await?;

        info!("spaced shutdown complete");
        Ok(())
    }

    /// Signal the server to shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
