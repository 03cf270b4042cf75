//! spaced_init - One-time database initialization tool
//!
//! Creates a fresh database with an admin account.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// spaced database initialization tool
#[derive(Parser, Debug)]
#[command(
    name = "spaced_init",
    version,
    about = "Initialize a new spaced database"
)]
struct Args {
    /// Path to SQLite database file to create (must not exist)
    #[arg(short, long)]
    database: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spaced=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let admin_username = std::env::var("SPACED_ADMIN_USERNAME")
        .map_err(|_| anyhow::anyhow!("SPACED_ADMIN_USERNAME environment variable is required"))?;

    let admin_password = std::env::var("SPACED_ADMIN_PASSWORD")
        .map_err(|_| anyhow::anyhow!("SPACED_ADMIN_PASSWORD environment variable is required"))?;

    spaced::init::init_database(&args.database, &admin_username, &admin_password).await?;

    Ok(())
}
