//! Database initialization module
//!
//! One-time database setup for the spaced_init tool.

use std::path::Path;

use anyhow::{anyhow, bail, Result};
use tracing::info;

use crate::auth::accounts::AccountService;
use crate::db::Database;
use crate::presence::Role;

/// Minimum admin password length enforced at bootstrap
pub const MIN_ADMIN_PASSWORD_LEN: usize = 8;

/// Create a new database file with the schema and one admin account
///
/// # Errors
/// * Database file already exists
/// * Password too short
/// * Database creation fails
pub async fn init_database(path: &Path, admin_username: &str, admin_password: &str) -> Result<()> {
    if path.exists() {
        bail!(
            "Database file already exists: {}. Remove it first or use a different path.",
            path.display()
        );
    }

    if admin_password.len() < MIN_ADMIN_PASSWORD_LEN {
        bail!(
            "Admin password must be at least {} characters",
            MIN_ADMIN_PASSWORD_LEN
        );
    }

    let path_str = path
        .to_str()
        .ok_or_else(|| anyhow!("Database path is not valid UTF-8: {}", path.display()))?;

    info!("Creating new database at {}", path.display());
    let db = Database::new(Some(path_str)).await?;

    let service = AccountService::new(db.pool().clone());
    let account = service
        .create_account(admin_username, admin_password, Role::Admin)
        .await?;
    info!("Created admin account '{}' ({})", admin_username, account.id);

    info!("Database initialization complete");
    Ok(())
}
