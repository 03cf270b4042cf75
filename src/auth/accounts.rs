//! Account management service
//!
//! Handles signup, login, token validation and logout.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};

use super::{
    generate_salt, generate_token, hash_password, is_valid_password, is_valid_username,
    verify_password,
};
use crate::presence::{Identity, IdentityVerifier, PresenceError, Role};

/// Account data
#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub role: Role,
    pub created_at: String,
}

impl Account {
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.id.clone(),
            role: self.role,
        }
    }
}

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("username already exists")]
    UsernameExists,

    #[error("invalid username")]
    InvalidUsername,

    #[error("password too short")]
    InvalidPassword,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

type AccountRow = (String, String, String, String);

/// An unrecognized stored role degrades to `User`, never to `Admin`.
fn account_from_row((id, username, role, created_at): AccountRow) -> Account {
    let role = match role.parse() {
        Ok(role) => role,
        Err(e) => {
            warn!("Account {} has corrupt role ({}), treating as user", id, e);
            Role::User
        }
    };
    Account {
        id,
        username,
        role,
        created_at,
    }
}

/// Account service for authentication operations
#[derive(Clone)]
pub struct AccountService {
    pool: SqlitePool,
}

impl AccountService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new account. The account has no token until it logs in.
    pub async fn create_account(
        &self,
        username: &str,
        password: &str,
        role: Role,
    ) -> Result<Account, AuthError> {
        if !is_valid_username(username) {
            return Err(AuthError::InvalidUsername);
        }
        if !is_valid_password(password) {
            return Err(AuthError::InvalidPassword);
        }

        let existing: Option<(String,)> =
            sqlx::query_as("SELECT id FROM accounts WHERE username = ?")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;

        if existing.is_some() {
            return Err(AuthError::UsernameExists);
        }

        let id = uuid::Uuid::new_v4().to_string();
        let salt = generate_salt();
        let password_hash = hash_password(password, &salt);
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO accounts (id, username, password_hash, salt, role, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(username)
        .bind(&password_hash)
        .bind(&salt)
        .bind(role.as_str())
        .bind(&now)
        .execute(&self.pool)
        .await;

        // lost a race with a concurrent signup for the same name
        if let Err(sqlx::Error::Database(db_err)) = &result {
            if db_err.is_unique_violation() {
                return Err(AuthError::UsernameExists);
            }
        }
        result?;

        info!("Created {} account '{}' ({})", role.as_str(), username, id);

        Ok(Account {
            id,
            username: username.to_string(),
            role,
            created_at: now,
        })
    }

    /// Login with username and password. Issues a fresh token, replacing any
    /// previous one.
    pub async fn login(&self, username: &str, password: &str) -> Result<(Account, String), AuthError> {
        let row: Option<(String, String, String, String, String)> = sqlx::query_as(
            "SELECT id, password_hash, salt, role, created_at FROM accounts WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        let (id, stored_hash, salt, role, created_at) = row.ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &salt, &stored_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        let token = generate_token();

        sqlx::query("UPDATE accounts SET token = ? WHERE id = ?")
            .bind(&token)
            .bind(&id)
            .execute(&self.pool)
            .await?;

        let account = account_from_row((id, username.to_string(), role, created_at));
        Ok((account, token))
    }

    /// Validate a token and return the associated account
    pub async fn validate_token(&self, token: &str) -> Result<Option<Account>, AuthError> {
        let row: Option<AccountRow> = sqlx::query_as(
            "SELECT id, username, role, created_at FROM accounts WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(account_from_row))
    }

    /// Logout by clearing the token
    pub async fn logout(&self, token: &str) -> Result<bool, AuthError> {
        let result = sqlx::query("UPDATE accounts SET token = NULL WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_account(&self, id: &str) -> Result<Option<Account>, AuthError> {
        let row: Option<AccountRow> = sqlx::query_as(
            "SELECT id, username, role, created_at FROM accounts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(account_from_row))
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<Account>, AuthError> {
        let row: Option<AccountRow> = sqlx::query_as(
            "SELECT id, username, role, created_at FROM accounts WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(account_from_row))
    }
}

#[async_trait]
impl IdentityVerifier for AccountService {
    async fn verify_token(&self, token: &str) -> Result<Option<Identity>, PresenceError> {
        if token.is_empty() {
            return Ok(None);
        }
        self.validate_token(token)
            .await
            .map(|account| account.map(|a| a.identity()))
            .map_err(|e| PresenceError::Backend(e.to_string()))
    }
}
