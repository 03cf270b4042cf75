//! Authentication API endpoints

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::{error_response, AppState, AuthUser};
use crate::auth::accounts::AuthError;
use crate::presence::Role;

/// Build auth router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/signin", post(login))
        .route("/logout", post(logout))
}

/// Signup request. Fields are optional so missing ones get a 400 instead of
/// a body rejection.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(rename = "type")]
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    pub user_id: String,
}

async fn signup(State(state): State<AppState>, Json(req): Json<SignupRequest>) -> Response {
    let (Some(username), Some(password)) = (req.username, req.password) else {
        return error_response(StatusCode::BAD_REQUEST, "username and password are required");
    };
    let role = match req.role.as_deref() {
        None => Role::User,
        Some(role) => match role.parse::<Role>() {
            Ok(role) => role,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
        },
    };

    match state
        .accounts
        .create_account(&username, &password, role)
        .await
    {
        Ok(account) => (
            StatusCode::OK,
            Json(SignupResponse {
                user_id: account.id,
            }),
        )
            .into_response(),
        Err(e @ AuthError::Database(_)) => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user_id: String,
    pub role: Role,
}

async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> Response {
    let (Some(username), Some(password)) = (req.username, req.password) else {
        return error_response(StatusCode::BAD_REQUEST, "username and password are required");
    };

    match state.accounts.login(&username, &password).await {
        Ok((account, token)) => (
            StatusCode::OK,
            Json(LoginResponse {
                token,
                user_id: account.id,
                role: account.role,
            }),
        )
            .into_response(),
        Err(AuthError::InvalidCredentials) => {
            error_response(StatusCode::BAD_REQUEST, "invalid credentials")
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
}

async fn logout(State(state): State<AppState>, user: AuthUser) -> Response {
    match state.accounts.logout(&user.token).await {
        Ok(success) => (StatusCode::OK, Json(LogoutResponse { success })).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
