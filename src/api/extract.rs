//! Bearer-token authentication for HTTP handlers

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::Response,
};

use super::{error_response, AppState};
use crate::auth::bearer_token;
use crate::presence::{Identity, Role};

/// Caller identity resolved from `Authorization: Bearer <token>`
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub identity: Identity,
    pub token: String,
}

impl AuthUser {
    pub fn user_id(&self) -> &str {
        &self.identity.user_id
    }

    /// Reject callers without the admin role
    pub fn require_admin(&self) -> Result<(), Response> {
        if self.identity.role == Role::Admin {
            Ok(())
        } else {
            Err(error_response(StatusCode::FORBIDDEN, "admin role required"))
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "missing bearer token"))?;

        match state.accounts.validate_token(token).await {
            Ok(Some(account)) => Ok(AuthUser {
                identity: account.identity(),
                token: token.to_string(),
            }),
            Ok(None) => Err(error_response(StatusCode::UNAUTHORIZED, "invalid token")),
            Err(e) => Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
            )),
        }
    }
}
