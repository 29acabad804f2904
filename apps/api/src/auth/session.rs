//! Session extraction and cookie helpers.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, HeaderValue},
};
use axum_extra::extract::CookieJar;
use chrono::Duration;
use tracing::debug;

use crate::activity::client_ip;
use crate::errors::AppError;
use crate::models::user::UserRow;
use crate::state::AppState;
use crate::users::repository::find_active_by_id;

pub const SESSION_COOKIE: &str = "session_token";
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";
const OAUTH_COOKIE_PATH: &str = "/api/auth/google";

/// The authenticated caller. Extracting it rejects with 401 when the session
/// is missing, invalid, expired, or belongs to a deleted account.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: UserRow,
    pub ip: Option<String>,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

        let claims = state.jwt.verify_session(&token).map_err(|e| {
            debug!("Rejected session token: {e}");
            AppError::Unauthorized("Invalid or expired session".to_string())
        })?;

        let user = find_active_by_id(&state.db, claims.sub)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Account not found".to_string()))?;

        Ok(AuthUser {
            user,
            ip: client_ip(&parts.headers),
        })
    }
}

/// Bearer header wins over the cookie.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

pub fn session_cookie(token: &str, ttl: Duration, secure: bool) -> Result<HeaderValue, AppError> {
    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        ttl.num_seconds().max(0)
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(|e| AppError::Internal(e.into()))
}

pub fn clear_session_cookie(secure: bool) -> HeaderValue {
    if secure {
        HeaderValue::from_static("session_token=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0; Secure")
    } else {
        HeaderValue::from_static("session_token=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
    }
}

/// Holds the OAuth state nonce between the consent redirect and the callback.
/// Scoped to the Google auth paths; `Lax` still sends it on the top-level
/// redirect back from the provider.
pub fn oauth_state_cookie(nonce: &str, ttl: Duration, secure: bool) -> Result<HeaderValue, AppError> {
    let mut cookie = format!(
        "{OAUTH_STATE_COOKIE}={nonce}; Path={OAUTH_COOKIE_PATH}; HttpOnly; SameSite=Lax; Max-Age={}",
        ttl.num_seconds().max(0)
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(|e| AppError::Internal(e.into()))
}

pub fn clear_oauth_state_cookie(secure: bool) -> HeaderValue {
    if secure {
        HeaderValue::from_static(
            "oauth_state=; Path=/api/auth/google; HttpOnly; SameSite=Lax; Max-Age=0; Secure",
        )
    } else {
        HeaderValue::from_static("oauth_state=; Path=/api/auth/google; HttpOnly; SameSite=Lax; Max-Age=0")
    }
}

pub fn oauth_state_nonce(headers: &HeaderMap) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(OAUTH_STATE_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}
