//! Axum route handlers for sign-up, sign-in and sessions.

use axum::{
    extract::{Query, State},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::Redirect,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use validator::{Validate, ValidationError};

use crate::activity::{self, client_ip, ActivityEntry};
use crate::auth::password::{hash_password_blocking, verify_password_blocking};
use crate::auth::session::{
    clear_oauth_state_cookie, clear_session_cookie, oauth_state_cookie, oauth_state_nonce,
    session_cookie, AuthUser,
};
use crate::errors::AppError;
use crate::models::user::UserRow;
use crate::state::AppState;
use crate::users::repository::{
    find_by_email, insert_user, is_unique_violation, link_google_account, NewUser,
    PROVIDER_CREDENTIALS, PROVIDER_GOOGLE,
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[validate(
        length(min = 8, max = 128, message = "Password must be 8-128 characters"),
        custom(function = "validate_password_strength")
    )]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserRow,
    pub token: String,
}

/// At least one letter and one digit.
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let has_letter = password.chars().any(|c| c.is_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if has_letter && has_digit {
        Ok(())
    } else {
        let mut err = ValidationError::new("password_strength");
        err.message = Some("Password must contain at least one letter and one digit".into());
        Err(err)
    }
}

fn issue_session(state: &AppState, user: &UserRow) -> Result<(String, HeaderMap), AppError> {
    let token = state
        .jwt
        .issue_session(user.id, &user.email)
        .map_err(|e| AppError::Internal(e.into()))?;
    let mut headers = HeaderMap::new();
    headers.insert(
        SET_COOKIE,
        session_cookie(&token, state.jwt.session_ttl(), state.config.cookie_secure)?,
    );
    Ok((token, headers))
}

/// POST /api/auth/register
pub async fn handle_register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, HeaderMap, Json<AuthResponse>), AppError> {
    req.validate()?;
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Name cannot be blank".to_string()));
    }

    if find_by_email(&state.db, &req.email).await?.is_some() {
        return Err(AppError::Conflict(
            "An account with this email already exists".to_string(),
        ));
    }

    let password_hash = hash_password_blocking(req.password).await?;
    let ip = client_ip(&headers);

    let mut tx = state.db.begin().await?;
    let user = insert_user(
        &mut tx,
        NewUser {
            email: &req.email,
            name,
            password_hash: Some(&password_hash),
            image_url: None,
            provider: PROVIDER_CREDENTIALS,
            provider_account_id: None,
            email_verified: false,
        },
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("An account with this email already exists".to_string())
        } else {
            e
        }
    })?;
    activity::record(
        &mut *tx,
        ActivityEntry::new(user.id, "user.register", "user")
            .entity(user.id)
            .ip(ip.as_deref()),
    )
    .await?;
    tx.commit().await?;

    info!("Registered user {}", user.id);

    let (token, cookie_headers) = issue_session(&state, &user)?;
    Ok((
        StatusCode::CREATED,
        cookie_headers,
        Json(AuthResponse { user, token }),
    ))
}

/// POST /api/auth/login
pub async fn handle_login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Result<(HeaderMap, Json<AuthResponse>), AppError> {
    req.validate()?;

    let user = find_by_email(&state.db, &req.email)
        .await?
        .filter(|u| !u.is_deleted())
        .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    let hash = user
        .password_hash
        .clone()
        .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    if !verify_password_blocking(req.password, hash).await? {
        warn!("Failed login for user {}", user.id);
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    let ip = client_ip(&headers);
    activity::record(
        &state.db,
        ActivityEntry::new(user.id, "user.login", "user")
            .entity(user.id)
            .metadata(json!({ "provider": PROVIDER_CREDENTIALS }))
            .ip(ip.as_deref()),
    )
    .await?;

    let (token, cookie_headers) = issue_session(&state, &user)?;
    Ok((cookie_headers, Json(AuthResponse { user, token })))
}

/// POST /api/auth/logout
pub async fn handle_logout(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<(StatusCode, HeaderMap), AppError> {
    activity::record(
        &state.db,
        ActivityEntry::new(auth.user.id, "user.logout", "user")
            .entity(auth.user.id)
            .ip(auth.ip.as_deref()),
    )
    .await?;

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, clear_session_cookie(state.config.cookie_secure));
    Ok((StatusCode::NO_CONTENT, headers))
}

/// GET /api/auth/session
pub async fn handle_session(auth: AuthUser) -> Json<UserRow> {
    Json(auth.user)
}

/// GET /api/auth/google
pub async fn handle_google_login(
    State(state): State<AppState>,
) -> Result<(HeaderMap, Redirect), AppError> {
    let google = state.google.as_ref().ok_or_else(|| {
        AppError::ServiceUnavailable("Google sign-in is not configured".to_string())
    })?;
    let (oauth_state, nonce) = state
        .jwt
        .issue_oauth_state()
        .map_err(|e| AppError::Internal(e.into()))?;

    let mut headers = HeaderMap::new();
    headers.insert(
        SET_COOKIE,
        oauth_state_cookie(
            &nonce.to_string(),
            state.jwt.oauth_state_ttl(),
            state.config.cookie_secure,
        )?,
    );
    Ok((headers, Redirect::to(&google.authorization_url(&oauth_state))))
}

/// GET /api/auth/google/callback
pub async fn handle_google_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<OAuthCallbackQuery>,
) -> Result<(HeaderMap, Redirect), AppError> {
    let google = state.google.as_ref().ok_or_else(|| {
        AppError::ServiceUnavailable("Google sign-in is not configured".to_string())
    })?;

    if let Some(error) = query.error {
        warn!("Google sign-in returned error: {error}");
        let target = format!(
            "{}/login?error={}",
            state.config.app_url,
            urlencoding::encode(&error)
        );
        let mut headers = HeaderMap::new();
        headers.insert(SET_COOKIE, clear_oauth_state_cookie(state.config.cookie_secure));
        return Ok((headers, Redirect::to(&target)));
    }

    let oauth_state = query
        .state
        .ok_or_else(|| AppError::Validation("Missing state parameter".to_string()))?;
    let browser_nonce = oauth_state_nonce(&headers).unwrap_or_default();
    if !state.jwt.verify_oauth_state(&oauth_state, &browser_nonce) {
        warn!("Rejected OAuth callback with a state not issued to this browser");
        return Err(AppError::Unauthorized("Invalid OAuth state".to_string()));
    }
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::Validation("Missing authorization code".to_string()))?;

    let profile = google.authenticate(&code).await?;
    if !profile.verified_email {
        return Err(AppError::Unauthorized(
            "Google account email is not verified".to_string(),
        ));
    }

    let existing = find_by_email(&state.db, &profile.email).await?;
    if existing.as_ref().is_some_and(|u| u.is_deleted()) {
        return Err(AppError::Unauthorized("Account has been deleted".to_string()));
    }

    let ip = client_ip(&headers);
    let mut tx = state.db.begin().await?;
    let (user, created) = match existing {
        Some(user) => (
            link_google_account(&mut tx, user.id, &profile.id, profile.picture.as_deref()).await?,
            false,
        ),
        None => {
            let name = profile.display_name();
            let user = insert_user(
                &mut tx,
                NewUser {
                    email: &profile.email,
                    name: &name,
                    password_hash: None,
                    image_url: profile.picture.as_deref(),
                    provider: PROVIDER_GOOGLE,
                    provider_account_id: Some(&profile.id),
                    email_verified: true,
                },
            )
            .await?;
            (user, true)
        }
    };
    if created {
        activity::record(
            &mut *tx,
            ActivityEntry::new(user.id, "user.register", "user")
                .entity(user.id)
                .metadata(json!({ "provider": PROVIDER_GOOGLE }))
                .ip(ip.as_deref()),
        )
        .await?;
    }
    activity::record(
        &mut *tx,
        ActivityEntry::new(user.id, "user.login", "user")
            .entity(user.id)
            .metadata(json!({ "provider": PROVIDER_GOOGLE }))
            .ip(ip.as_deref()),
    )
    .await?;
    tx.commit().await?;

    info!("Google sign-in for user {} (new: {created})", user.id);

    let (_, mut cookie_headers) = issue_session(&state, &user)?;
    cookie_headers.append(SET_COOKIE, clear_oauth_state_cookie(state.config.cookie_secure));
    let target = format!("{}/dashboard", state.config.app_url);
    Ok((cookie_headers, Redirect::to(&target)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_strength() {
        assert!(validate_password_strength("abcdefgh1").is_ok());
        assert!(validate_password_strength("abcdefgh").is_err());
        assert!(validate_password_strength("12345678").is_err());
    }

    #[test]
    fn test_register_request_validation() {
        let ok = RegisterRequest {
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            password: "analytical1".to_string(),
        };
        assert!(ok.validate().is_ok());

        let bad_email = RegisterRequest {
            email: "not-an-email".to_string(),
            ..ok_request()
        };
        assert!(bad_email.validate().is_err());

        let short = RegisterRequest {
            password: "a1".to_string(),
            ..ok_request()
        };
        let errors = short.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("password"));
    }

    fn ok_request() -> RegisterRequest {
        RegisterRequest {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password: "analytical1".to_string(),
        }
    }
}
