//! Axum route handlers for the signed-in user's account, profile and settings.

use axum::{
    extract::{Query, State},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use validator::{Validate, ValidationError};

use crate::activity::{self, ActivityEntry};
use crate::auth::handlers::validate_password_strength;
use crate::auth::password::{hash_password_blocking, verify_password_blocking};
use crate::auth::session::clear_session_cookie;
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::activity::ActivityLogRow;
use crate::models::user::{ProfileRow, SettingsRow, UserRow};
use crate::render::ResumeTemplate;
use crate::resumes::content::validate_web_url;
use crate::state::AppState;
use crate::users::repository::{
    find_profile, find_settings, soft_delete_user, update_password, update_profile,
    update_settings, ProfileChanges, SettingsValues,
};

const DEFAULT_ACTIVITY_LIMIT: i64 = 20;
const THEMES: [&str; 3] = ["light", "dark", "system"];

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: UserRow,
    pub profile: ProfileRow,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMeRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,
    #[validate(custom(function = "validate_clearable_url"))]
    pub image_url: Option<String>,
    #[validate(length(max = 120))]
    pub headline: Option<String>,
    #[validate(length(max = 2000))]
    pub bio: Option<String>,
    #[validate(length(max = 100))]
    pub location: Option<String>,
    #[validate(custom(function = "validate_clearable_url"))]
    pub website: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(
        length(min = 8, max = 128, message = "Password must be 8-128 characters"),
        custom(function = "validate_password_strength")
    )]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSettingsRequest {
    #[validate(custom(function = "validate_theme"))]
    pub theme: String,
    pub default_template: String,
    pub auto_save: bool,
    #[validate(range(min = 5, max = 300, message = "Auto-save interval must be 5-300 seconds"))]
    pub auto_save_interval_secs: i32,
    pub email_notifications: bool,
    #[validate(length(min = 2, max = 10, message = "Locale must be 2-10 characters"))]
    pub locale: String,
}

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<i64>,
}

/// Empty clears the field; anything else must be an http(s) URL.
fn validate_clearable_url(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Ok(());
    }
    validate_web_url(value.trim())
}

fn validate_theme(value: &str) -> Result<(), ValidationError> {
    if THEMES.contains(&value) {
        Ok(())
    } else {
        let mut err = ValidationError::new("theme");
        err.message = Some("Theme must be light, dark or system".into());
        Err(err)
    }
}

/// GET /api/users/me
pub async fn handle_get_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<MeResponse>, AppError> {
    let profile = find_profile(&state.db, auth.user.id).await?;
    Ok(Json(MeResponse {
        user: auth.user,
        profile,
    }))
}

/// PATCH /api/users/me
pub async fn handle_update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<UpdateMeRequest>,
) -> Result<Json<MeResponse>, AppError> {
    req.validate()?;
    let name = req.name.as_deref().map(str::trim);
    if name.is_some_and(str::is_empty) {
        return Err(AppError::Validation("Name cannot be blank".to_string()));
    }

    let changes = ProfileChanges {
        name,
        image_url: req.image_url.as_deref().map(str::trim),
        headline: req.headline.as_deref().map(str::trim),
        bio: req.bio.as_deref().map(str::trim),
        location: req.location.as_deref().map(str::trim),
        website: req.website.as_deref().map(str::trim),
        phone: req.phone.as_deref().map(str::trim),
    };

    let mut tx = state.db.begin().await?;
    let (user, profile) = update_profile(&mut tx, auth.user.id, &changes).await?;
    activity::record(
        &mut *tx,
        ActivityEntry::new(user.id, "user.update", "user")
            .entity(user.id)
            .ip(auth.ip.as_deref()),
    )
    .await?;
    tx.commit().await?;

    Ok(Json(MeResponse { user, profile }))
}

/// PUT /api/users/me/password
pub async fn handle_change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    req.validate()?;
    let current_hash = auth.user.password_hash.clone().ok_or_else(|| {
        AppError::Validation("This account signs in with Google and has no password".to_string())
    })?;

    if !verify_password_blocking(req.current_password.clone(), current_hash).await? {
        return Err(AppError::Validation("Current password is incorrect".to_string()));
    }
    if req.current_password == req.new_password {
        return Err(AppError::Validation(
            "New password must differ from the current one".to_string(),
        ));
    }

    let new_hash = hash_password_blocking(req.new_password).await?;

    let mut tx = state.db.begin().await?;
    update_password(&mut tx, auth.user.id, &new_hash).await?;
    activity::record(
        &mut *tx,
        ActivityEntry::new(auth.user.id, "user.password_change", "user")
            .entity(auth.user.id)
            .ip(auth.ip.as_deref()),
    )
    .await?;
    tx.commit().await?;

    info!("Password changed for user {}", auth.user.id);
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/users/me
pub async fn handle_delete_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<(StatusCode, HeaderMap), AppError> {
    let mut tx = state.db.begin().await?;
    soft_delete_user(&mut tx, auth.user.id).await?;
    activity::record(
        &mut *tx,
        ActivityEntry::new(auth.user.id, "user.delete", "user")
            .entity(auth.user.id)
            .ip(auth.ip.as_deref()),
    )
    .await?;
    tx.commit().await?;

    info!("Soft-deleted user {}", auth.user.id);

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, clear_session_cookie(state.config.cookie_secure));
    Ok((StatusCode::NO_CONTENT, headers))
}

/// GET /api/users/me/settings
pub async fn handle_get_settings(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<SettingsRow>, AppError> {
    Ok(Json(find_settings(&state.db, auth.user.id).await?))
}

/// PUT /api/users/me/settings
pub async fn handle_update_settings(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<UpdateSettingsRequest>,
) -> Result<Json<SettingsRow>, AppError> {
    req.validate()?;
    let template: ResumeTemplate = req.default_template.parse()?;

    let settings = update_settings(
        &state.db,
        auth.user.id,
        &SettingsValues {
            theme: &req.theme,
            default_template: template.as_str(),
            auto_save: req.auto_save,
            auto_save_interval_secs: req.auto_save_interval_secs,
            email_notifications: req.email_notifications,
            locale: req.locale.trim(),
        },
    )
    .await?;
    activity::record(
        &state.db,
        ActivityEntry::new(auth.user.id, "settings.update", "settings")
            .metadata(json!({ "default_template": settings.default_template, "theme": settings.theme }))
            .ip(auth.ip.as_deref()),
    )
    .await?;

    Ok(Json(settings))
}

/// GET /api/users/me/activity
pub async fn handle_list_activity(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<Vec<ActivityLogRow>>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT);
    if !(1..=100).contains(&limit) {
        return Err(AppError::Validation("limit must be between 1 and 100".to_string()));
    }
    Ok(Json(activity::list_for_user(&state.db, auth.user.id, limit).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(theme: &str, interval: i32) -> UpdateSettingsRequest {
        UpdateSettingsRequest {
            theme: theme.to_string(),
            default_template: "classic".to_string(),
            auto_save: true,
            auto_save_interval_secs: interval,
            email_notifications: false,
            locale: "en".to_string(),
        }
    }

    #[test]
    fn test_settings_validation() {
        assert!(settings("dark", 30).validate().is_ok());
        assert!(settings("neon", 30).validate().is_err());
        assert!(settings("light", 2).validate().is_err());
        assert!(settings("light", 301).validate().is_err());
    }

    #[test]
    fn test_update_me_allows_clearing_urls() {
        let req: UpdateMeRequest =
            serde_json::from_value(json!({ "website": "", "image_url": "https://img.example.com/a.png" }))
                .unwrap();
        assert!(req.validate().is_ok());

        let req: UpdateMeRequest = serde_json::from_value(json!({ "website": "not a url" })).unwrap();
        assert!(req.validate().is_err());

        let req: UpdateMeRequest =
            serde_json::from_value(json!({ "website": "javascript:alert(1)" })).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_update_me_name_bounds() {
        let req: UpdateMeRequest = serde_json::from_value(json!({ "name": "" })).unwrap();
        assert!(req.validate().is_err());
        let req: UpdateMeRequest = serde_json::from_value(json!({ "bio": "x".repeat(2001) })).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_change_password_requires_strength() {
        let weak = ChangePasswordRequest {
            current_password: "oldpassword1".to_string(),
            new_password: "onlyletters".to_string(),
        };
        assert!(weak.validate().is_err());
    }
}
