use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::{ProfileRow, SettingsRow, UserRow};

pub const PROVIDER_CREDENTIALS: &str = "credentials";
pub const PROVIDER_GOOGLE: &str = "google";

pub struct NewUser<'a> {
    pub email: &'a str,
    pub name: &'a str,
    pub password_hash: Option<&'a str>,
    pub image_url: Option<&'a str>,
    pub provider: &'a str,
    pub provider_account_id: Option<&'a str>,
    pub email_verified: bool,
}

pub async fn find_active_by_id(pool: &PgPool, id: Uuid) -> Result<Option<UserRow>, AppError> {
    Ok(
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(pool)
            .await?,
    )
}

/// Looks up by email regardless of deletion so callers can tell "taken" from "free".
pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRow>, AppError> {
    Ok(
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE lower(email) = lower($1)")
            .bind(email)
            .fetch_optional(pool)
            .await?,
    )
}

/// Inserts the user with an empty profile and default settings.
pub async fn insert_user(conn: &mut PgConnection, new: NewUser<'_>) -> Result<UserRow, AppError> {
    let user = sqlx::query_as::<_, UserRow>(
        r#"
        INSERT INTO users
            (id, email, name, password_hash, image_url, provider, provider_account_id, email_verified_at)
        VALUES ($1, lower($2), $3, $4, $5, $6, $7, CASE WHEN $8 THEN now() ELSE NULL END)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new.email)
    .bind(new.name)
    .bind(new.password_hash)
    .bind(new.image_url)
    .bind(new.provider)
    .bind(new.provider_account_id)
    .bind(new.email_verified)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query("INSERT INTO profiles (user_id) VALUES ($1)")
        .bind(user.id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("INSERT INTO settings (user_id) VALUES ($1)")
        .bind(user.id)
        .execute(&mut *conn)
        .await?;

    Ok(user)
}

/// Records the Google account on an existing user and marks the email verified.
pub async fn link_google_account(
    conn: &mut PgConnection,
    user_id: Uuid,
    account_id: &str,
    image_url: Option<&str>,
) -> Result<UserRow, AppError> {
    Ok(sqlx::query_as::<_, UserRow>(
        r#"
        UPDATE users
        SET provider_account_id = COALESCE(provider_account_id, $2),
            image_url = COALESCE(image_url, $3),
            email_verified_at = COALESCE(email_verified_at, now()),
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(account_id)
    .bind(image_url)
    .fetch_one(&mut *conn)
    .await?)
}

pub async fn find_profile(pool: &PgPool, user_id: Uuid) -> Result<ProfileRow, AppError> {
    sqlx::query_as::<_, ProfileRow>("SELECT * FROM profiles WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))
}

pub async fn find_settings(pool: &PgPool, user_id: Uuid) -> Result<SettingsRow, AppError> {
    sqlx::query_as::<_, SettingsRow>("SELECT * FROM settings WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Settings not found".to_string()))
}

/// Partial profile update. `None` leaves a column untouched; an empty string clears it.
#[derive(Debug, Default)]
pub struct ProfileChanges<'a> {
    pub name: Option<&'a str>,
    pub image_url: Option<&'a str>,
    pub headline: Option<&'a str>,
    pub bio: Option<&'a str>,
    pub location: Option<&'a str>,
    pub website: Option<&'a str>,
    pub phone: Option<&'a str>,
}

pub async fn update_profile(
    conn: &mut PgConnection,
    user_id: Uuid,
    changes: &ProfileChanges<'_>,
) -> Result<(UserRow, ProfileRow), AppError> {
    let user = sqlx::query_as::<_, UserRow>(
        r#"
        UPDATE users
        SET name = COALESCE($2, name),
            image_url = CASE WHEN $3::text IS NULL THEN image_url ELSE NULLIF($3, '') END,
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(changes.name)
    .bind(changes.image_url)
    .fetch_one(&mut *conn)
    .await?;

    let profile = sqlx::query_as::<_, ProfileRow>(
        r#"
        UPDATE profiles
        SET headline = CASE WHEN $2::text IS NULL THEN headline ELSE NULLIF($2, '') END,
            bio      = CASE WHEN $3::text IS NULL THEN bio ELSE NULLIF($3, '') END,
            location = CASE WHEN $4::text IS NULL THEN location ELSE NULLIF($4, '') END,
            website  = CASE WHEN $5::text IS NULL THEN website ELSE NULLIF($5, '') END,
            phone    = CASE WHEN $6::text IS NULL THEN phone ELSE NULLIF($6, '') END,
            updated_at = now()
        WHERE user_id = $1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(changes.headline)
    .bind(changes.bio)
    .bind(changes.location)
    .bind(changes.website)
    .bind(changes.phone)
    .fetch_one(&mut *conn)
    .await?;

    Ok((user, profile))
}

/// Full replacement of the user's settings row.
pub struct SettingsValues<'a> {
    pub theme: &'a str,
    pub default_template: &'a str,
    pub auto_save: bool,
    pub auto_save_interval_secs: i32,
    pub email_notifications: bool,
    pub locale: &'a str,
}

pub async fn update_settings(
    pool: &PgPool,
    user_id: Uuid,
    values: &SettingsValues<'_>,
) -> Result<SettingsRow, AppError> {
    Ok(sqlx::query_as::<_, SettingsRow>(
        r#"
        UPDATE settings
        SET theme = $2, default_template = $3, auto_save = $4,
            auto_save_interval_secs = $5, email_notifications = $6, locale = $7,
            updated_at = now()
        WHERE user_id = $1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(values.theme)
    .bind(values.default_template)
    .bind(values.auto_save)
    .bind(values.auto_save_interval_secs)
    .bind(values.email_notifications)
    .bind(values.locale)
    .fetch_one(pool)
    .await?)
}

pub async fn update_password(
    conn: &mut PgConnection,
    user_id: Uuid,
    password_hash: &str,
) -> Result<(), AppError> {
    sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
        .bind(user_id)
        .bind(password_hash)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Soft-deletes the user and every resume they own.
pub async fn soft_delete_user(conn: &mut PgConnection, user_id: Uuid) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE resumes SET deleted_at = now() WHERE user_id = $1 AND deleted_at IS NULL",
    )
    .bind(user_id)
    .execute(&mut *conn)
    .await?;
    sqlx::query("UPDATE users SET deleted_at = now(), updated_at = now() WHERE id = $1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// True when the error is a Postgres unique-constraint violation.
pub fn is_unique_violation(err: &AppError) -> bool {
    match err {
        AppError::Database(e) => e
            .as_database_error()
            .and_then(|d| d.code())
            .map(|code| code == "23505")
            .unwrap_or(false),
        _ => false,
    }
}
