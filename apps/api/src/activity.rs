//! Append-only audit trail of user mutations.

use axum::http::HeaderMap;
use serde_json::Value;
use sqlx::{PgExecutor, PgPool};
use tracing::debug;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::activity::ActivityLogRow;

/// Everything a handler knows about one mutation.
pub struct ActivityEntry<'a> {
    pub user_id: Uuid,
    pub action: &'a str,
    pub entity_type: &'a str,
    pub entity_id: Option<Uuid>,
    pub metadata: Value,
    pub ip_address: Option<&'a str>,
}

impl<'a> ActivityEntry<'a> {
    pub fn new(user_id: Uuid, action: &'a str, entity_type: &'a str) -> Self {
        Self {
            user_id,
            action,
            entity_type,
            entity_id: None,
            metadata: Value::Object(Default::default()),
            ip_address: None,
        }
    }

    pub fn entity(mut self, id: Uuid) -> Self {
        self.entity_id = Some(id);
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn ip(mut self, ip: Option<&'a str>) -> Self {
        self.ip_address = ip;
        self
    }
}

/// Inserts one activity row. Pass a transaction to keep the log atomic with the mutation.
pub async fn record<'e, E>(executor: E, entry: ActivityEntry<'_>) -> Result<(), AppError>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO activity_logs (id, user_id, action, entity_type, entity_id, metadata, ip_address)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(entry.user_id)
    .bind(entry.action)
    .bind(entry.entity_type)
    .bind(entry.entity_id)
    .bind(&entry.metadata)
    .bind(entry.ip_address)
    .execute(executor)
    .await?;

    debug!(
        "Activity {} on {} by user {}",
        entry.action, entry.entity_type, entry.user_id
    );
    Ok(())
}

/// Newest-first activity for a user.
pub async fn list_for_user(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
) -> Result<Vec<ActivityLogRow>, AppError> {
    Ok(sqlx::query_as::<_, ActivityLogRow>(
        "SELECT * FROM activity_logs WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?)
}

/// Best-effort client address: first `X-Forwarded-For` hop, then `X-Real-IP`.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return Some(first.to_string());
        }
    }
    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_prefers_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn test_client_ip_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.4"));
        assert_eq!(client_ip(&headers).as_deref(), Some("198.51.100.4"));
    }

    #[test]
    fn test_client_ip_absent() {
        assert_eq!(client_ip(&HeaderMap::new()), None);
    }

    #[test]
    fn test_entry_builder() {
        let user_id = Uuid::new_v4();
        let resume_id = Uuid::new_v4();
        let entry = ActivityEntry::new(user_id, "resume.create", "resume")
            .entity(resume_id)
            .metadata(serde_json::json!({"title": "Backend"}));
        assert_eq!(entry.entity_id, Some(resume_id));
        assert_eq!(entry.metadata["title"], "Backend");
        assert!(entry.ip_address.is_none());
    }
}
