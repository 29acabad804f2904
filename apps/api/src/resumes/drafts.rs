//! Auto-saved drafts in Redis. Drafts expire after a TTL and are discarded
//! when their schema version no longer matches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::resumes::content::ResumeContent;

/// Bump when `ResumeContent` changes shape incompatibly.
pub const DRAFT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDraft {
    pub schema_version: u32,
    pub saved_at: DateTime<Utc>,
    pub content: ResumeContent,
}

pub fn draft_key(user_id: Uuid, resume_id: Uuid) -> String {
    format!("draft:{user_id}:{resume_id}")
}

/// `None` for malformed payloads and stale schema versions.
pub fn decode_draft(raw: &str) -> Option<StoredDraft> {
    match serde_json::from_str::<StoredDraft>(raw) {
        Ok(draft) if draft.schema_version == DRAFT_SCHEMA_VERSION => Some(draft),
        Ok(draft) => {
            debug!(
                "Discarding draft with schema version {} (current {DRAFT_SCHEMA_VERSION})",
                draft.schema_version
            );
            None
        }
        Err(e) => {
            warn!("Discarding malformed draft: {e}");
            None
        }
    }
}

pub async fn save_draft(
    redis: &redis::Client,
    key: &str,
    content: ResumeContent,
    ttl_secs: u64,
) -> Result<StoredDraft, AppError> {
    let draft = StoredDraft {
        schema_version: DRAFT_SCHEMA_VERSION,
        saved_at: Utc::now(),
        content,
    };
    let payload = serde_json::to_string(&draft).map_err(|e| AppError::Internal(e.into()))?;

    let mut con = redis.get_multiplexed_async_connection().await?;
    redis::cmd("SET")
        .arg(key)
        .arg(payload)
        .arg("EX")
        .arg(ttl_secs.max(1))
        .query_async::<_, ()>(&mut con)
        .await?;
    Ok(draft)
}

pub async fn load_draft(redis: &redis::Client, key: &str) -> Result<Option<StoredDraft>, AppError> {
    let mut con = redis.get_multiplexed_async_connection().await?;
    let raw: Option<String> = redis::cmd("GET").arg(key).query_async(&mut con).await?;

    let Some(raw) = raw else {
        return Ok(None);
    };
    match decode_draft(&raw) {
        Some(draft) => Ok(Some(draft)),
        None => {
            redis::cmd("DEL")
                .arg(key)
                .query_async::<_, i64>(&mut con)
                .await?;
            Ok(None)
        }
    }
}

/// Returns whether a draft existed.
pub async fn discard_draft(redis: &redis::Client, key: &str) -> Result<bool, AppError> {
    let mut con = redis.get_multiplexed_async_connection().await?;
    let removed: i64 = redis::cmd("DEL").arg(key).query_async(&mut con).await?;
    Ok(removed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resumes::content::sample_content;

    #[test]
    fn test_draft_key_scopes_by_user_and_resume() {
        let user = Uuid::new_v4();
        let resume = Uuid::new_v4();
        assert_eq!(draft_key(user, resume), format!("draft:{user}:{resume}"));
    }

    #[test]
    fn test_decode_current_version() {
        let draft = StoredDraft {
            schema_version: DRAFT_SCHEMA_VERSION,
            saved_at: Utc::now(),
            content: sample_content(),
        };
        let raw = serde_json::to_string(&draft).unwrap();
        let decoded = decode_draft(&raw).unwrap();
        assert_eq!(decoded.content, draft.content);
    }

    #[test]
    fn test_decode_rejects_stale_version() {
        let raw = serde_json::json!({
            "schema_version": DRAFT_SCHEMA_VERSION + 1,
            "saved_at": Utc::now(),
            "content": {}
        })
        .to_string();
        assert!(decode_draft(&raw).is_none());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_draft("{not json").is_none());
    }
}
