//! Append-only resume history. Every content change bumps `resumes.version`
//! and writes the matching `resume_versions` row in the same transaction.

use serde::Serialize;
use serde_json::Value;
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::{ResumeRow, ResumeVersionRow};

pub struct NewResume<'a> {
    pub user_id: Uuid,
    pub title: &'a str,
    pub template: &'a str,
    pub content: &'a Value,
}

/// The next state of an existing resume.
pub struct ResumeChange<'a> {
    pub title: &'a str,
    pub template: &'a str,
    pub content: &'a Value,
    pub change_note: Option<&'a str>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct VersionSummary {
    pub version: i32,
    pub title: String,
    pub template: String,
    pub change_note: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

async fn insert_snapshot(
    conn: &mut PgConnection,
    resume: &ResumeRow,
    change_note: Option<&str>,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO resume_versions (id, resume_id, version, title, template, content, change_note)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(resume.id)
    .bind(resume.version)
    .bind(&resume.title)
    .bind(&resume.template)
    .bind(&resume.content)
    .bind(change_note)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Inserts a resume at version 1 together with its first snapshot.
pub async fn create_resume(
    conn: &mut PgConnection,
    new: NewResume<'_>,
    change_note: Option<&str>,
) -> Result<ResumeRow, AppError> {
    let resume = sqlx::query_as::<_, ResumeRow>(
        r#"
        INSERT INTO resumes (id, user_id, title, template, content, version)
        VALUES ($1, $2, $3, $4, $5, 1)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new.user_id)
    .bind(new.title)
    .bind(new.template)
    .bind(new.content)
    .fetch_one(&mut *conn)
    .await?;

    insert_snapshot(conn, &resume, change_note).await?;
    info!("Created resume {} for user {}", resume.id, new.user_id);
    Ok(resume)
}

/// Applies `change` as version `current.version + 1`. The caller must hold the row lock.
pub async fn commit_change(
    conn: &mut PgConnection,
    current: &ResumeRow,
    change: ResumeChange<'_>,
) -> Result<ResumeRow, AppError> {
    let resume = sqlx::query_as::<_, ResumeRow>(
        r#"
        UPDATE resumes
        SET title = $2, template = $3, content = $4, version = version + 1, updated_at = now()
        WHERE id = $1 AND version = $5
        RETURNING *
        "#,
    )
    .bind(current.id)
    .bind(change.title)
    .bind(change.template)
    .bind(change.content)
    .bind(current.version)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::Conflict("Resume was modified concurrently".to_string()))?;

    insert_snapshot(conn, &resume, change.change_note).await?;
    info!("Resume {} advanced to version {}", resume.id, resume.version);
    Ok(resume)
}

pub async fn list_versions(pool: &PgPool, resume_id: Uuid) -> Result<Vec<VersionSummary>, AppError> {
    Ok(sqlx::query_as::<_, VersionSummary>(
        r#"
        SELECT version, title, template, change_note, created_at
        FROM resume_versions
        WHERE resume_id = $1
        ORDER BY version DESC
        "#,
    )
    .bind(resume_id)
    .fetch_all(pool)
    .await?)
}

pub async fn get_version(
    pool: &PgPool,
    resume_id: Uuid,
    version: i32,
) -> Result<ResumeVersionRow, AppError> {
    sqlx::query_as::<_, ResumeVersionRow>(
        "SELECT * FROM resume_versions WHERE resume_id = $1 AND version = $2",
    )
    .bind(resume_id)
    .bind(version)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Version {version} of resume {resume_id} not found")))
}

/// Change note recorded when a snapshot is restored.
pub fn restore_note(version: i32) -> String {
    format!("Restored from version {version}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restore_note() {
        assert_eq!(restore_note(3), "Restored from version 3");
    }
}
