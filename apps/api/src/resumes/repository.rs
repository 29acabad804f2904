use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::ResumeRow;

/// Loads a live resume and enforces ownership: 404 if missing or deleted, 403 if foreign.
pub async fn find_owned(pool: &PgPool, user_id: Uuid, resume_id: Uuid) -> Result<ResumeRow, AppError> {
    let resume = sqlx::query_as::<_, ResumeRow>(
        "SELECT * FROM resumes WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(resume_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Resume {resume_id} not found")))?;

    if resume.user_id != user_id {
        return Err(AppError::Forbidden);
    }
    Ok(resume)
}

/// Row-locking variant used inside a write transaction.
pub async fn find_owned_for_update(
    conn: &mut PgConnection,
    user_id: Uuid,
    resume_id: Uuid,
) -> Result<ResumeRow, AppError> {
    let resume = sqlx::query_as::<_, ResumeRow>(
        "SELECT * FROM resumes WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
    )
    .bind(resume_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Resume {resume_id} not found")))?;

    if resume.user_id != user_id {
        return Err(AppError::Forbidden);
    }
    Ok(resume)
}

pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<ResumeRow>, AppError> {
    Ok(sqlx::query_as::<_, ResumeRow>(
        "SELECT * FROM resumes WHERE user_id = $1 AND deleted_at IS NULL ORDER BY updated_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

pub async fn soft_delete(conn: &mut PgConnection, resume_id: Uuid) -> Result<(), AppError> {
    sqlx::query("UPDATE resumes SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL")
        .bind(resume_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn set_ats_score(pool: &PgPool, resume_id: Uuid, score: i32) -> Result<(), AppError> {
    sqlx::query("UPDATE resumes SET ats_score = $2 WHERE id = $1")
        .bind(resume_id)
        .bind(score)
        .execute(pool)
        .await?;
    Ok(())
}
