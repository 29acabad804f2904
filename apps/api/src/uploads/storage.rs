//! S3 object storage and the `files` table.

use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use aws_sdk_s3::Client as S3Client;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::file::FileRow;

pub fn object_key(user_id: Uuid, file_id: Uuid, extension: &str) -> String {
    format!("uploads/{user_id}/{file_id}.{extension}")
}

pub async fn put_object(
    s3: &S3Client,
    bucket: &str,
    key: &str,
    bytes: Bytes,
    content_type: &str,
) -> Result<(), AppError> {
    s3.put_object()
        .bucket(bucket)
        .key(key)
        .body(ByteStream::from(bytes))
        .content_type(content_type)
        .send()
        .await
        .map_err(|e| AppError::S3(format!("Upload of {key} failed: {e}")))?;

    info!("Uploaded s3://{bucket}/{key}");
    Ok(())
}

pub async fn delete_object(s3: &S3Client, bucket: &str, key: &str) -> Result<(), AppError> {
    s3.delete_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .map_err(|e| AppError::S3(format!("Delete of {key} failed: {e}")))?;

    info!("Deleted s3://{bucket}/{key}");
    Ok(())
}

pub struct NewFile<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub s3_key: &'a str,
    pub url: &'a str,
    pub original_name: &'a str,
    pub mime_type: &'a str,
    pub size_bytes: i64,
    pub width: i32,
    pub height: i32,
}

pub async fn insert_file(pool: &PgPool, file: NewFile<'_>) -> Result<FileRow, AppError> {
    Ok(sqlx::query_as::<_, FileRow>(
        r#"
        INSERT INTO files (id, user_id, s3_key, url, original_name, mime_type, size_bytes, width, height)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(file.id)
    .bind(file.user_id)
    .bind(file.s3_key)
    .bind(file.url)
    .bind(file.original_name)
    .bind(file.mime_type)
    .bind(file.size_bytes)
    .bind(file.width)
    .bind(file.height)
    .fetch_one(pool)
    .await?)
}

pub async fn list_files(pool: &PgPool, user_id: Uuid) -> Result<Vec<FileRow>, AppError> {
    Ok(sqlx::query_as::<_, FileRow>(
        "SELECT * FROM files WHERE user_id = $1 AND deleted_at IS NULL ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

/// 404 if missing or deleted, 403 if it belongs to someone else.
pub async fn find_owned_file(pool: &PgPool, user_id: Uuid, file_id: Uuid) -> Result<FileRow, AppError> {
    let file = sqlx::query_as::<_, FileRow>(
        "SELECT * FROM files WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(file_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("File {file_id} not found")))?;

    if file.user_id != user_id {
        return Err(AppError::Forbidden);
    }
    Ok(file)
}

pub async fn soft_delete_file(pool: &PgPool, file_id: Uuid) -> Result<(), AppError> {
    sqlx::query("UPDATE files SET deleted_at = now() WHERE id = $1")
        .bind(file_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Object first, then the row: a storage failure leaves the file listed.
pub async fn remove_file(
    s3: &S3Client,
    pool: &PgPool,
    bucket: &str,
    file: &FileRow,
) -> Result<(), AppError> {
    delete_object(s3, bucket, &file.s3_key).await?;
    soft_delete_file(pool, file.id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
    use aws_sdk_s3::config::retry::RetryConfig;
    use chrono::Utc;
    use sqlx::postgres::PgPoolOptions;

    #[test]
    fn test_object_key_layout() {
        let user = Uuid::nil();
        let file = Uuid::from_u128(1);
        assert_eq!(
            object_key(user, file, "jpg"),
            format!("uploads/{user}/{file}.jpg")
        );
    }

    #[tokio::test]
    async fn test_remove_file_keeps_row_when_storage_fails() {
        let s3 = S3Client::from_conf(
            aws_sdk_s3::Config::builder()
                .behavior_version(BehaviorVersion::latest())
                .region(Region::new("us-east-1"))
                .credentials_provider(Credentials::new("test", "test", None, None, "test"))
                .endpoint_url("http://127.0.0.1:1")
                .force_path_style(true)
                .retry_config(RetryConfig::disabled())
                .build(),
        );
        // Any query against this pool would fail with a database error.
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://127.0.0.1:1/unused")
            .unwrap();
        let file = FileRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            s3_key: "uploads/a/b.jpg".to_string(),
            url: "http://localhost:9000/resumes/uploads/a/b.jpg".to_string(),
            original_name: "b.jpg".to_string(),
            mime_type: "image/jpeg".to_string(),
            size_bytes: 10,
            width: 1,
            height: 1,
            created_at: Utc::now(),
            deleted_at: None,
        };

        let err = remove_file(&s3, &pool, "resumes", &file).await.unwrap_err();
        assert!(matches!(err, AppError::S3(_)));
    }
}
