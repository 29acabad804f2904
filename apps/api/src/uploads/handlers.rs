//! Axum route handlers for image uploads.

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::activity::{self, ActivityEntry};
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::file::FileRow;
use crate::state::AppState;
use crate::uploads::processing::{process_image, validate_upload};
use crate::uploads::storage::{
    delete_object, find_owned_file, insert_file, list_files, object_key, put_object, remove_file,
    NewFile,
};

const FILE_FIELD: &str = "file";

struct UploadedPart {
    file_name: String,
    content_type: Option<String>,
    bytes: Bytes,
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Upload exceeds the size limit".to_string())
    } else {
        AppError::Validation(format!("Malformed multipart body: {}", e.body_text()))
    }
}

async fn read_file_field(multipart: &mut Multipart) -> Result<UploadedPart, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field
            .file_name()
            .map(|n| n.chars().take(255).collect())
            .unwrap_or_else(|| "upload".to_string());
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;
        return Ok(UploadedPart {
            file_name,
            content_type,
            bytes,
        });
    }
    Err(AppError::Validation(format!(
        "Multipart field '{FILE_FIELD}' is required"
    )))
}

/// POST /api/uploads
pub async fn handle_upload(
    State(state): State<AppState>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<FileRow>), AppError> {
    let part = read_file_field(&mut multipart).await?;
    validate_upload(
        part.content_type.as_deref(),
        &part.bytes,
        state.config.max_upload_bytes,
    )?;

    let bytes = part.bytes;
    let processed = tokio::task::spawn_blocking(move || process_image(&bytes))
        .await
        .map_err(|e| AppError::Internal(e.into()))??;

    let file_id = Uuid::new_v4();
    let key = object_key(auth.user.id, file_id, processed.extension);
    let url = state.config.public_url(&key);
    let size_bytes = processed.bytes.len() as i64;
    let (width, height) = (processed.width as i32, processed.height as i32);
    let mime_type = processed.mime_type;

    put_object(&state.s3, &state.config.s3_bucket, &key, processed.bytes, mime_type).await?;

    let file = match insert_file(
        &state.db,
        NewFile {
            id: file_id,
            user_id: auth.user.id,
            s3_key: &key,
            url: &url,
            original_name: &part.file_name,
            mime_type,
            size_bytes,
            width,
            height,
        },
    )
    .await
    {
        Ok(file) => file,
        Err(e) => {
            // Do not leave an orphaned object behind.
            if let Err(cleanup) = delete_object(&state.s3, &state.config.s3_bucket, &key).await {
                warn!("Failed to remove orphaned upload {key}: {cleanup}");
            }
            return Err(e);
        }
    };

    activity::record(
        &state.db,
        ActivityEntry::new(auth.user.id, "file.upload", "file")
            .entity(file.id)
            .metadata(json!({ "mime_type": file.mime_type, "size_bytes": file.size_bytes }))
            .ip(auth.ip.as_deref()),
    )
    .await?;

    info!(
        "Stored upload {} ({}x{}, {} bytes) for user {}",
        file.id, file.width, file.height, file.size_bytes, auth.user.id
    );
    Ok((StatusCode::CREATED, Json(file)))
}

/// GET /api/uploads
pub async fn handle_list_uploads(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<FileRow>>, AppError> {
    Ok(Json(list_files(&state.db, auth.user.id).await?))
}

/// DELETE /api/uploads/:id
pub async fn handle_delete_upload(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let file = find_owned_file(&state.db, auth.user.id, id).await?;
    remove_file(&state.s3, &state.db, &state.config.s3_bucket, &file).await?;

    activity::record(
        &state.db,
        ActivityEntry::new(auth.user.id, "file.delete", "file")
            .entity(file.id)
            .ip(auth.ip.as_deref()),
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
