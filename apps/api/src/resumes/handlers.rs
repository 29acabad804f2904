//! Axum route handlers for resume CRUD, history, drafts, preview and export.

use axum::{
    extract::{Path, Query, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::Html,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::activity::{self, ActivityEntry};
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::resume::{ResumeRow, ResumeVersionRow};
use crate::render::export::{export_filename, to_markdown, to_plain_text, ExportFormat};
use crate::render::{render_html, ResumeTemplate, ResumeView, TemplateInfo};
use crate::resumes::completeness::{compute_completeness_report, CompletenessReport};
use crate::resumes::content::ResumeContent;
use crate::resumes::drafts::{self, draft_key, StoredDraft};
use crate::resumes::repository::{find_owned, find_owned_for_update, list_for_user, soft_delete};
use crate::resumes::search::{SearchDocument, SearchIndex};
use crate::resumes::versioning::{
    commit_change, create_resume, get_version, list_versions, restore_note, NewResume,
    ResumeChange, VersionSummary,
};
use crate::state::AppState;
use crate::users::repository::find_settings;

const DEFAULT_PER_PAGE: u32 = 20;
const MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ResumeSummary {
    pub id: Uuid,
    pub title: String,
    pub template: String,
    pub version: i32,
    pub ats_score: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&ResumeRow> for ResumeSummary {
    fn from(row: &ResumeRow) -> Self {
        ResumeSummary {
            id: row.id,
            title: row.title.clone(),
            template: row.template.clone(),
            version: row.version,
            ats_score: row.ats_score,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResumeListResponse {
    pub items: Vec<ResumeSummary>,
    pub total: usize,
    pub page: u32,
    pub per_page: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateResumeRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    pub template: Option<String>,
    pub content: Option<ResumeContent>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateResumeRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,
    pub template: Option<String>,
    pub content: Option<ResumeContent>,
    #[validate(length(max = 500))]
    pub change_note: Option<String>,
    /// When set, the update is rejected with 409 unless it matches the stored version.
    pub expected_version: Option<i32>,
}

impl UpdateResumeRequest {
    fn is_empty(&self) -> bool {
        self.title.is_none() && self.template.is_none() && self.content.is_none()
    }
}

#[derive(Debug, Deserialize)]
pub struct SaveDraftRequest {
    pub content: ResumeContent,
}

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    pub template: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

/// Trims the title and rejects blank ones.
fn clean_title(title: &str) -> Result<String, AppError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Title cannot be blank".to_string()));
    }
    Ok(title.to_string())
}

/// Normalizes and validates content before any I/O.
fn prepare_content(mut content: ResumeContent) -> Result<ResumeContent, AppError> {
    content.normalize();
    content.check()?;
    Ok(content)
}

/// Stored template names are trusted; anything unexpected falls back to the default look.
fn stored_template(name: &str) -> ResumeTemplate {
    name.parse().unwrap_or_else(|_| {
        warn!("Unknown stored template '{name}', rendering with modern");
        ResumeTemplate::Modern
    })
}

/// Orders resumes by search relevance when `q` is present, otherwise by recency.
fn filter_resumes(rows: Vec<ResumeRow>, query: Option<&str>) -> Vec<ResumeRow> {
    let Some(query) = query.map(str::trim).filter(|q| !q.is_empty()) else {
        return rows;
    };

    let bodies: Vec<String> = rows
        .iter()
        .map(|row| {
            ResumeContent::from_value(row.content.clone())
                .map(|c| c.searchable_text())
                .unwrap_or_default()
        })
        .collect();
    let index = SearchIndex::build(rows.iter().zip(&bodies).map(|(row, body)| SearchDocument {
        id: row.id,
        title: &row.title,
        body,
        updated_at: row.updated_at,
    }));

    let ranked = index.search(query);
    let mut rows = rows;
    ranked
        .into_iter()
        .filter_map(|id| {
            rows.iter()
                .position(|r| r.id == id)
                .map(|pos| rows.swap_remove(pos))
        })
        .collect()
}

fn paginate<T>(items: Vec<T>, page: u32, per_page: u32) -> Vec<T> {
    let skip = (page.saturating_sub(1) as usize).saturating_mul(per_page as usize);
    items.into_iter().skip(skip).take(per_page as usize).collect()
}

/// GET /api/resumes
pub async fn handle_list_resumes(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<ResumeListResponse>, AppError> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);

    let rows = list_for_user(&state.db, auth.user.id).await?;
    let rows = filter_resumes(rows, query.q.as_deref());
    let total = rows.len();
    let items = paginate(rows, page, per_page)
        .iter()
        .map(ResumeSummary::from)
        .collect();

    Ok(Json(ResumeListResponse {
        items,
        total,
        page,
        per_page,
    }))
}

/// POST /api/resumes
pub async fn handle_create_resume(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateResumeRequest>,
) -> Result<(StatusCode, Json<ResumeRow>), AppError> {
    req.validate()?;
    let title = clean_title(&req.title)?;
    let requested_template = req
        .template
        .as_deref()
        .map(str::parse::<ResumeTemplate>)
        .transpose()?;
    let content = prepare_content(req.content.unwrap_or_default())?;
    let content = content.to_value()?;

    let template = match requested_template {
        Some(t) => t,
        None => stored_template(&find_settings(&state.db, auth.user.id).await?.default_template),
    };

    let mut tx = state.db.begin().await?;
    let resume = create_resume(
        &mut tx,
        NewResume {
            user_id: auth.user.id,
            title: &title,
            template: template.as_str(),
            content: &content,
        },
        Some("Created"),
    )
    .await?;
    activity::record(
        &mut *tx,
        ActivityEntry::new(auth.user.id, "resume.create", "resume")
            .entity(resume.id)
            .metadata(json!({ "title": resume.title, "template": resume.template }))
            .ip(auth.ip.as_deref()),
    )
    .await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(resume)))
}

/// GET /api/resumes/:id
pub async fn handle_get_resume(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ResumeRow>, AppError> {
    Ok(Json(find_owned(&state.db, auth.user.id, id).await?))
}

/// PUT /api/resumes/:id
pub async fn handle_update_resume(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateResumeRequest>,
) -> Result<Json<ResumeRow>, AppError> {
    if req.is_empty() {
        return Err(AppError::Validation(
            "Provide at least one of title, template or content".to_string(),
        ));
    }
    req.validate()?;
    let title = req.title.as_deref().map(clean_title).transpose()?;
    let template = req
        .template
        .as_deref()
        .map(str::parse::<ResumeTemplate>)
        .transpose()?;
    let content = req
        .content
        .map(prepare_content)
        .transpose()?
        .map(|c| c.to_value())
        .transpose()?;

    let mut tx = state.db.begin().await?;
    let current = find_owned_for_update(&mut tx, auth.user.id, id).await?;
    if let Some(expected) = req.expected_version {
        if expected != current.version {
            return Err(AppError::Conflict(format!(
                "Resume is at version {}, not {expected}",
                current.version
            )));
        }
    }

    let resume = commit_change(
        &mut tx,
        &current,
        ResumeChange {
            title: title.as_deref().unwrap_or(current.title.as_str()),
            template: template.map_or(current.template.as_str(), |t| t.as_str()),
            content: content.as_ref().unwrap_or(&current.content),
            change_note: req.change_note.as_deref(),
        },
    )
    .await?;
    activity::record(
        &mut *tx,
        ActivityEntry::new(auth.user.id, "resume.update", "resume")
            .entity(resume.id)
            .metadata(json!({ "version": resume.version }))
            .ip(auth.ip.as_deref()),
    )
    .await?;
    tx.commit().await?;

    // A committed content change supersedes any auto-saved draft.
    if content.is_some() {
        if let Err(e) = drafts::discard_draft(&state.redis, &draft_key(auth.user.id, id)).await {
            warn!("Failed to discard draft for resume {id}: {e}");
        }
    }

    Ok(Json(resume))
}

/// DELETE /api/resumes/:id
pub async fn handle_delete_resume(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let mut tx = state.db.begin().await?;
    let resume = find_owned_for_update(&mut tx, auth.user.id, id).await?;
    soft_delete(&mut tx, resume.id).await?;
    activity::record(
        &mut *tx,
        ActivityEntry::new(auth.user.id, "resume.delete", "resume")
            .entity(resume.id)
            .metadata(json!({ "title": resume.title }))
            .ip(auth.ip.as_deref()),
    )
    .await?;
    tx.commit().await?;

    info!("Soft-deleted resume {id}");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/resumes/:id/duplicate
pub async fn handle_duplicate_resume(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<ResumeRow>), AppError> {
    let source = find_owned(&state.db, auth.user.id, id).await?;
    let mut content = ResumeContent::from_value(source.content.clone())?;
    content.regenerate_ids();
    let content = content.to_value()?;
    let title: String = format!("{} (Copy)", source.title).chars().take(200).collect();
    let note = format!("Duplicated from {}", source.id);

    let mut tx = state.db.begin().await?;
    let resume = create_resume(
        &mut tx,
        NewResume {
            user_id: auth.user.id,
            title: &title,
            template: &source.template,
            content: &content,
        },
        Some(&note),
    )
    .await?;
    activity::record(
        &mut *tx,
        ActivityEntry::new(auth.user.id, "resume.duplicate", "resume")
            .entity(resume.id)
            .metadata(json!({ "source_id": source.id }))
            .ip(auth.ip.as_deref()),
    )
    .await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(resume)))
}

/// GET /api/resumes/:id/versions
pub async fn handle_list_versions(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<VersionSummary>>, AppError> {
    let resume = find_owned(&state.db, auth.user.id, id).await?;
    Ok(Json(list_versions(&state.db, resume.id).await?))
}

/// GET /api/resumes/:id/versions/:v
pub async fn handle_get_version(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, version)): Path<(Uuid, i32)>,
) -> Result<Json<ResumeVersionRow>, AppError> {
    let resume = find_owned(&state.db, auth.user.id, id).await?;
    Ok(Json(get_version(&state.db, resume.id, version).await?))
}

/// POST /api/resumes/:id/versions/:v/restore
pub async fn handle_restore_version(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, version)): Path<(Uuid, i32)>,
) -> Result<Json<ResumeRow>, AppError> {
    find_owned(&state.db, auth.user.id, id).await?;
    let snapshot = get_version(&state.db, id, version).await?;
    let note = restore_note(version);

    let mut tx = state.db.begin().await?;
    let current = find_owned_for_update(&mut tx, auth.user.id, id).await?;
    let resume = commit_change(
        &mut tx,
        &current,
        ResumeChange {
            title: &snapshot.title,
            template: &snapshot.template,
            content: &snapshot.content,
            change_note: Some(&note),
        },
    )
    .await?;
    activity::record(
        &mut *tx,
        ActivityEntry::new(auth.user.id, "resume.restore", "resume")
            .entity(resume.id)
            .metadata(json!({ "restored_version": version, "version": resume.version }))
            .ip(auth.ip.as_deref()),
    )
    .await?;
    tx.commit().await?;

    info!("Restored resume {id} from version {version}");
    Ok(Json(resume))
}

/// GET /api/resumes/:id/completeness
pub async fn handle_completeness(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<CompletenessReport>, AppError> {
    let resume = find_owned(&state.db, auth.user.id, id).await?;
    let content = ResumeContent::from_value(resume.content)?;
    Ok(Json(compute_completeness_report(&content)))
}

/// PUT /api/resumes/:id/draft
pub async fn handle_save_draft(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<SaveDraftRequest>,
) -> Result<Json<StoredDraft>, AppError> {
    let mut content = req.content;
    content.normalize();

    let resume = find_owned(&state.db, auth.user.id, id).await?;
    let draft = drafts::save_draft(
        &state.redis,
        &draft_key(auth.user.id, resume.id),
        content,
        state.config.draft_ttl_secs,
    )
    .await?;
    Ok(Json(draft))
}

/// GET /api/resumes/:id/draft
pub async fn handle_get_draft(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<StoredDraft>, AppError> {
    let resume = find_owned(&state.db, auth.user.id, id).await?;
    drafts::load_draft(&state.redis, &draft_key(auth.user.id, resume.id))
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No draft for resume {id}")))
}

/// DELETE /api/resumes/:id/draft
pub async fn handle_discard_draft(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let resume = find_owned(&state.db, auth.user.id, id).await?;
    drafts::discard_draft(&state.redis, &draft_key(auth.user.id, resume.id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/templates
pub async fn handle_list_templates() -> Json<Vec<TemplateInfo>> {
    Json(ResumeTemplate::ALL.iter().map(|t| t.info()).collect())
}

/// GET /api/resumes/:id/preview
pub async fn handle_preview(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<PreviewQuery>,
) -> Result<Html<String>, AppError> {
    let template = query
        .template
        .as_deref()
        .map(str::parse::<ResumeTemplate>)
        .transpose()?;

    let resume = find_owned(&state.db, auth.user.id, id).await?;
    let template = template.unwrap_or_else(|| stored_template(&resume.template));
    let content = ResumeContent::from_value(resume.content)?;
    let view = ResumeView::new(&resume.title, &content);
    Ok(Html(render_html(&view, template)?))
}

/// GET /api/resumes/:id/export
pub async fn handle_export(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
) -> Result<(HeaderMap, String), AppError> {
    let format = query
        .format
        .as_deref()
        .unwrap_or("html")
        .parse::<ExportFormat>()?;

    let resume = find_owned(&state.db, auth.user.id, id).await?;
    let content = ResumeContent::from_value(resume.content.clone())?;
    let view = ResumeView::new(&resume.title, &content);

    let body = match format {
        ExportFormat::Html => render_html(&view, stored_template(&resume.template))?,
        ExportFormat::Markdown => to_markdown(&view),
        ExportFormat::Text => to_plain_text(&view),
        ExportFormat::Json => serde_json::to_string_pretty(&json!({
            "title": resume.title,
            "template": resume.template,
            "version": resume.version,
            "content": content,
        }))
        .map_err(|e| AppError::Internal(e.into()))?,
    };

    activity::record(
        &state.db,
        ActivityEntry::new(auth.user.id, "resume.export", "resume")
            .entity(resume.id)
            .metadata(json!({ "format": format.as_str() }))
            .ip(auth.ip.as_deref()),
    )
    .await?;

    Ok((attachment_headers(&resume.title, format)?, body))
}

fn attachment_headers(title: &str, format: ExportFormat) -> Result<HeaderMap, AppError> {
    let disposition = format!("attachment; filename=\"{}\"", export_filename(title, format));
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(format.content_type()));
    headers.insert(
        CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition).map_err(|e| AppError::Internal(e.into()))?,
    );
    Ok(headers)
}
