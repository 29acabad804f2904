//! Axum route handlers for AI writing suggestions and ATS scoring.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::activity::{self, ActivityEntry};
use crate::ai::ats::AtsReport;
use crate::ai::suggestions::{generate_suggestions, SuggestionInput, SuggestionKind};
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::render::export::to_plain_text;
use crate::render::ResumeView;
use crate::resumes::content::ResumeContent;
use crate::resumes::repository::{find_owned, set_ats_score};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct SuggestionRequest {
    pub kind: SuggestionKind,
    pub resume_id: Option<Uuid>,
    #[validate(length(max = 4000, message = "Context must be at most 4000 characters"))]
    pub context: Option<String>,
    #[validate(length(max = 100))]
    pub job_title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SuggestionResponse {
    pub kind: SuggestionKind,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AtsScoreRequest {
    pub resume_id: Uuid,
    #[validate(length(
        min = 30,
        max = 20000,
        message = "Job description must be 30-20000 characters"
    ))]
    pub job_description: String,
}

/// POST /api/ai/suggestions
pub async fn handle_suggestions(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<SuggestionRequest>,
) -> Result<Json<SuggestionResponse>, AppError> {
    req.validate()?;
    let llm = state.llm.as_ref().ok_or_else(|| {
        AppError::ServiceUnavailable("AI suggestions are not configured".to_string())
    })?;

    let resume_text = match req.resume_id {
        Some(id) => {
            let resume = find_owned(&state.db, auth.user.id, id).await?;
            let content = ResumeContent::from_value(resume.content)?;
            Some(to_plain_text(&ResumeView::new(&resume.title, &content)))
        }
        None => None,
    };

    let suggestions = generate_suggestions(
        llm,
        SuggestionInput {
            kind: req.kind,
            resume_text: resume_text.as_deref(),
            context: req.context.as_deref(),
            job_title: req.job_title.as_deref(),
        },
    )
    .await?;

    Ok(Json(SuggestionResponse {
        kind: req.kind,
        suggestions,
    }))
}

/// POST /api/ai/ats-score
pub async fn handle_ats_score(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<AtsScoreRequest>,
) -> Result<Json<AtsReport>, AppError> {
    req.validate()?;

    let resume = find_owned(&state.db, auth.user.id, req.resume_id).await?;
    let content = ResumeContent::from_value(resume.content)?;

    let report = state
        .ats_scorer
        .score(&content, req.job_description.trim())
        .await?;

    let score = i32::try_from(report.overall_score).unwrap_or(100).min(100);
    set_ats_score(&state.db, resume.id, score).await?;
    activity::record(
        &state.db,
        ActivityEntry::new(auth.user.id, "resume.ats_score", "resume")
            .entity(resume.id)
            .metadata(json!({ "score": score, "backend": report.scorer_backend }))
            .ip(auth.ip.as_deref()),
    )
    .await?;

    info!(
        "ATS score {score} ({}) for resume {}",
        report.scorer_backend, resume.id
    );
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ats_request_bounds() {
        let short = AtsScoreRequest {
            resume_id: Uuid::new_v4(),
            job_description: "too short".to_string(),
        };
        assert!(short.validate().is_err());

        let ok = AtsScoreRequest {
            resume_id: Uuid::new_v4(),
            job_description: "Senior Rust engineer building data pipelines".to_string(),
        };
        assert!(ok.validate().is_ok());

        let long = AtsScoreRequest {
            resume_id: Uuid::new_v4(),
            job_description: "x".repeat(20_001),
        };
        assert!(long.validate().is_err());
    }

    #[test]
    fn test_suggestion_request_parses_kind() {
        let req: SuggestionRequest = serde_json::from_value(json!({
            "kind": "skills",
            "job_title": "Data Engineer"
        }))
        .unwrap();
        assert_eq!(req.kind, SuggestionKind::Skills);
        assert!(req.resume_id.is_none());
        assert!(req.validate().is_ok());
    }
}
