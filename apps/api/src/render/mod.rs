//! Server-side resume rendering: askama HTML templates and plain-format exports.

pub mod export;
pub mod view;

use std::str::FromStr;

use askama::Template;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
pub use view::ResumeView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeTemplate {
    Modern,
    Classic,
    Minimal,
    Creative,
    Professional,
}

#[derive(Debug, Serialize)]
pub struct TemplateInfo {
    pub id: ResumeTemplate,
    pub name: &'static str,
    pub description: &'static str,
}

impl ResumeTemplate {
    pub const ALL: [ResumeTemplate; 5] = [
        ResumeTemplate::Modern,
        ResumeTemplate::Classic,
        ResumeTemplate::Minimal,
        ResumeTemplate::Creative,
        ResumeTemplate::Professional,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResumeTemplate::Modern => "modern",
            ResumeTemplate::Classic => "classic",
            ResumeTemplate::Minimal => "minimal",
            ResumeTemplate::Creative => "creative",
            ResumeTemplate::Professional => "professional",
        }
    }

    pub fn info(&self) -> TemplateInfo {
        let (name, description) = match self {
            ResumeTemplate::Modern => ("Modern", "Clean sans-serif layout with an accent header"),
            ResumeTemplate::Classic => ("Classic", "Traditional serif layout, centered header"),
            ResumeTemplate::Minimal => ("Minimal", "Whitespace-first, monochrome, no decoration"),
            ResumeTemplate::Creative => ("Creative", "Two-column layout with a colored sidebar and skill bars"),
            ResumeTemplate::Professional => ("Professional", "Dense single-column layout for senior roles"),
        };
        TemplateInfo {
            id: *self,
            name,
            description,
        }
    }
}

impl FromStr for ResumeTemplate {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResumeTemplate::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AppError::Validation(format!("Unknown template '{s}'")))
    }
}

#[derive(Template)]
#[template(path = "modern.html")]
struct ModernPage<'a> {
    resume: &'a ResumeView,
}

#[derive(Template)]
#[template(path = "classic.html")]
struct ClassicPage<'a> {
    resume: &'a ResumeView,
}

#[derive(Template)]
#[template(path = "minimal.html")]
struct MinimalPage<'a> {
    resume: &'a ResumeView,
}

#[derive(Template)]
#[template(path = "creative.html")]
struct CreativePage<'a> {
    resume: &'a ResumeView,
}

#[derive(Template)]
#[template(path = "professional.html")]
struct ProfessionalPage<'a> {
    resume: &'a ResumeView,
}

/// Renders a complete, print-ready HTML document.
pub fn render_html(resume: &ResumeView, template: ResumeTemplate) -> Result<String, AppError> {
    let rendered = match template {
        ResumeTemplate::Modern => ModernPage { resume }.render(),
        ResumeTemplate::Classic => ClassicPage { resume }.render(),
        ResumeTemplate::Minimal => MinimalPage { resume }.render(),
        ResumeTemplate::Creative => CreativePage { resume }.render(),
        ResumeTemplate::Professional => ProfessionalPage { resume }.render(),
    };
    rendered.map_err(|e| AppError::Internal(anyhow::anyhow!("Template rendering failed: {e}")))
}
