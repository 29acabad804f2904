//! Typed resume content: the guided-form sections stored as one JSONB document.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::{Validate, ValidateUrl, ValidationError};

use crate::errors::AppError;

const MAX_HIGHLIGHT_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SkillLevel {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
    Expert,
}

impl SkillLevel {
    pub fn label(&self) -> &'static str {
        match self {
            SkillLevel::Beginner => "Beginner",
            SkillLevel::Intermediate => "Intermediate",
            SkillLevel::Advanced => "Advanced",
            SkillLevel::Expert => "Expert",
        }
    }

    /// 1..=4, used for skill bars.
    pub fn rank(&self) -> u8 {
        match self {
            SkillLevel::Beginner => 1,
            SkillLevel::Intermediate => 2,
            SkillLevel::Advanced => 3,
            SkillLevel::Expert => 4,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, PartialEq)]
#[serde(default)]
pub struct PersonalInfo {
    #[validate(length(max = 100))]
    pub full_name: String,
    #[validate(length(max = 100))]
    pub job_title: Option<String>,
    #[validate(email(message = "Enter a valid email address"))]
    pub email: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[validate(length(max = 100))]
    pub location: Option<String>,
    #[validate(custom(function = "validate_web_url"))]
    pub website: Option<String>,
    #[validate(custom(function = "validate_web_url"))]
    pub linkedin: Option<String>,
    #[validate(custom(function = "validate_web_url"))]
    pub github: Option<String>,
    #[validate(length(max = 2000))]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, PartialEq)]
#[serde(default)]
pub struct Experience {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[validate(length(min = 1, max = 100, message = "Company is required"))]
    pub company: String,
    #[validate(length(min = 1, max = 100, message = "Position is required"))]
    pub position: String,
    #[validate(length(max = 100))]
    pub location: Option<String>,
    pub start_date: String,
    pub end_date: Option<String>,
    pub current: bool,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(max = 20, message = "At most 20 highlights per entry"))]
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, PartialEq)]
#[serde(default)]
pub struct Education {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[validate(length(min = 1, max = 150, message = "Institution is required"))]
    pub institution: String,
    #[validate(length(min = 1, max = 100, message = "Degree is required"))]
    pub degree: String,
    #[validate(length(max = 100))]
    pub field_of_study: Option<String>,
    #[validate(length(max = 100))]
    pub location: Option<String>,
    pub start_date: String,
    pub end_date: Option<String>,
    #[validate(length(max = 10))]
    pub gpa: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, PartialEq)]
#[serde(default)]
pub struct Skill {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[validate(length(min = 1, max = 50, message = "Skill name is required"))]
    pub name: String,
    pub level: SkillLevel,
    #[validate(length(max = 50))]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, PartialEq)]
#[serde(default)]
pub struct Project {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[validate(length(min = 1, max = 100, message = "Project name is required"))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(custom(function = "validate_web_url"))]
    pub url: Option<String>,
    #[validate(length(max = 30))]
    pub technologies: Vec<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[validate(length(max = 20, message = "At most 20 highlights per entry"))]
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, PartialEq)]
#[serde(default)]
pub struct Certification {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[validate(length(min = 1, max = 150, message = "Certification name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 150, message = "Issuer is required"))]
    pub issuer: String,
    pub issue_date: Option<String>,
    pub expiry_date: Option<String>,
    #[validate(length(max = 100))]
    pub credential_id: Option<String>,
    #[validate(custom(function = "validate_web_url"))]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, PartialEq)]
#[serde(default)]
pub struct Hobby {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[validate(length(min = 1, max = 50, message = "Hobby name is required"))]
    pub name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, PartialEq)]
#[serde(default)]
pub struct ResumeContent {
    #[validate(nested)]
    pub personal_info: PersonalInfo,
    #[validate(length(max = 50), nested)]
    pub experience: Vec<Experience>,
    #[validate(length(max = 50), nested)]
    pub education: Vec<Education>,
    #[validate(length(max = 50), nested)]
    pub skills: Vec<Skill>,
    #[validate(length(max = 50), nested)]
    pub projects: Vec<Project>,
    #[validate(length(max = 50), nested)]
    pub certifications: Vec<Certification>,
    #[validate(length(max = 50), nested)]
    pub hobbies: Vec<Hobby>,
}

/// Links end up in rendered `href`s, so only http(s) URLs are accepted.
pub fn validate_web_url(value: &str) -> Result<(), ValidationError> {
    let scheme = value.split_once(':').map(|(scheme, _)| scheme.to_ascii_lowercase());
    let web = matches!(scheme.as_deref(), Some("http" | "https"));
    if web && value.validate_url() {
        Ok(())
    } else {
        let mut err = ValidationError::new("url");
        err.message = Some("Must be an http or https URL".into());
        Err(err)
    }
}

/// Parses a `YYYY-MM` month into the first day of that month.
pub fn parse_month(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.len() != 7 {
        return None;
    }
    NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d").ok()
}

fn require_month(value: &str, field: &str) -> Result<NaiveDate, AppError> {
    parse_month(value)
        .ok_or_else(|| AppError::Validation(format!("{field} must be a YYYY-MM month")))
}

fn check_range(
    start: Option<&str>,
    end: Option<&str>,
    label: &str,
) -> Result<(), AppError> {
    let start = start
        .map(|s| require_month(s, &format!("{label} start date")))
        .transpose()?;
    let end = end
        .map(|s| require_month(s, &format!("{label} end date")))
        .transpose()?;
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(AppError::Validation(format!(
                "{label} end date is before its start date"
            )));
        }
    }
    Ok(())
}

fn check_highlights(highlights: &[String], label: &str) -> Result<(), AppError> {
    for highlight in highlights {
        if highlight.trim().is_empty() {
            return Err(AppError::Validation(format!("{label} has an empty highlight")));
        }
        if highlight.chars().count() > MAX_HIGHLIGHT_CHARS {
            return Err(AppError::Validation(format!(
                "{label} highlights must be at most {MAX_HIGHLIGHT_CHARS} characters"
            )));
        }
    }
    Ok(())
}

fn blank_to_none(value: &mut Option<String>) {
    if let Some(v) = value {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            *value = None;
        } else if trimmed.len() != v.len() {
            *value = Some(trimmed.to_string());
        }
    }
}

fn trim_in_place(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}

impl ResumeContent {
    /// Tolerant read of stored JSON; unknown fields are ignored, missing ones default.
    pub fn from_value(value: Value) -> Result<Self, AppError> {
        serde_json::from_value(value)
            .map_err(|e| AppError::Validation(format!("Malformed resume content: {e}")))
    }

    pub fn to_value(&self) -> Result<Value, AppError> {
        serde_json::to_value(self).map_err(|e| AppError::Internal(e.into()))
    }

    /// Trims text fields and turns blank optional fields into `None`, so that
    /// empty form inputs do not trip format validation.
    pub fn normalize(&mut self) {
        let p = &mut self.personal_info;
        trim_in_place(&mut p.full_name);
        for field in [
            &mut p.job_title,
            &mut p.email,
            &mut p.phone,
            &mut p.location,
            &mut p.website,
            &mut p.linkedin,
            &mut p.github,
            &mut p.summary,
        ] {
            blank_to_none(field);
        }

        for e in &mut self.experience {
            trim_in_place(&mut e.company);
            trim_in_place(&mut e.position);
            trim_in_place(&mut e.start_date);
            blank_to_none(&mut e.location);
            blank_to_none(&mut e.end_date);
            blank_to_none(&mut e.description);
            e.highlights.retain(|h| !h.trim().is_empty());
        }
        for e in &mut self.education {
            trim_in_place(&mut e.institution);
            trim_in_place(&mut e.degree);
            trim_in_place(&mut e.start_date);
            blank_to_none(&mut e.field_of_study);
            blank_to_none(&mut e.location);
            blank_to_none(&mut e.end_date);
            blank_to_none(&mut e.gpa);
            blank_to_none(&mut e.description);
        }
        for s in &mut self.skills {
            trim_in_place(&mut s.name);
            blank_to_none(&mut s.category);
        }
        for p in &mut self.projects {
            trim_in_place(&mut p.name);
            blank_to_none(&mut p.description);
            blank_to_none(&mut p.url);
            blank_to_none(&mut p.start_date);
            blank_to_none(&mut p.end_date);
            p.technologies.retain(|t| !t.trim().is_empty());
            p.highlights.retain(|h| !h.trim().is_empty());
        }
        for c in &mut self.certifications {
            trim_in_place(&mut c.name);
            trim_in_place(&mut c.issuer);
            blank_to_none(&mut c.issue_date);
            blank_to_none(&mut c.expiry_date);
            blank_to_none(&mut c.credential_id);
            blank_to_none(&mut c.url);
        }
        for h in &mut self.hobbies {
            trim_in_place(&mut h.name);
            blank_to_none(&mut h.description);
        }
    }

    /// Field validation plus the date and highlight rules the derive cannot express.
    pub fn check(&self) -> Result<(), AppError> {
        self.validate()?;

        for (i, e) in self.experience.iter().enumerate() {
            let label = format!("Experience #{}", i + 1);
            require_month(&e.start_date, &format!("{label} start date"))?;
            if e.current && e.end_date.is_some() {
                return Err(AppError::Validation(format!(
                    "{label} is marked current and cannot have an end date"
                )));
            }
            check_range(Some(e.start_date.as_str()), e.end_date.as_deref(), &label)?;
            check_highlights(&e.highlights, &label)?;
        }
        for (i, e) in self.education.iter().enumerate() {
            let label = format!("Education #{}", i + 1);
            require_month(&e.start_date, &format!("{label} start date"))?;
            check_range(Some(e.start_date.as_str()), e.end_date.as_deref(), &label)?;
        }
        for (i, p) in self.projects.iter().enumerate() {
            let label = format!("Project #{}", i + 1);
            check_range(p.start_date.as_deref(), p.end_date.as_deref(), &label)?;
            check_highlights(&p.highlights, &label)?;
        }
        for (i, c) in self.certifications.iter().enumerate() {
            let label = format!("Certification #{}", i + 1);
            check_range(c.issue_date.as_deref(), c.expiry_date.as_deref(), &label)?;
        }
        Ok(())
    }

    /// Assigns new ids to every list item (used when duplicating a resume).
    pub fn regenerate_ids(&mut self) {
        self.experience.iter_mut().for_each(|e| e.id = Uuid::new_v4());
        self.education.iter_mut().for_each(|e| e.id = Uuid::new_v4());
        self.skills.iter_mut().for_each(|s| s.id = Uuid::new_v4());
        self.projects.iter_mut().for_each(|p| p.id = Uuid::new_v4());
        self.certifications.iter_mut().for_each(|c| c.id = Uuid::new_v4());
        self.hobbies.iter_mut().for_each(|h| h.id = Uuid::new_v4());
    }

    pub fn skill_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.skills.iter().map(|s| s.name.clone()).collect();
        for project in &self.projects {
            names.extend(project.technologies.iter().cloned());
        }
        names
    }

    /// Experience and project highlights, in document order.
    pub fn all_highlights(&self) -> Vec<&str> {
        self.experience
            .iter()
            .flat_map(|e| e.highlights.iter())
            .chain(self.projects.iter().flat_map(|p| p.highlights.iter()))
            .map(String::as_str)
            .collect()
    }

    /// Every human-readable string in the document, space-joined.
    pub fn searchable_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        let p = &self.personal_info;
        parts.push(&p.full_name);
        parts.extend(
            [&p.job_title, &p.location, &p.summary]
                .into_iter()
                .filter_map(|v| v.as_deref()),
        );
        for e in &self.experience {
            parts.push(&e.company);
            parts.push(&e.position);
            parts.extend(e.location.as_deref());
            parts.extend(e.description.as_deref());
            parts.extend(e.highlights.iter().map(String::as_str));
        }
        for e in &self.education {
            parts.push(&e.institution);
            parts.push(&e.degree);
            parts.extend(e.field_of_study.as_deref());
            parts.extend(e.description.as_deref());
        }
        for s in &self.skills {
            parts.push(&s.name);
            parts.extend(s.category.as_deref());
        }
        for pr in &self.projects {
            parts.push(&pr.name);
            parts.extend(pr.description.as_deref());
            parts.extend(pr.technologies.iter().map(String::as_str));
            parts.extend(pr.highlights.iter().map(String::as_str));
        }
        for c in &self.certifications {
            parts.push(&c.name);
            parts.push(&c.issuer);
        }
        for h in &self.hobbies {
            parts.push(&h.name);
            parts.extend(h.description.as_deref());
        }
        parts
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
pub(crate) fn sample_content() -> ResumeContent {
    ResumeContent {
        personal_info: PersonalInfo {
            full_name: "Ada Lovelace".to_string(),
            job_title: Some("Backend Engineer".to_string()),
            email: Some("ada@example.com".to_string()),
            phone: Some("+44 20 7946 0958".to_string()),
            location: Some("London, UK".to_string()),
            website: Some("https://ada.dev".to_string()),
            linkedin: None,
            github: Some("https://github.com/ada".to_string()),
            summary: Some("Engineer focused on reliable data pipelines.".to_string()),
        },
        experience: vec![Experience {
            id: Uuid::new_v4(),
            company: "Analytical Engines Ltd".to_string(),
            position: "Senior Engineer".to_string(),
            location: Some("London".to_string()),
            start_date: "2021-03".to_string(),
            end_date: None,
            current: true,
            description: None,
            highlights: vec![
                "Reduced batch latency by 40% with Rust and Kafka".to_string(),
                "Improved the deployment process".to_string(),
            ],
        }],
        education: vec![Education {
            id: Uuid::new_v4(),
            institution: "University of London".to_string(),
            degree: "BSc".to_string(),
            field_of_study: Some("Mathematics".to_string()),
            location: None,
            start_date: "2014-09".to_string(),
            end_date: Some("2017-06".to_string()),
            gpa: None,
            description: None,
        }],
        skills: vec![
            Skill {
                id: Uuid::new_v4(),
                name: "Rust".to_string(),
                level: SkillLevel::Expert,
                category: Some("Languages".to_string()),
            },
            Skill {
                id: Uuid::new_v4(),
                name: "PostgreSQL".to_string(),
                level: SkillLevel::Advanced,
                category: Some("Databases".to_string()),
            },
        ],
        projects: vec![Project {
            id: Uuid::new_v4(),
            name: "Difference Engine".to_string(),
            description: Some("Open-source numeric toolkit".to_string()),
            url: Some("https://github.com/ada/engine".to_string()),
            technologies: vec!["Rust".to_string(), "WebAssembly".to_string()],
            start_date: Some("2020-01".to_string()),
            end_date: Some("2020-12".to_string()),
            highlights: vec!["Served 10k monthly users".to_string()],
        }],
        certifications: vec![Certification {
            id: Uuid::new_v4(),
            name: "AWS Solutions Architect".to_string(),
            issuer: "Amazon Web Services".to_string(),
            issue_date: Some("2022-05".to_string()),
            expiry_date: Some("2025-05".to_string()),
            credential_id: None,
            url: None,
        }],
        hobbies: vec![Hobby {
            id: Uuid::new_v4(),
            name: "Chess".to_string(),
            description: None,
        }],
    }
}
