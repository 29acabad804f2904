//! ATS scoring: pluggable, trait-based scorer that measures a resume against a
//! job description.
//!
//! Default: `KeywordAtsScorer` (local, deterministic, no network).
//! `LlmAtsScorer` layers model feedback on top of the keyword report.
//!
//! `AppState` holds an `Arc<dyn AtsScorer>`, chosen at startup via config.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ai::prompts::{ats_system, fill_template, ATS_PROMPT_TEMPLATE};
use crate::errors::AppError;
use crate::llm_client::LlmClient;
use crate::render::export::to_plain_text;
use crate::render::ResumeView;
use crate::resumes::content::ResumeContent;
use crate::resumes::impact::{weak_highlights, WeakHighlight};
use crate::resumes::search::tokenize;

const MAX_KEYWORDS: usize = 30;
const SKILL_MATCH: f64 = 1.0;
const TEXT_MATCH: f64 = 0.6;
const KEYWORD_WEIGHT: f64 = 0.60;
const SECTION_WEIGHT: f64 = 0.25;
const CONTENT_WEIGHT: f64 = 0.15;

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "all", "also", "an", "and", "any", "are", "as",
    "at", "be", "been", "being", "both", "but", "by", "can", "could", "do", "does", "each",
    "etc", "for", "from", "has", "have", "how", "if", "in", "including", "into", "is", "it",
    "its", "join", "looking", "may", "more", "most", "must", "new", "not", "of", "on", "or",
    "other", "our", "out", "over", "own", "plus", "role", "should", "so", "such", "than",
    "that", "the", "their", "them", "then", "there", "these", "they", "this", "those",
    "through", "to", "up", "us", "using", "very", "we", "well", "were", "what", "when",
    "where", "which", "while", "who", "will", "with", "within", "work", "working", "would",
    "year", "years", "you", "your", "ability", "able", "candidate", "company", "experience",
    "help", "ideal", "job", "knowledge", "like", "strong", "team", "understanding",
];

/// A keyword extracted from the job description.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobKeyword {
    pub keyword: String,
    pub frequency: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    Skill,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordMatch {
    pub keyword: String,
    pub frequency: u32,
    pub strength: f64,
    pub source: MatchSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionCheck {
    pub section: String,
    pub passed: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmFeedback {
    pub score: u32,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
}

/// Full ATS report returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtsReport {
    pub overall_score: u32,
    pub keyword_score: u32,
    pub section_score: u32,
    pub content_score: u32,
    pub matched_keywords: Vec<KeywordMatch>,
    pub missing_keywords: Vec<JobKeyword>,
    pub section_checks: Vec<SectionCheck>,
    pub weak_highlights: Vec<WeakHighlight>,
    pub recommendations: Vec<String>,
    /// "keyword" | "llm"
    pub scorer_backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_feedback: Option<LlmFeedback>,
}

/// Implement this to swap backends without touching the handler.
#[async_trait]
pub trait AtsScorer: Send + Sync {
    async fn score(
        &self,
        content: &ResumeContent,
        job_description: &str,
    ) -> Result<AtsReport, AppError>;
}

pub struct KeywordAtsScorer;

#[async_trait]
impl AtsScorer for KeywordAtsScorer {
    async fn score(
        &self,
        content: &ResumeContent,
        job_description: &str,
    ) -> Result<AtsReport, AppError> {
        Ok(compute_keyword_report(content, job_description))
    }
}

/// Keyword report plus a model opinion; the overall score is the mean of both.
pub struct LlmAtsScorer(pub LlmClient);

#[async_trait]
impl AtsScorer for LlmAtsScorer {
    async fn score(
        &self,
        content: &ResumeContent,
        job_description: &str,
    ) -> Result<AtsReport, AppError> {
        let mut report = compute_keyword_report(content, job_description);

        let resume_text = to_plain_text(&ResumeView::new("", content));
        let prompt = ats_prompt(job_description, &resume_text);
        let feedback: LlmFeedback = self
            .0
            .call_json(&prompt, &ats_system())
            .await
            .map_err(|e| AppError::Llm(format!("ATS scoring failed: {e}")))?;

        merge_llm_feedback(&mut report, feedback);
        Ok(report)
    }
}

fn ats_prompt(job_description: &str, resume_text: &str) -> String {
    fill_template(
        ATS_PROMPT_TEMPLATE,
        &[("job_description", job_description), ("resume", resume_text)],
    )
}

fn merge_llm_feedback(report: &mut AtsReport, mut feedback: LlmFeedback) {
    feedback.score = feedback.score.min(100);
    feedback.strengths.truncate(5);
    feedback.improvements.truncate(5);

    report.overall_score =
        ((report.overall_score as f64 + feedback.score as f64) / 2.0).round() as u32;
    report
        .recommendations
        .extend(feedback.improvements.iter().cloned());
    report.scorer_backend = "llm".to_string();
    report.llm_feedback = Some(feedback);
}

/// Most frequent meaningful tokens, ties broken by first appearance.
pub fn extract_keywords(job_description: &str) -> Vec<JobKeyword> {
    let stop: HashSet<&str> = STOP_WORDS.iter().copied().collect();
    let mut counts: HashMap<String, (u32, usize)> = HashMap::new();

    for (position, token) in tokenize(job_description).into_iter().enumerate() {
        if token.chars().count() < 2
            || stop.contains(token.as_str())
            || token.chars().all(|c| c.is_ascii_digit())
        {
            continue;
        }
        counts.entry(token).or_insert((0, position)).0 += 1;
    }

    let mut keywords: Vec<(String, u32, usize)> = counts
        .into_iter()
        .map(|(keyword, (frequency, first))| (keyword, frequency, first))
        .collect();
    keywords.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    keywords
        .into_iter()
        .take(MAX_KEYWORDS)
        .map(|(keyword, frequency, _)| JobKeyword { keyword, frequency })
        .collect()
}

fn section_checks(content: &ResumeContent) -> Vec<SectionCheck> {
    let p = &content.personal_info;
    let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
    let checks = [
        ("contact", filled(&p.email) && filled(&p.phone), "Include both an email address and a phone number"),
        ("summary", filled(&p.summary), "Add a professional summary near the top"),
        ("experience", !content.experience.is_empty(), "Add a work experience section"),
        ("education", !content.education.is_empty(), "Add an education section"),
        ("skills", !content.skills.is_empty(), "Add a dedicated skills section"),
        (
            "dates",
            content.experience.iter().all(|e| !e.start_date.is_empty()),
            "Give every role a start date",
        ),
    ];
    checks
        .into_iter()
        .map(|(section, passed, fix)| SectionCheck {
            section: section.to_string(),
            passed,
            message: if passed { "OK".to_string() } else { fix.to_string() },
        })
        .collect()
}

pub fn compute_keyword_report(content: &ResumeContent, job_description: &str) -> AtsReport {
    let keywords = extract_keywords(job_description);

    let skill_tokens: HashSet<String> = content
        .skill_names()
        .iter()
        .flat_map(|name| {
            let mut tokens = tokenize(name);
            tokens.push(name.trim().to_lowercase());
            tokens
        })
        .collect();
    let text_tokens: HashSet<String> = tokenize(&content.searchable_text()).into_iter().collect();

    let mut matched = Vec::new();
    let mut missing = Vec::new();
    let mut total_weight = 0.0;
    let mut total_score = 0.0;

    for kw in keywords {
        let weight = kw.frequency as f64;
        total_weight += weight;

        let found = if skill_tokens.contains(&kw.keyword) {
            Some((SKILL_MATCH, MatchSource::Skill))
        } else if text_tokens.contains(&kw.keyword) {
            Some((TEXT_MATCH, MatchSource::Text))
        } else {
            None
        };

        match found {
            Some((strength, source)) => {
                total_score += strength * weight;
                matched.push(KeywordMatch {
                    keyword: kw.keyword,
                    frequency: kw.frequency,
                    strength,
                    source,
                });
            }
            None => missing.push(kw),
        }
    }

    let keyword_score = if total_weight > 0.0 {
        (total_score / total_weight * 100.0).round() as u32
    } else {
        0
    };

    let checks = section_checks(content);
    let section_score =
        (checks.iter().filter(|c| c.passed).count() as f64 / checks.len() as f64 * 100.0).round()
            as u32;

    let highlights = content.all_highlights();
    let weak = weak_highlights(highlights.iter().copied());
    let content_score = if highlights.is_empty() {
        0
    } else {
        ((highlights.len() - weak.len()) as f64 / highlights.len() as f64 * 100.0).round() as u32
    };

    let overall_score = (KEYWORD_WEIGHT * keyword_score as f64
        + SECTION_WEIGHT * section_score as f64
        + CONTENT_WEIGHT * content_score as f64)
        .round()
        .min(100.0) as u32;

    let recommendations = build_recommendations(overall_score, &missing, &checks, &weak);
    info!(
        "ATS keyword report: overall={overall_score} keywords={keyword_score} sections={section_score} content={content_score}"
    );

    AtsReport {
        overall_score,
        keyword_score,
        section_score,
        content_score,
        matched_keywords: matched,
        missing_keywords: missing,
        section_checks: checks,
        weak_highlights: weak,
        recommendations,
        scorer_backend: "keyword".to_string(),
        llm_feedback: None,
    }
}

fn build_recommendations(
    score: u32,
    missing: &[JobKeyword],
    checks: &[SectionCheck],
    weak: &[WeakHighlight],
) -> Vec<String> {
    let mut recommendations = Vec::new();

    let top_gaps: Vec<&str> = missing.iter().take(5).map(|k| k.keyword.as_str()).collect();
    if !top_gaps.is_empty() {
        recommendations.push(format!(
            "Work these job description keywords into your skills or experience where accurate: {}",
            top_gaps.join(", ")
        ));
    }
    recommendations.extend(checks.iter().filter(|c| !c.passed).map(|c| c.message.clone()));
    if !weak.is_empty() {
        recommendations.push(format!(
            "{} highlights lack measurable outcomes: add numbers, percentages or time saved",
            weak.len()
        ));
    }
    if recommendations.is_empty() && score >= 80 {
        recommendations.push("Strong match. Tailor your summary to the role and submit.".to_string());
    }
    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resumes::content::sample_content;

    const JD: &str = "Senior Rust Engineer. You will build Kafka pipelines in Rust. \
        Required: Rust, PostgreSQL, Kubernetes. Rust experience with distributed systems.";

    #[test]
    fn test_ats_prompt_keeps_job_text_literal() {
        let prompt = ats_prompt("Paste {resume} here", "RESUME-BODY");
        assert!(prompt.contains("Paste {resume} here"));
        assert_eq!(prompt.matches("RESUME-BODY").count(), 1);
        assert!(prompt.contains(r#"{"score": 0"#));
    }

    #[test]
    fn test_extract_keywords_counts_and_filters() {
        let keywords = extract_keywords(JD);
        assert_eq!(keywords[0], JobKeyword { keyword: "rust".to_string(), frequency: 4 });
        assert!(keywords.iter().all(|k| k.keyword != "you" && k.keyword != "experience"));
        assert!(keywords.iter().any(|k| k.keyword == "kubernetes"));
    }

    #[test]
    fn test_extract_keywords_caps_at_thirty() {
        let jd: String = (0..50).map(|i| format!("skill{i} ")).collect();
        assert_eq!(extract_keywords(&jd).len(), MAX_KEYWORDS);
    }

    #[test]
    fn test_extract_keywords_skips_numbers_and_short_tokens() {
        let keywords = extract_keywords("5 x 2024 go go");
        assert_eq!(keywords, vec![JobKeyword { keyword: "go".to_string(), frequency: 2 }]);
    }

    #[test]
    fn test_skill_match_beats_text_match() {
        let report = compute_keyword_report(&sample_content(), JD);
        let rust = report.matched_keywords.iter().find(|m| m.keyword == "rust").unwrap();
        assert_eq!(rust.source, MatchSource::Skill);
        assert_eq!(rust.strength, 1.0);

        let kafka = report.matched_keywords.iter().find(|m| m.keyword == "kafka").unwrap();
        assert_eq!(kafka.source, MatchSource::Text);
        assert_eq!(kafka.strength, 0.6);

        assert!(report.missing_keywords.iter().any(|k| k.keyword == "kubernetes"));
    }

    #[test]
    fn test_scores_are_bounded_and_weighted() {
        let report = compute_keyword_report(&sample_content(), JD);
        assert!(report.overall_score <= 100);
        let expected = (0.6 * report.keyword_score as f64
            + 0.25 * report.section_score as f64
            + 0.15 * report.content_score as f64)
            .round() as u32;
        assert_eq!(report.overall_score, expected);
        assert_eq!(report.scorer_backend, "keyword");
    }

    #[test]
    fn test_empty_resume_scores_low_with_recommendations() {
        let report = compute_keyword_report(&ResumeContent::default(), JD);
        assert_eq!(report.keyword_score, 0);
        assert_eq!(report.content_score, 0);
        assert!(report.recommendations.len() > 3);
    }

    #[test]
    fn test_weak_highlights_reported() {
        let report = compute_keyword_report(&sample_content(), JD);
        assert_eq!(report.weak_highlights.len(), 1);
        assert_eq!(report.weak_highlights[0].highlight, "Improved the deployment process");
    }

    #[test]
    fn test_merge_llm_feedback_averages() {
        let mut report = compute_keyword_report(&sample_content(), JD);
        report.overall_score = 60;
        merge_llm_feedback(
            &mut report,
            LlmFeedback {
                score: 81,
                strengths: vec!["Clear Rust focus".to_string()],
                improvements: vec!["Mention Kubernetes".to_string()],
            },
        );
        assert_eq!(report.overall_score, 71);
        assert_eq!(report.scorer_backend, "llm");
        assert!(report.recommendations.contains(&"Mention Kubernetes".to_string()));
    }

    #[tokio::test]
    async fn test_keyword_scorer_via_trait_object() {
        let scorer: std::sync::Arc<dyn AtsScorer> = std::sync::Arc::new(KeywordAtsScorer);
        let report = scorer.score(&sample_content(), JD).await.unwrap();
        assert_eq!(report.scorer_backend, "keyword");
    }
}
