//! Resume completeness: weighted per-section health with actionable recommendations.

use serde::{Deserialize, Serialize};

use crate::resumes::content::ResumeContent;
use crate::resumes::impact::is_quantified;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    Strong,
    Moderate,
    Weak,
    Missing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionHealth {
    pub section: String,
    pub score: f64,
    pub weight: f64,
    pub item_count: usize,
    pub status: SectionStatus,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletenessReport {
    /// 0..=100
    pub overall_score: u32,
    pub sections: Vec<SectionHealth>,
    pub missing_sections: Vec<String>,
}

const SECTION_WEIGHTS: &[(&str, f64)] = &[
    ("personal_info", 0.20),
    ("experience", 0.30),
    ("education", 0.15),
    ("skills", 0.15),
    ("projects", 0.10),
    ("certifications", 0.05),
    ("hobbies", 0.05),
];

fn status_for(score: f64) -> SectionStatus {
    match score {
        s if s >= 0.8 => SectionStatus::Strong,
        s if s >= 0.5 => SectionStatus::Moderate,
        s if s > 0.0 => SectionStatus::Weak,
        _ => SectionStatus::Missing,
    }
}

fn filled(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn personal_info(content: &ResumeContent) -> (f64, usize, Vec<String>) {
    let p = &content.personal_info;
    let checks = [
        ("full name", !p.full_name.trim().is_empty()),
        ("email", filled(&p.email)),
        ("phone number", filled(&p.phone)),
        ("location", filled(&p.location)),
        ("job title", filled(&p.job_title)),
        ("professional summary", filled(&p.summary)),
    ];
    let present = checks.iter().filter(|(_, ok)| *ok).count();
    let recommendations = checks
        .iter()
        .filter(|(_, ok)| !ok)
        .map(|(name, _)| format!("Add your {name}"))
        .collect();
    (present as f64 / checks.len() as f64, present, recommendations)
}

/// Scores bullet-bearing sections: presence plus share of quantified highlights.
fn highlight_section<'a>(
    label: &str,
    item_count: usize,
    highlights: impl Iterator<Item = &'a String>,
    min_items: usize,
) -> (f64, Vec<String>) {
    if item_count == 0 {
        return (0.0, vec![format!("Add at least one {label} entry")]);
    }

    let highlights: Vec<&String> = highlights.collect();
    let quantified = highlights.iter().filter(|h| is_quantified(h)).count();

    let mut recommendations = Vec::new();
    let quality = if highlights.is_empty() {
        recommendations.push(format!("Add achievement highlights to your {label} entries"));
        0.0
    } else {
        let unquantified = highlights.len() - quantified;
        if unquantified > 0 {
            recommendations.push(format!(
                "{unquantified} {label} highlights lack measurable outcomes: add numbers, %, or time saved"
            ));
        }
        quantified as f64 / highlights.len() as f64
    };

    let depth = (item_count as f64 / min_items as f64).min(1.0);
    if item_count < min_items {
        recommendations.push(format!("Consider adding more {label} entries"));
    }

    ((0.5 * depth + 0.5 * quality).clamp(0.0, 1.0), recommendations)
}

fn count_section(label: &str, count: usize, target: usize) -> (f64, Vec<String>) {
    if count == 0 {
        return (0.0, vec![format!("Add at least one {label} entry")]);
    }
    let score = (count as f64 / target as f64).min(1.0);
    let recommendations = if count < target {
        vec![format!("Aim for at least {target} {label} entries")]
    } else {
        vec![]
    };
    (score, recommendations)
}

pub fn compute_completeness_report(content: &ResumeContent) -> CompletenessReport {
    let mut sections = Vec::new();
    let mut missing_sections = Vec::new();
    let mut weighted_score_sum = 0.0;

    for (section, weight) in SECTION_WEIGHTS {
        let (score, item_count, recommendations) = match *section {
            "personal_info" => personal_info(content),
            "experience" => {
                let (s, r) = highlight_section(
                    "experience",
                    content.experience.len(),
                    content.experience.iter().flat_map(|e| e.highlights.iter()),
                    2,
                );
                (s, content.experience.len(), r)
            }
            "projects" => {
                let (s, r) = highlight_section(
                    "project",
                    content.projects.len(),
                    content.projects.iter().flat_map(|p| p.highlights.iter()),
                    2,
                );
                (s, content.projects.len(), r)
            }
            "education" => {
                let (s, r) = count_section("education", content.education.len(), 1);
                (s, content.education.len(), r)
            }
            "skills" => {
                let (s, r) = count_section("skill", content.skills.len(), 5);
                (s, content.skills.len(), r)
            }
            "certifications" => {
                let (s, r) = count_section("certification", content.certifications.len(), 1);
                (s, content.certifications.len(), r)
            }
            _ => {
                let (s, r) = count_section("hobby", content.hobbies.len(), 1);
                (s, content.hobbies.len(), r)
            }
        };

        let status = status_for(score);
        if status == SectionStatus::Missing {
            missing_sections.push(section.to_string());
        }
        weighted_score_sum += score * weight;
        sections.push(SectionHealth {
            section: section.to_string(),
            score,
            weight: *weight,
            item_count,
            status,
            recommendations,
        });
    }

    let total_weight: f64 = SECTION_WEIGHTS.iter().map(|(_, w)| w).sum();
    let overall = if total_weight > 0.0 {
        (weighted_score_sum / total_weight).clamp(0.0, 1.0)
    } else {
        0.0
    };

    CompletenessReport {
        overall_score: (overall * 100.0).round() as u32,
        sections,
        missing_sections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resumes::content::sample_content;

    fn section<'a>(report: &'a CompletenessReport, name: &str) -> &'a SectionHealth {
        report.sections.iter().find(|s| s.section == name).unwrap()
    }

    #[test]
    fn test_empty_resume_scores_zero() {
        let report = compute_completeness_report(&ResumeContent::default());
        assert_eq!(report.overall_score, 0);
        assert_eq!(report.missing_sections.len(), SECTION_WEIGHTS.len());
        assert!(report
            .sections
            .iter()
            .all(|s| s.status == SectionStatus::Missing));
    }

    #[test]
    fn test_weights_sum_to_one() {
        let total: f64 = SECTION_WEIGHTS.iter().map(|(_, w)| w).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_sample_resume_is_mostly_complete() {
        let report = compute_completeness_report(&sample_content());
        assert!(report.overall_score >= 60, "got {}", report.overall_score);
        assert!(report.overall_score <= 100);
        assert!(report.missing_sections.is_empty());
        assert_eq!(section(&report, "personal_info").status, SectionStatus::Strong);
        assert_eq!(section(&report, "education").status, SectionStatus::Strong);
    }

    #[test]
    fn test_unquantified_highlights_recommended() {
        let report = compute_completeness_report(&sample_content());
        let experience = section(&report, "experience");
        assert!(experience
            .recommendations
            .iter()
            .any(|r| r.contains("1 experience highlights lack measurable outcomes")));
    }

    #[test]
    fn test_personal_info_recommends_missing_fields() {
        let mut content = sample_content();
        content.personal_info.phone = None;
        let report = compute_completeness_report(&content);
        let personal = section(&report, "personal_info");
        assert!(personal.score < 1.0);
        assert!(personal
            .recommendations
            .contains(&"Add your phone number".to_string()));
    }

    #[test]
    fn test_status_thresholds() {
        assert_eq!(status_for(0.85), SectionStatus::Strong);
        assert_eq!(status_for(0.5), SectionStatus::Moderate);
        assert_eq!(status_for(0.1), SectionStatus::Weak);
        assert_eq!(status_for(0.0), SectionStatus::Missing);
    }
}
