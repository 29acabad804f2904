//! Display-ready projection of `ResumeContent`: dates formatted, optional
//! fields flattened to strings so templates stay logic-free.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::resumes::content::{parse_month, ResumeContent};

#[derive(Debug, Default, Serialize)]
pub struct PersonalView {
    pub name: String,
    pub job_title: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub website: String,
    pub linkedin: String,
    pub github: String,
    pub summary: String,
}

#[derive(Debug, Serialize)]
pub struct ExperienceView {
    pub position: String,
    pub company: String,
    pub location: String,
    pub period: String,
    pub description: String,
    pub highlights: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct EducationView {
    pub degree: String,
    pub institution: String,
    pub location: String,
    pub period: String,
    pub gpa: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct SkillView {
    pub name: String,
    pub level: String,
    pub level_percent: u8,
}

#[derive(Debug, Serialize)]
pub struct SkillGroup {
    pub category: String,
    pub skills: Vec<SkillView>,
    pub names: String,
}

#[derive(Debug, Serialize)]
pub struct ProjectView {
    pub name: String,
    pub url: String,
    pub description: String,
    pub technologies: String,
    pub period: String,
    pub highlights: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CertificationView {
    pub name: String,
    pub issuer: String,
    pub period: String,
    pub credential_id: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct HobbyView {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct ResumeView {
    pub title: String,
    pub personal: PersonalView,
    pub experience: Vec<ExperienceView>,
    pub education: Vec<EducationView>,
    pub skill_groups: Vec<SkillGroup>,
    pub projects: Vec<ProjectView>,
    pub certifications: Vec<CertificationView>,
    pub hobbies: Vec<HobbyView>,
}

/// `2021-03` -> `Mar 2021`. Unparseable input is shown as given.
pub fn format_month(value: &str) -> String {
    parse_month(value)
        .map(|d| d.format("%b %Y").to_string())
        .unwrap_or_else(|| value.to_string())
}

pub fn format_period(start: Option<&str>, end: Option<&str>, current: bool) -> String {
    let start = start.map(format_month);
    let end = if current {
        Some("Present".to_string())
    } else {
        end.map(format_month)
    };
    match (start, end) {
        (Some(s), Some(e)) => format!("{s} - {e}"),
        (Some(s), None) => s,
        (None, Some(e)) => e,
        (None, None) => String::new(),
    }
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

impl ResumeView {
    pub fn new(title: &str, content: &ResumeContent) -> Self {
        let p = &content.personal_info;
        let personal = PersonalView {
            name: p.full_name.clone(),
            job_title: text(&p.job_title),
            email: text(&p.email),
            phone: text(&p.phone),
            location: text(&p.location),
            website: text(&p.website),
            linkedin: text(&p.linkedin),
            github: text(&p.github),
            summary: text(&p.summary),
        };

        let experience = content
            .experience
            .iter()
            .map(|e| ExperienceView {
                position: e.position.clone(),
                company: e.company.clone(),
                location: text(&e.location),
                period: format_period(Some(e.start_date.as_str()), e.end_date.as_deref(), e.current),
                description: text(&e.description),
                highlights: e.highlights.clone(),
            })
            .collect();

        let education = content
            .education
            .iter()
            .map(|e| EducationView {
                degree: match &e.field_of_study {
                    Some(field) => format!("{} in {}", e.degree, field),
                    None => e.degree.clone(),
                },
                institution: e.institution.clone(),
                location: text(&e.location),
                period: format_period(Some(e.start_date.as_str()), e.end_date.as_deref(), false),
                gpa: text(&e.gpa),
                description: text(&e.description),
            })
            .collect();

        // Uncategorized skills go under "Skills"; categories keep first-seen order.
        let mut order: Vec<String> = Vec::new();
        let mut groups: BTreeMap<String, Vec<SkillView>> = BTreeMap::new();
        for s in &content.skills {
            let category = s
                .category
                .clone()
                .unwrap_or_else(|| "Skills".to_string());
            if !groups.contains_key(&category) {
                order.push(category.clone());
            }
            groups.entry(category).or_default().push(SkillView {
                name: s.name.clone(),
                level: s.level.label().to_string(),
                level_percent: s.level.rank() * 25,
            });
        }
        let skill_groups = order
            .into_iter()
            .filter_map(|category| {
                groups.remove(&category).map(|skills| SkillGroup {
                    names: skills
                        .iter()
                        .map(|s| s.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                    category,
                    skills,
                })
            })
            .collect();

        let projects = content
            .projects
            .iter()
            .map(|p| ProjectView {
                name: p.name.clone(),
                url: text(&p.url),
                description: text(&p.description),
                technologies: p.technologies.join(", "),
                period: format_period(p.start_date.as_deref(), p.end_date.as_deref(), false),
                highlights: p.highlights.clone(),
            })
            .collect();

        let certifications = content
            .certifications
            .iter()
            .map(|c| CertificationView {
                name: c.name.clone(),
                issuer: c.issuer.clone(),
                period: format_period(c.issue_date.as_deref(), c.expiry_date.as_deref(), false),
                credential_id: text(&c.credential_id),
                url: text(&c.url),
            })
            .collect();

        let hobbies = content
            .hobbies
            .iter()
            .map(|h| HobbyView {
                name: h.name.clone(),
                description: text(&h.description),
            })
            .collect();

        ResumeView {
            title: title.to_string(),
            personal,
            experience,
            education,
            skill_groups,
            projects,
            certifications,
            hobbies,
        }
    }

    /// Non-empty contact fields in display order.
    pub fn contact_items(&self) -> Vec<&str> {
        let p = &self.personal;
        [
            &p.email,
            &p.phone,
            &p.location,
            &p.website,
            &p.linkedin,
            &p.github,
        ]
        .into_iter()
        .map(String::as_str)
        .filter(|s| !s.is_empty())
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resumes::content::sample_content;

    #[test]
    fn test_format_period_current() {
        assert_eq!(format_period(Some("2021-03"), None, true), "Mar 2021 - Present");
    }

    #[test]
    fn test_format_period_closed_and_partial() {
        assert_eq!(
            format_period(Some("2014-09"), Some("2017-06"), false),
            "Sep 2014 - Jun 2017"
        );
        assert_eq!(format_period(None, Some("2020-01"), false), "Jan 2020");
        assert_eq!(format_period(None, None, false), "");
    }

    #[test]
    fn test_skill_groups_keep_first_seen_order() {
        let view = ResumeView::new("CV", &sample_content());
        let categories: Vec<&str> = view
            .skill_groups
            .iter()
            .map(|g| g.category.as_str())
            .collect();
        assert_eq!(categories, vec!["Languages", "Databases"]);
        assert_eq!(view.skill_groups[0].skills[0].level_percent, 100);
    }

    #[test]
    fn test_degree_includes_field() {
        let view = ResumeView::new("CV", &sample_content());
        assert_eq!(view.education[0].degree, "BSc in Mathematics");
    }

    #[test]
    fn test_contact_items_skip_empty() {
        let view = ResumeView::new("CV", &sample_content());
        let items = view.contact_items();
        assert!(items.contains(&"ada@example.com"));
        assert_eq!(items.len(), 5);
    }
}
