//! Non-HTML export formats. Plain text is laid out for ATS parsers: no
//! columns, no decoration, one fact per line.

use std::fmt::Write;
use std::str::FromStr;

use crate::errors::AppError;
use crate::render::view::ResumeView;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Html,
    Markdown,
    Text,
    Json,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Html => "text/html; charset=utf-8",
            ExportFormat::Markdown => "text/markdown; charset=utf-8",
            ExportFormat::Text => "text/plain; charset=utf-8",
            ExportFormat::Json => "application/json",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Html => "html",
            ExportFormat::Markdown => "md",
            ExportFormat::Text => "txt",
            ExportFormat::Json => "json",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Html => "html",
            ExportFormat::Markdown => "markdown",
            ExportFormat::Text => "text",
            ExportFormat::Json => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" => Ok(ExportFormat::Html),
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            "text" | "txt" => Ok(ExportFormat::Text),
            "json" => Ok(ExportFormat::Json),
            other => Err(AppError::Validation(format!(
                "Unsupported export format '{other}'. Use html, markdown, text or json"
            ))),
        }
    }
}

/// `My Resume (2024)` -> `my-resume-2024`. Never empty.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug: String = slug.chars().take(80).collect();
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "resume".to_string()
    } else {
        slug.to_string()
    }
}

pub fn export_filename(title: &str, format: ExportFormat) -> String {
    format!("{}.{}", slugify(title), format.extension())
}

pub fn to_markdown(resume: &ResumeView) -> String {
    let mut out = String::new();
    let p = &resume.personal;

    let _ = writeln!(out, "# {}", p.name);
    if !p.job_title.is_empty() {
        let _ = writeln!(out, "\n**{}**", p.job_title);
    }
    let contact = resume.contact_items();
    if !contact.is_empty() {
        let _ = writeln!(out, "\n{}", contact.join(" | "));
    }

    if !p.summary.is_empty() {
        let _ = writeln!(out, "\n## Summary\n\n{}", p.summary);
    }

    if !resume.experience.is_empty() {
        out.push_str("\n## Experience\n");
        for job in &resume.experience {
            let _ = writeln!(out, "\n### {} - {}", job.position, job.company);
            let meta = join_non_empty(&[&job.period, &job.location], " | ");
            if !meta.is_empty() {
                let _ = writeln!(out, "\n*{meta}*");
            }
            if !job.description.is_empty() {
                let _ = writeln!(out, "\n{}", job.description);
            }
            bullet_list(&mut out, &job.highlights);
        }
    }

    if !resume.education.is_empty() {
        out.push_str("\n## Education\n");
        for school in &resume.education {
            let _ = writeln!(out, "\n### {} - {}", school.degree, school.institution);
            let meta = join_non_empty(&[&school.period, &school.location], " | ");
            if !meta.is_empty() {
                let _ = writeln!(out, "\n*{meta}*");
            }
            if !school.gpa.is_empty() {
                let _ = writeln!(out, "\nGPA: {}", school.gpa);
            }
            if !school.description.is_empty() {
                let _ = writeln!(out, "\n{}", school.description);
            }
        }
    }

    if !resume.skill_groups.is_empty() {
        out.push_str("\n## Skills\n\n");
        for group in &resume.skill_groups {
            let _ = writeln!(out, "- **{}:** {}", group.category, group.names);
        }
    }

    if !resume.projects.is_empty() {
        out.push_str("\n## Projects\n");
        for project in &resume.projects {
            if project.url.is_empty() {
                let _ = writeln!(out, "\n### {}", project.name);
            } else {
                let _ = writeln!(out, "\n### [{}]({})", project.name, project.url);
            }
            let meta = join_non_empty(&[&project.period, &project.technologies], " | ");
            if !meta.is_empty() {
                let _ = writeln!(out, "\n*{meta}*");
            }
            if !project.description.is_empty() {
                let _ = writeln!(out, "\n{}", project.description);
            }
            bullet_list(&mut out, &project.highlights);
        }
    }

    if !resume.certifications.is_empty() {
        out.push_str("\n## Certifications\n\n");
        for cert in &resume.certifications {
            let detail = join_non_empty(&[&cert.issuer, &cert.period], ", ");
            let _ = writeln!(out, "- **{}** ({detail})", cert.name);
        }
    }

    if !resume.hobbies.is_empty() {
        out.push_str("\n## Interests\n\n");
        for hobby in &resume.hobbies {
            if hobby.description.is_empty() {
                let _ = writeln!(out, "- {}", hobby.name);
            } else {
                let _ = writeln!(out, "- {}: {}", hobby.name, hobby.description);
            }
        }
    }

    out
}

pub fn to_plain_text(resume: &ResumeView) -> String {
    let mut out = String::new();
    let p = &resume.personal;

    let _ = writeln!(out, "{}", p.name);
    if !p.job_title.is_empty() {
        let _ = writeln!(out, "{}", p.job_title);
    }
    for item in resume.contact_items() {
        let _ = writeln!(out, "{item}");
    }

    if !p.summary.is_empty() {
        heading(&mut out, "SUMMARY");
        let _ = writeln!(out, "{}", p.summary);
    }

    if !resume.experience.is_empty() {
        heading(&mut out, "EXPERIENCE");
        for (i, job) in resume.experience.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let _ = writeln!(out, "{}", job.position);
            let _ = writeln!(out, "{}", join_non_empty(&[&job.company, &job.location], ", "));
            if !job.period.is_empty() {
                let _ = writeln!(out, "{}", job.period);
            }
            if !job.description.is_empty() {
                let _ = writeln!(out, "{}", job.description);
            }
            for highlight in &job.highlights {
                let _ = writeln!(out, "- {highlight}");
            }
        }
    }

    if !resume.education.is_empty() {
        heading(&mut out, "EDUCATION");
        for school in &resume.education {
            let _ = writeln!(out, "{}", school.degree);
            let _ = writeln!(
                out,
                "{}",
                join_non_empty(&[&school.institution, &school.location], ", ")
            );
            if !school.period.is_empty() {
                let _ = writeln!(out, "{}", school.period);
            }
            if !school.gpa.is_empty() {
                let _ = writeln!(out, "GPA: {}", school.gpa);
            }
        }
    }

    if !resume.skill_groups.is_empty() {
        heading(&mut out, "SKILLS");
        for group in &resume.skill_groups {
            let _ = writeln!(out, "{}: {}", group.category, group.names);
        }
    }

    if !resume.projects.is_empty() {
        heading(&mut out, "PROJECTS");
        for project in &resume.projects {
            let _ = writeln!(out, "{}", project.name);
            for line in [&project.url, &project.period, &project.technologies, &project.description] {
                if !line.is_empty() {
                    let _ = writeln!(out, "{line}");
                }
            }
            for highlight in &project.highlights {
                let _ = writeln!(out, "- {highlight}");
            }
        }
    }

    if !resume.certifications.is_empty() {
        heading(&mut out, "CERTIFICATIONS");
        for cert in &resume.certifications {
            let _ = writeln!(
                out,
                "{}",
                join_non_empty(&[&cert.name, &cert.issuer, &cert.period], ", ")
            );
        }
    }

    if !resume.hobbies.is_empty() {
        heading(&mut out, "INTERESTS");
        let names: Vec<&str> = resume.hobbies.iter().map(|h| h.name.as_str()).collect();
        let _ = writeln!(out, "{}", names.join(", "));
    }

    out
}

fn heading(out: &mut String, title: &str) {
    let _ = writeln!(out, "\n{title}");
}

fn bullet_list(out: &mut String, items: &[String]) {
    if items.is_empty() {
        return;
    }
    out.push('\n');
    for item in items {
        let _ = writeln!(out, "- {item}");
    }
}

fn join_non_empty(parts: &[&String], sep: &str) -> String {
    parts
        .iter()
        .filter(|s| !s.is_empty())
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(sep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resumes::content::{sample_content, ResumeContent};

    #[test]
    fn test_format_parsing() {
        assert_eq!("HTML".parse::<ExportFormat>().unwrap(), ExportFormat::Html);
        assert_eq!("md".parse::<ExportFormat>().unwrap(), ExportFormat::Markdown);
        assert_eq!("text".parse::<ExportFormat>().unwrap(), ExportFormat::Text);
        assert!("pdf".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("My Resume (2024)"), "my-resume-2024");
        assert_eq!(slugify("  --  "), "resume");
        assert_eq!(slugify("Ünïcode CV"), "n-code-cv");
        assert_eq!(export_filename("Backend CV", ExportFormat::Markdown), "backend-cv.md");
    }

    #[test]
    fn test_markdown_contains_sections() {
        let view = ResumeView::new("CV", &sample_content());
        let md = to_markdown(&view);
        assert!(md.starts_with("# Ada Lovelace"));
        assert!(md.contains("## Experience"));
        assert!(md.contains("Present"));
        assert!(md.contains("- **Languages:**"));
    }

    #[test]
    fn test_plain_text_has_no_markup() {
        let view = ResumeView::new("CV", &sample_content());
        let text = to_plain_text(&view);
        assert!(text.contains("EXPERIENCE"));
        assert!(!text.contains('#'));
        assert!(!text.contains("**"));
    }

    #[test]
    fn test_empty_sections_are_omitted() {
        let mut content = ResumeContent::default();
        content.personal_info.full_name = "Solo".to_string();
        let view = ResumeView::new("CV", &content);
        assert_eq!(to_markdown(&view), "# Solo\n");
        assert_eq!(to_plain_text(&view), "Solo\n");
    }
}
