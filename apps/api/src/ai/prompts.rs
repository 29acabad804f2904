// Prompt constants for resume suggestions and LLM-assisted ATS scoring.
// Placeholders in `{braces}` are substituted by `fill_template` before sending.

use crate::llm_client::prompts::JSON_ONLY_SYSTEM;

/// Substitutes `{name}` placeholders in one left-to-right pass.
///
/// Inserted values are never rescanned, so user text containing `{resume}` stays literal.
/// Braces that do not name a known placeholder (the JSON schema lines) are kept as is.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        let value = tail.find('}').and_then(|close| {
            let name = &tail[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &tail[close + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn suggestion_system() -> String {
    format!(
        "You are an experienced resume writer who helps candidates describe their work \
        clearly and concretely. {JSON_ONLY_SYSTEM}"
    )
}

pub fn ats_system() -> String {
    format!(
        "You are an applicant tracking system analyst. You compare a resume against a job \
        description the way a recruiter's screening software and a hiring manager would. \
        {JSON_ONLY_SYSTEM}"
    )
}

pub const SUGGESTION_PROMPT_TEMPLATE: &str = r#"Task: {task}

Target job title: {job_title}

Additional context from the user:
{context}

Current resume (plain text):
{resume}

Return a JSON object with this EXACT schema:
{"suggestions": ["...", "..."]}

Rules:
- Return between 3 and 5 suggestions.
- Each suggestion is a single, self-contained string with no numbering or bullet characters.
- Start experience and project bullets with a strong action verb.
- {truthfulness}"#;

pub const SUMMARY_TASK: &str =
    "Write alternative professional summaries of 2-3 sentences each, tailored to the target job title.";
pub const EXPERIENCE_BULLETS_TASK: &str =
    "Write achievement-focused bullet points for the experience described in the context.";
pub const SKILLS_TASK: &str =
    "Suggest individual skills (one skill name per suggestion) that fit the target job title and are supported by the resume.";
pub const PROJECT_DESCRIPTION_TASK: &str =
    "Write alternative one-to-two sentence descriptions for the project described in the context.";

pub const ATS_PROMPT_TEMPLATE: &str = r#"Evaluate how well this resume matches the job description.

Job description:
{job_description}

Resume (plain text):
{resume}

Return a JSON object with this EXACT schema:
{"score": 0, "strengths": ["..."], "improvements": ["..."]}

Rules:
- "score" is an integer from 0 to 100 estimating how likely the resume passes ATS screening for this role.
- Give at most 5 strengths and at most 5 improvements, each one sentence.
- Improvements must be specific and actionable, e.g. which keyword to add to which section."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_template_single_pass() {
        let filled = fill_template(
            "A: {a}\nB: {b}",
            &[("a", "see {b} and {a}"), ("b", "bee")],
        );
        assert_eq!(filled, "A: see {b} and {a}\nB: bee");
    }

    #[test]
    fn test_fill_template_keeps_unknown_braces() {
        let filled = fill_template(r#"{"score": 0} {x} {"#, &[("x", "1")]);
        assert_eq!(filled, r#"{"score": 0} 1 {"#);
    }
}
