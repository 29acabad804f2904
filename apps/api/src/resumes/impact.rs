//! Impact check for achievement highlights: does a bullet carry a measurable outcome?

use serde::{Deserialize, Serialize};

use crate::resumes::search::tokenize;

/// Marker a user can append when a metric genuinely does not exist.
pub const LOW_METRICS_MARKER: &str = "[LOW_METRICS]";

const VAGUE_VERBS: &[&str] = &[
    "improved",
    "enhanced",
    "helped",
    "worked on",
    "assisted",
    "supported",
    "participated",
    "involved",
    "responsible for",
];

const VAGUE_SCALE_WORDS: &[&str] = &[
    "significant",
    "major",
    "large",
    "huge",
    "massive",
    "substantial",
    "considerable",
    "great",
    "many",
    "numerous",
    "various",
    "several",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "word", rename_all = "snake_case")]
pub enum WeaknessKind {
    VagueVerb(String),
    VagueScale(String),
    NoMetric,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeakHighlight {
    pub highlight: String,
    pub weakness: WeaknessKind,
    pub suggestion: String,
}

/// A highlight passes with a digit, %, a currency sign, or the low-metrics marker.
pub fn is_quantified(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
        || text.contains(LOW_METRICS_MARKER)
        || text.contains('%')
        || text.contains('$')
        || text.contains('€')
        || text.contains('£')
}

/// First needle that occurs as whole words; multi-word needles must appear in sequence.
fn first_match<'a>(tokens: &[String], needles: &[&'a str]) -> Option<&'a str> {
    needles.iter().copied().find(|needle| {
        let words: Vec<&str> = needle.split(' ').collect();
        tokens
            .windows(words.len())
            .any(|window| window.iter().zip(&words).all(|(t, w)| t == w))
    })
}

/// Returns `None` when the highlight is quantified, otherwise the first weakness found.
pub fn check_highlight(text: &str) -> Option<WeakHighlight> {
    if is_quantified(text) {
        return None;
    }

    let tokens = tokenize(text);
    let (weakness, suggestion) = if let Some(verb) = first_match(&tokens, VAGUE_VERBS) {
        (
            WeaknessKind::VagueVerb(verb.to_string()),
            format!("Say how much: '{verb}' by what percentage, amount, or time saved?"),
        )
    } else if let Some(word) = first_match(&tokens, VAGUE_SCALE_WORDS) {
        (
            WeaknessKind::VagueScale(word.to_string()),
            format!("Replace '{word}' with a concrete number, e.g. '5x', '40%', '3 weeks'."),
        )
    } else {
        (
            WeaknessKind::NoMetric,
            format!(
                "Add a measurable outcome (number, %, time) or append {LOW_METRICS_MARKER} if none exists."
            ),
        )
    };

    Some(WeakHighlight {
        highlight: text.to_string(),
        weakness,
        suggestion,
    })
}

/// Weak highlights among `highlights`, in order.
pub fn weak_highlights<'a, I>(highlights: I) -> Vec<WeakHighlight>
where
    I: IntoIterator<Item = &'a str>,
{
    highlights.into_iter().filter_map(check_highlight).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_passes() {
        assert!(check_highlight("Reduced latency by 40% through caching").is_none());
    }

    #[test]
    fn test_currency_passes() {
        assert!(check_highlight("Saved $50,000 annually by tuning queries").is_none());
        assert!(check_highlight("Generated €200k in new revenue").is_none());
    }

    #[test]
    fn test_count_passes() {
        assert!(check_highlight("Trained 15 engineers on the new release process").is_none());
    }

    #[test]
    fn test_low_metrics_marker_passes() {
        assert!(check_highlight("Improved onboarding docs [LOW_METRICS]").is_none());
    }

    #[test]
    fn test_vague_verb_flagged() {
        let weak = check_highlight("Improved the user experience").unwrap();
        assert_eq!(weak.weakness, WeaknessKind::VagueVerb("improved".to_string()));
        assert!(weak.suggestion.contains("improved"));
    }

    #[test]
    fn test_responsible_for_flagged() {
        let weak = check_highlight("Responsible for the billing service").unwrap();
        assert!(matches!(weak.weakness, WeaknessKind::VagueVerb(_)));
    }

    #[test]
    fn test_vague_scale_flagged() {
        let weak = check_highlight("Delivered significant performance gains").unwrap();
        assert_eq!(weak.weakness, WeaknessKind::VagueScale("significant".to_string()));
    }

    #[test]
    fn test_words_match_whole_tokens_only() {
        let weak = check_highlight("Relocated the platform team to the Germany office").unwrap();
        assert_eq!(weak.weakness, WeaknessKind::NoMetric);

        let weak = check_highlight("Unsupported legacy endpoints were retired").unwrap();
        assert_eq!(weak.weakness, WeaknessKind::NoMetric);
    }

    #[test]
    fn test_multi_word_phrase_needs_sequence() {
        let weak = check_highlight("Worked closely on the parser").unwrap();
        assert_eq!(weak.weakness, WeaknessKind::NoMetric);
        let weak = check_highlight("Worked on the parser").unwrap();
        assert_eq!(weak.weakness, WeaknessKind::VagueVerb("worked on".to_string()));
    }

    #[test]
    fn test_no_metric_flagged() {
        let weak = check_highlight("Architected the authentication system").unwrap();
        assert_eq!(weak.weakness, WeaknessKind::NoMetric);
    }

    #[test]
    fn test_weak_highlights_filters() {
        let weak = weak_highlights(["Cut costs by 30%", "Helped the team", "Led 4 launches"]);
        assert_eq!(weak.len(), 1);
        assert_eq!(weak[0].highlight, "Helped the team");
    }

    #[test]
    fn test_weak_highlights_empty() {
        assert!(weak_highlights(Vec::<&str>::new()).is_empty());
    }

    #[test]
    fn test_weakness_serializes_tagged() {
        let json = serde_json::to_value(WeaknessKind::VagueScale("major".to_string())).unwrap();
        assert_eq!(json["kind"], "vague_scale");
        assert_eq!(json["word"], "major");
    }
}
