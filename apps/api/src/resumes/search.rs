//! Naive in-memory inverted index over a user's resumes.
//!
//! Built per request; a user has at most a few dozen resumes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

const TITLE_WEIGHT: u32 = 3;
const BODY_WEIGHT: u32 = 1;

pub struct SearchDocument<'a> {
    pub id: Uuid,
    pub title: &'a str,
    pub body: &'a str,
    pub updated_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct SearchIndex {
    /// token -> (doc id -> weighted term frequency)
    postings: HashMap<String, HashMap<Uuid, u32>>,
    updated_at: HashMap<Uuid, DateTime<Utc>>,
}

/// Lowercased alphanumeric runs. `+` and `#` are kept so "c++" and "c#" survive.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '+' || c == '#'))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

impl SearchIndex {
    pub fn build<'a>(documents: impl IntoIterator<Item = SearchDocument<'a>>) -> Self {
        let mut index = SearchIndex::default();
        for doc in documents {
            index.updated_at.insert(doc.id, doc.updated_at);
            for (text, weight) in [(doc.title, TITLE_WEIGHT), (doc.body, BODY_WEIGHT)] {
                for token in tokenize(text) {
                    *index
                        .postings
                        .entry(token)
                        .or_default()
                        .entry(doc.id)
                        .or_insert(0) += weight;
                }
            }
        }
        index
    }

    /// Ids matching every query term by prefix, best first; ties go to the most recently updated.
    pub fn search(&self, query: &str) -> Vec<Uuid> {
        let terms = tokenize(query);
        if terms.is_empty() {
            return Vec::new();
        }

        let mut scores: Option<HashMap<Uuid, u32>> = None;
        for term in &terms {
            let mut term_scores: HashMap<Uuid, u32> = HashMap::new();
            for (token, docs) in &self.postings {
                if token.starts_with(term.as_str()) {
                    for (id, weight) in docs {
                        *term_scores.entry(*id).or_insert(0) += weight;
                    }
                }
            }

            scores = Some(match scores {
                None => term_scores,
                Some(acc) => acc
                    .into_iter()
                    .filter_map(|(id, score)| term_scores.get(&id).map(|s| (id, score + s)))
                    .collect(),
            });
        }

        let mut ranked: Vec<(Uuid, u32)> = scores.unwrap_or_default().into_iter().collect();
        ranked.sort_by(|(a_id, a), (b_id, b)| {
            b.cmp(a)
                .then_with(|| self.updated_at.get(b_id).cmp(&self.updated_at.get(a_id)))
        });
        ranked.into_iter().map(|(id, _)| id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn doc<'a>(id: Uuid, title: &'a str, body: &'a str, age_days: i64) -> SearchDocument<'a> {
        SearchDocument {
            id,
            title,
            body,
            updated_at: Utc::now() - Duration::days(age_days),
        }
    }

    #[test]
    fn test_tokenize_keeps_language_names() {
        assert_eq!(tokenize("C++, C# and Rust!"), vec!["c++", "c#", "and", "rust"]);
    }

    #[test]
    fn test_title_hits_outrank_body_hits() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let index = SearchIndex::build([
            doc(a, "General", "rust backend rust", 0),
            doc(b, "Rust Engineer", "backend", 5),
        ]);
        assert_eq!(index.search("rust"), vec![b, a]);
    }

    #[test]
    fn test_prefix_matching() {
        let a = Uuid::new_v4();
        let index = SearchIndex::build([doc(a, "Kubernetes Platform", "", 0)]);
        assert_eq!(index.search("kube"), vec![a]);
        assert!(index.search("netes").is_empty());
    }

    #[test]
    fn test_all_terms_must_match() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let index = SearchIndex::build([
            doc(a, "Data", "python spark", 0),
            doc(b, "Data", "python django", 0),
        ]);
        assert_eq!(index.search("python spark"), vec![a]);
    }

    #[test]
    fn test_ties_broken_by_recency() {
        let old = Uuid::new_v4();
        let new = Uuid::new_v4();
        let index = SearchIndex::build([doc(old, "Resume", "", 10), doc(new, "Resume", "", 1)]);
        assert_eq!(index.search("resume"), vec![new, old]);
    }

    #[test]
    fn test_empty_query_matches_nothing() {
        let index = SearchIndex::build([doc(Uuid::new_v4(), "Resume", "", 0)]);
        assert!(index.search("  ,, ").is_empty());
    }
}
