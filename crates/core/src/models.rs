use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

pub type UserId = i64;

/// Inverted index from token to the paths whose relative path produced it.
///
/// Buckets keep discovery order from the tree walk that built them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenIndex {
    buckets: BTreeMap<String, Vec<String>>,
}

impl TokenIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, token: impl Into<String>, path: impl Into<String>) {
        self.buckets.entry(token.into()).or_default().push(path.into());
    }

    pub fn bucket(&self, token: &str) -> &[String] {
        self.buckets.get(token).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.buckets.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.buckets
            .iter()
            .map(|(token, paths)| (token.as_str(), paths.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

impl<T, P> FromIterator<(T, Vec<P>)> for TokenIndex
where
    T: Into<String>,
    P: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (T, Vec<P>)>>(iter: I) -> Self {
        let mut index = TokenIndex::new();
        for (token, paths) in iter {
            let token = token.into();
            for path in paths {
                index.insert(token.clone(), path);
            }
        }
        index
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of searching a single keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeywordSearch {
    Matches(Vec<String>),
    /// The keyword's own bucket exceeded the broad-query threshold.
    TooBroad { total: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeywordHits {
    pub keyword: String,
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchReport {
    pub hits: Vec<KeywordHits>,
    pub too_broad: Vec<String>,
}

impl SearchReport {
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.hits
            .iter()
            .flat_map(|hit| hit.paths.iter().map(String::as_str))
    }

    pub fn is_empty(&self) -> bool {
        self.hits.iter().all(|hit| hit.paths.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClarificationPrompt {
    /// Distinct canonical terms, in first-seen order.
    pub terms: Vec<String>,
    /// The same terms rendered for the user's language.
    pub display_terms: Vec<String>,
    pub confidence: Confidence,
}

impl ClarificationPrompt {
    pub fn is_rephrase(&self) -> bool {
        self.terms.is_empty()
    }
}

impl fmt::Display for ClarificationPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_rephrase() {
            return f.write_str("Could not recognise what to look for. Please rephrase the request.");
        }
        write!(
            f,
            "Did you mean: {}? Reply yes to search or no to cancel.",
            self.display_terms.join(", ")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Resolution {
    Found(SearchReport),
    Clarify(ClarificationPrompt),
    TooBroad { keywords: Vec<String> },
    NoResults {
        keywords: Vec<String>,
        suggestions: Vec<String>,
    },
    /// The user answered a clarification prompt with anything but yes.
    Declined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    Completed { keywords: usize, images: usize },
    AlreadyRunning,
}

impl BuildOutcome {
    pub fn started(&self) -> bool {
        matches!(self, BuildOutcome::Completed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexStatus {
    pub keyword_count: usize,
    pub last_built: Option<DateTime<Utc>>,
    pub builds: u64,
}

impl fmt::Display for IndexStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let last = self
            .last_built
            .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());
        write!(f, "keywords: {}\nlast update: {}", self.keyword_count, last)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildRequest {
    Started { keywords: usize, images: usize },
    AlreadyRunning,
    CoolingDown { remaining: Duration },
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_index_keeps_bucket_order() {
        let mut index = TokenIndex::new();
        index.insert("oak", "b.jpg");
        index.insert("oak", "a.jpg");
        index.insert("maple", "c.jpg");

        assert_eq!(index.bucket("oak"), ["b.jpg", "a.jpg"]);
        assert_eq!(index.bucket("walnut").len(), 0);
        assert_eq!(index.tokens().collect::<Vec<_>>(), vec!["maple", "oak"]);
    }

    #[test]
    fn token_index_serializes_as_plain_map() -> Result<(), serde_json::Error> {
        let index: TokenIndex = [("oak", vec!["/share/oak.jpg"])].into_iter().collect();
        let json = serde_json::to_string(&index)?;
        assert_eq!(json, r#"{"oak":["/share/oak.jpg"]}"#);
        Ok(())
    }

    #[test]
    fn status_reports_never_before_first_build() {
        let status = IndexStatus {
            keyword_count: 0,
            last_built: None,
            builds: 0,
        };
        assert!(status.to_string().ends_with("never"));
    }

    #[test]
    fn rephrase_prompt_has_no_terms() {
        let prompt = ClarificationPrompt {
            terms: Vec::new(),
            display_terms: Vec::new(),
            confidence: Confidence::Low,
        };
        assert!(prompt.is_rephrase());
        assert!(prompt.to_string().contains("rephrase"));
    }
}
