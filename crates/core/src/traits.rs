use crate::ServiceError;
use async_trait::async_trait;
use std::collections::HashMap;

/// Turns free text into candidate keywords. `known` is the current index
/// vocabulary, offered as a hint.
#[async_trait]
pub trait KeywordExtractor {
    async fn extract(&self, text: &str, known: &[String]) -> Result<Vec<String>, ServiceError>;
}

/// Looks up synonyms and translations for a batch of terms.
#[async_trait]
pub trait TermExpander {
    async fn synonyms(
        &self,
        terms: &[String],
    ) -> Result<HashMap<String, Vec<String>>, ServiceError>;
}
