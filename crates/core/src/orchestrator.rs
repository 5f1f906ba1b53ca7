use crate::extractor::fallback_keywords;
use crate::synonyms::display_keyword;
use crate::tokenizer::sanitize_query;
use crate::traits::KeywordExtractor;
use crate::{
    BuildOutcome, ClarificationPrompt, Confidence, IndexStatus, IndexStore, RebuildRequest,
    Resolution, ResolverConfig, SearchEngine, TokenIndex, UserId,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
struct PendingQuery {
    keywords: Vec<String>,
    text: String,
    created_at: Instant,
}

/// Turns a user's message into search results or a clarification prompt.
///
/// A user is either in the normal state or awaiting clarification. While a
/// prompt is outstanding the user's next message is read as a yes/no answer
/// and the pending entry is removed whatever the answer is. Entries older than
/// the configured TTL are dropped and the message is handled as a new query.
pub struct QueryResolver<E>
where
    E: KeywordExtractor,
{
    store: Arc<IndexStore>,
    engine: SearchEngine,
    extractor: E,
    config: ResolverConfig,
    pending: Mutex<HashMap<UserId, PendingQuery>>,
    rebuilds: Mutex<HashMap<UserId, Instant>>,
}

impl<E> QueryResolver<E>
where
    E: KeywordExtractor + Send + Sync,
{
    pub fn new(
        store: Arc<IndexStore>,
        engine: SearchEngine,
        extractor: E,
        config: ResolverConfig,
    ) -> Self {
        Self {
            store,
            engine,
            extractor,
            config,
            pending: Mutex::new(HashMap::new()),
            rebuilds: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn engine(&self) -> &SearchEngine {
        &self.engine
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    pub fn is_awaiting_clarification(&self, user_id: UserId) -> bool {
        self.pending
            .lock()
            .get(&user_id)
            .is_some_and(|entry| entry.created_at.elapsed() < self.config.pending_ttl)
    }

    pub async fn build_index(&self) -> bool {
        self.store.build_index().await
    }

    pub fn index_status(&self) -> IndexStatus {
        self.store.status()
    }

    pub async fn resolve(&self, text: &str, user_id: UserId) -> Resolution {
        if let Some(pending) = self.take_pending(user_id) {
            return self.answer(pending, text);
        }

        let query = sanitize_query(text);
        let index = self.store.snapshot();
        let keywords = self.extract_keywords(&query, &index).await;
        let confidence = self.engine.rate_confidence(&keywords);
        debug!(user_id, ?keywords, %confidence, "classified query");

        if confidence == Confidence::High {
            return self.run_search(&keywords, text, &index);
        }

        let terms = self.engine.canonical_terms(&keywords);
        let prompt = ClarificationPrompt {
            display_terms: terms
                .iter()
                .map(|term| display_keyword(term, &self.config.display_language))
                .collect(),
            terms,
            confidence,
        };

        if !prompt.is_rephrase() {
            self.pending.lock().insert(
                user_id,
                PendingQuery {
                    keywords,
                    text: text.to_string(),
                    created_at: Instant::now(),
                },
            );
        }

        Resolution::Clarify(prompt)
    }

    /// User-triggered rebuild, limited to one attempt per user per cooldown.
    pub async fn request_rebuild(&self, user_id: UserId) -> RebuildRequest {
        {
            let mut rebuilds = self.rebuilds.lock();
            let now = Instant::now();
            if let Some(last) = rebuilds.get(&user_id) {
                let elapsed = now.duration_since(*last);
                if elapsed < self.config.rebuild_cooldown {
                    return RebuildRequest::CoolingDown {
                        remaining: self.config.rebuild_cooldown - elapsed,
                    };
                }
            }
            rebuilds.insert(user_id, now);
        }

        info!(user_id, "forced index rebuild");
        match self.store.build().await {
            Ok(BuildOutcome::Completed { keywords, images }) => {
                RebuildRequest::Started { keywords, images }
            }
            Ok(BuildOutcome::AlreadyRunning) => RebuildRequest::AlreadyRunning,
            Err(error) => RebuildRequest::Failed(error.to_string()),
        }
    }

    async fn extract_keywords(&self, text: &str, index: &TokenIndex) -> Vec<String> {
        let known: Vec<String> = index.tokens().map(str::to_string).collect();
        match self.extractor.extract(text, &known).await {
            Ok(keywords) => keywords,
            Err(error) => {
                warn!(error = %error, "keyword extraction failed, matching known tokens instead");
                fallback_keywords(text, &known)
            }
        }
    }

    fn take_pending(&self, user_id: UserId) -> Option<PendingQuery> {
        let ttl = self.config.pending_ttl;
        let mut pending = self.pending.lock();
        pending.retain(|_, entry| entry.created_at.elapsed() < ttl);
        pending.remove(&user_id)
    }

    fn answer(&self, pending: PendingQuery, reply: &str) -> Resolution {
        let reply = reply.trim().to_lowercase();
        if !self.config.affirmative_answers.iter().any(|yes| *yes == reply) {
            return Resolution::Declined;
        }

        let index = self.store.snapshot();
        self.run_search(&pending.keywords, &pending.text, &index)
    }

    fn run_search(&self, keywords: &[String], query_text: &str, index: &TokenIndex) -> Resolution {
        let report = self.engine.search_keywords(keywords, index, query_text);
        if !report.is_empty() {
            return Resolution::Found(report);
        }
        if !report.too_broad.is_empty() {
            return Resolution::TooBroad {
                keywords: report.too_broad,
            };
        }

        let mut seen = HashSet::new();
        let suggestions = keywords
            .iter()
            .flat_map(|keyword| self.engine.suggest(keyword, index))
            .filter(|token| seen.insert(token.clone()))
            .take(self.engine.config().suggestion_limit)
            .collect();

        Resolution::NoResults {
            keywords: keywords.to_vec(),
            suggestions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IndexConfig, SearchConfig, ServiceError, SynonymStore};
    use async_trait::async_trait;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::tempdir;

    struct FakeExtractor {
        keywords: Vec<String>,
        calls: AtomicUsize,
    }

    impl FakeExtractor {
        fn new(keywords: &[&str]) -> Self {
            Self {
                keywords: keywords.iter().map(|word| word.to_string()).collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl KeywordExtractor for FakeExtractor {
        async fn extract(&self, _text: &str, _known: &[String]) -> Result<Vec<String>, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.keywords.clone())
        }
    }

    struct FailingExtractor;

    #[async_trait]
    impl KeywordExtractor for FailingExtractor {
        async fn extract(&self, _text: &str, _known: &[String]) -> Result<Vec<String>, ServiceError> {
            Err(ServiceError::NotConfigured)
        }
    }

    fn catalog() -> TokenIndex {
        [
            ("oak", vec!["share/oak/1.jpg", "share/oak/2.jpg"]),
            ("maple", vec!["share/maple/1.jpg"]),
            ("дошка", vec!["share/дошка/1.jpg"]),
        ]
        .into_iter()
        .collect()
    }

    fn resolver_with<E: KeywordExtractor + Send + Sync>(
        index: TokenIndex,
        extractor: E,
        config: ResolverConfig,
    ) -> QueryResolver<E> {
        let store = IndexStore::with_index(
            IndexConfig::new("/missing/share", "/missing/index.json"),
            index,
        );
        let synonyms = Arc::new(SynonymStore::new("/missing/synonyms.json"));
        let engine = SearchEngine::new(synonyms, SearchConfig::default());
        QueryResolver::new(Arc::new(store), engine, extractor, config)
    }

    fn paths(resolution: &Resolution) -> Vec<String> {
        match resolution {
            Resolution::Found(report) => report.paths().map(str::to_string).collect(),
            _ => Vec::new(),
        }
    }

    #[tokio::test]
    async fn single_term_searches_without_asking() {
        let resolver = resolver_with(
            catalog(),
            FakeExtractor::new(&["oak", "дуб"]),
            ResolverConfig::default(),
        );

        let resolution = resolver.resolve("oak or дуб", 1).await;
        assert_eq!(paths(&resolution), vec!["share/oak/1.jpg", "share/oak/2.jpg"]);
        assert!(!resolver.is_awaiting_clarification(1));
    }

    #[tokio::test]
    async fn affirmative_answer_replays_the_pending_search() {
        let resolver = resolver_with(
            catalog(),
            FakeExtractor::new(&["oak", "board"]),
            ResolverConfig::default(),
        );

        let first = resolver.resolve("oak board", 7).await;
        let Resolution::Clarify(prompt) = first else {
            panic!("expected a clarification prompt, got {first:?}");
        };
        assert_eq!(prompt.terms, vec!["oak", "board"]);
        assert_eq!(prompt.display_terms, vec!["дуб", "дошка"]);
        assert_eq!(prompt.confidence, Confidence::Medium);
        assert!(resolver.is_awaiting_clarification(7));

        let second = resolver.resolve("  Так ", 7).await;
        assert_eq!(
            paths(&second),
            vec!["share/oak/1.jpg", "share/oak/2.jpg", "share/дошка/1.jpg"]
        );
        assert!(!resolver.is_awaiting_clarification(7));
        assert_eq!(resolver.extractor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn negative_answer_returns_to_normal_without_searching() {
        let resolver = resolver_with(
            catalog(),
            FakeExtractor::new(&["oak", "board"]),
            ResolverConfig::default(),
        );

        assert!(matches!(resolver.resolve("oak board", 7).await, Resolution::Clarify(_)));
        assert_eq!(resolver.resolve("no", 7).await, Resolution::Declined);
        assert!(!resolver.is_awaiting_clarification(7));

        assert!(matches!(resolver.resolve("oak board", 7).await, Resolution::Clarify(_)));
        assert_eq!(resolver.extractor.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn pending_state_is_per_user() {
        let resolver = resolver_with(
            catalog(),
            FakeExtractor::new(&["oak", "board"]),
            ResolverConfig::default(),
        );

        resolver.resolve("oak board", 1).await;
        assert!(resolver.is_awaiting_clarification(1));
        assert!(!resolver.is_awaiting_clarification(2));

        assert!(matches!(resolver.resolve("yes", 2).await, Resolution::Clarify(_)));
        assert!(resolver.is_awaiting_clarification(1));
    }

    #[tokio::test]
    async fn expired_prompt_is_treated_as_new_query() {
        let config = ResolverConfig {
            pending_ttl: Duration::ZERO,
            ..ResolverConfig::default()
        };
        let resolver = resolver_with(catalog(), FakeExtractor::new(&["oak", "board"]), config);

        resolver.resolve("oak board", 3).await;
        assert!(!resolver.is_awaiting_clarification(3));

        assert!(matches!(resolver.resolve("yes", 3).await, Resolution::Clarify(_)));
        assert_eq!(resolver.extractor.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_extraction_asks_to_rephrase() {
        let resolver = resolver_with(catalog(), FakeExtractor::new(&[]), ResolverConfig::default());

        let resolution = resolver.resolve("???", 4).await;
        let Resolution::Clarify(prompt) = resolution else {
            panic!("expected a rephrase prompt, got {resolution:?}");
        };
        assert!(prompt.is_rephrase());
        assert_eq!(prompt.confidence, Confidence::Low);
        assert!(!resolver.is_awaiting_clarification(4));
    }

    #[tokio::test]
    async fn extractor_failure_falls_back_to_known_tokens() {
        let resolver = resolver_with(catalog(), FailingExtractor, ResolverConfig::default());

        let resolution = resolver.resolve("need Oak, 32 mm", 5).await;
        assert_eq!(paths(&resolution), vec!["share/oak/1.jpg", "share/oak/2.jpg"]);
    }

    #[tokio::test]
    async fn unmatched_keyword_reports_suggestions() {
        let resolver = resolver_with(
            catalog(),
            FakeExtractor::new(&["oakwood"]),
            ResolverConfig::default(),
        );

        let resolution = resolver.resolve("oakwood", 6).await;
        assert_eq!(
            resolution,
            Resolution::NoResults {
                keywords: vec!["oakwood".to_string()],
                suggestions: vec!["oak".to_string()],
            }
        );
    }

    #[tokio::test]
    async fn broad_keyword_asks_to_narrow() {
        let index: TokenIndex = [(
            "oak",
            (0..60).map(|n| format!("share/oak/{n}.jpg")).collect::<Vec<_>>(),
        )]
        .into_iter()
        .collect();
        let resolver = resolver_with(index, FakeExtractor::new(&["oak"]), ResolverConfig::default());

        assert_eq!(
            resolver.resolve("oak", 8).await,
            Resolution::TooBroad {
                keywords: vec!["oak".to_string()],
            }
        );
    }

    #[tokio::test]
    async fn forced_rebuild_respects_per_user_cooldown() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let root = dir.path().join("share");
        fs::create_dir_all(root.join("oak"))?;
        fs::write(root.join("oak").join("board.jpg"), b"jpg")?;

        let store = IndexStore::new(IndexConfig::new(
            root.to_string_lossy(),
            dir.path().join("index.json"),
        ));
        let engine = SearchEngine::new(
            Arc::new(SynonymStore::new(dir.path().join("synonyms.json"))),
            SearchConfig::default(),
        );
        let resolver = QueryResolver::new(
            Arc::new(store),
            engine,
            FakeExtractor::new(&[]),
            ResolverConfig::default(),
        );

        assert!(matches!(
            resolver.request_rebuild(1).await,
            RebuildRequest::Started { images: 1, .. }
        ));
        assert!(matches!(
            resolver.request_rebuild(1).await,
            RebuildRequest::CoolingDown { .. }
        ));
        assert!(matches!(
            resolver.request_rebuild(2).await,
            RebuildRequest::Started { .. }
        ));

        let status = resolver.index_status();
        assert_eq!(status.builds, 2);
        assert!(status.keyword_count > 0);
        assert!(status.last_built.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn forced_rebuild_reports_missing_root() {
        let resolver = resolver_with(catalog(), FakeExtractor::new(&[]), ResolverConfig::default());

        assert!(matches!(resolver.request_rebuild(1).await, RebuildRequest::Failed(_)));
        assert!(!resolver.build_index().await);
        assert_eq!(resolver.index_status().keyword_count, 3);
    }
}
