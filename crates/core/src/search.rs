//! Search Engine: synonym expansion, fuzzy token matching and the
//! stock/logo/brand heuristics.

use crate::fuzzy::token_set_ratio;
use crate::{
    Confidence, FilterConfig, KeywordHits, KeywordSearch, SearchConfig, SearchReport,
    SynonymStore, TokenIndex,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

impl FilterConfig {
    pub fn is_stock_query(&self, query_text: &str) -> bool {
        contains_any(query_text, &self.stock_words)
    }

    pub fn is_brand_query(&self, query_text: &str) -> bool {
        contains_any(query_text, &self.brand_words)
    }

    pub fn is_stock_path(&self, path: &str) -> bool {
        contains_any(path, &self.stock_words)
    }

    pub fn is_brand_path(&self, path: &str) -> bool {
        contains_any(path, &self.brand_words)
    }

    pub fn is_logo_path(&self, path: &str) -> bool {
        path.to_lowercase().contains(&self.logo_marker.to_lowercase())
    }

    /// Drops stock imagery unless asked for. Logos are dropped unless the
    /// query names a brand, in which case brand and logo paths move to the
    /// front; both partitions keep their relative order.
    pub fn apply(&self, candidates: Vec<String>, query_text: &str) -> Vec<String> {
        let allow_stock = self.is_stock_query(query_text);
        let mut kept: Vec<String> = candidates
            .into_iter()
            .filter(|path| allow_stock || !self.is_stock_path(path))
            .collect();

        if self.is_brand_query(query_text) {
            let (branded, rest): (Vec<String>, Vec<String>) = kept
                .into_iter()
                .partition(|path| self.is_brand_path(path) || self.is_logo_path(path));
            branded.into_iter().chain(rest).collect()
        } else {
            kept.retain(|path| !self.is_logo_path(path));
            kept
        }
    }
}

fn contains_any(text: &str, words: &[String]) -> bool {
    let lowered = text.to_lowercase();
    words.iter().any(|word| lowered.contains(&word.to_lowercase()))
}

pub struct SearchEngine {
    synonyms: Arc<SynonymStore>,
    config: SearchConfig,
}

impl SearchEngine {
    pub fn new(synonyms: Arc<SynonymStore>, config: SearchConfig) -> Self {
        Self { synonyms, config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn synonyms(&self) -> &SynonymStore {
        &self.synonyms
    }

    /// Distinct canonical terms for `keywords`, in first-seen order.
    pub fn canonical_terms(&self, keywords: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        keywords
            .iter()
            .map(|keyword| self.synonyms.canonicalize(keyword))
            .filter(|term| !term.is_empty())
            .filter(|term| seen.insert(term.clone()))
            .collect()
    }

    pub fn rate_confidence(&self, keywords: &[String]) -> Confidence {
        match self.canonical_terms(keywords).len() {
            0 => Confidence::Low,
            1 => Confidence::High,
            _ => Confidence::Medium,
        }
    }

    /// Up to `limit` paths for one keyword, or `TooBroad` when the keyword's
    /// own bucket is larger than the broad-query threshold.
    pub fn search(&self, keyword: &str, index: &TokenIndex, query_text: &str) -> KeywordSearch {
        match self.filtered_matches(keyword, index, query_text) {
            Ok(mut paths) => {
                paths.truncate(self.config.limit);
                KeywordSearch::Matches(paths)
            }
            Err(total) => KeywordSearch::TooBroad { total },
        }
    }

    /// Searches each keyword in turn. A path already returned for an earlier
    /// keyword is not repeated; each keyword is capped at `limit` on its own.
    pub fn search_keywords(
        &self,
        keywords: &[String],
        index: &TokenIndex,
        query_text: &str,
    ) -> SearchReport {
        let mut report = SearchReport::default();
        let mut seen_paths: HashSet<String> = HashSet::new();
        let mut seen_keywords: HashSet<String> = HashSet::new();

        for keyword in keywords {
            let keyword = keyword.trim().to_lowercase();
            if keyword.is_empty() || !seen_keywords.insert(keyword.clone()) {
                continue;
            }

            match self.filtered_matches(&keyword, index, query_text) {
                Ok(paths) => {
                    let fresh: Vec<String> = paths
                        .into_iter()
                        .filter(|path| seen_paths.insert(path.clone()))
                        .take(self.config.limit)
                        .collect();
                    if !fresh.is_empty() {
                        report.hits.push(KeywordHits {
                            keyword,
                            paths: fresh,
                        });
                    }
                }
                Err(total) => {
                    debug!(keyword = %keyword, total, "keyword too broad");
                    report.too_broad.push(keyword);
                }
            }
        }

        report
    }

    /// Index tokens closest to `query`, best first.
    pub fn suggest(&self, query: &str, index: &TokenIndex) -> Vec<String> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(f64, &str)> = index
            .tokens()
            .map(|token| (token_set_ratio(&query, token), token))
            .filter(|(score, _)| *score >= self.config.suggestion_threshold)
            .collect();
        scored.sort_by(|left, right| right.0.total_cmp(&left.0).then_with(|| left.1.cmp(right.1)));

        scored
            .into_iter()
            .take(self.config.suggestion_limit)
            .map(|(_, token)| token.to_string())
            .collect()
    }

    fn filtered_matches(
        &self,
        keyword: &str,
        index: &TokenIndex,
        query_text: &str,
    ) -> Result<Vec<String>, usize> {
        let keyword = keyword.trim().to_lowercase();
        let total = index.bucket(&keyword).len();
        if total > self.config.broad_query_threshold {
            return Err(total);
        }

        let forms = self.synonyms.expansions(&keyword);
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        for (token, paths) in index.iter() {
            let matched = forms
                .iter()
                .any(|form| token_set_ratio(form, token) >= self.config.fuzzy_threshold);
            if !matched {
                continue;
            }
            for path in paths {
                if seen.insert(path.as_str()) {
                    candidates.push(path.clone());
                }
            }
        }

        Ok(self.config.filters.apply(candidates, query_text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> SearchEngine {
        SearchEngine::new(
            Arc::new(SynonymStore::new("unused.json")),
            SearchConfig::default(),
        )
    }

    fn sample_index() -> TokenIndex {
        [
            (
                "oak",
                vec!["path/to/oak1.jpg", "path/to/oak2.jpg", "path/to/oak3.jpg"],
            ),
            ("maple", vec!["path/to/maple1.jpg", "path/to/maple2.jpg"]),
            (
                "cherry",
                vec![
                    "path/to/cherry1.jpg",
                    "path/to/cherry2.jpg",
                    "path/to/cherry3.jpg",
                ],
            ),
        ]
        .into_iter()
        .collect()
    }

    fn keywords(words: &[&str]) -> Vec<String> {
        words.iter().map(|word| word.to_string()).collect()
    }

    fn matches(result: KeywordSearch) -> Vec<String> {
        match result {
            KeywordSearch::Matches(paths) => paths,
            KeywordSearch::TooBroad { total } => panic!("unexpected too broad: {total}"),
        }
    }

    #[test]
    fn exact_keyword_matches_its_bucket() {
        let paths = matches(engine().search("oak", &sample_index(), "oak"));
        assert_eq!(paths.len(), 3);
        assert!(paths.iter().all(|path| path.contains("oak")));
    }

    #[test]
    fn fuzzy_keyword_matches_close_tokens() {
        let paths = matches(engine().search("oaks", &sample_index(), ""));
        assert_eq!(paths.len(), 3);
        assert!(paths.iter().all(|path| path.contains("oak")));
    }

    #[test]
    fn unknown_keyword_returns_empty() {
        let paths = matches(engine().search("walnut", &sample_index(), ""));
        assert!(paths.is_empty());
    }

    #[test]
    fn builtin_synonyms_reach_native_script_tokens() {
        let mut index = sample_index();
        index.insert("дуб", "path/to/ua_oak.jpg");
        index.insert("дошка", "path/to/board_oak.jpg");

        let oak = matches(engine().search("oak", &index, ""));
        assert!(oak.contains(&"path/to/ua_oak.jpg".to_string()));

        let board = matches(engine().search("board", &index, ""));
        assert_eq!(board, vec!["path/to/board_oak.jpg"]);
    }

    #[test]
    fn stored_synonyms_union_both_buckets() {
        let index: TokenIndex = [
            ("oak", vec!["a/oak1.jpg", "a/oak2.jpg", "a/oak3.jpg"]),
            ("дуб", vec!["b/дуб.jpg"]),
        ]
        .into_iter()
        .collect();
        let synonyms = Arc::new(SynonymStore::new("unused.json"));
        synonyms.merge("oak", ["дуб"]);
        synonyms.merge("дуб", ["oak"]);
        let engine = SearchEngine::new(synonyms, SearchConfig::default());

        let paths = matches(engine.search("oak", &index, "oak"));

        assert_eq!(paths.len(), 4);
        assert!(paths.contains(&"b/дуб.jpg".to_string()));
    }

    #[test]
    fn stock_paths_need_a_stock_query() {
        let index: TokenIndex = [("oak", vec!["Stock/a.jpg", "b.jpg"])].into_iter().collect();

        let plain = matches(engine().search("oak", &index, "oak"));
        assert_eq!(plain, vec!["b.jpg"]);

        let stock = matches(engine().search("oak", &index, "oak stock"));
        assert!(stock.contains(&"Stock/a.jpg".to_string()));
    }

    #[test]
    fn logos_are_hidden_unless_brand_is_requested() {
        let index: TokenIndex = [(
            "oak",
            vec!["Дошка/Дуб/1.jpg", "WoodWay/Дуб/2.jpg", "Дуб/logo.png"],
        )]
        .into_iter()
        .collect();

        let plain = matches(engine().search("oak", &index, "дуб"));
        assert_eq!(plain, vec!["Дошка/Дуб/1.jpg", "WoodWay/Дуб/2.jpg"]);

        let branded = matches(engine().search("oak", &index, "дуб woodway"));
        assert_eq!(
            branded,
            vec!["WoodWay/Дуб/2.jpg", "Дуб/logo.png", "Дошка/Дуб/1.jpg"]
        );
    }

    #[test]
    fn results_are_capped_at_limit() {
        let paths: Vec<String> = (0..12).map(|n| format!("oak/{n}.jpg")).collect();
        let index: TokenIndex = [("oak", paths)].into_iter().collect();

        let found = matches(engine().search("oak", &index, ""));
        assert_eq!(found.len(), 5);
    }

    #[test]
    fn broad_keyword_is_refused() {
        let paths: Vec<String> = (0..100).map(|n| format!("oak/{n}.jpg")).collect();
        let index: TokenIndex = [("oak", paths)].into_iter().collect();

        assert_eq!(
            engine().search("oak", &index, ""),
            KeywordSearch::TooBroad { total: 100 }
        );
    }

    #[test]
    fn multiple_keywords_deduplicate_across_keywords() {
        let mut index = sample_index();
        index.insert("maple", "path/to/oak1.jpg");

        let report = engine().search_keywords(&keywords(&["oak", "maple"]), &index, "");

        assert_eq!(report.hits.len(), 2);
        assert_eq!(report.hits[0].keyword, "oak");
        assert_eq!(report.hits[1].paths.len(), 2);
        let all: Vec<&str> = report.paths().collect();
        let unique: HashSet<&str> = all.iter().copied().collect();
        assert_eq!(all.len(), unique.len());
        assert!(report.too_broad.is_empty());
    }

    #[test]
    fn broad_keyword_is_reported_alongside_other_hits() {
        let mut index = sample_index();
        for n in 0..60 {
            index.insert("board", format!("boards/{n}.jpg"));
        }

        let report = engine().search_keywords(&keywords(&["board", "maple"]), &index, "");

        assert_eq!(report.too_broad, vec!["board"]);
        assert_eq!(report.hits.len(), 1);
        assert_eq!(report.hits[0].keyword, "maple");
    }

    #[test]
    fn confidence_counts_distinct_canonical_terms() {
        let engine = engine();
        assert_eq!(engine.rate_confidence(&[]), Confidence::Low);
        assert_eq!(engine.rate_confidence(&keywords(&["oak"])), Confidence::High);
        assert_eq!(engine.rate_confidence(&keywords(&["oak", "дуб"])), Confidence::High);
        assert_eq!(
            engine.rate_confidence(&keywords(&["oak", "board"])),
            Confidence::Medium
        );
        assert_eq!(
            engine.rate_confidence(&keywords(&["oak", "maple"])),
            Confidence::Medium
        );
    }

    #[test]
    fn suggestions_rank_close_tokens() {
        let index: TokenIndex = [
            ("oak board", vec!["a"]),
            ("oak beam", vec!["b"]),
            ("walnut", vec!["c"]),
        ]
        .into_iter()
        .collect();

        let suggestions = engine().suggest("oak boar", &index);
        assert_eq!(suggestions.first().map(String::as_str), Some("oak board"));
        assert!(!suggestions.contains(&"walnut".to_string()));
    }
}
