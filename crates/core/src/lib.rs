pub mod config;
pub mod error;
pub mod extractor;
pub mod fuzzy;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod search;
pub mod store;
pub mod synonyms;
pub mod tokenizer;
pub mod traits;

pub use config::{
    normalize_share_path, FilterConfig, IndexConfig, ResolverConfig, SearchConfig,
    DEFAULT_IMAGE_EXTENSIONS,
};
pub use error::{IndexError, ServiceError, SynonymError};
pub use extractor::{
    fallback_keywords, parse_keywords, parse_synonyms, LlmClient, LlmEndpointConfig,
    DEFAULT_LLM_ENDPOINT, DEFAULT_LLM_MODEL,
};
pub use fuzzy::{ratio, token_set_ratio};
pub use ingest::{discover_image_files, scan_tree, TreeScan};
pub use models::{
    BuildOutcome, ClarificationPrompt, Confidence, IndexStatus, KeywordHits, KeywordSearch,
    RebuildRequest, Resolution, SearchReport, TokenIndex, UserId,
};
pub use orchestrator::QueryResolver;
pub use search::SearchEngine;
pub use store::{load_index, save_index, IndexStore};
pub use synonyms::{builtin_group, display_keyword, SynonymStore, BUILTIN_SYNONYMS};
pub use tokenizer::{sanitize_query, tokenize, transliterate};
pub use traits::{KeywordExtractor, TermExpander};
