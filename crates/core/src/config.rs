//! Tunables for indexing, filtering, searching and the clarification gate.
//!
//! Word lists and thresholds live here rather than inline so a deployment can
//! swap them per locale and tests can exercise them independently.

use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "webp", "bmp", "tif"];

#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub root: PathBuf,
    pub index_file: PathBuf,
    /// Lowercase, without the leading dot.
    pub image_extensions: Vec<String>,
}

impl IndexConfig {
    pub fn new(root: impl AsRef<str>, index_file: impl Into<PathBuf>) -> Self {
        Self {
            root: normalize_share_path(root.as_ref()),
            index_file: index_file.into(),
            image_extensions: DEFAULT_IMAGE_EXTENSIONS
                .iter()
                .map(|ext| (*ext).to_string())
                .collect(),
        }
    }

    pub fn is_image(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.image_extensions
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
    }
}

/// A bare drive letter (`P:`) names the current directory on that drive, not
/// its root, so it is widened to `P:\` on Windows hosts.
pub fn normalize_share_path(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    if cfg!(windows) && is_bare_drive_letter(trimmed) {
        return PathBuf::from(format!("{trimmed}\\"));
    }
    PathBuf::from(trimmed)
}

pub(crate) fn is_bare_drive_letter(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    let letter_colon = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
    letter_colon && (bytes.len() == 2 || (bytes.len() == 3 && bytes[2] == b'\\'))
}

#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub stock_words: Vec<String>,
    pub brand_words: Vec<String>,
    pub logo_marker: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            stock_words: to_owned(&["stock", "сток", "склад"]),
            brand_words: to_owned(&["woodway", "ww", "байкал", "baykal", "шпон"]),
            logo_marker: "logo".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Minimum token-set similarity on a 0..=100 scale.
    pub fuzzy_threshold: f64,
    pub limit: usize,
    pub broad_query_threshold: usize,
    pub suggestion_threshold: f64,
    pub suggestion_limit: usize,
    pub filters: FilterConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 80.0,
            limit: 5,
            broad_query_threshold: 50,
            suggestion_threshold: 60.0,
            suggestion_limit: 3,
            filters: FilterConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub affirmative_answers: Vec<String>,
    /// Language tag used to render clarification prompts (`uk`, `ru`, `en`).
    pub display_language: String,
    pub pending_ttl: Duration,
    pub rebuild_cooldown: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            affirmative_answers: to_owned(&["yes", "y", "да", "так"]),
            display_language: "uk".to_string(),
            pending_ttl: Duration::from_secs(10 * 60),
            rebuild_cooldown: Duration::from_secs(60),
        }
    }
}

fn to_owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|word| (*word).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_extensions_are_case_insensitive() {
        let config = IndexConfig::new("/share", "index.json");
        assert!(config.is_image(Path::new("a/b/Oak.JPG")));
        assert!(config.is_image(Path::new("a/b/oak.tif")));
        assert!(!config.is_image(Path::new("a/b/notes.txt")));
        assert!(!config.is_image(Path::new("a/b/no_extension")));
    }

    #[test]
    fn drive_letters_are_detected() {
        assert!(is_bare_drive_letter("P:"));
        assert!(is_bare_drive_letter("p:\\"));
        assert!(!is_bare_drive_letter("/data/share"));
        assert!(!is_bare_drive_letter("P:\\photos"));
    }

    #[test]
    fn drive_letter_is_widened_only_on_windows() {
        let normalized = normalize_share_path("P:");
        if cfg!(windows) {
            assert_eq!(normalized, PathBuf::from("P:\\"));
        } else {
            assert_eq!(normalized, PathBuf::from("P:"));
        }
    }
}
