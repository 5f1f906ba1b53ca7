//! Synonym Store: canonical term to surface forms across scripts.
//!
//! Two layers answer lookups. The dynamic store (persisted, enriched through a
//! [`TermExpander`]) is always consulted first, then the built-in table.

use crate::store::write_atomic;
use crate::{SynonymError, TermExpander};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Wood species and product types, English canonical form first.
pub const BUILTIN_SYNONYMS: &[(&str, &[&str])] = &[
    ("oak", &["oak", "дуб"]),
    ("acacia", &["acacia", "акация", "акація"]),
    ("beech", &["beech", "бук"]),
    ("hornbeam", &["hornbeam", "граб"]),
    ("pine", &["pine", "сосна"]),
    ("cherry", &["cherry", "черешня"]),
    ("maple", &["maple", "клен"]),
    ("birch", &["birch", "береза"]),
    ("alder", &["alder", "вільха"]),
    ("pear", &["pear", "груша"]),
    ("apple", &["apple", "ябл"]),
    ("mulberry", &["mulberry", "шовковиця"]),
    ("seiba", &["seiba", "сейба", "samba"]),
    ("board", &["board", "дошка", "panel", "щит"]),
    ("veneer", &["veneer", "шпон"]),
    ("lamella", &["lamella", "ламель"]),
    ("plywood", &["plywood", "фанера"]),
    ("chipboard", &["chipboard", "дсп", "particleboard"]),
    ("mdf", &["mdf", "мдф"]),
    ("beam", &["beam", "брус"]),
];

type SynonymMap = BTreeMap<String, BTreeSet<String>>;

pub struct SynonymStore {
    path: PathBuf,
    data: RwLock<SynonymMap>,
}

impl SynonymStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            data: RwLock::new(SynonymMap::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    pub fn contains(&self, term: &str) -> bool {
        self.data.read().contains_key(&normalize(term))
    }

    /// `term` plus its stored synonyms. Always contains `term` itself.
    pub fn expand(&self, term: &str) -> BTreeSet<String> {
        let lower = normalize(term);
        let mut forms = BTreeSet::new();
        if let Some(stored) = self.data.read().get(&lower) {
            forms.extend(stored.iter().cloned());
        }
        forms.insert(lower);
        forms
    }

    /// The canonical key whose synonym set holds `term`, or `term` itself.
    pub fn canonicalize(&self, term: &str) -> String {
        let first = self.resolve_once(&normalize(term));
        self.resolve_once(&first)
    }

    /// Every surface form to try when matching `keyword` against the index:
    /// stored and built-in synonyms of both the keyword and its canonical term.
    pub fn expansions(&self, keyword: &str) -> BTreeSet<String> {
        let lower = normalize(keyword);
        let canonical = self.canonicalize(&lower);

        let mut forms = self.expand(&lower);
        forms.extend(self.expand(&canonical));
        for term in [&lower, &canonical] {
            if let Some((key, members)) = builtin_group(term) {
                forms.insert(key.to_string());
                forms.extend(members.iter().map(|member| member.to_string()));
            }
        }
        forms
    }

    /// Unions `synonyms` into the entry for `base` under a single write, so a
    /// concurrent reader sees the entry either before or after the merge.
    pub fn merge<I, S>(&self, base: &str, synonyms: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let base = normalize(base);
        if base.is_empty() {
            return;
        }

        let mut incoming: BTreeSet<String> = synonyms
            .into_iter()
            .map(|synonym| normalize(synonym.as_ref()))
            .filter(|synonym| !synonym.is_empty())
            .collect();
        incoming.insert(base.clone());

        self.data.write().entry(base).or_default().extend(incoming);
    }

    /// Restores the persisted store. Missing or corrupt files leave it empty.
    pub async fn load(&self) -> usize {
        let loaded = match read_synonyms(&self.path).await {
            Ok(Some(map)) => {
                info!(terms = map.len(), path = %self.path.display(), "loaded synonyms");
                map
            }
            Ok(None) => {
                debug!(path = %self.path.display(), "no persisted synonyms");
                SynonymMap::new()
            }
            Err(error) => {
                error!(path = %self.path.display(), error = %error, "failed to load synonyms");
                SynonymMap::new()
            }
        };

        let count = loaded.len();
        *self.data.write() = loaded;
        count
    }

    pub async fn save(&self) -> Result<(), SynonymError> {
        let snapshot = self.data.read().clone();
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<(), SynonymError> {
            let json = serde_json::to_string_pretty(&snapshot)?;
            write_atomic(&path, &json)?;
            Ok(())
        })
        .await?
    }

    /// Fetches synonyms for every term that is not yet a canonical key, merges
    /// them and persists the result. Returns how many entries were merged.
    ///
    /// A failing expander means no enrichment this round, not an error.
    pub async fn ensure<E>(&self, terms: &[String], expander: &E) -> Result<usize, SynonymError>
    where
        E: TermExpander + Sync + ?Sized,
    {
        let missing: Vec<String> = {
            let data = self.data.read();
            let mut seen = BTreeSet::new();
            terms
                .iter()
                .map(|term| normalize(term))
                .filter(|term| !term.is_empty() && !data.contains_key(term))
                .filter(|term| seen.insert(term.clone()))
                .collect()
        };

        if missing.is_empty() {
            return Ok(0);
        }

        let fetched = match expander.synonyms(&missing).await {
            Ok(fetched) => fetched,
            Err(error) => {
                warn!(terms = missing.len(), error = %error, "synonym expansion failed; continuing without enrichment");
                return Ok(0);
            }
        };

        let mut merged = 0usize;
        for (base, synonyms) in fetched {
            if normalize(&base).is_empty() {
                continue;
            }
            self.merge(&base, synonyms);
            merged += 1;
        }

        if merged > 0 {
            self.save().await?;
            info!(merged, "synonym store enriched");
        }
        Ok(merged)
    }

    fn resolve_once(&self, term: &str) -> String {
        {
            let data = self.data.read();
            if data.contains_key(term) {
                return term.to_string();
            }
            if let Some((key, _)) = data.iter().find(|(_, synonyms)| synonyms.contains(term)) {
                return key.clone();
            }
        }

        builtin_group(term)
            .map(|(key, _)| key.to_string())
            .unwrap_or_else(|| term.to_string())
    }
}

async fn read_synonyms(path: &Path) -> Result<Option<SynonymMap>, SynonymError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(error.into()),
    };

    let raw: BTreeMap<String, Vec<String>> = serde_json::from_str(&content)?;
    let mut map = SynonymMap::new();
    for (base, synonyms) in raw {
        let base = normalize(&base);
        if base.is_empty() {
            continue;
        }
        let entry = map.entry(base.clone()).or_default();
        entry.extend(synonyms.iter().map(|synonym| normalize(synonym)));
        entry.remove("");
        entry.insert(base);
    }
    Ok(Some(map))
}

fn normalize(term: &str) -> String {
    term.trim().to_lowercase()
}

/// The built-in group that has `term` as key, or else lists it as a member.
pub fn builtin_group(term: &str) -> Option<(&'static str, &'static [&'static str])> {
    BUILTIN_SYNONYMS
        .iter()
        .find(|(key, _)| *key == term)
        .or_else(|| {
            BUILTIN_SYNONYMS
                .iter()
                .find(|(_, members)| members.contains(&term))
        })
        .copied()
}

/// Renders a keyword for the user's language: the native-script form of its
/// built-in group for Ukrainian and Russian, the canonical form otherwise.
pub fn display_keyword(keyword: &str, lang: &str) -> String {
    let lower = normalize(keyword);
    let Some((key, members)) = builtin_group(&lower) else {
        return lower;
    };

    let lang = lang.to_lowercase();
    if lang.starts_with("uk") || lang.starts_with("ru") {
        if let Some(native) = members
            .iter()
            .find(|member| member.chars().any(|c| ('\u{0400}'..='\u{04FF}').contains(&c)))
        {
            return (*native).to_string();
        }
    }
    key.to_string()
}
