//! Index Store: owns the live inverted index and rebuilds it from the share.
//!
//! Readers take an `Arc` snapshot and never see a half-built index; a rebuild
//! swaps the whole map in one step. At most one rebuild runs at a time and a
//! request that arrives meanwhile is turned away rather than queued.

use crate::config::is_bare_drive_letter;
use crate::ingest::scan_tree;
use crate::{BuildOutcome, IndexConfig, IndexError, IndexStatus, TokenIndex};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct IndexStore {
    config: IndexConfig,
    index: RwLock<Arc<TokenIndex>>,
    last_built: RwLock<Option<DateTime<Utc>>>,
    builds: AtomicU64,
    build_lock: tokio::sync::Mutex<()>,
}

impl IndexStore {
    pub fn new(config: IndexConfig) -> Self {
        Self::with_index(config, TokenIndex::new())
    }

    pub fn with_index(config: IndexConfig, index: TokenIndex) -> Self {
        Self {
            config,
            index: RwLock::new(Arc::new(index)),
            last_built: RwLock::new(None),
            builds: AtomicU64::new(0),
            build_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn snapshot(&self) -> Arc<TokenIndex> {
        Arc::clone(&self.index.read())
    }

    pub fn status(&self) -> IndexStatus {
        IndexStatus {
            keyword_count: self.index.read().len(),
            last_built: *self.last_built.read(),
            builds: self.builds.load(Ordering::Acquire),
        }
    }

    pub fn is_building(&self) -> bool {
        self.build_lock.try_lock().is_err()
    }

    /// Restores the last persisted index, taking the file's modification time
    /// as the build time. A missing file leaves the index empty; an unreadable
    /// or corrupt one is logged and also yields empty.
    pub async fn load(&self) -> usize {
        let path = &self.config.index_file;
        let loaded = match load_index(path).await {
            Ok(Some(index)) => {
                info!(keywords = index.len(), path = %path.display(), "loaded index");
                index
            }
            Ok(None) => {
                debug!(path = %path.display(), "no persisted index");
                TokenIndex::new()
            }
            Err(error) => {
                error!(path = %path.display(), error = %error, "failed to load index");
                TokenIndex::new()
            }
        };

        let built_at = if loaded.is_empty() {
            None
        } else {
            file_modified(path).await
        };

        let count = loaded.len();
        *self.index.write() = Arc::new(loaded);
        *self.last_built.write() = built_at;
        count
    }

    /// Rebuilds the index from the share root.
    ///
    /// An inaccessible root fails before the build is marked busy and leaves
    /// the current index in place.
    pub async fn build(&self) -> Result<BuildOutcome, IndexError> {
        if let Err(error) = check_root(&self.config.root) {
            error!(error = %error, "index build aborted");
            return Err(error);
        }

        let Ok(_guard) = self.build_lock.try_lock() else {
            warn!("index build requested but already running");
            return Ok(BuildOutcome::AlreadyRunning);
        };

        info!(root = %self.config.root.display(), "building index");
        let config = self.config.clone();
        let scan = tokio::task::spawn_blocking(move || scan_tree(&config)).await?;

        if scan.unreadable_entries > 0 {
            warn!(entries = scan.unreadable_entries, "skipped unreadable entries during scan");
        }

        let fresh = Arc::new(scan.index);
        let keywords = fresh.len();
        *self.index.write() = Arc::clone(&fresh);

        let path = self.config.index_file.clone();
        let persisted = tokio::task::spawn_blocking(move || save_index(&path, &fresh)).await;
        match persisted {
            Ok(Ok(())) => {}
            Ok(Err(error)) => error!(error = %error, "failed to persist index"),
            Err(error) => error!(error = %error, "index persistence task failed"),
        }

        *self.last_built.write() = Some(Utc::now());
        self.builds.fetch_add(1, Ordering::AcqRel);
        info!(keywords, images = scan.images, "indexed share");

        Ok(BuildOutcome::Completed {
            keywords,
            images: scan.images,
        })
    }

    /// `true` when a build ran, `false` when one was already running or the
    /// root was unavailable.
    pub async fn build_index(&self) -> bool {
        matches!(self.build().await, Ok(outcome) if outcome.started())
    }
}

fn check_root(root: &Path) -> Result<(), IndexError> {
    let is_dir = fs::metadata(root).map(|meta| meta.is_dir()).unwrap_or(false);
    if is_dir && fs::read_dir(root).is_ok() {
        return Ok(());
    }

    let hint = if !cfg!(windows) && is_bare_drive_letter(&root.to_string_lossy()) {
        " (looks like a Windows drive letter; point it at the mounted share, e.g. /data/share)"
            .to_string()
    } else {
        String::new()
    };

    Err(IndexError::RootUnavailable {
        path: root.to_path_buf(),
        hint,
    })
}

async fn file_modified(path: &Path) -> Option<DateTime<Utc>> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    metadata.modified().ok().map(DateTime::<Utc>::from)
}

pub async fn load_index(path: &Path) -> Result<Option<TokenIndex>, IndexError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(error.into()),
    };
    Ok(Some(serde_json::from_str(&content)?))
}

pub fn save_index(path: &Path, index: &TokenIndex) -> Result<(), IndexError> {
    let json = serde_json::to_string_pretty(index)?;
    write_atomic(path, &json)?;
    Ok(())
}

/// Writes next to the target and renames over it, so the file on disk is
/// always either the previous or the new complete version.
pub(crate) fn write_atomic(path: &Path, content: &str) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    let mut file = File::create(&temp_path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;
    fs::rename(&temp_path, path)
}
