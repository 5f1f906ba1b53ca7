use crate::{tokenize, IndexConfig, TokenIndex};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub fn discover_image_files(config: &IndexConfig) -> (Vec<PathBuf>, usize) {
    let mut files = Vec::new();
    let mut unreadable = 0usize;

    for entry in WalkDir::new(&config.root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                tracing::debug!(error = %error, "skipping unreadable entry");
                unreadable += 1;
                continue;
            }
        };

        let is_file = entry.file_type().is_file()
            || (entry.path_is_symlink() && entry.path().is_file());
        if is_file && config.is_image(entry.path()) {
            files.push(entry.into_path());
        }
    }

    (files, unreadable)
}

pub struct TreeScan {
    pub index: TokenIndex,
    pub images: usize,
    pub unreadable_entries: usize,
}

/// Walks the share and indexes every image under the tokens of its path
/// relative to the root. Each path lands once in each of its token buckets.
pub fn scan_tree(config: &IndexConfig) -> TreeScan {
    let (files, unreadable_entries) = discover_image_files(config);
    let mut index = TokenIndex::new();

    for path in &files {
        let stored = path.to_string_lossy().to_string();
        for token in tokenize(&relative_text(&config.root, path)) {
            index.insert(token, stored.clone());
        }
    }

    TreeScan {
        index,
        images: files.len(),
        unreadable_entries,
    }
}

fn relative_text(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .to_string()
}
