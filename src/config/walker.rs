//! Fragment discovery under a configuration root.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use super::ConfigError;

/// A fragment file and the collection it contributes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub collection_path: String,
    pub file: PathBuf,
}

/// Lists every fragment with the given extension under `root`.
///
/// Within a directory, fragment files come first (sorted by name), followed
/// by the contents of each subdirectory (sorted by name), depth-first. When
/// two fragments share a collection path, the later one in this order takes
/// precedence during merging.
///
/// Unreadable subdirectories are skipped. The root itself must be a readable
/// directory.
pub fn walk(root: &Path, extension: &str) -> Result<Vec<Fragment>, ConfigError> {
    if std::fs::read_dir(root).is_err() {
        return Err(ConfigError::DirectoryNotFound(root.to_path_buf()));
    }

    let walker = WalkDir::new(root).follow_links(true).sort_by(|a, b| {
        a.file_type()
            .is_dir()
            .cmp(&b.file_type().is_dir())
            .then_with(|| a.file_name().cmp(b.file_name()))
    });

    let mut fragments = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable configuration branch");
                continue;
            }
        };

        if !entry.file_type().is_file()
            || entry.path().extension().and_then(OsStr::to_str) != Some(extension)
        {
            continue;
        }

        fragments.push(Fragment {
            collection_path: collection_path(root, entry.path()),
            file: entry.into_path(),
        });
    }

    Ok(fragments)
}

/// Directories to walk for a load: `root` itself when `sources` is empty,
/// otherwise each source resolved against `root`.
pub fn source_roots(root: &Path, sources: &[&str]) -> Vec<PathBuf> {
    if sources.is_empty() {
        return vec![root.to_path_buf()];
    }

    sources
        .iter()
        .map(|source| root.join(source.trim_matches(|c: char| c == '/' || c == '\\')))
        .collect()
}

/// Derives the collection path of `file` relative to `root`: the relative
/// directory joined with `/`, then the file name without its extension.
pub fn collection_path(root: &Path, file: &Path) -> String {
    let relative_dir = file
        .parent()
        .and_then(|dir| dir.strip_prefix(root).ok())
        .map(|dir| {
            dir.components()
                .filter_map(|c| match c {
                    Component::Normal(segment) => Some(segment.to_string_lossy()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default();

    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();

    format!("{relative_dir}/{stem}")
        .trim_matches(|c: char| c == '/' || c == '\\')
        .to_string()
}
