//! Compiled configuration cache.
//!
//! A loaded [`ConfigurationStore`] is written as a single JSON artifact named
//! after a digest of the configuration root. On the next start the artifact
//! is read back instead of walking and parsing every fragment again.
//!
//! Which inputs feed the digest is decided by a [`DigestPolicy`]. The default
//! [`PathDigest`] only hashes the root path and source list, so edits to
//! fragment files do not invalidate an existing artifact. [`ContentDigest`]
//! also hashes fragment contents.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use super::store::ConfigurationStore;
use super::walker::{source_roots, walk};
use super::ConfigError;

const FORMAT_VERSION: u32 = 1;

/// Computes the cache key for a configuration root.
pub trait DigestPolicy: Send + Sync + std::fmt::Debug {
    fn digest(&self, root: &Path, sources: &[&str], extension: &str)
        -> Result<String, ConfigError>;
}

/// Hashes the normalized root path and the source list only.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathDigest;

impl DigestPolicy for PathDigest {
    fn digest(
        &self,
        root: &Path,
        sources: &[&str],
        _extension: &str,
    ) -> Result<String, ConfigError> {
        Ok(hex(path_hasher(root, sources)))
    }
}

/// Hashes the root path, the source list, and the path and bytes of every
/// fragment, so any edit produces a new digest.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentDigest;

impl DigestPolicy for ContentDigest {
    fn digest(
        &self,
        root: &Path,
        sources: &[&str],
        extension: &str,
    ) -> Result<String, ConfigError> {
        let mut hasher = path_hasher(root, sources);

        for dir in source_roots(root, sources) {
            for fragment in walk(&dir, extension)? {
                let bytes = std::fs::read(&fragment.file).map_err(|e| ConfigError::ReadError {
                    path: fragment.file.clone(),
                    source: e,
                })?;
                hasher.update([0u8]);
                hasher.update(fragment.collection_path.as_bytes());
                hasher.update((bytes.len() as u64).to_le_bytes());
                hasher.update(&bytes);
            }
        }

        Ok(hex(hasher))
    }
}

fn path_hasher(root: &Path, sources: &[&str]) -> Sha256 {
    let mut hasher = Sha256::new();
    hasher.update(normalize_root(root).as_bytes());
    for source in sources {
        hasher.update([0u8]);
        hasher.update(source.as_bytes());
    }
    hasher
}

fn hex(hasher: Sha256) -> String {
    format!("{:x}", hasher.finalize())
}

/// Unifies separators and drops trailing ones so equivalent spellings of the
/// same root share a digest.
fn normalize_root(root: &Path) -> String {
    let text = root.to_string_lossy().replace('\\', "/");
    match text.trim_end_matches('/') {
        "" if text.starts_with('/') => "/".to_string(),
        trimmed => trimmed.to_string(),
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Artifact {
    format: u32,
    digest: String,
    collections: Map<String, Value>,
}

/// Reads and writes compiled artifacts in one directory.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn artifact_path(&self, digest: &str) -> PathBuf {
        self.dir.join(format!("{digest}.json"))
    }

    /// Restores the store cached under `digest`.
    ///
    /// Returns `None` when there is no artifact or when it cannot be used;
    /// unusable artifacts are logged and otherwise ignored.
    pub fn load(&self, digest: &str) -> Option<ConfigurationStore> {
        match self.read(digest) {
            Ok(store) => store,
            Err(err) => {
                tracing::warn!(error = %err, "ignoring configuration cache");
                None
            }
        }
    }

    fn read(&self, digest: &str) -> Result<Option<ConfigurationStore>, ConfigError> {
        let path = self.artifact_path(digest);
        let unusable = |reason: String| ConfigError::CacheRead {
            path: path.clone(),
            reason,
        };

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(unusable(e.to_string())),
        };

        let artifact: Artifact =
            serde_json::from_slice(&bytes).map_err(|e| unusable(e.to_string()))?;

        if artifact.format != FORMAT_VERSION {
            return Err(unusable(format!(
                "unsupported format version {}",
                artifact.format
            )));
        }
        if artifact.digest != digest {
            return Err(unusable(format!(
                "artifact belongs to digest {}",
                artifact.digest
            )));
        }

        ConfigurationStore::from_map(artifact.collections)
            .map(Some)
            .map_err(|collection| unusable(format!("collection '{collection}' is not a table")))
    }

    /// Writes `store` under `digest`, replacing any previous artifact.
    ///
    /// The artifact is written to a temporary file in the cache directory and
    /// renamed into place, so readers never observe a partial write.
    pub fn save(&self, digest: &str, store: &ConfigurationStore) -> Result<PathBuf, ConfigError> {
        let path = self.artifact_path(digest);
        let write_failed = |source: std::io::Error| ConfigError::CacheWrite {
            path: path.clone(),
            source,
        };

        let artifact = Artifact {
            format: FORMAT_VERSION,
            digest: digest.to_string(),
            collections: store.to_map(),
        };
        let encoded = serde_json::to_vec(&artifact)?;

        std::fs::create_dir_all(&self.dir).map_err(write_failed)?;
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(write_failed)?;
        tmp.write_all(&encoded).map_err(write_failed)?;
        tmp.as_file().sync_all().map_err(write_failed)?;
        tmp.persist(&path).map_err(|e| write_failed(e.error))?;

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn sample_store() -> ConfigurationStore {
        let mut store = ConfigurationStore::new();
        store.insert_or_merge(
            "app",
            json!({"debug": true, "ratio": 0.5, "none": null, "tags": ["a", 1]})
                .as_object()
                .cloned()
                .unwrap(),
        );
        store.insert_or_merge(
            "db/main",
            json!({"host": "localhost"}).as_object().cloned().unwrap(),
        );
        store
    }

    #[test]
    fn test_round_trip() {
        let tmp = TempDir::new().unwrap();
        let cache = CacheStore::new(tmp.path().join("cache"));

        let path = cache.save("abc", &sample_store()).unwrap();
        assert_eq!(path, tmp.path().join("cache/abc.json"));
        assert_eq!(cache.load("abc"), Some(sample_store()));
    }

    #[test]
    fn test_missing_artifact() {
        let tmp = TempDir::new().unwrap();
        assert!(CacheStore::new(tmp.path()).load("nothing").is_none());
    }

    #[test]
    fn test_corrupt_artifact_is_ignored() {
        let tmp = TempDir::new().unwrap();
        let cache = CacheStore::new(tmp.path());
        fs::write(cache.artifact_path("abc"), "{ not json").unwrap();
        assert!(cache.load("abc").is_none());
    }

    #[test]
    fn test_wrong_shape_is_ignored() {
        let tmp = TempDir::new().unwrap();
        let cache = CacheStore::new(tmp.path());

        let bad_collection = json!({"format": 1, "digest": "abc", "collections": {"app": 3}});
        fs::write(cache.artifact_path("abc"), bad_collection.to_string()).unwrap();
        assert!(cache.load("abc").is_none());

        let wrong_digest = json!({"format": 1, "digest": "other", "collections": {}});
        fs::write(cache.artifact_path("abc"), wrong_digest.to_string()).unwrap();
        assert!(cache.load("abc").is_none());

        fs::write(cache.artifact_path("abc"), "[1, 2, 3]").unwrap();
        assert!(cache.load("abc").is_none());
    }

    #[test]
    fn test_save_overwrites_previous_artifact() {
        let tmp = TempDir::new().unwrap();
        let cache = CacheStore::new(tmp.path());
        cache.save("abc", &ConfigurationStore::new()).unwrap();
        cache.save("abc", &sample_store()).unwrap();
        assert_eq!(cache.load("abc"), Some(sample_store()));

        let leftovers = fs::read_dir(tmp.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_unwritable_directory() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, "").unwrap();

        let cache = CacheStore::new(blocker.join("cache"));
        let result = cache.save("abc", &sample_store());
        assert!(matches!(result, Err(ConfigError::CacheWrite { .. })));
    }

    #[test]
    fn test_path_digest_is_stable() {
        let policy = PathDigest;
        let a = policy.digest(Path::new("/srv/config"), &[], "toml").unwrap();
        let b = policy.digest(Path::new("/srv/config/"), &[], "toml").unwrap();
        let c = policy.digest(Path::new("/srv/other"), &[], "toml").unwrap();
        let d = policy
            .digest(Path::new("/srv/config"), &["base"], "toml")
            .unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_path_digest_ignores_contents() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("app.toml"), "a = 1").unwrap();
        let before = PathDigest.digest(tmp.path(), &[], "toml").unwrap();
        fs::write(tmp.path().join("app.toml"), "a = 2").unwrap();
        let after = PathDigest.digest(tmp.path(), &[], "toml").unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_content_digest_tracks_edits() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("app.toml"), "a = 1").unwrap();
        let before = ContentDigest.digest(tmp.path(), &[], "toml").unwrap();
        fs::write(tmp.path().join("app.toml"), "a = 2").unwrap();
        let after = ContentDigest.digest(tmp.path(), &[], "toml").unwrap();
        assert_ne!(before, after);
    }
}
