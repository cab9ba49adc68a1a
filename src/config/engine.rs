//! Loading and querying a configuration root.

use std::path::Path;

use serde_json::Value;

use super::builder::ConfigurationBuilder;
use super::cache::{CacheStore, DigestPolicy};
use super::coerce::Coerce;
use super::collection::Collection;
use super::env;
use super::parser::{read_fragment, FragmentParser};
use super::store::ConfigurationStore;
use super::walker::{source_roots, walk};
use super::ConfigError;

/// Collection name that addresses every collection at once.
pub const WILDCARD: &str = "*";

/// Lifecycle of a [`Configuration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Loaded,
}

/// Outcome of a successful [`Configuration::load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub digest: String,
    /// The store was restored from a cache artifact without walking the root.
    pub from_cache: bool,
    pub fragments_parsed: usize,
    /// Set when the compiled cache could not be written. The loaded
    /// configuration is still complete.
    pub cache_error: Option<String>,
}

/// Hierarchical configuration built from a directory of fragment files.
///
/// Each fragment contributes to the collection named after its location
/// (`db/main.toml` feeds collection `db/main`). Fragments sharing a
/// collection are deep-merged, later ones winning.
#[derive(Debug)]
pub struct Configuration {
    parser: Box<dyn FragmentParser>,
    digest_policy: Box<dyn DigestPolicy>,
    cache: Option<CacheStore>,
    store: ConfigurationStore,
    state: LoadState,
}

impl Configuration {
    /// Creates a new configuration builder.
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::default()
    }

    pub(super) fn from_parts(
        parser: Box<dyn FragmentParser>,
        digest_policy: Box<dyn DigestPolicy>,
        cache: Option<CacheStore>,
    ) -> Self {
        Self {
            parser,
            digest_policy,
            cache,
            store: ConfigurationStore::new(),
            state: LoadState::Unloaded,
        }
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn caching_enabled(&self) -> bool {
        self.cache.is_some()
    }

    /// Loads every fragment under `root`, or under each of `sources`
    /// (relative to `root`) in order.
    ///
    /// With caching on, a usable artifact for the root's digest replaces the
    /// store wholesale and nothing is walked or parsed. Otherwise fragments
    /// are parsed into a fresh store that replaces the current one, and the
    /// result is written back to the cache.
    ///
    /// Fails if the root or a source directory is missing, or if any fragment
    /// cannot be read or parsed; the store is left untouched in that case.
    /// Cache problems never fail a load.
    pub fn load(
        &mut self,
        root: impl AsRef<Path>,
        sources: &[&str],
    ) -> Result<LoadReport, ConfigError> {
        let previous = self.state;
        self.state = LoadState::Loading;

        let result = self.load_from(root.as_ref(), sources);
        self.state = match (&result, previous) {
            (Ok(_), _) | (Err(_), LoadState::Loaded) => LoadState::Loaded,
            (Err(_), _) => LoadState::Unloaded,
        };
        result
    }

    fn load_from(&mut self, root: &Path, sources: &[&str]) -> Result<LoadReport, ConfigError> {
        let extension = self.parser.extension().to_string();
        let digest = self.digest_policy.digest(root, sources, &extension)?;

        if let Some(store) = self.cache.as_ref().and_then(|cache| cache.load(&digest)) {
            tracing::info!(
                root = %root.display(),
                %digest,
                collections = store.len(),
                "configuration restored from cache"
            );
            self.store = store;
            return Ok(LoadReport {
                digest,
                from_cache: true,
                fragments_parsed: 0,
                cache_error: None,
            });
        }

        let mut fragments = Vec::new();
        for dir in source_roots(root, sources) {
            fragments.extend(walk(&dir, &extension)?);
        }

        let mut store = ConfigurationStore::new();
        for fragment in &fragments {
            let tree = read_fragment(self.parser.as_ref(), &fragment.file)?;
            tracing::debug!(
                collection = %fragment.collection_path,
                file = %fragment.file.display(),
                "parsed configuration fragment"
            );
            store.insert_or_merge(&fragment.collection_path, tree);
        }
        self.store = store;

        let stale = !fragments.is_empty();
        let cache_error = match &self.cache {
            Some(cache) if stale => match cache.save(&digest, &self.store) {
                Ok(path) => {
                    tracing::debug!(path = %path.display(), "configuration cache written");
                    None
                }
                Err(err) => {
                    tracing::error!(
                        error = %err,
                        "failed to write configuration cache; continuing with in-memory configuration"
                    );
                    Some(err.to_string())
                }
            },
            _ => None,
        };

        tracing::info!(
            root = %root.display(),
            collections = self.store.len(),
            fragments = fragments.len(),
            "configuration loaded"
        );

        Ok(LoadReport {
            digest,
            from_cache: false,
            fragments_parsed: fragments.len(),
            cache_error,
        })
    }

    /// Returns `key` from the named collection converted to the default's
    /// type, or `default` if the collection or key is absent.
    ///
    /// Use [`get_all`](Self::get_all) or [`query`](Self::query) to look
    /// across every collection.
    pub fn get<T: Coerce>(&self, collection: &str, key: &str, default: T) -> T {
        match self.store.get(collection) {
            Some(c) => c.get(key, default),
            None => default,
        }
    }

    /// Looks `key` up in every collection that has it, in load order.
    /// Collections without the key are left out rather than defaulted.
    pub fn get_all<T: Coerce + Clone>(&self, key: &str, default: T) -> Vec<(String, T)> {
        self.store
            .iter()
            .filter(|(_, c)| c.has(key))
            .map(|(path, c)| (path.to_string(), c.get(key, default.clone())))
            .collect()
    }

    /// Untyped lookup. With [`WILDCARD`] as the collection, returns an object
    /// mapping each collection that has `key` to its value.
    pub fn query(&self, collection: &str, key: &str, default: Value) -> Value {
        if collection == WILDCARD {
            Value::Object(self.get_all(key, default).into_iter().collect())
        } else {
            self.get(collection, key, default)
        }
    }

    pub fn has(&self, collection: &str, key: &str) -> bool {
        self.store.get(collection).is_some_and(|c| c.has(key))
    }

    pub fn collection(&self, path: &str) -> Option<&Collection> {
        self.store.get(path)
    }

    pub fn store(&self) -> &ConfigurationStore {
        &self.store
    }

    /// Flattens the whole configuration into environment variables named
    /// `PREFIX<sep>COLLECTION<sep>KEY`.
    pub fn export_env(&self, prefix: &str, separator: &str) -> Vec<(String, String)> {
        env::export(&self.store, prefix, separator)
    }
}
