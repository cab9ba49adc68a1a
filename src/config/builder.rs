use std::path::{Path, PathBuf};

use super::cache::{CacheStore, DigestPolicy, PathDigest};
use super::engine::Configuration;
use super::parser::{FragmentParser, TomlParser};

/// Builder for a [`Configuration`] engine.
///
/// By default fragments are parsed as TOML, the cache is keyed by
/// [`PathDigest`], and caching is off. Caching needs both
/// [`with_caching(true)`](Self::with_caching) and a cache directory.
///
/// ## Example
///
/// ```no_run
/// use hearth::Configuration;
///
/// let mut config = Configuration::builder()
///     .with_cache_dir("storage/cache")
///     .with_caching(true)
///     .build();
///
/// config.load("config", &[])?;
/// let debug: bool = config.get("app", "debug", false);
/// # Ok::<(), hearth::ConfigError>(())
/// ```
#[derive(Debug, Default)]
#[must_use = "builders do nothing until .build() is called"]
pub struct ConfigurationBuilder {
    parser: Option<Box<dyn FragmentParser>>,
    digest_policy: Option<Box<dyn DigestPolicy>>,
    cache_dir: Option<PathBuf>,
    caching: bool,
}

impl ConfigurationBuilder {
    /// Replaces the fragment parser. The parser's extension decides which
    /// files are picked up.
    pub fn with_parser(mut self, parser: impl FragmentParser + 'static) -> Self {
        self.parser = Some(Box::new(parser));
        self
    }

    /// Replaces the cache key policy.
    pub fn with_digest_policy(mut self, policy: impl DigestPolicy + 'static) -> Self {
        self.digest_policy = Some(Box::new(policy));
        self
    }

    /// Sets the directory holding compiled cache artifacts.
    pub fn with_cache_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cache_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Turns the compiled cache on or off.
    pub fn with_caching(mut self, enabled: bool) -> Self {
        self.caching = enabled;
        self
    }

    pub fn build(self) -> Configuration {
        let cache = match (self.caching, self.cache_dir) {
            (true, Some(dir)) => Some(CacheStore::new(dir)),
            (true, None) => {
                tracing::warn!("configuration caching requested without a cache directory; caching disabled");
                None
            }
            (false, _) => None,
        };

        Configuration::from_parts(
            self.parser.unwrap_or_else(|| Box::new(TomlParser)),
            self.digest_policy.unwrap_or_else(|| Box::new(PathDigest)),
            cache,
        )
    }
}
