use crate::config::ConfigError;
use thiserror::Error;

/// Top-level error type for the hearth library.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("application context requires a configuration")]
    MissingConfig,

    #[error("delegate '{name}' listed in collection '{collection}' is not registered")]
    UnknownDelegate { name: String, collection: String },

    #[error("nothing is bound to '{0}'")]
    UnresolvedToken(String),

    #[error("alias cycle detected while resolving '{0}'")]
    CircularAlias(String),

    #[error("'{token}' does not resolve to a value of type {expected}")]
    TypeMismatch {
        token: String,
        expected: &'static str,
    },

    #[error("provider '{name}' listed in collection '{collection}' is not registered")]
    UnknownProvider { name: String, collection: String },

    /// Returned by constructors and prepare hooks that fail for their own
    /// reasons; see [`Error::construction`].
    #[error("constructor for '{token}' failed: {source}")]
    Construction {
        token: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    /// Wraps a failure raised while building the instance for `token`.
    pub fn construction(
        token: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Construction {
            token: token.into(),
            source: source.into(),
        }
    }
}
