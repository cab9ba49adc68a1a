//! Hierarchical configuration loading, caching, and lookup.

mod builder;
mod cache;
mod coerce;
mod collection;
mod engine;
mod env;
mod error;
mod merge;
mod parser;
mod store;
mod walker;

pub use builder::ConfigurationBuilder;
pub use cache::{CacheStore, ContentDigest, DigestPolicy, PathDigest};
pub use coerce::Coerce;
pub use collection::Collection;
pub use engine::{Configuration, LoadReport, LoadState, WILDCARD};
pub use env::export as export_env;
pub use error::{BoxError, ConfigError};
pub use merge::{merge, merge_maps};
pub use parser::{read_fragment, FragmentParser, TomlParser};
pub use store::ConfigurationStore;
pub use walker::{collection_path, source_roots, walk, Fragment};
