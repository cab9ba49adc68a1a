pub mod config;
pub mod context;
mod error;

pub use config::{Configuration, ConfigError};
pub use context::{AppContext, Delegate, Provider, Registry};
pub use error::Error;
