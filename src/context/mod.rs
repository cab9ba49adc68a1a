//! Application context: loaded configuration plus the service registry.

mod registry;

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Configuration;
use crate::Error;

pub use registry::Registry;
use registry::{erase, erase_preparer, Constructor, Preparer};

/// Configuration key listing the delegates a collection enables.
pub const DELEGATES_KEY: &str = "application.delegates";

/// Configuration key listing the providers a collection enables.
pub const PROVIDERS_KEY: &str = "application.providers";

/// Constructs one implementation class and declares which interfaces it
/// provides.
///
/// Delegates are offered to the [`AppContextBuilder`] under a name; only the
/// names listed in some collection's `application.delegates` are registered.
pub struct Delegate {
    class: String,
    interfaces: Vec<String>,
    ctor: Constructor,
}

impl Delegate {
    pub fn new<T, F>(class: impl Into<String>, ctor: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Registry) -> Result<T, Error> + Send + Sync + 'static,
    {
        Self {
            class: class.into(),
            interfaces: Vec::new(),
            ctor: erase(ctor),
        }
    }

    /// Declares an interface token that should resolve to this class.
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    fn register(&self, registry: &mut Registry) {
        registry.bind_constructor(self.class.clone(), Arc::clone(&self.ctor));
        for interface in &self.interfaces {
            registry.alias(interface.clone(), self.class.clone());
        }
    }
}

impl std::fmt::Debug for Delegate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delegate")
            .field("class", &self.class)
            .field("interfaces", &self.interfaces)
            .finish_non_exhaustive()
    }
}

/// Prepares every instance constructed for the interfaces it declares, for
/// example to inject settings after construction.
///
/// Like delegates, providers are offered under a name and registered only
/// when some collection lists that name under `application.providers`.
pub struct Provider {
    interfaces: Vec<String>,
    prepare: Preparer,
}

impl Provider {
    pub fn new<T, F>(prepare: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(T, &Registry) -> Result<T, Error> + Send + Sync + 'static,
    {
        Self {
            interfaces: Vec::new(),
            prepare: erase_preparer(prepare),
        }
    }

    /// Declares an interface (or class) token whose instances this provider
    /// prepares.
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    fn register(&self, registry: &mut Registry) {
        for interface in &self.interfaces {
            registry.prepare_with(interface.clone(), Arc::clone(&self.prepare));
        }
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("interfaces", &self.interfaces)
            .finish_non_exhaustive()
    }
}

/// Central application context holding the loaded configuration and the
/// registry wired from it.
///
/// ## Example
///
/// ```no_run
/// use hearth::{AppContext, Configuration, Delegate};
///
/// struct Mailer {
///     host: String,
/// }
///
/// let mut config = Configuration::builder().build();
/// config.load("config", &[])?;
///
/// let ctx = AppContext::builder()
///     .with_config(config)
///     .with_delegate(
///         "smtp",
///         Delegate::new("SmtpMailer", |_| Ok(Mailer { host: "localhost".into() }))
///             .with_interface("Mailer"),
///     )
///     .build()?;
///
/// let mailer = ctx.resolve::<Mailer>("Mailer")?;
/// # Ok::<(), hearth::Error>(())
/// ```
#[derive(Debug)]
pub struct AppContext {
    config: Configuration,
    registry: Registry,
}

impl AppContext {
    /// Creates a new builder for constructing an `AppContext`.
    pub fn builder() -> AppContextBuilder {
        AppContextBuilder::default()
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Shorthand for [`Registry::resolve`].
    pub fn resolve<T: Any + Send + Sync>(&self, token: &str) -> Result<Arc<T>, Error> {
        self.registry.resolve(token)
    }
}

/// Builder for constructing an [`AppContext`].
#[derive(Debug, Default)]
#[must_use = "builders do nothing until .build() is called"]
pub struct AppContextBuilder {
    config: Option<Configuration>,
    registry: Registry,
    delegates: HashMap<String, Delegate>,
    providers: HashMap<String, Provider>,
}

impl AppContextBuilder {
    /// Attaches a loaded configuration.
    pub fn with_config(mut self, config: Configuration) -> Self {
        self.config = Some(config);
        self
    }

    /// Offers a delegate under `name`. It is registered only if a collection
    /// lists `name` under `application.delegates`.
    pub fn with_delegate(mut self, name: impl Into<String>, delegate: Delegate) -> Self {
        self.delegates.insert(name.into(), delegate);
        self
    }

    /// Offers a provider under `name`. It is registered only if a collection
    /// lists `name` under `application.providers`.
    pub fn with_provider(mut self, name: impl Into<String>, provider: Provider) -> Self {
        self.providers.insert(name.into(), provider);
        self
    }

    /// Adds bindings that do not depend on configuration.
    pub fn with_registry(mut self, configure: impl FnOnce(&mut Registry)) -> Self {
        configure(&mut self.registry);
        self
    }

    /// Builds the `AppContext`, registering every delegate and then every
    /// provider enabled by the configuration, in collection load order.
    ///
    /// Returns an error if no configuration was provided or a collection
    /// names a delegate or provider that was never offered.
    pub fn build(self) -> Result<AppContext, Error> {
        let config = self.config.ok_or(Error::MissingConfig)?;
        let mut registry = self.registry;

        for (collection, names) in config.get_all(DELEGATES_KEY, Vec::<String>::new()) {
            for name in names {
                let delegate =
                    self.delegates
                        .get(&name)
                        .ok_or_else(|| Error::UnknownDelegate {
                            name: name.clone(),
                            collection: collection.clone(),
                        })?;
                delegate.register(&mut registry);
                tracing::debug!(
                    delegate = %name,
                    class = %delegate.class,
                    %collection,
                    "registered delegate"
                );
            }
        }

        for (collection, names) in config.get_all(PROVIDERS_KEY, Vec::<String>::new()) {
            for name in names {
                let provider =
                    self.providers
                        .get(&name)
                        .ok_or_else(|| Error::UnknownProvider {
                            name: name.clone(),
                            collection: collection.clone(),
                        })?;
                provider.register(&mut registry);
                tracing::debug!(
                    provider = %name,
                    interfaces = ?provider.interfaces,
                    %collection,
                    "registered provider"
                );
            }
        }

        Ok(AppContext { config, registry })
    }
}
