//! Explicit token → implementation registry.

use std::any::{type_name, Any};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::Error;

pub(crate) type Instance = Arc<dyn Any + Send + Sync>;
pub(crate) type Constructor = Arc<dyn Fn(&Registry) -> Result<Instance, Error> + Send + Sync>;
pub(crate) type Preparer = Arc<dyn Fn(Instance, &Registry) -> Result<Instance, Error> + Send + Sync>;

enum Binding {
    Constructor(Constructor),
    Shared(Instance),
    Alias(String),
}

/// Maps tokens (interface or implementation names) to the code that builds
/// them.
///
/// A token is bound to a constructor, to a shared instance, or aliased to
/// another token. Constructors run on every resolve and receive the
/// registry, so they can resolve their own dependencies. A constructor that
/// fails for its own reasons should return [`Error::construction`].
///
/// Prepare hooks registered for a token run on every instance constructed
/// while resolving it, including hooks on the aliases passed through on the
/// way to the constructor. Shared instances are handed out unprepared.
#[derive(Default)]
pub struct Registry {
    bindings: HashMap<String, Binding>,
    preparers: HashMap<String, Vec<Preparer>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `token` to a constructor.
    pub fn bind<T, F>(&mut self, token: impl Into<String>, ctor: F)
    where
        T: Any + Send + Sync,
        F: Fn(&Registry) -> Result<T, Error> + Send + Sync + 'static,
    {
        self.bind_constructor(token, erase(ctor));
    }

    pub(crate) fn bind_constructor(&mut self, token: impl Into<String>, ctor: Constructor) {
        self.bindings
            .insert(token.into(), Binding::Constructor(ctor));
    }

    /// Binds `token` to a single instance handed out on every resolve.
    pub fn share<T: Any + Send + Sync>(&mut self, token: impl Into<String>, instance: T) {
        self.bindings
            .insert(token.into(), Binding::Shared(Arc::new(instance)));
    }

    /// Makes `token` resolve to whatever `target` resolves to.
    pub fn alias(&mut self, token: impl Into<String>, target: impl Into<String>) {
        self.bindings
            .insert(token.into(), Binding::Alias(target.into()));
    }

    /// Registers a hook that receives each `T` constructed for `token` and
    /// returns the prepared value. Instances of another type pass through
    /// untouched.
    pub fn prepare<T, F>(&mut self, token: impl Into<String>, hook: F)
    where
        T: Any + Send + Sync,
        F: Fn(T, &Registry) -> Result<T, Error> + Send + Sync + 'static,
    {
        self.prepare_with(token, erase_preparer(hook));
    }

    pub(crate) fn prepare_with(&mut self, token: impl Into<String>, hook: Preparer) {
        self.preparers.entry(token.into()).or_default().push(hook);
    }

    pub fn has(&self, token: &str) -> bool {
        self.bindings.contains_key(token)
    }

    /// Resolves `token` to a value of type `T`, following aliases.
    pub fn resolve<T: Any + Send + Sync>(&self, token: &str) -> Result<Arc<T>, Error> {
        self.resolve_any(token)?
            .downcast::<T>()
            .map_err(|_| Error::TypeMismatch {
                token: token.to_string(),
                expected: type_name::<T>(),
            })
    }

    fn resolve_any(&self, token: &str) -> Result<Instance, Error> {
        let mut seen = HashSet::new();
        let mut chain = Vec::new();
        let mut current = token;

        let ctor = loop {
            if !seen.insert(current) {
                return Err(Error::CircularAlias(token.to_string()));
            }
            chain.push(current);
            match self.bindings.get(current) {
                None => return Err(Error::UnresolvedToken(current.to_string())),
                Some(Binding::Alias(target)) => current = target.as_str(),
                Some(Binding::Shared(instance)) => return Ok(Arc::clone(instance)),
                Some(Binding::Constructor(ctor)) => break ctor,
            }
        };

        // Innermost token first: the bound class, then each alias outward.
        let mut instance = ctor(self)?;
        for step in chain.iter().rev() {
            for hook in self.preparers.get(*step).into_iter().flatten() {
                instance = hook(instance, self)?;
            }
        }
        Ok(instance)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tokens: Vec<_> = self.bindings.keys().collect();
        tokens.sort();
        let mut prepared: Vec<_> = self.preparers.keys().collect();
        prepared.sort();
        f.debug_struct("Registry")
            .field("tokens", &tokens)
            .field("prepared", &prepared)
            .finish()
    }
}

pub(crate) fn erase<T, F>(ctor: F) -> Constructor
where
    T: Any + Send + Sync,
    F: Fn(&Registry) -> Result<T, Error> + Send + Sync + 'static,
{
    Arc::new(move |registry: &Registry| ctor(registry).map(|value| Arc::new(value) as Instance))
}

pub(crate) fn erase_preparer<T, F>(hook: F) -> Preparer
where
    T: Any + Send + Sync,
    F: Fn(T, &Registry) -> Result<T, Error> + Send + Sync + 'static,
{
    Arc::new(move |instance: Instance, registry: &Registry| {
        let typed = match instance.downcast::<T>() {
            Ok(typed) => typed,
            Err(other) => return Ok(other),
        };
        match Arc::try_unwrap(typed) {
            Ok(value) => hook(value, registry).map(|value| Arc::new(value) as Instance),
            Err(shared) => {
                tracing::warn!(
                    kind = type_name::<T>(),
                    "instance is shared elsewhere; skipping prepare hook"
                );
                Ok(shared as Instance)
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Dsn(String);

    #[derive(Debug)]
    struct Pool {
        dsn: Arc<Dsn>,
    }

    #[test]
    fn test_bind_and_resolve() {
        let mut registry = Registry::new();
        registry.bind("dsn", |_| Ok(Dsn("sqlite::memory:".into())));

        let dsn = registry.resolve::<Dsn>("dsn").unwrap();
        assert_eq!(*dsn, Dsn("sqlite::memory:".into()));
    }

    #[test]
    fn test_constructor_resolves_dependencies() {
        let mut registry = Registry::new();
        registry.share("dsn", Dsn("postgres://db".into()));
        registry.bind("pool", |r| {
            Ok(Pool {
                dsn: r.resolve::<Dsn>("dsn")?,
            })
        });
        registry.alias("database", "pool");

        let pool = registry.resolve::<Pool>("database").unwrap();
        assert_eq!(pool.dsn.0, "postgres://db");
    }

    #[test]
    fn test_shared_instance_is_reused() {
        let mut registry = Registry::new();
        registry.share("dsn", Dsn("x".into()));

        let a = registry.resolve::<Dsn>("dsn").unwrap();
        let b = registry.resolve::<Dsn>("dsn").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_constructor_runs_per_resolve() {
        let mut registry = Registry::new();
        registry.bind("dsn", |_| Ok(Dsn("x".into())));

        let a = registry.resolve::<Dsn>("dsn").unwrap();
        let b = registry.resolve::<Dsn>("dsn").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_unresolved_token() {
        let mut registry = Registry::new();
        registry.alias("cache", "redis");

        let err = registry.resolve::<Dsn>("cache").unwrap_err();
        assert!(matches!(err, Error::UnresolvedToken(t) if t == "redis"));
    }

    #[test]
    fn test_alias_cycle() {
        let mut registry = Registry::new();
        registry.alias("a", "b");
        registry.alias("b", "a");

        let err = registry.resolve::<Dsn>("a").unwrap_err();
        assert!(matches!(err, Error::CircularAlias(t) if t == "a"));
    }

    #[test]
    fn test_prepare_hooks_follow_alias_chain() {
        let mut registry = Registry::new();
        registry.bind("sqlite", |_| Ok(Dsn("sqlite:".into())));
        registry.alias("dsn", "sqlite");
        registry.prepare("dsn", |Dsn(s): Dsn, _| Ok(Dsn(format!("{s}/outer"))));
        registry.prepare("sqlite", |Dsn(s): Dsn, _| Ok(Dsn(format!("{s}/inner"))));

        assert_eq!(*registry.resolve::<Dsn>("dsn").unwrap(), Dsn("sqlite:/inner/outer".into()));
        assert_eq!(*registry.resolve::<Dsn>("sqlite").unwrap(), Dsn("sqlite:/inner".into()));
    }

    #[test]
    fn test_prepare_skips_shared_and_other_types() {
        let mut registry = Registry::new();
        registry.share("shared", Dsn("x".into()));
        registry.bind("pool", |r| {
            Ok(Pool {
                dsn: r.resolve::<Dsn>("shared")?,
            })
        });
        registry.prepare("shared", |_: Dsn, _| Ok(Dsn("changed".into())));
        registry.prepare("pool", |_: Dsn, _| Ok(Dsn("changed".into())));

        assert_eq!(*registry.resolve::<Dsn>("shared").unwrap(), Dsn("x".into()));
        assert_eq!(registry.resolve::<Pool>("pool").unwrap().dsn.0, "x");
    }

    #[test]
    fn test_failing_prepare_hook() {
        let mut registry = Registry::new();
        registry.bind("dsn", |_| Ok(Dsn("x".into())));
        registry.prepare("dsn", |_: Dsn, _| {
            Err(Error::construction("dsn", "credentials missing"))
        });

        let err = registry.resolve::<Dsn>("dsn").unwrap_err();
        assert!(matches!(err, Error::Construction { token, .. } if token == "dsn"));
    }

    #[test]
    fn test_constructor_failure_propagates() {
        let mut registry = Registry::new();
        registry.bind("pool", |_| -> Result<Pool, Error> {
            Err(Error::construction("pool", "connection refused"))
        });

        let err = registry.resolve::<Pool>("pool").unwrap_err();
        assert_eq!(err.to_string(), "constructor for 'pool' failed: connection refused");
    }

    #[test]
    fn test_type_mismatch() {
        let mut registry = Registry::new();
        registry.share("dsn", Dsn("x".into()));

        let err = registry.resolve::<Pool>("dsn").unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }
}
