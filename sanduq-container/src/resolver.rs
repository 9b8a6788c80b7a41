//! The resolving interface handed to factories and injectors.

use std::any::Any;

use crate::error::Result;
use crate::instance::{Instance, Ref};

/// Resolves entries by name.
///
/// Factories receive a `&dyn Resolver` so they can pull further entries
/// from the container. Lookups made through it share the caller's
/// resolution chain, so cycles across factories are detected.
pub trait Resolver {
    /// Resolves `name`; with `deferred`, class entries come back as proxies.
    fn resolve(&self, name: &str, deferred: bool) -> Result<Instance>;

    /// Returns `true` if `name` is cached or has a definition.
    fn has(&self, name: &str) -> Result<bool>;
}

/// Typed lookups on top of any [`Resolver`].
///
/// ```rust,ignore
/// let db = factory(|r| {
///     let url: Ref<String> = r.get("db.url")?;
///     Ok(Database::connect(&url))
/// });
/// ```
pub trait ResolverExt: Resolver {
    /// Resolves `name` eagerly as a `T`.
    fn get<T: Any + Send + Sync>(&self, name: &str) -> Result<Ref<T>> {
        self.resolve(name, false)?.typed(name)
    }

    /// Resolves `name` as a `T`, deferring construction of class entries.
    fn get_proxy<T: Any + Send + Sync>(&self, name: &str) -> Result<Ref<T>> {
        self.resolve(name, true)?.typed(name)
    }
}

impl<R: Resolver + ?Sized> ResolverExt for R {}
