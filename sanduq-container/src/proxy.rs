//! Deferred construction.
//!
//! A [`Deferred<T>`] stands in for a `T` that has not been built yet. The
//! container hands it out wrapped in a [`Ref<T>`](crate::instance::Ref),
//! so callers use it exactly like a built instance; the first access runs
//! the initializer, later accesses only read the cell.
//!
//! # Examples
//! ```
//! use sanduq_container::instance::Instance;
//! use sanduq_container::proxy::Deferred;
//!
//! let proxy = Deferred::<String>::new(Box::new(|| Ok(Instance::new(String::from("built")))));
//! assert!(!proxy.is_initialized());
//! assert_eq!(proxy.get(), "built");
//! assert!(proxy.is_initialized());
//! ```

use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use sanduq_support::naming::short_type_name;
use tracing::{debug, trace};

use crate::chain::{FillGuard, WaitGuard};
use crate::error::Result;
use crate::instance::Instance;
use crate::introspect::ClassInfo;

/// Builds the real instance behind a placeholder.
///
/// Must return a built (not deferred) instance of the placeholder's type.
pub type Initializer = Box<dyn Fn() -> Result<Instance> + Send + Sync>;

/// A placeholder that builds its `T` on first use.
///
/// Concurrent first users block until one of them finishes the
/// initializer. A failed initializer leaves the placeholder empty, so the
/// next use tries again.
pub struct Deferred<T> {
    cell: OnceCell<Arc<T>>,
    initializer: Initializer,
}

impl<T: Any + Send + Sync> Deferred<T> {
    /// Creates an uninitialized placeholder.
    pub fn new(initializer: Initializer) -> Self {
        Self {
            cell: OnceCell::new(),
            initializer,
        }
    }

    /// Returns the real instance, building it if this is the first use.
    ///
    /// # Errors
    /// Besides whatever the initializer returns, fails with
    /// [`SanduqError::CircularDependency`](crate::error::SanduqError::CircularDependency)
    /// when the first use happens while this same placeholder is being
    /// initialized, on this thread or on one waiting for this thread.
    pub fn force(&self) -> Result<&Arc<T>> {
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }

        let name = short_type_name(type_name::<T>());
        let _waiting = WaitGuard::enter(&self.cell, &name)?;
        self.cell.get_or_try_init(|| {
            let _filling = FillGuard::enter(&self.cell, &name);
            trace!(class = type_name::<T>(), "Initializing deferred instance");
            let instance = (self.initializer)()?;
            instance.typed::<T>(type_name::<T>())?.to_arc()
        })
    }

    /// Returns the real instance.
    ///
    /// # Panics
    /// Panics if the initializer fails; see [`Deferred::force`].
    pub fn get(&self) -> &T {
        match self.force() {
            Ok(value) => &**value,
            Err(err) => panic!("deferred {} failed to initialize: {err}", type_name::<T>()),
        }
    }

    /// Returns `true` once the real instance exists.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T: fmt::Debug> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.get() {
            Some(value) => fmt::Debug::fmt(value, f),
            None => write!(f, "Deferred<{}>(uninitialized)", type_name::<T>()),
        }
    }
}

/// Creates placeholders for classes that are resolved lazily.
///
/// The container calls [`create`](ProxyFactory::create) instead of
/// building a class when the definition is lazy or the caller asked for a
/// proxy. Implementations must not run `initializer` themselves.
pub trait ProxyFactory: Send + Sync {
    /// Returns a placeholder for `class` that runs `initializer` on first use.
    fn create(&self, class: &ClassInfo, initializer: Initializer) -> Result<Instance>;
}

/// The default [`ProxyFactory`]: wraps the class in a [`Deferred`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DeferredProxyFactory;

impl ProxyFactory for DeferredProxyFactory {
    fn create(&self, class: &ClassInfo, initializer: Initializer) -> Result<Instance> {
        debug!(class = %class.id(), "Creating deferred proxy");
        Ok(class.defer(initializer))
    }
}
