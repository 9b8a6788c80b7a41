//! Resolved instances.
//!
//! The container stores everything it produces as an [`Instance`]: a
//! cheap-to-clone, type-erased handle. Callers get typed access through
//! [`Ref<T>`], which hides whether the instance is already built or is a
//! [`Deferred`] placeholder that builds on first use.

use std::any::{Any, type_name};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::error::{Result, SanduqError};
use crate::proxy::Deferred;

/// A live object produced by the container.
///
/// Cloning an `Instance` clones the handle, not the object: two clones
/// compare equal under [`Instance::ptr_eq`].
#[derive(Clone)]
pub struct Instance {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
    deferred: bool,
}

impl Instance {
    /// Wraps an owned value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Wraps a value that is already shared.
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            value,
            type_name: type_name::<T>(),
            deferred: false,
        }
    }

    /// Wraps a deferred placeholder for `T`.
    pub fn deferred<T: Any + Send + Sync>(proxy: Deferred<T>) -> Self {
        Self {
            value: Arc::new(proxy),
            type_name: type_name::<T>(),
            deferred: true,
        }
    }

    pub(crate) fn from_boxed(value: Box<dyn Any + Send + Sync>, type_name: &'static str) -> Self {
        Self {
            value: Arc::from(value),
            type_name,
            deferred: false,
        }
    }

    /// Returns the Rust type name of the object behind this handle.
    ///
    /// For a deferred placeholder this is the type it stands in for.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if this handle is a deferred placeholder.
    #[inline]
    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    /// Returns `true` if the handle holds a `T`, built or deferred.
    pub fn is<T: Any + Send + Sync>(&self) -> bool {
        self.value.is::<T>() || self.value.is::<Deferred<T>>()
    }

    /// Returns `true` if both handles point at the same object.
    pub fn ptr_eq(a: &Instance, b: &Instance) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&a.value), Arc::as_ptr(&b.value))
    }

    /// Returns a typed view, or `None` if the handle holds another type.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Ref<T>> {
        if let Ok(ready) = self.value.clone().downcast::<T>() {
            return Some(Ref::from_arc(ready));
        }
        self.value
            .clone()
            .downcast::<Deferred<T>>()
            .ok()
            .map(|proxy| Ref {
                inner: RefInner::Deferred(proxy),
            })
    }

    /// Like [`downcast`](Instance::downcast), failing with
    /// [`SanduqError::TypeMismatch`] on the wrong type.
    pub fn typed<T: Any + Send + Sync>(&self, name: &str) -> Result<Ref<T>> {
        self.downcast::<T>().ok_or_else(|| SanduqError::TypeMismatch {
            name: name.to_string(),
            expected: type_name::<T>(),
            found: self.type_name,
        })
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.type_name)
            .field("deferred", &self.deferred)
            .finish()
    }
}

/// A typed handle to a container instance.
///
/// `Ref<T>` dereferences to `T` whether the instance was built eagerly or
/// is a deferred placeholder; in the latter case the first dereference
/// builds the real object.
///
/// # Panics
/// Dereferencing a deferred `Ref` panics if building the real object
/// fails. Use [`Ref::try_get`] to observe that failure as an error.
pub struct Ref<T: Send + Sync + 'static> {
    inner: RefInner<T>,
}

enum RefInner<T: Send + Sync + 'static> {
    Ready(Arc<T>),
    Deferred(Arc<Deferred<T>>),
}

impl<T: Send + Sync + 'static> Ref<T> {
    /// Wraps an owned value.
    pub fn new(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Wraps a value that is already shared.
    pub fn from_arc(value: Arc<T>) -> Self {
        Self {
            inner: RefInner::Ready(value),
        }
    }

    /// Returns the object, building it first if this is a placeholder.
    pub fn try_get(&self) -> Result<&T> {
        match &self.inner {
            RefInner::Ready(value) => Ok(&**value),
            RefInner::Deferred(proxy) => proxy.force().map(|value| &**value),
        }
    }

    /// Returns the underlying shared object, building it if needed.
    pub fn to_arc(&self) -> Result<Arc<T>> {
        match &self.inner {
            RefInner::Ready(value) => Ok(value.clone()),
            RefInner::Deferred(proxy) => proxy.force().cloned(),
        }
    }

    /// Returns `true` if this handle is a deferred placeholder.
    pub fn is_deferred(&self) -> bool {
        matches!(self.inner, RefInner::Deferred(_))
    }

    /// Returns `true` unless this is a placeholder that was never used.
    pub fn is_initialized(&self) -> bool {
        match &self.inner {
            RefInner::Ready(_) => true,
            RefInner::Deferred(proxy) => proxy.is_initialized(),
        }
    }

    /// Returns `true` if both handles refer to the same container object.
    ///
    /// A placeholder is only equal to handles of the same placeholder.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        match (&a.inner, &b.inner) {
            (RefInner::Ready(x), RefInner::Ready(y)) => Arc::ptr_eq(x, y),
            (RefInner::Deferred(x), RefInner::Deferred(y)) => Arc::ptr_eq(x, y),
            _ => false,
        }
    }

    /// Converts back into a type-erased handle to the same object.
    pub fn into_instance(self) -> Instance {
        match self.inner {
            RefInner::Ready(value) => Instance::from_arc(value),
            RefInner::Deferred(proxy) => Instance {
                value: proxy,
                type_name: type_name::<T>(),
                deferred: true,
            },
        }
    }
}

impl<T: Send + Sync + 'static> Clone for Ref<T> {
    fn clone(&self) -> Self {
        let inner = match &self.inner {
            RefInner::Ready(value) => RefInner::Ready(value.clone()),
            RefInner::Deferred(proxy) => RefInner::Deferred(proxy.clone()),
        };
        Self { inner }
    }
}

impl<T: Send + Sync + 'static> Deref for Ref<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.inner {
            RefInner::Ready(value) => &**value,
            RefInner::Deferred(proxy) => proxy.get(),
        }
    }
}

impl<T: fmt::Debug + Send + Sync + 'static> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            RefInner::Ready(value) => fmt::Debug::fmt(value, f),
            RefInner::Deferred(proxy) => fmt::Debug::fmt(proxy, f),
        }
    }
}
