//! Instance scopes for class definitions.
//!
//! - [`Scope::Singleton`]: built once, cached for the life of the container
//! - [`Scope::Prototype`]: built fresh on every resolution, never cached
//!
//! Values and factory results are always cached; scope only applies to
//! class definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Defines how long a class instance lives within the container.
///
/// # Examples
/// ```
/// use sanduq_container::scope::Scope;
///
/// assert!(Scope::Singleton.is_cached());
/// assert!(!Scope::Prototype.is_cached());
/// assert_eq!(Scope::default(), Scope::Singleton);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// One instance shared by every caller.
    ///
    /// Created on first resolve, cached until the entry is redefined or
    /// the container is dropped.
    #[default]
    Singleton,

    /// A new instance on every resolve.
    ///
    /// The caller owns what it receives; the container keeps nothing.
    Prototype,
}

impl Scope {
    /// Returns `true` if instances of this scope are cached.
    #[inline]
    pub fn is_cached(&self) -> bool {
        matches!(self, Scope::Singleton)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Singleton => write!(f, "Singleton"),
            Scope::Prototype => write!(f, "Prototype"),
        }
    }
}
