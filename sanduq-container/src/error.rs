//! Error types for Sanduq container operations.
//!
//! Every failure names the entry or class involved, and most carry a
//! hint about what to change.

use std::fmt;

use sanduq_support::rendering::{render_chain, render_list};

/// Main error type for all Sanduq operations.
#[derive(Debug, thiserror::Error)]
pub enum SanduqError {
    /// The requested name is not a usable entry name.
    #[error("Invalid entry name {0:?}: names must be non-empty and not padded with whitespace")]
    InvalidName(String),

    /// No definition exists for the requested name.
    #[error("{}", .0)]
    NotFound(NotFoundError),

    /// Resolution re-entered an entry or class that is still being built.
    #[error("{}", .0)]
    CircularDependency(CircularDependencyError),

    /// A required constructor parameter or property could not be satisfied.
    #[error("{}", .0)]
    Dependency(DependencyError),

    /// The resolved instance is not of the requested type.
    #[error("Entry {name:?} holds a {found}, not a {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A user factory returned an error of its own.
    #[error("Failed to construct {name:?}: {source}")]
    ConstructionFailed {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A deferred proxy was first used after its container was dropped.
    #[error("Cannot initialize deferred {class}: the container that created it has been dropped")]
    ContainerDropped { class: String },
}

impl SanduqError {
    /// Wraps an arbitrary error raised while producing `name`.
    pub fn construction(
        name: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        SanduqError::ConstructionFailed {
            name: name.into(),
            source: source.into(),
        }
    }

    /// Builds a [`SanduqError::Dependency`] for `point` of `class`.
    pub fn dependency(
        class: impl Into<String>,
        point: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        SanduqError::Dependency(DependencyError {
            class: class.into(),
            point: point.into(),
            reason: reason.into(),
        })
    }

    /// Error for an injection point a class does not declare.
    pub fn unknown_point(class: &str, point: &str) -> Self {
        Self::dependency(class, point, "the class declares no such injection point")
    }
}

/// Error when no definition exists for a name.
#[derive(Debug)]
pub struct NotFoundError {
    /// The name that was requested
    pub requested: String,
    /// The entry whose resolution asked for it, if any
    pub required_by: Option<String>,
    /// Registered names that look similar
    pub suggestions: Vec<String>,
}

impl fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "No entry or class found for {:?}", self.requested)?;

        if let Some(ref parent) = self.required_by {
            write!(f, "\n  Required by: {parent}")?;
        }

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:{}", render_list(&self.suggestions, "    "))?;
        }

        write!(
            f,
            "\n  Hint: define it with .set({:?}, ...) or register the class for autowiring",
            self.requested
        )
    }
}

/// Error when a construction chain loops back on itself.
#[derive(Debug)]
pub struct CircularDependencyError {
    /// The entry or class that was re-entered.
    pub entry: String,
    /// The resolution chain that closes the loop, e.g. `["A", "B", "A"]`.
    pub chain: Vec<String>,
}

impl fmt::Display for CircularDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Circular dependency detected while resolving {}:\n  {}",
            self.entry,
            render_chain(&self.chain)
        )?;
        write!(
            f,
            "\n  Hint: mark one of the classes lazy or inject it as a proxy"
        )
    }
}

/// Error when a constructor parameter or property cannot be resolved.
#[derive(Debug)]
pub struct DependencyError {
    /// The class being built or injected
    pub class: String,
    /// The parameter or property name
    pub point: String,
    /// Why it could not be satisfied
    pub reason: String,
}

impl fmt::Display for DependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cannot resolve `{}` of {}: {}",
            self.point, self.class, self.reason
        )
    }
}

/// Convenient Result type for Sanduq operations.
pub type Result<T> = std::result::Result<T, SanduqError>;
