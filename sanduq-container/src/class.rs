//! Class identity.
//!
//! [`ClassId`] identifies a concrete Rust type the container knows how to
//! build. It pairs the [`TypeId`] with the full type name and the short
//! class name under which the class is addressable.

use std::any::{TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};

use sanduq_support::naming::short_type_name;

/// Identifies a constructible class.
///
/// Two ids are equal when their [`TypeId`]s are equal; the names are
/// carried for lookups and diagnostics only.
///
/// # Examples
/// ```
/// use sanduq_container::class::ClassId;
///
/// struct Mailer;
///
/// let id = ClassId::of::<Mailer>();
/// assert_eq!(id.name(), "Mailer");
/// assert!(id.type_name().ends_with("::Mailer"));
///
/// let renamed = ClassId::named::<Mailer>("mailer.smtp");
/// assert_eq!(id, renamed);
/// ```
#[derive(Clone)]
pub struct ClassId {
    type_id: TypeId,
    type_name: &'static str,
    name: String,
}

impl ClassId {
    /// Creates the id of `T`, named after its short type name.
    pub fn of<T: ?Sized + 'static>() -> Self {
        let type_name = type_name::<T>();
        Self {
            type_id: TypeId::of::<T>(),
            type_name,
            name: short_type_name(type_name),
        }
    }

    /// Creates the id of `T` under an explicit class name.
    pub fn named<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            name: name.into(),
        }
    }

    /// Returns the [`TypeId`] of the class.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the fully qualified Rust type name.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the class name used for autowiring and type hints.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for ClassId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ClassId {}

impl Hash for ClassId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassId({}, name={:?})", self.type_name, self.name)
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
