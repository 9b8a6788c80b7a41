//! Class introspection.
//!
//! The container builds classes it can describe: a class lists its
//! constructor parameters and its injectable properties, and knows how to
//! construct itself from resolved [`Arguments`]. That contract is the
//! [`Injectable`] trait, usually implemented with `#[derive(Injectable)]`.
//!
//! [`ClassInfo`] is the type-erased form the engine works with, and
//! [`ClassCatalog`] indexes classes by name for autowiring.
//!
//! # Examples
//! ```
//! use sanduq_container::introspect::{Arguments, Injectable, ParamSpec};
//! use sanduq_container::instance::Ref;
//! use sanduq_container::error::Result;
//!
//! struct Config;
//!
//! struct Mailer {
//!     config: Ref<Config>,
//! }
//!
//! impl Injectable for Mailer {
//!     fn parameters() -> Vec<ParamSpec> {
//!         vec![ParamSpec::of::<Ref<Config>>("config")]
//!     }
//!
//!     fn construct(args: &mut Arguments) -> Result<Self> {
//!         Ok(Mailer { config: args.take("config")? })
//!     }
//! }
//!
//! let params = Mailer::parameters();
//! assert_eq!(params[0].type_hint(), Some("Config"));
//! ```

use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use sanduq_support::naming::short_type_name;
use tracing::debug;

use crate::class::ClassId;
use crate::error::{Result, SanduqError};
use crate::instance::{Instance, Ref};
use crate::proxy::{Deferred, Initializer};

/// A class the container can construct and inject.
pub trait Injectable: Any + Send + Sync + Sized {
    /// Name under which the class is autowired and type-hinted.
    ///
    /// Defaults to the short type name (`my_app::Mailer` → `Mailer`).
    fn class_name() -> String {
        short_type_name(type_name::<Self>())
    }

    /// Constructor parameters, in declaration order.
    fn parameters() -> Vec<ParamSpec>;

    /// Builds the instance from resolved constructor arguments.
    fn construct(args: &mut Arguments) -> Result<Self>;

    /// Properties populated after construction.
    fn properties() -> Vec<ParamSpec> {
        Vec::new()
    }

    /// Stores `value` into the property named `point`.
    fn inject(&mut self, point: &str, _value: Instance) -> Result<()> {
        Err(SanduqError::unknown_point(&Self::class_name(), point))
    }
}

/// Describes one constructor parameter or injectable property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    name: &'static str,
    type_hint: Option<String>,
    has_default: bool,
}

impl ParamSpec {
    /// A parameter with neither type hint nor default.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            type_hint: None,
            has_default: false,
        }
    }

    /// A parameter whose hint and optionality follow from its type `V`.
    pub fn of<V: FromInstance>(name: &'static str) -> Self {
        Self {
            name,
            type_hint: V::type_hint(),
            has_default: V::OPTIONAL,
        }
    }

    /// Replaces the type hint with an explicit entry name.
    pub fn hinted(mut self, hint: impl Into<String>) -> Self {
        self.type_hint = Some(hint.into());
        self
    }

    /// Marks the parameter as having a default value.
    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn type_hint(&self) -> Option<&str> {
        self.type_hint.as_deref()
    }

    #[inline]
    pub fn has_default(&self) -> bool {
        self.has_default
    }
}

/// Resolved constructor arguments handed to [`Injectable::construct`].
///
/// `None` for a parameter means nothing was resolved and the class should
/// fall back to its default.
#[derive(Debug)]
pub struct Arguments {
    class: String,
    values: Vec<(&'static str, Option<Instance>)>,
}

impl Arguments {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            values: Vec::new(),
        }
    }

    pub fn push(&mut self, name: &'static str, value: Option<Instance>) {
        self.values.push((name, value));
    }

    /// Takes the argument for `name`, converted to `V`.
    ///
    /// A missing argument is only accepted if `V` has a natural default
    /// (`Option<_>`).
    pub fn take<V: FromInstance>(&mut self, name: &str) -> Result<V> {
        match self.slot(name) {
            Some(instance) => convert(&self.class, name, instance),
            None => V::missing().ok_or_else(|| {
                SanduqError::dependency(&self.class, name, "no value was resolved and it has no default")
            }),
        }
    }

    /// Takes the argument for `name`, falling back to `V::default()`.
    pub fn take_or_default<V: FromInstance + Default>(&mut self, name: &str) -> Result<V> {
        match self.slot(name) {
            Some(instance) => convert(&self.class, name, instance),
            None => Ok(V::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn slot(&mut self, name: &str) -> Option<Instance> {
        self.values
            .iter_mut()
            .find(|(param, _)| *param == name)
            .and_then(|(_, value)| value.take())
    }
}

/// Converts an injected instance into `V`, reporting type errors against
/// the class and injection point.
pub fn convert<V: FromInstance>(class: &str, point: &str, instance: Instance) -> Result<V> {
    V::from_instance(instance).map_err(|err| match err {
        SanduqError::TypeMismatch {
            expected, found, ..
        } => SanduqError::dependency(class, point, format!("expected {expected}, got {found}")),
        other => other,
    })
}

/// Types that constructor parameters and properties can be declared as.
pub trait FromInstance: Sized {
    /// Whether a parameter of this type may be left unresolved.
    const OPTIONAL: bool = false;

    /// The entry name this type asks for, if any.
    fn type_hint() -> Option<String>;

    fn from_instance(instance: Instance) -> Result<Self>;

    /// The value to use when nothing was resolved.
    fn missing() -> Option<Self> {
        None
    }
}

impl<T: Any + Send + Sync> FromInstance for Ref<T> {
    fn type_hint() -> Option<String> {
        Some(short_type_name(type_name::<T>()))
    }

    fn from_instance(instance: Instance) -> Result<Self> {
        instance.typed::<T>(type_name::<T>())
    }
}

impl<T: Any + Send + Sync> FromInstance for Arc<T> {
    fn type_hint() -> Option<String> {
        Some(short_type_name(type_name::<T>()))
    }

    fn from_instance(instance: Instance) -> Result<Self> {
        instance.typed::<T>(type_name::<T>())?.to_arc()
    }
}

impl<V: FromInstance> FromInstance for Option<V> {
    const OPTIONAL: bool = true;

    fn type_hint() -> Option<String> {
        V::type_hint()
    }

    fn from_instance(instance: Instance) -> Result<Self> {
        V::from_instance(instance).map(Some)
    }

    fn missing() -> Option<Self> {
        Some(None)
    }
}

macro_rules! scalar_from_instance {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromInstance for $ty {
                fn type_hint() -> Option<String> {
                    None
                }

                fn from_instance(instance: Instance) -> Result<Self> {
                    let value = instance.typed::<$ty>(type_name::<$ty>())?;
                    Ok(value.try_get()?.clone())
                }
            }
        )*
    };
}

scalar_from_instance!(
    String, bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
);

/// Type-erased description of an [`Injectable`] class.
#[derive(Clone)]
pub struct ClassInfo {
    id: ClassId,
    parameters: Vec<ParamSpec>,
    properties: Vec<ParamSpec>,
    construct: fn(&mut Arguments) -> Result<Box<dyn Any + Send + Sync>>,
    inject: fn(&mut (dyn Any + Send + Sync), &str, Instance) -> Result<()>,
    defer: fn(Initializer) -> Instance,
}

impl ClassInfo {
    /// Describes `T`.
    pub fn of<T: Injectable>() -> Self {
        Self {
            id: ClassId::named::<T>(T::class_name()),
            parameters: T::parameters(),
            properties: T::properties(),
            construct: construct_erased::<T>,
            inject: inject_erased::<T>,
            defer: defer_erased::<T>,
        }
    }

    #[inline]
    pub fn id(&self) -> &ClassId {
        &self.id
    }

    /// Shortcut for `self.id().name()`.
    #[inline]
    pub fn name(&self) -> &str {
        self.id.name()
    }

    #[inline]
    pub fn parameters(&self) -> &[ParamSpec] {
        &self.parameters
    }

    #[inline]
    pub fn properties(&self) -> &[ParamSpec] {
        &self.properties
    }

    /// Runs the class constructor.
    pub fn construct(&self, args: &mut Arguments) -> Result<Box<dyn Any + Send + Sync>> {
        (self.construct)(args)
    }

    /// Injects one property into an existing instance of this class.
    pub fn inject(&self, target: &mut (dyn Any + Send + Sync), point: &str, value: Instance) -> Result<()> {
        (self.inject)(target, point, value)
    }

    /// Wraps `initializer` in a placeholder typed as this class.
    pub fn defer(&self, initializer: Initializer) -> Instance {
        (self.defer)(initializer)
    }
}

impl fmt::Debug for ClassInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassInfo")
            .field("id", &self.id)
            .field("parameters", &self.parameters)
            .field("properties", &self.properties)
            .finish()
    }
}

fn construct_erased<T: Injectable>(args: &mut Arguments) -> Result<Box<dyn Any + Send + Sync>> {
    Ok(Box::new(T::construct(args)?))
}

fn inject_erased<T: Injectable>(target: &mut (dyn Any + Send + Sync), point: &str, value: Instance) -> Result<()> {
    match target.downcast_mut::<T>() {
        Some(target) => target.inject(point, value),
        None => Err(SanduqError::dependency(
            T::class_name(),
            point,
            format!("injection target is not a {}", type_name::<T>()),
        )),
    }
}

fn defer_erased<T: Injectable>(initializer: Initializer) -> Instance {
    Instance::deferred(Deferred::<T>::new(initializer))
}

/// A class submitted for compile-time discovery.
///
/// `#[derive(Injectable)]` submits one per non-generic class; the
/// [`ClassCatalog::discover`] pass collects them.
pub struct ClassRegistration {
    describe: fn() -> ClassInfo,
}

impl ClassRegistration {
    pub const fn of<T: Injectable>() -> Self {
        Self {
            describe: ClassInfo::of::<T>,
        }
    }

    pub fn describe(&self) -> ClassInfo {
        (self.describe)()
    }
}

inventory::collect!(ClassRegistration);

/// Name-indexed set of classes available for autowiring.
#[derive(Debug, Default)]
pub struct ClassCatalog {
    classes: DashMap<String, Arc<ClassInfo>>,
}

impl ClassCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a class, replacing any class registered under the same name.
    pub fn register(&self, info: ClassInfo) -> Arc<ClassInfo> {
        let info = Arc::new(info);
        debug!(class = %info.id(), "Registered class");
        self.classes.insert(info.name().to_string(), info.clone());
        info
    }

    /// Shortcut for `register(ClassInfo::of::<T>())`.
    pub fn register_class<T: Injectable>(&self) -> Arc<ClassInfo> {
        self.register(ClassInfo::of::<T>())
    }

    /// Registers every class submitted through `#[derive(Injectable)]`.
    ///
    /// Returns how many classes were found.
    pub fn discover(&self) -> usize {
        let mut found = 0;
        for registration in inventory::iter::<ClassRegistration> {
            self.register(registration.describe());
            found += 1;
        }
        debug!(found, "Discovered classes");
        found
    }

    /// Looks a class up by class name.
    pub fn find(&self, name: &str) -> Option<Arc<ClassInfo>> {
        self.classes.get(name).map(|entry| entry.value().clone())
    }

    /// Constructor parameters of the named class.
    pub fn params_of(&self, name: &str) -> Option<Vec<ParamSpec>> {
        self.find(name).map(|info| info.parameters().to_vec())
    }

    pub fn names(&self) -> Vec<String> {
        self.classes.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
