//! Definitions: how the container produces the value for a name.
//!
//! A [`Definition`] is one of four kinds:
//! - [`ValueDefinition`]: a value computed ahead of time
//! - [`FactoryDefinition`]: a closure run once to produce the value
//! - [`AliasDefinition`]: another name to resolve instead
//! - [`ClassDefinition`]: a recipe for building a class instance
//!
//! Definitions are written through unnamed [`Descriptor`]s, created with
//! the helpers in this module:
//!
//! ```
//! use sanduq_container::definition::{factory, get, value};
//! use sanduq_container::resolver::ResolverExt;
//!
//! let url = value(String::from("postgres://localhost"));
//! let alias = get("db.url");
//! let len = factory(|r| Ok(r.get::<String>("db.url")?.len()));
//! ```

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::instance::Instance;
use crate::introspect::{ClassInfo, Injectable};
use crate::resolver::Resolver;
use crate::scope::Scope;

/// A factory closure.
///
/// Receives the container as a [`Resolver`] so it can resolve its own
/// dependencies. Shared between threads, hence `Arc`.
pub type FactoryFn = Arc<dyn Fn(&dyn Resolver) -> Result<Instance> + Send + Sync>;

/// A named definition as stored by a definition source.
#[derive(Debug, Clone)]
pub enum Definition {
    Value(ValueDefinition),
    Factory(FactoryDefinition),
    Alias(AliasDefinition),
    Class(Arc<ClassDefinition>),
}

impl Definition {
    /// The name this definition is stored under.
    pub fn name(&self) -> &str {
        match self {
            Definition::Value(def) => &def.name,
            Definition::Factory(def) => &def.name,
            Definition::Alias(def) => &def.name,
            Definition::Class(def) => &def.name,
        }
    }

    /// Short label of the definition kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Definition::Value(_) => "value",
            Definition::Factory(_) => "factory",
            Definition::Alias(_) => "alias",
            Definition::Class(_) => "class",
        }
    }

    /// Returns `true` if the resolved instance is cached under this name.
    ///
    /// Aliases never are; their target is cached under its own name.
    pub fn is_cached(&self) -> bool {
        match self {
            Definition::Value(_) | Definition::Factory(_) => true,
            Definition::Alias(_) => false,
            Definition::Class(def) => def.recipe.scope().is_cached(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValueDefinition {
    pub name: String,
    pub value: Instance,
}

#[derive(Clone)]
pub struct FactoryDefinition {
    pub name: String,
    pub factory: FactoryFn,
}

impl fmt::Debug for FactoryDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryDefinition")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct AliasDefinition {
    pub name: String,
    pub target: String,
}

/// A named [`ClassRecipe`].
#[derive(Debug, Clone)]
pub struct ClassDefinition {
    pub name: String,
    pub recipe: ClassRecipe,
}

impl ClassDefinition {
    #[inline]
    pub fn class(&self) -> &ClassInfo {
        self.recipe.class()
    }
}

/// An explicit value for a constructor parameter or property.
#[derive(Debug, Clone)]
pub enum Argument {
    /// Use this instance as is.
    Value(Instance),
    /// Resolve this entry name.
    Get(String),
}

impl Argument {
    pub fn value<T: Any + Send + Sync>(value: T) -> Self {
        Argument::Value(Instance::new(value))
    }

    pub fn get(name: impl Into<String>) -> Self {
        Argument::Get(name.into())
    }
}

impl From<Instance> for Argument {
    fn from(instance: Instance) -> Self {
        Argument::Value(instance)
    }
}

/// How to build an instance of a class.
///
/// ```
/// use sanduq_container::definition::{create, Argument};
/// use sanduq_container::introspect::{Arguments, Injectable, ParamSpec};
/// use sanduq_container::error::Result;
/// use sanduq_container::scope::Scope;
///
/// struct Report;
///
/// impl Injectable for Report {
///     fn parameters() -> Vec<ParamSpec> { Vec::new() }
///     fn construct(_: &mut Arguments) -> Result<Self> { Ok(Report) }
/// }
///
/// let recipe = create::<Report>()
///     .prototype()
///     .lazy()
///     .constructor_parameter("title", Argument::value("Q3"));
/// assert_eq!(recipe.scope(), Scope::Prototype);
/// assert!(recipe.is_lazy());
/// ```
#[derive(Debug, Clone)]
pub struct ClassRecipe {
    class: Arc<ClassInfo>,
    scope: Scope,
    lazy: bool,
    constructor: BTreeMap<String, Argument>,
    properties: BTreeMap<String, Argument>,
}

impl ClassRecipe {
    /// A singleton, eager recipe with no overrides.
    pub fn new(class: Arc<ClassInfo>) -> Self {
        Self {
            class,
            scope: Scope::Singleton,
            lazy: false,
            constructor: BTreeMap::new(),
            properties: BTreeMap::new(),
        }
    }

    pub fn of<T: Injectable>() -> Self {
        Self::new(Arc::new(ClassInfo::of::<T>()))
    }

    pub fn in_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Shortcut for `in_scope(Scope::Prototype)`.
    pub fn prototype(self) -> Self {
        self.in_scope(Scope::Prototype)
    }

    /// Resolve to a deferred proxy unless the caller forces construction.
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    /// Overrides the constructor parameter `name`.
    pub fn constructor_parameter(mut self, name: impl Into<String>, argument: impl Into<Argument>) -> Self {
        self.constructor.insert(name.into(), argument.into());
        self
    }

    /// Overrides the property `name`.
    pub fn property(mut self, name: impl Into<String>, argument: impl Into<Argument>) -> Self {
        self.properties.insert(name.into(), argument.into());
        self
    }

    #[inline]
    pub fn class(&self) -> &ClassInfo {
        &self.class
    }

    #[inline]
    pub fn scope(&self) -> Scope {
        self.scope
    }

    #[inline]
    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    pub fn constructor_override(&self, name: &str) -> Option<&Argument> {
        self.constructor.get(name)
    }

    pub fn property_override(&self, name: &str) -> Option<&Argument> {
        self.properties.get(name)
    }

    pub fn constructor_overrides(&self) -> impl Iterator<Item = (&str, &Argument)> {
        self.constructor.iter().map(|(name, arg)| (name.as_str(), arg))
    }

    pub fn property_overrides(&self) -> impl Iterator<Item = (&str, &Argument)> {
        self.properties.iter().map(|(name, arg)| (name.as_str(), arg))
    }
}

/// An unnamed definition, as passed to `set` and `add_definitions`.
#[derive(Clone)]
pub enum Descriptor {
    Value(Instance),
    Factory(FactoryFn),
    Alias(String),
    Class(ClassRecipe),
}

impl Descriptor {
    /// Names the descriptor, producing the stored definition.
    pub fn into_definition(self, name: impl Into<String>) -> Definition {
        let name = name.into();
        match self {
            Descriptor::Value(value) => Definition::Value(ValueDefinition { name, value }),
            Descriptor::Factory(factory) => Definition::Factory(FactoryDefinition { name, factory }),
            Descriptor::Alias(target) => Definition::Alias(AliasDefinition { name, target }),
            Descriptor::Class(recipe) => Definition::Class(Arc::new(ClassDefinition { name, recipe })),
        }
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Descriptor::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Descriptor::Factory(_) => f.write_str("Factory(..)"),
            Descriptor::Alias(target) => f.debug_tuple("Alias").field(target).finish(),
            Descriptor::Class(recipe) => f.debug_tuple("Class").field(recipe).finish(),
        }
    }
}

impl From<Instance> for Descriptor {
    fn from(value: Instance) -> Self {
        Descriptor::Value(value)
    }
}

impl From<ClassRecipe> for Descriptor {
    fn from(recipe: ClassRecipe) -> Self {
        Descriptor::Class(recipe)
    }
}

impl From<Definition> for Descriptor {
    fn from(definition: Definition) -> Self {
        match definition {
            Definition::Value(def) => Descriptor::Value(def.value),
            Definition::Factory(def) => Descriptor::Factory(def.factory),
            Definition::Alias(def) => Descriptor::Alias(def.target),
            Definition::Class(def) => Descriptor::Class(def.recipe.clone()),
        }
    }
}

/// A value definition.
pub fn value<T: Any + Send + Sync>(value: T) -> Descriptor {
    Descriptor::Value(Instance::new(value))
}

/// A factory definition whose closure returns a plain value.
pub fn factory<T, F>(factory: F) -> Descriptor
where
    T: Any + Send + Sync,
    F: Fn(&dyn Resolver) -> Result<T> + Send + Sync + 'static,
{
    Descriptor::Factory(Arc::new(move |resolver: &dyn Resolver| {
        factory(resolver).map(Instance::new)
    }))
}

/// A factory definition whose closure returns an [`Instance`] directly.
pub fn factory_instance<F>(factory: F) -> Descriptor
where
    F: Fn(&dyn Resolver) -> Result<Instance> + Send + Sync + 'static,
{
    Descriptor::Factory(Arc::new(factory))
}

/// An alias: resolving the defined name resolves `target` instead.
pub fn get(target: impl Into<String>) -> Descriptor {
    Descriptor::Alias(target.into())
}

/// A class recipe for `T`; singleton and eager until configured otherwise.
pub fn create<T: Injectable>() -> ClassRecipe {
    ClassRecipe::of::<T>()
}

/// Alias of [`create`], for definitions that only tune an autowired class.
pub fn autowire<T: Injectable>() -> ClassRecipe {
    create::<T>()
}
