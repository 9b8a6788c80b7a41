//! # The Container
//!
//! Resolves names into live instances, caches singletons and hands out
//! deferred proxies for lazy classes.
//!
//! # Architecture
//! ```text
//! ContainerBuilder ──build()──> Container
//!                                  │ resolve(name)
//!                                  ▼
//!                cache ──miss──> definitions ──> value | factory | alias | class
//!                                                                         │
//!                                                   Injector  <──eager────┤
//!                                                   ProxyFactory <──lazy──┘
//! ```
//!
//! # Examples
//! ```rust
//! use sanduq_container::prelude::*;
//!
//! let container = Container::builder()
//!     .define("db.url", value(String::from("postgres://localhost")))
//!     .define("db.url.len", factory(|r| Ok(r.get::<String>("db.url")?.len())))
//!     .define("database.url", get("db.url"))
//!     .build()
//!     .expect("Failed to build container");
//!
//! let url: Ref<String> = container.get("database.url").expect("Failed to resolve");
//! assert_eq!(*url, "postgres://localhost");
//! assert_eq!(*container.get::<usize>("db.url.len").unwrap(), 20);
//! ```

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use sanduq_support::naming::{is_valid_name, suggest_names};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace};

use crate::chain::{FillGuard, InitGuard, ResolutionChain, WaitGuard};
use crate::class::ClassId;
use crate::definition::{ClassDefinition, Definition, Descriptor};
use crate::error::{NotFoundError, Result, SanduqError};
use crate::graph::GraphValidator;
use crate::injector::{Autowirer, Injector};
use crate::instance::{Instance, Ref};
use crate::introspect::{ClassCatalog, ClassInfo, FromInstance, Injectable};
use crate::provider::{Provider, ProviderRegistry};
use crate::proxy::{DeferredProxyFactory, Initializer, ProxyFactory};
use crate::registry::{Autowiring, DefinitionRegistry, DefinitionSource, SourceChain};
use crate::resolver::Resolver;

/// The name under which a container resolves to itself.
pub const SELF_NAME: &str = "Container";

const SUGGESTION_LIMIT: usize = 3;

/// Container behaviour switches.
///
/// Deserializable, so it can live in an application's config file:
///
/// ```
/// use sanduq_container::container::Settings;
///
/// let settings: Settings = serde_json::from_str(r#"{ "validate": false }"#).unwrap();
/// assert!(settings.autowiring);
/// assert!(!settings.validate);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Resolve registered classes by class name without a definition.
    pub autowiring: bool,
    /// Seed the class catalog with every `#[derive(Injectable)]` class.
    pub discover_classes: bool,
    /// Check the definitions for missing entries and cycles in `build()`.
    pub validate: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            autowiring: true,
            discover_classes: true,
            validate: true,
        }
    }
}

// ═══════════════════════════════════════════
// ContainerBuilder
// ═══════════════════════════════════════════

/// Builds a [`Container`].
///
/// # Examples
/// ```rust,ignore
/// let container = Container::builder()
///     .define("mail.sender", value(String::from("noreply@example.com")))
///     .define("Mailer", create::<SmtpMailer>().lazy())
///     .add_provider(&BillingProvider)
///     .build()?;
/// ```
pub struct ContainerBuilder {
    settings: Settings,
    registry: DefinitionRegistry,
    sources: Vec<Arc<dyn DefinitionSource>>,
    classes: Vec<ClassInfo>,
    injector: Arc<dyn Injector>,
    proxies: Arc<dyn ProxyFactory>,
    error: Option<SanduqError>,
}

impl ContainerBuilder {
    fn new() -> Self {
        Self {
            settings: Settings::default(),
            registry: DefinitionRegistry::new(),
            sources: Vec::new(),
            classes: Vec::new(),
            injector: Arc::new(Autowirer),
            proxies: Arc::new(DeferredProxyFactory),
            error: None,
        }
    }

    /// Replaces all settings at once.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn autowiring(mut self, enabled: bool) -> Self {
        self.settings.autowiring = enabled;
        self
    }

    pub fn discover_classes(mut self, enabled: bool) -> Self {
        self.settings.discover_classes = enabled;
        self
    }

    pub fn validate(mut self, enabled: bool) -> Self {
        self.settings.validate = enabled;
        self
    }

    /// Defines `name`. A later definition for the same name wins.
    ///
    /// An invalid name is reported by [`build()`](ContainerBuilder::build).
    pub fn define(mut self, name: &str, definition: impl Into<Descriptor>) -> Self {
        ProviderRegistry::define(&mut self, name, definition.into());
        self
    }

    /// Defines every `(name, definition)` pair, in order.
    pub fn add_definitions<I, K, D>(mut self, definitions: I) -> Self
    where
        I: IntoIterator<Item = (K, D)>,
        K: AsRef<str>,
        D: Into<Descriptor>,
    {
        for (name, definition) in definitions {
            ProviderRegistry::define(&mut self, name.as_ref(), definition.into());
        }
        self
    }

    /// Adds a [`Provider`] module.
    pub fn add_provider(mut self, provider: &dyn Provider) -> Self {
        debug!(provider = provider.name(), "Registering provider");
        provider.register(&mut self);
        self
    }

    /// Adds a definition source, consulted after the builder's own
    /// definitions and before autowiring.
    pub fn add_source(mut self, source: impl DefinitionSource + 'static) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    /// Makes `T` available for autowiring under its class name.
    pub fn register_class<T: Injectable>(mut self) -> Self {
        self.classes.push(ClassInfo::of::<T>());
        self
    }

    /// Replaces the default [`Autowirer`].
    pub fn injector(mut self, injector: impl Injector + 'static) -> Self {
        self.injector = Arc::new(injector);
        self
    }

    /// Replaces the default [`DeferredProxyFactory`].
    pub fn proxy_factory(mut self, proxies: impl ProxyFactory + 'static) -> Self {
        self.proxies = Arc::new(proxies);
        self
    }

    /// Builds the container.
    ///
    /// With validation on, checks that every alias target, explicit
    /// reference and required constructor parameter can be resolved, and
    /// that no eager construction chain loops.
    #[instrument(skip(self), name = "container_build")]
    pub fn build(mut self) -> Result<Container> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }

        info!(
            definitions = self.registry.len(),
            sources = self.sources.len(),
            "Building container"
        );

        let validate = self.settings.validate;
        let container = self.assemble();
        if validate {
            let definitions = container.inner.definitions.read();
            GraphValidator::new(&definitions).validate()?;
        }

        info!("Container built successfully ✓");
        Ok(container)
    }

    fn assemble(self) -> Container {
        let catalog = Arc::new(ClassCatalog::new());
        if self.settings.discover_classes {
            catalog.discover();
        }
        for class in self.classes {
            catalog.register(class);
        }

        let definitions = SourceChain {
            registry: self.registry,
            sources: self.sources,
            autowiring: self
                .settings
                .autowiring
                .then(|| Autowiring::new(catalog.clone())),
        };

        Container {
            inner: Arc::new(Inner {
                definitions: RwLock::new(definitions),
                cache: DashMap::new(),
                catalog,
                injector: self.injector,
                proxies: self.proxies,
                settings: self.settings,
            }),
        }
    }
}

impl ProviderRegistry for ContainerBuilder {
    fn define(&mut self, name: &str, definition: Descriptor) {
        if !is_valid_name(name) {
            self.error
                .get_or_insert_with(|| SanduqError::InvalidName(name.to_string()));
            return;
        }
        self.registry.insert(definition.into_definition(name));
    }

    fn register_class(&mut self, class: ClassInfo) {
        self.classes.push(class);
    }
}

impl fmt::Debug for ContainerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerBuilder")
            .field("settings", &self.settings)
            .field("definitions", &self.registry.len())
            .field("sources", &self.sources.len())
            .field("classes", &self.classes.len())
            .finish_non_exhaustive()
    }
}

// ═══════════════════════════════════════════
// Container
// ═══════════════════════════════════════════

struct Inner {
    definitions: RwLock<SourceChain>,
    cache: DashMap<String, Arc<OnceCell<Instance>>>,
    catalog: Arc<ClassCatalog>,
    injector: Arc<dyn Injector>,
    proxies: Arc<dyn ProxyFactory>,
    settings: Settings,
}

/// Thread-safe, name-based IoC container.
///
/// Cloning is cheap and yields a handle to the same container.
#[derive(Clone)]
pub struct Container {
    inner: Arc<Inner>,
}

impl Container {
    /// A container with default settings and no definitions.
    pub fn new() -> Self {
        ContainerBuilder::new().assemble()
    }

    /// Create a new builder.
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    /// Resolves `name` eagerly as a `T`.
    ///
    /// ```rust,ignore
    /// let mailer: Ref<Mailer> = container.get("Mailer")?;
    /// ```
    pub fn get<T: Send + Sync + 'static>(&self, name: &str) -> Result<Ref<T>> {
        self.resolve(name, false)?.typed(name)
    }

    /// Resolves `name` as a `T`; class entries come back as deferred
    /// proxies that are built on first use.
    pub fn get_proxy<T: Send + Sync + 'static>(&self, name: &str) -> Result<Ref<T>> {
        self.resolve(name, true)?.typed(name)
    }

    /// Resolves `name` without a type check.
    pub fn resolve(&self, name: &str, deferred: bool) -> Result<Instance> {
        let chain = ResolutionChain::new();
        let instance = self.resolve_in(name, deferred, &chain);
        debug_assert!(chain.is_idle());
        instance
    }

    /// Returns `true` if `name` is cached or has a definition.
    ///
    /// Never constructs anything. Fails only for an invalid name.
    pub fn has(&self, name: &str) -> Result<bool> {
        ensure_valid(name)?;
        Ok(self.is_cached(name)
            || self.inner.definitions.read().contains(name)
            || name == SELF_NAME)
    }

    /// Returns `true` if an instance is cached under `name`.
    pub fn is_cached(&self, name: &str) -> bool {
        self.inner
            .cache
            .get(name)
            .is_some_and(|slot| slot.get().is_some())
    }

    /// Defines `name`, replacing any earlier definition and dropping any
    /// instance cached under it.
    ///
    /// ```rust,ignore
    /// container.set("retries", value(3u32))?;
    /// container.set("Mailer", create::<SmtpMailer>().prototype())?;
    /// ```
    pub fn set(&self, name: &str, definition: impl Into<Descriptor>) -> Result<()> {
        ensure_valid(name)?;
        let definition = definition.into().into_definition(name);

        let mut definitions = self.inner.definitions.write();
        self.evict(name);
        definitions.registry.insert(definition);
        Ok(())
    }

    /// Shortcut for `set(name, value(value))`.
    pub fn set_value<T: Send + Sync + 'static>(&self, name: &str, value: T) -> Result<()> {
        self.set(name, Instance::new(value))
    }

    /// Defines every `(name, definition)` pair in one step.
    ///
    /// Either all names are valid and every pair is stored, or nothing
    /// changes. For repeated names the last pair wins.
    pub fn add_definitions<I, K, D>(&self, definitions: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, D)>,
        K: AsRef<str>,
        D: Into<Descriptor>,
    {
        let definitions = definitions
            .into_iter()
            .map(|(name, definition)| {
                let name = name.as_ref();
                ensure_valid(name)?;
                Ok(definition.into().into_definition(name))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut stored = self.inner.definitions.write();
        for definition in definitions {
            self.evict(definition.name());
            stored.registry.insert(definition);
        }
        Ok(())
    }

    /// Injects the properties of an existing object.
    ///
    /// Uses the class definition registered for `T`'s class, if there is
    /// one; otherwise `target` is returned untouched. Constructor
    /// parameters are not involved.
    pub fn inject_on<'a, T: Injectable>(&self, target: &'a mut T) -> Result<&'a mut T> {
        let Some(definition) = self.class_definition_for::<T>() else {
            trace!(class = type_name::<T>(), "No class definition, nothing injected");
            return Ok(target);
        };

        debug!(class = %definition.class().id(), "Injecting properties");
        let chain = ResolutionChain::new();
        let resolver = ChainResolver {
            container: self,
            chain: &chain,
        };
        self.inner
            .injector
            .inject_properties(&definition, &mut *target, &resolver)?;
        Ok(target)
    }

    /// The classes available for autowiring.
    pub fn catalog(&self) -> &ClassCatalog {
        &self.inner.catalog
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    // ── Resolution ──

    fn resolve_in(&self, name: &str, deferred: bool, chain: &ResolutionChain) -> Result<Instance> {
        ensure_valid(name)?;

        if let Some(instance) = self.cached(name) {
            trace!(name, "Cache hit");
            return Ok(instance);
        }

        let _entered = chain.enter_name(name)?;

        // Lookup and slot share one read guard, so `set` cannot slip
        // between them and leave an old instance cached.
        let (definition, slot) = {
            let definitions = self.inner.definitions.read();
            let Some(definition) = definitions.lookup(name) else {
                if name == SELF_NAME {
                    return Ok(Instance::new(self.clone()));
                }
                return Err(not_found(name, &definitions, chain));
            };
            let slot = definition.is_cached().then(|| self.slot(name));
            (definition, slot)
        };

        match slot {
            Some(slot) => {
                let _waiting = WaitGuard::enter(&*slot, name)?;
                slot.get_or_try_init(|| {
                    let _filling = FillGuard::enter(&*slot, name);
                    self.produce(&definition, deferred, chain)
                })
                .cloned()
            }
            None => self.produce(&definition, deferred, chain),
        }
    }

    fn produce(&self, definition: &Definition, deferred: bool, chain: &ResolutionChain) -> Result<Instance> {
        match definition {
            Definition::Value(def) => Ok(def.value.clone()),
            Definition::Factory(def) => {
                debug!(name = %def.name, "Invoking factory");
                (def.factory)(&ChainResolver {
                    container: self,
                    chain,
                })
            }
            Definition::Alias(def) => {
                trace!(name = %def.name, target = %def.target, "Following alias");
                self.resolve_in(&def.target, deferred, chain)
            }
            Definition::Class(def) => {
                if deferred || def.recipe.is_lazy() {
                    self.create_deferred(def)
                } else {
                    self.build(def, chain)
                }
            }
        }
    }

    /// Constructs the class eagerly, guarding against re-entering it.
    fn build(&self, definition: &ClassDefinition, chain: &ResolutionChain) -> Result<Instance> {
        let class = definition.class();
        let _building = chain.enter_class(class.id())?;

        debug!(name = %definition.name, class = %class.id(), "Constructing");
        let resolver = ChainResolver {
            container: self,
            chain,
        };
        let object = self.inner.injector.instantiate(definition, &resolver)?;
        Ok(Instance::from_boxed(object, class.id().type_name()))
    }

    fn create_deferred(&self, definition: &Arc<ClassDefinition>) -> Result<Instance> {
        let container = Arc::downgrade(&self.inner);
        let recipe = definition.clone();

        let initializer: Initializer = Box::new(move || {
            let inner = container.upgrade().ok_or_else(|| SanduqError::ContainerDropped {
                class: recipe.class().name().to_string(),
            })?;
            let _initializing = InitGuard::enter(recipe.class().id())?;
            Container { inner }.build(&recipe, &ResolutionChain::new())
        });

        self.inner.proxies.create(definition.class(), initializer)
    }

    // ── Cache ──

    fn cached(&self, name: &str) -> Option<Instance> {
        self.inner.cache.get(name)?.get().cloned()
    }

    fn slot(&self, name: &str) -> Arc<OnceCell<Instance>> {
        self.inner
            .cache
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    fn evict(&self, name: &str) {
        if self.inner.cache.remove(name).is_some() {
            debug!(name, "Evicted cached instance");
        }
    }

    fn class_definition_for<T: Injectable>(&self) -> Option<Arc<ClassDefinition>> {
        let id = ClassId::of::<T>();
        let matching = |definition: Definition| match definition {
            Definition::Class(def) if *def.class().id() == id => Some(def),
            _ => None,
        };

        let definitions = self.inner.definitions.read();
        definitions
            .lookup(&T::class_name())
            .and_then(matching)
            .or_else(|| {
                definitions
                    .registry
                    .iter()
                    .find_map(|definition| matching(definition.clone()))
            })
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver for Container {
    fn resolve(&self, name: &str, deferred: bool) -> Result<Instance> {
        Container::resolve(self, name, deferred)
    }

    fn has(&self, name: &str) -> Result<bool> {
        Container::has(self, name)
    }
}

/// Containers can be injected; the hint is [`SELF_NAME`].
impl FromInstance for Container {
    fn type_hint() -> Option<String> {
        Some(SELF_NAME.to_string())
    }

    fn from_instance(instance: Instance) -> Result<Self> {
        Ok(instance.typed::<Container>(SELF_NAME)?.try_get()?.clone())
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("definitions", &self.inner.definitions.read().registry.len())
            .field("cached", &self.inner.cache.len())
            .field("classes", &self.inner.catalog.len())
            .field("settings", &self.inner.settings)
            .finish()
    }
}

fn ensure_valid(name: &str) -> Result<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(SanduqError::InvalidName(name.to_string()))
    }
}

fn not_found(name: &str, definitions: &SourceChain, chain: &ResolutionChain) -> SanduqError {
    let mut available = definitions.names();
    available.push(SELF_NAME.to_string());

    SanduqError::NotFound(NotFoundError {
        requested: name.to_string(),
        required_by: chain.requester(),
        suggestions: suggest_names(name, &available, SUGGESTION_LIMIT),
    })
}

// ═══════════════════════════════════════════
// ChainResolver (internal bridge)
// ═══════════════════════════════════════════

/// Resolver handed to factories and the injector; nested lookups share
/// the caller's resolution chain.
struct ChainResolver<'a> {
    container: &'a Container,
    chain: &'a ResolutionChain,
}

impl Resolver for ChainResolver<'_> {
    fn resolve(&self, name: &str, deferred: bool) -> Result<Instance> {
        self.container.resolve_in(name, deferred, self.chain)
    }

    fn has(&self, name: &str) -> Result<bool> {
        self.container.has(name)
    }
}

// ═══════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════

pub mod prelude {
    pub use super::{Container, ContainerBuilder, SELF_NAME, Settings};
    pub use crate::definition::{Argument, ClassRecipe, Descriptor, autowire, create, factory, factory_instance, get, value};
    pub use crate::error::{Result, SanduqError};
    pub use crate::instance::{Instance, Ref};
    pub use crate::introspect::{Arguments, Injectable, ParamSpec};
    pub use crate::provider::{Provider, ProviderRegistry};
    pub use crate::resolver::{Resolver, ResolverExt};
    pub use crate::scope::Scope;
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════
