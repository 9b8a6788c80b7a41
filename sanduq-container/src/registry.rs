//! Definition sources: where the container looks names up.
//!
//! The container consults, in order: its own mutable
//! [`DefinitionRegistry`] (written by `set` and the builder), any extra
//! [`DefinitionSource`]s, and finally [`Autowiring`] over the class
//! catalog.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::definition::{ClassDefinition, ClassRecipe, Definition};
use crate::introspect::ClassCatalog;

/// Maps names to definitions.
pub trait DefinitionSource: Send + Sync {
    /// Returns the definition for `name`, if this source has one.
    fn lookup(&self, name: &str) -> Option<Definition>;

    /// Names this source can define, for "did you mean?" suggestions.
    fn names(&self) -> Vec<String> {
        Vec::new()
    }
}

/// The container's own, writable definitions.
///
/// Later writes for a name replace earlier ones.
#[derive(Debug, Default)]
pub struct DefinitionRegistry {
    definitions: HashMap<String, Definition>,
}

impl DefinitionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `definition` under its name, returning what it replaced.
    pub fn insert(&mut self, definition: Definition) -> Option<Definition> {
        debug!(
            name = definition.name(),
            kind = definition.kind(),
            "Registered definition"
        );
        self.definitions
            .insert(definition.name().to_string(), definition)
    }

    pub fn get(&self, name: &str) -> Option<&Definition> {
        self.definitions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Iterates over all stored definitions.
    pub fn iter(&self) -> impl Iterator<Item = &Definition> {
        self.definitions.values()
    }

    /// Returns the number of stored definitions.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Returns `true` if nothing is defined.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl DefinitionSource for DefinitionRegistry {
    fn lookup(&self, name: &str) -> Option<Definition> {
        self.definitions.get(name).cloned()
    }

    fn names(&self) -> Vec<String> {
        self.definitions.keys().cloned().collect()
    }
}

/// Defines every catalog class under its class name.
///
/// Autowired classes are singletons, built eagerly, with no overrides:
/// every constructor parameter comes from its type hint or default.
#[derive(Debug, Clone)]
pub struct Autowiring {
    catalog: Arc<ClassCatalog>,
}

impl Autowiring {
    pub fn new(catalog: Arc<ClassCatalog>) -> Self {
        Self { catalog }
    }
}

impl DefinitionSource for Autowiring {
    fn lookup(&self, name: &str) -> Option<Definition> {
        let class = self.catalog.find(name)?;
        trace!(name, class = class.id().type_name(), "Autowiring class");
        Some(Definition::Class(Arc::new(ClassDefinition {
            name: name.to_string(),
            recipe: ClassRecipe::new(class),
        })))
    }

    fn names(&self) -> Vec<String> {
        self.catalog.names()
    }
}

/// The lookup chain: registry first, then extra sources, then autowiring.
pub(crate) struct SourceChain {
    pub registry: DefinitionRegistry,
    pub sources: Vec<Arc<dyn DefinitionSource>>,
    pub autowiring: Option<Autowiring>,
}

impl SourceChain {
    pub fn lookup(&self, name: &str) -> Option<Definition> {
        if let Some(definition) = self.registry.lookup(name) {
            return Some(definition);
        }
        self.sources
            .iter()
            .find_map(|source| source.lookup(name))
            .or_else(|| self.autowiring.as_ref()?.lookup(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registry.contains(name)
            || self.sources.iter().any(|source| source.lookup(name).is_some())
            || self
                .autowiring
                .as_ref()
                .is_some_and(|autowiring| autowiring.catalog.find(name).is_some())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names = self.registry.names();
        for source in &self.sources {
            names.extend(source.names());
        }
        if let Some(autowiring) = &self.autowiring {
            names.extend(autowiring.names());
        }
        names.sort();
        names.dedup();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{create, get, value, Descriptor};
    use crate::error::Result;
    use crate::introspect::{Arguments, Injectable, ParamSpec};

    struct Spool;

    impl Injectable for Spool {
        fn parameters() -> Vec<ParamSpec> {
            Vec::new()
        }

        fn construct(_: &mut Arguments) -> Result<Self> {
            Ok(Spool)
        }
    }

    struct Fixed(&'static str);

    impl DefinitionSource for Fixed {
        fn lookup(&self, name: &str) -> Option<Definition> {
            (name == self.0).then(|| value(0u8).into_definition(name))
        }

        fn names(&self) -> Vec<String> {
            vec![self.0.to_string()]
        }
    }

    fn chain(autowire: bool) -> SourceChain {
        let catalog = Arc::new(ClassCatalog::new());
        catalog.register_class::<Spool>();
        SourceChain {
            registry: DefinitionRegistry::new(),
            sources: vec![Arc::new(Fixed("external"))],
            autowiring: autowire.then(|| Autowiring::new(catalog)),
        }
    }

    #[test]
    fn insert_and_lookup() {
        let mut reg = DefinitionRegistry::new();
        reg.insert(value(1u32).into_definition("answer"));
        assert!(reg.contains("answer"));
        assert_eq!(reg.lookup("answer").map(|d| d.kind()), Some("value"));
        assert!(reg.lookup("question").is_none());
    }

    #[test]
    fn last_write_wins() {
        let mut reg = DefinitionRegistry::new();
        reg.insert(value(1u32).into_definition("x"));
        let replaced = reg.insert(get("y").into_definition("x"));
        assert_eq!(replaced.map(|d| d.kind()), Some("value"));
        assert_eq!(reg.lookup("x").map(|d| d.kind()), Some("alias"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn registry_shadows_sources_and_autowiring() {
        let mut chain = chain(true);
        chain
            .registry
            .insert(Descriptor::from(create::<Spool>().prototype()).into_definition("Spool"));

        match chain.lookup("Spool") {
            Some(Definition::Class(def)) => assert!(!def.recipe.scope().is_cached()),
            other => panic!("Expected registry class definition, got: {other:?}"),
        }
    }

    #[test]
    fn falls_back_to_sources_then_autowiring() {
        let chain = chain(true);
        assert_eq!(chain.lookup("external").map(|d| d.kind()), Some("value"));
        assert_eq!(chain.lookup("Spool").map(|d| d.kind()), Some("class"));
        assert!(chain.lookup("Nothing").is_none());
        assert!(chain.contains("Spool"));
        assert!(!chain.contains("Nothing"));
    }

    #[test]
    fn autowiring_can_be_disabled() {
        let chain = chain(false);
        assert!(chain.lookup("Spool").is_none());
        assert!(!chain.contains("Spool"));
    }

    #[test]
    fn names_cover_every_source() {
        let mut chain = chain(true);
        chain.registry.insert(value(1u8).into_definition("local"));
        assert_eq!(chain.names(), vec!["Spool", "external", "local"]);
    }
}
