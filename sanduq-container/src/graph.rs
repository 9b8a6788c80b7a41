//! Definition graph validation.
//!
//! Validates the definitions at build time:
//! - Checks that alias targets and explicit references exist
//! - Checks that required constructor parameters can be satisfied
//! - Detects alias loops and eager construction cycles
//!
//! All validation happens during [`ContainerBuilder::build()`](crate::container::ContainerBuilder::build),
//! BEFORE the first `get()` call. It is a best-effort pass: factories are
//! opaque and contribute no edges, so runtime cycle detection stays on.

use std::collections::HashSet;

use sanduq_support::naming::suggest_names;
use tracing::{debug, instrument, warn};

use crate::container::SELF_NAME;
use crate::definition::{Argument, ClassDefinition, Definition};
use crate::error::{CircularDependencyError, NotFoundError, Result, SanduqError};
use crate::introspect::ParamSpec;
use crate::registry::SourceChain;

/// Walks the definition graph depth-first from every defined name.
///
/// Edges run from an alias to its target and from a class to each entry
/// its constructor or properties will resolve. Edges into lazy classes are
/// not followed: those resolve to proxies, which break cycles.
pub(crate) struct GraphValidator<'a> {
    definitions: &'a SourceChain,
    /// Currently being visited (for cycle detection)
    visiting: HashSet<String>,
    /// Already validated (cache)
    validated: HashSet<String>,
    /// Current DFS path (for error reporting)
    path: Vec<String>,
}

impl<'a> GraphValidator<'a> {
    pub fn new(definitions: &'a SourceChain) -> Self {
        Self {
            definitions,
            visiting: HashSet::new(),
            validated: HashSet::new(),
            path: Vec::new(),
        }
    }

    /// Validates every definition in the container's own registry.
    ///
    /// # Errors
    /// - [`SanduqError::NotFound`]: an alias or reference points nowhere
    /// - [`SanduqError::Dependency`]: a required parameter has no source
    /// - [`SanduqError::CircularDependency`]: an alias or eager class loop
    #[instrument(skip(self), name = "graph_validation")]
    pub fn validate(&mut self) -> Result<()> {
        let mut roots: Vec<String> = self
            .definitions
            .registry
            .iter()
            .map(|definition| definition.name().to_string())
            .collect();
        roots.sort();

        debug!(definition_count = roots.len(), "Starting definition graph validation");

        for name in &roots {
            self.visit(name)?;
        }

        debug!("Definition graph validation passed ✓");
        Ok(())
    }

    fn visit(&mut self, name: &str) -> Result<()> {
        if self.validated.contains(name) {
            return Ok(());
        }

        if self.visiting.contains(name) {
            let start = self.path.iter().position(|entry| entry == name).unwrap_or(0);
            let mut chain = self.path[start..].to_vec();
            chain.push(name.to_string());

            warn!(cycle = ?chain, "Circular dependency detected!");
            return Err(SanduqError::CircularDependency(CircularDependencyError {
                entry: name.to_string(),
                chain,
            }));
        }

        let Some(definition) = self.definitions.lookup(name) else {
            if name == SELF_NAME {
                return Ok(());
            }
            return Err(self.not_found(name));
        };

        self.visiting.insert(name.to_string());
        self.path.push(name.to_string());

        match &definition {
            Definition::Value(_) | Definition::Factory(_) => {}
            Definition::Alias(alias) => self.follow(&alias.target)?,
            Definition::Class(class) => {
                for target in self.class_edges(class)? {
                    self.follow(&target)?;
                }
            }
        }

        self.path.pop();
        self.visiting.remove(name);
        self.validated.insert(name.to_string());
        Ok(())
    }

    /// Follows an edge out of a class or alias, stopping at lazy classes.
    fn follow(&mut self, target: &str) -> Result<()> {
        match self.definitions.lookup(target) {
            Some(Definition::Class(class)) if class.recipe.is_lazy() => Ok(()),
            _ => self.visit(target),
        }
    }

    /// Names a class will resolve while being built.
    fn class_edges(&self, definition: &ClassDefinition) -> Result<Vec<String>> {
        let class = definition.class();
        let recipe = &definition.recipe;
        let mut edges = Vec::new();

        let points = class
            .parameters()
            .iter()
            .map(|param| (param, recipe.constructor_override(param.name())))
            .chain(
                class
                    .properties()
                    .iter()
                    .map(|property| (property, recipe.property_override(property.name()))),
            );

        for (point, argument) in points {
            if let Some(edge) = self.edge(class.name(), point, argument)? {
                edges.push(edge);
            }
        }
        Ok(edges)
    }

    fn edge(&self, class: &str, point: &ParamSpec, argument: Option<&Argument>) -> Result<Option<String>> {
        match argument {
            Some(Argument::Value(_)) => return Ok(None),
            Some(Argument::Get(name)) => return Ok(Some(name.clone())),
            None => {}
        }

        if let Some(hint) = point.type_hint() {
            if self.definitions.contains(hint) || hint == SELF_NAME {
                return Ok(Some(hint.to_string()));
            }
        }

        if point.has_default() {
            return Ok(None);
        }

        Err(SanduqError::dependency(
            class,
            point.name(),
            match point.type_hint() {
                Some(hint) => format!("no entry named {hint:?} and no default value"),
                None => "no type hint, no override and no default value".to_string(),
            },
        ))
    }

    fn not_found(&self, name: &str) -> SanduqError {
        SanduqError::NotFound(NotFoundError {
            requested: name.to_string(),
            required_by: self.path.last().cloned(),
            suggestions: suggest_names(name, &self.definitions.names(), 3),
        })
    }
}
