//! Constructor and property injection.
//!
//! The [`Injector`] turns a [`ClassDefinition`] into a live object. For
//! each constructor parameter, then each property, the value comes from
//! the first of:
//! 1. an explicit override on the definition
//! 2. the entry named by the type hint, when the container has one
//! 3. the parameter's default
//!
//! Anything else is a [`SanduqError::Dependency`]. Errors raised while
//! resolving a dependency are returned unchanged.

use std::any::Any;

use tracing::trace;

use crate::definition::{Argument, ClassDefinition};
use crate::error::{Result, SanduqError};
use crate::instance::Instance;
use crate::introspect::{Arguments, ParamSpec};
use crate::resolver::Resolver;

/// Builds and injects class instances.
pub trait Injector: Send + Sync {
    /// Constructs an instance of the definition's class and injects its
    /// properties.
    fn instantiate(
        &self,
        definition: &ClassDefinition,
        resolver: &dyn Resolver,
    ) -> Result<Box<dyn Any + Send + Sync>>;

    /// Injects properties into an instance that already exists.
    fn inject_properties(
        &self,
        definition: &ClassDefinition,
        target: &mut (dyn Any + Send + Sync),
        resolver: &dyn Resolver,
    ) -> Result<()>;
}

/// The default [`Injector`], resolving dependencies by type hint.
#[derive(Debug, Default, Clone, Copy)]
pub struct Autowirer;

impl Autowirer {
    /// Picks the value for one injection point; `None` means "use the default".
    fn resolve_point(
        &self,
        class: &str,
        point: &ParamSpec,
        argument: Option<&Argument>,
        resolver: &dyn Resolver,
    ) -> Result<Option<Instance>> {
        if let Some(argument) = argument {
            return match argument {
                Argument::Value(value) => Ok(Some(value.clone())),
                Argument::Get(name) => resolver.resolve(name, false).map(Some),
            };
        }

        if let Some(hint) = point.type_hint() {
            if resolver.has(hint)? {
                trace!(class, point = point.name(), hint, "Injecting by type hint");
                return resolver.resolve(hint, false).map(Some);
            }
        }

        if point.has_default() {
            return Ok(None);
        }

        let reason = match point.type_hint() {
            Some(hint) => format!("no entry named {hint:?} and no default value"),
            None => "no type hint, no override and no default value".to_string(),
        };
        Err(SanduqError::dependency(class, point.name(), reason))
    }
}

impl Injector for Autowirer {
    fn instantiate(
        &self,
        definition: &ClassDefinition,
        resolver: &dyn Resolver,
    ) -> Result<Box<dyn Any + Send + Sync>> {
        let class = definition.class();
        let mut args = Arguments::new(class.name());

        for param in class.parameters() {
            let argument = definition.recipe.constructor_override(param.name());
            let value = self.resolve_point(class.name(), param, argument, resolver)?;
            args.push(param.name(), value);
        }

        let mut instance = class.construct(&mut args)?;
        self.inject_properties(definition, &mut *instance, resolver)?;
        Ok(instance)
    }

    fn inject_properties(
        &self,
        definition: &ClassDefinition,
        target: &mut (dyn Any + Send + Sync),
        resolver: &dyn Resolver,
    ) -> Result<()> {
        let class = definition.class();

        for property in class.properties() {
            let argument = definition.recipe.property_override(property.name());
            // Unresolvable optional properties keep their constructed value.
            if let Some(value) = self.resolve_point(class.name(), property, argument, resolver)? {
                class.inject(target, property.name(), value)?;
            }
        }
        Ok(())
    }
}
