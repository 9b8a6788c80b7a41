//! Core container implementation for Sanduq.

mod chain;

pub mod class;
pub mod container;
pub mod definition;
pub mod error;
mod graph;
pub mod injector;
pub mod instance;
pub mod introspect;
pub mod provider;
pub mod proxy;
pub mod registry;
pub mod resolver;
pub mod scope;

pub use container::{Container, ContainerBuilder, SELF_NAME, Settings, prelude};
pub use definition::{Argument, ClassRecipe, Definition, Descriptor};
pub use error::{Result, SanduqError};
pub use instance::{Instance, Ref};
pub use introspect::{Arguments, ClassInfo, ClassRegistration, FromInstance, Injectable, ParamSpec};
pub use scope::Scope;

#[doc(hidden)]
pub use inventory;
