//! Providers: reusable bundles of definitions.
//!
//! A provider writes a group of related definitions and classes into a
//! builder, so configuration can be split by domain.
//!
//! # Examples
//! ```rust,ignore
//! struct MailProvider;
//!
//! impl Provider for MailProvider {
//!     fn register(&self, registry: &mut dyn ProviderRegistry) {
//!         registry.define("mail.sender", value(String::from("noreply@example.com")));
//!         registry.define("Mailer", create::<SmtpMailer>().lazy().into());
//!         registry.register_class(ClassInfo::of::<Newsletter>());
//!     }
//! }
//! ```

use crate::definition::Descriptor;
use crate::introspect::ClassInfo;

/// A module that adds related definitions to a container.
///
/// Providers encourage modular configuration. Instead of one giant
/// definition block, split the definitions by domain:
///
/// ```rust,ignore
/// let container = Container::builder()
///     .add_provider(&DatabaseProvider)
///     .add_provider(&MailProvider)
///     .build()?;
/// ```
pub trait Provider: Send + Sync {
    /// Adds definitions and classes.
    ///
    /// Called once, while the container is being built.
    fn register(&self, registry: &mut dyn ProviderRegistry);

    /// Optional: human-readable name for logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// What a [`Provider`] can write to.
///
/// Implemented by `ContainerBuilder`; a separate trait so providers can be
/// tested without building a container.
pub trait ProviderRegistry {
    /// Defines `name`; a later definition for the same name wins.
    fn define(&mut self, name: &str, definition: Descriptor);

    /// Makes a class available for autowiring.
    fn register_class(&mut self, class: ClassInfo);
}
