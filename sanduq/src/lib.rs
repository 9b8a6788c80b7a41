//! # Sanduq: an IoC container for Rust
//!
//! Resolves entries by name: values, factories, aliases and classes
//! built by constructor injection, with singleton caching, circular
//! dependency detection and lazy proxies.
//!
//! ```rust
//! use sanduq::prelude::*;
//!
//! #[derive(Injectable)]
//! struct Greeter {
//!     #[inject(name = "greeting")]
//!     greeting: String,
//! }
//!
//! let container = Container::builder()
//!     .define("greeting", value(String::from("Salam")))
//!     .build()
//!     .unwrap();
//!
//! let greeter: Ref<Greeter> = container.get("Greeter").unwrap();
//! assert_eq!(greeter.greeting, "Salam");
//! ```

extern crate self as sanduq;

pub use sanduq_container::*;
pub use sanduq_derive::*;
pub use sanduq_support as support;

/// Everything needed to configure and use a container.
pub mod prelude {
    pub use sanduq_container::prelude::*;
    pub use sanduq_derive::Injectable;
}
