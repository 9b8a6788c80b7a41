//! Derive macros for Sanduq.
//!
//! Kept apart from `sanduq-macros` so the facade can depend on a normal
//! library crate.

pub use sanduq_macros::Injectable;
