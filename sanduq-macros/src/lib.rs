//! Procedural macros for Sanduq.
//!
//! Use them through the `sanduq` crate, which re-exports them.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod injectable;

/// Implements `sanduq::Injectable` for a struct with named fields (or a
/// unit struct), and registers it for class discovery.
///
/// Every field is a constructor parameter unless marked as a property.
/// Field attributes:
/// - `#[inject(name = "entry")]` resolves the field from `entry` instead
///   of the field type's hint
/// - `#[inject(default)]` falls back to `Default::default()` when nothing
///   can be resolved
/// - `#[inject(property)]` injects the field after construction; it starts
///   out as `Default::default()`
///
/// `#[injectable(name = "...")]` on the struct replaces the class name.
///
/// ```rust,ignore
/// #[derive(Injectable)]
/// struct Newsletter {
///     mailer: Ref<Mailer>,
///     #[inject(name = "newsletter.subject")]
///     subject: String,
///     #[inject(default)]
///     batch_size: usize,
///     #[inject(property)]
///     audit: Option<Ref<AuditLog>>,
/// }
/// ```
#[proc_macro_derive(Injectable, attributes(injectable, inject))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match injectable::expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.write_errors().into(),
    }
}
