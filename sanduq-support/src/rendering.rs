//! Text rendering for resolution diagnostics.

/// Renders a resolution chain as `A → B → A`.
///
/// ```
/// use sanduq_support::rendering::render_chain;
///
/// let chain = ["UserService", "UserRepo", "Database", "UserService"];
/// assert_eq!(render_chain(&chain), "UserService → UserRepo → Database → UserService");
/// ```
pub fn render_chain(chain: &[impl AsRef<str>]) -> String {
    chain
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(" → ")
}

/// Renders a bulleted list, one entry per line, each prefixed by `indent`.
///
/// Returns an empty string for an empty list.
pub fn render_list(items: &[impl AsRef<str>], indent: &str) -> String {
    items
        .iter()
        .map(|item| format!("\n{indent}- {}", item.as_ref()))
        .collect()
}
