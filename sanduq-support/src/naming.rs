//! Entry names and class names.
//!
//! Entries are addressed by plain strings. Classes get a short name
//! derived from their Rust type name, so `my_app::mail::Mailer` is
//! addressable as `Mailer`.

/// Returns `true` if `name` can address a container entry.
///
/// A name must be non-empty and must not start or end with whitespace.
///
/// ```
/// use sanduq_support::naming::is_valid_name;
///
/// assert!(is_valid_name("db.url"));
/// assert!(!is_valid_name(""));
/// assert!(!is_valid_name(" Mailer"));
/// ```
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.trim() == name
}

/// Strips module paths from a fully qualified type name.
///
/// ```
/// use sanduq_support::naming::short_type_name;
///
/// assert_eq!(short_type_name("my_app::services::UserService"), "UserService");
/// assert_eq!(
///     short_type_name("alloc::sync::Arc<dyn my_app::traits::Logger>"),
///     "Arc<dyn Logger>"
/// );
/// ```
pub fn short_type_name(full_name: &str) -> String {
    let mut result = String::with_capacity(full_name.len());
    let mut segment = String::new();
    let mut chars = full_name.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                segment.clear();
            }
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | '&' | ';' => {
                result.push_str(&segment);
                result.push(ch);
                segment.clear();
            }
            _ => segment.push(ch),
        }
    }

    result.push_str(&segment);
    result
}

/// Picks up to `limit` names from `available` that look like `requested`.
///
/// Substring matches rank first, then names sharing a common prefix of at
/// least three characters. Matching is case-insensitive.
pub fn suggest_names<S: AsRef<str>>(requested: &str, available: &[S], limit: usize) -> Vec<String> {
    let wanted = requested.to_lowercase();

    let mut scored: Vec<(&str, usize)> = available
        .iter()
        .map(AsRef::as_ref)
        .filter(|name| *name != requested)
        .filter_map(|name| {
            let candidate = name.to_lowercase();
            if candidate.contains(&wanted) || wanted.contains(&candidate) {
                return Some((name, 100));
            }

            let common = candidate
                .chars()
                .zip(wanted.chars())
                .take_while(|(a, b)| a == b)
                .count();
            (common >= 3).then_some((name, common * 10))
        })
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    scored.dedup_by(|a, b| a.0 == b.0);
    scored
        .into_iter()
        .take(limit)
        .map(|(name, _)| name.to_string())
        .collect()
}
