//! Element id validation and generation.
//!
//! Ids follow the XHTML 1.0 compatibility rule `[A-Za-z][A-Za-z0-9:_.-]*`.
//! Generated ids are derived from an element's label: readable where the
//! label allows, and falling back to a per-kind prefix otherwise.

/// Characters allowed after the first one in an id.
#[inline]
fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, ':' | '_' | '.' | '-')
}

/// Check an id against `[A-Za-z][A-Za-z0-9:_.-]*`.
///
/// # Examples
///
/// ```
/// use pagemodel::is_valid_id;
///
/// assert!(is_valid_id("chapter-1"));
/// assert!(is_valid_id("a:b_c.d"));
/// assert!(!is_valid_id("1st"));
/// assert!(!is_valid_id("two words"));
/// assert!(!is_valid_id(""));
/// ```
pub fn is_valid_id(id: &str) -> bool {
    let mut chars = id.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => chars.all(is_id_char),
        _ => false,
    }
}

/// Generate an id candidate from arbitrary text.
///
/// Leading characters are skipped up to the first ASCII letter. From there,
/// spaces become `-`, ASCII letters are lower-cased, and anything outside
/// `[A-Za-z0-9:_.-]` is dropped. When the template has no ASCII letter at all
/// the `fallback` prefix is used as is; it must itself be a valid id.
///
/// # Examples
///
/// ```
/// use pagemodel::generate_id_prefix;
///
/// assert_eq!(generate_id_prefix("Chapter One", "heading"), "chapter-one");
/// assert_eq!(generate_id_prefix("1. Getting Started!", "heading"), "getting-started");
/// assert_eq!(generate_id_prefix("42", "heading"), "heading");
/// ```
pub fn generate_id_prefix(template: &str, fallback: &str) -> String {
    debug_assert!(is_valid_id(fallback), "invalid fallback prefix: {fallback:?}");
    let Some(start) = template.find(|c: char| c.is_ascii_alphabetic()) else {
        return fallback.to_string();
    };
    let id: String = template[start..]
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('-'),
            c if is_id_char(c) => Some(c.to_ascii_lowercase()),
            _ => None,
        })
        .collect();
    debug_assert!(is_valid_id(&id));
    id
}

/// Find the first of `base`, `base-2`, `base-3`, ... that is not taken.
///
/// # Examples
///
/// ```
/// use pagemodel::unique_id;
///
/// let taken = ["heading", "heading-2"];
/// assert_eq!(unique_id("heading", |id| taken.contains(&id)), "heading-3");
/// assert_eq!(unique_id("intro", |id| taken.contains(&id)), "intro");
/// ```
pub fn unique_id(base: &str, is_taken: impl Fn(&str) -> bool) -> String {
    if !is_taken(base) {
        return base.to_string();
    }
    let mut candidate = String::with_capacity(base.len() + 4);
    for n in 2u64.. {
        candidate.clear();
        candidate.push_str(base);
        candidate.push('-');
        candidate.push_str(&n.to_string());
        if !is_taken(&candidate) {
            break;
        }
    }
    candidate
}
