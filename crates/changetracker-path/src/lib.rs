//! Navigation paths for changetracker variables.
//!
//! A path is a dot-separated token sequence, optionally followed by
//! `?key=value&...` query parameters that are consumed as variable
//! properties:
//!
//! - `Name`: field name or map key
//! - `0`, `12`: sequence index (digits only, no leading zero)
//! - `GetName()`: zero-argument getter call
//! - `SetName(_)`: one-argument setter call, last token only
//!
//! # Example
//!
//! ```
//! use changetracker_path::{parse_path, split_query, format_path, PathElement};
//!
//! let (path, query) = split_query("Address.City?priority=high");
//! assert_eq!(path, "Address.City");
//! assert_eq!(query, vec![("priority".to_string(), "high".to_string())]);
//!
//! let parsed = parse_path("Tags.0.GetName()");
//! assert_eq!(
//!     parsed,
//!     vec![
//!         PathElement::Name("Tags".into()),
//!         PathElement::Index(0),
//!         PathElement::Getter("GetName".into()),
//!     ]
//! );
//! assert_eq!(format_path(&parsed), "Tags.0.GetName()");
//! ```

use thiserror::Error;

pub mod types;
pub use types::{Access, Path, PathElement};

pub mod validate;
pub use validate::{validate_access_path, validate_path};

/// Split a raw path into its path part and `?key=value&...` query pairs.
///
/// Pairs are returned in order; a later duplicate key wins when the caller
/// collects them into a map. A pair without `=` yields an empty value and
/// empty pairs are skipped.
///
/// # Example
///
/// ```
/// use changetracker_path::split_query;
///
/// assert_eq!(split_query("a.b"), ("a.b", vec![]));
/// let (path, query) = split_query("a.b?width=1&flag&&height=2");
/// assert_eq!(path, "a.b");
/// assert_eq!(
///     query,
///     vec![
///         ("width".to_string(), "1".to_string()),
///         ("flag".to_string(), String::new()),
///         ("height".to_string(), "2".to_string()),
///     ]
/// );
/// ```
pub fn split_query(raw: &str) -> (&str, Vec<(String, String)>) {
    let Some((path, query)) = raw.split_once('?') else {
        return (raw, Vec::new());
    };
    let pairs = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect();
    (path, pairs)
}

/// Classify a single path token.
///
/// # Example
///
/// ```
/// use changetracker_path::{parse_element, PathElement};
///
/// assert_eq!(parse_element("7"), PathElement::Index(7));
/// assert_eq!(parse_element("07"), PathElement::Name("07".into()));
/// assert_eq!(parse_element("Value()"), PathElement::Getter("Value".into()));
/// assert_eq!(parse_element("SetValue(_)"), PathElement::Setter("SetValue".into()));
/// ```
pub fn parse_element(token: &str) -> PathElement {
    if is_valid_index(token) {
        if let Ok(idx) = token.parse::<usize>() {
            return PathElement::Index(idx);
        }
    }
    if let Some(name) = token.strip_suffix("(_)") {
        return PathElement::Setter(name.to_string());
    }
    if let Some(name) = token.strip_suffix("()") {
        return PathElement::Getter(name.to_string());
    }
    PathElement::Name(token.to_string())
}

/// Parse a dotted path (without query) into path elements.
///
/// The empty string is the empty path. Parsing never fails; shape errors
/// are reported by [`validate_path`].
pub fn parse_path(path: &str) -> Path {
    if path.is_empty() {
        return Vec::new();
    }
    path.split('.').map(parse_element).collect()
}

/// Parse and validate a dotted path in one step.
pub fn parse_valid_path(path: &str) -> Result<Path, PathError> {
    let parsed = parse_path(path);
    validate_path(&parsed)?;
    Ok(parsed)
}

/// Format path elements back into the dotted form.
pub fn format_path(path: &[PathElement]) -> String {
    let mut out = String::new();
    for (i, element) in path.iter().enumerate() {
        if i > 0 {
            out.push('.');
        }
        out.push_str(&element.to_string());
    }
    out
}

/// Check if a string represents a valid non-negative integer index.
///
/// # Example
///
/// ```
/// use changetracker_path::is_valid_index;
///
/// assert!(is_valid_index("0"));
/// assert!(is_valid_index("123"));
/// assert!(!is_valid_index("012"));
/// assert!(!is_valid_index("-1"));
/// assert!(!is_valid_index(""));
/// ```
pub fn is_valid_index(index: &str) -> bool {
    if index.is_empty() {
        return false;
    }
    let bytes = index.as_bytes();
    if bytes.len() > 1 && bytes[0] == b'0' {
        return false;
    }
    bytes.iter().all(|&b| b.is_ascii_digit())
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("empty path segment at position {position}")]
    EmptySegment { position: usize },
    #[error("setter call {element:?} must be at end of path (found at position {position})")]
    SetterNotTerminal { element: String, position: usize },
    #[error("invalid access value {0:?} (must be r, w, rw, or action)")]
    InvalidAccess(String),
    #[error("path ending in {element:?} is not compatible with access {access}")]
    AccessPathMismatch { access: Access, element: String },
}
