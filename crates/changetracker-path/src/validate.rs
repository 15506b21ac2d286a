//! Validation functions for navigation paths.

use crate::types::{Access, PathElement};
use crate::PathError;

/// Validate the shape of a parsed path.
///
/// # Errors
///
/// Returns an error if:
/// - a token is empty (`a..b`, a trailing `.`, or a bare `()`)
/// - a setter call `name(_)` appears anywhere but in the last position
///
/// # Example
///
/// ```
/// use changetracker_path::{parse_path, validate_path};
///
/// validate_path(&parse_path("Address.City")).unwrap();
/// validate_path(&parse_path("Inner().SetValue(_)")).unwrap();
/// validate_path(&parse_path("SetValue(_).Name")).unwrap_err();
/// ```
pub fn validate_path(path: &[PathElement]) -> Result<(), PathError> {
    let last = path.len().saturating_sub(1);
    for (i, element) in path.iter().enumerate() {
        match element {
            PathElement::Name(name) | PathElement::Getter(name) if name.is_empty() => {
                return Err(PathError::EmptySegment { position: i });
            }
            PathElement::Setter(name) if name.is_empty() => {
                return Err(PathError::EmptySegment { position: i });
            }
            PathElement::Setter(_) if i != last => {
                return Err(PathError::SetterNotTerminal {
                    element: element.to_string(),
                    position: i,
                });
            }
            _ => {}
        }
    }
    Ok(())
}

/// Validate that an access mode is compatible with the terminal path element.
///
/// - a getter terminal `name()` requires `read` or `action`
/// - a setter terminal `name(_)` requires `write` or `action`
/// - names and indices accept every mode
///
/// A `read-write` variable ending in a getter is rejected: the getter cannot
/// be written back through.
///
/// # Example
///
/// ```
/// use changetracker_path::{parse_path, validate_access_path, Access};
///
/// validate_access_path(Access::Read, &parse_path("GetName()")).unwrap();
/// validate_access_path(Access::ReadWrite, &parse_path("GetName()")).unwrap_err();
/// validate_access_path(Access::Action, &parse_path("SetName(_)")).unwrap();
/// ```
pub fn validate_access_path(access: Access, path: &[PathElement]) -> Result<(), PathError> {
    let Some(last) = path.last() else {
        return Ok(());
    };
    let allowed = match last {
        PathElement::Getter(_) => matches!(access, Access::Read | Access::Action),
        PathElement::Setter(_) => matches!(access, Access::Write | Access::Action),
        PathElement::Name(_) | PathElement::Index(_) => true,
    };
    if allowed {
        Ok(())
    } else {
        Err(PathError::AccessPathMismatch {
            access,
            element: last.to_string(),
        })
    }
}
