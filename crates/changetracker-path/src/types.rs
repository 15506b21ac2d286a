//! Type definitions for navigation paths.

use std::fmt;
use std::str::FromStr;

use crate::PathError;

/// One token of a navigation path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathElement {
    /// Field name or map key.
    Name(String),
    /// Sequence index (or integer map key).
    Index(usize),
    /// Zero-argument method call, written `name()`.
    Getter(String),
    /// One-argument method call, written `name(_)`. Only legal as the last token.
    Setter(String),
}

impl PathElement {
    /// Method name for getter and setter calls.
    pub fn method_name(&self) -> Option<&str> {
        match self {
            PathElement::Getter(name) | PathElement::Setter(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_getter(&self) -> bool {
        matches!(self, PathElement::Getter(_))
    }

    pub fn is_setter(&self) -> bool {
        matches!(self, PathElement::Setter(_))
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathElement::Name(name) => f.write_str(name),
            PathElement::Index(idx) => write!(f, "{idx}"),
            PathElement::Getter(name) => write!(f, "{name}()"),
            PathElement::Setter(name) => write!(f, "{name}(_)"),
        }
    }
}

/// A parsed navigation path.
pub type Path = Vec<PathElement>;

/// Access mode of a tracked variable.
///
/// | Mode        | Get | Set | Change detection | Initial value |
/// |-------------|-----|-----|------------------|---------------|
/// | `ReadWrite` | ok  | ok  | yes              | computed      |
/// | `Read`      | ok  | err | yes              | computed      |
/// | `Write`     | err | ok  | no               | computed      |
/// | `Action`    | err | ok  | no               | skipped       |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Access {
    Read,
    Write,
    #[default]
    ReadWrite,
    Action,
}

impl Access {
    pub fn is_readable(self) -> bool {
        matches!(self, Access::Read | Access::ReadWrite)
    }

    pub fn is_writable(self) -> bool {
        matches!(self, Access::Write | Access::ReadWrite | Access::Action)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Access::Read => "read",
            Access::Write => "write",
            Access::ReadWrite => "read-write",
            Access::Action => "action",
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts both the short (`r`, `w`, `rw`) and long spellings.
impl FromStr for Access {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "r" | "read" => Ok(Access::Read),
            "w" | "write" => Ok(Access::Write),
            "rw" | "read-write" => Ok(Access::ReadWrite),
            "action" => Ok(Access::Action),
            other => Err(PathError::InvalidAccess(other.to_string())),
        }
    }
}
