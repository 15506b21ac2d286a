use std::fmt;

use serde::{Deserialize, Serialize};

/// Delivery priority of a value or property change.
///
/// Ordered `Low < Medium < High`; change reports list high first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low = -1,
    #[default]
    Medium = 0,
    High = 1,
}

impl Priority {
    /// Emission order of change report blocks.
    pub const REPORT_ORDER: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    /// Case-insensitive; anything unrecognized is `Medium`.
    ///
    /// # Example
    ///
    /// ```
    /// use changetracker::Priority;
    ///
    /// assert_eq!(Priority::parse("HIGH"), Priority::High);
    /// assert_eq!(Priority::parse("low"), Priority::Low);
    /// assert_eq!(Priority::parse("urgent"), Priority::Medium);
    /// ```
    pub fn parse(s: &str) -> Priority {
        Self::from_suffix(s).unwrap_or_default()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    fn from_suffix(s: &str) -> Option<Priority> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split an optional `:low`, `:medium` or `:high` suffix off a property name.
///
/// Only the last `:` is considered; an unrecognized suffix stays part of the
/// name.
///
/// # Example
///
/// ```
/// use changetracker::{parse_property_name, Priority};
///
/// assert_eq!(parse_property_name("label:High"), ("label", Priority::High));
/// assert_eq!(parse_property_name("a:b:low"), ("a:b", Priority::Low));
/// assert_eq!(parse_property_name("url:8080"), ("url:8080", Priority::Medium));
/// ```
pub fn parse_property_name(name: &str) -> (&str, Priority) {
    if let Some((base, suffix)) = name.rsplit_once(':') {
        if let Some(priority) = Priority::from_suffix(suffix) {
            return (base, priority);
        }
    }
    (name, Priority::Medium)
}
