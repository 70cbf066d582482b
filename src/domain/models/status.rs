//! Check status model.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Verdict of a single check, ordered by severity for filtering and summaries.
///
/// Serialized by name (`"Success"`), never by discriminant.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Status {
    /// The check did not apply to this environment.
    #[default]
    None,
    Success,
    Warning,
    Failure,
    Error,
    Info,
}

impl Status {
    /// Every status, in severity order.
    pub const ALL: [Status; 6] = [
        Self::None,
        Self::Success,
        Self::Warning,
        Self::Failure,
        Self::Error,
        Self::Info,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Success => "Success",
            Self::Warning => "Warning",
            Self::Failure => "Failure",
            Self::Error => "Error",
            Self::Info => "Info",
        }
    }

    /// Case-insensitive lookup used by overrides and the status filter.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" => Some(Self::None),
            "success" => Some(Self::Success),
            "warning" => Some(Self::Warning),
            "failure" => Some(Self::Failure),
            "error" => Some(Self::Error),
            "info" => Some(Self::Info),
            _ => None,
        }
    }

    /// True for anything that needs the user's attention.
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::None | Self::Success | Self::Info)
    }

    /// Whether a result with this status may carry a payload for dependents.
    /// Warnings still do.
    pub fn has_payload(&self) -> bool {
        !matches!(self, Self::None | Self::Error | Self::Failure)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order() {
        assert!(Status::None < Status::Success);
        assert!(Status::Success < Status::Warning);
        assert!(Status::Warning < Status::Failure);
        assert!(Status::Failure < Status::Error);
    }

    #[test]
    fn test_is_failure() {
        assert!(!Status::None.is_failure());
        assert!(!Status::Success.is_failure());
        assert!(!Status::Info.is_failure());
        assert!(Status::Warning.is_failure());
        assert!(Status::Failure.is_failure());
        assert!(Status::Error.is_failure());
    }

    #[test]
    fn test_has_payload() {
        assert!(Status::Success.has_payload());
        assert!(Status::Warning.has_payload());
        assert!(Status::Info.has_payload());
        assert!(!Status::None.has_payload());
        assert!(!Status::Failure.has_payload());
        assert!(!Status::Error.has_payload());
    }

    #[test]
    fn test_from_str_is_case_insensitive() {
        assert_eq!(Status::from_str("WARNING"), Some(Status::Warning));
        assert_eq!(Status::from_str(" failure "), Some(Status::Failure));
        assert_eq!(Status::from_str("broken"), None);
    }

    #[test]
    fn test_serializes_by_name() {
        assert_eq!(serde_json::to_string(&Status::Warning).unwrap(), "\"Warning\"");
    }
}
