//! Response actions supported by the lookup endpoint.

use std::fmt;
use std::str::FromStr;

use crate::error::ProjectionError;

/// Requested response shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Payload as a JSON body.
    Raw,
    /// Stored document as a file attachment.
    Download,
    /// Payload rendered as HTML.
    WebView,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Raw, Action::Download, Action::WebView];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Download => "download",
            Self::WebView => "web-view",
        }
    }
}

impl FromStr for Action {
    type Err = ProjectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(Self::Raw),
            "download" => Ok(Self::Download),
            "web-view" => Ok(Self::WebView),
            other => Err(ProjectionError::InvalidAction(other.to_string())),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_actions() {
        for action in Action::ALL {
            assert_eq!(action.as_str().parse::<Action>(), Ok(action));
        }
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        assert_eq!(
            "RAW".parse::<Action>(),
            Err(ProjectionError::InvalidAction("RAW".to_string()))
        );
    }

    #[test]
    fn test_unknown_action() {
        assert!(matches!(
            "delete".parse::<Action>(),
            Err(ProjectionError::InvalidAction(a)) if a == "delete"
        ));
        assert!("webview".parse::<Action>().is_err());
        assert!("".parse::<Action>().is_err());
    }
}
