//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for crmdesk
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum CrmError {
    /// Invalid, unreadable or unparsable configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for crmdesk operations
pub type Result<T> = std::result::Result<T, CrmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CrmError::Config("missing base url".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing base url");
    }

    #[test]
    fn test_error_serializes_with_tag() {
        let err = CrmError::Config("timeout must be positive".to_string());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["type"], "Config");
        assert_eq!(json["message"], "timeout must be positive");
    }
}
