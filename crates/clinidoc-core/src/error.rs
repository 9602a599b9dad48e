use thiserror::Error;

/// Core error types for clinical record operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Not found: {kind}/{id}")]
    NotFound { kind: String, id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Encounter {id} is locked in status {status}")]
    EncounterLocked { id: String, status: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid SOAP section: {0}")]
    InvalidSection(String),

    #[error("Unknown vital type: {0}")]
    UnknownVitalType(String),

    #[error("Unsupported bundle type: {0}")]
    UnsupportedBundleType(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Invalid datetime: {0}")]
    InvalidDateTime(String),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a new NotFound error
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Create a new Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a new EncounterLocked error
    pub fn encounter_locked(id: impl Into<String>, status: impl std::fmt::Display) -> Self {
        Self::EncounterLocked {
            id: id.into(),
            status: status.to_string(),
        }
    }

    /// Create a new Conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Create a new InvalidSection error
    pub fn invalid_section(section: impl Into<String>) -> Self {
        Self::InvalidSection(section.into())
    }

    /// Create a new UnknownVitalType error
    pub fn unknown_vital_type(name: impl Into<String>) -> Self {
        Self::UnknownVitalType(name.into())
    }

    /// Create a new UnsupportedBundleType error
    pub fn unsupported_bundle_type(bundle_type: impl Into<String>) -> Self {
        Self::UnsupportedBundleType(bundle_type.into())
    }

    /// Create a new Timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout(message.into())
    }

    /// Create a new InvalidDateTime error
    pub fn invalid_date_time(message: impl Into<String>) -> Self {
        Self::InvalidDateTime(message.into())
    }

    /// Check if this error is a client error (caller mistake)
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Timeout(_))
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Validation(_) | Self::InvalidSection(_) | Self::InvalidDateTime(_) => {
                ErrorCategory::Validation
            }
            Self::EncounterLocked { .. } => ErrorCategory::Locked,
            Self::Conflict(_) => ErrorCategory::Conflict,
            Self::UnknownVitalType(_) | Self::UnsupportedBundleType(_) => {
                ErrorCategory::Unsupported
            }
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::JsonError(_) => ErrorCategory::Serialization,
        }
    }
}

/// Error categories for monitoring and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    NotFound,
    Validation,
    Locked,
    Conflict,
    Unsupported,
    Timeout,
    Serialization,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Validation => write!(f, "validation"),
            Self::Locked => write!(f, "locked"),
            Self::Conflict => write!(f, "conflict"),
            Self::Unsupported => write!(f, "unsupported"),
            Self::Timeout => write!(f, "timeout"),
            Self::Serialization => write!(f, "serialization"),
        }
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let err = CoreError::not_found("Encounter", "enc-1");
        assert_eq!(err.to_string(), "Not found: Encounter/enc-1");
        assert!(err.is_client_error());
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }

    #[test]
    fn test_encounter_locked_error() {
        let err = CoreError::encounter_locked("enc-1", "signed");
        assert_eq!(err.to_string(), "Encounter enc-1 is locked in status signed");
        assert_eq!(err.category(), ErrorCategory::Locked);
    }

    #[test]
    fn test_invalid_section_error() {
        let err = CoreError::invalid_section("narrative");
        assert_eq!(err.to_string(), "Invalid SOAP section: narrative");
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn test_conflict_error() {
        let err = CoreError::conflict("encounter enc-1 already signed");
        assert!(err.to_string().contains("already signed"));
        assert_eq!(err.category(), ErrorCategory::Conflict);
    }

    #[test]
    fn test_unknown_vital_type_error() {
        let err = CoreError::unknown_vital_type("shoe_size");
        assert_eq!(err.to_string(), "Unknown vital type: shoe_size");
        assert_eq!(err.category(), ErrorCategory::Unsupported);
    }

    #[test]
    fn test_unsupported_bundle_type_error() {
        let err = CoreError::unsupported_bundle_type("searchset");
        assert_eq!(err.category(), ErrorCategory::Unsupported);
    }

    #[test]
    fn test_timeout_is_not_client_error() {
        let err = CoreError::timeout("transaction exceeded 5000ms");
        assert!(!err.is_client_error());
        assert_eq!(err.category(), ErrorCategory::Timeout);
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err: serde_json::Error =
            serde_json::from_str::<serde_json::Value>("{ bad json").unwrap_err();
        let core_err: CoreError = json_err.into();
        assert!(matches!(core_err, CoreError::JsonError(_)));
        assert_eq!(core_err.category(), ErrorCategory::Serialization);
    }

    #[test]
    fn test_error_categories_display() {
        assert_eq!(ErrorCategory::NotFound.to_string(), "not_found");
        assert_eq!(ErrorCategory::Validation.to_string(), "validation");
        assert_eq!(ErrorCategory::Locked.to_string(), "locked");
        assert_eq!(ErrorCategory::Conflict.to_string(), "conflict");
        assert_eq!(ErrorCategory::Unsupported.to_string(), "unsupported");
        assert_eq!(ErrorCategory::Timeout.to_string(), "timeout");
    }
}
