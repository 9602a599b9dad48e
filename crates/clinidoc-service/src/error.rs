//! The user-visible error facade.
//!
//! Every error leaving the orchestrator is one of these variants; storage
//! internals never leak past the `From` impls below.

use clinidoc_core::CoreError;
use clinidoc_fhir::MappingError;
use clinidoc_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
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

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn unsupported_bundle_type(bundle_type: impl Into<String>) -> Self {
        Self::UnsupportedBundleType(bundle_type.into())
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Stable category string for logging and for thin API handlers to map
    /// onto their own status codes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Validation(_) | Self::InvalidSection(_) => "validation",
            Self::EncounterLocked { .. } => "locked",
            Self::Conflict(_) => "conflict",
            Self::UnknownVitalType(_) | Self::UnsupportedBundleType(_) => "unsupported",
            Self::Timeout(_) => "timeout",
            Self::Internal(_) => "internal",
        }
    }

    /// The FHIR OperationOutcome issue code for this error.
    pub fn outcome_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not-found",
            Self::Validation(_) | Self::InvalidSection(_) => "invalid",
            Self::EncounterLocked { .. } => "business-rule",
            Self::Conflict(_) => "conflict",
            Self::UnknownVitalType(_) | Self::UnsupportedBundleType(_) => "not-supported",
            Self::Timeout(_) => "timeout",
            Self::Internal(_) => "exception",
        }
    }
}

impl From<CoreError> for ServiceError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound { kind, id } => Self::NotFound { kind, id },
            CoreError::Validation(msg) => Self::Validation(msg),
            CoreError::EncounterLocked { id, status } => Self::EncounterLocked { id, status },
            CoreError::Conflict(msg) => Self::Conflict(msg),
            CoreError::InvalidSection(section) => Self::InvalidSection(section),
            CoreError::UnknownVitalType(name) => Self::UnknownVitalType(name),
            CoreError::UnsupportedBundleType(t) => Self::UnsupportedBundleType(t),
            CoreError::Timeout(msg) => Self::Timeout(msg),
            CoreError::InvalidDateTime(msg) => Self::Validation(msg),
            CoreError::JsonError(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { kind, id } => Self::NotFound { kind, id },
            StorageError::VersionConflict { kind, id, .. } => Self::Conflict(format!(
                "{kind}/{id} was modified concurrently; retry with fresh state"
            )),
            StorageError::AlreadyExists { kind, id } => {
                Self::Conflict(format!("{kind}/{id} already exists"))
            }
            StorageError::InvalidEntity { message } => Self::Validation(message),
            StorageError::Transaction { .. } | StorageError::Internal { .. } => {
                Self::Internal("storage operation failed".into())
            }
        }
    }
}

impl From<MappingError> for ServiceError {
    fn from(err: MappingError) -> Self {
        match err {
            MappingError::UnknownVitalType(name) => Self::UnknownVitalType(name),
            MappingError::MissingField { .. } | MappingError::InvalidValue(_) => {
                Self::Validation(err.to_string())
            }
            MappingError::UnsupportedResourceType(t) => {
                Self::Validation(format!("unsupported resource type: {t}"))
            }
            MappingError::JsonError(e) => Self::Validation(e.to_string()),
        }
    }
}

/// Convenience result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_conflict_maps_without_leaking_versions() {
        let err: ServiceError = StorageError::version_conflict("encounter", "enc-1", 3, 5).into();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert!(err.to_string().contains("retry with fresh state"));
        // stored version numbers are storage internals
        assert!(!err.to_string().contains('5'));
    }

    #[test]
    fn test_storage_internal_message_is_hidden() {
        let err: ServiceError =
            StorageError::internal("papaya guard poisoned at 0xdeadbeef").into();
        assert_eq!(err.to_string(), "Internal error: storage operation failed");
    }

    #[test]
    fn test_core_errors_map_one_to_one() {
        let err: ServiceError = CoreError::encounter_locked("enc-1", "signed").into();
        assert!(matches!(err, ServiceError::EncounterLocked { .. }));
        assert_eq!(err.category(), "locked");

        let err: ServiceError = CoreError::invalid_section("narrative").into();
        assert!(matches!(err, ServiceError::InvalidSection(_)));
        assert_eq!(err.category(), "validation");
    }

    #[test]
    fn test_mapping_errors() {
        let err: ServiceError = MappingError::unknown_vital_type("mood").into();
        assert!(matches!(err, ServiceError::UnknownVitalType(_)));
        assert_eq!(err.outcome_code(), "not-supported");
    }

    #[test]
    fn test_categories() {
        assert_eq!(ServiceError::not_found("encounter", "x").category(), "not_found");
        assert_eq!(ServiceError::timeout("5s").category(), "timeout");
        assert_eq!(ServiceError::conflict("x").outcome_code(), "conflict");
    }
}
