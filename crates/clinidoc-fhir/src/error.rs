use thiserror::Error;

/// Errors raised at the FHIR mapping boundary.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("Unknown vital type: {0}")]
    UnknownVitalType(String),

    #[error("Missing required field {resource_type}.{field}")]
    MissingField {
        resource_type: String,
        field: String,
    },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Unsupported resource type: {0}")]
    UnsupportedResourceType(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl MappingError {
    pub fn unknown_vital_type(name: impl Into<String>) -> Self {
        Self::UnknownVitalType(name.into())
    }

    pub fn missing_field(resource_type: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            resource_type: resource_type.into(),
            field: field.into(),
        }
    }

    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::InvalidValue(message.into())
    }

    pub fn unsupported_resource_type(resource_type: impl Into<String>) -> Self {
        Self::UnsupportedResourceType(resource_type.into())
    }
}

/// Convenience result type for mapper operations.
pub type Result<T> = std::result::Result<T, MappingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            MappingError::unknown_vital_type("shoe_size").to_string(),
            "Unknown vital type: shoe_size"
        );
        assert_eq!(
            MappingError::missing_field("Patient", "name").to_string(),
            "Missing required field Patient.name"
        );
        assert_eq!(
            MappingError::unsupported_resource_type("Specimen").to_string(),
            "Unsupported resource type: Specimen"
        );
    }
}
