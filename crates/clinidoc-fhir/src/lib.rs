//! FHIR R4 boundary for Clinidoc: resource types and the bidirectional
//! mappers for Patient, Encounter, Observation, Condition, and
//! DiagnosticReport, plus Bundle types and structural validation.
//!
//! Everything here is pure: resources are produced fresh on every mapping
//! call and never persisted in this form. Fields a mapper does not model
//! are listed in its module docs rather than silently dropped.

pub mod bundle;
pub mod condition;
pub mod datatypes;
pub mod diagnostic_report;
pub mod encounter;
pub mod error;
pub mod observation;
pub mod patient;
pub mod systems;

pub use bundle::{
    validate_bundle, BundleEntry, BundleRequest, BundleResponse, BundleType, BundleValidation,
    FhirBundle, OperationOutcome, OperationOutcomeIssue,
};
pub use datatypes::{
    Address, CodeableConcept, Coding, ContactPoint, HumanName, Identifier, Period, Quantity,
    Reference, ResourceMeta,
};
pub use error::{MappingError, Result};
