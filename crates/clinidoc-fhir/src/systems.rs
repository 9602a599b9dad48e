//! Coding system URIs used across the mappers.

/// LOINC, for vital-sign observation codes.
pub const LOINC: &str = "http://loinc.org";

/// SNOMED CT, for clinical findings and condition codes.
pub const SNOMED: &str = "http://snomed.info/sct";

/// UCUM, for quantity units.
pub const UCUM: &str = "http://unitsofmeasure.org";

/// HL7 v3 ActCode, for `Encounter.class`.
pub const ACT_CODE: &str = "http://terminology.hl7.org/CodeSystem/v3-ActCode";

/// HL7 observation category codes (`vital-signs`, …).
pub const OBSERVATION_CATEGORY: &str =
    "http://terminology.hl7.org/CodeSystem/observation-category";

/// HL7 condition clinical status codes.
pub const CONDITION_CLINICAL: &str =
    "http://terminology.hl7.org/CodeSystem/condition-clinical";

/// HL7 condition verification status codes.
pub const CONDITION_VER_STATUS: &str =
    "http://terminology.hl7.org/CodeSystem/condition-ver-status";

/// HL7 v2-0074 diagnostic service sections, for `DiagnosticReport.category`.
pub const DIAGNOSTIC_SERVICE_SECTIONS: &str =
    "http://terminology.hl7.org/CodeSystem/v2-0074";

/// Identifier system encoding the internal patient id, so round-trips
/// recover it losslessly.
pub const PATIENT_ID: &str = "urn:clinidoc:patient-id";

/// Internal encounter-type codes carried in `Encounter.type`.
pub const ENCOUNTER_TYPE: &str = "urn:clinidoc:encounter-type";

/// Internal report categories with no v2-0074 counterpart (AI analysis).
pub const REPORT_CATEGORY: &str = "urn:clinidoc:report-category";
