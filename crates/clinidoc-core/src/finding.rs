use crate::time::FhirDateTime;
use serde::{Deserialize, Serialize};

/// Value carried by a clinical finding: free text or a measured quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FindingValue {
    Text { text: String },
    Quantity { value: f64, unit: String },
}

/// A single vital-sign reading ingested from an external system, keyed by
/// the fixed vital name vocabulary of the Observation mapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalReading {
    pub name: String,
    pub value: f64,
    pub patient_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encounter_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taken_at: Option<FhirDateTime>,
}

/// A generic coded clinical finding, distinct from the fixed vital-sign
/// table: a SNOMED CT concept plus a text or quantity value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalFinding {
    pub id: String,
    pub patient_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encounter_id: Option<String>,
    pub snomed_code: String,
    pub description: String,
    pub value: FindingValue,
    pub recorded_at: FhirDateTime,
}

impl ClinicalFinding {
    pub fn new(
        id: impl Into<String>,
        patient_id: impl Into<String>,
        snomed_code: impl Into<String>,
        description: impl Into<String>,
        value: FindingValue,
        recorded_at: FhirDateTime,
    ) -> Self {
        Self {
            id: id.into(),
            patient_id: patient_id.into(),
            encounter_id: None,
            snomed_code: snomed_code.into(),
            description: description.into(),
            value,
            recorded_at,
        }
    }

    pub fn with_encounter(mut self, encounter_id: impl Into<String>) -> Self {
        self.encounter_id = Some(encounter_id.into());
        self
    }
}
