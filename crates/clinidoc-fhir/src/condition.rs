//! Condition resource mapper.
//!
//! Maps a diagnosis to clinicalStatus (condition-clinical),
//! verificationStatus (condition-ver-status), and a SNOMED `code`.
//! Diagnoses without a SNOMED code map with a text-only concept.

use clinidoc_core::{Diagnosis, DiagnosisClinicalStatus, DiagnosisVerification};
use serde::{Deserialize, Serialize};

use crate::datatypes::{CodeableConcept, Coding, Reference, ResourceMeta};
use crate::error::{MappingError, Result};
use crate::systems;

/// FHIR R4 Condition resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FhirCondition {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    pub id: String,
    #[serde(default)]
    pub meta: ResourceMeta,
    #[serde(rename = "clinicalStatus", default)]
    pub clinical_status: CodeableConcept,
    #[serde(rename = "verificationStatus", default)]
    pub verification_status: CodeableConcept,
    pub code: CodeableConcept,
    pub subject: Reference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encounter: Option<Reference>,
}

fn clinical_status_from_code(code: &str) -> Result<DiagnosisClinicalStatus> {
    match code {
        "active" => Ok(DiagnosisClinicalStatus::Active),
        "recurrence" => Ok(DiagnosisClinicalStatus::Recurrence),
        "inactive" => Ok(DiagnosisClinicalStatus::Inactive),
        "remission" => Ok(DiagnosisClinicalStatus::Remission),
        "resolved" => Ok(DiagnosisClinicalStatus::Resolved),
        other => Err(MappingError::invalid_value(format!(
            "unknown clinical status: {other}"
        ))),
    }
}

fn verification_from_code(code: &str) -> Result<DiagnosisVerification> {
    match code {
        "unconfirmed" => Ok(DiagnosisVerification::Unconfirmed),
        "provisional" => Ok(DiagnosisVerification::Provisional),
        "differential" => Ok(DiagnosisVerification::Differential),
        "confirmed" => Ok(DiagnosisVerification::Confirmed),
        "refuted" => Ok(DiagnosisVerification::Refuted),
        other => Err(MappingError::invalid_value(format!(
            "unknown verification status: {other}"
        ))),
    }
}

/// Map an internal diagnosis to a fresh FHIR Condition resource.
pub fn to_fhir(
    diagnosis: &Diagnosis,
    condition_id: &str,
    patient_id: &str,
    encounter_id: Option<&str>,
) -> FhirCondition {
    let code = match &diagnosis.snomed_code {
        Some(snomed) => CodeableConcept::from_coding(
            Coding::new(systems::SNOMED, snomed).with_display(&diagnosis.description),
        )
        .with_text(&diagnosis.description),
        None => CodeableConcept::text_only(&diagnosis.description),
    };
    FhirCondition {
        resource_type: "Condition".into(),
        id: condition_id.into(),
        meta: ResourceMeta::new().with_version_id("1"),
        clinical_status: CodeableConcept::from_coding(Coding::new(
            systems::CONDITION_CLINICAL,
            diagnosis.clinical_status.as_fhir_code(),
        )),
        verification_status: CodeableConcept::from_coding(Coding::new(
            systems::CONDITION_VER_STATUS,
            diagnosis.verification.as_fhir_code(),
        )),
        code,
        subject: Reference::new("Patient", patient_id),
        encounter: encounter_id.map(|id| Reference::new("Encounter", id)),
    }
}

/// The internal fields recoverable from a FHIR Condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionPatch {
    pub id: String,
    pub patient_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encounter_id: Option<String>,
    pub diagnosis: Diagnosis,
}

/// Map a FHIR Condition back to an internal diagnosis with its context.
pub fn from_fhir(resource: &FhirCondition) -> Result<ConditionPatch> {
    if resource.resource_type != "Condition" {
        return Err(MappingError::unsupported_resource_type(
            &resource.resource_type,
        ));
    }
    let patient_id = resource
        .subject
        .id_for("Patient")
        .ok_or_else(|| MappingError::missing_field("Condition", "subject"))?
        .to_string();
    let snomed = resource.code.coding_in(systems::SNOMED);
    let description = resource
        .code
        .text
        .clone()
        .or_else(|| snomed.and_then(|c| c.display.clone()))
        .ok_or_else(|| MappingError::missing_field("Condition", "code.text"))?;

    let clinical_status = resource
        .clinical_status
        .coding_in(systems::CONDITION_CLINICAL)
        .map(|c| clinical_status_from_code(&c.code))
        .transpose()?
        .unwrap_or_default();
    let verification = resource
        .verification_status
        .coding_in(systems::CONDITION_VER_STATUS)
        .map(|c| verification_from_code(&c.code))
        .transpose()?
        .unwrap_or_default();

    let mut diagnosis = Diagnosis::new(description);
    diagnosis.clinical_status = clinical_status;
    diagnosis.verification = verification;
    if let Some(coding) = snomed {
        diagnosis.snomed_code = Some(coding.code.clone());
    }
    Ok(ConditionPatch {
        id: resource.id.clone(),
        patient_id,
        encounter_id: resource
            .encounter
            .as_ref()
            .and_then(|r| r.id_for("Encounter"))
            .map(str::to_string),
        diagnosis,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_include;
    use serde_json::json;

    fn diagnosis() -> Diagnosis {
        let mut d = Diagnosis::new("Acute bronchitis").with_snomed_code("10509002");
        d.verification = DiagnosisVerification::Confirmed;
        d
    }

    #[test]
    fn test_to_fhir_shape() {
        let resource = to_fhir(&diagnosis(), "cond-1", "pat-1", Some("enc-1"));
        let json = serde_json::to_value(&resource).unwrap();
        assert_json_include!(
            actual: json,
            expected: json!({
                "resourceType": "Condition",
                "id": "cond-1",
                "clinicalStatus": {"coding": [{
                    "system": systems::CONDITION_CLINICAL,
                    "code": "active"
                }]},
                "verificationStatus": {"coding": [{
                    "system": systems::CONDITION_VER_STATUS,
                    "code": "confirmed"
                }]},
                "code": {
                    "coding": [{"system": systems::SNOMED, "code": "10509002"}],
                    "text": "Acute bronchitis"
                },
                "subject": {"reference": "Patient/pat-1"},
                "encounter": {"reference": "Encounter/enc-1"}
            })
        );
    }

    #[test]
    fn test_roundtrip() {
        let original = diagnosis();
        let patch = from_fhir(&to_fhir(&original, "cond-1", "pat-1", Some("enc-1"))).unwrap();
        assert_eq!(patch.diagnosis, original);
        assert_eq!(patch.id, "cond-1");
        assert_eq!(patch.patient_id, "pat-1");
        assert_eq!(patch.encounter_id.as_deref(), Some("enc-1"));
    }

    #[test]
    fn test_roundtrip_without_snomed() {
        let original = Diagnosis::new("Nonspecific malaise");
        let patch = from_fhir(&to_fhir(&original, "cond-2", "pat-1", None)).unwrap();
        assert_eq!(patch.diagnosis, original);
        assert_eq!(patch.encounter_id, None);
    }

    #[test]
    fn test_from_fhir_unknown_status_fails() {
        let mut resource = to_fhir(&diagnosis(), "cond-1", "pat-1", None);
        resource.clinical_status =
            CodeableConcept::from_coding(Coding::new(systems::CONDITION_CLINICAL, "dormant"));
        let err = from_fhir(&resource).unwrap_err();
        assert!(matches!(err, MappingError::InvalidValue(_)));
    }

    #[test]
    fn test_from_fhir_missing_description_fails() {
        let mut resource = to_fhir(&diagnosis(), "cond-1", "pat-1", None);
        resource.code = CodeableConcept::from_coding(Coding::new(systems::SNOMED, "10509002"));
        let err = from_fhir(&resource).unwrap_err();
        assert!(matches!(err, MappingError::MissingField { .. }));
    }
}
