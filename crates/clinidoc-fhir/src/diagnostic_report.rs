//! DiagnosticReport resource mapper.
//!
//! Category maps to the v2-0074 diagnostic service sections for LAB, RAD,
//! and PAT; AI analysis has no v2-0074 counterpart and uses the internal
//! `urn:clinidoc:report-category` system. The conclusion passes through
//! verbatim.

use clinidoc_core::{ClinicalReport, FhirDateTime, ReportCategory};
use serde::{Deserialize, Serialize};

use crate::datatypes::{CodeableConcept, Coding, Reference, ResourceMeta};
use crate::error::{MappingError, Result};
use crate::systems;

/// FHIR R4 DiagnosticReport resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FhirDiagnosticReport {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    pub id: String,
    #[serde(default)]
    pub meta: ResourceMeta,
    pub status: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub category: Vec<CodeableConcept>,
    pub code: CodeableConcept,
    pub subject: Reference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encounter: Option<Reference>,
    pub issued: FhirDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conclusion: Option<String>,
}

/// The (system, code, display) triple a report category maps to.
pub fn category_coding(category: ReportCategory) -> Coding {
    let (system, code, display) = match category {
        ReportCategory::Laboratory => (systems::DIAGNOSTIC_SERVICE_SECTIONS, "LAB", "Laboratory"),
        ReportCategory::Radiology => (systems::DIAGNOSTIC_SERVICE_SECTIONS, "RAD", "Radiology"),
        ReportCategory::Pathology => (systems::DIAGNOSTIC_SERVICE_SECTIONS, "PAT", "Pathology"),
        ReportCategory::AiAnalysis => (systems::REPORT_CATEGORY, "AI", "AI analysis"),
    };
    Coding::new(system, code).with_display(display)
}

fn category_from_coding(concept: &CodeableConcept) -> Result<ReportCategory> {
    if let Some(coding) = concept.coding_in(systems::DIAGNOSTIC_SERVICE_SECTIONS) {
        return match coding.code.as_str() {
            "LAB" => Ok(ReportCategory::Laboratory),
            "RAD" => Ok(ReportCategory::Radiology),
            "PAT" => Ok(ReportCategory::Pathology),
            other => Err(MappingError::invalid_value(format!(
                "unknown diagnostic service section: {other}"
            ))),
        };
    }
    if let Some(coding) = concept.coding_in(systems::REPORT_CATEGORY) {
        if coding.code == "AI" {
            return Ok(ReportCategory::AiAnalysis);
        }
    }
    Err(MappingError::missing_field("DiagnosticReport", "category"))
}

/// Map an internal report to a fresh FHIR DiagnosticReport resource.
pub fn to_fhir(report: &ClinicalReport) -> FhirDiagnosticReport {
    FhirDiagnosticReport {
        resource_type: "DiagnosticReport".into(),
        id: report.id.clone(),
        meta: ResourceMeta::new().with_version_id("1"),
        status: "final".into(),
        category: vec![CodeableConcept::from_coding(category_coding(
            report.category,
        ))],
        code: CodeableConcept::text_only(&report.title),
        subject: Reference::new("Patient", &report.patient_id),
        encounter: report
            .encounter_id
            .as_deref()
            .map(|id| Reference::new("Encounter", id)),
        issued: report.issued_at.clone(),
        conclusion: report.conclusion.clone(),
    }
}

/// Map a FHIR DiagnosticReport back to the internal model.
pub fn from_fhir(resource: &FhirDiagnosticReport) -> Result<ClinicalReport> {
    if resource.resource_type != "DiagnosticReport" {
        return Err(MappingError::unsupported_resource_type(
            &resource.resource_type,
        ));
    }
    let patient_id = resource
        .subject
        .id_for("Patient")
        .ok_or_else(|| MappingError::missing_field("DiagnosticReport", "subject"))?;
    let category = resource
        .category
        .first()
        .ok_or_else(|| MappingError::missing_field("DiagnosticReport", "category"))
        .and_then(category_from_coding)?;
    let title = resource
        .code
        .text
        .clone()
        .ok_or_else(|| MappingError::missing_field("DiagnosticReport", "code.text"))?;

    let mut report = ClinicalReport::new(
        resource.id.clone(),
        patient_id,
        category,
        title,
        resource.issued.clone(),
    );
    if let Some(conclusion) = &resource.conclusion {
        report = report.with_conclusion(conclusion);
    }
    if let Some(encounter_id) = resource
        .encounter
        .as_ref()
        .and_then(|r| r.id_for("Encounter"))
    {
        report = report.with_encounter(encounter_id);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_include;
    use clinidoc_core::now_utc;
    use serde_json::json;

    fn report(category: ReportCategory) -> ClinicalReport {
        ClinicalReport::new("rep-1", "pat-1", category, "CBC panel", now_utc())
            .with_conclusion("within normal limits")
            .with_encounter("enc-1")
    }

    #[test]
    fn test_to_fhir_shape() {
        let resource = to_fhir(&report(ReportCategory::Laboratory));
        let json = serde_json::to_value(&resource).unwrap();
        assert_json_include!(
            actual: json,
            expected: json!({
                "resourceType": "DiagnosticReport",
                "id": "rep-1",
                "status": "final",
                "category": [{"coding": [{
                    "system": systems::DIAGNOSTIC_SERVICE_SECTIONS,
                    "code": "LAB",
                    "display": "Laboratory"
                }]}],
                "code": {"text": "CBC panel"},
                "subject": {"reference": "Patient/pat-1"},
                "conclusion": "within normal limits"
            })
        );
    }

    #[test]
    fn test_category_value_set() {
        assert_eq!(category_coding(ReportCategory::Laboratory).code, "LAB");
        assert_eq!(category_coding(ReportCategory::Radiology).code, "RAD");
        assert_eq!(category_coding(ReportCategory::Pathology).code, "PAT");

        let ai = category_coding(ReportCategory::AiAnalysis);
        assert_eq!(ai.code, "AI");
        assert_eq!(ai.system, systems::REPORT_CATEGORY);
    }

    #[test]
    fn test_roundtrip_all_categories() {
        for category in [
            ReportCategory::Laboratory,
            ReportCategory::Radiology,
            ReportCategory::Pathology,
            ReportCategory::AiAnalysis,
        ] {
            let original = report(category);
            let back = from_fhir(&to_fhir(&original)).unwrap();
            assert_eq!(back, original);
        }
    }

    #[test]
    fn test_from_fhir_unknown_category_fails() {
        let mut resource = to_fhir(&report(ReportCategory::Laboratory));
        resource.category = vec![CodeableConcept::from_coding(Coding::new(
            systems::DIAGNOSTIC_SERVICE_SECTIONS,
            "GEN",
        ))];
        let err = from_fhir(&resource).unwrap_err();
        assert!(matches!(err, MappingError::InvalidValue(_)));
    }

    #[test]
    fn test_from_fhir_missing_title_fails() {
        let mut resource = to_fhir(&report(ReportCategory::Radiology));
        resource.code = CodeableConcept::default();
        let err = from_fhir(&resource).unwrap_err();
        assert!(matches!(err, MappingError::MissingField { .. }));
    }
}
