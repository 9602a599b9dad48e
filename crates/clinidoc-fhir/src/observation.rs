//! Observation resource mapper.
//!
//! Two modes: vital signs from the fixed LOINC table below, and generic
//! clinical findings (SNOMED code with a text or quantity value). Vital
//! names outside the table are rejected with `UnknownVitalType`.

use clinidoc_core::{
    generate_id, ClinicalFinding, FhirDateTime, FindingValue, VitalReading, VitalSigns,
};
use serde::{Deserialize, Serialize};

use crate::datatypes::{CodeableConcept, Coding, Quantity, Reference, ResourceMeta};
use crate::error::{MappingError, Result};
use crate::systems;

/// One row of the fixed vital-sign code table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VitalSpec {
    pub name: &'static str,
    pub loinc: &'static str,
    pub display: &'static str,
    pub ucum_code: &'static str,
    pub unit: &'static str,
}

/// The fixed vital-sign table, keyed by internal vital name.
pub const VITAL_SPECS: [VitalSpec; 8] = [
    VitalSpec {
        name: "systolic_bp",
        loinc: "8480-6",
        display: "Systolic blood pressure",
        ucum_code: "mm[Hg]",
        unit: "mmHg",
    },
    VitalSpec {
        name: "diastolic_bp",
        loinc: "8462-4",
        display: "Diastolic blood pressure",
        ucum_code: "mm[Hg]",
        unit: "mmHg",
    },
    VitalSpec {
        name: "heart_rate",
        loinc: "8867-4",
        display: "Heart rate",
        ucum_code: "/min",
        unit: "beats/minute",
    },
    VitalSpec {
        name: "respiratory_rate",
        loinc: "9279-1",
        display: "Respiratory rate",
        ucum_code: "/min",
        unit: "breaths/minute",
    },
    VitalSpec {
        name: "temperature",
        loinc: "8310-5",
        display: "Body temperature",
        ucum_code: "Cel",
        unit: "°C",
    },
    VitalSpec {
        name: "oxygen_saturation",
        loinc: "2708-6",
        display: "Oxygen saturation in Arterial blood",
        ucum_code: "%",
        unit: "%",
    },
    VitalSpec {
        name: "weight",
        loinc: "29463-7",
        display: "Body weight",
        ucum_code: "kg",
        unit: "kg",
    },
    VitalSpec {
        name: "height",
        loinc: "8302-2",
        display: "Body height",
        ucum_code: "cm",
        unit: "cm",
    },
];

/// Look up a vital spec by internal name.
pub fn vital_spec(name: &str) -> Result<&'static VitalSpec> {
    VITAL_SPECS
        .iter()
        .find(|spec| spec.name == name)
        .ok_or_else(|| MappingError::unknown_vital_type(name))
}

fn vital_spec_by_loinc(code: &str) -> Option<&'static VitalSpec> {
    VITAL_SPECS.iter().find(|spec| spec.loinc == code)
}

/// FHIR R4 Observation resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FhirObservation {
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
    #[serde(rename = "effectiveDateTime", skip_serializing_if = "Option::is_none")]
    pub effective_date_time: Option<FhirDateTime>,
    #[serde(rename = "valueQuantity", skip_serializing_if = "Option::is_none")]
    pub value_quantity: Option<Quantity>,
    #[serde(rename = "valueString", skip_serializing_if = "Option::is_none")]
    pub value_string: Option<String>,
}

/// The internal reading recovered from a FHIR Observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ObservationPatch {
    /// A vital-sign reading from the fixed table.
    Vital(VitalReading),
    /// A generic coded finding.
    Finding(ClinicalFinding),
}

fn vital_category() -> CodeableConcept {
    CodeableConcept::from_coding(
        Coding::new(systems::OBSERVATION_CATEGORY, "vital-signs").with_display("Vital Signs"),
    )
}

/// Map a single vital reading to a FHIR Observation.
///
/// Fails with `UnknownVitalType` for names outside the fixed table.
pub fn vital_to_fhir(
    name: &str,
    value: f64,
    patient_id: &str,
    encounter_id: Option<&str>,
    taken_at: FhirDateTime,
) -> Result<FhirObservation> {
    let spec = vital_spec(name)?;
    Ok(FhirObservation {
        resource_type: "Observation".into(),
        id: generate_id(),
        meta: ResourceMeta::new().with_version_id("1"),
        status: "final".into(),
        category: vec![vital_category()],
        code: CodeableConcept::from_coding(
            Coding::new(systems::LOINC, spec.loinc).with_display(spec.display),
        )
        .with_text(spec.display),
        subject: Reference::new("Patient", patient_id),
        encounter: encounter_id.map(|id| Reference::new("Encounter", id)),
        effective_date_time: Some(taken_at),
        value_quantity: Some(Quantity::ucum(value, spec.ucum_code, spec.unit)),
        value_string: None,
    })
}

/// Map every populated field of a vitals block to FHIR Observations.
pub fn vitals_to_fhir(
    vitals: &VitalSigns,
    patient_id: &str,
    encounter_id: Option<&str>,
    taken_at: FhirDateTime,
) -> Result<Vec<FhirObservation>> {
    let readings = [
        ("systolic_bp", vitals.systolic_bp),
        ("diastolic_bp", vitals.diastolic_bp),
        ("heart_rate", vitals.heart_rate),
        ("respiratory_rate", vitals.respiratory_rate),
        ("temperature", vitals.temperature),
        ("oxygen_saturation", vitals.oxygen_saturation),
        ("weight", vitals.weight_kg),
        ("height", vitals.height_cm),
    ];
    readings
        .iter()
        .filter_map(|(name, value)| value.map(|v| (*name, v)))
        .map(|(name, value)| {
            vital_to_fhir(name, value, patient_id, encounter_id, taken_at.clone())
        })
        .collect()
}

/// Map a generic clinical finding to a FHIR Observation.
pub fn finding_to_fhir(finding: &ClinicalFinding) -> FhirObservation {
    let (value_quantity, value_string) = match &finding.value {
        FindingValue::Text { text } => (None, Some(text.clone())),
        FindingValue::Quantity { value, unit } => (
            Some(Quantity {
                value: *value,
                unit: unit.clone(),
                system: systems::UCUM.into(),
                code: unit.clone(),
            }),
            None,
        ),
    };
    FhirObservation {
        resource_type: "Observation".into(),
        id: finding.id.clone(),
        meta: ResourceMeta::new().with_version_id("1"),
        status: "final".into(),
        category: Vec::new(),
        code: CodeableConcept::from_coding(
            Coding::new(systems::SNOMED, &finding.snomed_code).with_display(&finding.description),
        )
        .with_text(&finding.description),
        subject: Reference::new("Patient", &finding.patient_id),
        encounter: finding
            .encounter_id
            .as_deref()
            .map(|id| Reference::new("Encounter", id)),
        effective_date_time: Some(finding.recorded_at.clone()),
        value_quantity,
        value_string,
    }
}

/// Map a FHIR Observation back to an internal reading.
///
/// LOINC codes from the vital table come back as vitals; SNOMED codes as
/// generic findings; anything else is rejected.
pub fn from_fhir(resource: &FhirObservation) -> Result<ObservationPatch> {
    if resource.resource_type != "Observation" {
        return Err(MappingError::unsupported_resource_type(
            &resource.resource_type,
        ));
    }
    let patient_id = resource
        .subject
        .id_for("Patient")
        .ok_or_else(|| MappingError::missing_field("Observation", "subject"))?
        .to_string();
    let encounter_id = resource
        .encounter
        .as_ref()
        .and_then(|r| r.id_for("Encounter"))
        .map(str::to_string);

    if let Some(coding) = resource.code.coding_in(systems::LOINC) {
        let spec = vital_spec_by_loinc(&coding.code).ok_or_else(|| {
            MappingError::invalid_value(format!("LOINC {} is not a known vital", coding.code))
        })?;
        let value = resource
            .value_quantity
            .as_ref()
            .ok_or_else(|| MappingError::missing_field("Observation", "valueQuantity"))?
            .value;
        return Ok(ObservationPatch::Vital(VitalReading {
            name: spec.name.to_string(),
            value,
            patient_id,
            encounter_id,
            taken_at: resource.effective_date_time.clone(),
        }));
    }

    if let Some(coding) = resource.code.coding_in(systems::SNOMED) {
        let value = if let Some(quantity) = &resource.value_quantity {
            FindingValue::Quantity {
                value: quantity.value,
                unit: quantity.unit.clone(),
            }
        } else if let Some(text) = &resource.value_string {
            FindingValue::Text { text: text.clone() }
        } else {
            return Err(MappingError::missing_field("Observation", "value[x]"));
        };
        let recorded_at = resource
            .effective_date_time
            .clone()
            .ok_or_else(|| MappingError::missing_field("Observation", "effectiveDateTime"))?;
        let description = coding
            .display
            .clone()
            .or_else(|| resource.code.text.clone())
            .unwrap_or_else(|| coding.code.clone());
        let mut finding = ClinicalFinding::new(
            resource.id.clone(),
            patient_id,
            coding.code.clone(),
            description,
            value,
            recorded_at,
        );
        if let Some(encounter_id) = encounter_id {
            finding = finding.with_encounter(encounter_id);
        }
        return Ok(ObservationPatch::Finding(finding));
    }

    Err(MappingError::invalid_value(
        "Observation.code carries neither a LOINC vital nor a SNOMED finding",
    ))
}
