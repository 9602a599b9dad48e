//! Encounter resource mapper.
//!
//! Supported fields: status (at FHIR status granularity), class, type
//! (carried losslessly under the internal `urn:clinidoc:encounter-type`
//! system), subject, provider participant, period, reasonCode. The SOAP
//! document, workflow metadata, and amendment history have no counterpart
//! in FHIR Encounter and are intentionally unsupported here; FHIR has no
//! signing concept, so Signed and Amended surface as `finished`.

use clinidoc_core::{Encounter, EncounterStatus, EncounterType, FhirDateTime, Provider};
use serde::{Deserialize, Serialize};

use crate::datatypes::{CodeableConcept, Coding, Period, Reference, ResourceMeta};
use crate::error::{MappingError, Result};
use crate::systems;

/// The fixed `Encounter.class` vocabulary. Unrecognized codes map to AMB.
pub const ENCOUNTER_CLASSES: [(&str, &str); 6] = [
    ("AMB", "ambulatory"),
    ("EMER", "emergency"),
    ("IMP", "inpatient encounter"),
    ("OBSENC", "observation encounter"),
    ("PRENC", "pre-admission"),
    ("SS", "short stay"),
];

/// Build a class coding from a raw code, defaulting to AMB for anything
/// outside the fixed vocabulary.
pub fn class_from_code(code: &str) -> Coding {
    let (code, display) = ENCOUNTER_CLASSES
        .iter()
        .find(|(c, _)| *c == code)
        .copied()
        .unwrap_or(ENCOUNTER_CLASSES[0]);
    Coding::new(systems::ACT_CODE, code).with_display(display)
}

fn class_for_type(encounter_type: EncounterType) -> Coding {
    let code = match encounter_type {
        EncounterType::Urgent => "EMER",
        _ => "AMB",
    };
    class_from_code(code)
}

fn status_to_fhir(status: EncounterStatus) -> &'static str {
    match status {
        EncounterStatus::Draft => "planned",
        EncounterStatus::InProgress => "in-progress",
        EncounterStatus::Completed
        | EncounterStatus::Signed
        | EncounterStatus::Amended => "finished",
        EncounterStatus::Cancelled => "cancelled",
    }
}

fn status_from_fhir(status: &str) -> Result<EncounterStatus> {
    match status {
        "planned" => Ok(EncounterStatus::Draft),
        "arrived" | "triaged" | "in-progress" | "onleave" => Ok(EncounterStatus::InProgress),
        "finished" => Ok(EncounterStatus::Completed),
        "cancelled" => Ok(EncounterStatus::Cancelled),
        other => Err(MappingError::invalid_value(format!(
            "unknown encounter status: {other}"
        ))),
    }
}

/// FHIR R4 Encounter resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FhirEncounter {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    pub id: String,
    #[serde(default)]
    pub meta: ResourceMeta,
    pub status: String,
    pub class: Coding,
    #[serde(rename = "type", skip_serializing_if = "Vec::is_empty", default)]
    pub type_: Vec<CodeableConcept>,
    pub subject: Reference,
    #[serde(rename = "episodeOfCare", skip_serializing_if = "Vec::is_empty", default)]
    pub episode_of_care: Vec<Reference>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub participant: Vec<EncounterParticipant>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
    #[serde(rename = "reasonCode", skip_serializing_if = "Vec::is_empty", default)]
    pub reason_code: Vec<CodeableConcept>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterParticipant {
    pub individual: Reference,
}

/// The internal fields recoverable from a FHIR Encounter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterPatch {
    pub fhir_id: String,
    pub patient_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_id: Option<String>,
    pub status: EncounterStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encounter_type: Option<EncounterType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_start: Option<FhirDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_end: Option<FhirDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Map an internal encounter to a fresh FHIR Encounter resource.
pub fn to_fhir(encounter: &Encounter) -> FhirEncounter {
    FhirEncounter {
        resource_type: "Encounter".into(),
        id: encounter.id.clone(),
        meta: ResourceMeta::new().with_version_id(encounter.workflow.version.to_string()),
        status: status_to_fhir(encounter.status).into(),
        class: class_for_type(encounter.encounter_type),
        type_: vec![CodeableConcept::from_coding(Coding::new(
            systems::ENCOUNTER_TYPE,
            encounter.encounter_type.to_string(),
        ))
        .with_text(encounter.encounter_type.to_string())],
        subject: Reference::new("Patient", &encounter.patient_id),
        episode_of_care: vec![Reference::new("EpisodeOfCare", &encounter.episode_id)],
        participant: vec![EncounterParticipant {
            individual: Reference::new("Practitioner", &encounter.provider.id)
                .with_display(&encounter.provider.name),
        }],
        period: Some(Period {
            start: Some(encounter.started_at.clone()),
            end: encounter.ended_at.clone(),
        }),
        reason_code: encounter
            .reason
            .iter()
            .map(|r| CodeableConcept::text_only(r.clone()))
            .collect(),
    }
}

/// Map a FHIR Encounter back to the internal fields it carries.
pub fn from_fhir(resource: &FhirEncounter) -> Result<EncounterPatch> {
    if resource.resource_type != "Encounter" {
        return Err(MappingError::unsupported_resource_type(
            &resource.resource_type,
        ));
    }
    let patient_id = resource
        .subject
        .id_for("Patient")
        .ok_or_else(|| MappingError::missing_field("Encounter", "subject"))?
        .to_string();

    let encounter_type = resource
        .type_
        .iter()
        .find_map(|t| t.coding_in(systems::ENCOUNTER_TYPE))
        .and_then(|c| c.code.parse::<EncounterType>().ok());

    let provider = resource.participant.first().and_then(|p| {
        let id = p.individual.id_for("Practitioner")?;
        let mut provider = Provider::new(id, p.individual.display.clone().unwrap_or_default());
        if provider.name.is_empty() {
            provider.name = id.to_string();
        }
        Some(provider)
    });

    Ok(EncounterPatch {
        fhir_id: resource.id.clone(),
        patient_id,
        episode_id: resource
            .episode_of_care
            .first()
            .and_then(|r| r.id_for("EpisodeOfCare"))
            .map(str::to_string),
        status: status_from_fhir(&resource.status)?,
        encounter_type,
        provider,
        period_start: resource.period.as_ref().and_then(|p| p.start.clone()),
        period_end: resource.period.as_ref().and_then(|p| p.end.clone()),
        reason: resource
            .reason_code
            .first()
            .and_then(|r| r.text.clone()),
    })
}
