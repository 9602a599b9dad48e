//! Resource-type dispatch over the pure mappers: the boundary thin API
//! handlers call for single-resource translation in either direction.

use clinidoc_core::{Encounter, Patient};
use clinidoc_fhir::bundle::{BundleEntry, BundleType, FhirBundle};
use clinidoc_fhir::condition::ConditionPatch;
use clinidoc_fhir::observation::ObservationPatch;
use clinidoc_fhir::{condition, diagnostic_report, encounter, observation, patient};
use serde_json::Value;

use crate::error::{Result, ServiceError};

fn parse_entity<T: serde::de::DeserializeOwned>(resource_type: &str, value: &Value) -> Result<T> {
    serde_json::from_value(value.clone())
        .map_err(|e| ServiceError::validation(format!("invalid {resource_type} entity: {e}")))
}

fn parse_resource<T: serde::de::DeserializeOwned>(resource_type: &str, value: &Value) -> Result<T> {
    serde_json::from_value(value.clone())
        .map_err(|e| ServiceError::validation(format!("invalid {resource_type} resource: {e}")))
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| ServiceError::internal(e.to_string()))
}

/// Map an internal entity to its FHIR envelope.
pub fn to_fhir(resource_type: &str, entity: &Value) -> Result<Value> {
    match resource_type {
        "Patient" => {
            let patient: Patient = parse_entity(resource_type, entity)?;
            to_value(&patient::to_fhir(&patient))
        }
        "Encounter" => {
            let encounter: Encounter = parse_entity(resource_type, entity)?;
            to_value(&encounter::to_fhir(&encounter))
        }
        "Observation" => {
            let patch: ObservationPatch = parse_entity(resource_type, entity)?;
            match patch {
                ObservationPatch::Vital(reading) => {
                    let taken_at = reading.taken_at.clone().unwrap_or_else(clinidoc_core::now_utc);
                    to_value(&observation::vital_to_fhir(
                        &reading.name,
                        reading.value,
                        &reading.patient_id,
                        reading.encounter_id.as_deref(),
                        taken_at,
                    )?)
                }
                ObservationPatch::Finding(finding) => {
                    to_value(&observation::finding_to_fhir(&finding))
                }
            }
        }
        "Condition" => {
            let patch: ConditionPatch = parse_entity(resource_type, entity)?;
            to_value(&condition::to_fhir(
                &patch.diagnosis,
                &patch.id,
                &patch.patient_id,
                patch.encounter_id.as_deref(),
            ))
        }
        "DiagnosticReport" => {
            let report: clinidoc_core::ClinicalReport = parse_entity(resource_type, entity)?;
            to_value(&diagnostic_report::to_fhir(&report))
        }
        other => Err(ServiceError::validation(format!(
            "unsupported resource type: {other}"
        ))),
    }
}

/// Map a FHIR envelope back to the internal patch it carries.
pub fn from_fhir(resource_type: &str, resource: &Value) -> Result<Value> {
    match resource_type {
        "Patient" => {
            let parsed = parse_resource::<patient::FhirPatient>(resource_type, resource)?;
            to_value(&patient::from_fhir(&parsed)?)
        }
        "Encounter" => {
            let parsed = parse_resource::<encounter::FhirEncounter>(resource_type, resource)?;
            to_value(&encounter::from_fhir(&parsed)?)
        }
        "Observation" => {
            let parsed = parse_resource::<observation::FhirObservation>(resource_type, resource)?;
            to_value(&observation::from_fhir(&parsed)?)
        }
        "Condition" => {
            let parsed = parse_resource::<condition::FhirCondition>(resource_type, resource)?;
            to_value(&condition::from_fhir(&parsed)?)
        }
        "DiagnosticReport" => {
            let parsed =
                parse_resource::<diagnostic_report::FhirDiagnosticReport>(resource_type, resource)?;
            to_value(&diagnostic_report::from_fhir(&parsed)?)
        }
        other => Err(ServiceError::validation(format!(
            "unsupported resource type: {other}"
        ))),
    }
}

/// Export one encounter as a collection bundle: the Encounter resource,
/// one Observation per recorded vital, and one Condition per assessment
/// diagnosis.
pub fn encounter_to_bundle(enc: &Encounter) -> Result<FhirBundle> {
    let mut entries = vec![BundleEntry {
        resource: Some(to_value(&encounter::to_fhir(enc))?),
        ..BundleEntry::default()
    }];

    if let Some(objective) = &enc.soap.objective {
        if let Some(vitals) = &objective.data.vital_signs {
            let taken_at = objective.last_updated.clone();
            for obs in observation::vitals_to_fhir(vitals, &enc.patient_id, Some(&enc.id), taken_at)?
            {
                entries.push(BundleEntry {
                    resource: Some(to_value(&obs)?),
                    ..BundleEntry::default()
                });
            }
        }
    }

    if let Some(assessment) = &enc.soap.assessment {
        let diagnoses = assessment
            .data
            .primary_diagnosis
            .iter()
            .chain(assessment.data.differential_diagnoses.iter());
        for diagnosis in diagnoses {
            let resource = condition::to_fhir(
                diagnosis,
                &clinidoc_core::generate_id(),
                &enc.patient_id,
                Some(&enc.id),
            );
            entries.push(BundleEntry {
                resource: Some(to_value(&resource)?),
                ..BundleEntry::default()
            });
        }
    }

    Ok(FhirBundle::new(BundleType::Collection).with_entries(entries))
}
