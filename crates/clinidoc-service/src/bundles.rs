//! FHIR bundle processing.
//!
//! Transactions run inside one store transaction scope and roll back on the
//! first failing entry (or on timeout), reporting the failing index and
//! reason as an OperationOutcome. Batches process every entry
//! independently and report one outcome per entry. Any other bundle type
//! is rejected before the store is touched.

use std::time::Duration;

use clinidoc_core::{Encounter, EncounterType, Patient};
use clinidoc_fhir::bundle::{
    validate_bundle, BundleEntry, BundleType, BundleValidation, FhirBundle, OperationOutcome,
};
use clinidoc_fhir::observation::ObservationPatch;
use clinidoc_fhir::{condition, diagnostic_report, encounter, observation, patient};
use clinidoc_storage::{DynChartStore, EntityKind, StoreTransaction};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{Result, ServiceError};

/// One planned write derived from a bundle entry.
#[derive(Debug, Clone)]
enum EntryOp {
    Create {
        kind: EntityKind,
        id: String,
        body: Value,
        location: String,
    },
    Update {
        kind: EntityKind,
        id: String,
        body: Value,
        location: String,
    },
    Delete {
        kind: EntityKind,
        id: String,
    },
}

pub struct BundleProcessor {
    store: DynChartStore,
    transaction_timeout: Duration,
}

impl BundleProcessor {
    pub fn new(store: DynChartStore, transaction_timeout: Duration) -> Self {
        Self {
            store,
            transaction_timeout,
        }
    }

    /// Structural pre-flight check, free of side effects.
    pub fn validate(&self, bundle: &FhirBundle) -> BundleValidation {
        validate_bundle(bundle)
    }

    /// Process a transaction or batch bundle into a response bundle.
    ///
    /// Fails fast with `UnsupportedBundleType` for the other seven bundle
    /// types, before any store access.
    pub async fn process(&self, bundle: &FhirBundle) -> Result<FhirBundle> {
        match bundle.parsed_type() {
            Some(BundleType::Transaction) => self.process_transaction(bundle).await,
            Some(BundleType::Batch) => self.process_batch(bundle).await,
            Some(other) => Err(ServiceError::unsupported_bundle_type(other.as_str())),
            None => Err(ServiceError::unsupported_bundle_type(&bundle.bundle_type)),
        }
    }

    async fn process_transaction(&self, bundle: &FhirBundle) -> Result<FhirBundle> {
        let mut tx = self.store.begin_transaction().await?;

        let outcome = tokio::time::timeout(
            self.transaction_timeout,
            apply_entries_transactional(&mut tx, &bundle.entry),
        )
        .await;

        match outcome {
            Err(_) => {
                tx.rollback().await?;
                warn!("transaction bundle rolled back: timeout");
                Ok(
                    FhirBundle::new(BundleType::TransactionResponse).with_entries(vec![
                        BundleEntry::failure(
                            "504 Gateway Timeout",
                            OperationOutcome::error(
                                "timeout",
                                format!(
                                    "transaction exceeded {}ms and was rolled back",
                                    self.transaction_timeout.as_millis()
                                ),
                            ),
                        ),
                    ]),
                )
            }
            Ok(Err((index, err))) => {
                tx.rollback().await?;
                warn!(entry = index, error = %err, "transaction bundle rolled back");
                Ok(
                    FhirBundle::new(BundleType::TransactionResponse).with_entries(vec![
                        BundleEntry::failure(
                            http_status(&err),
                            OperationOutcome::error(
                                err.outcome_code(),
                                format!("entry {index}: {err}"),
                            ),
                        ),
                    ]),
                )
            }
            Ok(Ok(entries)) => {
                tx.commit().await?;
                info!(entries = entries.len(), "transaction bundle committed");
                Ok(FhirBundle::new(BundleType::TransactionResponse).with_entries(entries))
            }
        }
    }

    async fn process_batch(&self, bundle: &FhirBundle) -> Result<FhirBundle> {
        let mut entries = Vec::with_capacity(bundle.entry.len());
        for (index, entry) in bundle.entry.iter().enumerate() {
            let result = self.apply_batch_entry(entry).await;
            entries.push(match result {
                Ok(response) => response,
                Err(err) => {
                    warn!(entry = index, error = %err, "batch entry failed");
                    BundleEntry::failure(
                        http_status(&err),
                        OperationOutcome::error(err.outcome_code(), format!("entry {index}: {err}")),
                    )
                }
            });
        }
        Ok(FhirBundle::new(BundleType::BatchResponse).with_entries(entries))
    }

    async fn apply_batch_entry(&self, entry: &BundleEntry) -> Result<BundleEntry> {
        match plan_entry(entry)? {
            EntryOp::Create {
                kind,
                id,
                body,
                location,
            } => {
                self.store.create(kind, &id, body).await?;
                Ok(BundleEntry::success("201 Created", Some(location)))
            }
            EntryOp::Update {
                kind,
                id,
                body,
                location,
            } => match self.store.get(kind, &id).await? {
                Some(current) => {
                    self.store.replace(kind, &id, body, current.version).await?;
                    Ok(BundleEntry::success("200 OK", Some(location)))
                }
                None => {
                    self.store.create(kind, &id, body).await?;
                    Ok(BundleEntry::success("201 Created", Some(location)))
                }
            },
            EntryOp::Delete { kind, id } => {
                if self.store.get(kind, &id).await?.is_some() {
                    self.store.delete(kind, &id).await?;
                }
                Ok(BundleEntry::success("204 No Content", None))
            }
        }
    }
}

async fn apply_entries_transactional(
    tx: &mut Box<dyn StoreTransaction>,
    entries: &[BundleEntry],
) -> std::result::Result<Vec<BundleEntry>, (usize, ServiceError)> {
    let mut responses = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let response = apply_tx_entry(tx, entry)
            .await
            .map_err(|err| (index, err))?;
        responses.push(response);
    }
    Ok(responses)
}

async fn apply_tx_entry(
    tx: &mut Box<dyn StoreTransaction>,
    entry: &BundleEntry,
) -> Result<BundleEntry> {
    match plan_entry(entry)? {
        EntryOp::Create {
            kind,
            id,
            body,
            location,
        } => {
            tx.create(kind, &id, body).await?;
            Ok(BundleEntry::success("201 Created", Some(location)))
        }
        EntryOp::Update {
            kind,
            id,
            body,
            location,
        } => match tx.get(kind, &id).await? {
            Some(current) => {
                tx.replace(kind, &id, body, current.version).await?;
                Ok(BundleEntry::success("200 OK", Some(location)))
            }
            None => {
                tx.create(kind, &id, body).await?;
                Ok(BundleEntry::success("201 Created", Some(location)))
            }
        },
        EntryOp::Delete { kind, id } => {
            if tx.get(kind, &id).await?.is_some() {
                tx.delete(kind, &id).await?;
            }
            Ok(BundleEntry::success("204 No Content", None))
        }
    }
}

fn http_status(err: &ServiceError) -> &'static str {
    match err {
        ServiceError::NotFound { .. } => "404 Not Found",
        ServiceError::Validation(_) | ServiceError::InvalidSection(_) => "400 Bad Request",
        ServiceError::EncounterLocked { .. } => "422 Unprocessable Entity",
        ServiceError::Conflict(_) => "409 Conflict",
        ServiceError::UnknownVitalType(_) | ServiceError::UnsupportedBundleType(_) => {
            "422 Unprocessable Entity"
        }
        ServiceError::Timeout(_) => "504 Gateway Timeout",
        ServiceError::Internal(_) => "500 Internal Server Error",
    }
}

fn kind_for_resource_type(resource_type: &str) -> Result<EntityKind> {
    match resource_type {
        "Patient" => Ok(EntityKind::Patient),
        "Encounter" => Ok(EntityKind::Encounter),
        "Observation" => Ok(EntityKind::Finding),
        "Condition" => Ok(EntityKind::Condition),
        "DiagnosticReport" => Ok(EntityKind::Report),
        other => Err(ServiceError::validation(format!(
            "unsupported resource type: {other}"
        ))),
    }
}

fn to_body<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| ServiceError::internal(e.to_string()))
}

/// Turn one bundle entry into a planned write, converting its FHIR resource
/// through the mappers.
fn plan_entry(entry: &BundleEntry) -> Result<EntryOp> {
    let method = entry
        .request
        .as_ref()
        .map(|r| r.method.to_ascii_uppercase())
        .unwrap_or_else(|| "POST".to_string());

    if method == "DELETE" {
        let url = entry
            .request
            .as_ref()
            .map(|r| r.url.as_str())
            .unwrap_or_default();
        let (resource_type, id) = url
            .split_once('/')
            .ok_or_else(|| ServiceError::validation(format!("DELETE url must be Type/id: {url}")))?;
        return Ok(EntryOp::Delete {
            kind: kind_for_resource_type(resource_type)?,
            id: id.to_string(),
        });
    }

    let resource = entry
        .resource
        .as_ref()
        .ok_or_else(|| ServiceError::validation("entry has no resource"))?;
    let resource_type = resource
        .get("resourceType")
        .and_then(Value::as_str)
        .ok_or_else(|| ServiceError::validation("resource has no resourceType"))?;

    let (kind, id, body) = convert_resource(resource_type, resource)?;
    let location = format!("{resource_type}/{id}");
    match method.as_str() {
        "POST" => Ok(EntryOp::Create {
            kind,
            id,
            body,
            location,
        }),
        "PUT" => Ok(EntryOp::Update {
            kind,
            id,
            body,
            location,
        }),
        other => Err(ServiceError::validation(format!(
            "unsupported bundle request method: {other}"
        ))),
    }
}

fn parse_resource<T: serde::de::DeserializeOwned>(
    resource_type: &str,
    resource: &Value,
) -> Result<T> {
    serde_json::from_value(resource.clone())
        .map_err(|e| ServiceError::validation(format!("invalid {resource_type} resource: {e}")))
}

fn convert_resource(resource_type: &str, resource: &Value) -> Result<(EntityKind, String, Value)> {
    match resource_type {
        "Patient" => {
            let parsed: patient::FhirPatient = parse_resource(resource_type, resource)?;
            let internal: Patient = patient::from_fhir(&parsed)?;
            Ok((EntityKind::Patient, internal.id.clone(), to_body(&internal)?))
        }
        "Encounter" => {
            let parsed: encounter::FhirEncounter = parse_resource(resource_type, resource)?;
            let patch = encounter::from_fhir(&parsed)?;
            let internal = encounter_from_patch(patch)?;
            Ok((
                EntityKind::Encounter,
                internal.id.clone(),
                to_body(&internal)?,
            ))
        }
        "Observation" => {
            let parsed: observation::FhirObservation = parse_resource(resource_type, resource)?;
            let patch = observation::from_fhir(&parsed)?;
            let id = match &patch {
                ObservationPatch::Finding(finding) => finding.id.clone(),
                ObservationPatch::Vital(_) => clinidoc_core::generate_id(),
            };
            Ok((EntityKind::Finding, id, to_body(&patch)?))
        }
        "Condition" => {
            let parsed: condition::FhirCondition = parse_resource(resource_type, resource)?;
            let patch = condition::from_fhir(&parsed)?;
            Ok((EntityKind::Condition, patch.id.clone(), to_body(&patch)?))
        }
        "DiagnosticReport" => {
            let parsed: diagnostic_report::FhirDiagnosticReport =
                parse_resource(resource_type, resource)?;
            let internal = diagnostic_report::from_fhir(&parsed)?;
            Ok((EntityKind::Report, internal.id.clone(), to_body(&internal)?))
        }
        other => Err(ServiceError::validation(format!(
            "unsupported resource type: {other}"
        ))),
    }
}

/// Build a full internal encounter from an ingested FHIR Encounter.
/// The episode link is required; type defaults to routine when the
/// resource carries no internal type coding.
fn encounter_from_patch(patch: encounter::EncounterPatch) -> Result<Encounter> {
    let episode_id = patch.episode_id.clone().ok_or_else(|| {
        ServiceError::validation("Encounter resource requires an episodeOfCare reference")
    })?;
    let provider = patch
        .provider
        .clone()
        .ok_or_else(|| ServiceError::validation("Encounter resource requires a participant"))?;

    let id = if patch.fhir_id.is_empty() {
        clinidoc_core::generate_id()
    } else {
        patch.fhir_id.clone()
    };
    let mut internal = Encounter::new(
        id,
        episode_id,
        patch.patient_id.clone(),
        patch.encounter_type.unwrap_or(EncounterType::Routine),
        provider,
        patch.period_start.clone().unwrap_or_else(clinidoc_core::now_utc),
    );
    internal.status = patch.status;
    internal.ended_at = patch.period_end.clone();
    internal.reason = patch.reason.clone();
    internal.fhir_encounter_id = Some(patch.fhir_id);
    Ok(internal)
}
