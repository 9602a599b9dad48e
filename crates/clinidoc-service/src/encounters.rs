//! Encounter orchestration.
//!
//! Every mutation re-fetches the current record immediately before applying
//! its state-machine guard, then writes back through the store's
//! version-guarded `replace`. A concurrent writer that loses the
//! compare-and-swap gets `Conflict` and retries with fresh state; the
//! service never overwrites silently.

use std::collections::HashMap;

use clinidoc_core::{
    generate_id, now_utc, CompletenessReport, Encounter, EncounterStatus, EncounterType, Episode,
    FhirDateTime, Provider, SoapSection,
};
use clinidoc_storage::{DynChartStore, EntityKind, Query, QueryFilter};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::ServiceConfig;
use crate::error::{Result, ServiceError};

/// Counts by status and the most recent visit per episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterStatistics {
    pub total: usize,
    pub by_status: HashMap<String, usize>,
    pub last_visit_by_episode: HashMap<String, FhirDateTime>,
}

pub struct EncounterService {
    store: DynChartStore,
    config: ServiceConfig,
}

impl EncounterService {
    pub fn new(store: DynChartStore, config: ServiceConfig) -> Self {
        Self { store, config }
    }

    /// Fetch the current record and its stored version.
    async fn load(&self, id: &str) -> Result<(Encounter, u64)> {
        let entity = self
            .store
            .get(EntityKind::Encounter, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("encounter", id))?;
        let encounter: Encounter = serde_json::from_value(entity.body)
            .map_err(|e| ServiceError::internal(e.to_string()))?;
        Ok((encounter, entity.version))
    }

    /// Write back, guarded by the version read in `load`.
    async fn save(&self, encounter: &Encounter, stored_version: u64) -> Result<()> {
        let body = serde_json::to_value(encounter)
            .map_err(|e| ServiceError::internal(e.to_string()))?;
        self.store
            .replace(EntityKind::Encounter, &encounter.id, body, stored_version)
            .await?;
        Ok(())
    }

    pub async fn create_encounter(
        &self,
        episode_id: &str,
        patient_id: &str,
        encounter_type: EncounterType,
        provider: Provider,
    ) -> Result<Encounter> {
        if self.store.get(EntityKind::Patient, patient_id).await?.is_none() {
            return Err(ServiceError::not_found("patient", patient_id));
        }
        let episode_entity = self
            .store
            .get(EntityKind::Episode, episode_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("episode", episode_id))?;
        let episode: Episode = serde_json::from_value(episode_entity.body)
            .map_err(|e| ServiceError::internal(e.to_string()))?;
        if episode.patient_id != patient_id {
            return Err(ServiceError::validation(format!(
                "episode {episode_id} belongs to a different patient"
            )));
        }

        let encounter = Encounter::new(
            generate_id(),
            episode_id,
            patient_id,
            encounter_type,
            provider,
            now_utc(),
        )
        .with_reason(episode.chief_complaint.clone());

        let body = serde_json::to_value(&encounter)
            .map_err(|e| ServiceError::internal(e.to_string()))?;
        self.store
            .create(EntityKind::Encounter, &encounter.id, body)
            .await?;
        info!(encounter_id = %encounter.id, episode_id, "encounter created");
        Ok(encounter)
    }

    pub async fn get_encounter(&self, id: &str) -> Result<Encounter> {
        Ok(self.load(id).await?.0)
    }

    pub async fn update_soap_section(
        &self,
        id: &str,
        section: &str,
        partial: &Value,
    ) -> Result<Encounter> {
        let section: SoapSection = section.parse().map_err(ServiceError::from)?;
        let (mut encounter, stored_version) = self.load(id).await?;
        encounter.update_soap_section(section, partial, now_utc())?;
        self.save(&encounter, stored_version).await?;
        Ok(encounter)
    }

    pub async fn complete_encounter(&self, id: &str) -> Result<Encounter> {
        let (mut encounter, stored_version) = self.load(id).await?;
        encounter.complete_documentation(now_utc())?;
        self.save(&encounter, stored_version).await?;
        Ok(encounter)
    }

    pub async fn sign_encounter(
        &self,
        id: &str,
        signed_by: &str,
        confirmed: bool,
    ) -> Result<Encounter> {
        let (mut encounter, stored_version) = self.load(id).await?;

        // The completeness gate applies to records that can still be
        // signed; confirmation and double-sign guards live in the state
        // machine itself.
        if confirmed && encounter.status != EncounterStatus::Signed {
            let report = encounter.validate_completeness(self.config.completeness.threshold);
            if !report.ready {
                return Err(ServiceError::validation(format!(
                    "encounter not ready to sign; sections below {}%: {}",
                    self.config.completeness.threshold,
                    report.missing_sections.join(", ")
                )));
            }
        }

        encounter.sign(signed_by, confirmed, now_utc())?;
        self.save(&encounter, stored_version).await?;
        info!(encounter_id = %id, signed_by, "encounter signed");
        Ok(encounter)
    }

    pub async fn amend_encounter(
        &self,
        id: &str,
        reason: &str,
        changes: Value,
        amended_by: &str,
    ) -> Result<Encounter> {
        let (mut encounter, stored_version) = self.load(id).await?;
        encounter.amend(reason, changes, amended_by, now_utc())?;
        self.save(&encounter, stored_version).await?;
        info!(encounter_id = %id, amended_by, "encounter amended");
        Ok(encounter)
    }

    pub async fn cancel_encounter(&self, id: &str, reason: &str) -> Result<Encounter> {
        let (mut encounter, stored_version) = self.load(id).await?;
        encounter.cancel(reason, now_utc())?;
        self.save(&encounter, stored_version).await?;
        Ok(encounter)
    }

    /// Delete an unsigned encounter. Signed and amended records are legal
    /// documents and are never deleted.
    pub async fn delete_encounter(&self, id: &str) -> Result<()> {
        let (encounter, _) = self.load(id).await?;
        if !encounter.can_be_deleted() {
            warn!(encounter_id = %id, status = %encounter.status, "refused delete of signed record");
            return Err(ServiceError::EncounterLocked {
                id: id.to_string(),
                status: encounter.status.to_string(),
            });
        }
        self.store.delete(EntityKind::Encounter, id).await?;
        Ok(())
    }

    pub async fn validate_completeness(&self, id: &str) -> Result<CompletenessReport> {
        let (encounter, _) = self.load(id).await?;
        Ok(encounter.validate_completeness(self.config.completeness.threshold))
    }

    pub async fn get_statistics(&self) -> Result<EncounterStatistics> {
        let mut by_status = HashMap::new();
        let mut total = 0;
        for status in [
            EncounterStatus::Draft,
            EncounterStatus::InProgress,
            EncounterStatus::Completed,
            EncounterStatus::Signed,
            EncounterStatus::Amended,
            EncounterStatus::Cancelled,
        ] {
            let count = self
                .store
                .count(
                    EntityKind::Encounter,
                    &[QueryFilter::exact("status", status.to_string())],
                )
                .await?;
            total += count;
            by_status.insert(status.to_string(), count);
        }

        let query = Query::new(EntityKind::Encounter)
            .with_sort("started_at", true)
            .with_pagination(0, usize::MAX);
        let result = self.store.query(&query).await?;
        let mut last_visit_by_episode: HashMap<String, FhirDateTime> = HashMap::new();
        for entity in result.entries {
            let Some(episode_id) = entity.body.get("episode_id").and_then(Value::as_str) else {
                continue;
            };
            let Some(started_at) = entity
                .body
                .get("started_at")
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<FhirDateTime>().ok())
            else {
                continue;
            };
            last_visit_by_episode
                .entry(episode_id.to_string())
                .and_modify(|current| {
                    if started_at > *current {
                        *current = started_at.clone();
                    }
                })
                .or_insert(started_at);
        }

        Ok(EncounterStatistics {
            total,
            by_status,
            last_visit_by_episode,
        })
    }
}
