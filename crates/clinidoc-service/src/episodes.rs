//! Problem episode operations.

use clinidoc_core::{generate_id, Episode, EpisodeCategory, EpisodeStatus};
use clinidoc_storage::{DynChartStore, EntityKind};
use tracing::info;

use crate::error::{Result, ServiceError};

pub struct EpisodeService {
    store: DynChartStore,
}

impl EpisodeService {
    pub fn new(store: DynChartStore) -> Self {
        Self { store }
    }

    /// Open a new problem episode for an existing patient.
    pub async fn open(
        &self,
        patient_id: &str,
        chief_complaint: &str,
        category: EpisodeCategory,
    ) -> Result<Episode> {
        if self.store.get(EntityKind::Patient, patient_id).await?.is_none() {
            return Err(ServiceError::not_found("patient", patient_id));
        }
        if chief_complaint.trim().is_empty() {
            return Err(ServiceError::validation("chief complaint must not be empty"));
        }

        let episode = Episode::new(generate_id(), patient_id, chief_complaint, category);
        let body = serde_json::to_value(&episode)
            .map_err(|e| ServiceError::internal(e.to_string()))?;
        self.store
            .create(EntityKind::Episode, &episode.id, body)
            .await?;
        info!(episode_id = %episode.id, patient_id, "episode opened");
        Ok(episode)
    }

    pub async fn get(&self, id: &str) -> Result<Episode> {
        let entity = self
            .store
            .get(EntityKind::Episode, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("episode", id))?;
        serde_json::from_value(entity.body).map_err(|e| ServiceError::internal(e.to_string()))
    }

    /// Transition the episode status; `resolved_at` tracks Resolved.
    pub async fn set_status(&self, id: &str, status: EpisodeStatus) -> Result<Episode> {
        let entity = self
            .store
            .get(EntityKind::Episode, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("episode", id))?;
        let mut episode: Episode = serde_json::from_value(entity.body)
            .map_err(|e| ServiceError::internal(e.to_string()))?;

        episode.set_status(status);
        let body = serde_json::to_value(&episode)
            .map_err(|e| ServiceError::internal(e.to_string()))?;
        self.store
            .replace(EntityKind::Episode, id, body, entity.version)
            .await?;
        Ok(episode)
    }

    /// Link two existing episodes. Self-references are rejected in the
    /// domain model.
    pub async fn link_related(&self, id: &str, related_id: &str) -> Result<Episode> {
        if self.store.get(EntityKind::Episode, related_id).await?.is_none() {
            return Err(ServiceError::not_found("episode", related_id));
        }
        let entity = self
            .store
            .get(EntityKind::Episode, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("episode", id))?;
        let mut episode: Episode = serde_json::from_value(entity.body)
            .map_err(|e| ServiceError::internal(e.to_string()))?;

        episode.link_related(related_id)?;
        let body = serde_json::to_value(&episode)
            .map_err(|e| ServiceError::internal(e.to_string()))?;
        self.store
            .replace(EntityKind::Episode, id, body, entity.version)
            .await?;
        Ok(episode)
    }

    /// Add a tag if not already present.
    pub async fn tag(&self, id: &str, tag: &str) -> Result<Episode> {
        let entity = self
            .store
            .get(EntityKind::Episode, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("episode", id))?;
        let mut episode: Episode = serde_json::from_value(entity.body)
            .map_err(|e| ServiceError::internal(e.to_string()))?;

        if !episode.tags.iter().any(|t| t == tag) {
            episode.tags.push(tag.to_string());
            let body = serde_json::to_value(&episode)
                .map_err(|e| ServiceError::internal(e.to_string()))?;
            self.store
                .replace(EntityKind::Episode, id, body, entity.version)
                .await?;
        }
        Ok(episode)
    }
}
