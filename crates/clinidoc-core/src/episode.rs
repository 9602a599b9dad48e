use crate::error::{CoreError, Result};
use crate::time::{now_utc, FhirDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Clinical category of a problem episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EpisodeCategory {
    Acute,
    Chronic,
    Preventive,
    Emergency,
    Routine,
    FollowUp,
}

impl fmt::Display for EpisodeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Acute => write!(f, "acute"),
            Self::Chronic => write!(f, "chronic"),
            Self::Preventive => write!(f, "preventive"),
            Self::Emergency => write!(f, "emergency"),
            Self::Routine => write!(f, "routine"),
            Self::FollowUp => write!(f, "follow-up"),
        }
    }
}

impl FromStr for EpisodeCategory {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "acute" => Ok(Self::Acute),
            "chronic" => Ok(Self::Chronic),
            "preventive" => Ok(Self::Preventive),
            "emergency" => Ok(Self::Emergency),
            "routine" => Ok(Self::Routine),
            "follow-up" => Ok(Self::FollowUp),
            _ => Err(CoreError::validation(format!(
                "Unknown episode category: {s}"
            ))),
        }
    }
}

/// Lifecycle status of a problem episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EpisodeStatus {
    #[default]
    Active,
    Resolved,
    OnHold,
    Cancelled,
}

impl fmt::Display for EpisodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Resolved => write!(f, "resolved"),
            Self::OnHold => write!(f, "on-hold"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A problem thread: one chief complaint followed across zero or more
/// encounters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    pub patient_id: String,
    pub chief_complaint: String,
    pub category: EpisodeCategory,
    #[serde(default)]
    pub status: EpisodeStatus,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub related_episode_ids: Vec<String>,
    /// Set exactly while status is Resolved, cleared otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<FhirDateTime>,
    pub created_at: FhirDateTime,
    pub updated_at: FhirDateTime,
}

impl Episode {
    pub fn new(
        id: impl Into<String>,
        patient_id: impl Into<String>,
        chief_complaint: impl Into<String>,
        category: EpisodeCategory,
    ) -> Self {
        let now = now_utc();
        Self {
            id: id.into(),
            patient_id: patient_id.into(),
            chief_complaint: chief_complaint.into(),
            category,
            status: EpisodeStatus::default(),
            tags: Vec::new(),
            related_episode_ids: Vec::new(),
            resolved_at: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Transition the episode status, keeping `resolved_at` consistent:
    /// it is set when entering Resolved and cleared when leaving it.
    pub fn set_status(&mut self, status: EpisodeStatus) {
        self.status = status;
        self.resolved_at = match status {
            EpisodeStatus::Resolved => Some(now_utc()),
            _ => None,
        };
        self.updated_at = now_utc();
    }

    /// Link another episode as related. An episode must not reference
    /// itself.
    pub fn link_related(&mut self, episode_id: impl Into<String>) -> Result<()> {
        let episode_id = episode_id.into();
        if episode_id == self.id {
            return Err(CoreError::validation(format!(
                "episode {} cannot reference itself",
                self.id
            )));
        }
        if !self.related_episode_ids.contains(&episode_id) {
            self.related_episode_ids.push(episode_id);
            self.updated_at = now_utc();
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, EpisodeStatus::Active)
    }
}
