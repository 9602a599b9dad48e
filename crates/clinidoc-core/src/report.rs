use crate::error::{CoreError, Result};
use crate::time::FhirDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Service category of a diagnostic report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportCategory {
    Laboratory,
    Radiology,
    Pathology,
    AiAnalysis,
}

impl fmt::Display for ReportCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Laboratory => write!(f, "laboratory"),
            Self::Radiology => write!(f, "radiology"),
            Self::Pathology => write!(f, "pathology"),
            Self::AiAnalysis => write!(f, "ai-analysis"),
        }
    }
}

impl FromStr for ReportCategory {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "laboratory" => Ok(Self::Laboratory),
            "radiology" => Ok(Self::Radiology),
            "pathology" => Ok(Self::Pathology),
            "ai-analysis" => Ok(Self::AiAnalysis),
            _ => Err(CoreError::validation(format!(
                "Unknown report category: {s}"
            ))),
        }
    }
}

/// A diagnostic report attached to a patient and optionally an encounter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalReport {
    pub id: String,
    pub patient_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encounter_id: Option<String>,
    pub category: ReportCategory,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conclusion: Option<String>,
    pub issued_at: FhirDateTime,
}

impl ClinicalReport {
    pub fn new(
        id: impl Into<String>,
        patient_id: impl Into<String>,
        category: ReportCategory,
        title: impl Into<String>,
        issued_at: FhirDateTime,
    ) -> Self {
        Self {
            id: id.into(),
            patient_id: patient_id.into(),
            encounter_id: None,
            category,
            title: title.into(),
            conclusion: None,
            issued_at,
        }
    }

    pub fn with_conclusion(mut self, conclusion: impl Into<String>) -> Self {
        self.conclusion = Some(conclusion.into());
        self
    }

    pub fn with_encounter(mut self, encounter_id: impl Into<String>) -> Self {
        self.encounter_id = Some(encounter_id.into());
        self
    }
}
