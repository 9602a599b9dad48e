//! SOAP (Subjective / Objective / Assessment / Plan) clinical note model.
//!
//! Each section carries its own completion percentage, recomputed from a
//! fixed weighted rule over its required sub-fields whenever the section is
//! updated. The overall percentage is the rounded mean over all four
//! sections; a section that was never touched counts as 0, it is not
//! excluded from the denominator.

use crate::error::{CoreError, Result};
use crate::time::FhirDateTime;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// The four SOAP section names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoapSection {
    Subjective,
    Objective,
    Assessment,
    Plan,
}

impl SoapSection {
    pub const ALL: [SoapSection; 4] = [
        SoapSection::Subjective,
        SoapSection::Objective,
        SoapSection::Assessment,
        SoapSection::Plan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Subjective => "subjective",
            Self::Objective => "objective",
            Self::Assessment => "assessment",
            Self::Plan => "plan",
        }
    }
}

impl fmt::Display for SoapSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SoapSection {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "subjective" => Ok(Self::Subjective),
            "objective" => Ok(Self::Objective),
            "assessment" => Ok(Self::Assessment),
            "plan" => Ok(Self::Plan),
            _ => Err(CoreError::invalid_section(s)),
        }
    }
}

/// Point-of-care vital sign measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct VitalSigns {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub systolic_bp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diastolic_bp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub respiratory_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oxygen_saturation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height_cm: Option<f64>,
}

impl VitalSigns {
    pub fn is_empty(&self) -> bool {
        self.systolic_bp.is_none()
            && self.diastolic_bp.is_none()
            && self.heart_rate.is_none()
            && self.respiratory_rate.is_none()
            && self.temperature.is_none()
            && self.oxygen_saturation.is_none()
            && self.weight_kg.is_none()
            && self.height_cm.is_none()
    }

    /// Body mass index derived from weight and height. Computed on demand,
    /// never stored.
    pub fn bmi(&self) -> Option<f64> {
        match (self.weight_kg, self.height_cm) {
            (Some(w), Some(h)) if h > 0.0 => {
                let meters = h / 100.0;
                Some(w / (meters * meters))
            }
            _ => None,
        }
    }
}

/// Clinical status of a diagnosis, per the FHIR condition-clinical value set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosisClinicalStatus {
    #[default]
    Active,
    Recurrence,
    Inactive,
    Remission,
    Resolved,
}

impl DiagnosisClinicalStatus {
    pub fn as_fhir_code(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Recurrence => "recurrence",
            Self::Inactive => "inactive",
            Self::Remission => "remission",
            Self::Resolved => "resolved",
        }
    }
}

/// Verification status of a diagnosis, per condition-ver-status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosisVerification {
    Unconfirmed,
    #[default]
    Provisional,
    Differential,
    Confirmed,
    Refuted,
}

impl DiagnosisVerification {
    pub fn as_fhir_code(&self) -> &'static str {
        match self {
            Self::Unconfirmed => "unconfirmed",
            Self::Provisional => "provisional",
            Self::Differential => "differential",
            Self::Confirmed => "confirmed",
            Self::Refuted => "refuted",
        }
    }
}

/// A diagnosis recorded in the assessment section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Diagnosis {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snomed_code: Option<String>,
    #[serde(default)]
    pub clinical_status: DiagnosisClinicalStatus,
    #[serde(default)]
    pub verification: DiagnosisVerification,
}

impl Diagnosis {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            snomed_code: None,
            clinical_status: DiagnosisClinicalStatus::default(),
            verification: DiagnosisVerification::default(),
        }
    }

    pub fn with_snomed_code(mut self, code: impl Into<String>) -> Self {
        self.snomed_code = Some(code.into());
        self
    }
}

/// Completion weighting shared by the four section payload types.
pub trait SectionData: Default + Serialize + DeserializeOwned {
    /// Completion percentage (0-100) from the section's fixed field weights.
    fn completion(&self) -> u8;
}

fn filled(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|v| !v.trim().is_empty())
}

/// Subjective: the patient's own account.
/// Weights: chief complaint 40, history of present illness 40, review of
/// systems 20.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct SubjectiveData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chief_complaint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_of_present_illness: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_of_systems: Option<String>,
}

impl SectionData for SubjectiveData {
    fn completion(&self) -> u8 {
        let mut pct = 0;
        if filled(&self.chief_complaint) {
            pct += 40;
        }
        if filled(&self.history_of_present_illness) {
            pct += 40;
        }
        if filled(&self.review_of_systems) {
            pct += 20;
        }
        pct
    }
}

/// Objective: measurable findings.
/// Weights: vital signs 40, physical exam 40, diagnostic results 20.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ObjectiveData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vital_signs: Option<VitalSigns>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical_exam: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic_results: Option<String>,
}

impl SectionData for ObjectiveData {
    fn completion(&self) -> u8 {
        let mut pct = 0;
        if self.vital_signs.as_ref().is_some_and(|v| !v.is_empty()) {
            pct += 40;
        }
        if filled(&self.physical_exam) {
            pct += 40;
        }
        if filled(&self.diagnostic_results) {
            pct += 20;
        }
        pct
    }
}

/// Assessment: the clinician's interpretation.
/// Weights: primary diagnosis 50, clinical impression 30, differential
/// diagnoses 20.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct AssessmentData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_diagnosis: Option<Diagnosis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clinical_impression: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub differential_diagnoses: Vec<Diagnosis>,
}

impl SectionData for AssessmentData {
    fn completion(&self) -> u8 {
        let mut pct = 0;
        if self.primary_diagnosis.is_some() {
            pct += 50;
        }
        if filled(&self.clinical_impression) {
            pct += 30;
        }
        if !self.differential_diagnoses.is_empty() {
            pct += 20;
        }
        pct
    }
}

/// Plan: what happens next.
/// Weights: treatment plan 40, follow-up 30, patient education 15,
/// referrals 15.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PlanData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub treatment_plan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_education: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub referrals: Vec<String>,
}

impl SectionData for PlanData {
    fn completion(&self) -> u8 {
        let mut pct = 0;
        if filled(&self.treatment_plan) {
            pct += 40;
        }
        if filled(&self.follow_up) {
            pct += 30;
        }
        if filled(&self.patient_education) {
            pct += 15;
        }
        if !self.referrals.is_empty() {
            pct += 15;
        }
        pct
    }
}

/// A section that has been touched at least once: its payload, its current
/// completion percentage, and when it was last updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionState<T> {
    pub data: T,
    pub completion: u8,
    pub last_updated: FhirDateTime,
}

/// The structured SOAP note attached to an encounter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SoapDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subjective: Option<SectionState<SubjectiveData>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objective: Option<SectionState<ObjectiveData>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment: Option<SectionState<AssessmentData>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<SectionState<PlanData>>,
    /// `round(mean)` of the four section percentages; untouched sections
    /// count as 0.
    #[serde(default)]
    pub overall_completion: u8,
}

impl SoapDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a partial update (RFC 7386 merge patch) into the named section,
    /// recompute that section's completion, stamp its `last_updated`, and
    /// recompute the overall percentage.
    pub fn update_section(
        &mut self,
        section: SoapSection,
        partial: &Value,
        now: FhirDateTime,
    ) -> Result<()> {
        if !partial.is_object() {
            return Err(CoreError::validation(format!(
                "section update for '{section}' must be a JSON object"
            )));
        }
        match section {
            SoapSection::Subjective => {
                self.subjective = Some(merge_section(self.subjective.take(), partial, now)?);
            }
            SoapSection::Objective => {
                self.objective = Some(merge_section(self.objective.take(), partial, now)?);
            }
            SoapSection::Assessment => {
                self.assessment = Some(merge_section(self.assessment.take(), partial, now)?);
            }
            SoapSection::Plan => {
                self.plan = Some(merge_section(self.plan.take(), partial, now)?);
            }
        }
        self.overall_completion = self.compute_overall();
        Ok(())
    }

    /// Completion percentage of one section; untouched sections report 0.
    pub fn section_completion(&self, section: SoapSection) -> u8 {
        match section {
            SoapSection::Subjective => self.subjective.as_ref().map_or(0, |s| s.completion),
            SoapSection::Objective => self.objective.as_ref().map_or(0, |s| s.completion),
            SoapSection::Assessment => self.assessment.as_ref().map_or(0, |s| s.completion),
            SoapSection::Plan => self.plan.as_ref().map_or(0, |s| s.completion),
        }
    }

    fn compute_overall(&self) -> u8 {
        let total: u32 = SoapSection::ALL
            .iter()
            .map(|s| u32::from(self.section_completion(*s)))
            .sum();
        (f64::from(total) / 4.0).round() as u8
    }
}

fn merge_section<T: SectionData>(
    existing: Option<SectionState<T>>,
    partial: &Value,
    now: FhirDateTime,
) -> Result<SectionState<T>> {
    let mut merged = serde_json::to_value(existing.map(|s| s.data).unwrap_or_default())?;
    json_patch::merge(&mut merged, partial);
    let data: T = serde_json::from_value(merged)
        .map_err(|e| CoreError::validation(format!("invalid section data: {e}")))?;
    let completion = data.completion();
    Ok(SectionState {
        data,
        completion,
        last_updated: now,
    })
}
