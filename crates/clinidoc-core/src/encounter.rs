//! Encounter records and their lifecycle state machine.
//!
//! The legal flow is Draft -> InProgress -> Completed -> Signed, with
//! Signed -> Amended repeatable (an amended record may be re-signed) and
//! any non-signed state -> Cancelled. Signed and Amended are terminal for
//! direct documentation writes: a signed record changes only through
//! tracked amendments, and is never deleted.

use crate::error::{CoreError, Result};
use crate::id::generate_id;
use crate::soap::{SoapDocument, SoapSection};
use crate::time::FhirDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Minimum completion percentage every SOAP section must reach before an
/// encounter is considered ready to sign.
pub const MIN_SECTION_COMPLETION: u8 = 80;

/// Kind of clinical visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EncounterType {
    Initial,
    FollowUp,
    Urgent,
    Routine,
    Consultation,
    Telemedicine,
}

impl fmt::Display for EncounterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initial => write!(f, "initial"),
            Self::FollowUp => write!(f, "follow-up"),
            Self::Urgent => write!(f, "urgent"),
            Self::Routine => write!(f, "routine"),
            Self::Consultation => write!(f, "consultation"),
            Self::Telemedicine => write!(f, "telemedicine"),
        }
    }
}

impl FromStr for EncounterType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "initial" => Ok(Self::Initial),
            "follow-up" => Ok(Self::FollowUp),
            "urgent" => Ok(Self::Urgent),
            "routine" => Ok(Self::Routine),
            "consultation" => Ok(Self::Consultation),
            "telemedicine" => Ok(Self::Telemedicine),
            _ => Err(CoreError::validation(format!(
                "Unknown encounter type: {s}"
            ))),
        }
    }
}

/// Lifecycle status of an encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EncounterStatus {
    #[default]
    Draft,
    InProgress,
    Completed,
    Signed,
    Amended,
    Cancelled,
}

impl EncounterStatus {
    /// Whether SOAP documentation may still be written directly.
    pub fn allows_documentation(&self) -> bool {
        matches!(self, Self::Draft | Self::InProgress | Self::Completed)
    }

    /// Signed and Amended records are locked: no direct writes, no
    /// cancellation, no deletion.
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Signed | Self::Amended)
    }
}

impl fmt::Display for EncounterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::InProgress => write!(f, "in-progress"),
            Self::Completed => write!(f, "completed"),
            Self::Signed => write!(f, "signed"),
            Self::Amended => write!(f, "amended"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for EncounterStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(Self::Draft),
            "in-progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "signed" => Ok(Self::Signed),
            "amended" => Ok(Self::Amended),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(CoreError::validation(format!(
                "Unknown encounter status: {s}"
            ))),
        }
    }
}

/// The clinician responsible for an encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl Provider {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            credential: None,
        }
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }
}

/// Workflow bookkeeping: the monotonically increasing document version and
/// which version the newest signature covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowMeta {
    pub version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_saved: Option<FhirDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_version: Option<u64>,
}

impl Default for WorkflowMeta {
    fn default() -> Self {
        Self {
            version: 1,
            last_saved: None,
            signed_version: None,
        }
    }
}

/// An append-only correction to a signed encounter. The full `changes`
/// value is retained for audit even where it touches nothing typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Amendment {
    pub id: String,
    pub amended_by: String,
    pub amended_at: FhirDateTime,
    pub reason: String,
    pub changes: Value,
    pub previous_version: u64,
}

/// Result of a pre-sign completeness check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletenessReport {
    pub ready: bool,
    pub missing_sections: Vec<String>,
}

/// One clinical visit: belongs to exactly one episode and one patient,
/// carries a SOAP document and the workflow state guarding it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Encounter {
    pub id: String,
    pub episode_id: String,
    pub patient_id: String,
    pub encounter_type: EncounterType,
    #[serde(default)]
    pub status: EncounterStatus,
    pub provider: Provider,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub soap: SoapDocument,
    #[serde(default)]
    pub workflow: WorkflowMeta,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub amendments: Vec<Amendment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_at: Option<FhirDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    /// Id of the Encounter resource on an external FHIR server, when this
    /// record has been exchanged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fhir_encounter_id: Option<String>,
    pub started_at: FhirDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<FhirDateTime>,
    pub created_at: FhirDateTime,
    pub updated_at: FhirDateTime,
}

impl Encounter {
    pub fn new(
        id: impl Into<String>,
        episode_id: impl Into<String>,
        patient_id: impl Into<String>,
        encounter_type: EncounterType,
        provider: Provider,
        now: FhirDateTime,
    ) -> Self {
        Self {
            id: id.into(),
            episode_id: episode_id.into(),
            patient_id: patient_id.into(),
            encounter_type,
            status: EncounterStatus::Draft,
            provider,
            reason: None,
            soap: SoapDocument::new(),
            workflow: WorkflowMeta::default(),
            amendments: Vec::new(),
            signed_at: None,
            signed_by: None,
            cancellation_reason: None,
            fhir_encounter_id: None,
            started_at: now.clone(),
            ended_at: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Whether this record has ever been signed, regardless of later
    /// amendments.
    pub fn has_been_signed(&self) -> bool {
        self.signed_at.is_some()
    }

    /// Merge a partial update into one SOAP section.
    ///
    /// Allowed only while documentation is open (Draft, InProgress,
    /// Completed). The first update promotes a Draft to InProgress. Every
    /// successful update bumps `workflow.version` and stamps
    /// `workflow.last_saved`.
    pub fn update_soap_section(
        &mut self,
        section: SoapSection,
        partial: &Value,
        now: FhirDateTime,
    ) -> Result<()> {
        if !self.status.allows_documentation() {
            return Err(CoreError::encounter_locked(&self.id, self.status));
        }
        self.soap.update_section(section, partial, now.clone())?;
        if self.status == EncounterStatus::Draft {
            self.status = EncounterStatus::InProgress;
        }
        self.workflow.version += 1;
        self.workflow.last_saved = Some(now.clone());
        self.updated_at = now;
        Ok(())
    }

    /// Mark documentation as complete. Draft or InProgress only.
    pub fn complete_documentation(&mut self, now: FhirDateTime) -> Result<()> {
        match self.status {
            EncounterStatus::Draft | EncounterStatus::InProgress => {
                self.status = EncounterStatus::Completed;
                self.ended_at = Some(now.clone());
                self.updated_at = now;
                Ok(())
            }
            _ => Err(CoreError::encounter_locked(&self.id, self.status)),
        }
    }

    /// Pure read: is every SOAP section at or above `threshold` percent?
    /// Sections below (or never touched) are named in the report.
    pub fn validate_completeness(&self, threshold: u8) -> CompletenessReport {
        let missing_sections: Vec<String> = SoapSection::ALL
            .iter()
            .filter(|s| self.soap.section_completion(**s) < threshold)
            .map(|s| s.as_str().to_string())
            .collect();
        CompletenessReport {
            ready: missing_sections.is_empty(),
            missing_sections,
        }
    }

    /// Sign the encounter, freezing its documentation.
    ///
    /// Requires the explicit confirmation flag. Signing an already-signed
    /// record is a conflict; a cancelled record can never be signed. An
    /// Amended record may be re-signed, which moves `signed_version`
    /// forward to cover the amendment.
    pub fn sign(
        &mut self,
        signed_by: impl Into<String>,
        confirmed: bool,
        now: FhirDateTime,
    ) -> Result<()> {
        if !confirmed {
            return Err(CoreError::validation(
                "signature requires explicit confirmation",
            ));
        }
        match self.status {
            EncounterStatus::Signed => Err(CoreError::conflict(format!(
                "encounter {} is already signed",
                self.id
            ))),
            EncounterStatus::Cancelled => Err(CoreError::encounter_locked(&self.id, self.status)),
            _ => {
                self.status = EncounterStatus::Signed;
                self.signed_at = Some(now.clone());
                self.signed_by = Some(signed_by.into());
                self.workflow.signed_version = Some(self.workflow.version);
                if self.ended_at.is_none() {
                    self.ended_at = Some(now.clone());
                }
                self.updated_at = now;
                Ok(())
            }
        }
    }

    /// Amend a signed encounter.
    ///
    /// Appends exactly one Amendment carrying the full `changes` value and
    /// the pre-amend version, applies any section-keyed changes to the
    /// document, bumps the version, and moves the record to Amended.
    pub fn amend(
        &mut self,
        reason: impl Into<String>,
        changes: Value,
        amended_by: impl Into<String>,
        now: FhirDateTime,
    ) -> Result<()> {
        if !self.status.is_locked() {
            return Err(CoreError::encounter_locked(&self.id, self.status));
        }
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(CoreError::validation("amendment reason must not be empty"));
        }
        let changes_map = changes
            .as_object()
            .ok_or_else(|| CoreError::validation("amendment changes must be a JSON object"))?;

        // Apply all section-keyed changes to a working copy first, so a bad
        // patch cannot leave the document half-amended.
        let mut updated = self.soap.clone();
        for (key, value) in changes_map {
            if let Ok(section) = key.parse::<SoapSection>() {
                updated.update_section(section, value, now.clone())?;
            }
        }
        self.soap = updated;

        let previous_version = self.workflow.version;
        self.amendments.push(Amendment {
            id: generate_id(),
            amended_by: amended_by.into(),
            amended_at: now.clone(),
            reason,
            changes,
            previous_version,
        });
        self.workflow.version = previous_version + 1;
        self.status = EncounterStatus::Amended;
        self.updated_at = now;
        Ok(())
    }

    /// Cancel the encounter. Signed and Amended records cannot be
    /// cancelled.
    pub fn cancel(&mut self, reason: impl Into<String>, now: FhirDateTime) -> Result<()> {
        if self.status.is_locked() {
            return Err(CoreError::encounter_locked(&self.id, self.status));
        }
        self.status = EncounterStatus::Cancelled;
        self.cancellation_reason = Some(reason.into());
        self.ended_at = Some(now.clone());
        self.updated_at = now;
        Ok(())
    }

    /// Signed records must never be deleted; everything else may be.
    pub fn can_be_deleted(&self) -> bool {
        !self.status.is_locked()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::now_utc;
    use serde_json::json;

    fn encounter() -> Encounter {
        Encounter::new(
            "enc-1",
            "ep-1",
            "pat-1",
            EncounterType::Initial,
            Provider::new("prov-1", "Dr. Osei").with_credential("MD"),
            now_utc(),
        )
    }

    fn full_section(section: SoapSection) -> serde_json::Value {
        match section {
            SoapSection::Subjective => json!({
                "chief_complaint": "persistent cough",
                "history_of_present_illness": "two weeks, worse at night",
                "review_of_systems": "no fever"
            }),
            SoapSection::Objective => json!({
                "vital_signs": {"heart_rate": 72.0, "temperature": 36.8},
                "physical_exam": "lungs clear",
                "diagnostic_results": "CXR unremarkable"
            }),
            SoapSection::Assessment => json!({
                "primary_diagnosis": {"description": "acute bronchitis", "snomed_code": "10509002"},
                "clinical_impression": "likely viral",
                "differential_diagnoses": [{"description": "pneumonia"}]
            }),
            SoapSection::Plan => json!({
                "treatment_plan": "rest and fluids",
                "follow_up": "2 weeks",
                "patient_education": "return if fever develops",
                "referrals": ["pulmonology"]
            }),
        }
    }

    fn signed_encounter() -> Encounter {
        let mut enc = encounter();
        for section in SoapSection::ALL {
            enc.update_soap_section(section, &full_section(section), now_utc())
                .unwrap();
        }
        enc.sign("Dr. Osei", true, now_utc()).unwrap();
        enc
    }

    #[test]
    fn test_new_encounter_is_draft() {
        let enc = encounter();
        assert_eq!(enc.status, EncounterStatus::Draft);
        assert_eq!(enc.workflow.version, 1);
        assert!(enc.signed_at.is_none());
        assert!(enc.signed_by.is_none());
    }

    #[test]
    fn test_first_update_promotes_to_in_progress() {
        let mut enc = encounter();
        enc.update_soap_section(
            SoapSection::Subjective,
            &json!({"chief_complaint": "cough"}),
            now_utc(),
        )
        .unwrap();
        assert_eq!(enc.status, EncounterStatus::InProgress);
        assert_eq!(enc.workflow.version, 2);
        assert!(enc.workflow.last_saved.is_some());
    }

    #[test]
    fn test_version_bumps_on_every_update() {
        let mut enc = encounter();
        for i in 0..3 {
            enc.update_soap_section(
                SoapSection::Plan,
                &json!({"treatment_plan": format!("plan v{i}")}),
                now_utc(),
            )
            .unwrap();
        }
        assert_eq!(enc.workflow.version, 4);
    }

    #[test]
    fn test_signed_iff_signed_fields_present() {
        let enc = encounter();
        assert_eq!(enc.status == EncounterStatus::Signed, enc.signed_at.is_some());

        let signed = signed_encounter();
        assert_eq!(signed.status, EncounterStatus::Signed);
        assert!(signed.signed_at.is_some());
        assert!(signed.signed_by.is_some());
        assert_eq!(signed.workflow.signed_version, Some(signed.workflow.version));
    }

    #[test]
    fn test_sign_without_confirmation_fails_and_leaves_state() {
        let mut enc = encounter();
        let before = enc.clone();
        let err = enc.sign("Dr. Osei", false, now_utc()).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(enc, before);
    }

    #[test]
    fn test_double_sign_is_conflict() {
        let mut enc = signed_encounter();
        let version_before = enc.workflow.version;
        let err = enc.sign("Dr. Adeyemi", true, now_utc()).unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
        assert_eq!(enc.status, EncounterStatus::Signed);
        assert_eq!(enc.workflow.version, version_before);
        assert_eq!(enc.signed_by.as_deref(), Some("Dr. Osei"));
    }

    #[test]
    fn test_update_on_signed_is_locked() {
        let mut enc = signed_encounter();
        let err = enc
            .update_soap_section(
                SoapSection::Plan,
                &json!({"treatment_plan": "changed"}),
                now_utc(),
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::EncounterLocked { .. }));
    }

    #[test]
    fn test_update_on_amended_is_locked() {
        let mut enc = signed_encounter();
        enc.amend("typo", json!({"plan": {"follow_up": "1 week"}}), "Dr. Osei", now_utc())
            .unwrap();
        let err = enc
            .update_soap_section(
                SoapSection::Plan,
                &json!({"treatment_plan": "changed"}),
                now_utc(),
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::EncounterLocked { .. }));
    }

    #[test]
    fn test_update_on_cancelled_is_locked() {
        let mut enc = encounter();
        enc.cancel("patient no-show", now_utc()).unwrap();
        let err = enc
            .update_soap_section(
                SoapSection::Subjective,
                &json!({"chief_complaint": "cough"}),
                now_utc(),
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::EncounterLocked { .. }));
    }

    #[test]
    fn test_amend_records_previous_version() {
        let mut enc = signed_encounter();
        let pre_version = enc.workflow.version;

        enc.amend("corrected dosage", json!({"c": 1}), "Dr. Osei", now_utc())
            .unwrap();

        assert_eq!(enc.amendments.len(), 1);
        let amendment = &enc.amendments[0];
        assert_eq!(amendment.previous_version, pre_version);
        assert_eq!(enc.workflow.version, pre_version + 1);
        assert_eq!(enc.status, EncounterStatus::Amended);
        assert_eq!(amendment.changes, json!({"c": 1}));
    }

    #[test]
    fn test_amend_applies_section_changes() {
        let mut enc = signed_encounter();
        enc.amend(
            "follow-up moved up",
            json!({"plan": {"follow_up": "3 days"}}),
            "Dr. Osei",
            now_utc(),
        )
        .unwrap();
        assert_eq!(
            enc.soap.plan.as_ref().unwrap().data.follow_up.as_deref(),
            Some("3 days")
        );
    }

    #[test]
    fn test_amend_unsigned_is_locked() {
        let mut enc = encounter();
        let err = enc
            .amend("reason", json!({}), "Dr. Osei", now_utc())
            .unwrap_err();
        assert!(matches!(err, CoreError::EncounterLocked { .. }));
        assert!(enc.amendments.is_empty());
    }

    #[test]
    fn test_amend_requires_reason() {
        let mut enc = signed_encounter();
        let err = enc
            .amend("  ", json!({"c": 1}), "Dr. Osei", now_utc())
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_amend_with_bad_section_patch_changes_nothing() {
        let mut enc = signed_encounter();
        let before = enc.clone();
        let err = enc
            .amend(
                "bad patch",
                json!({"plan": {"not_a_field": true}}),
                "Dr. Osei",
                now_utc(),
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(enc, before);
    }

    #[test]
    fn test_amended_encounter_can_be_resigned() {
        let mut enc = signed_encounter();
        enc.amend("typo", json!({"c": 1}), "Dr. Osei", now_utc())
            .unwrap();
        let amended_version = enc.workflow.version;

        enc.sign("Dr. Osei", true, now_utc()).unwrap();
        assert_eq!(enc.status, EncounterStatus::Signed);
        assert_eq!(enc.workflow.signed_version, Some(amended_version));

        // and the cycle repeats
        enc.amend("second fix", json!({"c": 2}), "Dr. Osei", now_utc())
            .unwrap();
        assert_eq!(enc.amendments.len(), 2);
    }

    #[test]
    fn test_cancel_signed_is_locked() {
        let mut enc = signed_encounter();
        let err = enc.cancel("mistake", now_utc()).unwrap_err();
        assert!(matches!(err, CoreError::EncounterLocked { .. }));
        assert_eq!(enc.status, EncounterStatus::Signed);
    }

    #[test]
    fn test_cancel_sets_reason_and_end() {
        let mut enc = encounter();
        enc.cancel("patient no-show", now_utc()).unwrap();
        assert_eq!(enc.status, EncounterStatus::Cancelled);
        assert_eq!(enc.cancellation_reason.as_deref(), Some("patient no-show"));
        assert!(enc.ended_at.is_some());
    }

    #[test]
    fn test_cancelled_cannot_be_signed() {
        let mut enc = encounter();
        enc.cancel("no-show", now_utc()).unwrap();
        let err = enc.sign("Dr. Osei", true, now_utc()).unwrap_err();
        assert!(matches!(err, CoreError::EncounterLocked { .. }));
    }

    #[test]
    fn test_complete_documentation() {
        let mut enc = encounter();
        enc.update_soap_section(
            SoapSection::Subjective,
            &json!({"chief_complaint": "cough"}),
            now_utc(),
        )
        .unwrap();
        enc.complete_documentation(now_utc()).unwrap();
        assert_eq!(enc.status, EncounterStatus::Completed);
        assert!(enc.ended_at.is_some());

        let err = enc.complete_documentation(now_utc()).unwrap_err();
        assert!(matches!(err, CoreError::EncounterLocked { .. }));
    }

    #[test]
    fn test_deletion_guard() {
        assert!(encounter().can_be_deleted());
        assert!(!signed_encounter().can_be_deleted());

        let mut amended = signed_encounter();
        amended
            .amend("fix", json!({"c": 1}), "Dr. Osei", now_utc())
            .unwrap();
        assert!(!amended.can_be_deleted());
    }

    #[test]
    fn test_validate_completeness_scenario() {
        let mut enc = encounter();
        enc.update_soap_section(
            SoapSection::Subjective,
            &full_section(SoapSection::Subjective),
            now_utc(),
        )
        .unwrap();

        assert_eq!(enc.soap.overall_completion, 25);

        let report = enc.validate_completeness(MIN_SECTION_COMPLETION);
        assert!(!report.ready);
        assert_eq!(
            report.missing_sections,
            vec!["objective", "assessment", "plan"]
        );
    }

    #[test]
    fn test_validate_completeness_ready() {
        let mut enc = encounter();
        for section in SoapSection::ALL {
            enc.update_soap_section(section, &full_section(section), now_utc())
                .unwrap();
        }
        let report = enc.validate_completeness(MIN_SECTION_COMPLETION);
        assert!(report.ready);
        assert!(report.missing_sections.is_empty());
    }

    #[test]
    fn test_encounter_serde_roundtrip() {
        let mut enc = signed_encounter();
        enc.amend("fix", json!({"c": 1}), "Dr. Osei", now_utc())
            .unwrap();
        let json = serde_json::to_string(&enc).unwrap();
        let back: Encounter = serde_json::from_str(&json).unwrap();
        assert_eq!(enc, back);
    }
}
