//! End-to-end encounter lifecycle: create, document, sign, amend, and the
//! guards in between.

use clinidoc_core::{EncounterStatus, EncounterType, EpisodeCategory, Provider};
use clinidoc_service::{ClinidocServices, PatientDetails, ServiceConfig, ServiceError};
use clinidoc_storage::create_memory_store;
use serde_json::json;

async fn setup() -> (ClinidocServices, String, String) {
    let services = ClinidocServices::new(create_memory_store(), ServiceConfig::default());
    let patient = services
        .patients
        .register("Ada", "Lovelace", PatientDetails::default())
        .await
        .unwrap();
    let episode = services
        .episodes
        .open(&patient.id, "persistent cough", EpisodeCategory::Acute)
        .await
        .unwrap();
    (services, patient.id, episode.id)
}

async fn create_encounter(services: &ClinidocServices, episode_id: &str, patient_id: &str) -> String {
    services
        .encounters
        .create_encounter(
            episode_id,
            patient_id,
            EncounterType::Initial,
            Provider::new("prov-1", "Dr. Osei").with_credential("MD"),
        )
        .await
        .unwrap()
        .id
}

async fn document_fully(services: &ClinidocServices, encounter_id: &str) {
    for (section, partial) in [
        (
            "subjective",
            json!({
                "chief_complaint": "persistent cough",
                "history_of_present_illness": "two weeks, worse at night",
                "review_of_systems": "no fever"
            }),
        ),
        (
            "objective",
            json!({
                "vital_signs": {"heart_rate": 72.0, "temperature": 36.8, "oxygen_saturation": 98.0},
                "physical_exam": "lungs clear to auscultation",
                "diagnostic_results": "CXR unremarkable"
            }),
        ),
        (
            "assessment",
            json!({
                "primary_diagnosis": {"description": "acute bronchitis", "snomed_code": "10509002"},
                "clinical_impression": "likely viral",
                "differential_diagnoses": [{"description": "pneumonia"}]
            }),
        ),
        (
            "plan",
            json!({
                "treatment_plan": "rest and fluids",
                "follow_up": "2 weeks",
                "patient_education": "return if fever develops",
                "referrals": ["pulmonology"]
            }),
        ),
    ] {
        services
            .encounters
            .update_soap_section(encounter_id, section, &partial)
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn new_encounter_starts_as_draft() {
    let (services, patient_id, episode_id) = setup().await;
    let id = create_encounter(&services, &episode_id, &patient_id).await;
    let encounter = services.encounters.get_encounter(&id).await.unwrap();
    assert_eq!(encounter.status, EncounterStatus::Draft);
    assert_eq!(encounter.workflow.version, 1);
    assert_eq!(encounter.reason.as_deref(), Some("persistent cough"));
}

#[tokio::test]
async fn create_rejects_mismatched_episode_and_patient() {
    let (services, _, episode_id) = setup().await;
    let other = services
        .patients
        .register("Grace", "Hopper", PatientDetails::default())
        .await
        .unwrap();
    let err = services
        .encounters
        .create_encounter(
            &episode_id,
            &other.id,
            EncounterType::Routine,
            Provider::new("prov-1", "Dr. Osei"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}

#[tokio::test]
async fn subjective_only_scores_25_and_is_not_ready() {
    let (services, patient_id, episode_id) = setup().await;
    let id = create_encounter(&services, &episode_id, &patient_id).await;

    let encounter = services
        .encounters
        .update_soap_section(
            &id,
            "subjective",
            &json!({
                "chief_complaint": "persistent cough",
                "history_of_present_illness": "two weeks",
                "review_of_systems": "no fever"
            }),
        )
        .await
        .unwrap();

    assert_eq!(encounter.status, EncounterStatus::InProgress);
    assert_eq!(encounter.soap.overall_completion, 25);

    let report = services.encounters.validate_completeness(&id).await.unwrap();
    assert!(!report.ready);
    assert_eq!(report.missing_sections, vec!["objective", "assessment", "plan"]);
}

#[tokio::test]
async fn unknown_section_is_invalid() {
    let (services, patient_id, episode_id) = setup().await;
    let id = create_encounter(&services, &episode_id, &patient_id).await;
    let err = services
        .encounters
        .update_soap_section(&id, "narrative", &json!({"x": 1}))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidSection(_)));
}

#[tokio::test]
async fn signing_requires_confirmation_and_leaves_state() {
    let (services, patient_id, episode_id) = setup().await;
    let id = create_encounter(&services, &episode_id, &patient_id).await;
    document_fully(&services, &id).await;

    let before = services.encounters.get_encounter(&id).await.unwrap();
    let err = services
        .encounters
        .sign_encounter(&id, "Dr. Osei", false)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    let after = services.encounters.get_encounter(&id).await.unwrap();
    assert_eq!(after, before);
    assert_eq!(after.status, EncounterStatus::InProgress);
}

#[tokio::test]
async fn signing_requires_completeness() {
    let (services, patient_id, episode_id) = setup().await;
    let id = create_encounter(&services, &episode_id, &patient_id).await;
    services
        .encounters
        .update_soap_section(&id, "subjective", &json!({"chief_complaint": "cough"}))
        .await
        .unwrap();

    let err = services
        .encounters
        .sign_encounter(&id, "Dr. Osei", true)
        .await
        .unwrap_err();
    match err {
        ServiceError::Validation(msg) => {
            assert!(msg.contains("objective"));
            assert!(msg.contains("plan"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn sign_then_lock_then_amend() {
    let (services, patient_id, episode_id) = setup().await;
    let id = create_encounter(&services, &episode_id, &patient_id).await;
    document_fully(&services, &id).await;

    let signed = services
        .encounters
        .sign_encounter(&id, "Dr. Osei", true)
        .await
        .unwrap();
    assert_eq!(signed.status, EncounterStatus::Signed);
    assert!(signed.signed_at.is_some());
    assert_eq!(signed.signed_by.as_deref(), Some("Dr. Osei"));
    assert_eq!(signed.workflow.signed_version, Some(signed.workflow.version));

    // direct writes are now locked
    let err = services
        .encounters
        .update_soap_section(&id, "plan", &json!({"follow_up": "1 week"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::EncounterLocked { .. }));

    // double-sign is a conflict and changes nothing
    let err = services
        .encounters
        .sign_encounter(&id, "Dr. Adeyemi", true)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
    let unchanged = services.encounters.get_encounter(&id).await.unwrap();
    assert_eq!(unchanged.workflow.version, signed.workflow.version);
    assert_eq!(unchanged.signed_by.as_deref(), Some("Dr. Osei"));

    // amendment is the only legal mutation
    let pre_version = unchanged.workflow.version;
    let amended = services
        .encounters
        .amend_encounter(
            &id,
            "follow-up moved up",
            json!({"plan": {"follow_up": "3 days"}}),
            "Dr. Osei",
        )
        .await
        .unwrap();
    assert_eq!(amended.status, EncounterStatus::Amended);
    assert_eq!(amended.amendments.len(), 1);
    assert_eq!(amended.amendments[0].previous_version, pre_version);
    assert_eq!(amended.workflow.version, pre_version + 1);
    assert_eq!(
        amended.soap.plan.as_ref().unwrap().data.follow_up.as_deref(),
        Some("3 days")
    );
}

#[tokio::test]
async fn amending_unsigned_encounter_is_locked() {
    let (services, patient_id, episode_id) = setup().await;
    let id = create_encounter(&services, &episode_id, &patient_id).await;
    let err = services
        .encounters
        .amend_encounter(&id, "typo", json!({"c": 1}), "Dr. Osei")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::EncounterLocked { .. }));
}

#[tokio::test]
async fn signed_records_cannot_be_cancelled_or_deleted() {
    let (services, patient_id, episode_id) = setup().await;
    let id = create_encounter(&services, &episode_id, &patient_id).await;
    document_fully(&services, &id).await;
    services
        .encounters
        .sign_encounter(&id, "Dr. Osei", true)
        .await
        .unwrap();

    let err = services
        .encounters
        .cancel_encounter(&id, "mistake")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::EncounterLocked { .. }));

    let err = services.encounters.delete_encounter(&id).await.unwrap_err();
    assert!(matches!(err, ServiceError::EncounterLocked { .. }));
    assert!(services.encounters.get_encounter(&id).await.is_ok());
}

#[tokio::test]
async fn draft_can_be_cancelled_and_deleted() {
    let (services, patient_id, episode_id) = setup().await;

    let id = create_encounter(&services, &episode_id, &patient_id).await;
    let cancelled = services
        .encounters
        .cancel_encounter(&id, "patient no-show")
        .await
        .unwrap();
    assert_eq!(cancelled.status, EncounterStatus::Cancelled);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("patient no-show"));

    let id2 = create_encounter(&services, &episode_id, &patient_id).await;
    services.encounters.delete_encounter(&id2).await.unwrap();
    let err = services.encounters.get_encounter(&id2).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { .. }));
}

#[tokio::test]
async fn complete_then_sign_flow() {
    let (services, patient_id, episode_id) = setup().await;
    let id = create_encounter(&services, &episode_id, &patient_id).await;
    document_fully(&services, &id).await;

    let completed = services.encounters.complete_encounter(&id).await.unwrap();
    assert_eq!(completed.status, EncounterStatus::Completed);
    assert!(completed.ended_at.is_some());

    let signed = services
        .encounters
        .sign_encounter(&id, "Dr. Osei", true)
        .await
        .unwrap();
    assert_eq!(signed.status, EncounterStatus::Signed);
}

#[tokio::test]
async fn amended_record_can_be_resigned() {
    let (services, patient_id, episode_id) = setup().await;
    let id = create_encounter(&services, &episode_id, &patient_id).await;
    document_fully(&services, &id).await;
    services
        .encounters
        .sign_encounter(&id, "Dr. Osei", true)
        .await
        .unwrap();
    services
        .encounters
        .amend_encounter(&id, "typo fix", json!({"c": 1}), "Dr. Osei")
        .await
        .unwrap();

    let resigned = services
        .encounters
        .sign_encounter(&id, "Dr. Osei", true)
        .await
        .unwrap();
    assert_eq!(resigned.status, EncounterStatus::Signed);
    assert_eq!(
        resigned.workflow.signed_version,
        Some(resigned.workflow.version)
    );
}

#[tokio::test]
async fn statistics_count_by_status_and_latest_visit() {
    let (services, patient_id, episode_id) = setup().await;

    let draft_id = create_encounter(&services, &episode_id, &patient_id).await;
    let signed_id = create_encounter(&services, &episode_id, &patient_id).await;
    document_fully(&services, &signed_id).await;
    services
        .encounters
        .sign_encounter(&signed_id, "Dr. Osei", true)
        .await
        .unwrap();
    let cancelled_id = create_encounter(&services, &episode_id, &patient_id).await;
    services
        .encounters
        .cancel_encounter(&cancelled_id, "no-show")
        .await
        .unwrap();

    let stats = services.encounters.get_statistics().await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.by_status["draft"], 1);
    assert_eq!(stats.by_status["signed"], 1);
    assert_eq!(stats.by_status["cancelled"], 1);
    assert_eq!(stats.by_status["in-progress"], 0);
    assert!(stats.last_visit_by_episode.contains_key(&episode_id));

    let latest = &stats.last_visit_by_episode[&episode_id];
    let draft = services.encounters.get_encounter(&draft_id).await.unwrap();
    assert!(*latest >= draft.started_at);
}

#[tokio::test]
async fn gateway_roundtrips_stored_patient() {
    let (services, patient_id, _) = setup().await;
    let patient = services.patients.get(&patient_id).await.unwrap();
    let entity = serde_json::to_value(&patient).unwrap();

    let envelope = clinidoc_service::gateway::to_fhir("Patient", &entity).unwrap();
    assert_eq!(envelope["resourceType"], "Patient");

    let patch = clinidoc_service::gateway::from_fhir("Patient", &envelope).unwrap();
    assert_eq!(patch["id"], patient_id.as_str());
    assert_eq!(patch["given_name"], "Ada");
}

#[tokio::test]
async fn encounter_exports_as_collection_bundle() {
    let (services, patient_id, episode_id) = setup().await;
    let id = create_encounter(&services, &episode_id, &patient_id).await;
    document_fully(&services, &id).await;

    let encounter = services.encounters.get_encounter(&id).await.unwrap();
    let bundle = clinidoc_service::gateway::encounter_to_bundle(&encounter).unwrap();

    assert_eq!(bundle.bundle_type, "collection");
    // 1 encounter + 3 vitals + 2 diagnoses
    assert_eq!(bundle.entry.len(), 6);
    let types: Vec<&str> = bundle
        .entry
        .iter()
        .filter_map(|e| e.resource.as_ref())
        .filter_map(|r| r["resourceType"].as_str())
        .collect();
    assert_eq!(types.iter().filter(|t| **t == "Observation").count(), 3);
    assert_eq!(types.iter().filter(|t| **t == "Condition").count(), 2);
}
