//! Patient record operations.

use clinidoc_core::{generate_id, Gender, Patient};
use clinidoc_storage::{DynChartStore, EntityKind};
use tracing::info;

use crate::error::{Result, ServiceError};

/// Demographics accepted when registering or updating a patient.
#[derive(Debug, Clone, Default)]
pub struct PatientDetails {
    pub birth_date: Option<String>,
    pub gender: Option<Gender>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

pub struct PatientService {
    store: DynChartStore,
}

impl PatientService {
    pub fn new(store: DynChartStore) -> Self {
        Self { store }
    }

    pub async fn register(
        &self,
        given_name: &str,
        family_name: &str,
        details: PatientDetails,
    ) -> Result<Patient> {
        let mut patient = Patient::new(generate_id(), given_name, family_name);
        apply_details(&mut patient, details);
        patient.validate()?;

        let body = serde_json::to_value(&patient)
            .map_err(|e| ServiceError::internal(e.to_string()))?;
        self.store
            .create(EntityKind::Patient, &patient.id, body)
            .await?;
        info!(patient_id = %patient.id, "patient registered");
        Ok(patient)
    }

    pub async fn get(&self, id: &str) -> Result<Patient> {
        let entity = self
            .store
            .get(EntityKind::Patient, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("patient", id))?;
        serde_json::from_value(entity.body).map_err(|e| ServiceError::internal(e.to_string()))
    }

    /// Update mutable demographics. Identity fields (`id`, `created_at`)
    /// never change.
    pub async fn update_demographics(&self, id: &str, details: PatientDetails) -> Result<Patient> {
        let entity = self
            .store
            .get(EntityKind::Patient, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("patient", id))?;
        let mut patient: Patient = serde_json::from_value(entity.body)
            .map_err(|e| ServiceError::internal(e.to_string()))?;

        apply_details(&mut patient, details);
        patient.touch();
        patient.validate()?;

        let body = serde_json::to_value(&patient)
            .map_err(|e| ServiceError::internal(e.to_string()))?;
        self.store
            .replace(EntityKind::Patient, id, body, entity.version)
            .await?;
        Ok(patient)
    }

    /// Replace the medical background lists wholesale.
    pub async fn update_medical_background(
        &self,
        id: &str,
        allergies: Vec<String>,
        medications: Vec<String>,
        chronic_conditions: Vec<String>,
    ) -> Result<Patient> {
        let entity = self
            .store
            .get(EntityKind::Patient, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("patient", id))?;
        let mut patient: Patient = serde_json::from_value(entity.body)
            .map_err(|e| ServiceError::internal(e.to_string()))?;

        patient.medical_background.allergies = allergies;
        patient.medical_background.medications = medications;
        patient.medical_background.chronic_conditions = chronic_conditions;
        patient.touch();

        let body = serde_json::to_value(&patient)
            .map_err(|e| ServiceError::internal(e.to_string()))?;
        self.store
            .replace(EntityKind::Patient, id, body, entity.version)
            .await?;
        Ok(patient)
    }
}

fn apply_details(patient: &mut Patient, details: PatientDetails) {
    if details.birth_date.is_some() {
        patient.birth_date = details.birth_date;
    }
    if let Some(gender) = details.gender {
        patient.gender = gender;
    }
    if details.phone.is_some() {
        patient.phone = details.phone;
    }
    if details.email.is_some() {
        patient.email = details.email;
    }
    if details.address.is_some() {
        patient.address = details.address;
    }
}
