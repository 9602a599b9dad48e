//! Patient resource mapper.
//!
//! Supported fields: internal id (as an `identifier` under the
//! `urn:clinidoc:patient-id` system), name, birthDate, gender, telecom
//! (phone and email), address text. The medical background (allergies,
//! medications, chronic conditions) and record timestamps are not part of
//! the FHIR Patient exchange and are intentionally unsupported here.

use clinidoc_core::{Gender, Patient};
use serde::{Deserialize, Serialize};

use crate::datatypes::{Address, ContactPoint, HumanName, Identifier, ResourceMeta};
use crate::error::{MappingError, Result};
use crate::systems;

/// FHIR R4 Patient resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FhirPatient {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    pub id: String,
    #[serde(default)]
    pub meta: ResourceMeta,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub identifier: Vec<Identifier>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub name: Vec<HumanName>,
    #[serde(rename = "birthDate", skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub telecom: Vec<ContactPoint>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub address: Vec<Address>,
}

/// Map an internal patient to a fresh FHIR Patient resource.
pub fn to_fhir(patient: &Patient) -> FhirPatient {
    let mut telecom = Vec::new();
    if let Some(phone) = &patient.phone {
        telecom.push(ContactPoint::phone(phone));
    }
    if let Some(email) = &patient.email {
        telecom.push(ContactPoint::email(email));
    }

    FhirPatient {
        resource_type: "Patient".into(),
        id: patient.id.clone(),
        meta: ResourceMeta::new().with_version_id("1"),
        identifier: vec![Identifier::new(systems::PATIENT_ID, &patient.id)],
        name: vec![HumanName::official(&patient.family_name, &patient.given_name)],
        birth_date: patient.birth_date.clone(),
        gender: Some(patient.gender.as_fhir_code().into()),
        telecom,
        address: patient
            .address
            .iter()
            .map(|a| Address::text_only(a.clone()))
            .collect(),
    }
}

/// Map a FHIR Patient back to the internal model.
///
/// The internal id is recovered from the `urn:clinidoc:patient-id`
/// identifier, falling back to the resource id. Name is required.
pub fn from_fhir(resource: &FhirPatient) -> Result<Patient> {
    if resource.resource_type != "Patient" {
        return Err(MappingError::unsupported_resource_type(
            &resource.resource_type,
        ));
    }
    let id = resource
        .identifier
        .iter()
        .find(|i| i.system == systems::PATIENT_ID)
        .map(|i| i.value.clone())
        .unwrap_or_else(|| resource.id.clone());
    if id.is_empty() {
        return Err(MappingError::missing_field("Patient", "id"));
    }

    let name = resource
        .name
        .first()
        .ok_or_else(|| MappingError::missing_field("Patient", "name"))?;
    let family = name
        .family
        .clone()
        .ok_or_else(|| MappingError::missing_field("Patient", "name.family"))?;
    let given = name
        .given
        .first()
        .cloned()
        .ok_or_else(|| MappingError::missing_field("Patient", "name.given"))?;

    let gender = match &resource.gender {
        Some(code) => code
            .parse::<Gender>()
            .map_err(|_| MappingError::invalid_value(format!("unknown gender code: {code}")))?,
        None => Gender::Unknown,
    };

    let mut patient = Patient::new(id, given, family).with_gender(gender);
    if let Some(birth_date) = &resource.birth_date {
        patient = patient.with_birth_date(birth_date);
    }
    for contact in &resource.telecom {
        match contact.system.as_str() {
            "phone" => patient.phone = Some(contact.value.clone()),
            "email" => patient.email = Some(contact.value.clone()),
            _ => {}
        }
    }
    if let Some(address) = resource.address.first() {
        patient.address = Some(address.text.clone());
    }
    Ok(patient)
}
