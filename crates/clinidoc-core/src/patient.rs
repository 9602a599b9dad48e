use crate::error::{CoreError, Result};
use crate::time::{now_utc, FhirDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// FHIR administrative gender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
    #[default]
    Unknown,
}

impl Gender {
    /// The FHIR `Patient.gender` code.
    pub fn as_fhir_code(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_fhir_code())
    }
}

impl FromStr for Gender {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "male" => Ok(Self::Male),
            "female" => Ok(Self::Female),
            "other" => Ok(Self::Other),
            "unknown" => Ok(Self::Unknown),
            _ => Err(CoreError::validation(format!("Unknown gender code: {s}"))),
        }
    }
}

/// Medical background carried on the patient record, independent of any
/// single episode: allergies, active medications, chronic conditions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MedicalBackground {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub allergies: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub medications: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub chronic_conditions: Vec<String>,
}

impl MedicalBackground {
    pub fn is_empty(&self) -> bool {
        self.allergies.is_empty()
            && self.medications.is_empty()
            && self.chronic_conditions.is_empty()
    }
}

/// A patient record.
///
/// `id` and `created_at` are identity fields and never change after
/// construction; demographics and medical background are mutable and stamp
/// `updated_at` through [`Patient::touch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: String,
    pub given_name: String,
    pub family_name: String,
    /// Date of birth at FHIR `date` precision (`YYYY-MM-DD`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(default)]
    pub gender: Gender,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default)]
    pub medical_background: MedicalBackground,
    pub created_at: FhirDateTime,
    pub updated_at: FhirDateTime,
}

impl Patient {
    pub fn new(
        id: impl Into<String>,
        given_name: impl Into<String>,
        family_name: impl Into<String>,
    ) -> Self {
        let now = now_utc();
        Self {
            id: id.into(),
            given_name: given_name.into(),
            family_name: family_name.into(),
            birth_date: None,
            gender: Gender::default(),
            phone: None,
            email: None,
            address: None,
            medical_background: MedicalBackground::default(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn with_birth_date(mut self, birth_date: impl Into<String>) -> Self {
        self.birth_date = Some(birth_date.into());
        self
    }

    pub fn with_gender(mut self, gender: Gender) -> Self {
        self.gender = gender;
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.given_name, self.family_name)
    }

    /// Stamp `updated_at` after a demographic or background mutation.
    pub fn touch(&mut self) {
        self.updated_at = now_utc();
    }

    /// Field-level constraints checked before persisting.
    pub fn validate(&self) -> Result<()> {
        if self.given_name.trim().is_empty() || self.family_name.trim().is_empty() {
            return Err(CoreError::validation("patient name must not be empty"));
        }
        if let Some(bd) = &self.birth_date {
            let format = time::macros::format_description!("[year]-[month]-[day]");
            time::Date::parse(bd, &format).map_err(|_| {
                CoreError::validation(format!("birth_date must be YYYY-MM-DD, got '{bd}'"))
            })?;
        }
        Ok(())
    }
}
