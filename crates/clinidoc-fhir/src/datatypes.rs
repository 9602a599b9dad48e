//! FHIR R4 datatypes shared by the resource mappers.
//!
//! Only the elements the mappers populate are modeled; everything else is
//! out of scope at this boundary.

use clinidoc_core::{now_utc, FhirDateTime};
use serde::{Deserialize, Serialize};

/// A coded value from a terminology system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coding {
    pub system: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Coding {
    pub fn new(system: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            code: code.into(),
            display: None,
        }
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }
}

/// A concept that may be coded in one or more systems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CodeableConcept {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub coding: Vec<Coding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl CodeableConcept {
    pub fn from_coding(coding: Coding) -> Self {
        Self {
            coding: vec![coding],
            text: None,
        }
    }

    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            coding: Vec::new(),
            text: Some(text.into()),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// The first coding from the given system, if any.
    pub fn coding_in(&self, system: &str) -> Option<&Coding> {
        self.coding.iter().find(|c| c.system == system)
    }

    /// The first code regardless of system.
    pub fn first_code(&self) -> Option<&str> {
        self.coding.first().map(|c| c.code.as_str())
    }
}

/// A reference to another resource, e.g. `Patient/pat-1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Reference {
    pub fn new(resource_type: &str, id: &str) -> Self {
        Self {
            reference: format!("{resource_type}/{id}"),
            display: None,
        }
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    /// The id part of a `Type/id` reference, when the type matches.
    pub fn id_for(&self, resource_type: &str) -> Option<&str> {
        self.reference
            .strip_prefix(resource_type)
            .and_then(|rest| rest.strip_prefix('/'))
    }
}

/// A business identifier within a named system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identifier {
    pub system: String,
    pub value: String,
}

impl Identifier {
    pub fn new(system: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            value: value.into(),
        }
    }
}

/// A human name, family + given parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HumanName {
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub use_: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub given: Vec<String>,
}

impl HumanName {
    pub fn official(family: impl Into<String>, given: impl Into<String>) -> Self {
        Self {
            use_: Some("official".into()),
            family: Some(family.into()),
            given: vec![given.into()],
        }
    }
}

/// A phone number or email address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactPoint {
    pub system: String,
    pub value: String,
}

impl ContactPoint {
    pub fn phone(value: impl Into<String>) -> Self {
        Self {
            system: "phone".into(),
            value: value.into(),
        }
    }

    pub fn email(value: impl Into<String>) -> Self {
        Self {
            system: "email".into(),
            value: value.into(),
        }
    }
}

/// A postal address, carried as text only at this boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub text: String,
}

impl Address {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A time period with optional open ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Period {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<FhirDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<FhirDateTime>,
}

/// A measured amount with a UCUM unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    pub unit: String,
    pub system: String,
    pub code: String,
}

impl Quantity {
    pub fn ucum(value: f64, code: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: unit.into(),
            system: crate::systems::UCUM.into(),
            code: code.into(),
        }
    }
}

/// Resource metadata, produced fresh on every mapping call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    pub last_updated: FhirDateTime,
}

impl ResourceMeta {
    pub fn new() -> Self {
        Self {
            version_id: None,
            last_updated: now_utc(),
        }
    }

    pub fn with_version_id(mut self, version_id: impl Into<String>) -> Self {
        self.version_id = Some(version_id.into());
        self
    }
}

impl Default for ResourceMeta {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coding_serialization() {
        let coding = Coding::new(crate::systems::LOINC, "8867-4").with_display("Heart rate");
        let json = serde_json::to_value(&coding).unwrap();
        assert_eq!(json["system"], "http://loinc.org");
        assert_eq!(json["code"], "8867-4");
        assert_eq!(json["display"], "Heart rate");
    }

    #[test]
    fn test_codeable_concept_lookup() {
        let concept = CodeableConcept::from_coding(Coding::new(crate::systems::SNOMED, "10509002"))
            .with_text("Acute bronchitis");
        assert_eq!(concept.first_code(), Some("10509002"));
        assert!(concept.coding_in(crate::systems::SNOMED).is_some());
        assert!(concept.coding_in(crate::systems::LOINC).is_none());
    }

    #[test]
    fn test_reference_id_extraction() {
        let reference = Reference::new("Patient", "pat-1");
        assert_eq!(reference.reference, "Patient/pat-1");
        assert_eq!(reference.id_for("Patient"), Some("pat-1"));
        assert_eq!(reference.id_for("Encounter"), None);
    }

    #[test]
    fn test_human_name_use_rename() {
        let name = HumanName::official("Lovelace", "Ada");
        let json = serde_json::to_value(&name).unwrap();
        assert_eq!(json["use"], "official");
        assert_eq!(json["family"], "Lovelace");
        assert_eq!(json["given"], json!(["Ada"]));
    }

    #[test]
    fn test_quantity_ucum() {
        let qty = Quantity::ucum(36.8, "Cel", "°C");
        assert_eq!(qty.system, crate::systems::UCUM);
        assert_eq!(qty.code, "Cel");
    }

    #[test]
    fn test_meta_camel_case() {
        let meta = ResourceMeta::new().with_version_id("3");
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["versionId"], "3");
        assert!(json["lastUpdated"].is_string());
    }
}
