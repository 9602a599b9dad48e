//! FHIR Bundle types, the response-bundle builders, and the side-effect
//! free structural validator used as a pre-flight check.

use clinidoc_core::generate_id;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// The nine FHIR-defined bundle types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BundleType {
    Document,
    Message,
    Transaction,
    TransactionResponse,
    Batch,
    BatchResponse,
    History,
    Searchset,
    Collection,
}

impl BundleType {
    pub const ALL: [BundleType; 9] = [
        BundleType::Document,
        BundleType::Message,
        BundleType::Transaction,
        BundleType::TransactionResponse,
        BundleType::Batch,
        BundleType::BatchResponse,
        BundleType::History,
        BundleType::Searchset,
        BundleType::Collection,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Message => "message",
            Self::Transaction => "transaction",
            Self::TransactionResponse => "transaction-response",
            Self::Batch => "batch",
            Self::BatchResponse => "batch-response",
            Self::History => "history",
            Self::Searchset => "searchset",
            Self::Collection => "collection",
        }
    }
}

impl fmt::Display for BundleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BundleType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or(())
    }
}

/// What a bundle entry asks the server to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleRequest {
    pub method: String,
    pub url: String,
}

/// Per-entry outcome in a response bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<OperationOutcome>,
}

/// One entry of a bundle: a resource, a request, or (in responses) an
/// outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BundleEntry {
    #[serde(rename = "fullUrl", skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<BundleRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<BundleResponse>,
}

impl BundleEntry {
    /// A successful response entry.
    pub fn success(status: impl Into<String>, location: Option<String>) -> Self {
        Self {
            response: Some(BundleResponse {
                status: status.into(),
                location,
                outcome: None,
            }),
            ..Self::default()
        }
    }

    /// A failed response entry carrying an OperationOutcome.
    pub fn failure(status: impl Into<String>, outcome: OperationOutcome) -> Self {
        Self {
            response: Some(BundleResponse {
                status: status.into(),
                location: None,
                outcome: Some(outcome),
            }),
            ..Self::default()
        }
    }
}

/// A FHIR Bundle. The `type` field is kept as a raw string so that an
/// unknown type can be rejected with a domain error instead of a
/// deserialization failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FhirBundle {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub bundle_type: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub entry: Vec<BundleEntry>,
}

impl FhirBundle {
    pub fn new(bundle_type: BundleType) -> Self {
        Self {
            resource_type: "Bundle".into(),
            id: Some(generate_id()),
            bundle_type: bundle_type.as_str().into(),
            entry: Vec::new(),
        }
    }

    pub fn with_entries(mut self, entries: Vec<BundleEntry>) -> Self {
        self.entry = entries;
        self
    }

    /// The parsed bundle type, if it is one of the nine FHIR values.
    pub fn parsed_type(&self) -> Option<BundleType> {
        self.bundle_type.parse().ok()
    }
}

/// Minimal FHIR OperationOutcome for per-entry and bundle-level errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationOutcome {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    pub issue: Vec<OperationOutcomeIssue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationOutcomeIssue {
    /// fatal | error | warning | information
    pub severity: String,
    /// FHIR issue type code (subset used): invalid | not-found | conflict |
    /// not-supported | timeout | exception
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
}

impl OperationOutcome {
    pub fn single(severity: &str, code: &str, diagnostics: impl Into<String>) -> Self {
        Self {
            resource_type: "OperationOutcome".into(),
            issue: vec![OperationOutcomeIssue {
                severity: severity.into(),
                code: code.into(),
                diagnostics: Some(diagnostics.into()),
            }],
        }
    }

    pub fn error(code: &str, diagnostics: impl Into<String>) -> Self {
        Self::single("error", code, diagnostics)
    }
}

/// Result of the structural pre-flight check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleValidation {
    pub valid: bool,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
}

/// Side-effect-free structural validation: bundle type is one of the nine
/// FHIR values, every entry carries a resource or a request, and every
/// resource names its resourceType. Usable independently of processing.
pub fn validate_bundle(bundle: &FhirBundle) -> BundleValidation {
    let mut issues = Vec::new();
    let mut warnings = Vec::new();

    if bundle.resource_type != "Bundle" {
        issues.push(format!(
            "resourceType must be 'Bundle', got '{}'",
            bundle.resource_type
        ));
    }
    if bundle.parsed_type().is_none() {
        issues.push(format!("unknown bundle type '{}'", bundle.bundle_type));
    }
    if bundle.entry.is_empty() {
        warnings.push("bundle has no entries".to_string());
    }

    for (index, entry) in bundle.entry.iter().enumerate() {
        if entry.resource.is_none() && entry.request.is_none() {
            issues.push(format!(
                "entry {index} has neither a resource nor a request"
            ));
        }
        if let Some(resource) = &entry.resource {
            match resource.get("resourceType").and_then(Value::as_str) {
                Some(_) => {}
                None => issues.push(format!("entry {index} resource has no resourceType")),
            }
        }
        if entry.resource.is_some() && entry.request.is_none() {
            warnings.push(format!(
                "entry {index} has no request; a create will be assumed"
            ));
        }
    }

    BundleValidation {
        valid: issues.is_empty(),
        issues,
        warnings,
    }
}
