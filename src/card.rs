//! Read-only view over a verified health card payload.

use serde::Deserialize;
use serde_json::Value;

/// Summary fields of a SMART Health Card JWS payload.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthCard {
    pub issuer: String,
    /// Issuance time in seconds since the epoch.
    pub not_before: Option<f64>,
    pub types: Vec<String>,
    pub fhir_version: Option<String>,
    pub entry_count: usize,
}

#[derive(Deserialize)]
struct Payload {
    iss: String,
    #[serde(default)]
    nbf: Option<f64>,
    #[serde(default)]
    vc: Option<Credential>,
}

#[derive(Deserialize)]
struct Credential {
    #[serde(default, rename = "type")]
    types: Vec<String>,
    #[serde(default, rename = "credentialSubject")]
    subject: Option<Subject>,
}

#[derive(Deserialize)]
struct Subject {
    #[serde(default, rename = "fhirVersion")]
    fhir_version: Option<String>,
    #[serde(default, rename = "fhirBundle")]
    bundle: Option<Value>,
}

impl HealthCard {
    pub fn from_payload(text: &str) -> serde_json::Result<Self> {
        let payload: Payload = serde_json::from_str(text)?;
        let credential = payload.vc;
        let subject = credential.as_ref().and_then(|vc| vc.subject.as_ref());

        let entry_count = subject
            .and_then(|s| s.bundle.as_ref())
            .and_then(|b| b.get("entry"))
            .and_then(Value::as_array)
            .map_or(0, Vec::len);

        Ok(Self {
            issuer: payload.iss,
            not_before: payload.nbf,
            fhir_version: subject.and_then(|s| s.fhir_version.clone()),
            types: credential.map(|vc| vc.types).unwrap_or_default(),
            entry_count,
        })
    }

    pub fn is_health_card(&self) -> bool {
        self.types
            .iter()
            .any(|t| t == "https://smarthealth.cards#health-card")
    }
}
