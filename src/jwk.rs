//! JSON Web Key Set model for health card issuer keys.

use std::collections::HashSet;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::KeySetError;

/// One public verification key as published in an issuer's JWKS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
}

impl Jwk {
    /// RFC 7638 thumbprint of an EC key: base64url SHA-256 over the
    /// canonical `{"crv","kty","x","y"}` member set.
    ///
    /// Returns `None` when a required member is missing.
    pub fn thumbprint(&self) -> Option<String> {
        let crv = self.crv.as_deref()?;
        let x = self.x.as_deref()?;
        let y = self.y.as_deref()?;

        // Members in lexicographic order, no whitespace.
        let canonical = serde_json::json!({
            "crv": crv,
            "kty": self.kty,
            "x": x,
            "y": y,
        })
        .to_string();

        Some(URL_SAFE_NO_PAD.encode(Sha256::digest(canonical.as_bytes())))
    }
}

/// An ordered set of verification keys, unique by `kid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySet {
    keys: Vec<Jwk>,
}

impl KeySet {
    /// Build a key set, rejecting an empty list or repeated key ids.
    pub fn new(keys: Vec<Jwk>) -> Result<Self, KeySetError> {
        if keys.is_empty() {
            return Err(KeySetError::Empty);
        }

        let mut seen = HashSet::new();
        for kid in keys.iter().filter_map(|k| k.kid.as_deref()) {
            if !seen.insert(kid) {
                return Err(KeySetError::DuplicateKid(kid.to_string()));
            }
        }

        Ok(Self { keys })
    }

    /// Parse a `{ "keys": [...] }` document.
    pub fn from_json(json: &str) -> Result<Self, KeySetError> {
        #[derive(Deserialize)]
        struct Document {
            keys: Vec<Jwk>,
        }

        let doc: Document = serde_json::from_str(json)?;
        Self::new(doc.keys)
    }

    /// Look up a key by id. Keys published without a `kid` never match.
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid.as_deref() == Some(kid))
    }

    pub fn keys(&self) -> &[Jwk] {
        &self.keys
    }

    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FALLBACK: &str = include_str!("../keys/fallback_jwks.json");

    #[test]
    fn parse_embedded_fallback() {
        let keys = KeySet::from_json(FALLBACK).unwrap();
        assert_eq!(keys.len(), 1);

        let key = &keys.keys()[0];
        assert_eq!(key.kty, "EC");
        assert_eq!(key.crv.as_deref(), Some("P-256"));
        assert_eq!(key.alg.as_deref(), Some("ES256"));
        assert_eq!(key.key_use.as_deref(), Some("sig"));
    }

    #[test]
    fn embedded_kid_is_thumbprint() {
        let keys = KeySet::from_json(FALLBACK).unwrap();
        let key = &keys.keys()[0];
        assert_eq!(key.thumbprint().as_deref(), key.kid.as_deref());
    }

    #[test]
    fn find_by_kid() {
        let json = r#"{"keys":[
            {"kty":"EC","crv":"P-256","kid":"a","x":"xa","y":"ya","alg":"ES256"},
            {"kty":"EC","crv":"P-256","kid":"b","x":"xb","y":"yb","alg":"ES256"}
        ]}"#;
        let keys = KeySet::from_json(json).unwrap();

        assert_eq!(keys.find("b").and_then(|k| k.x.as_deref()), Some("xb"));
        assert!(keys.find("c").is_none());
    }

    #[test]
    fn key_without_kid_never_matches() {
        let json = r#"{"keys":[{"kty":"EC","crv":"P-256","x":"x","y":"y","alg":"ES256"}]}"#;
        let keys = KeySet::from_json(json).unwrap();
        assert!(keys.find("").is_none());
    }

    #[test]
    fn ignores_unknown_members() {
        let json = r#"{"keys":[{"kty":"EC","kid":"a","x5c":["MIIB"],"crv":"P-256","x":"x","y":"y","alg":"ES256"}]}"#;
        assert!(KeySet::from_json(json).is_ok());
    }

    #[test]
    fn reject_empty_key_list() {
        let result = KeySet::from_json(r#"{"keys":[]}"#);
        assert!(matches!(result, Err(KeySetError::Empty)));
    }

    #[test]
    fn reject_duplicate_kid() {
        let json = r#"{"keys":[
            {"kty":"EC","kid":"a","x":"1","y":"1"},
            {"kty":"EC","kid":"a","x":"2","y":"2"}
        ]}"#;
        let result = KeySet::from_json(json);
        assert!(matches!(result, Err(KeySetError::DuplicateKid(kid)) if kid == "a"));
    }

    #[test]
    fn reject_invalid_json() {
        assert!(matches!(
            KeySet::from_json("not json"),
            Err(KeySetError::Json(_))
        ));
        assert!(matches!(
            KeySet::from_json(r#"{"items":[]}"#),
            Err(KeySetError::Json(_))
        ));
    }

    #[test]
    fn thumbprint_requires_coordinates() {
        let key = Jwk {
            kty: "EC".to_string(),
            key_use: None,
            crv: Some("P-256".to_string()),
            kid: Some("k".to_string()),
            x: None,
            y: Some("y".to_string()),
            alg: None,
        };
        assert!(key.thumbprint().is_none());
    }
}
