//! Helpers for building signed health card scans.
#![allow(dead_code)]

use std::io::Write;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use flate2::{write::DeflateEncoder, Compression};
use p256::ecdsa::{signature::Signer, Signature, SigningKey};
use shc_verifier::{encode, Jwk, KeySet};

pub struct Issuer {
    key: SigningKey,
    kid: String,
}

impl Issuer {
    pub fn from_scalar(scalar: &[u8]) -> Self {
        let key = SigningKey::from_slice(scalar).expect("valid P-256 scalar");
        let mut issuer = Self {
            key,
            kid: String::new(),
        };
        issuer.kid = issuer.public_jwk(None).thumbprint().expect("EC thumbprint");
        issuer
    }

    pub fn with_seed(seed: u8) -> Self {
        Self::from_scalar(&[seed; 32])
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn jwk(&self) -> Jwk {
        self.public_jwk(Some(self.kid.clone()))
    }

    fn public_jwk(&self, kid: Option<String>) -> Jwk {
        let point = self.key.verifying_key().to_encoded_point(false);
        Jwk {
            kty: "EC".to_string(),
            key_use: Some("sig".to_string()),
            crv: Some("P-256".to_string()),
            kid,
            x: Some(URL_SAFE_NO_PAD.encode(point.x().expect("x"))),
            y: Some(URL_SAFE_NO_PAD.encode(point.y().expect("y"))),
            alg: Some("ES256".to_string()),
        }
    }

    pub fn key_set(&self) -> KeySet {
        KeySet::new(vec![self.jwk()]).expect("single key")
    }

    /// Compact JWS over raw-deflated `json`.
    pub fn sign(&self, json: &str) -> String {
        let header = format!(r#"{{"alg":"ES256","kid":"{}","zip":"DEF"}}"#, self.kid);
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(deflate_raw(json.as_bytes()))
        );
        let signature: Signature = self.key.sign(signing_input.as_bytes());
        format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature.to_bytes()))
    }

    /// Numeric `shc:/` scan of a card carrying `json`.
    pub fn scan(&self, json: &str) -> String {
        encode(&self.sign(json)).expect("JWS alphabet is encodable")
    }
}

pub fn deflate_raw(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("write to Vec");
    encoder.finish().expect("finish deflate")
}
