//! Signing helpers for unit tests.
//!
//! Keys are derived from fixed scalars so that the demo issuer matches the
//! key bundled in `keys/fallback_jwks.json`.

use std::io::Write;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use flate2::{write::DeflateEncoder, Compression};
use p256::ecdsa::{signature::Signer, Signature, SigningKey};

use crate::jwk::Jwk;
use crate::numeric::{self, EncodedToken};

const DEMO_ISSUER_SCALAR: [u8; 32] = [
    0x3f, 0x1c, 0x2a, 0x9b, 0x7e, 0x5d, 0x4c, 0x6a, 0x8b, 0x0e, 0x1f, 0x2d, 0x3c, 0x4b, 0x5a, 0x69,
    0x78, 0x87, 0x96, 0xa5, 0xb4, 0xc3, 0xd2, 0xe1, 0xf0, 0x0f, 0x1e, 0x2d, 0x3c, 0x4b, 0x5a, 0x69,
];

const OTHER_ISSUER_SCALAR: [u8; 32] = [
    0x5a, 0x7e, 0x0c, 0x3b, 0x9d, 0x1f, 0x2e, 0x4a, 0x6c, 0x8b, 0x0d, 0x2f, 0x4e, 0x6a, 0x8c, 0x0b,
    0x1d, 0x3f, 0x5e, 0x7a, 0x9c, 0x0b, 0x2d, 0x4f, 0x6e, 0x8a, 0x0c, 0x1b, 0x3d, 0x5f, 0x7e, 0x9a,
];

pub struct TestIssuer {
    signing_key: SigningKey,
}

impl TestIssuer {
    fn from_scalar(scalar: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_slice(scalar).expect("valid P-256 scalar");
        Self { signing_key }
    }

    /// Public JWK with the RFC 7638 thumbprint as `kid`.
    pub fn jwk(&self) -> Jwk {
        let point = self.signing_key.verifying_key().to_encoded_point(false);
        let mut jwk = Jwk {
            kty: "EC".to_string(),
            key_use: Some("sig".to_string()),
            crv: Some("P-256".to_string()),
            kid: None,
            x: Some(URL_SAFE_NO_PAD.encode(point.x().expect("uncompressed point"))),
            y: Some(URL_SAFE_NO_PAD.encode(point.y().expect("uncompressed point"))),
            alg: Some("ES256".to_string()),
        };
        jwk.kid = jwk.thumbprint();
        jwk
    }

    pub fn kid(&self) -> String {
        self.jwk().kid.expect("thumbprint")
    }
}

/// The issuer whose public key is bundled as the fallback key set.
pub fn demo_issuer() -> TestIssuer {
    TestIssuer::from_scalar(&DEMO_ISSUER_SCALAR)
}

/// An issuer that is not in the fallback key set.
pub fn other_issuer() -> TestIssuer {
    TestIssuer::from_scalar(&OTHER_ISSUER_SCALAR)
}

/// Sign `payload` as an ES256 compact JWS with `zip: DEF`.
pub fn sign_jws(issuer: &TestIssuer, payload: &[u8]) -> EncodedToken {
    let header = serde_json::json!({
        "alg": "ES256",
        "kid": issuer.kid(),
        "zip": "DEF",
    });
    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(payload)
    );

    let signature: Signature = issuer.signing_key.sign(signing_input.as_bytes());
    EncodedToken::new(format!(
        "{}.{}",
        signing_input,
        URL_SAFE_NO_PAD.encode(signature.to_bytes())
    ))
}

pub fn deflate_raw(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data).expect("write to Vec");
    encoder.finish().expect("finish deflate")
}

/// A complete `shc:/` scan carrying `json` signed by `issuer`.
pub fn issue_scan(issuer: &TestIssuer, json: &str) -> String {
    let token = sign_jws(issuer, &deflate_raw(json.as_bytes()));
    numeric::encode(token.as_str()).expect("JWS alphabet is encodable")
}
