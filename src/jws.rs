//! Compact JWS verification for health card tokens.
//!
//! SMART Health Cards are signed with ES256 (ECDSA P-256 / SHA-256). The
//! signature covers the ASCII bytes `header.payload` exactly as they appear in
//! the token, and is carried as the 64-byte `r || s` concatenation.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use p256::ecdsa::{signature::Verifier, Signature, VerifyingKey};
use p256::{EncodedPoint, FieldBytes};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanError};
use crate::jwk::{Jwk, KeySet};
use crate::numeric::EncodedToken;

const ES256: &str = "ES256";
const COORDINATE_LEN: usize = 32;
const SIGNATURE_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwsHeader {
    pub alg: String,
    #[serde(default)]
    pub kid: Option<String>,
    /// `DEF` for health cards: the payload is raw-deflate compressed.
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub typ: Option<String>,
}

/// The three segments of a compact JWS, still base64url encoded.
#[derive(Debug, Clone, Copy)]
struct Segments<'a> {
    header: &'a str,
    payload: &'a str,
    signature: &'a str,
}

impl<'a> Segments<'a> {
    fn split(token: &'a str) -> Result<Self> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err(ScanError::MalformedInput(format!(
                "JWS must have 3 parts separated by dots, found {}",
                parts.len()
            )));
        }

        Ok(Self {
            header: parts[0],
            payload: parts[1],
            signature: parts[2],
        })
    }

    /// The signed region: both encoded segments joined by a single dot.
    fn signing_input(&self) -> String {
        format!("{}.{}", self.header, self.payload)
    }
}

/// Decode just the header of a token.
pub fn decode_header(token: &EncodedToken) -> Result<JwsHeader> {
    let segments = Segments::split(token.as_str())?;
    parse_header(segments.header)
}

fn parse_header(encoded: &str) -> Result<JwsHeader> {
    let bytes = URL_SAFE_NO_PAD.decode(encoded).map_err(|e| {
        ScanError::MalformedInput(format!("Failed to decode JWS header: {}", e))
    })?;

    serde_json::from_slice(&bytes)
        .map_err(|e| ScanError::MalformedInput(format!("Failed to parse JWS header: {}", e)))
}

/// Verify `token` against the key its header names and return the decoded,
/// still-compressed payload bytes.
///
/// The key is selected strictly by the header's `kid`; no other key in the
/// set is tried.
pub fn verify(token: &EncodedToken, keys: &KeySet) -> Result<Vec<u8>> {
    let segments = Segments::split(token.as_str())?;
    let header = parse_header(segments.header)?;

    let kid = header
        .kid
        .as_deref()
        .ok_or_else(|| ScanError::UnknownKeyId("JWS header has no kid".to_string()))?;

    let jwk = keys
        .find(kid)
        .ok_or_else(|| ScanError::UnknownKeyId(kid.to_string()))?;

    tracing::debug!(kid, alg = %header.alg, "selected verification key");

    // Algorithm mismatch is reported the same way as a bad signature.
    if jwk.alg.as_deref() != Some(header.alg.as_str()) {
        return Err(ScanError::SignatureInvalid(
            "Key algorithm does not match token".to_string(),
        ));
    }
    if header.alg != ES256 {
        return Err(ScanError::SignatureInvalid(format!(
            "Unsupported algorithm {}",
            header.alg
        )));
    }

    let verifying_key = verifying_key(jwk)?;
    let signature = decode_signature(segments.signature)?;

    verifying_key
        .verify(segments.signing_input().as_bytes(), &signature)
        .map_err(|e| ScanError::SignatureInvalid(e.to_string()))?;

    URL_SAFE_NO_PAD.decode(segments.payload).map_err(|e| {
        ScanError::MalformedInput(format!("Failed to decode JWS payload: {}", e))
    })
}

/// Build a P-256 verifying key from a JWK's affine coordinates.
fn verifying_key(jwk: &Jwk) -> Result<VerifyingKey> {
    if jwk.kty != "EC" || jwk.crv.as_deref() != Some("P-256") {
        return Err(ScanError::SignatureInvalid(format!(
            "Unsupported key type {} / {}",
            jwk.kty,
            jwk.crv.as_deref().unwrap_or("none")
        )));
    }

    let x = decode_coordinate(jwk.x.as_deref(), "x")?;
    let y = decode_coordinate(jwk.y.as_deref(), "y")?;

    let point = EncodedPoint::from_affine_coordinates(
        &FieldBytes::from(x),
        &FieldBytes::from(y),
        false,
    );

    VerifyingKey::from_encoded_point(&point)
        .map_err(|e| ScanError::SignatureInvalid(format!("Invalid EC point: {}", e)))
}

fn decode_coordinate(value: Option<&str>, name: &str) -> Result<[u8; COORDINATE_LEN]> {
    let value = value.ok_or_else(|| {
        ScanError::SignatureInvalid(format!("Key is missing coordinate {}", name))
    })?;

    let bytes = URL_SAFE_NO_PAD.decode(value).map_err(|e| {
        ScanError::SignatureInvalid(format!("Coordinate {} is not base64url: {}", name, e))
    })?;

    <[u8; COORDINATE_LEN]>::try_from(bytes.as_slice()).map_err(|_| {
        ScanError::SignatureInvalid(format!(
            "Coordinate {} must be {} bytes, got {}",
            name,
            COORDINATE_LEN,
            bytes.len()
        ))
    })
}

fn decode_signature(encoded: &str) -> Result<Signature> {
    let bytes = URL_SAFE_NO_PAD.decode(encoded).map_err(|e| {
        ScanError::SignatureInvalid(format!("Signature base64 decode failed: {}", e))
    })?;

    if bytes.len() != SIGNATURE_LEN {
        return Err(ScanError::SignatureInvalid(format!(
            "Expected {} signature bytes, got {}",
            SIGNATURE_LEN,
            bytes.len()
        )));
    }

    Signature::from_slice(&bytes)
        .map_err(|e| ScanError::SignatureInvalid(format!("Invalid signature: {}", e)))
}
