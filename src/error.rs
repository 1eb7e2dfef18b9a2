//! Error types for the SMART Health Card verifier.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A failure in one step of the scan pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Unknown key id: {0}")]
    UnknownKeyId(String),

    #[error("Signature verification failed: {0}")]
    SignatureInvalid(String),

    #[error("Failed to decompress payload: {0}")]
    Decompression(String),
}

impl ScanError {
    /// The reason code reported in a failed outcome.
    pub fn reason(&self) -> FailureReason {
        match self {
            ScanError::MalformedInput(_) => FailureReason::MalformedInput,
            ScanError::UnknownKeyId(_) => FailureReason::UnknownKeyId,
            ScanError::SignatureInvalid(_) => FailureReason::SignatureInvalid,
            ScanError::Decompression(_) => FailureReason::DecompressionError,
        }
    }
}

/// Stable reason codes for a failed scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    MalformedInput,
    UnknownKeyId,
    SignatureInvalid,
    DecompressionError,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::MalformedInput => "malformed-input",
            FailureReason::UnknownKeyId => "unknown-key-id",
            FailureReason::SignatureInvalid => "signature-invalid",
            FailureReason::DecompressionError => "decompression-error",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Problems with a JSON Web Key Set document.
#[derive(Error, Debug)]
pub enum KeySetError {
    #[error("Failed to parse key set JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Key set contains no keys")]
    Empty,

    #[error("Duplicate key id in key set: {0}")]
    DuplicateKid(String),
}

/// A failed key-set refresh. Never surfaced as a scan failure.
#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("Failed to fetch key set: {0}")]
    Network(String),

    #[error("Key set endpoint returned HTTP {0}")]
    Status(u16),

    #[error(transparent)]
    KeySet(#[from] KeySetError),
}

pub type Result<T> = std::result::Result<T, ScanError>;
