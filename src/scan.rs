//! Scan pipeline: numeric decode, signature check, decompression.
//!
//! Every step runs to completion before an outcome exists, and every failure
//! becomes a [`VerificationOutcome::Failed`] rather than an error.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{FailureReason, ScanError};
use crate::inflate::decompress;
use crate::jws::verify;
use crate::key_store::KeyStore;
use crate::numeric::decode;

/// Result of verifying one scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerificationOutcome {
    Verified {
        payload_text: String,
    },
    Failed {
        reason: FailureReason,
        message: String,
    },
}

impl VerificationOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, VerificationOutcome::Verified { .. })
    }

    pub fn payload_text(&self) -> Option<&str> {
        match self {
            VerificationOutcome::Verified { payload_text } => Some(payload_text),
            VerificationOutcome::Failed { .. } => None,
        }
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            VerificationOutcome::Verified { .. } => None,
            VerificationOutcome::Failed { reason, .. } => Some(*reason),
        }
    }

    /// The single line shown to the user for this scan.
    pub fn user_message(&self) -> String {
        match self {
            VerificationOutcome::Verified { .. } => "Health card verified".to_string(),
            VerificationOutcome::Failed { reason, .. } => {
                format!("Scan failed: {}", reason)
            }
        }
    }
}

impl From<ScanError> for VerificationOutcome {
    fn from(err: ScanError) -> Self {
        VerificationOutcome::Failed {
            reason: err.reason(),
            message: err.to_string(),
        }
    }
}

/// Run the full pipeline on one scanned string.
///
/// The key set is snapshotted once, before verification starts.
pub fn process_scan(scanned: &str, key_store: &KeyStore) -> VerificationOutcome {
    match run_pipeline(scanned, key_store) {
        Ok(payload_text) => {
            tracing::debug!(bytes = payload_text.len(), "scan verified");
            VerificationOutcome::Verified { payload_text }
        }
        Err(err) => {
            tracing::debug!(reason = %err.reason(), error = %err, "scan rejected");
            err.into()
        }
    }
}

fn run_pipeline(scanned: &str, key_store: &KeyStore) -> Result<String, ScanError> {
    let token = decode(scanned)?;
    let keys = key_store.current();
    let compressed = verify(&token, &keys)?;
    decompress(&compressed)
}

/// A barcode read event as delivered by the scanning collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Barcode {
    /// Symbology label, e.g. `qr`.
    pub format: String,
    pub data: String,
}

impl Barcode {
    pub fn qr(data: impl Into<String>) -> Self {
        Self {
            format: "qr".to_string(),
            data: data.into(),
        }
    }
}

/// The outcome of a scan together with the barcode metadata for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    pub format: String,
    pub outcome: VerificationOutcome,
}

/// Identifies one scan; later tickets supersede earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScanTicket(u64);

/// Processes scans against a shared key store, surfacing only the newest.
pub struct Scanner {
    key_store: Arc<KeyStore>,
    latest: AtomicU64,
}

impl Scanner {
    pub fn new(key_store: Arc<KeyStore>) -> Self {
        Self {
            key_store,
            latest: AtomicU64::new(0),
        }
    }

    /// Register a new scan, superseding any still in flight.
    pub fn begin(&self) -> ScanTicket {
        ScanTicket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Whether `ticket` is still the most recent scan.
    pub fn is_current(&self, ticket: ScanTicket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }

    /// Process `barcode` under `ticket`.
    ///
    /// Returns `None` if a newer scan began while this one was running.
    pub fn process(&self, ticket: ScanTicket, barcode: &Barcode) -> Option<ScanReport> {
        let outcome = process_scan(&barcode.data, &self.key_store);

        if !self.is_current(ticket) {
            tracing::debug!(ticket = ticket.0, "scan superseded, dropping outcome");
            return None;
        }

        Some(ScanReport {
            format: barcode.format.clone(),
            outcome,
        })
    }

    /// Begin and process a scan in one call.
    pub fn handle(&self, barcode: &Barcode) -> Option<ScanReport> {
        let ticket = self.begin();
        self.process(ticket, barcode)
    }
}
