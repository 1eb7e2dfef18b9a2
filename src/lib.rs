//! SMART Health Card verifier library.
//!
//! Decodes `shc:/` numeric QR payloads, verifies their ES256 signature
//! against an issuer key set, and inflates the signed card JSON.

pub mod card;
pub mod error;
pub mod inflate;
pub mod jwk;
pub mod jws;
pub mod key_store;
pub mod numeric;
pub mod scan;

#[cfg(test)]
mod testutil;

pub use card::HealthCard;
pub use error::{FailureReason, KeySetError, RefreshError, Result, ScanError};
pub use jwk::{Jwk, KeySet};
pub use key_store::{HttpKeySetFetcher, KeySetFetcher, KeyStore, KeyStoreState};
pub use numeric::{decode, encode, EncodedToken};
pub use scan::{process_scan, Barcode, ScanReport, Scanner, VerificationOutcome};
