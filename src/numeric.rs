//! SHC numeric QR encoding.
//!
//! A health card QR code carries its JWS in numeric mode: every character of
//! the compact token becomes two decimal digits holding `code_point - 45`.

use crate::error::{Result, ScanError};

/// Prefix every scanned health card starts with.
pub const SHC_PREFIX: &str = "shc:/";

const OFFSET: u32 = 45;
const MAX_CODE_POINT: u32 = b'~' as u32;

/// Compact JWS string recovered from a scan: `header.payload.signature`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedToken(String);

impl EncodedToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for EncodedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decode a scanned `shc:/...` string into its compact JWS.
pub fn decode(scanned: &str) -> Result<EncodedToken> {
    let digits = scanned.strip_prefix(SHC_PREFIX).ok_or_else(|| {
        ScanError::MalformedInput(format!("Expected prefix '{}'", SHC_PREFIX))
    })?;

    if digits.is_empty() {
        return Err(ScanError::MalformedInput(
            "No digits after prefix".to_string(),
        ));
    }

    if let Some(pos) = digits.find(|c: char| !c.is_ascii_digit()) {
        return Err(ScanError::MalformedInput(format!(
            "Non-digit character at offset {}",
            SHC_PREFIX.len() + pos
        )));
    }

    if digits.len() % 2 != 0 {
        return Err(ScanError::MalformedInput(format!(
            "Odd number of digits ({})",
            digits.len()
        )));
    }

    let token = digits
        .as_bytes()
        .chunks_exact(2)
        .map(|pair| {
            let code = u32::from(pair[0] - b'0') * 10 + u32::from(pair[1] - b'0') + OFFSET;
            if code > MAX_CODE_POINT {
                return Err(ScanError::MalformedInput(format!(
                    "Digit pair {}{} is outside printable ASCII",
                    pair[0] as char, pair[1] as char
                )));
            }
            // code is within 45..=126
            Ok(char::from(code as u8))
        })
        .collect::<Result<String>>()?;

    Ok(EncodedToken(token))
}

/// Encode a compact JWS into the `shc:/` numeric form.
pub fn encode(token: &str) -> Result<String> {
    let mut out = String::with_capacity(SHC_PREFIX.len() + token.len() * 2);
    out.push_str(SHC_PREFIX);

    for c in token.chars() {
        let code = c as u32;
        if !(OFFSET..=MAX_CODE_POINT).contains(&code) {
            return Err(ScanError::MalformedInput(format!(
                "Character {:?} cannot be numerically encoded",
                c
            )));
        }
        out.push_str(&format!("{:02}", code - OFFSET));
    }

    Ok(out)
}
