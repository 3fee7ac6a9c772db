//! License entry parsing and Ed25519 signature verification.
//!
//! An entry has the form `base64url(payload).base64url(signature)`.
//!
//! The payload is a JSON object containing:
//! - `v`: format version (only `1` is understood)
//! - `product`, `version`: what the entry grants; empty means any
//! - `customer`: licensee name
//! - `expiry`: `YYYY-MM-DD` or `never`
//! - `hostid`: attribute bindings; empty means any host
//! - `userdata`: free-form vendor data, possibly escaped
//!
//! The signature covers `payload_b64.as_bytes()` (the encoded payload string,
//! not the decoded JSON).

use std::collections::BTreeMap;
use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::NaiveDate;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::error::{LicenseError, LicenseResult};

/// The only payload format version this engine understands.
pub const FORMAT_VERSION: u32 = 1;

/// Sentinel expiry of perpetual licenses.
pub const NEVER: &str = "never";

/// `expiry_days` reported for perpetual licenses.
pub const NEVER_EXPIRES_DAYS: i64 = i64::MAX;

/// The decoded payload of one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicensePayload {
    /// Format version.
    #[serde(default = "default_format_version")]
    pub v: u32,
    /// Licensed product; empty grants every product.
    #[serde(default)]
    pub product: String,
    /// Licensed version; empty grants every version.
    #[serde(default)]
    pub version: String,
    /// Licensee.
    #[serde(default)]
    pub customer: String,
    /// Expiry date (`YYYY-MM-DD`) or [`NEVER`].
    pub expiry: String,
    /// Host attribute bindings.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub hostid: BTreeMap<String, String>,
    /// Vendor data, raw.
    #[serde(default)]
    pub userdata: String,
}

fn default_format_version() -> u32 {
    FORMAT_VERSION
}

/// When an entry stops being valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Expiry {
    /// Perpetual.
    Never,
    /// Valid through the end of this day.
    On(NaiveDate),
}

impl Expiry {
    /// Parses `YYYY-MM-DD` or [`NEVER`].
    pub fn parse(s: &str) -> LicenseResult<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case(NEVER) {
            return Ok(Self::Never);
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Self::On)
            .map_err(|e| LicenseError::MalformedLicense(format!("invalid expiry '{s}': {e}")))
    }

    /// Days from `today` until expiry: zero on the last valid day, negative
    /// once expired, [`NEVER_EXPIRES_DAYS`] for perpetual entries.
    #[must_use]
    pub fn days_from(&self, today: NaiveDate) -> i64 {
        match self {
            Self::Never => NEVER_EXPIRES_DAYS,
            Self::On(date) => (*date - today).num_days(),
        }
    }

    /// Returns true if the expiry date lies strictly before `today`.
    #[must_use]
    pub fn is_past(&self, today: NaiveDate) -> bool {
        match self {
            Self::Never => false,
            Self::On(date) => *date < today,
        }
    }
}

impl fmt::Display for Expiry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Never => f.write_str(NEVER),
            Self::On(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

/// A structurally valid entry whose signature has not been checked yet.
#[derive(Debug, Clone)]
pub struct ParsedEntry {
    payload_b64: String,
    signature: Signature,
    payload: LicensePayload,
    expiry: Expiry,
}

impl ParsedEntry {
    /// Parses one entry.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::MalformedLicense`] if the entry is not two
    /// base64url parts, the payload is not valid JSON, required fields are
    /// missing, or the format version is unknown.
    pub fn parse(raw: &str) -> LicenseResult<Self> {
        let raw = raw.trim();

        let (payload_b64, signature_b64) = raw.split_once('.').ok_or_else(|| {
            LicenseError::MalformedLicense(
                "entry must have exactly two parts separated by a dot".to_string(),
            )
        })?;
        if signature_b64.contains('.') {
            return Err(LicenseError::MalformedLicense(
                "entry must have exactly two parts separated by a dot".to_string(),
            ));
        }

        let payload_json = URL_SAFE_NO_PAD.decode(payload_b64).map_err(|e| {
            LicenseError::MalformedLicense(format!("invalid payload base64: {e}"))
        })?;
        let payload: LicensePayload = serde_json::from_slice(&payload_json).map_err(|e| {
            LicenseError::MalformedLicense(format!("invalid payload JSON: {e}"))
        })?;
        if payload.v != FORMAT_VERSION {
            return Err(LicenseError::MalformedLicense(format!(
                "unsupported license format version {}",
                payload.v
            )));
        }
        let expiry = Expiry::parse(&payload.expiry)?;

        let sig_bytes = URL_SAFE_NO_PAD.decode(signature_b64).map_err(|e| {
            LicenseError::MalformedLicense(format!("invalid signature base64: {e}"))
        })?;
        let signature = Signature::from_slice(&sig_bytes).map_err(|_| {
            LicenseError::MalformedLicense("invalid signature length".to_string())
        })?;

        Ok(Self {
            payload_b64: payload_b64.to_string(),
            signature,
            payload,
            expiry,
        })
    }

    /// Verifies the signature against any of `keys`.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::InvalidSignature`] if no key verifies it.
    pub fn verify(&self, keys: &[VerifyingKey]) -> LicenseResult<()> {
        let message = self.payload_b64.as_bytes();
        if keys
            .iter()
            .any(|key| key.verify(message, &self.signature).is_ok())
        {
            Ok(())
        } else {
            Err(LicenseError::InvalidSignature)
        }
    }

    /// Returns the decoded payload.
    #[must_use]
    pub fn payload(&self) -> &LicensePayload {
        &self.payload
    }

    /// Returns the parsed expiry.
    #[must_use]
    pub fn expiry(&self) -> Expiry {
        self.expiry
    }
}

/// Checks a requested version against a licensed one.
///
/// Empty values and `*` are unconstrained. Otherwise the licensed version
/// must equal the requested one or be a leading run of its dot-separated
/// components.
#[must_use]
pub fn version_matches(licensed: &str, requested: &str) -> bool {
    let licensed = licensed.trim();
    let requested = requested.trim();
    if licensed.is_empty() || licensed == "*" || requested.is_empty() {
        return true;
    }
    let mut wanted = requested.split('.');
    licensed
        .split('.')
        .all(|component| wanted.next() == Some(component))
}

/// Checks a requested product against a licensed one. Empty is unconstrained.
#[must_use]
pub fn product_matches(licensed: &str, requested: &str) -> bool {
    licensed.is_empty() || requested.is_empty() || licensed == requested
}
