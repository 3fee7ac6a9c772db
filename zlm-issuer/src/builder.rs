//! Building and signing license entries.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::NaiveDate;
use zlm_license::{Expiry, FINGERPRINT, FORMAT_VERSION, HostIdentity, LicensePayload, NEVER};

use crate::IssueError;
use crate::signing::SigningKey;

/// Fluent builder for one license entry.
///
/// Entries start unconstrained and perpetual: no product, no version, no
/// host binding, expiry `never`.
#[derive(Debug, Clone)]
pub struct LicenseBuilder {
    payload: LicensePayload,
}

impl LicenseBuilder {
    pub fn new() -> Self {
        Self {
            payload: LicensePayload {
                v: FORMAT_VERSION,
                product: String::new(),
                version: String::new(),
                customer: String::new(),
                expiry: NEVER.to_string(),
                hostid: Default::default(),
                userdata: String::new(),
            },
        }
    }

    pub fn product(mut self, product: impl Into<String>) -> Self {
        self.payload.product = product.into();
        self
    }

    /// Licensed version; a prefix such as `1` covers every `1.x` release.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.payload.version = version.into();
        self
    }

    pub fn customer(mut self, customer: impl Into<String>) -> Self {
        self.payload.customer = customer.into();
        self
    }

    /// Expiry as `YYYY-MM-DD` or `never`; checked when signing.
    pub fn expiry(mut self, expiry: impl Into<String>) -> Self {
        self.payload.expiry = expiry.into();
        self
    }

    /// Expiry as a date; the entry is valid through the end of that day.
    pub fn expires_on(mut self, date: NaiveDate) -> Self {
        self.payload.expiry = Expiry::On(date).to_string();
        self
    }

    pub fn userdata(mut self, userdata: impl Into<String>) -> Self {
        self.payload.userdata = userdata.into();
        self
    }

    /// Binds the entry to one host attribute value. Binding several
    /// attributes makes the entry valid on a host matching any of them.
    pub fn bind(mut self, attribute: impl Into<String>, value: impl Into<String>) -> Self {
        self.payload.hostid.insert(attribute.into(), value.into());
        self
    }

    /// Binds the entry to the fingerprint of `host`.
    pub fn bind_host(self, host: &HostIdentity) -> Self {
        let fingerprint = host.fingerprint().to_string();
        self.bind(FINGERPRINT, fingerprint)
    }

    /// Returns the payload as it will be signed.
    pub fn payload(&self) -> &LicensePayload {
        &self.payload
    }

    /// Signs the entry, returning `base64url(payload).base64url(signature)`.
    pub fn sign(&self, key: &SigningKey) -> Result<String, IssueError> {
        Expiry::parse(&self.payload.expiry)
            .map_err(|_| IssueError::InvalidExpiry(self.payload.expiry.clone()))?;

        let payload_json = serde_json::to_vec(&self.payload)?;
        let payload_b64 = URL_SAFE_NO_PAD.encode(payload_json);
        let signature = key.sign(payload_b64.as_bytes());
        let sig_b64 = URL_SAFE_NO_PAD.encode(signature.to_bytes());
        Ok(format!("{payload_b64}.{sig_b64}"))
    }
}

impl Default for LicenseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Joins signed entries into bundle text, one entry per line.
pub fn bundle<I, S>(entries: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut text = String::new();
    for entry in entries {
        text.push_str(entry.as_ref());
        text.push('\n');
    }
    text
}
