//! The license record handed to the calling application.

use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::{BuildHasher, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::config::{EngineConfig, TamperResponse};
use crate::entry::ParsedEntry;
use crate::escape::unescape;

/// Lifecycle of a [`License`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordState {
    /// Created, or the last validation did not succeed.
    Unvalidated,
    /// Holds a valid entry.
    Validated,
    /// The chain walked past its last valid entry.
    Exhausted,
}

/// Values exposed through the accessors.
#[derive(Debug, Default, Clone, PartialEq, Eq, Zeroize)]
pub(crate) struct Fields {
    pub(crate) product: String,
    pub(crate) version: String,
    pub(crate) customer: String,
    pub(crate) expiry: String,
    pub(crate) expiry_days: i64,
    pub(crate) userdata: String,
    pub(crate) userdata_unescaped: String,
}

impl Fields {
    pub(crate) fn from_entry(entry: &ParsedEntry, today: NaiveDate) -> Self {
        let payload = entry.payload();
        Self {
            product: payload.product.clone(),
            version: payload.version.clone(),
            customer: payload.customer.clone(),
            expiry: entry.expiry().to_string(),
            expiry_days: entry.expiry().days_from(today),
            userdata: payload.userdata.clone(),
            userdata_unescaped: unescape(&payload.userdata),
        }
    }
}

/// Product and version a record was validated for; reused by `advance`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Query {
    pub(crate) product: String,
    pub(crate) version: String,
}

/// SHA-256 seals over record contents, checked by integrity probes.
#[derive(Debug, Clone)]
pub(crate) struct Seals {
    pub(crate) fields: [u8; 32],
    pub(crate) entry: [u8; 32],
    pub(crate) bundle: [u8; 32],
    pub(crate) entry_count: usize,
}

impl Seals {
    fn empty() -> Self {
        Self {
            fields: seal_fields(&Fields::default()),
            entry: [0u8; 32],
            bundle: seal_bundle(&[]),
            entry_count: 0,
        }
    }
}

/// One license record.
///
/// Created empty, bound to license data by [`validate`](License::validate),
/// moved along a bundle by [`advance`](License::advance). All accessors
/// return empty values until a validation succeeds. Sensitive contents are
/// zeroized when the record is dropped.
pub struct License {
    pub(crate) config: EngineConfig,
    pub(crate) state: RecordState,
    pub(crate) fields: Fields,
    pub(crate) query: Option<Query>,
    pub(crate) entries: Vec<String>,
    pub(crate) cursor: Option<usize>,
    pub(crate) validated_on: Option<NaiveDate>,
    pub(crate) validated_at: i64,
    pub(crate) seals: Seals,
    pub(crate) key_seal: [u8; 32],
    pub(crate) probe_seal: [u8; 32],
    pub(crate) canary: [u64; 2],
    pub(crate) tainted: AtomicBool,
}

impl License {
    /// Creates an empty record using the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates an empty record using `config`.
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        let canary = RandomState::new().build_hasher().finish();
        let key_seal = seal_keys(&config);
        let probe_seal = seal_probe_config(&config);
        Self {
            config,
            state: RecordState::Unvalidated,
            fields: Fields::default(),
            query: None,
            entries: Vec::new(),
            cursor: None,
            validated_on: None,
            validated_at: 0,
            seals: Seals::empty(),
            key_seal,
            probe_seal,
            canary: [canary, !canary],
            tainted: AtomicBool::new(false),
        }
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> RecordState {
        self.state
    }

    /// Returns the configuration this record was created with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Licensed product.
    #[must_use]
    pub fn product(&self) -> &str {
        self.read(|f| &f.product)
    }

    /// Licensed version.
    #[must_use]
    pub fn version(&self) -> &str {
        self.read(|f| &f.version)
    }

    /// Licensee.
    #[must_use]
    pub fn customer(&self) -> &str {
        self.read(|f| &f.customer)
    }

    /// Expiry date as `YYYY-MM-DD`, or `never`.
    #[must_use]
    pub fn expiry(&self) -> &str {
        self.read(|f| &f.expiry)
    }

    /// Days until expiry; negative once expired, `i64::MAX` for perpetual
    /// licenses, zero before validation.
    #[must_use]
    pub fn expiry_days(&self) -> i64 {
        if self.is_tainted() {
            0
        } else {
            self.fields.expiry_days
        }
    }

    /// Vendor data as stored in the license.
    #[must_use]
    pub fn userdata(&self) -> &str {
        self.read(|f| &f.userdata)
    }

    /// Vendor data with escape sequences decoded.
    #[must_use]
    pub fn userdata_unescaped(&self) -> &str {
        self.read(|f| &f.userdata_unescaped)
    }

    /// Releases the record explicitly.
    pub fn close(self) {}

    fn read<'a>(&'a self, field: impl FnOnce(&'a Fields) -> &'a String) -> &'a str {
        if self.is_tainted() {
            ""
        } else {
            field(&self.fields)
        }
    }

    pub(crate) fn is_tainted(&self) -> bool {
        self.tainted.load(Ordering::Relaxed)
    }

    /// Reacts to a tripped probe according to the configured response.
    pub(crate) fn trip(&self) {
        match self.config.tamper_response {
            TamperResponse::Poison => self.tainted.store(true, Ordering::Relaxed),
            TamperResponse::Abort => std::process::abort(),
        }
    }

    /// Moves the record onto entry `index` of the current bundle.
    pub(crate) fn bind(&mut self, index: usize, entry: &ParsedEntry, today: NaiveDate) {
        self.fields = Fields::from_entry(entry, today);
        self.cursor = Some(index);
        self.state = RecordState::Validated;
        self.validated_on = Some(today);
        self.validated_at = chrono::Utc::now().timestamp();
        self.seals.fields = seal_fields(&self.fields);
        self.seals.entry = seal_str(&self.entries[index]);
    }

    /// Replaces the bundle the record walks.
    pub(crate) fn load_bundle(&mut self, entries: Vec<String>, query: Query) {
        self.entries.zeroize();
        self.seals.bundle = seal_bundle(&entries);
        self.seals.entry_count = entries.len();
        self.entries = entries;
        self.query = Some(query);
    }

    /// Shows an expired entry without validating it.
    pub(crate) fn show_expired(&mut self, entry: &ParsedEntry, today: NaiveDate) {
        self.fields = Fields::from_entry(entry, today);
        self.cursor = None;
        self.state = RecordState::Unvalidated;
        self.validated_on = None;
        self.seals.fields = seal_fields(&self.fields);
    }
}

impl Default for License {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for License {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("License")
            .field("state", &self.state)
            .field("product", &self.product())
            .field("expiry", &self.expiry())
            .field("entries", &self.entries.len())
            .field("cursor", &self.cursor)
            .field("customer", &"[REDACTED]")
            .finish()
    }
}

impl Drop for License {
    fn drop(&mut self) {
        self.fields.zeroize();
        self.entries.zeroize();
    }
}

pub(crate) fn seal_str(s: &str) -> [u8; 32] {
    Sha256::digest(s.as_bytes()).into()
}

pub(crate) fn seal_fields(fields: &Fields) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in [
        &fields.product,
        &fields.version,
        &fields.customer,
        &fields.expiry,
        &fields.userdata,
        &fields.userdata_unescaped,
    ] {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    hasher.update(fields.expiry_days.to_le_bytes());
    hasher.finalize().into()
}

pub(crate) fn seal_bundle(entries: &[String]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for entry in entries {
        hasher.update((entry.len() as u64).to_le_bytes());
        hasher.update(entry.as_bytes());
    }
    hasher.finalize().into()
}

pub(crate) fn seal_keys(config: &EngineConfig) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for key in &config.trusted_keys {
        hasher.update(key);
    }
    hasher.finalize().into()
}

pub(crate) fn seal_probe_config(config: &EngineConfig) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([
        match config.tamper_response {
            TamperResponse::Poison => 1u8,
            TamperResponse::Abort => 2u8,
        },
        u8::from(config.environment_probes),
    ]);
    if let Some(digest) = &config.expected_exe_digest {
        hasher.update(digest);
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_is_empty() {
        let license = License::new();
        assert_eq!(license.state(), RecordState::Unvalidated);
        assert_eq!(license.product(), "");
        assert_eq!(license.customer(), "");
        assert_eq!(license.expiry(), "");
        assert_eq!(license.expiry_days(), 0);
        assert_eq!(license.userdata(), "");
        assert_eq!(license.userdata_unescaped(), "");
    }

    #[test]
    fn canary_mirrors_complement() {
        let license = License::new();
        assert_eq!(license.canary[0], !license.canary[1]);
    }

    #[test]
    fn taint_blanks_accessors() {
        let mut license = License::new();
        license.fields.customer = "Acme".into();
        license.fields.expiry_days = 10;
        assert_eq!(license.customer(), "Acme");
        license.trip();
        assert_eq!(license.customer(), "");
        assert_eq!(license.expiry_days(), 0);
    }

    #[test]
    fn field_seal_depends_on_every_field() {
        let base = Fields::default();
        let mut changed = base.clone();
        changed.expiry_days = 1;
        assert_ne!(seal_fields(&base), seal_fields(&changed));
    }

    #[test]
    fn debug_redacts_customer() {
        let mut license = License::new();
        license.fields.customer = "Secret Corp".into();
        assert!(!format!("{license:?}").contains("Secret Corp"));
    }
}
