//! Configuration for the validation engine.

use std::path::PathBuf;

use chrono::NaiveDate;
use ed25519_dalek::VerifyingKey;
use tracing::warn;

/// Environment variable naming an extra license file.
pub const DEFAULT_LICENSE_ENV: &str = "ZLM_LICENSE_FILE";

/// File extension of discoverable license files.
pub const LICENSE_EXTENSION: &str = "lic";

/// Upper bound on the size of assembled license text (1 MiB).
pub const DEFAULT_MAX_LICENSE_BYTES: usize = 1024 * 1024;

/// Upper bound on the number of entries in one bundle.
pub const DEFAULT_MAX_ENTRIES: usize = 256;

/// Embedded Ed25519 public key of the production license issuer (32 bytes).
const ISSUER_PUBLIC_KEY: [u8; 32] = [
    57, 31, 209, 19, 193, 91, 183, 93, 60, 131, 18, 16, 41, 128, 129, 242, 1, 226, 5, 62,
    133, 223, 250, 69, 158, 124, 157, 23, 156, 104, 209, 71,
];

/// What an integrity probe does when it trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TamperResponse {
    /// Silently taint the record: accessors go empty and later validation fails.
    Poison,
    /// Abort the process immediately.
    Abort,
}

/// Engine configuration shared by a [`License`](crate::License) for its lifetime.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Ed25519 public keys whose signatures are accepted.
    pub trusted_keys: Vec<[u8; 32]>,
    /// Environment variable holding the path of an extra license file.
    pub license_env: Option<String>,
    /// Whether `<config dir>/zlm` is searched for license files.
    pub search_user_dirs: bool,
    /// Extension of license files picked up from directories.
    pub extension: String,
    /// Maximum size of the assembled license text in bytes.
    pub max_license_bytes: usize,
    /// Maximum number of entries in one bundle.
    pub max_entries: usize,
    /// Fixed "today" for expiry computations; `None` uses the UTC clock.
    pub pinned_date: Option<NaiveDate>,
    /// Reaction of integrity probes to tampering.
    pub tamper_response: TamperResponse,
    /// Whether probes that inspect the process environment run.
    pub environment_probes: bool,
    /// Expected SHA-256 digest of the running executable, if known.
    pub expected_exe_digest: Option<[u8; 32]>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trusted_keys: vec![ISSUER_PUBLIC_KEY],
            license_env: Some(DEFAULT_LICENSE_ENV.into()),
            search_user_dirs: true,
            extension: LICENSE_EXTENSION.into(),
            max_license_bytes: DEFAULT_MAX_LICENSE_BYTES,
            max_entries: DEFAULT_MAX_ENTRIES,
            pinned_date: None,
            tamper_response: TamperResponse::Poison,
            environment_probes: true,
            expected_exe_digest: None,
        }
    }
}

impl EngineConfig {
    /// Configuration that trusts only `key` and never looks outside the
    /// explicitly supplied license string or search path.
    #[must_use]
    pub fn isolated(key: [u8; 32]) -> Self {
        Self {
            trusted_keys: vec![key],
            license_env: None,
            search_user_dirs: false,
            ..Self::default()
        }
    }

    /// Adds a trusted issuer key.
    #[must_use]
    pub fn with_trusted_key(mut self, key: [u8; 32]) -> Self {
        if !self.trusted_keys.contains(&key) {
            self.trusted_keys.push(key);
        }
        self
    }

    /// Pins the date used for expiry checks.
    #[must_use]
    pub fn with_pinned_date(mut self, date: NaiveDate) -> Self {
        self.pinned_date = Some(date);
        self
    }

    /// Sets the tamper response.
    #[must_use]
    pub fn with_tamper_response(mut self, response: TamperResponse) -> Self {
        self.tamper_response = response;
        self
    }

    /// Enables or disables environment probes.
    #[must_use]
    pub fn with_environment_probes(mut self, enabled: bool) -> Self {
        self.environment_probes = enabled;
        self
    }

    /// Sets the expected executable digest checked by the binary probe.
    #[must_use]
    pub fn with_expected_exe_digest(mut self, digest: [u8; 32]) -> Self {
        self.expected_exe_digest = Some(digest);
        self
    }

    /// Returns the date expiry is measured against.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.pinned_date
            .unwrap_or_else(|| chrono::Utc::now().date_naive())
    }

    /// Returns the per-user license directory, if the platform has one.
    #[must_use]
    pub fn user_license_dir(&self) -> Option<PathBuf> {
        if !self.search_user_dirs {
            return None;
        }
        dirs::config_dir().map(|dir| dir.join("zlm"))
    }

    /// Decodes the trusted keys, dropping any that are not valid curve points.
    pub(crate) fn verifying_keys(&self) -> Vec<VerifyingKey> {
        self.trusted_keys
            .iter()
            .filter_map(|bytes| match VerifyingKey::from_bytes(bytes) {
                Ok(key) => Some(key),
                Err(_) => {
                    warn!("ignoring invalid trusted key");
                    None
                }
            })
            .collect()
    }
}
