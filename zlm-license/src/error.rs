//! Error types for the validation engine.

use thiserror::Error;

/// Failures reported by license operations.
///
/// Every variant carries its own message; nothing is written to shared state.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// No license string was supplied and no license file could be discovered.
    #[error("license not found: {0}")]
    NotFound(String),

    /// The license text could not be parsed into an entry.
    #[error("malformed license: {0}")]
    MalformedLicense(String),

    /// The entry signature does not verify against any trusted key.
    #[error("signature invalid")]
    InvalidSignature,

    /// The entry is bound to a different machine.
    #[error("host mismatch: license is not valid for this machine")]
    HostMismatch,

    /// The entry grants a different product.
    #[error("product mismatch: license is for '{licensed}', requested '{requested}'")]
    ProductMismatch { licensed: String, requested: String },

    /// The entry grants a different version.
    #[error("version mismatch: license is for version '{licensed}', requested '{requested}'")]
    VersionMismatch { licensed: String, requested: String },

    /// The entry expired before today.
    #[error("license expired on {0}")]
    Expired(String),

    /// The chain has no further valid entry.
    #[error("no more license entries")]
    NoMoreEntries,

    /// No stable host attribute could be read.
    #[error("host identity unavailable: {0}")]
    HostIdentityUnavailable(String),

    /// Input exceeded a configured limit.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
}

/// Discriminant of a [`LicenseError`], for matching without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    MalformedLicense,
    InvalidSignature,
    HostMismatch,
    ProductMismatch,
    VersionMismatch,
    Expired,
    NoMoreEntries,
    HostIdentityUnavailable,
    ResourceExhausted,
}

impl LicenseError {
    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::MalformedLicense(_) => ErrorKind::MalformedLicense,
            Self::InvalidSignature => ErrorKind::InvalidSignature,
            Self::HostMismatch => ErrorKind::HostMismatch,
            Self::ProductMismatch { .. } => ErrorKind::ProductMismatch,
            Self::VersionMismatch { .. } => ErrorKind::VersionMismatch,
            Self::Expired(_) => ErrorKind::Expired,
            Self::NoMoreEntries => ErrorKind::NoMoreEntries,
            Self::HostIdentityUnavailable(_) => ErrorKind::HostIdentityUnavailable,
            Self::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
        }
    }
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
