//! Local license validation for ZLM-protected applications.
//!
//! This crate handles:
//! - Parsing and Ed25519 verification of license entries
//! - Discovery of license files next to the executable and along a search path
//! - Host binding against stable machine attributes
//! - Product, version and expiry enforcement
//! - Walking multi-entry license bundles
//! - Integrity probes that silently poison a record when tampering is detected
//!
//! # Design Principles
//!
//! - **Offline**: validation never touches the network
//! - **Per-call errors**: every failure is a returned value, no shared buffers
//! - **Exclusive ownership**: a [`License`] is owned by its caller and
//!   zeroizes its contents when dropped
//!
//! # License Format
//!
//! Entries are formatted as `base64url(payload).base64url(signature)`; a
//! bundle holds several entries separated by commas or whitespace. See
//! [`LicensePayload`] for the payload fields.
//!
//! ```no_run
//! use zlm_license::License;
//!
//! let mut license = License::new();
//! let argv0 = std::env::args().next().unwrap_or_default();
//! match license.validate("My Product", "1.0", &argv0, ".", "") {
//!     Ok(()) => println!("licensed to {}", license.customer()),
//!     Err(e) => eprintln!("{e}"),
//! }
//! ```

mod bundle;
mod chain;
mod config;
mod entry;
mod error;
mod escape;
mod host;
mod integrity;
mod record;
mod verify;

pub use bundle::split_entries;
pub use config::{
    DEFAULT_LICENSE_ENV, DEFAULT_MAX_ENTRIES, DEFAULT_MAX_LICENSE_BYTES, EngineConfig,
    LICENSE_EXTENSION, TamperResponse,
};
pub use entry::{
    Expiry, FORMAT_VERSION, LicensePayload, NEVER, NEVER_EXPIRES_DAYS, ParsedEntry,
    product_matches, version_matches,
};
pub use error::{ErrorKind, LicenseError, LicenseResult};
pub use escape::unescape;
pub use host::{FINGERPRINT, HostIdentity, host_identity_json};
pub use integrity::Probe;
pub use record::{License, RecordState};

/// Version of this engine.
#[must_use]
pub fn engine_version() -> &'static str {
    concat!("zlm ", env!("CARGO_PKG_VERSION"))
}
