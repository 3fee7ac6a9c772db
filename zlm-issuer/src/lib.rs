//! Vendor side of ZLM licensing.
//!
//! Generates Ed25519 issuer keys, builds and signs license entries in the
//! format `zlm-license` validates, and joins entries into bundles. The
//! public half of the issuer key is what protected applications trust via
//! `EngineConfig::trusted_keys`.

mod builder;
mod error;
mod signing;

pub use builder::{LicenseBuilder, bundle};
pub use error::IssueError;
pub use signing::{KeyPair, Signature, SigningKey, VerifyingKey};
