//! Error types for the issuer crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IssueError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid expiry: {0}")]
    InvalidExpiry(String),

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid key encoding: {0}")]
    InvalidKeyEncoding(String),
}
