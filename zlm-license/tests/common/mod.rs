//! Shared test helpers for license tests.

#![allow(dead_code)]

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use ed25519_dalek::{Signer, SigningKey};
use serde_json::{Value, json};
use zlm_license::EngineConfig;

pub const FAR_FUTURE: &str = "2099-01-01";
pub const LONG_AGO: &str = "2000-01-01";

/// Returns a deterministic Ed25519 key pair from a fixed seed.
pub fn test_keypair() -> (SigningKey, [u8; 32]) {
    let seed: [u8; 32] = [
        1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24,
        25, 26, 27, 28, 29, 30, 31, 32,
    ];
    let signing_key = SigningKey::from_bytes(&seed);
    let verifying_key = signing_key.verifying_key();
    (signing_key, verifying_key.to_bytes())
}

/// A second, untrusted key pair.
pub fn other_keypair() -> (SigningKey, [u8; 32]) {
    let signing_key = SigningKey::from_bytes(&[9u8; 32]);
    let verifying_key = signing_key.verifying_key();
    (signing_key, verifying_key.to_bytes())
}

/// Configuration trusting only the test key, with no ambient lookup.
pub fn test_config() -> EngineConfig {
    let (_, pk) = test_keypair();
    EngineConfig::isolated(pk)
}

/// Creates a signed entry: `base64url(payload_json).base64url(signature)`.
/// Signs over the base64url-encoded payload bytes.
pub fn sign_entry(signing_key: &SigningKey, payload: &Value) -> String {
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
    let signature = signing_key.sign(payload_b64.as_bytes());
    let sig_b64 = URL_SAFE_NO_PAD.encode(signature.to_bytes());
    format!("{payload_b64}.{sig_b64}")
}

/// Creates a signed, host-unbound entry with the given fields.
pub fn make_entry(product: &str, version: &str, customer: &str, expiry: &str) -> String {
    let (sk, _) = test_keypair();
    sign_entry(
        &sk,
        &json!({
            "v": 1,
            "product": product,
            "version": version,
            "customer": customer,
            "expiry": expiry,
        }),
    )
}

/// Creates a signed entry bound to the given host attributes.
pub fn make_bound_entry(product: &str, binding: Value) -> String {
    let (sk, _) = test_keypair();
    sign_entry(
        &sk,
        &json!({
            "product": product,
            "customer": "Acme",
            "expiry": FAR_FUTURE,
            "hostid": binding,
        }),
    )
}
