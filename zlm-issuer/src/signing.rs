//! Ed25519 keys for signing license entries.

use ed25519_dalek::{
    Signature as DalekSignature, Signer as _, SigningKey as DalekSigningKey,
    VerifyingKey as DalekVerifyingKey,
};
use rand::rngs::OsRng;

use crate::IssueError;

/// Ed25519 signing key (secret). Held by the vendor only.
pub struct SigningKey(DalekSigningKey);

/// Ed25519 verifying key (public). Embedded in the protected application.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct VerifyingKey(DalekVerifyingKey);

/// Ed25519 signature bytes.
pub struct Signature(DalekSignature);

/// A keypair for issuing licenses.
pub struct KeyPair {
    pub signing_key: SigningKey,
    pub verifying_key: VerifyingKey,
}

impl KeyPair {
    /// Generates a new random Ed25519 keypair.
    pub fn generate() -> Self {
        let signing = DalekSigningKey::generate(&mut OsRng);
        let verifying = signing.verifying_key();
        Self {
            signing_key: SigningKey(signing),
            verifying_key: VerifyingKey(verifying),
        }
    }
}

impl SigningKey {
    /// Creates a signing key from a raw 32-byte secret.
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self(DalekSigningKey::from_bytes(bytes))
    }

    /// Parses a hex-encoded 32-byte secret, as written by `zlm keygen`.
    pub fn from_hex(s: &str) -> Result<Self, IssueError> {
        Ok(Self::from_bytes(&decode_hex_32(s)?))
    }

    /// Returns the raw 32-byte secret key.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Returns the secret key as lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }

    /// Signs a message and returns the signature.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.0.sign(message))
    }

    /// Returns the corresponding verifying key.
    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey(self.0.verifying_key())
    }
}

impl VerifyingKey {
    /// Creates a verifying key from a raw 32-byte public key.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, IssueError> {
        DalekVerifyingKey::from_bytes(bytes)
            .map(Self)
            .map_err(|_| IssueError::InvalidPublicKey)
    }

    /// Parses a hex-encoded 32-byte public key.
    pub fn from_hex(s: &str) -> Result<Self, IssueError> {
        Self::from_bytes(&decode_hex_32(s)?)
    }

    /// Returns the raw 32-byte public key, the form `EngineConfig` trusts.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Returns the public key as lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }
}

impl Signature {
    /// Returns the raw 64-byte signature.
    pub fn to_bytes(&self) -> [u8; 64] {
        self.0.to_bytes()
    }
}

fn decode_hex_32(s: &str) -> Result<[u8; 32], IssueError> {
    let bytes = hex::decode(s.trim()).map_err(|e| IssueError::InvalidKeyEncoding(e.to_string()))?;
    bytes.try_into().map_err(|v: Vec<u8>| {
        IssueError::InvalidKeyEncoding(format!("expected 32 bytes, got {}", v.len()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signatures_are_deterministic_per_key() {
        let kp1 = KeyPair::generate();
        let kp2 = KeyPair::generate();
        let a = kp1.signing_key.sign(b"payload").to_bytes();
        let b = kp1.signing_key.sign(b"payload").to_bytes();
        let c = kp2.signing_key.sign(b"payload").to_bytes();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn verifying_key_derived_from_secret() {
        let kp = KeyPair::generate();
        let restored = SigningKey::from_bytes(&kp.signing_key.to_bytes());
        assert!(restored.verifying_key() == kp.verifying_key);
    }

    #[test]
    fn hex_roundtrip() {
        let kp = KeyPair::generate();
        let sk = SigningKey::from_hex(&kp.signing_key.to_hex()).unwrap();
        let vk = VerifyingKey::from_hex(&format!("{}\n", kp.verifying_key.to_hex())).unwrap();
        assert!(vk == kp.verifying_key);
        assert!(sk.verifying_key() == vk);
    }

    #[test]
    fn short_hex_rejected() {
        let err = SigningKey::from_hex("abcd").err().unwrap();
        assert!(matches!(err, IssueError::InvalidKeyEncoding(_)));
        assert!(SigningKey::from_hex("not hex").is_err());
    }
}
