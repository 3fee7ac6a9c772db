//! Shared types and helpers for the `zlm` command line.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::info;
use zlm_issuer::{KeyPair, SigningKey, VerifyingKey};
use zlm_license::{EngineConfig, License, LicenseError};

/// What `zlm check` reports for one valid entry.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CheckReport {
    pub product: String,
    pub version: String,
    pub customer: String,
    pub expiry: String,
    pub expiry_days: i64,
    pub userdata: String,
}

impl CheckReport {
    pub fn from_license(license: &License) -> Self {
        Self {
            product: license.product().to_string(),
            version: license.version().to_string(),
            customer: license.customer().to_string(),
            expiry: license.expiry().to_string(),
            expiry_days: license.expiry_days(),
            userdata: license.userdata_unescaped().to_string(),
        }
    }
}

/// Inputs of one `zlm check` run.
#[derive(Debug, Clone, Default)]
pub struct CheckRequest {
    pub product: String,
    pub version: String,
    pub argv0: String,
    pub path: String,
    pub license: String,
    pub all: bool,
}

/// Validates a request, walking the whole chain when `all` is set.
///
/// Returns one report per valid entry, first entry first.
pub fn check(
    config: EngineConfig,
    request: &CheckRequest,
) -> Result<Vec<CheckReport>, LicenseError> {
    let mut license = License::with_config(config);
    license.validate(
        &request.product,
        &request.version,
        &request.argv0,
        &request.path,
        &request.license,
    )?;

    let mut reports = vec![CheckReport::from_license(&license)];
    if request.all {
        loop {
            match license.advance() {
                Ok(()) => reports.push(CheckReport::from_license(&license)),
                Err(LicenseError::NoMoreEntries) => break,
                Err(e) => return Err(e),
            }
        }
    }
    license.close();
    Ok(reports)
}

/// Engine configuration trusting the built-in issuer plus `extra_keys`.
pub fn engine_config(extra_keys: &[String]) -> Result<EngineConfig> {
    let mut config = EngineConfig::default();
    for hex in extra_keys {
        let key = VerifyingKey::from_hex(hex)
            .with_context(|| format!("Invalid trusted key {hex:?}"))?;
        config = config.with_trusted_key(key.to_bytes());
    }
    Ok(config)
}

/// Path of the public key written next to a secret key file.
pub fn public_key_path(secret: &Path) -> PathBuf {
    let mut name = secret.as_os_str().to_owned();
    name.push(".pub");
    PathBuf::from(name)
}

/// Generates an issuer key pair, writing the secret to `path` and the public
/// key to `path.pub`, both hex encoded. Never overwrites an existing key.
pub fn generate_keypair(path: &Path) -> Result<VerifyingKey> {
    if path.exists() {
        bail!("Refusing to overwrite existing key file {:?}", path);
    }
    info!("Generating issuer key at {:?}", path);
    let keypair = KeyPair::generate();
    fs::write(path, format!("{}\n", keypair.signing_key.to_hex()))
        .context("Failed to write secret key file")?;
    fs::write(
        public_key_path(path),
        format!("{}\n", keypair.verifying_key.to_hex()),
    )
    .context("Failed to write public key file")?;
    Ok(keypair.verifying_key)
}

/// Loads a hex-encoded signing key written by [`generate_keypair`].
pub fn load_signing_key(path: &Path) -> Result<SigningKey> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read key file {:?}", path))?;
    SigningKey::from_hex(&text).context("Failed to decode signing key")
}

/// Splits a `--bind attribute=value` argument.
pub fn parse_binding(arg: &str) -> Result<(String, String)> {
    match arg.split_once('=') {
        Some((attribute, value)) if !attribute.is_empty() && !value.is_empty() => {
            Ok((attribute.to_string(), value.to_string()))
        }
        _ => bail!("Host binding must look like attribute=value, got {arg:?}"),
    }
}
