//! Host identity for license binding.
//!
//! Collects stable hardware and OS attributes of this machine. Licenses bind
//! to one or more of these attributes; the serialized form is what a customer
//! sends to the vendor when requesting a host-locked license.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::env;
use std::sync::OnceLock;

use crate::error::{LicenseError, LicenseResult};

/// Attribute holding the derived fingerprint.
pub const FINGERPRINT: &str = "fingerprint";

/// Attributes that count as stable enough to anchor a binding.
const STABLE_ATTRIBUTES: [&str; 3] = ["machine_id", "mac", "hostname"];

static SYSTEM_ATTRIBUTES: OnceLock<BTreeMap<String, Vec<String>>> = OnceLock::new();

/// Identity of the current host: attribute name to one or more values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostIdentity {
    attributes: BTreeMap<String, Vec<String>>,
}

impl HostIdentity {
    /// Returns the identity of the machine this process runs on.
    ///
    /// Raw attributes are read once per process; the host does not change
    /// underneath a running program.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::HostIdentityUnavailable`] if no stable
    /// attribute can be read.
    pub fn current() -> LicenseResult<Self> {
        let attributes = SYSTEM_ATTRIBUTES.get_or_init(collect_attributes);
        Self::from_attributes(attributes.clone())
    }

    /// Builds an identity from raw attributes and derives its fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::HostIdentityUnavailable`] if none of the
    /// stable attributes has a value.
    pub fn from_attributes(mut attributes: BTreeMap<String, Vec<String>>) -> LicenseResult<Self> {
        attributes.retain(|_, values| {
            values.retain(|v| !v.is_empty());
            !values.is_empty()
        });

        let stable: Vec<String> = STABLE_ATTRIBUTES
            .iter()
            .filter_map(|name| attributes.get(*name).map(|v| format!("{name}={}", v.join(","))))
            .collect();
        if stable.is_empty() {
            return Err(LicenseError::HostIdentityUnavailable(
                "no machine id, network address or hostname readable".to_string(),
            ));
        }

        let mut hasher = Sha256::new();
        hasher.update(stable.join("|").as_bytes());
        let hash = hasher.finalize();
        attributes.insert(FINGERPRINT.to_string(), vec![BASE64.encode(&hash[..16])]);

        Ok(Self { attributes })
    }

    /// Returns the derived fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        self.attributes
            .get(FINGERPRINT)
            .and_then(|v| v.first())
            .map_or("", String::as_str)
    }

    /// Returns the values of one attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> &[String] {
        self.attributes.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns all attributes.
    #[must_use]
    pub fn attributes(&self) -> &BTreeMap<String, Vec<String>> {
        &self.attributes
    }

    /// Checks a license binding against this host.
    ///
    /// An empty binding authorizes every host. Otherwise at least one bound
    /// attribute value must be among this host's values for that attribute.
    #[must_use]
    pub fn matches_binding(&self, binding: &BTreeMap<String, String>) -> bool {
        binding.is_empty()
            || binding
                .iter()
                .any(|(name, value)| self.attribute(name).iter().any(|v| v == value))
    }

    /// Serializes the identity as a JSON object with sorted keys.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::HostIdentityUnavailable`] if serialization fails.
    pub fn to_json(&self) -> LicenseResult<String> {
        serde_json::to_string(self)
            .map_err(|e| LicenseError::HostIdentityUnavailable(format!("serialization failed: {e}")))
    }
}

/// Computes the current host identity as JSON.
///
/// # Errors
///
/// Returns [`LicenseError::HostIdentityUnavailable`] if no stable attribute
/// can be read.
pub fn host_identity_json() -> LicenseResult<String> {
    HostIdentity::current()?.to_json()
}

/// Reads the raw attributes of this machine.
fn collect_attributes() -> BTreeMap<String, Vec<String>> {
    let mut attributes = BTreeMap::new();

    attributes.insert("os".to_string(), vec![env::consts::OS.to_string()]);
    attributes.insert("arch".to_string(), vec![env::consts::ARCH.to_string()]);

    if let Some(hostname) = get_hostname() {
        attributes.insert("hostname".to_string(), vec![hostname]);
    }
    if let Some(machine_id) = get_machine_id() {
        attributes.insert("machine_id".to_string(), vec![machine_id]);
    }

    let macs = get_mac_addresses();
    if !macs.is_empty() {
        attributes.insert("mac".to_string(), macs);
    }

    attributes
}

/// Gets the machine hostname.
fn get_hostname() -> Option<String> {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
}

/// Gets the machine ID (platform-specific unique identifier).
fn get_machine_id() -> Option<String> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("ioreg")
            .args(["-rd1", "-c", "IOPlatformExpertDevice"])
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .and_then(|output| {
                output
                    .lines()
                    .find(|l| l.contains("IOPlatformUUID"))
                    .and_then(|l| l.split('"').nth(3))
                    .map(String::from)
            })
    }

    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/etc/machine-id")
            .or_else(|_| std::fs::read_to_string("/var/lib/dbus/machine-id"))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

/// Gets the hardware addresses of physical network interfaces, sorted.
fn get_mac_addresses() -> Vec<String> {
    #[cfg(target_os = "linux")]
    {
        let mut macs: Vec<String> = std::fs::read_dir("/sys/class/net")
            .into_iter()
            .flatten()
            .flatten()
            .filter(|entry| entry.file_name() != "lo")
            .filter_map(|entry| std::fs::read_to_string(entry.path().join("address")).ok())
            .map(|addr| addr.trim().to_lowercase())
            .filter(|addr| is_usable_mac(addr))
            .collect();
        macs.sort();
        macs.dedup();
        macs
    }

    #[cfg(not(target_os = "linux"))]
    {
        Vec::new()
    }
}

fn is_usable_mac(addr: &str) -> bool {
    addr.len() == 17 && addr.chars().any(|c| c != '0' && c != ':')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_mac_rejected() {
        assert!(!is_usable_mac("00:00:00:00:00:00"));
        assert!(is_usable_mac("02:42:ac:11:00:02"));
        assert!(!is_usable_mac(""));
    }

    #[test]
    fn collected_attributes_include_platform() {
        let attributes = collect_attributes();
        assert_eq!(attributes["os"], vec![env::consts::OS.to_string()]);
        assert_eq!(attributes["arch"], vec![env::consts::ARCH.to_string()]);
    }
}
