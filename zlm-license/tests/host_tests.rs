mod common;

use std::collections::BTreeMap;

use common::{make_bound_entry, test_config};
use serde_json::json;
use zlm_license::{ErrorKind, FINGERPRINT, HostIdentity, License, host_identity_json};

fn attributes(pairs: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
    pairs
        .iter()
        .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
        .collect()
}

// ── Identity ─────────────────────────────────────────────────────

#[test]
fn current_host_has_fingerprint() {
    let host = HostIdentity::current().unwrap();
    assert!(!host.fingerprint().is_empty());
    assert_eq!(host.attribute(FINGERPRINT), [host.fingerprint().to_string()]);
}

#[test]
fn identity_json_is_stable() {
    let first = host_identity_json().unwrap();
    let second = host_identity_json().unwrap();
    assert_eq!(first, second);

    let parsed: serde_json::Value = serde_json::from_str(&first).unwrap();
    assert!(parsed.get(FINGERPRINT).is_some());
}

#[test]
fn fingerprint_depends_on_stable_attributes() {
    let a = HostIdentity::from_attributes(attributes(&[("hostname", &["alpha"])])).unwrap();
    let b = HostIdentity::from_attributes(attributes(&[("hostname", &["beta"])])).unwrap();
    let a_again = HostIdentity::from_attributes(attributes(&[
        ("hostname", &["alpha"]),
        ("os", &["linux"]),
    ]))
    .unwrap();

    assert_ne!(a.fingerprint(), b.fingerprint());
    assert_eq!(a.fingerprint(), a_again.fingerprint());
}

#[test]
fn identity_without_stable_attribute_is_unavailable() {
    let err = HostIdentity::from_attributes(attributes(&[("os", &["linux"])])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HostIdentityUnavailable);
}

#[test]
fn binding_matches_any_listed_value() {
    let host = HostIdentity::from_attributes(attributes(&[
        ("hostname", &["build-01"]),
        ("mac", &["aa:bb:cc:dd:ee:ff", "11:22:33:44:55:66"]),
    ]))
    .unwrap();

    let by_mac = BTreeMap::from([("mac".to_string(), "11:22:33:44:55:66".to_string())]);
    let wrong = BTreeMap::from([("hostname".to_string(), "build-02".to_string())]);
    let mixed = BTreeMap::from([
        ("hostname".to_string(), "build-02".to_string()),
        ("mac".to_string(), "aa:bb:cc:dd:ee:ff".to_string()),
    ]);

    assert!(host.matches_binding(&by_mac));
    assert!(!host.matches_binding(&wrong));
    assert!(host.matches_binding(&mixed));
    assert!(host.matches_binding(&BTreeMap::new()));
}

// ── Binding during validation ────────────────────────────────────

#[test]
fn license_bound_to_this_host_validates() {
    let host = HostIdentity::current().unwrap();
    let key = make_bound_entry("My Product", json!({ FINGERPRINT: host.fingerprint() }));
    let mut license = License::with_config(test_config());
    license.validate("My Product", "1.0", "", "", &key).unwrap();
    assert_eq!(license.customer(), "Acme");
}

#[test]
fn license_bound_elsewhere_is_host_mismatch() {
    let key = make_bound_entry("My Product", json!({ FINGERPRINT: "not-this-host" }));
    let mut license = License::with_config(test_config());
    let err = license.validate("My Product", "1.0", "", "", &key).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HostMismatch);
    assert_eq!(license.customer(), "");
}

#[test]
fn host_mismatch_checked_before_product() {
    let key = make_bound_entry("Other Product", json!({ "hostname": "not-this-host" }));
    let mut license = License::with_config(test_config());
    let err = license.validate("My Product", "1.0", "", "", &key).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HostMismatch);
}
