use std::fs;

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use zlm_cli::{
    CheckReport, CheckRequest, check, engine_config, generate_keypair, load_signing_key,
    parse_binding, public_key_path,
};
use zlm_issuer::{LicenseBuilder, VerifyingKey, bundle};
use zlm_license::{EngineConfig, ErrorKind};

fn request(license: String, all: bool) -> CheckRequest {
    CheckRequest {
        product: "My Product".to_string(),
        version: "1.0".to_string(),
        license,
        all,
        ..Default::default()
    }
}

#[test]
fn keygen_writes_both_halves() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vendor.key");

    let public = generate_keypair(&path).unwrap();
    let written = fs::read_to_string(public_key_path(&path)).unwrap();
    assert_eq!(written.trim(), public.to_hex());

    let secret = load_signing_key(&path).unwrap();
    assert!(secret.verifying_key() == public);
}

#[test]
fn keygen_refuses_to_overwrite() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vendor.key");
    generate_keypair(&path).unwrap();
    let before = fs::read_to_string(&path).unwrap();

    assert!(generate_keypair(&path).is_err());
    assert_eq!(fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn check_reports_every_entry_with_all() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vendor.key");
    let public = generate_keypair(&path).unwrap();
    let key = load_signing_key(&path).unwrap();

    let entries: Vec<String> = ["Acme", "Beta"]
        .iter()
        .map(|customer| {
            LicenseBuilder::new()
                .product("My Product")
                .version("1")
                .customer(*customer)
                .expiry("2099-01-01")
                .sign(&key)
                .unwrap()
        })
        .collect();
    let config = EngineConfig::isolated(public.to_bytes());

    let first = check(config.clone(), &request(bundle(&entries), false)).unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].customer, "Acme");

    let all = check(config, &request(bundle(&entries), true)).unwrap();
    let customers: Vec<&str> = all.iter().map(|r| r.customer.as_str()).collect();
    assert_eq!(customers, vec!["Acme", "Beta"]);
    assert_eq!(all[1].version, "1");
}

#[test]
fn check_propagates_validation_errors() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vendor.key");
    let public = generate_keypair(&path).unwrap();
    let key = load_signing_key(&path).unwrap();
    let entry = LicenseBuilder::new()
        .product("My Product")
        .version("2.0")
        .sign(&key)
        .unwrap();

    let config = EngineConfig::isolated(public.to_bytes());
    let err = check(config, &request(entry, false)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::VersionMismatch);
}

#[test]
fn report_serializes_to_json() {
    let report = CheckReport {
        product: "My Product".into(),
        version: "1.0".into(),
        customer: "Acme".into(),
        expiry: "never".into(),
        expiry_days: i64::MAX,
        userdata: String::new(),
    };
    let json = serde_json::to_string(&report).unwrap();
    let back: CheckReport = serde_json::from_str(&json).unwrap();
    assert_eq!(back, report);
}

#[test]
fn extra_trusted_keys_are_added() {
    let hex = zlm_issuer::KeyPair::generate().verifying_key.to_hex();
    let config = engine_config(&[hex.clone()]).unwrap();
    let key = VerifyingKey::from_hex(&hex).unwrap();
    assert!(config.trusted_keys.contains(&key.to_bytes()));
    assert_eq!(config.trusted_keys.len(), EngineConfig::default().trusted_keys.len() + 1);

    assert!(engine_config(&["zz".to_string()]).is_err());
}

#[test]
fn bindings_need_attribute_and_value() {
    assert_eq!(
        parse_binding("hostname=build-01").unwrap(),
        ("hostname".to_string(), "build-01".to_string())
    );
    assert!(parse_binding("hostname").is_err());
    assert!(parse_binding("=x").is_err());
    assert!(parse_binding("mac=").is_err());
}
