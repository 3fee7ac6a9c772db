//! Probes over the record's own consistency.

use crate::entry::{ParsedEntry, product_matches, version_matches};
use crate::host::HostIdentity;
use crate::integrity::constant_time_eq;
use crate::record::{
    License, RecordState, seal_bundle, seal_fields, seal_keys, seal_probe_config, seal_str,
};

/// Clock may lag the validation time by this much before it counts as set back.
const CLOCK_TOLERANCE_SECS: i64 = 24 * 60 * 60;

pub(super) fn canary(license: &License) -> bool {
    license.canary[0] != !license.canary[1]
}

pub(super) fn lifecycle(license: &License) -> bool {
    let in_bounds = |cursor: Option<usize>| cursor.is_some_and(|i| i < license.entries.len());
    match license.state {
        RecordState::Unvalidated => license.cursor.is_some(),
        RecordState::Validated => {
            !in_bounds(license.cursor) || license.query.is_none() || license.validated_on.is_none()
        }
        RecordState::Exhausted => !in_bounds(license.cursor),
    }
}

pub(super) fn field_seal(license: &License) -> bool {
    !constant_time_eq(&seal_fields(&license.fields), &license.seals.fields)
}

pub(super) fn entry_seal(license: &License) -> bool {
    match license.cursor.and_then(|i| license.entries.get(i)) {
        Some(raw) => !constant_time_eq(&seal_str(raw), &license.seals.entry),
        None => false,
    }
}

pub(super) fn bundle_seal(license: &License) -> bool {
    license.entries.len() != license.seals.entry_count
        || !constant_time_eq(&seal_bundle(&license.entries), &license.seals.bundle)
}

pub(super) fn signature(license: &License) -> bool {
    match current_entry(license) {
        Some(Ok(entry)) => entry.verify(&license.config.verifying_keys()).is_err(),
        Some(Err(())) => true,
        None => false,
    }
}

pub(super) fn host_binding(license: &License) -> bool {
    match current_entry(license) {
        Some(Ok(entry)) => {
            let binding = &entry.payload().hostid;
            !binding.is_empty()
                && !HostIdentity::current().is_ok_and(|host| host.matches_binding(binding))
        }
        Some(Err(())) => true,
        None => false,
    }
}

pub(super) fn query_binding(license: &License) -> bool {
    let Some(query) = &license.query else {
        return false;
    };
    match current_entry(license) {
        Some(Ok(entry)) => {
            let payload = entry.payload();
            !product_matches(&payload.product, &query.product)
                || !version_matches(&payload.version, &query.version)
        }
        Some(Err(())) => true,
        None => false,
    }
}

pub(super) fn expiry_days(license: &License) -> bool {
    let Some(validated_on) = license.validated_on else {
        return false;
    };
    match current_entry(license) {
        Some(Ok(entry)) => {
            entry.expiry().days_from(validated_on) != license.fields.expiry_days
                || entry.expiry().to_string() != license.fields.expiry
        }
        Some(Err(())) => true,
        None => false,
    }
}

pub(super) fn clock_rollback(license: &License) -> bool {
    license.state == RecordState::Validated
        && chrono::Utc::now().timestamp() < license.validated_at - CLOCK_TOLERANCE_SECS
}

/// A validated entry must have been current on its validation day. Lapsing
/// afterwards is ordinary expiry, reported by the next `validate`.
pub(super) fn expiry_lapse(license: &License) -> bool {
    let Some(validated_on) = license.validated_on else {
        return false;
    };
    match current_entry(license) {
        Some(Ok(entry)) => entry.expiry().is_past(validated_on),
        Some(Err(())) => true,
        None => false,
    }
}

pub(super) fn trusted_keys(license: &License) -> bool {
    !constant_time_eq(&seal_keys(&license.config), &license.key_seal)
}

pub(super) fn probe_config(license: &License) -> bool {
    !constant_time_eq(&seal_probe_config(&license.config), &license.probe_seal)
}

/// Re-parses the entry a validated record points at.
fn current_entry(license: &License) -> Option<Result<ParsedEntry, ()>> {
    if license.state != RecordState::Validated {
        return None;
    }
    let raw = license.cursor.and_then(|i| license.entries.get(i))?;
    Some(ParsedEntry::parse(raw).map_err(|_| ()))
}
