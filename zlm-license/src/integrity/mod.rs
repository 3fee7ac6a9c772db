//! Integrity probes.
//!
//! Each probe is an independent, cheap self-check a program can scatter
//! through its own code paths. Probes return nothing: a tripped probe never
//! reports which check failed. Depending on [`TamperResponse`] the record is
//! silently poisoned (accessors go empty, later validation fails) or the
//! process aborts.
//!
//! [`TamperResponse`]: crate::TamperResponse

mod environment;
mod record;

use crate::record::License;

/// The available probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Probe {
    /// Record canary and its mirrored complement agree.
    Canary,
    /// State, cursor and bundle agree with each other.
    Lifecycle,
    /// Exposed fields match their seal.
    FieldSeal,
    /// The current entry's raw text matches its seal.
    EntrySeal,
    /// The whole bundle matches its seal.
    BundleSeal,
    /// The current entry's signature still verifies.
    Signature,
    /// The current entry still binds to this host.
    HostBinding,
    /// The current entry still grants the queried product and version.
    QueryBinding,
    /// Days to expiry agree with the expiry date.
    ExpiryDays,
    /// The clock has not been set back since validation.
    ClockRollback,
    /// The current entry was unexpired on the day it was validated.
    ExpiryLapse,
    /// The trusted issuer keys match their seal.
    TrustedKeys,
    /// The probe configuration matches its seal.
    ProbeConfig,
    /// No tracer is attached to the process.
    Tracer,
    /// No instrumentation library is mapped into the process.
    Instrumentation,
    /// No library is injected through the dynamic loader environment.
    Preload,
    /// A tight loop runs without debugger-sized stalls.
    Timing,
    /// The executable matches its expected digest.
    Executable,
}

impl Probe {
    /// Every probe, in id order.
    pub const ALL: [Probe; 18] = [
        Probe::Canary,
        Probe::Lifecycle,
        Probe::FieldSeal,
        Probe::EntrySeal,
        Probe::BundleSeal,
        Probe::Signature,
        Probe::HostBinding,
        Probe::QueryBinding,
        Probe::ExpiryDays,
        Probe::ClockRollback,
        Probe::ExpiryLapse,
        Probe::TrustedKeys,
        Probe::ProbeConfig,
        Probe::Tracer,
        Probe::Instrumentation,
        Probe::Preload,
        Probe::Timing,
        Probe::Executable,
    ];

    /// Single-letter id, `'a'` through `'r'`.
    #[must_use]
    pub fn id(self) -> char {
        let index = Self::ALL.iter().position(|p| *p == self).unwrap_or(0);
        char::from(b'a' + index as u8)
    }

    /// Looks a probe up by its id.
    #[must_use]
    pub fn from_id(id: char) -> Option<Self> {
        let index = (id as u32).checked_sub('a' as u32)? as usize;
        Self::ALL.get(index).copied()
    }

    /// Returns true for probes that inspect the process rather than the record.
    #[must_use]
    pub fn inspects_environment(self) -> bool {
        matches!(
            self,
            Self::Tracer | Self::Instrumentation | Self::Preload | Self::Timing | Self::Executable
        )
    }
}

impl License {
    /// Runs one integrity probe.
    pub fn check(&self, probe: Probe) {
        if probe.inspects_environment() && !self.config.environment_probes {
            return;
        }
        if tripped(self, probe) {
            self.trip();
        }
    }

    /// Runs every integrity probe.
    pub fn check_all(&self) {
        for probe in Probe::ALL {
            self.check(probe);
        }
    }
}

/// Returns true if `probe` detects tampering.
pub(crate) fn tripped(license: &License, probe: Probe) -> bool {
    match probe {
        Probe::Canary => record::canary(license),
        Probe::Lifecycle => record::lifecycle(license),
        Probe::FieldSeal => record::field_seal(license),
        Probe::EntrySeal => record::entry_seal(license),
        Probe::BundleSeal => record::bundle_seal(license),
        Probe::Signature => record::signature(license),
        Probe::HostBinding => record::host_binding(license),
        Probe::QueryBinding => record::query_binding(license),
        Probe::ExpiryDays => record::expiry_days(license),
        Probe::ClockRollback => record::clock_rollback(license),
        Probe::ExpiryLapse => record::expiry_lapse(license),
        Probe::TrustedKeys => record::trusted_keys(license),
        Probe::ProbeConfig => record::probe_config(license),
        Probe::Tracer => environment::tracer_attached(),
        Probe::Instrumentation => environment::instrumentation_mapped(),
        Probe::Preload => environment::preload_injected(),
        Probe::Timing => environment::timing_anomaly(),
        Probe::Executable => environment::executable_modified(license.config.expected_exe_digest),
    }
}

/// Constant-time byte comparison.
#[inline(never)]
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LicenseError;
    use chrono::NaiveDate;

    #[test]
    fn ids_cover_a_to_r() {
        let ids: String = Probe::ALL.iter().map(|p| p.id()).collect();
        assert_eq!(ids, "abcdefghijklmnopqr");
    }

    #[test]
    fn from_id_roundtrip() {
        for probe in Probe::ALL {
            assert_eq!(Probe::from_id(probe.id()), Some(probe));
        }
        assert_eq!(Probe::from_id('s'), None);
        assert_eq!(Probe::from_id('A'), None);
    }

    #[test]
    fn constant_time_eq_cases() {
        assert!(constant_time_eq(&[1, 2, 3], &[1, 2, 3]));
        assert!(!constant_time_eq(&[1, 2, 3], &[1, 2, 4]));
        assert!(!constant_time_eq(&[1, 2, 3], &[1, 2]));
        assert!(constant_time_eq(&[], &[]));
    }

    #[test]
    fn fresh_record_trips_no_record_probe() {
        let license = License::new();
        for probe in Probe::ALL.into_iter().filter(|p| !p.inspects_environment()) {
            assert!(!tripped(&license, probe), "probe {probe:?} tripped on a fresh record");
        }
    }

    #[test]
    fn corrupted_canary_trips() {
        let mut license = License::new();
        license.canary[1] ^= 1;
        assert!(tripped(&license, Probe::Canary));
        license.check(Probe::Canary);
        assert!(license.is_tainted());
    }

    #[test]
    fn patched_field_trips_seal() {
        let mut license = License::new();
        license.fields.customer = "Someone Else".into();
        assert!(tripped(&license, Probe::FieldSeal));
    }

    #[test]
    fn added_trusted_key_trips_seal() {
        let mut license = License::new();
        license.config.trusted_keys.push([7u8; 32]);
        assert!(tripped(&license, Probe::TrustedKeys));
    }

    fn signed_entry(customer: &str, expiry: &str) -> (String, [u8; 32]) {
        use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
        use ed25519_dalek::{Signer, SigningKey};

        let key = SigningKey::from_bytes(&[3u8; 32]);
        let payload = serde_json::json!({
            "product": "My Product",
            "customer": customer,
            "expiry": expiry,
        });
        let payload_b64 = URL_SAFE_NO_PAD.encode(payload.to_string());
        let sig_b64 = URL_SAFE_NO_PAD.encode(key.sign(payload_b64.as_bytes()).to_bytes());
        (format!("{payload_b64}.{sig_b64}"), key.verifying_key().to_bytes())
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 1, d).unwrap()
    }

    #[test]
    fn lapse_after_validation_is_not_tampering() {
        let (lapsing, public) = signed_entry("Acme", "2030-01-01");
        let config = crate::EngineConfig::isolated(public)
            .with_pinned_date(day(1))
            .with_environment_probes(false);
        let mut license = License::with_config(config);
        license.validate("My Product", "1.0", "", "", &lapsing).unwrap();

        license.config.pinned_date = Some(day(2));
        license.check_all();
        assert!(!license.is_tainted());
        assert_eq!(license.customer(), "Acme");

        let err = license.validate("My Product", "1.0", "", "", &lapsing).unwrap_err();
        assert!(matches!(err, LicenseError::Expired(_)));

        let (renewed, _) = signed_entry("Acme Renewed", "2031-01-01");
        license.validate("My Product", "1.0", "", "", &renewed).unwrap();
        assert_eq!(license.customer(), "Acme Renewed");
    }

    #[test]
    fn entry_expired_before_validation_day_trips() {
        let (entry, public) = signed_entry("Acme", "2030-01-01");
        let config = crate::EngineConfig::isolated(public).with_pinned_date(day(1));
        let mut license = License::with_config(config);
        license.validate("My Product", "1.0", "", "", &entry).unwrap();

        license.validated_on = Some(day(5));
        assert!(tripped(&license, Probe::ExpiryLapse));
    }

    #[test]
    fn disabled_environment_probes_are_skipped() {
        let mut license =
            License::with_config(crate::EngineConfig::default().with_environment_probes(false));
        license.config.expected_exe_digest = Some([0u8; 32]);
        license.check(Probe::Executable);
        assert!(!license.is_tainted());
    }
}
