//! The verification pipeline.
//!
//! Each entry passes through, in order: parsing, signature verification,
//! host binding, product, version and expiry. A bundle is scanned in source
//! order and the first entry passing every check wins. If none does, the
//! failure of the entry that got furthest is reported.

use std::cell::OnceCell;

use chrono::NaiveDate;
use ed25519_dalek::VerifyingKey;
use tracing::{debug, info};

use crate::bundle;
use crate::config::EngineConfig;
use crate::entry::{ParsedEntry, product_matches, version_matches};
use crate::error::{LicenseError, LicenseResult};
use crate::host::HostIdentity;
use crate::record::{License, Query};

/// Outcome of checking one entry.
pub(crate) enum Verdict {
    Valid(ParsedEntry),
    Expired(ParsedEntry),
    Rejected(LicenseError),
}

impl Verdict {
    /// How far through the pipeline the entry got.
    fn progress(&self) -> u8 {
        match self {
            Self::Valid(_) => u8::MAX,
            Self::Expired(_) => 6,
            Self::Rejected(err) => match err {
                LicenseError::VersionMismatch { .. } => 5,
                LicenseError::ProductMismatch { .. } => 4,
                LicenseError::HostMismatch | LicenseError::HostIdentityUnavailable(_) => 3,
                LicenseError::InvalidSignature => 2,
                LicenseError::MalformedLicense(_) => 1,
                _ => 0,
            },
        }
    }
}

/// Result of scanning a bundle.
pub(crate) enum Scan {
    Found(usize, ParsedEntry),
    Failed(Verdict),
    Empty,
}

/// Checks entries against one product/version query.
pub(crate) struct Verifier<'a> {
    keys: Vec<VerifyingKey>,
    today: NaiveDate,
    query: &'a Query,
    host: OnceCell<Option<HostIdentity>>,
}

impl<'a> Verifier<'a> {
    pub(crate) fn new(config: &EngineConfig, query: &'a Query) -> Self {
        Self {
            keys: config.verifying_keys(),
            today: config.today(),
            query,
            host: OnceCell::new(),
        }
    }

    pub(crate) fn today(&self) -> NaiveDate {
        self.today
    }

    /// Runs the full pipeline on one raw entry.
    pub(crate) fn check(&self, raw: &str) -> Verdict {
        let entry = match ParsedEntry::parse(raw) {
            Ok(entry) => entry,
            Err(e) => return Verdict::Rejected(e),
        };
        if let Err(e) = entry.verify(&self.keys) {
            return Verdict::Rejected(e);
        }
        if let Err(e) = self.check_host(&entry) {
            return Verdict::Rejected(e);
        }

        let payload = entry.payload();
        if !product_matches(&payload.product, &self.query.product) {
            return Verdict::Rejected(LicenseError::ProductMismatch {
                licensed: payload.product.clone(),
                requested: self.query.product.clone(),
            });
        }
        if !version_matches(&payload.version, &self.query.version) {
            return Verdict::Rejected(LicenseError::VersionMismatch {
                licensed: payload.version.clone(),
                requested: self.query.version.clone(),
            });
        }
        if entry.expiry().is_past(self.today) {
            return Verdict::Expired(entry);
        }
        Verdict::Valid(entry)
    }

    fn check_host(&self, entry: &ParsedEntry) -> LicenseResult<()> {
        let binding = &entry.payload().hostid;
        if binding.is_empty() {
            return Ok(());
        }
        let host = self
            .host
            .get_or_init(|| HostIdentity::current().ok())
            .as_ref()
            .ok_or_else(|| {
                LicenseError::HostIdentityUnavailable(
                    "license is host bound but this host has no readable identity".to_string(),
                )
            })?;
        if host.matches_binding(binding) {
            Ok(())
        } else {
            Err(LicenseError::HostMismatch)
        }
    }

    /// Scans `entries` from `start`, returning the first valid entry or the
    /// most advanced failure.
    pub(crate) fn scan(&self, entries: &[String], start: usize) -> Scan {
        let mut best: Option<Verdict> = None;
        for (index, raw) in entries.iter().enumerate().skip(start) {
            match self.check(raw) {
                Verdict::Valid(entry) => return Scan::Found(index, entry),
                verdict => {
                    debug!(entry = index, reason = %describe(&verdict), "license entry skipped");
                    if best.as_ref().is_none_or(|b| verdict.progress() > b.progress()) {
                        best = Some(verdict);
                    }
                }
            }
        }
        best.map_or(Scan::Empty, Scan::Failed)
    }
}

fn describe(verdict: &Verdict) -> String {
    match verdict {
        Verdict::Valid(_) => "valid".to_string(),
        Verdict::Expired(entry) => format!("expired on {}", entry.expiry()),
        Verdict::Rejected(err) => err.to_string(),
    }
}

impl License {
    /// Validates license data for `product` and `version` on this host.
    ///
    /// `license` is parsed directly when non-empty; otherwise license files
    /// are discovered next to `argv0`, along `path` and in the configured
    /// locations. Empty `product` or `version` leave that dimension
    /// unconstrained.
    ///
    /// On success the record holds the first valid entry. On
    /// [`LicenseError::Expired`] the fields describe the expired entry but
    /// the record is not validated. Any other failure leaves the record as
    /// it was.
    ///
    /// # Errors
    ///
    /// Returns the failure of the entry that progressed furthest through
    /// verification, [`LicenseError::NotFound`] if no license data exists,
    /// or [`LicenseError::ResourceExhausted`] if it exceeds the limits.
    pub fn validate(
        &mut self,
        product: &str,
        version: &str,
        argv0: &str,
        path: &str,
        license: &str,
    ) -> LicenseResult<()> {
        if self.is_tainted() {
            return Err(LicenseError::InvalidSignature);
        }

        let text = if license.trim().is_empty() {
            bundle::discover(argv0, path, &self.config)?
        } else {
            license.to_string()
        };
        let entries = bundle::split_entries(&text, &self.config)?;
        if entries.is_empty() {
            return Err(LicenseError::MalformedLicense(
                "license contains no entries".to_string(),
            ));
        }

        let query = Query {
            product: product.to_string(),
            version: version.to_string(),
        };
        let verifier = Verifier::new(&self.config, &query);
        let today = verifier.today();

        match verifier.scan(&entries, 0) {
            Scan::Found(index, entry) => {
                self.load_bundle(entries, query);
                self.bind(index, &entry, today);
                info!(
                    product = %self.fields.product,
                    expiry = %self.fields.expiry,
                    entry = index,
                    "license validated"
                );
                Ok(())
            }
            Scan::Failed(Verdict::Expired(entry)) => {
                let expiry = entry.expiry().to_string();
                self.load_bundle(entries, query);
                self.show_expired(&entry, today);
                Err(LicenseError::Expired(expiry))
            }
            Scan::Failed(Verdict::Rejected(err)) => Err(err),
            Scan::Failed(Verdict::Valid(_)) | Scan::Empty => Err(LicenseError::MalformedLicense(
                "license contains no entries".to_string(),
            )),
        }
    }
}
