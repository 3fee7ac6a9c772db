//! Walking multi-entry license bundles.

use tracing::{debug, info};

use crate::error::{LicenseError, LicenseResult};
use crate::record::{License, RecordState};
use crate::verify::{Scan, Verifier};

impl License {
    /// Moves to the next entry of the bundle that is valid for the product
    /// and version the record was validated for.
    ///
    /// Entries are visited in source order; entries that fail verification
    /// are skipped. Once no valid entry remains the record becomes
    /// [`RecordState::Exhausted`] and every further call fails the same way.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::NoMoreEntries`] if the record is not
    /// validated or no later entry is valid.
    pub fn advance(&mut self) -> LicenseResult<()> {
        if self.is_tainted() {
            return Err(LicenseError::InvalidSignature);
        }
        if self.state != RecordState::Validated {
            return Err(LicenseError::NoMoreEntries);
        }
        let (Some(cursor), Some(query)) = (self.cursor, self.query.clone()) else {
            return Err(LicenseError::NoMoreEntries);
        };

        let verifier = Verifier::new(&self.config, &query);
        match verifier.scan(&self.entries, cursor + 1) {
            Scan::Found(index, entry) => {
                self.bind(index, &entry, verifier.today());
                info!(product = %self.fields.product, entry = index, "advanced to next license entry");
                Ok(())
            }
            Scan::Failed(_) | Scan::Empty => {
                debug!(entries = self.entries.len(), "license chain exhausted");
                self.state = RecordState::Exhausted;
                Err(LicenseError::NoMoreEntries)
            }
        }
    }
}
