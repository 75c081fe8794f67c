use crate::core::validator::{CandidateMatch, MatchMode, MatchValidator, NoTranslation, TagTranslate};
use crate::database::models::ScanStatus;
use crate::database::{DatabaseError, Storage};
use std::path::Path;

/// Turns per-file outcomes into stored records.
///
/// A record already marked [`ScanStatus::Success`] is only replaced by
/// another success or by [`ResultHandler::manual_override`]. A write is
/// skipped when neither the status nor the URL changed.
pub struct ResultHandler<S, T = NoTranslation> {
    store: S,
    validator: MatchValidator<T>,
}

impl<S: Storage, T: TagTranslate> ResultHandler<S, T> {
    pub fn new(store: S, validator: MatchValidator<T>) -> Self {
        Self { store, validator }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn validator(&self) -> &MatchValidator<T> {
        &self.validator
    }

    /// The catalog resolved `path` to `url`. Validates the candidate and
    /// stores either a success or a mismatch, keeping title and tags for
    /// later review in both cases.
    pub fn handle_match(
        &mut self,
        path: &str,
        url: &str,
        candidate: Option<&CandidateMatch>,
        mode: MatchMode,
    ) -> Result<ScanStatus, DatabaseError> {
        let file_name = Path::new(path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(path);
        let verdict = self.validator.evaluate(file_name, candidate, mode);

        let status = if verdict.is_match {
            ScanStatus::Success
        } else {
            log::info!("Possible mismatch, review by hand: {}", path);
            ScanStatus::Mismatch
        };

        let tags = Some(verdict.serialized_tags.as_str()).filter(|t| !t.is_empty());
        let changed = self.record(path, status, Some(url), verdict.best_title.as_deref(), tags)?;

        if changed && status == ScanStatus::Success {
            log::info!(
                "Matched {} -> {}",
                file_name,
                verdict.best_title.as_deref().unwrap_or(url)
            );
        }
        Ok(status)
    }

    pub fn handle_no_match(&mut self, path: &str) -> Result<ScanStatus, DatabaseError> {
        self.record(path, ScanStatus::NoMatch, None, None, None)?;
        Ok(ScanStatus::NoMatch)
    }

    /// Record a failed attempt. `url` is kept when the failure happened after
    /// the catalog had already answered.
    pub fn handle_failure(
        &mut self,
        path: &str,
        status: ScanStatus,
        url: Option<&str>,
    ) -> Result<ScanStatus, DatabaseError> {
        self.record(path, status, url, None, None)?;
        Ok(status)
    }

    /// Write unconditionally. Used when a person has reviewed the record.
    pub fn manual_override(
        &mut self,
        path: &str,
        status: ScanStatus,
        url: Option<&str>,
        title: Option<&str>,
        tags: Option<&str>,
    ) -> Result<(), DatabaseError> {
        log::info!("Manual override for {}: {}", path, status);
        self.store.save(path, status, url, title, tags)
    }

    /// Store an automated outcome. Returns whether anything was written.
    pub fn record(
        &mut self,
        path: &str,
        status: ScanStatus,
        url: Option<&str>,
        title: Option<&str>,
        tags: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        if let Some(old) = self.store.get_by_path(path)? {
            if old.status == ScanStatus::Success && status != ScanStatus::Success {
                log::warn!("Keeping confirmed record for {}, ignoring {}", path, status);
                return Ok(false);
            }
            let old_url = old.canonical_url.as_deref();
            if old.status == status && old_url == url {
                log::debug!("Unchanged: {}", path);
                return Ok(false);
            }
            if old_url != url {
                log::info!("URL changed for {}: {:?} -> {:?}", path, old_url, url);
            }
        }

        self.store.save(path, status, url, title, tags)?;
        Ok(true)
    }
}
