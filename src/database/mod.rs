pub mod models;
pub mod store;

use crate::core::duplicate::DuplicateGroup;
use models::{ScanRecord, ScanStatus};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

pub use store::SqliteStore;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database query error: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No backup to restore: {0}")]
    NoBackup(String),
}

/// Scan results keyed by archive path, plus the current duplicate groups.
pub trait Storage {
    fn get_by_path(&self, path: &str) -> Result<Option<ScanRecord>, DatabaseError>;

    /// Insert or replace the record for `path`.
    fn save(
        &mut self,
        path: &str,
        status: ScanStatus,
        url: Option<&str>,
        title: Option<&str>,
        tags: Option<&str>,
    ) -> Result<(), DatabaseError>;

    fn list_by_status(
        &self,
        predicate: &dyn Fn(ScanStatus) -> bool,
    ) -> Result<Vec<ScanRecord>, DatabaseError>;

    /// Drop every stored group and write `groups` in their place, in one
    /// transaction.
    fn replace_groups(&mut self, groups: &[DuplicateGroup]) -> Result<(), DatabaseError>;

    fn list_groups(&self) -> Result<Vec<DuplicateGroup>, DatabaseError>;

    fn statistics(&self) -> Result<BTreeMap<ScanStatus, usize>, DatabaseError>;

    fn processed_paths(&self) -> Result<HashSet<String>, DatabaseError>;
}

impl<S: Storage + ?Sized> Storage for &mut S {
    fn get_by_path(&self, path: &str) -> Result<Option<ScanRecord>, DatabaseError> {
        (**self).get_by_path(path)
    }

    fn save(
        &mut self,
        path: &str,
        status: ScanStatus,
        url: Option<&str>,
        title: Option<&str>,
        tags: Option<&str>,
    ) -> Result<(), DatabaseError> {
        (**self).save(path, status, url, title, tags)
    }

    fn list_by_status(
        &self,
        predicate: &dyn Fn(ScanStatus) -> bool,
    ) -> Result<Vec<ScanRecord>, DatabaseError> {
        (**self).list_by_status(predicate)
    }

    fn replace_groups(&mut self, groups: &[DuplicateGroup]) -> Result<(), DatabaseError> {
        (**self).replace_groups(groups)
    }

    fn list_groups(&self) -> Result<Vec<DuplicateGroup>, DatabaseError> {
        (**self).list_groups()
    }

    fn statistics(&self) -> Result<BTreeMap<ScanStatus, usize>, DatabaseError> {
        (**self).statistics()
    }

    fn processed_paths(&self) -> Result<HashSet<String>, DatabaseError> {
        (**self).processed_paths()
    }
}
