// Contract for the remote catalog. No network transport ships with this
// crate; `FixtureCatalog` replays recorded answers from a JSON file.

use crate::core::validator::CandidateMatch;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The service refused this client. Halts the batch.
    #[error("Blocked by remote service: {0}")]
    Blocked(String),

    #[error("Transient remote failure: {0}")]
    Transient(String),

    #[error("Malformed remote response: {0}")]
    Malformed(String),
}

/// Which pages a hash search covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashScope {
    CoversOnly,
    AllPages,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchOutcome {
    Found(String),
    NoMatch,
}

pub trait CatalogClient {
    fn search_by_hash(&self, content_hash: &str, scope: HashScope) -> Result<SearchOutcome, RemoteError>;

    fn search_by_keyword(&self, keyword: &str) -> Result<SearchOutcome, RemoteError>;

    /// `Ok(None)` when the entry exists but carries no metadata.
    fn fetch_metadata(&self, url: &str) -> Result<Option<CandidateMatch>, RemoteError>;
}

impl<C: CatalogClient + ?Sized> CatalogClient for &C {
    fn search_by_hash(&self, content_hash: &str, scope: HashScope) -> Result<SearchOutcome, RemoteError> {
        (**self).search_by_hash(content_hash, scope)
    }

    fn search_by_keyword(&self, keyword: &str) -> Result<SearchOutcome, RemoteError> {
        (**self).search_by_keyword(keyword)
    }

    fn fetch_metadata(&self, url: &str) -> Result<Option<CandidateMatch>, RemoteError> {
        (**self).fetch_metadata(url)
    }
}

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid catalog fixture: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Recorded catalog answers.
///
/// Hash lookups ignore the scope. Keyword lookups are case-insensitive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureCatalog {
    #[serde(default)]
    pub hashes: HashMap<String, String>,
    #[serde(default)]
    pub keywords: HashMap<String, String>,
    #[serde(default)]
    pub galleries: HashMap<String, CandidateMatch>,
    /// Answer every call with [`RemoteError::Blocked`].
    #[serde(default)]
    pub blocked: bool,
}

impl FixtureCatalog {
    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        let content = fs::read_to_string(path)?;
        let mut catalog: FixtureCatalog = serde_json::from_str(&content)?;
        catalog.hashes = lowercase_keys(catalog.hashes);
        catalog.keywords = lowercase_keys(catalog.keywords);
        log::debug!(
            "Loaded catalog fixture with {} hashes, {} galleries",
            catalog.hashes.len(),
            catalog.galleries.len()
        );
        Ok(catalog)
    }

    pub fn with_hash(mut self, content_hash: &str, url: &str) -> Self {
        self.hashes.insert(content_hash.to_lowercase(), url.to_string());
        self
    }

    pub fn with_keyword(mut self, keyword: &str, url: &str) -> Self {
        self.keywords.insert(keyword.trim().to_lowercase(), url.to_string());
        self
    }

    pub fn with_gallery(mut self, url: &str, metadata: CandidateMatch) -> Self {
        self.galleries.insert(url.to_string(), metadata);
        self
    }

    fn check_blocked(&self) -> Result<(), RemoteError> {
        if self.blocked {
            return Err(RemoteError::Blocked("fixture marked as blocked".to_string()));
        }
        Ok(())
    }
}

fn lowercase_keys(map: HashMap<String, String>) -> HashMap<String, String> {
    map.into_iter().map(|(k, v)| (k.trim().to_lowercase(), v)).collect()
}

fn outcome(url: Option<&String>) -> SearchOutcome {
    match url {
        Some(url) => SearchOutcome::Found(url.clone()),
        None => SearchOutcome::NoMatch,
    }
}

impl CatalogClient for FixtureCatalog {
    fn search_by_hash(&self, content_hash: &str, _scope: HashScope) -> Result<SearchOutcome, RemoteError> {
        self.check_blocked()?;
        Ok(outcome(self.hashes.get(&content_hash.to_lowercase())))
    }

    fn search_by_keyword(&self, keyword: &str) -> Result<SearchOutcome, RemoteError> {
        self.check_blocked()?;
        Ok(outcome(self.keywords.get(&keyword.trim().to_lowercase())))
    }

    fn fetch_metadata(&self, url: &str) -> Result<Option<CandidateMatch>, RemoteError> {
        self.check_blocked()?;
        Ok(self.galleries.get(url).cloned())
    }
}
