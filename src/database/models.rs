use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted outcome of scanning one archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ScanStatus {
    Success,
    Mismatch,
    NoMatch,
    NoImages,
    Unsupported,
    FileError,
    NetworkFail,
    ValidationError,
    Error,
}

impl ScanStatus {
    pub const ALL: [ScanStatus; 9] = [
        ScanStatus::Success,
        ScanStatus::Mismatch,
        ScanStatus::NoMatch,
        ScanStatus::NoImages,
        ScanStatus::Unsupported,
        ScanStatus::FileError,
        ScanStatus::NetworkFail,
        ScanStatus::ValidationError,
        ScanStatus::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ScanStatus::Success => "success",
            ScanStatus::Mismatch => "mismatch",
            ScanStatus::NoMatch => "no_match",
            ScanStatus::NoImages => "no_images",
            ScanStatus::Unsupported => "unsupported",
            ScanStatus::FileError => "file_error",
            ScanStatus::NetworkFail => "network_fail",
            ScanStatus::ValidationError => "validation_error",
            ScanStatus::Error => "error",
        }
    }

    /// Outcomes worth retrying in a later batch.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ScanStatus::NetworkFail | ScanStatus::FileError | ScanStatus::Error
        )
    }
}

impl From<String> for ScanStatus {
    fn from(s: String) -> Self {
        ScanStatus::from(s.as_str())
    }
}

impl From<&str> for ScanStatus {
    fn from(s: &str) -> Self {
        match s {
            "success" => ScanStatus::Success,
            "mismatch" => ScanStatus::Mismatch,
            "no_match" => ScanStatus::NoMatch,
            "no_images" => ScanStatus::NoImages,
            "unsupported" => ScanStatus::Unsupported,
            "file_error" => ScanStatus::FileError,
            "network_fail" => ScanStatus::NetworkFail,
            "validation_error" => ScanStatus::ValidationError,
            _ => ScanStatus::Error,
        }
    }
}

impl From<ScanStatus> for String {
    fn from(status: ScanStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Scan result row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub path: String,
    pub file_name: String,
    pub canonical_url: Option<String>,
    pub title: Option<String>,
    pub tags: Option<String>,
    pub status: ScanStatus,
    pub scanned_at: DateTime<Utc>,
}

impl ScanRecord {
    /// Tags split back out of their `", "`-joined form.
    pub fn tag_list(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .map(|tags| {
                tags.split(", ")
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}
