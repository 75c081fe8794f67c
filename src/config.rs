use crate::core::archive::{ArchiveTools, ARCHIVE_EXTENSIONS};
use crate::core::duplicate::{DedupSettings, DEFAULT_FALLBACK_BUCKET_LIMIT, DEFAULT_PHASH_THRESHOLD};
use crate::core::perceptual::HASH_BITS;
use crate::core::validator::DEFAULT_SIMILARITY_THRESHOLD;
use crate::services::scanner::{ScanMode, SleepRange};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const APP_DIR_NAME: &str = "comicsift";
pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: PathBuf,
    /// Tag translation database (`db.text.json` layout).
    pub tag_database_path: Option<PathBuf>,
    pub similarity_threshold: f64,
    pub phash_threshold: u32,
    pub default_mode: ScanMode,
    pub sleep_min_secs: f64,
    pub sleep_max_secs: f64,
    pub unrar_path: PathBuf,
    pub sevenzip_path: PathBuf,
    pub archive_extensions: Vec<String>,
    pub fallback_bucket_limit: usize,
    /// Files per batch, 0 for no limit.
    pub scan_limit: usize,
    pub log_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME);

        Self {
            database_path: data_dir.join("comicsift.db"),
            tag_database_path: None,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            phash_threshold: DEFAULT_PHASH_THRESHOLD,
            default_mode: ScanMode::Cover,
            sleep_min_secs: 4.0,
            sleep_max_secs: 5.0,
            unrar_path: PathBuf::from("unrar"),
            sevenzip_path: PathBuf::from("7z"),
            archive_extensions: ARCHIVE_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            fallback_bucket_limit: DEFAULT_FALLBACK_BUCKET_LIMIT,
            scan_limit: 0,
            log_file: None,
        }
    }
}

impl AppConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from `path`, or from the default location when `None`. A missing
    /// file yields the defaults; fields absent from the file keep theirs.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path(),
        };

        let config = match path {
            Some(path) if path.exists() => {
                let content = fs::read_to_string(&path)?;
                let config: AppConfig = serde_json::from_str(&content)?;
                log::debug!("Loaded config from {}", path.display());
                config
            }
            _ => AppConfig::default(),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ConfigError::Invalid {
                field: "similarity_threshold",
                reason: format!("{} is outside [0, 1]", self.similarity_threshold),
            });
        }
        if self.phash_threshold > HASH_BITS {
            return Err(ConfigError::Invalid {
                field: "phash_threshold",
                reason: format!("{} exceeds the {} hash bits", self.phash_threshold, HASH_BITS),
            });
        }
        if self.sleep_min_secs < 0.0 || self.sleep_max_secs < self.sleep_min_secs {
            return Err(ConfigError::Invalid {
                field: "sleep_max_secs",
                reason: format!(
                    "range {}..{} is empty or negative",
                    self.sleep_min_secs, self.sleep_max_secs
                ),
            });
        }
        if self.archive_extensions.is_empty() {
            return Err(ConfigError::Invalid {
                field: "archive_extensions",
                reason: "no extensions configured".to_string(),
            });
        }
        Ok(())
    }

    pub fn archive_tools(&self) -> ArchiveTools {
        ArchiveTools {
            unrar: self.unrar_path.clone(),
            sevenzip: self.sevenzip_path.clone(),
            ..ArchiveTools::default()
        }
    }

    pub fn sleep_range(&self) -> SleepRange {
        SleepRange {
            min_secs: self.sleep_min_secs,
            max_secs: self.sleep_max_secs,
        }
    }

    pub fn dedup_settings(&self) -> DedupSettings {
        DedupSettings {
            phash_threshold: self.phash_threshold,
            fallback_bucket_limit: self.fallback_bucket_limit,
        }
    }
}
