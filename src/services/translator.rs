use crate::core::validator::TagTranslate;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Namespace given to tags written without a `namespace:` prefix.
pub const DEFAULT_NAMESPACE: &str = "misc";

#[derive(Debug, Error)]
pub enum TranslatorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid translation database: {0}")]
    Parse(#[from] serde_json::Error),
}

// On-disk layout of the tag translation database
#[derive(Debug, Deserialize)]
struct RawDatabase {
    #[serde(default)]
    data: Vec<RawNamespace>,
}

#[derive(Debug, Deserialize)]
struct RawNamespace {
    namespace: String,
    #[serde(default, rename = "frontMatters")]
    front_matters: Option<RawFrontMatters>,
    #[serde(default)]
    data: HashMap<String, RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawFrontMatters {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    name: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct Namespace {
    display_name: String,
    entries: HashMap<String, String>,
}

/// Immutable tag translation table, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct TagTranslator {
    namespaces: HashMap<String, Namespace>,
}

impl TagTranslator {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the database at `path`. A missing file gives an empty table.
    pub fn load(path: &Path) -> Result<Self, TranslatorError> {
        if !path.exists() {
            log::warn!("Tag database {} not found, tags stay untranslated", path.display());
            return Ok(Self::empty());
        }
        let content = fs::read_to_string(path)?;
        let translator = Self::from_json(&content)?;
        log::debug!(
            "Loaded {} tag namespaces from {}",
            translator.namespaces.len(),
            path.display()
        );
        Ok(translator)
    }

    pub fn from_json(content: &str) -> Result<Self, TranslatorError> {
        let raw: RawDatabase = serde_json::from_str(content)?;
        let namespaces = raw
            .data
            .into_iter()
            .map(|ns| {
                let display_name = ns
                    .front_matters
                    .and_then(|fm| fm.name)
                    .unwrap_or_else(|| ns.namespace.clone());
                let entries = ns
                    .data
                    .into_iter()
                    .filter_map(|(key, entry)| entry.name.map(|name| (key, name)))
                    .collect();
                (ns.namespace, Namespace { display_name, entries })
            })
            .collect();
        Ok(Self { namespaces })
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    pub fn translate_one(&self, tag: &str) -> String {
        let (namespace, key) = tag.split_once(':').unwrap_or((DEFAULT_NAMESPACE, tag));
        match self.namespaces.get(namespace) {
            Some(ns) => {
                let key = ns.entries.get(key).map(String::as_str).unwrap_or(key);
                format!("{}:{}", ns.display_name, key)
            }
            None => format!("{}:{}", namespace, key),
        }
    }
}

impl TagTranslate for TagTranslator {
    fn translate(&self, tags: &[String]) -> Vec<String> {
        if self.is_empty() {
            return Vec::new();
        }
        tags.iter().map(|tag| self.translate_one(tag)).collect()
    }
}
