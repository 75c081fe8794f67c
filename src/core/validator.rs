use crate::core::archive::ARCHIVE_EXTENSIONS;
use crate::core::similarity::hybrid_similarity;
use crate::core::title::parse_title;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.6;

/// Maps untranslated catalog tags to their translated form.
pub trait TagTranslate {
    /// Pure and total: every call with the same input gives the same output,
    /// and an empty slice gives an empty vector.
    fn translate(&self, tags: &[String]) -> Vec<String>;
}

/// Translator used when no translation database is loaded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTranslation;

impl TagTranslate for NoTranslation {
    fn translate(&self, _tags: &[String]) -> Vec<String> {
        Vec::new()
    }
}

impl<T: TagTranslate + ?Sized> TagTranslate for &T {
    fn translate(&self, tags: &[String]) -> Vec<String> {
        (**self).translate(tags)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchMode {
    /// Similarity score against the threshold.
    #[default]
    Fuzzy,
    /// Case-insensitive equality. Used when the lookup was by keyword, where
    /// no image hash backs the result.
    Strict,
}

/// Metadata of a catalog entry as returned by the remote service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateMatch {
    #[serde(default, alias = "title")]
    pub primary_title: Option<String>,
    #[serde(default, alias = "title_jpn")]
    pub secondary_title: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, alias = "url")]
    pub canonical_url: Option<String>,
}

/// The check that produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStep {
    PrimaryTitle,
    RawTags,
    SecondaryTitle,
    TranslatedTags,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchVerdict {
    pub is_match: bool,
    pub best_title: Option<String>,
    pub serialized_tags: String,
    pub matched_by: Option<MatchStep>,
}

/// Decides whether a catalog candidate is the work a local file holds.
pub struct MatchValidator<T = NoTranslation> {
    translator: T,
    threshold: f64,
}

impl MatchValidator<NoTranslation> {
    pub fn untranslated(threshold: f64) -> Self {
        Self::new(NoTranslation, threshold)
    }
}

impl<T: TagTranslate> MatchValidator<T> {
    pub fn new(translator: T, threshold: f64) -> Self {
        Self {
            translator,
            threshold,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Run the four checks in order, stopping at the first that passes.
    ///
    /// Title and tags are filled in on a mismatch too, so the record can be
    /// reviewed by hand later. No candidate at all is always a mismatch.
    pub fn evaluate(
        &self,
        file_name: &str,
        candidate: Option<&CandidateMatch>,
        mode: MatchMode,
    ) -> MatchVerdict {
        let Some(candidate) = candidate else {
            return MatchVerdict::default();
        };

        let name = strip_archive_extension(file_name);
        let translated = self.translator.translate(&candidate.tags);
        let targets = author_targets(name);

        let primary = non_blank(candidate.primary_title.as_deref());
        let secondary = non_blank(candidate.secondary_title.as_deref());

        let matched_by = if primary.is_some_and(|title| self.title_matches(name, title, mode)) {
            Some(MatchStep::PrimaryTitle)
        } else if tags_cover(&targets, candidate.tags.iter()) {
            Some(MatchStep::RawTags)
        } else if secondary.is_some_and(|title| self.title_matches(name, title, mode)) {
            Some(MatchStep::SecondaryTitle)
        } else if tags_cover(&targets, candidate.tags.iter().chain(translated.iter())) {
            Some(MatchStep::TranslatedTags)
        } else {
            None
        };

        match matched_by {
            Some(step) => log::debug!("{} matched by {:?}", name, step),
            None => log::debug!("{} matched no title or tag", name),
        }

        let serialized_tags = candidate
            .tags
            .iter()
            .chain(translated.iter())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");

        MatchVerdict {
            is_match: matched_by.is_some(),
            best_title: secondary.or(primary).map(str::to_string),
            serialized_tags,
            matched_by,
        }
    }

    /// Compare a file name (without extension) against one candidate title.
    ///
    /// Strict mode accepts any non-empty parsed core title; fuzzy mode only
    /// scores cores of two or more characters.
    pub fn title_matches(&self, name: &str, title: &str, mode: MatchMode) -> bool {
        let core = parse_title(title)
            .core_title
            .map(|core| core.trim().to_lowercase())
            .filter(|core| !core.is_empty());
        let name = name.trim().to_lowercase();
        let title = title.trim().to_lowercase();

        match mode {
            MatchMode::Strict => name == title || core.is_some_and(|core| name == core),
            MatchMode::Fuzzy => {
                let direct = hybrid_similarity(&name, &title);
                let via_core = core
                    .filter(|core| core.chars().count() >= 2)
                    .map_or(0.0, |core| hybrid_similarity(&name, &core));
                let score = direct.max(via_core);
                log::debug!("similarity {:.3} between {:?} and {:?}", score, name, title);
                score >= self.threshold
            }
        }
    }
}

/// Lowercased author names to look for in the candidate's tags.
///
/// Bracketed artist and group come first. A plain `Author - Title` name
/// falls back to the part before the first ` - `.
pub fn author_targets(name: &str) -> Vec<String> {
    let parsed = parse_title(name);
    let mut targets: Vec<String> = [parsed.artist.as_deref(), parsed.group.as_deref()]
        .into_iter()
        .flatten()
        .map(|s| s.trim().to_lowercase())
        .collect();

    if targets.is_empty() {
        if let Some((author, _)) = name.split_once(" - ") {
            targets.push(author.trim().to_lowercase());
        }
    }

    targets.retain(|target| target.chars().count() >= 2);
    targets
}

/// True when some target is a substring of some tag value. The namespace
/// prefix (`artist:`, `group:`) is ignored.
pub fn tags_cover<'a, I>(targets: &[String], tags: I) -> bool
where
    I: IntoIterator<Item = &'a String>,
{
    if targets.is_empty() {
        return false;
    }
    tags.into_iter().any(|tag| {
        let value = tag.split_once(':').map_or(tag.as_str(), |(_, v)| v);
        let value = value.trim().to_lowercase();
        targets.iter().any(|target| value.contains(target.as_str()))
    })
}

/// Drop a known archive suffix, leaving names such as `Vol. 2` intact.
pub fn strip_archive_extension(file_name: &str) -> &str {
    if let Some((stem, ext)) = file_name.rsplit_once('.') {
        let ext = ext.to_ascii_lowercase();
        if ARCHIVE_EXTENSIONS.contains(&ext.as_str()) {
            return stem;
        }
    }
    file_name
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}
