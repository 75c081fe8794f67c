// Title grammar for doujinshi-style file names:
//   (event) [group (artist)] core title (parody) [DL版] [tag] [tag]

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref LEADING_EVENT: Regex = Regex::new(r"^\(([^)]+)\)").unwrap();
    static ref LEADING_GROUP: Regex = Regex::new(r"^\[([^\]]+)\]").unwrap();
    static ref GROUP_WITH_ARTIST: Regex = Regex::new(r"^(.*?)\s*\(([^)]+)\)$").unwrap();
    static ref TRAILING_TAG: Regex = Regex::new(r"\[([^\]]+)\]$").unwrap();
    static ref TRAILING_PARODY: Regex = Regex::new(r"^(.*?)\s*\(([^)]+)\)$").unwrap();
}

/// Markers of a digital-distribution release, checked longest first.
const DISTRIBUTION_MARKERS: [&str; 2] = ["[DL版]", "[DL]"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTitle {
    pub event: Option<String>,
    pub group: Option<String>,
    pub artist: Option<String>,
    pub core_title: Option<String>,
    pub parody: Option<String>,
    pub translation_tags: Vec<String>,
    pub is_distribution: bool,
}

impl ParsedTitle {
    /// Artist, else group: whoever authored the work.
    pub fn author(&self) -> Option<&str> {
        self.artist.as_deref().or(self.group.as_deref())
    }
}

/// Break a stylized title into its parts. Never fails; anything the grammar
/// does not recognise stays in `core_title`.
pub fn parse_title(input: &str) -> ParsedTitle {
    let mut parsed = ParsedTitle::default();
    let mut rest = normalize_brackets(input).trim().to_string();

    if let Some(caps) = LEADING_EVENT.captures(&rest) {
        parsed.event = non_empty(&caps[1]);
        rest = rest[caps[0].len()..].trim_start().to_string();
    }

    if let Some(caps) = LEADING_GROUP.captures(&rest) {
        let inner = caps[1].trim();
        match GROUP_WITH_ARTIST.captures(inner) {
            Some(author) => {
                parsed.group = non_empty(&author[1]);
                parsed.artist = non_empty(&author[2]);
            }
            None => parsed.group = non_empty(inner),
        }
        rest = rest[caps[0].len()..].trim_start().to_string();
    }

    for marker in DISTRIBUTION_MARKERS {
        if rest.contains(marker) {
            parsed.is_distribution = true;
            rest = rest.replace(marker, "");
        }
    }

    let mut trailing = Vec::new();
    loop {
        rest = rest.trim_end().to_string();
        let Some(caps) = TRAILING_TAG.captures(&rest) else {
            break;
        };
        let start = caps.get(0).map(|m| m.start()).unwrap_or(rest.len());
        if let Some(tag) = non_empty(&caps[1]) {
            trailing.push(tag);
        }
        rest.truncate(start);
    }
    trailing.reverse();
    parsed.translation_tags = trailing;

    if let Some(caps) = TRAILING_PARODY.captures(&rest) {
        parsed.parody = non_empty(&caps[2]);
        rest = caps[1].to_string();
    }

    parsed.core_title = non_empty(&rest);
    parsed
}

fn normalize_brackets(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '（' => '(',
            '）' => ')',
            '【' | '［' => '[',
            '】' | '］' => ']',
            other => other,
        })
        .collect()
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_title() {
        let parsed = parse_title("(C99) [CircleA (ArtistB)] Core Title (Parody) [DL] [English]");

        assert_eq!(parsed.event.as_deref(), Some("C99"));
        assert_eq!(parsed.group.as_deref(), Some("CircleA"));
        assert_eq!(parsed.artist.as_deref(), Some("ArtistB"));
        assert!(parsed.is_distribution);
        assert_eq!(parsed.translation_tags, vec!["English".to_string()]);
        assert_eq!(parsed.parody.as_deref(), Some("Parody"));
        assert_eq!(parsed.core_title.as_deref(), Some("Core Title"));
    }

    #[test]
    fn test_group_without_artist() {
        let parsed = parse_title("[Some Circle] Another Story");
        assert_eq!(parsed.group.as_deref(), Some("Some Circle"));
        assert_eq!(parsed.artist, None);
        assert_eq!(parsed.author(), Some("Some Circle"));
        assert_eq!(parsed.core_title.as_deref(), Some("Another Story"));
        assert!(!parsed.is_distribution);
    }

    #[test]
    fn test_full_width_brackets() {
        let parsed = parse_title("（C97）【サークル（作家）】タイトル［DL版］");
        assert_eq!(parsed.event.as_deref(), Some("C97"));
        assert_eq!(parsed.group.as_deref(), Some("サークル"));
        assert_eq!(parsed.artist.as_deref(), Some("作家"));
        assert!(parsed.is_distribution);
        assert_eq!(parsed.core_title.as_deref(), Some("タイトル"));
    }

    #[test]
    fn test_multiple_trailing_tags_keep_order() {
        let parsed = parse_title("[Circle] Title [Chinese] [Decensored] [Digital]");
        assert_eq!(
            parsed.translation_tags,
            vec!["Chinese".to_string(), "Decensored".to_string(), "Digital".to_string()]
        );
        assert_eq!(parsed.core_title.as_deref(), Some("Title"));
    }

    #[test]
    fn test_plain_name() {
        let parsed = parse_title("Artist X - Sample Comic");
        assert_eq!(parsed.core_title.as_deref(), Some("Artist X - Sample Comic"));
        assert_eq!(parsed.author(), None);
        assert!(parsed.translation_tags.is_empty());
    }

    #[test]
    fn test_degenerate_input_never_fails() {
        assert_eq!(parse_title(""), ParsedTitle::default());
        assert_eq!(parse_title("   "), ParsedTitle::default());

        let only_tags = parse_title("[English]");
        assert_eq!(only_tags.group.as_deref(), Some("English"));
        assert_eq!(only_tags.core_title, None);

        let unbalanced = parse_title("(C99 [Circle Title");
        assert_eq!(unbalanced.event, None);
        assert_eq!(unbalanced.core_title.as_deref(), Some("(C99 [Circle Title"));
    }
}
