//! Durable highlight anchors: persistence, palette colors, fingerprints.
//!
//! An anchor describes a previously-made highlight well enough to re-locate
//! it in a possibly-changed document. The JSON schema is flat for backward
//! compatibility: v1 records carry only text and plain-text offsets, v2
//! records add node paths and a fingerprint. `schema_version` defaults to 1
//! when absent from a persisted form.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as _, Sha256};

use crate::error::Error;

// ── Colors ────────────────────────────────────────────────────────────

/// A highlight color: a palette name, or a raw six-hex-digit passthrough.
///
/// Unknown palette names decode to yellow. A recognizable hex string decodes
/// to its palette name; any other six-hex-digit string is kept verbatim so
/// round-tripping preserves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HighlightColor {
    Yellow,
    Green,
    Blue,
    Pink,
    Orange,
    Purple,
    Custom(String),
}

impl Default for HighlightColor {
    fn default() -> Self {
        Self::Yellow
    }
}

impl HighlightColor {
    /// Six uppercase hex digits, no `#`.
    pub fn hex(&self) -> &str {
        match self {
            Self::Yellow => "FFF176",
            Self::Green => "A5D6A7",
            Self::Blue => "81D4FA",
            Self::Pink => "F48FB1",
            Self::Orange => "FFCC80",
            Self::Purple => "CE93D8",
            Self::Custom(hex) => hex,
        }
    }

    /// Integer RGB components from the hex digits.
    pub fn rgb(&self) -> (u8, u8, u8) {
        let hex = self.hex();
        let channel = |range: std::ops::Range<usize>| {
            hex.get(range)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .unwrap_or(0)
        };
        (channel(0..2), channel(2..4), channel(4..6))
    }

    /// The persisted string form: palette name, or hex for custom colors.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Yellow => "yellow",
            Self::Green => "green",
            Self::Blue => "blue",
            Self::Pink => "pink",
            Self::Orange => "orange",
            Self::Purple => "purple",
            Self::Custom(hex) => hex,
        }
    }

    /// Decode a palette name or hex string; anything unrecognizable is
    /// yellow.
    pub fn from_raw(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "yellow" => return Self::Yellow,
            "green" => return Self::Green,
            "blue" => return Self::Blue,
            "pink" => return Self::Pink,
            "orange" => return Self::Orange,
            "purple" => return Self::Purple,
            _ => {}
        }

        let digits = raw.strip_prefix('#').unwrap_or(raw);
        if digits.len() == 6 && digits.chars().all(|c| c.is_ascii_hexdigit()) {
            let upper = digits.to_ascii_uppercase();
            for named in [
                Self::Yellow,
                Self::Green,
                Self::Blue,
                Self::Pink,
                Self::Orange,
                Self::Purple,
            ] {
                if named.hex() == upper {
                    return named;
                }
            }
            return Self::Custom(upper);
        }

        Self::Yellow
    }
}

impl fmt::Display for HighlightColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for HighlightColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for HighlightColor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_raw(&raw))
    }
}

// ── The anchor record ─────────────────────────────────────────────────

fn default_schema_version() -> u8 {
    1
}

/// A durable description of one highlight.
///
/// Equality and hashing are by `id` alone: two differing records with the
/// same id compare equal. Deliberate, so sets and maps of anchors key on
/// identity; diff by fields explicitly if you need it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anchor {
    pub id: String,
    pub article_id: String,
    /// Legacy v1 plain-text offset, kept as a locality hint.
    pub start_offset: i64,
    pub end_offset: i64,
    pub exact_text: String,
    pub prefix_context: String,
    pub suffix_context: String,
    #[serde(default)]
    pub note_content: Option<String>,
    pub color: HighlightColor,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub start_node_path: Option<String>,
    #[serde(default)]
    pub start_node_offset: Option<usize>,
    #[serde(default)]
    pub end_node_path: Option<String>,
    #[serde(default)]
    pub end_node_offset: Option<usize>,
    #[serde(default)]
    pub text_fingerprint: Option<String>,
    #[serde(default = "default_schema_version")]
    pub schema_version: u8,
}

/// The v1/v2 distinction, as a view over the flat record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorPosition<'a> {
    /// Text and plain-text offsets only.
    V1,
    /// Text plus node paths and in-node offsets.
    V2 {
        start_path: &'a str,
        start_node_offset: usize,
        end_path: &'a str,
        end_node_offset: usize,
    },
}

impl Anchor {
    /// The tagged position view. `V2` requires all four path/offset fields.
    pub fn position(&self) -> AnchorPosition<'_> {
        match (
            self.start_node_path.as_deref(),
            self.start_node_offset,
            self.end_node_path.as_deref(),
            self.end_node_offset,
        ) {
            (Some(start_path), Some(start_node_offset), Some(end_path), Some(end_node_offset)) => {
                AnchorPosition::V2 {
                    start_path,
                    start_node_offset,
                    end_path,
                    end_node_offset,
                }
            }
            _ => AnchorPosition::V1,
        }
    }

    pub fn has_v2_data(&self) -> bool {
        matches!(self.position(), AnchorPosition::V2 { .. })
    }

    /// Length of the originally-selected range per the legacy offsets.
    pub fn length(&self) -> usize {
        usize::try_from(self.end_offset.saturating_sub(self.start_offset)).unwrap_or(0)
    }

    /// Whether the stored fingerprint still matches `text`. `None` when the
    /// record carries no fingerprint.
    pub fn fingerprint_matches(&self, text: &str) -> Option<bool> {
        self.text_fingerprint
            .as_deref()
            .map(|stored| stored == text_fingerprint(text))
    }
}

impl PartialEq for Anchor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Anchor {}

impl std::hash::Hash for Anchor {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

// ── Fingerprint ───────────────────────────────────────────────────────

/// Fingerprint of a highlight's text: collapse whitespace runs to single
/// spaces, trim, SHA-256, lowercase hex.
pub fn text_fingerprint(text: &str) -> String {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let hash = Sha256::digest(normalized.as_bytes());
    return format!("{hash:x}");
}

// ── Persistence ───────────────────────────────────────────────────────

/// Parse a JSON array of anchors.
///
/// # Errors
///
/// Returns `Error::Json` naming the offending field and location when the
/// content is not a valid anchor list.
pub fn parse_anchors(content: &str) -> Result<Vec<Anchor>, Error> {
    return Ok(serde_json::from_str(content)?);
}

/// Read and parse an anchor file from disk.
///
/// # Errors
///
/// Returns `Error::FileNotFound` if the file doesn't exist, `Error::Io` for
/// other read failures, or `Error::AnchorFileInvalid` when the JSON does not
/// decode.
pub fn read_anchors(path: &Path) -> Result<Vec<Anchor>, Error> {
    let content = match std::fs::read_to_string(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::FileNotFound { path: path.to_path_buf() });
        }
        Err(e) => return Err(Error::Io(e)),
        Ok(c) => c,
    };
    return parse_anchors(&content).map_err(|e| Error::AnchorFileInvalid {
        path: path.to_path_buf(),
        reason: e.to_string(),
    });
}

/// Write an anchor list to disk as pretty-printed JSON.
///
/// # Errors
///
/// Returns `Error::Json` if serialization fails, or `Error::Io` if the file
/// cannot be written.
pub fn write_anchors(path: &Path, anchors: &[Anchor]) -> Result<(), Error> {
    let content = serde_json::to_string_pretty(anchors)?;
    std::fs::write(path, content)?;
    return Ok(());
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn sample_anchor(id: &str) -> Anchor {
        Anchor {
            id: id.to_string(),
            article_id: "article-1".to_string(),
            start_offset: 10,
            end_offset: 18,
            exact_text: "powerful".to_string(),
            prefix_context: "is a ".to_string(),
            suffix_context: " engine".to_string(),
            note_content: None,
            color: HighlightColor::Yellow,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 5, 2, 9, 30, 0).unwrap(),
            start_node_path: None,
            start_node_offset: None,
            end_node_path: None,
            end_node_offset: None,
            text_fingerprint: None,
            schema_version: 1,
        }
    }

    fn sample_v2(id: &str) -> Anchor {
        let mut anchor = sample_anchor(id);
        anchor.start_node_path = Some("/body/p[0]/text()[0]".to_string());
        anchor.start_node_offset = Some(10);
        anchor.end_node_path = Some("/body/p[0]/text()[0]".to_string());
        anchor.end_node_offset = Some(18);
        anchor.text_fingerprint = Some(text_fingerprint("powerful"));
        anchor.schema_version = 2;
        anchor
    }

    #[test]
    fn v1_round_trip_preserves_fields() {
        let anchor = sample_anchor("a1");
        let json = serde_json::to_string(&anchor).unwrap();
        let back: Anchor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, anchor);
        assert_eq!(back.exact_text, anchor.exact_text);
        assert_eq!(back.created_at, anchor.created_at);
        assert_eq!(back.schema_version, 1);
        assert!(!back.has_v2_data());
    }

    #[test]
    fn v2_round_trip_preserves_paths() {
        let anchor = sample_v2("a2");
        let json = serde_json::to_string(&anchor).unwrap();
        let back: Anchor = serde_json::from_str(&json).unwrap();
        assert!(back.has_v2_data());
        assert_eq!(back.start_node_path, anchor.start_node_path);
        assert_eq!(back.end_node_offset, anchor.end_node_offset);
        assert_eq!(back.text_fingerprint, anchor.text_fingerprint);
    }

    #[test]
    fn schema_version_defaults_to_one_when_absent() {
        let json = r#"{
            "id": "a3", "article_id": "art", "start_offset": 0, "end_offset": 4,
            "exact_text": "text", "prefix_context": "", "suffix_context": "",
            "color": "green",
            "created_at": "2024-05-01T12:00:00Z", "updated_at": "2024-05-01T12:00:00Z"
        }"#;
        let anchor: Anchor = serde_json::from_str(json).unwrap();
        assert_eq!(anchor.schema_version, 1);
        assert_eq!(anchor.color, HighlightColor::Green);
        assert!(anchor.note_content.is_none());
    }

    #[test]
    fn partial_v2_data_is_not_v2() {
        let mut anchor = sample_v2("a4");
        anchor.end_node_offset = None;
        assert!(!anchor.has_v2_data());
        assert_eq!(anchor.position(), AnchorPosition::V1);
    }

    #[test]
    fn unknown_color_decodes_to_yellow() {
        assert_eq!(HighlightColor::from_raw("chartreuse"), HighlightColor::Yellow);
        assert_eq!(HighlightColor::from_raw(""), HighlightColor::Yellow);
    }

    #[test]
    fn palette_hex_decodes_to_its_name() {
        assert_eq!(HighlightColor::from_raw("#fff176"), HighlightColor::Yellow);
        assert_eq!(HighlightColor::from_raw("A5D6A7"), HighlightColor::Green);
    }

    #[test]
    fn custom_hex_round_trips() {
        let color = HighlightColor::from_raw("#12ab34");
        assert_eq!(color, HighlightColor::Custom("12AB34".to_string()));
        let json = serde_json::to_string(&color).unwrap();
        let back: HighlightColor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, color);
        assert_eq!(color.rgb(), (0x12, 0xAB, 0x34));
    }

    #[test]
    fn yellow_rgb_matches_palette() {
        assert_eq!(HighlightColor::Yellow.rgb(), (255, 241, 118));
    }

    #[test]
    fn equality_is_by_id_alone() {
        let a = sample_anchor("same");
        let mut b = sample_v2("same");
        b.exact_text = "different".to_string();
        assert_eq!(a, b);

        let mut set = std::collections::HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn fingerprint_normalizes_whitespace() {
        assert_eq!(
            text_fingerprint("a  powerful\n engine"),
            text_fingerprint("a powerful engine")
        );
        assert_ne!(text_fingerprint("alpha"), text_fingerprint("beta"));
    }

    #[test]
    fn fingerprint_match_reporting() {
        let anchor = sample_v2("a5");
        assert_eq!(anchor.fingerprint_matches("powerful"), Some(true));
        assert_eq!(anchor.fingerprint_matches("edited"), Some(false));
        assert_eq!(sample_anchor("a6").fingerprint_matches("powerful"), None);
    }

    #[test]
    fn missing_required_field_is_reported() {
        let json = r#"{ "id": "x" }"#;
        let err = parse_anchors(&format!("[{json}]")).unwrap_err();
        assert!(err.to_string().contains("article_id"), "got: {err}");
    }
}
