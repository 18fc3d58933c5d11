//! Anchor resolution: turn a stored anchor into a plain-text range.
//!
//! Three strategies run in a fixed order, each with its own acceptance
//! threshold. The thresholds are calibrated independently and are never
//! merged into a single scoring function. A `None` result is the orphan
//! case: no strategy met its threshold in the current document.

use std::fmt;

use crate::anchor::{Anchor, AnchorPosition};
use crate::node_path::NodePath;
use crate::similarity::similarity;
use crate::text_map::TextMap;

/// How a resolved range was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    DomPath,
    TextPosition,
    ContextSearch,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DomPath => "dom_path",
            Self::TextPosition => "text_position",
            Self::ContextSearch => "context_search",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successfully resolved anchor: a half-open range into the plain text.
#[derive(Debug, Clone)]
pub struct ResolvedHighlight {
    pub anchor_id: String,
    pub start_position: usize,
    pub end_position: usize,
    pub strategy: Strategy,
    pub confidence: f64,
}

/// Acceptance thresholds, per strategy.
const DOM_PATH_ACCEPT: f64 = 0.9;
const TEXT_POSITION_ACCEPT: f64 = 0.7;
const CONTEXT_SEARCH_ACCEPT: f64 = 0.5;

/// Inner gates within individual strategies.
const DOM_PATH_TEXT_SIMILARITY: f64 = 0.7;
const WINDOW_TEXT_SIMILARITY: f64 = 0.7;
const TEXT_WEIGHT: f64 = 0.6;
const CONTEXT_WEIGHT: f64 = 0.4;

/// Resolve one anchor against a text map.
///
/// Strategies are tried in order; the first result meeting its acceptance
/// threshold wins. Sub-threshold results fall through: a borderline
/// dom-path match (similarity in [0.7, 0.9)) is re-attempted by the text
/// strategies rather than accepted.
pub fn resolve(anchor: &Anchor, map: &TextMap) -> Option<ResolvedHighlight> {
    if let Some(hit) = resolve_via_dom_path(anchor, map) {
        if hit.confidence >= DOM_PATH_ACCEPT {
            return Some(hit);
        }
        log::debug!(
            "anchor {}: dom_path confidence {:.3} below acceptance, falling through",
            anchor.id,
            hit.confidence
        );
    }

    if let Some(hit) = resolve_via_text_position(anchor, map) {
        if hit.confidence >= TEXT_POSITION_ACCEPT {
            return Some(hit);
        }
    }

    if let Some(hit) = resolve_via_context_search(anchor, map) {
        if hit.confidence >= CONTEXT_SEARCH_ACCEPT {
            return Some(hit);
        }
    }

    None
}

// ── Strategy A: DOM path ──────────────────────────────────────────────

/// Recompute the range from stored node paths and in-node offsets.
///
/// Requires full v2 data. Aborts when either path is stale, the candidate
/// range is empty or out of bounds, or the stored offsets land inside a
/// multi-byte character (untrusted persisted integers).
fn resolve_via_dom_path(anchor: &Anchor, map: &TextMap) -> Option<ResolvedHighlight> {
    let AnchorPosition::V2 {
        start_path,
        start_node_offset,
        end_path,
        end_node_offset,
    } = anchor.position()
    else {
        return None;
    };

    // Stored paths may omit explicit [0] indices; parse canonicalizes them
    // to match the map's keys.
    let start_key = NodePath::parse(start_path).ok()?.to_string();
    let end_key = NodePath::parse(end_path).ok()?.to_string();
    let start_record = map.get_node_by_path(&start_key)?;
    let end_record = map.get_node_by_path(&end_key)?;

    let start = start_record.plain_text_start.checked_add(start_node_offset)?;
    let end = end_record.plain_text_start.checked_add(end_node_offset)?;
    if start >= end || end > map.plain_text.len() {
        return None;
    }
    if !map.plain_text.is_char_boundary(start) || !map.plain_text.is_char_boundary(end) {
        return None;
    }

    let candidate = &map.plain_text[start..end];
    let score = similarity(candidate, &anchor.exact_text);
    if score < DOM_PATH_TEXT_SIMILARITY {
        return None;
    }

    if anchor.fingerprint_matches(candidate) == Some(false) {
        log::debug!("anchor {}: fingerprint drift on dom_path candidate", anchor.id);
    }

    Some(ResolvedHighlight {
        anchor_id: anchor.id.clone(),
        start_position: start,
        end_position: end,
        strategy: Strategy::DomPath,
        confidence: score,
    })
}

// ── Strategy B: text position ─────────────────────────────────────────

/// First-occurrence pattern matching, strongest pattern first.
fn resolve_via_text_position(anchor: &Anchor, map: &TextMap) -> Option<ResolvedHighlight> {
    let exact = anchor.exact_text.as_str();
    if exact.is_empty() {
        return None;
    }
    let plain = map.plain_text.as_str();
    let prefix = anchor.prefix_context.as_str();
    let suffix = anchor.suffix_context.as_str();

    let hit = |start: usize, confidence: f64| ResolvedHighlight {
        anchor_id: anchor.id.clone(),
        start_position: start,
        end_position: start + exact.len(),
        strategy: Strategy::TextPosition,
        confidence,
    };

    if let Some(idx) = plain.find(&format!("{prefix}{exact}{suffix}")) {
        return Some(hit(idx + prefix.len(), 1.0));
    }
    if !prefix.is_empty() {
        if let Some(idx) = plain.find(&format!("{prefix}{exact}")) {
            return Some(hit(idx + prefix.len(), 0.9));
        }
    }
    if !suffix.is_empty() {
        if let Some(idx) = plain.find(&format!("{exact}{suffix}")) {
            return Some(hit(idx, 0.9));
        }
    }

    let occurrences: Vec<usize> = plain.match_indices(exact).map(|(idx, _)| idx).collect();
    match occurrences.as_slice() {
        [] => None,
        [only] => Some(hit(*only, 0.8)),
        many => {
            // Legacy v1 offset as a locality hint; ties go to the earlier
            // occurrence (min_by_key keeps the first minimum).
            let hint = anchor.start_offset;
            let nearest = many
                .iter()
                .copied()
                .min_by_key(|&pos| (pos as i64).saturating_sub(hint).abs())?;
            Some(hit(nearest, 0.7))
        }
    }
}

// ── Strategy C: context search ────────────────────────────────────────

/// Fuzzy sliding window, then a whitespace-normalized rescan.
fn resolve_via_context_search(anchor: &Anchor, map: &TextMap) -> Option<ResolvedHighlight> {
    let exact = anchor.exact_text.as_str();
    if exact.is_empty() {
        return None;
    }
    let plain = map.plain_text.as_str();
    let prefix = anchor.prefix_context.as_str();
    let suffix = anchor.suffix_context.as_str();

    if let Some((start, score)) = best_window(plain, exact, prefix, suffix) {
        // The range spans the exact-text length from the window start,
        // clamped to the document and snapped to a char boundary.
        let end = floor_char_boundary(plain, start.saturating_add(exact.len()));
        if score >= CONTEXT_SEARCH_ACCEPT && start < end {
            return Some(ResolvedHighlight {
                anchor_id: anchor.id.clone(),
                start_position: start,
                end_position: end,
                strategy: Strategy::ContextSearch,
                confidence: score,
            });
        }
    }

    // Whitespace-normalized rescan. The winning offset comes from the
    // collapsed text but the range still spans the raw exact-text length
    // (preserved source behavior; see DESIGN.md).
    let norm_plain = normalize_whitespace(plain);
    let norm_exact = normalize_whitespace(exact);
    let norm_prefix = normalize_whitespace(prefix);
    let norm_suffix = normalize_whitespace(suffix);
    if norm_exact.is_empty() {
        return None;
    }

    let (start, score) = best_window(&norm_plain, &norm_exact, &norm_prefix, &norm_suffix)?;
    if score < CONTEXT_SEARCH_ACCEPT {
        return None;
    }

    let start = floor_char_boundary(plain, start);
    let end = floor_char_boundary(plain, start.saturating_add(exact.len()));
    if start >= end {
        return None;
    }
    Some(ResolvedHighlight {
        anchor_id: anchor.id.clone(),
        start_position: start,
        end_position: end,
        strategy: Strategy::ContextSearch,
        confidence: score,
    })
}

/// Slide a needle-sized window over the haystack; score each candidate as
/// `0.6 * window similarity + 0.4 * context similarity` and keep the best.
///
/// Windows below the text-similarity gate are skipped before their context
/// is scored. Context windows clamp to the document edges. Returns the best
/// `(byte offset, total score)`; the earliest window wins ties.
fn best_window(haystack: &str, needle: &str, prefix: &str, suffix: &str) -> Option<(usize, f64)> {
    let hay: Vec<(usize, char)> = haystack.char_indices().collect();
    let needle_len = needle.chars().count();
    if needle_len == 0 || hay.len() < needle_len {
        return None;
    }
    let prefix_len = prefix.chars().count();
    let suffix_len = suffix.chars().count();

    let byte_at = |char_idx: usize| -> usize {
        if char_idx >= hay.len() {
            haystack.len()
        } else {
            hay[char_idx].0
        }
    };

    let mut best: Option<(usize, f64)> = None;
    for i in 0..=(hay.len() - needle_len) {
        let window_start = byte_at(i);
        let window_end = byte_at(i + needle_len);
        let window = &haystack[window_start..window_end];

        let text_sim = similarity(window, needle);
        if text_sim < WINDOW_TEXT_SIMILARITY {
            continue;
        }

        let before = &haystack[byte_at(i.saturating_sub(prefix_len))..window_start];
        let after = &haystack[window_end..byte_at(i + needle_len + suffix_len)];
        let context = (similarity(before, prefix) + similarity(after, suffix)) / 2.0;

        let total = TEXT_WEIGHT * text_sim + CONTEXT_WEIGHT * context;
        if best.map_or(true, |(_, score)| total > score) {
            best = Some((window_start, total));
        }
    }
    best
}

/// Collapse whitespace runs to single ASCII spaces and trim the ends.
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Clamp to the string and back off to the nearest char boundary.
fn floor_char_boundary(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while offset > 0 && !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::HighlightColor;
    use crate::dom;
    use chrono::{TimeZone, Utc};

    fn map_of(html: &str) -> TextMap {
        dom::build_text_map(&dom::parse(html), "html-hl")
    }

    fn anchor(exact: &str, prefix: &str, suffix: &str) -> Anchor {
        Anchor {
            id: "a1".to_string(),
            article_id: "art".to_string(),
            start_offset: 0,
            end_offset: exact.len() as i64,
            exact_text: exact.to_string(),
            prefix_context: prefix.to_string(),
            suffix_context: suffix.to_string(),
            note_content: None,
            color: HighlightColor::Yellow,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            start_node_path: None,
            start_node_offset: None,
            end_node_path: None,
            end_node_offset: None,
            text_fingerprint: None,
            schema_version: 1,
        }
    }

    fn with_v2(mut a: Anchor, path: &str, start: usize, end: usize) -> Anchor {
        a.start_node_path = Some(path.to_string());
        a.start_node_offset = Some(start);
        a.end_node_path = Some(path.to_string());
        a.end_node_offset = Some(end);
        a.schema_version = 2;
        a
    }

    #[test]
    fn dom_path_wins_on_exact_match() {
        let map = map_of("<p>This is a powerful engine.</p>");
        let a = with_v2(
            anchor("powerful", "is a ", " engine"),
            "/body/p[0]/text()[0]",
            10,
            18,
        );
        let hit = resolve(&a, &map).unwrap();
        assert_eq!(hit.strategy, Strategy::DomPath);
        assert_eq!(hit.confidence, 1.0);
        assert_eq!(&map.plain_text[hit.start_position..hit.end_position], "powerful");
    }

    #[test]
    fn dom_path_accepts_unindexed_path_form() {
        let map = map_of("<p>This is a powerful engine.</p>");
        let a = with_v2(anchor("powerful", "is a ", " engine"), "/body/p/text()", 10, 18);
        let hit = resolve(&a, &map).unwrap();
        assert_eq!(hit.strategy, Strategy::DomPath);
    }

    #[test]
    fn stale_path_falls_through_to_text_position() {
        let map = map_of("<p>This is a powerful engine.</p>");
        let a = with_v2(
            anchor("powerful", "is a ", " engine"),
            "/body/div[3]/text()[0]",
            10,
            18,
        );
        let hit = resolve(&a, &map).unwrap();
        assert_eq!(hit.strategy, Strategy::TextPosition);
        assert_eq!(hit.confidence, 1.0);
    }

    #[test]
    fn borderline_dom_path_similarity_falls_through() {
        // The document gained a two-character prefix, so the stored offsets
        // cover a drifted range whose similarity lands between the inner
        // gate (0.7) and acceptance (0.9); the text strategy takes over.
        let map = map_of("<p>xx This is a powerful engine.</p>");
        let a = with_v2(
            anchor("powerful", "is a ", " engine"),
            "/body/p[0]/text()[0]",
            12,
            20,
        );
        let drift = similarity(&map.plain_text[12..20], "powerful");
        assert!((0.7..0.9).contains(&drift), "fixture drift {drift}");

        let hit = resolve(&a, &map).unwrap();
        assert_eq!(hit.strategy, Strategy::TextPosition);
        assert_eq!(&map.plain_text[hit.start_position..hit.end_position], "powerful");
    }

    #[test]
    fn full_context_match_is_confidence_one() {
        let map = map_of("<p>Alpha beta gamma.</p>");
        let hit = resolve(&anchor("beta", "Alpha ", " gamma"), &map).unwrap();
        assert_eq!(hit.confidence, 1.0);
        assert_eq!(hit.strategy, Strategy::TextPosition);
    }

    #[test]
    fn prefix_only_match_scores_point_nine() {
        let map = map_of("<p>Alpha beta gamma.</p>");
        let hit = resolve(&anchor("beta", "Alpha ", " DELTA"), &map).unwrap();
        assert_eq!(hit.confidence, 0.9);
        assert_eq!(&map.plain_text[hit.start_position..hit.end_position], "beta");
    }

    #[test]
    fn suffix_only_match_scores_point_nine() {
        let map = map_of("<p>Alpha beta gamma.</p>");
        let hit = resolve(&anchor("beta", "WRONG ", " gamma"), &map).unwrap();
        assert_eq!(hit.confidence, 0.9);
    }

    #[test]
    fn unique_exact_match_scores_point_eight() {
        let map = map_of("<p>Alpha beta gamma.</p>");
        let hit = resolve(&anchor("beta", "WRONG ", " WRONG"), &map).unwrap();
        assert_eq!(hit.confidence, 0.8);
    }

    #[test]
    fn ambiguous_exact_uses_locality_hint() {
        let map = map_of("<p>token filler filler token tail.</p>");
        let mut a = anchor("token", "NOPE", "NOPE");
        a.start_offset = 20; // the second occurrence starts here
        let hit = resolve(&a, &map).unwrap();
        assert_eq!(hit.confidence, 0.7);
        assert_eq!(hit.start_position, 20);
    }

    #[test]
    fn ambiguous_tie_breaks_toward_earlier_position() {
        // Hint equidistant from both occurrences: the first one wins.
        let map = map_of("<p>ab  ab</p>");
        let mut a = anchor("ab", "NOPE", "NOPE");
        a.start_offset = 2;
        let hit = resolve(&a, &map).unwrap();
        assert_eq!(hit.start_position, 0);
    }

    #[test]
    fn context_search_recovers_from_typos() {
        let map = map_of("<p>This is a powerfol engine indeed.</p>");
        let hit = resolve(&anchor("powerful", "is a ", " engine"), &map).unwrap();
        assert_eq!(hit.strategy, Strategy::ContextSearch);
        assert!(hit.confidence >= 0.5);
        assert_eq!(hit.start_position, 10);
    }

    #[test]
    fn normalized_fallback_handles_whitespace_drift() {
        // Heavy whitespace drift: every raw window fails the 0.7 text gate,
        // so the collapsed rescan finds the needle. The winning offset comes
        // from the normalized text while the range spans the raw needle
        // length (the preserved source quirk).
        let map = map_of("<p>an   odd     gap     here</p>");
        let hit = resolve(&anchor("odd gap here", "an ", ""), &map).unwrap();
        assert_eq!(hit.strategy, Strategy::ContextSearch);
        assert_eq!(hit.start_position, 3);
        assert_eq!(hit.end_position, 15);
    }

    #[test]
    fn unresolvable_anchor_is_none() {
        let map = map_of("<p>Nothing matches here.</p>");
        assert!(resolve(&anchor("zzz_missing", "", ""), &map).is_none());
    }

    #[test]
    fn empty_exact_text_is_none() {
        let map = map_of("<p>content</p>");
        assert!(resolve(&anchor("", "", ""), &map).is_none());
    }
}
