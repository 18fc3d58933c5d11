//! XPath-like addresses for text nodes under the body element.
//!
//! A path is a sequence of segments from body down to a target node, e.g.
//! `/body/div[0]/p[2]/text()[1]`. Indices count like-kind siblings only:
//! element segments count prior siblings with the same tag, text segments
//! count prior non-whitespace-only text siblings, so insignificant
//! whitespace cannot shift an index.

use std::fmt;
use std::sync::OnceLock;

use kuchikiki::NodeRef;
use regex::Regex;

use crate::dom;
use crate::error::Error;

/// One step of a node path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// An element child, counted among same-tag siblings.
    Element { tag: String, index: usize },
    /// A text child, counted among non-whitespace-only text siblings.
    Text { index: usize },
}

/// A deterministic address for a node relative to the body element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodePath {
    segments: Vec<PathSegment>,
}

fn text_segment_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^text\(\)(?:\[(\d+)\])?$").expect("static pattern"))
}

fn element_segment_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z][A-Za-z0-9-]*)(?:\[(\d+)\])?$").expect("static pattern"))
}

impl NodePath {
    /// Parse a path from its string form.
    ///
    /// Empty parts and a leading `body` part are discarded; a missing index
    /// defaults to 0.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidNodePath` when any part matches neither the
    /// `text()[i]` nor the `tag[i]` grammar.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let mut segments = Vec::new();

        for (pos, part) in raw.split('/').filter(|p| !p.is_empty()).enumerate() {
            if pos == 0 && part.eq_ignore_ascii_case("body") {
                continue;
            }
            segments.push(parse_segment(part, raw)?);
        }

        return Ok(Self { segments });
    }

    /// Encode the path of `node` by walking parents up to `body`.
    ///
    /// Returns `None` when `node` is not a descendant of `body` or when a
    /// step is not addressable (comments, the body itself).
    pub fn encode(node: &NodeRef, body: &NodeRef) -> Option<Self> {
        let mut segments = Vec::new();
        let mut current = node.clone();

        while current != *body {
            let parent = current.parent()?;
            segments.push(segment_within_parent(&current, &parent)?);
            current = parent;
        }

        segments.reverse();
        Some(Self { segments })
    }

    /// Walk from `root`, selecting the nth like-kind child per segment.
    /// Returns `None` as soon as a segment cannot be satisfied.
    pub fn resolve(&self, root: &NodeRef) -> Option<NodeRef> {
        let mut current = root.clone();
        for segment in &self.segments {
            current = match segment {
                PathSegment::Element { tag, index } => {
                    nth_element_child(&current, tag, *index)?
                }
                PathSegment::Text { index } => nth_text_child(&current, *index)?,
            };
        }
        Some(current)
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("/body")?;
        for segment in &self.segments {
            match segment {
                PathSegment::Element { tag, index } => write!(f, "/{tag}[{index}]")?,
                PathSegment::Text { index } => write!(f, "/text()[{index}]")?,
            }
        }
        Ok(())
    }
}

/// Parse one `/`-separated part into a segment.
///
/// # Errors
///
/// Returns `Error::InvalidNodePath` carrying the full original path.
fn parse_segment(part: &str, raw: &str) -> Result<PathSegment, Error> {
    if let Some(cap) = text_segment_pattern().captures(part) {
        let index = cap
            .get(1)
            .map_or(0, |m| m.as_str().parse::<usize>().unwrap_or(0));
        return Ok(PathSegment::Text { index });
    }

    if let Some(cap) = element_segment_pattern().captures(part) {
        let tag = cap[1].to_ascii_lowercase();
        let index = cap
            .get(2)
            .map_or(0, |m| m.as_str().parse::<usize>().unwrap_or(0));
        return Ok(PathSegment::Element { tag, index });
    }

    return Err(Error::InvalidNodePath {
        path: raw.to_string(),
    });
}

/// Compute the segment for `node` relative to `parent` under the like-kind
/// counting rules.
fn segment_within_parent(node: &NodeRef, parent: &NodeRef) -> Option<PathSegment> {
    if let Some(text) = node.as_text() {
        if dom::is_whitespace_only(&text.borrow()) {
            // Whitespace-only text nodes are not addressable.
            return None;
        }
        let mut index = 0;
        for sibling in parent.children() {
            if sibling == *node {
                return Some(PathSegment::Text { index });
            }
            if let Some(t) = sibling.as_text() {
                if !dom::is_whitespace_only(&t.borrow()) {
                    index += 1;
                }
            }
        }
        return None;
    }

    if let Some(element) = node.as_element() {
        let tag = element.name.local.to_string();
        let mut index = 0;
        for sibling in parent.children() {
            if sibling == *node {
                return Some(PathSegment::Element { tag, index });
            }
            if let Some(e) = sibling.as_element() {
                if e.name.local.as_ref().eq_ignore_ascii_case(&tag) {
                    index += 1;
                }
            }
        }
        return None;
    }

    None
}

/// The `index`-th element child whose tag matches, ASCII case-insensitive.
fn nth_element_child(parent: &NodeRef, tag: &str, index: usize) -> Option<NodeRef> {
    let mut seen = 0;
    for child in parent.children() {
        let Some(element) = child.as_element() else {
            continue;
        };
        if !element.name.local.as_ref().eq_ignore_ascii_case(tag) {
            continue;
        }
        if seen == index {
            return Some(child);
        }
        seen += 1;
    }
    None
}

/// The `index`-th non-whitespace-only text child.
fn nth_text_child(parent: &NodeRef, index: usize) -> Option<NodeRef> {
    let mut seen = 0;
    for child in parent.children() {
        let Some(text) = child.as_text() else {
            continue;
        };
        if dom::is_whitespace_only(&text.borrow()) {
            continue;
        }
        if seen == index {
            return Some(child);
        }
        seen += 1;
    }
    None
}
