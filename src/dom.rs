//! DOM processing: parse HTML, strip prior markers, normalize text nodes,
//! project the tree to plain text, and serialize back.
//!
//! Everything operates under the body element. The plain-text projection
//! concatenates non-whitespace text nodes in document order and inserts a
//! single `'\n'` at block boundaries, so resolution context stays meaningful
//! across paragraphs without inflating offsets.

use kuchikiki::traits::TendrilSink;
use kuchikiki::NodeRef;

use crate::node_path::NodePath;
use crate::text_map::{TextMap, TextNodeRecord};

/// Elements that terminate an inline run in the plain-text projection.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "li",
    "blockquote", "pre", "hr", "br", "table", "thead", "tbody", "tr", "td",
    "th", "article", "section", "header", "footer", "nav", "aside", "figure",
    "figcaption", "address", "dd", "dt", "dl",
];

pub(crate) fn is_whitespace_only(text: &str) -> bool {
    text.trim().is_empty()
}

fn is_block_tag(tag: &str) -> bool {
    BLOCK_TAGS.contains(&tag)
}

/// Parse an HTML fragment or document and return its body element.
///
/// html5ever repairs malformed input and always builds an html/head/body
/// scaffold; the document root is the fallback for exotic trees without one.
pub fn parse(html: &str) -> NodeRef {
    let document = kuchikiki::parse_html().one(html);
    document
        .select_first("body")
        .map(|body| body.as_node().clone())
        .unwrap_or(document)
}

/// Build the plain-text projection and text-node index for a tree.
///
/// Subtrees rooted at `script`, `style`, or the marker tag are skipped
/// entirely. Whitespace-only text nodes stay in the tree but are not
/// addressable as highlightable content.
pub fn build_text_map(root: &NodeRef, marker_tag: &str) -> TextMap {
    let mut plain_text = String::new();
    let mut records = Vec::new();
    collect_text(root, root, marker_tag, &mut plain_text, &mut records);
    TextMap::new(plain_text, records)
}

fn collect_text(
    node: &NodeRef,
    body: &NodeRef,
    marker_tag: &str,
    buffer: &mut String,
    records: &mut Vec<TextNodeRecord>,
) {
    for child in node.children() {
        if let Some(element) = child.as_element() {
            let tag = element.name.local.to_string();
            if tag == "script" || tag == "style" || tag.eq_ignore_ascii_case(marker_tag) {
                continue;
            }
            if is_block_tag(&tag) {
                push_block_separator(buffer);
                collect_text(&child, body, marker_tag, buffer, records);
                push_block_separator(buffer);
            } else {
                collect_text(&child, body, marker_tag, buffer, records);
            }
            continue;
        }

        let Some(text) = child.as_text() else {
            continue;
        };
        let content = text.borrow().to_string();
        if is_whitespace_only(&content) {
            continue;
        }
        let Some(path) = NodePath::encode(&child, body) else {
            continue;
        };

        let start = buffer.len();
        buffer.push_str(&content);
        records.push(TextNodeRecord {
            path,
            plain_text_start: start,
            plain_text_end: buffer.len(),
            text: content,
        });
    }
}

/// Append a block separator, collapsing runs: at most one `'\n'` between
/// adjacent text runs, never one at the very start.
fn push_block_separator(buffer: &mut String) {
    if !buffer.is_empty() && !buffer.ends_with('\n') {
        buffer.push('\n');
    }
}

/// Unwrap every prior highlight marker and re-normalize text nodes.
///
/// Collects the marker tag plus the legacy `span[data-hl-id]` form, then
/// unwraps each in document order: children move into the parent at the
/// marker's position, the empty marker is removed. Normalization afterwards
/// restores the no-adjacent-text-nodes invariant that stable paths and
/// idempotent application depend on.
pub fn remove_highlights(root: &NodeRef, marker_tag: &str) {
    // Collect before mutating; detaching during traversal would skip nodes.
    let mut markers = Vec::new();
    for node in root.inclusive_descendants() {
        let Some(element) = node.as_element() else {
            continue;
        };
        let tag = element.name.local.as_ref();
        let is_marker = tag.eq_ignore_ascii_case(marker_tag)
            || (tag == "span" && element.attributes.borrow().contains("data-hl-id"));
        if is_marker {
            markers.push(node.clone());
        }
    }

    for marker in markers {
        let children: Vec<NodeRef> = marker.children().collect();
        for child in children {
            marker.insert_before(child);
        }
        marker.detach();
    }

    normalize_text_nodes(root);
}

/// Merge adjacent text siblings, recursively: the first node absorbs the
/// second's text and the second is removed.
pub fn normalize_text_nodes(root: &NodeRef) {
    let children: Vec<NodeRef> = root.children().collect();
    let mut previous: Option<NodeRef> = None;

    for child in children {
        if child.as_text().is_none() {
            normalize_text_nodes(&child);
            previous = None;
            continue;
        }
        match &previous {
            Some(prev) => {
                merge_text_into(prev, &child);
                child.detach();
            }
            None => previous = Some(child),
        }
    }
}

fn merge_text_into(first: &NodeRef, second: &NodeRef) {
    let (Some(first_text), Some(second_text)) = (first.as_text(), second.as_text()) else {
        return;
    };
    let addition = second_text.borrow().to_string();
    first_text.borrow_mut().push_str(&addition);
}

/// Inner HTML of `root`: the concatenated serialization of its children,
/// not the root element itself (root is body).
pub fn inner_html(root: &NodeRef) -> String {
    let mut buffer = Vec::new();
    for child in root.children() {
        if child.serialize(&mut buffer).is_err() {
            return String::new();
        }
    }
    String::from_utf8(buffer).unwrap_or_default()
}
