//! Wrap resolved ranges in marker elements.
//!
//! The applicator splits text nodes around the matched span and inserts a
//! wrapper element holding the middle piece. Ranges spanning several text
//! nodes are wrapped node by node in reverse document order, so earlier
//! wrappings never shift the positions of nodes still waiting their turn.

use kuchikiki::{Attribute, ExpandedName, NodeRef};
use markup5ever::{namespace_url, ns, LocalName, QualName};

use crate::anchor::Anchor;
use crate::resolver::ResolvedHighlight;
use crate::text_map::{TextMap, TextNodeRecord};

/// Wrap one resolved range in the live tree.
///
/// Node paths are re-resolved against `body` at wrap time; a path that has
/// gone stale mid-application (which would indicate a traversal bug, not
/// document drift) is skipped and logged rather than panicking.
pub fn apply_highlight(
    body: &NodeRef,
    map: &TextMap,
    highlight: &ResolvedHighlight,
    anchor: &Anchor,
    marker_tag: &str,
) {
    let affected = map.get_nodes_in_range(highlight.start_position, highlight.end_position);
    let Some(last_index) = affected.len().checked_sub(1) else {
        log::debug!("anchor {}: resolved range covers no text nodes", anchor.id);
        return;
    };

    // Reverse document order keeps earlier records' positions valid while
    // later siblings are split and re-parented.
    for (index, record) in affected.iter().enumerate().rev() {
        // saturating_sub: a range may begin inside a block-separator gap
        // just before this record, in which case the wrap starts at 0.
        let local_start = if index == 0 {
            highlight.start_position.saturating_sub(record.plain_text_start)
        } else {
            0
        };
        let local_end = if index == last_index {
            highlight.end_position.saturating_sub(record.plain_text_start)
        } else {
            record.text.len()
        };
        wrap_span_in_node(body, record, local_start, local_end, anchor, marker_tag);
    }
}

/// Split one text node into before / middle / after and wrap the middle.
fn wrap_span_in_node(
    body: &NodeRef,
    record: &TextNodeRecord,
    local_start: usize,
    local_end: usize,
    anchor: &Anchor,
    marker_tag: &str,
) {
    let Some(node) = record.path.resolve(body) else {
        log::debug!("anchor {}: path {} stale during apply", anchor.id, record.path);
        return;
    };
    let Some(text_cell) = node.as_text() else {
        return;
    };
    let text = text_cell.borrow().to_string();

    // Offsets are recomputed against the node's current text.
    let local_start = floor_char_boundary(&text, local_start);
    let local_end = floor_char_boundary(&text, local_end);
    if local_start >= local_end {
        log::debug!("anchor {}: degenerate span after clamping, skipped", anchor.id);
        return;
    }

    let before = &text[..local_start];
    let middle = &text[local_start..local_end];
    let after = &text[local_end..];

    let wrapper = build_wrapper(&node, anchor, marker_tag);
    wrapper.append(NodeRef::new_text(middle));

    if !before.is_empty() {
        node.insert_before(NodeRef::new_text(before));
    }
    node.insert_before(wrapper);
    if !after.is_empty() {
        node.insert_before(NodeRef::new_text(after));
    }
    node.detach();
}

/// Build the marker element for a text node's context.
///
/// Nested anchors are invalid HTML, so under an `a` ancestor the wrapper is
/// a `span`. Inside `pre`/`code` the style drops the radius and padding and
/// lowers the opacity so block layout is not disturbed.
fn build_wrapper(text_node: &NodeRef, anchor: &Anchor, marker_tag: &str) -> NodeRef {
    let tag = if has_ancestor(text_node, &["a"]) {
        "span"
    } else {
        marker_tag
    };
    let style = marker_style(anchor, has_ancestor(text_node, &["pre", "code"]));

    NodeRef::new_element(
        QualName::new(None, ns!(html), LocalName::from(tag)),
        [
            (
                ExpandedName::new("", "data-hl-id"),
                Attribute {
                    prefix: None,
                    value: anchor.id.clone(),
                },
            ),
            (
                ExpandedName::new("", "style"),
                Attribute {
                    prefix: None,
                    value: style,
                },
            ),
        ],
    )
}

fn has_ancestor(node: &NodeRef, tags: &[&str]) -> bool {
    node.ancestors().any(|ancestor| {
        ancestor
            .as_element()
            .map_or(false, |e| tags.iter().any(|t| e.name.local.as_ref().eq_ignore_ascii_case(t)))
    })
}

/// The two CSS templates, with integer RGB components and literal opacities.
fn marker_style(anchor: &Anchor, code_context: bool) -> String {
    let (r, g, b) = anchor.color.rgb();
    if code_context {
        format!("background-color:rgba({r},{g},{b},0.3);")
    } else {
        format!("background-color:rgba({r},{g},{b},0.4);border-radius:2px;padding:0 2px;")
    }
}

fn floor_char_boundary(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while offset > 0 && !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}
