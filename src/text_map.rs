//! The bidirectional map between a document's text nodes and its plain-text
//! projection.
//!
//! Built once per document by the DOM processor and consumed by the resolver
//! and applicator. Records hold node *paths* rather than live node
//! references, so a map is plain data: a cached copy answers position
//! queries safely long after the tree it was built from is gone.

use std::collections::HashMap;

use crate::node_path::NodePath;

/// One non-whitespace text node and its span in the plain-text projection.
#[derive(Debug, Clone)]
pub struct TextNodeRecord {
    /// Address of the node under body.
    pub path: NodePath,
    /// Start offset into `plain_text` (inclusive).
    pub plain_text_start: usize,
    /// End offset into `plain_text` (exclusive).
    pub plain_text_end: usize,
    /// The node's literal text, unchanged from source.
    pub text: String,
}

impl TextNodeRecord {
    /// Whether this record's span intersects the half-open range `[start, end)`.
    pub fn intersects(&self, start: usize, end: usize) -> bool {
        self.plain_text_start < end && self.plain_text_end > start
    }
}

/// Plain text plus ordered text-node records, indexed by path.
///
/// Invariant: for each record, `plain_text[start..end] == record.text`, and
/// records are in increasing, non-overlapping order with possible gaps where
/// block boundaries inserted `'\n'` separators.
#[derive(Debug, Clone, Default)]
pub struct TextMap {
    pub plain_text: String,
    text_nodes: Vec<TextNodeRecord>,
    by_path: HashMap<String, usize>,
}

impl TextMap {
    pub(crate) fn new(plain_text: String, text_nodes: Vec<TextNodeRecord>) -> Self {
        let mut by_path = HashMap::with_capacity(text_nodes.len());
        for (idx, record) in text_nodes.iter().enumerate() {
            debug_assert_eq!(
                &plain_text[record.plain_text_start..record.plain_text_end],
                record.text,
                "record text out of sync with projection"
            );
            by_path.insert(record.path.to_string(), idx);
        }
        Self {
            plain_text,
            text_nodes,
            by_path,
        }
    }

    /// All records in document order.
    pub fn text_nodes(&self) -> &[TextNodeRecord] {
        &self.text_nodes
    }

    /// Constant-time lookup by path string.
    pub fn get_node_by_path(&self, path: &str) -> Option<&TextNodeRecord> {
        self.by_path.get(path).map(|&idx| &self.text_nodes[idx])
    }

    /// The record whose `[start, end)` span contains `position`.
    pub fn find_node_at_position(&self, position: usize) -> Option<&TextNodeRecord> {
        self.text_nodes
            .iter()
            .find(|r| r.plain_text_start <= position && position < r.plain_text_end)
    }

    /// All records intersecting `[start, end)`, in document order.
    ///
    /// Records are ordered and non-overlapping, so the result is a
    /// contiguous run.
    pub fn get_nodes_in_range(&self, start: usize, end: usize) -> &[TextNodeRecord] {
        let lo = self
            .text_nodes
            .partition_point(|r| r.plain_text_end <= start);
        let hi = self.text_nodes.partition_point(|r| r.plain_text_start < end);
        if lo >= hi {
            return &[];
        }
        &self.text_nodes[lo..hi]
    }

    /// Map a plain-text position to `(record, local offset)`.
    pub fn plain_text_to_dom(&self, position: usize) -> Option<(&TextNodeRecord, usize)> {
        let record = self.find_node_at_position(position)?;
        Some((record, position - record.plain_text_start))
    }

    /// Map `(path, local offset)` back to a plain-text position.
    pub fn dom_to_plain_text(&self, path: &str, offset: usize) -> Option<usize> {
        let record = self.get_node_by_path(path)?;
        if offset > record.text.len() {
            return None;
        }
        Some(record.plain_text_start + offset)
    }
}
