//! The engine façade: one `apply` call takes a document and a set of
//! anchors through parse → strip → map → resolve → overlap filter →
//! wrap → serialize.
//!
//! Nothing here is fatal: per-anchor failures surface as orphan ids on the
//! outcome, never as errors. The engine also owns a bounded cache of text
//! maps keyed by article id; cached maps are plain data and answer position
//! queries only (the trees they were built from are gone).

use std::sync::{Arc, Mutex};

use crate::anchor::Anchor;
use crate::applicator;
use crate::dom;
use crate::resolver::{self, ResolvedHighlight};
use crate::text_map::TextMap;

pub const DEFAULT_MARKER_TAG: &str = "html-hl";
pub const DEFAULT_CACHE_CAPACITY: usize = 20;

/// Engine construction parameters.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Tag name for marker elements (a `span` is substituted under `a`
    /// ancestors regardless).
    pub marker_tag: String,
    /// Upper bound on cached text maps.
    pub cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            marker_tag: DEFAULT_MARKER_TAG.to_string(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Per-call options for `Engine::apply`.
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Cache the built text map under this id.
    pub article_id: Option<String>,
    /// Attach the text map to the outcome.
    pub include_text_map: bool,
}

/// Result of one `apply` call.
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    /// Inner HTML of the body after mutation.
    pub html: String,
    /// Number of ranges wrapped (after overlap filtering).
    pub applied: usize,
    /// Ids of anchors no strategy could place, in input order.
    pub orphaned_ids: Vec<String>,
    /// The text map of the stripped input, when requested.
    pub text_map: Option<Arc<TextMap>>,
}

impl ApplyOutcome {
    pub fn orphaned_count(&self) -> usize {
        self.orphaned_ids.len()
    }

    pub fn all_applied(&self) -> bool {
        self.orphaned_ids.is_empty()
    }

    /// Applied plus orphaned. Anchors dropped by the overlap filter join
    /// neither set, so this can undercount the input.
    pub fn total(&self) -> usize {
        self.applied + self.orphaned_ids.len()
    }
}

/// Insertion-ordered bounded cache. When full, the oldest half of the
/// entries is dropped in one sweep.
struct TextMapCache {
    capacity: usize,
    entries: Vec<(String, Arc<TextMap>)>,
}

impl TextMapCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Vec::new(),
        }
    }

    fn get(&self, article_id: &str) -> Option<Arc<TextMap>> {
        self.entries
            .iter()
            .find(|(id, _)| id == article_id)
            .map(|(_, map)| map.clone())
    }

    fn insert(&mut self, article_id: &str, map: Arc<TextMap>) {
        self.entries.retain(|(id, _)| id != article_id);
        if self.entries.len() >= self.capacity {
            let evict = (self.capacity / 2).max(1).min(self.entries.len());
            log::debug!("text map cache full, evicting {evict} oldest entries");
            self.entries.drain(0..evict);
        }
        self.entries.push((article_id.to_string(), map));
    }

    fn remove(&mut self, article_id: &str) {
        self.entries.retain(|(id, _)| id != article_id);
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

/// The durable highlighting engine. `Send + Sync`; the cache is the only
/// shared state and sits behind a mutex.
pub struct Engine {
    config: EngineConfig,
    cache: Mutex<TextMapCache>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let cache = Mutex::new(TextMapCache::new(config.cache_capacity));
        Self { config, cache }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Apply a set of anchors to a document.
    ///
    /// Prior markers are stripped first, so reapplication is idempotent.
    /// Resolution happens independently per anchor against the stripped
    /// projection; overlapping survivors are filtered first-wins and
    /// applied in reverse position order.
    pub fn apply(&self, html: &str, anchors: &[Anchor], options: &ApplyOptions) -> ApplyOutcome {
        if anchors.is_empty() {
            let text_map = options
                .include_text_map
                .then(|| self.build_map(html, options.article_id.as_deref()));
            return ApplyOutcome {
                html: html.to_string(),
                applied: 0,
                orphaned_ids: Vec::new(),
                text_map,
            };
        }

        let body = dom::parse(html);
        dom::remove_highlights(&body, &self.config.marker_tag);
        let map = Arc::new(dom::build_text_map(&body, &self.config.marker_tag));
        if let Some(article_id) = options.article_id.as_deref() {
            self.cache_insert(article_id, map.clone());
        }

        let mut resolved: Vec<(ResolvedHighlight, &Anchor)> = Vec::new();
        let mut orphaned_ids = Vec::new();
        for anchor in anchors {
            match resolver::resolve(anchor, &map) {
                Some(hit) => {
                    log::debug!(
                        "anchor {}: resolved via {} at {}..{} ({:.3})",
                        anchor.id,
                        hit.strategy,
                        hit.start_position,
                        hit.end_position,
                        hit.confidence
                    );
                    resolved.push((hit, anchor));
                }
                None => orphaned_ids.push(anchor.id.clone()),
            }
        }

        let text_map = options.include_text_map.then(|| map.clone());

        if resolved.is_empty() {
            return ApplyOutcome {
                html: dom::inner_html(&body),
                applied: 0,
                orphaned_ids,
                text_map,
            };
        }

        let mut survivors = filter_overlaps(resolved);
        survivors.sort_by(|a, b| b.0.start_position.cmp(&a.0.start_position));

        let applied = survivors.len();
        for (hit, anchor) in &survivors {
            applicator::apply_highlight(&body, &map, hit, anchor, &self.config.marker_tag);
        }

        ApplyOutcome {
            html: dom::inner_html(&body),
            applied,
            orphaned_ids,
            text_map,
        }
    }

    /// Build (and optionally cache) the text map for a document.
    pub fn get_text_map(&self, html: &str, article_id: Option<&str>) -> Arc<TextMap> {
        self.build_map(html, article_id)
    }

    /// The plain-text projection of a document, markers stripped.
    pub fn extract_plain_text(&self, html: &str) -> String {
        let body = dom::parse(html);
        dom::remove_highlights(&body, &self.config.marker_tag);
        dom::build_text_map(&body, &self.config.marker_tag).plain_text
    }

    /// A previously cached text map, if it survived eviction. Position
    /// queries only; the map's tree is not retained.
    pub fn cached_text_map(&self, article_id: &str) -> Option<Arc<TextMap>> {
        self.lock_cache().get(article_id)
    }

    pub fn clear_cache(&self, article_id: &str) {
        self.lock_cache().remove(article_id);
    }

    pub fn clear_all_cache(&self) {
        self.lock_cache().clear();
    }

    fn build_map(&self, html: &str, article_id: Option<&str>) -> Arc<TextMap> {
        let body = dom::parse(html);
        dom::remove_highlights(&body, &self.config.marker_tag);
        let map = Arc::new(dom::build_text_map(&body, &self.config.marker_tag));
        if let Some(article_id) = article_id {
            self.cache_insert(article_id, map.clone());
        }
        map
    }

    fn cache_insert(&self, article_id: &str, map: Arc<TextMap>) {
        self.lock_cache().insert(article_id, map);
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, TextMapCache> {
        self.cache.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Greedy first-wins overlap filter.
///
/// Stable ascending sort by start position, so earlier-listed anchors win
/// identical starts; each subsequent range survives only when it begins at
/// or after the previously kept range's end. Dropped ranges are logged and
/// join neither the applied nor the orphan set.
fn filter_overlaps(
    mut resolved: Vec<(ResolvedHighlight, &Anchor)>,
) -> Vec<(ResolvedHighlight, &Anchor)> {
    resolved.sort_by_key(|(hit, _)| hit.start_position);

    let mut kept: Vec<(ResolvedHighlight, &Anchor)> = Vec::with_capacity(resolved.len());
    let mut next_free = 0;
    for (hit, anchor) in resolved {
        if kept.is_empty() || hit.start_position >= next_free {
            next_free = hit.end_position;
            kept.push((hit, anchor));
        } else {
            log::debug!("anchor {}: dropped by overlap filter", hit.anchor_id);
        }
    }
    kept
}
