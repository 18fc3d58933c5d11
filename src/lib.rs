//! Durable HTML highlights that survive document edits.
//!
//! Given an HTML document and a set of stored highlight anchors, the engine
//! re-locates each anchor in the (possibly edited) document and wraps the
//! matched text in marker elements, reporting the anchors it could not
//! place. Resolution cascades through three strategies: stored node paths,
//! exact text with context, and a fuzzy context search.
//!
//! ```no_run
//! use hlmark::{Engine, ApplyOptions};
//!
//! let engine = Engine::default();
//! let anchors = hlmark::anchor::parse_anchors(r#"[]"#).unwrap();
//! let outcome = engine.apply("<p>Hello</p>", &anchors, &ApplyOptions::default());
//! assert!(outcome.all_applied());
//! ```

pub mod anchor;
pub mod applicator;
pub mod commands;
pub mod config;
pub mod diagnostics;
pub mod dom;
pub mod engine;
pub mod error;
pub mod node_path;
pub mod resolver;
pub mod similarity;
pub mod text_map;

pub use anchor::{Anchor, AnchorPosition, HighlightColor};
pub use engine::{ApplyOptions, ApplyOutcome, Engine, EngineConfig};
pub use error::Error;
pub use node_path::NodePath;
pub use resolver::{ResolvedHighlight, Strategy};
pub use text_map::{TextMap, TextNodeRecord};
