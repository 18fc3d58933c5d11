//! Core CLI commands for hlmark: apply, resolve, extract, inspect.

use std::path::Path;
use std::process::ExitCode;

use crate::anchor;
use crate::config::Config;
use crate::dom;
use crate::engine::{ApplyOptions, Engine};
use crate::error::Error;
use crate::resolver;

/// Read a document, mapping not-found to a dedicated diagnostic.
///
/// # Errors
///
/// Returns `Error::FileNotFound` or `Error::Io`.
fn read_document(path: &Path) -> Result<String, Error> {
    match std::fs::read_to_string(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(Error::FileNotFound { path: path.to_path_buf() })
        }
        Err(e) => Err(Error::Io(e)),
        Ok(content) => Ok(content),
    }
}

/// Build an engine from `hlmark.toml` in the working directory, with an
/// optional marker-tag override from the command line.
///
/// # Errors
///
/// Returns config loading errors.
fn engine_for_cwd(marker_tag: Option<&str>) -> Result<Engine, Error> {
    let config = Config::load(Path::new("."))?;
    let mut engine_config = config.engine_config();
    if let Some(tag) = marker_tag {
        engine_config.marker_tag = tag.to_string();
    }
    Ok(Engine::new(engine_config))
}

/// Apply stored anchors to a document and emit the highlighted HTML.
///
/// The HTML goes to `--out` when given, stdout otherwise; the per-anchor
/// report always goes to stderr so the two never interleave.
///
/// # Errors
///
/// Returns errors from config loading, file reading, or anchor decoding.
pub fn apply(
    html_path: &Path,
    anchors_path: &Path,
    out: Option<&Path>,
    marker_tag: Option<&str>,
) -> Result<ExitCode, Error> {
    let engine = engine_for_cwd(marker_tag)?;
    let html = read_document(html_path)?;
    let anchors = anchor::read_anchors(anchors_path)?;

    let outcome = engine.apply(&html, &anchors, &ApplyOptions::default());

    match out {
        Some(path) => std::fs::write(path, &outcome.html)?,
        None => println!("{}", outcome.html),
    }

    for id in &outcome.orphaned_ids {
        eprintln!("ORPHAN  {id}");
    }
    eprintln!("{} applied, {} orphaned", outcome.applied, outcome.orphaned_count());

    if outcome.all_applied() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(1))
    }
}

/// Dry run: report how each anchor would resolve, without mutating.
///
/// # Errors
///
/// Returns errors from config loading, file reading, or anchor decoding.
pub fn resolve(html_path: &Path, anchors_path: &Path) -> Result<ExitCode, Error> {
    let engine = engine_for_cwd(None)?;
    let html = read_document(html_path)?;
    let anchors = anchor::read_anchors(anchors_path)?;

    let body = dom::parse(&html);
    dom::remove_highlights(&body, &engine.config().marker_tag);
    let map = dom::build_text_map(&body, &engine.config().marker_tag);

    let mut orphan_count = 0_u32;
    for a in &anchors {
        match resolver::resolve(a, &map) {
            Some(hit) => println!(
                "{:<15} {:.3}  {}  [{}..{})",
                hit.strategy.to_string(),
                hit.confidence,
                a.id,
                hit.start_position,
                hit.end_position
            ),
            None => {
                orphan_count = orphan_count.saturating_add(1);
                println!("{:<15} {:.3}  {}", "ORPHAN", 0.0, a.id);
            }
        }
    }

    println!();
    println!("{} of {} anchors resolvable", anchors.len() as u32 - orphan_count, anchors.len());

    if orphan_count > 0 {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Print the plain-text projection of a document.
///
/// # Errors
///
/// Returns errors from config loading or file reading.
pub fn extract(html_path: &Path) -> Result<(), Error> {
    let engine = engine_for_cwd(None)?;
    let html = read_document(html_path)?;
    println!("{}", engine.extract_plain_text(&html));
    Ok(())
}

/// Print the text-node table: path, plain-text span, and a preview.
///
/// # Errors
///
/// Returns errors from config loading or file reading.
pub fn inspect(html_path: &Path) -> Result<(), Error> {
    let engine = engine_for_cwd(None)?;
    let html = read_document(html_path)?;
    let map = engine.get_text_map(&html, None);

    for record in map.text_nodes() {
        println!(
            "{}  [{}..{})  {}",
            record.path,
            record.plain_text_start,
            record.plain_text_end,
            preview(&record.text)
        );
    }
    println!();
    println!(
        "{} text nodes, {} plain-text bytes",
        map.text_nodes().len(),
        map.plain_text.len()
    );
    Ok(())
}

/// First 40 characters of a node's text, whitespace collapsed.
fn preview(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut out: String = collapsed.chars().take(40).collect();
    if collapsed.chars().count() > 40 {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_collapses_and_truncates() {
        assert_eq!(preview("short  run"), "short run");
        let long = "x".repeat(60);
        let p = preview(&long);
        assert_eq!(p.len(), 43);
        assert!(p.ends_with("..."));
    }
}
