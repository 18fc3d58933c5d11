//! Diagnostic rendering for hlmark errors.
//!
//! Converts structured `Error` variants into human-readable markdown
//! diagnostics printed to stderr, with bold headings for terminal display.

use crate::error::Error;

/// ANSI escape code for bold text.
const BOLD: &str = "\x1b[1m";
/// ANSI escape code to reset text formatting.
const RESET: &str = "\x1b[0m";

/// Render an error as valid markdown with bold headings and print to stderr.
pub fn print_error(e: &Error) {
    let md = render_error(e);
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
}

/// Render an error as a structured markdown diagnostic.
///
/// Each variant produces a block with what happened and how to fix it.
pub fn render_error(e: &Error) -> String {
    match e {
        Error::FileNotFound { path } => format!(
            "\
# Error: File Not Found

`{}` does not exist.
",
            path.display()
        ),
        Error::AnchorFileInvalid { path, reason } => format!(
            "\
# Error: Invalid Anchor File

Could not decode `{}`:

    {reason}

## Fix

Anchors are a JSON array of records; see `hlmark apply --help` for the
expected fields.
",
            path.display()
        ),
        Error::InvalidNodePath { path } => format!(
            "\
# Error: Invalid Node Path

`{path}` does not match the `/body/tag[i]/text()[i]` grammar.
"
        ),
        Error::ConfigInvalid { path, reason } => format!(
            "\
# Error: Config Invalid

Could not parse `{}`: {reason}

## Fix

Check `hlmark.toml`; the recognized keys are `marker_tag` and
`cache_capacity`.
",
            path.display()
        ),
        Error::Io(e) => format!("# Error: I/O\n\n{e}\n"),
        Error::Json(e) => format!("# Error: Invalid JSON\n\n{e}\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn anchor_file_diagnostic_names_the_file() {
        let err = Error::AnchorFileInvalid {
            path: PathBuf::from("notes/anchors.json"),
            reason: "missing field `article_id`".to_string(),
        };
        let md = render_error(&err);
        assert!(md.contains("notes/anchors.json"));
        assert!(md.contains("missing field"));
        assert!(md.starts_with("# Error"));
    }

    #[test]
    fn every_variant_renders_a_heading() {
        let errors = [
            Error::FileNotFound { path: PathBuf::from("x.html") },
            Error::InvalidNodePath { path: "/nope/*".to_string() },
            Error::ConfigInvalid {
                path: PathBuf::from("hlmark.toml"),
                reason: "bad".to_string(),
            },
        ];
        for err in errors {
            assert!(render_error(&err).starts_with("# Error"), "{err}");
        }
    }
}
