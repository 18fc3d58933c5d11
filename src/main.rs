use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use hlmark::{commands, diagnostics};

// ── Help text constants ───────────────────────────────────────────────

const AFTER_HELP: &str = "\
Workflow:
  1. Store anchors as a JSON array (see `hlmark apply --help`)
  2. hlmark apply page.html anchors.json   Re-anchor and wrap highlights
  3. hlmark resolve page.html anchors.json Dry-run after document edits

Exit codes:  0=ok  1=orphaned anchors  2=error";

const APPLY_HELP: &str = "\
Anchors are a JSON array of records with id, article_id, exact_text,
prefix_context, suffix_context, color, offsets, and timestamps; v2 records
add node paths. Unknown colors fall back to yellow.

Examples:
  hlmark apply page.html anchors.json                 HTML to stdout
  hlmark apply page.html anchors.json --out out.html  Write to a file
  hlmark apply page.html anchors.json --marker-tag read-hl";

const RESOLVE_HELP: &str = "\
Prints one line per anchor: strategy, confidence, id, and the plain-text
range it would cover. Orphans exit 1, so this doubles as a CI gate after
document edits.

Examples:
  hlmark resolve page.html anchors.json
  hlmark resolve page.html anchors.json && echo 'all placeable'";

const EXTRACT_HELP: &str = "\
Examples:
  hlmark extract page.html          Plain-text projection to stdout";

const INSPECT_HELP: &str = "\
Shows the text map: one line per text node with its path and plain-text
span. Useful for debugging stale v2 anchor paths.

Examples:
  hlmark inspect page.html";

// ── CLI definition ────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "hlmark", version, about = "Durable HTML highlights that survive document edits")]
#[command(subcommand_required = true, after_help = AFTER_HELP)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply stored anchors to a document and emit highlighted HTML
    #[command(after_help = APPLY_HELP)]
    Apply {
        /// Path to the HTML document
        html: PathBuf,
        /// Path to the JSON anchor file
        anchors: PathBuf,
        /// Write the highlighted HTML here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
        /// Override the marker element tag (default html-hl)
        #[arg(long)]
        marker_tag: Option<String>,
    },
    /// Report how each anchor would resolve, without mutating
    #[command(after_help = RESOLVE_HELP)]
    Resolve {
        /// Path to the HTML document
        html: PathBuf,
        /// Path to the JSON anchor file
        anchors: PathBuf,
    },
    /// Print the plain-text projection of a document
    #[command(after_help = EXTRACT_HELP)]
    Extract {
        /// Path to the HTML document
        html: PathBuf,
    },
    /// Print the text-node table (paths and plain-text spans)
    #[command(after_help = INSPECT_HELP)]
    Inspect {
        /// Path to the HTML document
        html: PathBuf,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Apply { html, anchors, out, marker_tag } => {
            commands::apply(&html, &anchors, out.as_deref(), marker_tag.as_deref())
        }
        Commands::Resolve { html, anchors } => commands::resolve(&html, &anchors),
        Commands::Extract { html } => commands::extract(&html).map(|()| ExitCode::SUCCESS),
        Commands::Inspect { html } => commands::inspect(&html).map(|()| ExitCode::SUCCESS),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::from(2)
        }
    }
}
