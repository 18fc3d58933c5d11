use std::path::PathBuf;

/// All errors in hlmark carry enough context to produce a useful diagnostic
/// without a debugger. Per-anchor resolution failures are deliberately NOT
/// errors: they surface as orphan ids on the apply outcome instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid node path: `{path}`")]
    InvalidNodePath {
        path: String,
    },

    #[error("invalid anchor file {}: {reason}", path.display())]
    AnchorFileInvalid {
        path: PathBuf,
        reason: String,
    },

    #[error("file not found: {}", path.display())]
    FileNotFound {
        path: PathBuf,
    },

    #[error("config invalid: {}: {reason}", path.display())]
    ConfigInvalid {
        path: PathBuf,
        reason: String,
    },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}
