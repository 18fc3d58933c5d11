use std::path::Path;

use crate::engine::{EngineConfig, DEFAULT_CACHE_CAPACITY, DEFAULT_MARKER_TAG};
use crate::error::Error;

/// Project configuration loaded from `hlmark.toml`.
/// Everything is optional; a missing file means defaults. The library API
/// takes `EngineConfig` directly and never touches the filesystem.
#[derive(Debug)]
pub struct Config {
    pub marker_tag: String,
    pub cache_capacity: usize,
}

/// Raw TOML structure for `hlmark.toml`.
#[derive(serde::Deserialize)]
struct HlmarkTomlConfig {
    #[serde(default)]
    marker_tag: Option<String>,
    #[serde(default)]
    cache_capacity: Option<usize>,
}

impl Config {
    /// Load config from `hlmark.toml` in the given root directory.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading fails (other than not-found), or
    /// `Error::ConfigInvalid` naming the file when the TOML is malformed.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let path = root.join("hlmark.toml");
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::defaults());
            }
            Err(e) => return Err(Error::Io(e)),
        };

        let raw: HlmarkTomlConfig =
            toml::from_str(&content).map_err(|e| Error::ConfigInvalid {
                path,
                reason: e.to_string(),
            })?;

        Ok(Self {
            marker_tag: raw
                .marker_tag
                .unwrap_or_else(|| DEFAULT_MARKER_TAG.to_string()),
            cache_capacity: raw.cache_capacity.unwrap_or(DEFAULT_CACHE_CAPACITY),
        })
    }

    fn defaults() -> Self {
        Self {
            marker_tag: DEFAULT_MARKER_TAG.to_string(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }

    /// The engine configuration this project config describes.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            marker_tag: self.marker_tag.clone(),
            cache_capacity: self.cache_capacity,
        }
    }
}
