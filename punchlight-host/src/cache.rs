//! Last known light address, kept in `~/.punchlight/light-cache.json`.
//!
//! The cache is a hint. Read and write failures are logged and otherwise
//! ignored: discovery still works without it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use punchlight_core::paths::light_cache_path;
use punchlight_core::settings::{ensure_root, home};
use punchlight_core::CoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CacheFile {
    host: String,
}

#[derive(Debug, Clone)]
pub struct HostCache {
    home: PathBuf,
}

impl HostCache {
    pub fn at(home: &Path) -> Self {
        Self {
            home: home.to_path_buf(),
        }
    }

    /// Cache under the user's home directory.
    pub fn open() -> Result<Self, CoreError> {
        Ok(Self::at(&home()?))
    }

    pub fn path(&self) -> PathBuf {
        light_cache_path(&self.home)
    }

    pub fn load(&self) -> Option<String> {
        let path = self.path();
        if !path.exists() {
            return None;
        }
        let parsed = std::fs::read_to_string(&path)
            .map_err(|err| err.to_string())
            .and_then(|text| {
                serde_json::from_str::<CacheFile>(&text).map_err(|err| err.to_string())
            });
        match parsed {
            Ok(file) => Some(file.host),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to load cached light address");
                None
            }
        }
    }

    pub fn save(&self, host: &str) {
        match self.write(host) {
            Ok(()) => tracing::info!(host, "cached light address"),
            Err(err) => tracing::warn!(host, error = %err, "failed to save cached light address"),
        }
    }

    fn write(&self, host: &str) -> Result<(), CoreError> {
        ensure_root(&self.home)?;
        let path = self.path();
        let json = serde_json::to_string(&CacheFile {
            host: host.to_string(),
        })?;
        std::fs::write(&path, json).map_err(|source| CoreError::Io { path, source })
    }
}
