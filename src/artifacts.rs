//! Request-scoped storage for rendered chart artifacts.
//!
//! The chart capability hands every [`ChartArtifact`] to an [`ArtifactStore`]
//! and reports back only the [`ArtifactDescriptor`]. Stores key artifacts by
//! request ID so nothing is shared or reused across requests. Saving the same
//! filename twice within a request bumps its version.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chart::ChartArtifact;

/// What the chart capability reports for each stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    /// Filename as it must appear in the report.
    pub filename: String,
    /// Chart title.
    pub title: String,
    /// MIME type of the stored bytes.
    pub mime_type: String,
    /// Store revision for this filename, starting at 1.
    pub version: u32,
}

impl ArtifactDescriptor {
    /// Describe an artifact saved at `version`.
    pub fn new(artifact: &ChartArtifact, version: u32) -> Self {
        Self {
            filename: artifact.filename.clone(),
            title: artifact.title.clone(),
            mime_type: artifact.mime_type.clone(),
            version,
        }
    }
}

/// Errors from artifact storage.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// Filesystem failure.
    #[error("failed to store artifact {path}: {source}")]
    Io {
        /// Target path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The filename would escape the request directory.
    #[error("invalid artifact filename: {0}")]
    InvalidFilename(String),
    /// Internal lock was poisoned.
    #[error("artifact store lock poisoned")]
    Poisoned,
}

/// Destination for rendered artifacts.
pub trait ArtifactStore: Send + Sync {
    /// Persist an artifact for `request_id` and return its version.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError`] when the artifact cannot be stored.
    fn save(&self, request_id: &str, artifact: &ChartArtifact) -> Result<u32, ArtifactError>;
}

type Key = (String, String);

/// Keeps artifacts in memory. Useful for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    artifacts: Mutex<HashMap<Key, Vec<ChartArtifact>>>,
}

impl InMemoryArtifactStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest stored revision of `filename` for a request.
    pub fn latest(&self, request_id: &str, filename: &str) -> Option<ChartArtifact> {
        let map = self.artifacts.lock().ok()?;
        map.get(&(request_id.to_owned(), filename.to_owned()))
            .and_then(|versions| versions.last().cloned())
    }

    /// Total number of stored revisions across all requests.
    pub fn len(&self) -> usize {
        match self.artifacts.lock() {
            Ok(map) => map.values().map(Vec::len).sum(),
            Err(_) => 0,
        }
    }

    /// Whether nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn save(&self, request_id: &str, artifact: &ChartArtifact) -> Result<u32, ArtifactError> {
        let mut map = self.artifacts.lock().map_err(|_| ArtifactError::Poisoned)?;
        let versions = map
            .entry((request_id.to_owned(), artifact.filename.clone()))
            .or_default();
        versions.push(artifact.clone());
        Ok(u32::try_from(versions.len()).unwrap_or(u32::MAX))
    }
}

/// Writes artifacts to `<root>/<request_id>/<filename>`.
#[derive(Debug)]
pub struct DirArtifactStore {
    root: PathBuf,
    versions: Mutex<HashMap<Key, u32>>,
}

impl DirArtifactStore {
    /// Create a store rooted at `root`. Directories are created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            versions: Mutex::new(HashMap::new()),
        }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path an artifact is written to.
    pub fn path_for(&self, request_id: &str, filename: &str) -> PathBuf {
        self.root.join(request_id).join(filename)
    }
}

impl ArtifactStore for DirArtifactStore {
    fn save(&self, request_id: &str, artifact: &ChartArtifact) -> Result<u32, ArtifactError> {
        for part in [request_id, artifact.filename.as_str()] {
            if part.is_empty() || part.contains(['/', '\\']) || part == ".." {
                return Err(ArtifactError::InvalidFilename(part.to_owned()));
            }
        }

        let dir = self.root.join(request_id);
        std::fs::create_dir_all(&dir).map_err(|source| ArtifactError::Io {
            path: dir.clone(),
            source,
        })?;
        let path = dir.join(&artifact.filename);
        std::fs::write(&path, &artifact.bytes).map_err(|source| ArtifactError::Io {
            path: path.clone(),
            source,
        })?;

        let mut versions = self.versions.lock().map_err(|_| ArtifactError::Poisoned)?;
        let version = versions
            .entry((request_id.to_owned(), artifact.filename.clone()))
            .or_insert(0);
        *version = version.saturating_add(1);
        debug!(path = %path.display(), version = *version, "artifact stored");
        Ok(*version)
    }
}
