//! Input documents: the class hierarchy and per-binary observation files.
//!
//! Everything is read and parsed before the merge starts. Any I/O or shape
//! error here is fatal for the run; nothing downstream sees a partially
//! loaded input.
//!
//! Observation documents are taken from one directory (not recursively),
//! filtered by a file-name glob, and read in sorted path order. That order
//! is what "later" means when two documents observe the same class.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobMatcher};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::hierarchy::{ClassHierarchy, HierarchyError};
use crate::model::ClassNode;
use crate::observations::{IngestStats, ObservationDocument, ObservationStore};

/// Errors loading input documents.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Input path does not exist.
    #[error("input not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The observation path is not a directory.
    #[error("not a directory: {}", path.display())]
    NotADirectory { path: PathBuf },

    /// I/O error reading an input.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A document is not valid JSON or lacks required fields.
    #[error("malformed document {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The hierarchy document is well-formed JSON but not a valid hierarchy.
    #[error("invalid hierarchy {}: {source}", path.display())]
    Hierarchy {
        path: PathBuf,
        #[source]
        source: HierarchyError,
    },

    /// The observation file glob does not compile.
    #[error("invalid glob '{pattern}': {message}")]
    InvalidGlob { pattern: String, message: String },
}

impl LoadError {
    /// Path of the offending input, if the error concerns one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            LoadError::NotFound { path }
            | LoadError::NotADirectory { path }
            | LoadError::Io { path, .. }
            | LoadError::Malformed { path, .. }
            | LoadError::Hierarchy { path, .. } => Some(path),
            LoadError::InvalidGlob { .. } => None,
        }
    }
}

/// SHA-256 of a document's bytes, hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
    /// Hash `data`.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentHash(hex::encode(hasher.finalize()))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What was taken from one observation document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentDigest {
    pub path: String,
    pub sha256: ContentHash,
    /// Classes present in the document.
    pub classes: usize,
    #[serde(flatten)]
    pub ingest: IngestStats,
}

/// Result of loading an observation directory.
#[derive(Debug, Clone, Default)]
pub struct LoadedObservations {
    pub store: ObservationStore,
    /// Per-document digests, in read order.
    pub documents: Vec<DocumentDigest>,
}

impl LoadedObservations {
    /// Classes dropped across all documents because the hierarchy lacks them.
    pub fn dropped_classes(&self) -> usize {
        self.documents.iter().map(|d| d.ingest.dropped).sum()
    }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, LoadError> {
    fs::read(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            LoadError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            LoadError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

/// Read and parse any JSON document, such as a previously exported output.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let bytes = read_bytes(path)?;
    serde_json::from_slice(&bytes).map_err(|source| LoadError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse a hierarchy document: a JSON list of `{name, parent, is_abstract}`.
pub fn parse_hierarchy(bytes: &[u8], path: &Path) -> Result<ClassHierarchy, LoadError> {
    let nodes: Vec<ClassNode> =
        serde_json::from_slice(bytes).map_err(|source| LoadError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
    ClassHierarchy::from_nodes(nodes).map_err(|source| LoadError::Hierarchy {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the hierarchy document at `path`.
pub fn load_hierarchy(path: &Path) -> Result<ClassHierarchy, LoadError> {
    let bytes = read_bytes(path)?;
    let hierarchy = parse_hierarchy(&bytes, path)?;
    info!(path = %path.display(), classes = hierarchy.len(), "loaded class hierarchy");
    Ok(hierarchy)
}

/// Parse one observation document.
pub fn parse_observation_document(
    bytes: &[u8],
    path: &Path,
) -> Result<ObservationDocument, LoadError> {
    serde_json::from_slice(bytes).map_err(|source| LoadError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

/// Compile an observation file-name glob.
pub fn compile_glob(pattern: &str) -> Result<GlobMatcher, LoadError> {
    Glob::new(pattern)
        .map(|glob| glob.compile_matcher())
        .map_err(|e| LoadError::InvalidGlob {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

/// Files directly inside `dir` whose names match `matcher`, sorted by name.
pub fn list_observation_files(dir: &Path, matcher: &GlobMatcher) -> Result<Vec<PathBuf>, LoadError> {
    if !dir.exists() {
        return Err(LoadError::NotFound {
            path: dir.to_path_buf(),
        });
    }
    if !dir.is_dir() {
        return Err(LoadError::NotADirectory {
            path: dir.to_path_buf(),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| LoadError::Io {
            path: dir.to_path_buf(),
            source: io::Error::from(e),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if matcher.is_match(entry.file_name()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Load every matching observation document in `dir` into a store, keeping
/// only classes present in `hierarchy`.
pub fn load_observations(
    dir: &Path,
    pattern: &str,
    hierarchy: &ClassHierarchy,
) -> Result<LoadedObservations, LoadError> {
    let matcher = compile_glob(pattern)?;
    let files = list_observation_files(dir, &matcher)?;

    let mut loaded = LoadedObservations::default();
    for path in files {
        let bytes = read_bytes(&path)?;
        let document = parse_observation_document(&bytes, &path)?;
        let classes = document.len();
        let label = path.display().to_string();
        let ingest = loaded
            .store
            .ingest_document(document, &label, |name| hierarchy.contains(name));
        debug!(
            path = %label,
            classes,
            accepted = ingest.accepted,
            dropped = ingest.dropped,
            "loaded observation document"
        );
        loaded.documents.push(DocumentDigest {
            path: label,
            sha256: ContentHash::compute(&bytes),
            classes,
            ingest,
        });
    }

    info!(
        documents = loaded.documents.len(),
        classes = loaded.store.len(),
        dropped = loaded.dropped_classes(),
        "loaded observations"
    );
    Ok(loaded)
}
