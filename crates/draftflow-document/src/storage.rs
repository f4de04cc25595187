//! Document persistence
//!
//! Storage commits a full new document or nothing: [`JsonDocumentStore`]
//! writes to a temporary file and renames it over the previous version, so a
//! crash mid-save leaves the last committed tree intact. The previous
//! version of a document is retained as a recoverable snapshot before the
//! first mutation in a session.

use crate::document::Document;
use crate::error::DocumentError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::{self, Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

/// Reference to a stored document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef(String);

impl DocumentRef {
    /// Create a reference from a name
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Reference name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem-safe stem for this reference
    fn file_stem(&self) -> String {
        self.0
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect()
    }
}

impl Display for DocumentRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DocumentRef {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Content digest of a document, hex-encoded SHA-256 over its JSON form
#[must_use]
pub fn revision(doc: &Document) -> String {
    let bytes = serde_json::to_vec(doc).unwrap_or_default();
    hex::encode(Sha256::digest(&bytes))
}

/// Backing store for documents
///
/// `load` is called per operation; documents are never cached across an
/// approval suspension.
pub trait DocumentStorage: Send + Sync {
    /// Load the current version of a document
    ///
    /// # Errors
    /// `DocumentError::NotFound` if nothing is stored under `doc_ref`.
    fn load(&self, doc_ref: &DocumentRef) -> Result<Document, DocumentError>;

    /// Commit a full new version of a document
    fn save(&self, doc_ref: &DocumentRef, doc: &Document) -> Result<(), DocumentError>;

    /// Retain the current version as a snapshot, if none is retained yet
    ///
    /// Idempotent: a later call within the same session keeps the original
    /// snapshot, so recovery always returns to the session's starting state.
    fn ensure_snapshot(&self, doc_ref: &DocumentRef) -> Result<(), DocumentError>;

    /// Roll the document back to its retained snapshot
    ///
    /// # Errors
    /// `DocumentError::NoSnapshot` if no snapshot was retained.
    fn restore_snapshot(&self, doc_ref: &DocumentRef) -> Result<Document, DocumentError>;

    /// Drop the retained snapshot, if any
    fn clear_snapshot(&self, doc_ref: &DocumentRef) -> Result<(), DocumentError>;
}

/// File-backed JSON document store with atomic commits
#[derive(Debug, Clone)]
pub struct JsonDocumentStore {
    root: PathBuf,
}

impl JsonDocumentStore {
    /// Create a store rooted at a directory, creating it if needed
    ///
    /// # Errors
    /// I/O failure creating the root directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, DocumentError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn doc_path(&self, doc_ref: &DocumentRef) -> PathBuf {
        self.root.join(format!("{}.json", doc_ref.file_stem()))
    }

    fn snapshot_path(&self, doc_ref: &DocumentRef) -> PathBuf {
        self.root.join(format!("{}.snapshot.json", doc_ref.file_stem()))
    }

    fn read(&self, path: &Path, doc_ref: &DocumentRef) -> Result<Document, DocumentError> {
        if !path.exists() {
            return Err(DocumentError::NotFound(doc_ref.to_string()));
        }
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn write_atomic(&self, path: &Path, doc: &Document) -> Result<(), DocumentError> {
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(doc)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl DocumentStorage for JsonDocumentStore {
    fn load(&self, doc_ref: &DocumentRef) -> Result<Document, DocumentError> {
        self.read(&self.doc_path(doc_ref), doc_ref)
    }

    fn save(&self, doc_ref: &DocumentRef, doc: &Document) -> Result<(), DocumentError> {
        self.write_atomic(&self.doc_path(doc_ref), doc)?;
        tracing::debug!(doc = %doc_ref, revision = %revision(doc), "document committed");
        Ok(())
    }

    fn ensure_snapshot(&self, doc_ref: &DocumentRef) -> Result<(), DocumentError> {
        let snapshot = self.snapshot_path(doc_ref);
        if snapshot.exists() {
            return Ok(());
        }
        let current = self.doc_path(doc_ref);
        if !current.exists() {
            return Err(DocumentError::NotFound(doc_ref.to_string()));
        }
        fs::copy(&current, &snapshot)?;
        tracing::debug!(doc = %doc_ref, "snapshot retained");
        Ok(())
    }

    fn restore_snapshot(&self, doc_ref: &DocumentRef) -> Result<Document, DocumentError> {
        let snapshot = self.snapshot_path(doc_ref);
        if !snapshot.exists() {
            return Err(DocumentError::NoSnapshot(doc_ref.to_string()));
        }
        let doc = self.read(&snapshot, doc_ref)?;
        self.write_atomic(&self.doc_path(doc_ref), &doc)?;
        tracing::info!(doc = %doc_ref, "document rolled back to snapshot");
        Ok(doc)
    }

    fn clear_snapshot(&self, doc_ref: &DocumentRef) -> Result<(), DocumentError> {
        let snapshot = self.snapshot_path(doc_ref);
        if snapshot.exists() {
            fs::remove_file(&snapshot)?;
        }
        Ok(())
    }
}
