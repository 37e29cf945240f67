//! Session persistence.
//!
//! One small JSON file remembers what was open at shutdown:
//!
//! ```json
//! { "last_file": "/notes/todo.md", "last_text": null }
//! ```
//!
//! A document with a file records only its path. An untitled document
//! records its raw text instead. Reading never fails loudly: a missing or
//! corrupt file just means there is nothing to restore.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::Document;
use crate::file::{FileSystem, OsFileSystem};

/// Session file name used when none is configured.
pub const DEFAULT_SESSION_FILE: &str = "session.json";

/// The on-disk session record. Each write replaces it entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default)]
    pub last_file: Option<PathBuf>,
    #[serde(default)]
    pub last_text: Option<String>,
}

impl SessionRecord {
    /// Snapshot `document`: its path if it has one, otherwise its text.
    pub fn from_document(document: &Document) -> Self {
        match document.file_path() {
            Some(path) => Self {
                last_file: Some(path.to_path_buf()),
                last_text: None,
            },
            None => Self {
                last_file: None,
                last_text: Some(document.text()),
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session file {} is corrupt: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("session file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Reads and writes the session file at a fixed path.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Best-effort snapshot of `document`. Failures are logged and dropped.
    pub fn save(&self, document: &Document) {
        if let Err(err) = self.try_save(&SessionRecord::from_document(document)) {
            tracing::warn!(%err, "session not saved");
        }
    }

    /// Write `record`, replacing the previous session atomically.
    ///
    /// # Errors
    /// Returns [`SessionError::Io`] if the directory or file cannot be
    /// written.
    pub fn try_save(&self, record: &SessionRecord) -> Result<(), SessionError> {
        let io_error = |source: io::Error| SessionError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(io_error)?;
        }
        let json = serde_json::to_string_pretty(record).map_err(|err| io_error(err.into()))?;
        OsFileSystem
            .write_bytes(&self.path, json.as_bytes())
            .map_err(io_error)?;
        tracing::debug!(path = %self.path.display(), "session saved");
        Ok(())
    }

    /// The stored record, or `None` if there is none or it is unreadable.
    pub fn restore(&self) -> Option<SessionRecord> {
        match self.try_restore() {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(%err, "ignoring session file");
                None
            }
        }
    }

    /// Like [`Self::restore`] but reports why nothing was restored.
    ///
    /// # Errors
    /// Returns [`SessionError::Io`] for read failures and
    /// [`SessionError::Corrupt`] for malformed JSON.
    pub fn try_restore(&self) -> Result<Option<SessionRecord>, SessionError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(SessionError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        let record = serde_json::from_str(&contents).map_err(|source| SessionError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!(path = %self.path.display(), "session restored");
        Ok(Some(record))
    }

    /// Delete the session file. A missing file is not an error.
    ///
    /// # Errors
    /// Returns [`SessionError::Io`] if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<(), SessionError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SessionError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_FILE)
    }
}
