//! Encoding-aware file loading and saving.
//!
//! Files are decoded by trying, in order:
//! 1. UTF-8 (a leading BOM is stripped and remembered)
//! 2. UTF-16 LE/BE, only when the file starts with a UTF-16 BOM
//! 3. Latin-1, which accepts any byte sequence
//!
//! Latin-1 never fails, so the only way [`load`] returns an error is an I/O
//! failure while reading. Saving always writes UTF-8 through a sibling
//! temporary file that is renamed over the destination. Symlinks are
//! followed and the destination keeps its permission bits.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// The encoding a document was decoded from.
///
/// The in-memory representation is always UTF-8; this only records what the
/// file looked like on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// UTF-8 without BOM.
    #[default]
    Utf8,
    /// UTF-8 with a leading BOM, which is written back on save.
    Utf8Bom,
    /// UTF-16 little-endian with BOM.
    Utf16Le,
    /// UTF-16 big-endian with BOM.
    Utf16Be,
    /// ISO-8859-1. Every byte maps to the code point of the same value.
    Latin1,
}

impl Encoding {
    /// Short label for status lines.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Utf8Bom => "UTF-8 BOM",
            Self::Utf16Le => "UTF-16 LE",
            Self::Utf16Be => "UTF-16 BE",
            Self::Latin1 => "Latin-1",
        }
    }

    /// The encoding a save produces for a document decoded as `self`.
    ///
    /// Everything is written as UTF-8; only a UTF-8 BOM is carried over.
    pub const fn saved_as(self) -> Self {
        match self {
            Self::Utf8Bom => Self::Utf8Bom,
            Self::Utf8 | Self::Utf16Le | Self::Utf16Be | Self::Latin1 => Self::Utf8,
        }
    }
}

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Errors surfaced by [`load`] and [`save`].
#[derive(Debug, Error)]
pub enum FileError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FileError {
    /// The path the failed operation was acting on.
    pub fn path(&self) -> &Path {
        match self {
            Self::Read { path, .. } | Self::Write { path, .. } => path,
        }
    }
}

/// Text decoded from a file, plus the encoding that succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded {
    pub text: String,
    pub encoding: Encoding,
}

impl Loaded {
    /// Whether decoding fell through to Latin-1, which may have produced
    /// mojibake for files in some other 8-bit encoding.
    pub fn is_fallback(&self) -> bool {
        self.encoding == Encoding::Latin1
    }
}

/// File system operations the core needs.
///
/// Hosts that read files off the main sequence can supply their own
/// implementation; [`OsFileSystem`] talks to the real disk.
pub trait FileSystem {
    /// Read a whole file.
    ///
    /// # Errors
    /// Any I/O error from the underlying storage.
    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Replace a file's contents. Implementations must leave the previous
    /// contents intact when the write fails.
    ///
    /// # Errors
    /// Any I/O error from the underlying storage.
    fn write_bytes(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;

    /// Whether `path` currently exists.
    fn exists(&self, path: &Path) -> bool;
}

/// The real file system, with all-or-nothing writes.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write_bytes(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        // Rename over the link target, not the link itself.
        let target = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let permissions = fs::metadata(&target).ok().map(|meta| meta.permissions());
        let temp_path = temp_path_for(&target);
        let write = || -> io::Result<()> {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            if let Some(permissions) = permissions.clone() {
                fs::set_permissions(&temp_path, permissions)?;
            }
            fs::rename(&temp_path, &target)
        };
        let result = write();
        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        result
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Sibling path used while a write is in progress.
fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "document".to_string(), |n| n.to_string_lossy().into_owned());
    path.with_file_name(format!(".{name}.livemark-tmp"))
}

/// Whether `path` exists on the real file system.
pub fn exists(path: &Path) -> bool {
    OsFileSystem.exists(path)
}

/// Load `path` from the real file system.
///
/// # Errors
/// Returns [`FileError::Read`] if the file cannot be read.
pub fn load(path: &Path) -> Result<Loaded, FileError> {
    load_with(&OsFileSystem, path)
}

/// Load `path` through `fs`.
///
/// # Errors
/// Returns [`FileError::Read`] if the file cannot be read.
pub fn load_with(fs: &dyn FileSystem, path: &Path) -> Result<Loaded, FileError> {
    let bytes = fs.read_bytes(path).map_err(|source| FileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let (encoding, text) = decode(&bytes);
    if encoding == Encoding::Latin1 {
        tracing::info!(path = %path.display(), "decoded as Latin-1 fallback");
    } else {
        tracing::debug!(path = %path.display(), encoding = encoding.as_str(), "loaded file");
    }
    Ok(Loaded { text, encoding })
}

/// Save `text` as UTF-8 to `path` on the real file system.
///
/// # Errors
/// Returns [`FileError::Write`] on any I/O fault; the existing file is left
/// untouched.
pub fn save(path: &Path, text: &str) -> Result<(), FileError> {
    save_with(&OsFileSystem, path, text)
}

/// Save `text` as UTF-8 to `path` through `fs`.
///
/// # Errors
/// Returns [`FileError::Write`] on any I/O fault.
pub fn save_with(fs: &dyn FileSystem, path: &Path, text: &str) -> Result<(), FileError> {
    save_encoded_with(fs, path, text, Encoding::Utf8)
}

/// Save `text` to `path` for a document decoded as `encoding`.
///
/// # Errors
/// Returns [`FileError::Write`] on any I/O fault; the existing file is left
/// untouched.
pub fn save_encoded(path: &Path, text: &str, encoding: Encoding) -> Result<(), FileError> {
    save_encoded_with(&OsFileSystem, path, text, encoding)
}

/// Save `text` through `fs`, prefixing a BOM when `encoding` saves as
/// [`Encoding::Utf8Bom`].
///
/// # Errors
/// Returns [`FileError::Write`] on any I/O fault.
pub fn save_encoded_with(
    fs: &dyn FileSystem,
    path: &Path,
    text: &str,
    encoding: Encoding,
) -> Result<(), FileError> {
    let encoding = encoding.saved_as();
    let mut bytes = Vec::with_capacity(text.len() + UTF8_BOM.len());
    if encoding == Encoding::Utf8Bom {
        bytes.extend_from_slice(&UTF8_BOM);
    }
    bytes.extend_from_slice(text.as_bytes());
    fs.write_bytes(path, &bytes)
        .map_err(|source| FileError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    tracing::debug!(
        path = %path.display(),
        bytes = bytes.len(),
        encoding = encoding.as_str(),
        "saved file"
    );
    Ok(())
}

/// Decode raw bytes, returning the encoding that succeeded.
///
/// Never fails: Latin-1 is the last resort and accepts every byte.
pub fn decode(bytes: &[u8]) -> (Encoding, String) {
    if let Some(payload) = bytes.strip_prefix(&UTF8_BOM) {
        if let Ok(text) = std::str::from_utf8(payload) {
            return (Encoding::Utf8Bom, text.to_string());
        }
    } else if let Ok(text) = std::str::from_utf8(bytes) {
        return (Encoding::Utf8, text.to_string());
    }

    if let Some(payload) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        if let Some(text) = decode_utf16(payload, u16::from_le_bytes) {
            return (Encoding::Utf16Le, text);
        }
    } else if let Some(payload) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        if let Some(text) = decode_utf16(payload, u16::from_be_bytes) {
            return (Encoding::Utf16Be, text);
        }
    }

    (Encoding::Latin1, bytes.iter().map(|&b| char::from(b)).collect())
}

/// Strict UTF-16 decode. Odd trailing bytes or unpaired surrogates reject
/// the whole payload so the caller can fall through to Latin-1.
fn decode_utf16(payload: &[u8], unit: fn([u8; 2]) -> u16) -> Option<String> {
    if payload.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = payload
        .chunks_exact(2)
        .map(|pair| unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).ok()
}
