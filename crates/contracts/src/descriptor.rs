//! Work-unit descriptors - discovery output consumed by the dispatcher
//!
//! A descriptor is created once by the discovery stage and only read afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// A discovered file on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Full path to the file
    pub file_path: PathBuf,

    /// File name without directories
    pub file_name: String,

    /// Lower-case extension with leading dot (".txt"), empty when absent
    pub file_extension: String,

    /// Size in bytes
    #[serde(default)]
    pub file_size: u64,

    /// Last modification time, if the filesystem reports one
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,
}

impl FileDescriptor {
    /// Build a descriptor from a path without touching the filesystem
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let file_path = path.into();
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_extension = extension_of(&file_path);

        Self {
            file_path,
            file_name,
            file_extension,
            file_size: 0,
            modified_at: None,
        }
    }

    /// Build a descriptor and fill size / mtime from file metadata
    pub fn from_path(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let mut descriptor = Self::new(path);
        let metadata = std::fs::metadata(&descriptor.file_path)?;
        descriptor.file_size = metadata.len();
        descriptor.modified_at = metadata.modified().ok().map(DateTime::<Utc>::from);
        Ok(descriptor)
    }

    /// Path as displayed in logs and sample metadata
    pub fn display_path(&self) -> String {
        self.file_path.display().to_string()
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

/// A discovered URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlDescriptor {
    pub url: String,
}

impl UrlDescriptor {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// One routable item: a file or a URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Descriptor {
    File(FileDescriptor),
    Url(UrlDescriptor),
}

impl Descriptor {
    /// Returns the file descriptor, if this is a file
    pub fn as_file(&self) -> Option<&FileDescriptor> {
        match self {
            Self::File(file) => Some(file),
            Self::Url(_) => None,
        }
    }

    /// Returns the URL descriptor, if this is a URL
    pub fn as_url(&self) -> Option<&UrlDescriptor> {
        match self {
            Self::File(_) => None,
            Self::Url(url) => Some(url),
        }
    }

    /// Source location (path or URL) used in sample metadata
    pub fn source(&self) -> String {
        match self {
            Self::File(file) => file.display_path(),
            Self::Url(url) => url.url.clone(),
        }
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source())
    }
}

impl From<FileDescriptor> for Descriptor {
    fn from(file: FileDescriptor) -> Self {
        Self::File(file)
    }
}

impl From<UrlDescriptor> for Descriptor {
    fn from(url: UrlDescriptor) -> Self {
        Self::Url(url)
    }
}

/// Batching weight of one item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cost {
    /// Known weight (e.g. page count)
    Sized(u64),
    /// Weight unknown or not applicable
    Unsized,
}

/// Discovery output, ready to be dispatched
///
/// Files are grouped by the root they were discovered under. `BTreeMap`
/// keeps root iteration order deterministic, which routing relies on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatcherReadyResult {
    /// Discovery root -> files found beneath it
    pub file_paths: BTreeMap<PathBuf, Vec<FileDescriptor>>,

    /// URLs to process
    #[serde(default)]
    pub urls: Vec<UrlDescriptor>,
}

impl DispatcherReadyResult {
    /// Create empty result
    pub fn new() -> Self {
        Self::default()
    }

    /// Add files discovered under `root`
    pub fn add_files(&mut self, root: impl Into<PathBuf>, files: Vec<FileDescriptor>) {
        self.file_paths.entry(root.into()).or_default().extend(files);
    }

    /// Add a URL
    pub fn add_url(&mut self, url: impl Into<String>) {
        self.urls.push(UrlDescriptor::new(url));
    }

    /// All files in root order, then discovery order
    pub fn files(&self) -> impl Iterator<Item = &FileDescriptor> {
        self.file_paths.values().flatten()
    }

    /// Total number of files and URLs
    pub fn len(&self) -> usize {
        self.files().count() + self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
