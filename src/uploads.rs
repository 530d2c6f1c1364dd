//! Upload directory management
//!
//! Stores uploaded images under generated names, lists, reads and deletes them.
//! In read-only deployments nothing touches the filesystem.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::ServerConfig;
use crate::media::{self, FALLBACK_EXTENSION};

/// URL prefix uploads are served under
pub const UPLOADS_URL_PREFIX: &str = "/uploads/";

/// One image in a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageEntry {
    pub filename: String,
    pub path: String,
    pub url: String,
}

/// Result of storing an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    pub filename: String,
    /// `/uploads/<filename>`; `None` when the deployment is read-only
    pub file_path: Option<String>,
}

/// Upload storage errors
#[derive(Debug)]
pub enum StoreError {
    /// Name contains separators or is otherwise unsafe
    InvalidName(String),
    /// Path resolves outside the uploads directory
    PathEscape(String),
    NotFound(String),
    /// File was written but cannot be found afterwards
    NotPersisted(String),
    Io(std::io::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::InvalidName(name) => write!(f, "Invalid file name: {:?}", name),
            StoreError::PathEscape(path) => write!(f, "Path escapes uploads directory: {:?}", path),
            StoreError::NotFound(name) => write!(f, "File not found: {}", name),
            StoreError::NotPersisted(name) => write!(f, "File missing after write: {}", name),
            StoreError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

/// Reject names that could address anything but a direct child of the
/// uploads directory.
pub fn validate_filename(name: &str) -> Result<(), StoreError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(&['/', '\\', '\0'][..]);
    if bad {
        Err(StoreError::InvalidName(name.to_string()))
    } else {
        Ok(())
    }
}

/// Extract the file name from a gallery path.
///
/// Accepts `/uploads/<f>`, `uploads/<f>`, absolute URLs containing
/// `/uploads/`, or a bare file name.
pub fn filename_from_path(path: &str) -> &str {
    let rest = if let Some(rest) = path.strip_prefix(UPLOADS_URL_PREFIX) {
        rest
    } else if let Some(rest) = path.strip_prefix("uploads/") {
        rest
    } else if let Some((_, rest)) = path.split_once(UPLOADS_URL_PREFIX) {
        rest
    } else {
        path
    };
    // Stop at a second `/uploads/`, as the browser client did
    rest.split(UPLOADS_URL_PREFIX).next().unwrap_or(rest)
}

/// Whether a gallery entry refers to a server-stored upload
pub fn is_server_path(image: &str) -> bool {
    !image.starts_with("data:") && (image.starts_with(UPLOADS_URL_PREFIX) || image.contains(UPLOADS_URL_PREFIX))
}

/// `<unix millis>-<random below 1e9>.<ext>`
pub fn generate_filename(original_name: &str) -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let suffix: u32 = rand::rng().random_range(0..1_000_000_000);
    // A bare trailing dot counts as no extension, so "photo." is stored as .jpg
    let ext = media::extension_of(original_name).unwrap_or_else(|| FALLBACK_EXTENSION.to_string());
    format!("{}-{}.{}", timestamp, suffix, ext)
}

/// Filesystem-backed upload store
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    public_base_url: String,
    read_only: bool,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, public_base_url: impl Into<String>, read_only: bool) -> Self {
        Self {
            dir: dir.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            read_only,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.uploads_dir.clone(), config.public_base_url.clone(), config.read_only)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Store `bytes` under a generated name derived from `original_name`.
    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> Result<StoredUpload, StoreError> {
        let filename = generate_filename(original_name);
        if self.read_only {
            tracing::debug!(filename = %filename, "Read-only deployment, upload not persisted");
            return Ok(StoredUpload { filename, file_path: None });
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let full_path = self.dir.join(&filename);
        tokio::fs::write(&full_path, bytes).await?;

        if !tokio::fs::try_exists(&full_path).await.unwrap_or(false) {
            return Err(StoreError::NotPersisted(filename));
        }

        tracing::info!(filename = %filename, size = bytes.len(), "Stored upload");
        Ok(StoredUpload {
            file_path: Some(format!("{}{}", UPLOADS_URL_PREFIX, filename)),
            filename,
        })
    }

    /// List images sorted by name. A missing directory is an empty listing.
    pub async fn list(&self) -> Result<Vec<ImageEntry>, StoreError> {
        if self.read_only {
            return Ok(Vec::new());
        }

        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("Uploads directory {} does not exist", self.dir.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !media::is_listable_image(&name) {
                continue;
            }
            if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                names.push(name);
            }
        }
        names.sort();

        Ok(names.into_iter().map(|name| self.entry_for(name)).collect())
    }

    fn entry_for(&self, filename: String) -> ImageEntry {
        let path = format!("{}{}", UPLOADS_URL_PREFIX, filename);
        ImageEntry {
            url: format!("{}{}", self.public_base_url, path),
            path,
            filename,
        }
    }

    /// Delete a single upload by file name.
    pub async fn delete(&self, filename: &str) -> Result<(), StoreError> {
        validate_filename(filename)?;
        if self.read_only {
            return Err(StoreError::NotFound(filename.to_string()));
        }

        let path = self.dir.join(filename);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(filename, "Deleted upload");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(filename.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve a request path below the uploads directory.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, StoreError> {
        let rel = Path::new(relative);
        let safe = !relative.is_empty()
            && !relative.contains('\0')
            && rel.components().all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StoreError::PathEscape(relative.to_string()));
        }
        Ok(self.dir.join(rel))
    }

    /// Read an upload for static serving.
    pub async fn read(&self, relative: &str) -> Result<Vec<u8>, StoreError> {
        if self.read_only {
            return Err(StoreError::NotFound(relative.to_string()));
        }
        let path = self.resolve(relative)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(relative.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}
