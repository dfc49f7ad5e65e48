//! Files served from a single root directory.
//!
//! Request paths are untrusted. They are resolved relative to the root and
//! must stay inside it after symlinks are followed.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tokio::fs::File;

use crate::error::FileError;

/// Read-only view of the serve directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

/// A file opened for streaming to a client.
#[derive(Debug)]
pub struct OpenedFile {
    /// Open handle positioned at the start
    pub file: File,

    /// Size in bytes
    pub len: u64,

    /// Final path component, used for the download name
    pub file_name: String,
}

impl FileStore {
    /// Serve files below `root`. The directory must exist.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, FileError> {
        let root = root.as_ref();
        let canonical = std::fs::canonicalize(root).map_err(|e| io_error(root, &e))?;
        if !canonical.is_dir() {
            return Err(FileError::InvalidPath(format!(
                "serve root is not a directory: {}",
                canonical.display()
            )));
        }
        Ok(Self { root: canonical })
    }

    /// The canonical serve root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a request path to a regular file inside the root.
    pub async fn resolve(&self, relative: &str) -> Result<PathBuf, FileError> {
        let candidate = Path::new(relative);
        let mut has_name = false;
        for component in candidate.components() {
            match component {
                Component::Normal(_) => has_name = true,
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(FileError::InvalidPath(relative.to_string()));
                }
            }
        }
        if !has_name {
            return Err(FileError::InvalidPath(relative.to_string()));
        }

        let joined = self.root.join(candidate);
        let canonical = match tokio::fs::canonicalize(&joined).await {
            Ok(path) => path,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(FileError::NotFound(relative.to_string()))
            }
            Err(e) => return Err(io_error(&joined, &e)),
        };

        // Symlinks may point anywhere.
        if !canonical.starts_with(&self.root) {
            return Err(FileError::InvalidPath(relative.to_string()));
        }

        let metadata = tokio::fs::metadata(&canonical)
            .await
            .map_err(|e| io_error(&canonical, &e))?;
        if !metadata.is_file() {
            return Err(FileError::NotFound(relative.to_string()));
        }

        Ok(canonical)
    }

    /// Open a file for streaming.
    pub async fn open(&self, relative: &str) -> Result<OpenedFile, FileError> {
        let path = self.resolve(relative).await?;
        let file = File::open(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => FileError::NotFound(relative.to_string()),
            _ => io_error(&path, &e),
        })?;
        let len = file
            .metadata()
            .await
            .map_err(|e| io_error(&path, &e))?
            .len();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(OpenedFile {
            file,
            len,
            file_name,
        })
    }
}

fn io_error(path: &Path, err: &std::io::Error) -> FileError {
    FileError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}
