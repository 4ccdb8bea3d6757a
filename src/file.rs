use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::error::{Error, Result};
use crate::SeekableReader;

/// Where delivered files live.
///
/// Every call to [`Storage::open`] must return an independent handle with its
/// own read position.
pub trait Storage: Send + Sync {
    type Reader: SeekableReader + Send + 'static;

    fn exists(&self, path: &Path) -> impl Future<Output = bool> + Send;

    fn is_readable(&self, path: &Path) -> impl Future<Output = bool> + Send;

    fn size(&self, path: &Path) -> impl Future<Output = io::Result<u64>> + Send;

    fn open(&self, path: &Path) -> impl Future<Output = io::Result<Self::Reader>> + Send;
}

/// [`Storage`] backed by the local file system through [`tokio::fs`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStorage;

impl Storage for LocalStorage {
    type Reader = fs::File;

    async fn exists(&self, path: &Path) -> bool {
        fs::try_exists(path).await.unwrap_or(false)
    }

    /// Only regular files that can actually be opened count as readable.
    async fn is_readable(&self, path: &Path) -> bool {
        match fs::metadata(path).await {
            Ok(metadata) if metadata.is_file() => fs::File::open(path).await.is_ok(),
            _ => false,
        }
    }

    async fn size(&self, path: &Path) -> io::Result<u64> {
        Ok(fs::metadata(path).await?.len())
    }

    async fn open(&self, path: &Path) -> io::Result<fs::File> {
        fs::File::open(path).await
    }
}

/// A readable file whose size was fixed when it was validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResource {
    path: PathBuf,
    size: u64,
}

impl FileResource {
    /// Checks that `path` exists and is readable, then records its size.
    pub async fn validate<S: Storage>(storage: &S, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if !storage.exists(&path).await {
            return Err(Error::unavailable(path, io::ErrorKind::NotFound, "file does not exist"));
        }
        if !storage.is_readable(&path).await {
            return Err(Error::unavailable(path, io::ErrorKind::PermissionDenied, "file cannot be read"));
        }

        let size = storage.size(&path).await;
        let size = match size {
            Ok(size) => size,
            Err(source) => return Err(Error::ResourceUnavailable { path, source }),
        };

        debug!(path = %path.display(), size, "validated file");
        Ok(FileResource { path, size })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Final path component, or an empty string if there is none.
    pub fn base_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Guesses a MIME type from the file extension.
pub fn guess_content_type(path: &Path) -> Option<String> {
    mime_guess::from_path(path).first_raw().map(str::to_string)
}
