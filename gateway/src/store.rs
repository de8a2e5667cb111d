use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid snippet name '{0}'")]
    InvalidName(String),
    #[error("storage I/O failed for '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Named text blobs. Names are used verbatim as object names.
#[async_trait]
pub trait SnippetStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<String>, StoreError>;
    async fn put(&self, name: &str, content: &str) -> Result<(), StoreError>;
}

/// One `<name>.json` file per snippet under a container directory. A `/` in
/// a name nests the blob in subdirectories, as blob-store virtual paths do.
pub struct FsSnippetStore {
    root: PathBuf,
}

impl FsSnippetStore {
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .await
            .map_err(|source| StoreError::Io {
                name: root.display().to_string(),
                source,
            })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        // Every component must be a plain segment so the blob stays under root.
        let escapes = name
            .split(['/', '\\'])
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");
        if escapes {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(format!("{}.json", name)))
    }
}

#[async_trait]
impl SnippetStore for FsSnippetStore {
    async fn get(&self, name: &str) -> Result<Option<String>, StoreError> {
        let path = self.blob_path(name)?;
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                name: name.to_string(),
                source,
            }),
        }
    }

    async fn put(&self, name: &str, content: &str) -> Result<(), StoreError> {
        let path = self.blob_path(name)?;
        let io_error = |source| StoreError::Io {
            name: name.to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        fs::write(&path, content).await.map_err(io_error)
    }
}
