//! Content artifact storage.
//!
//! Collections only need four operations on their content files. Paths
//! are relative to the store root and use `/` separators.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mdxdb_core::{MdxdbError, Result};
use tokio::fs;
use tracing::debug;

/// Byte-level storage for content artifacts.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Bytes of the artifact, or `None` if it does not exist.
    async fn read_artifact(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Create or replace the artifact.
    async fn write_artifact(&self, path: &str, bytes: &[u8]) -> Result<()>;

    /// Remove the artifact. Removing a missing artifact succeeds.
    async fn delete_artifact(&self, path: &str) -> Result<()>;

    /// File names directly inside `dir`. A missing `dir` is created.
    async fn list_artifacts(&self, dir: &str) -> Result<Vec<String>>;
}

/// [`ContentStore`] over a local directory.
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

#[async_trait]
impl ContentStore for FsContentStore {
    async fn read_artifact(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let full = self.resolve(path);
        match fs::read(&full).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MdxdbError::storage_io("read", full.display(), e)),
        }
    }

    async fn write_artifact(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let full = self.resolve(path);

        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| MdxdbError::storage_io("create directory", parent.display(), e))?;
        }

        // Write atomically using a temp file
        let temp_path = full.with_extension("tmp");
        fs::write(&temp_path, bytes)
            .await
            .map_err(|e| MdxdbError::storage_io("write", temp_path.display(), e))?;

        fs::rename(&temp_path, &full)
            .await
            .map_err(|e| MdxdbError::storage_io("rename", full.display(), e))?;

        debug!("Wrote artifact: {path}");
        Ok(())
    }

    async fn delete_artifact(&self, path: &str) -> Result<()> {
        let full = self.resolve(path);
        match fs::remove_file(&full).await {
            Ok(()) => {
                debug!("Deleted artifact: {path}");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MdxdbError::storage_io("delete", full.display(), e)),
        }
    }

    async fn list_artifacts(&self, dir: &str) -> Result<Vec<String>> {
        let full = self.resolve(dir);
        fs::create_dir_all(&full)
            .await
            .map_err(|e| MdxdbError::storage_io("create directory", full.display(), e))?;

        let mut entries = fs::read_dir(&full)
            .await
            .map_err(|e| MdxdbError::storage_io("list", full.display(), e))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| MdxdbError::storage_io("list", full.display(), e))?
        {
            let is_file = entry
                .file_type()
                .await
                .map_err(|e| MdxdbError::storage_io("list", entry.path().display(), e))?
                .is_file();
            if is_file {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }

        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_read_delete() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsContentStore::new(temp_dir.path());

        store.write_artifact("posts/a.mdx", b"hello").await.unwrap();
        assert_eq!(
            store.read_artifact("posts/a.mdx").await.unwrap(),
            Some(b"hello".to_vec())
        );

        store.delete_artifact("posts/a.mdx").await.unwrap();
        assert_eq!(store.read_artifact("posts/a.mdx").await.unwrap(), None);

        // Deleting twice is fine
        store.delete_artifact("posts/a.mdx").await.unwrap();
    }

    #[tokio::test]
    async fn test_list_creates_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsContentStore::new(temp_dir.path());

        assert!(store.list_artifacts("fresh").await.unwrap().is_empty());
        assert!(temp_dir.path().join("fresh").is_dir());

        store.write_artifact("fresh/b.mdx", b"b").await.unwrap();
        store.write_artifact("fresh/a.md", b"a").await.unwrap();
        assert_eq!(
            store.list_artifacts("fresh").await.unwrap(),
            vec!["a.md".to_string(), "b.mdx".to_string()]
        );
    }
}
