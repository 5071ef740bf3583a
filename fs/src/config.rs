//! Configuration for the filesystem backend.

use std::path::PathBuf;

use mdxdb_embeddings::DEFAULT_DIMENSION;
use serde::{Deserialize, Serialize};

/// Where and how a filesystem database stores its namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FsConfig {
    /// Namespace root. Collections are its subdirectories.
    pub root: PathBuf,

    /// Namespace name. Defaults to the root directory's name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Width of every stored and query vector.
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

fn default_dimensions() -> usize {
    DEFAULT_DIMENSION
}

impl FsConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            namespace: None,
            dimensions: DEFAULT_DIMENSION,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// The configured namespace, else the last component of the root.
    pub fn namespace(&self) -> String {
        self.namespace.clone().unwrap_or_else(|| {
            self.root
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }
}

impl Default for FsConfig {
    fn default() -> Self {
        Self::new(".")
    }
}
