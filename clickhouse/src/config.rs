//! Connection settings for the ClickHouse backend.

use std::time::Duration;

use mdxdb_embeddings::DEFAULT_DIMENSION;
use serde::{Deserialize, Serialize};

/// Database used when none is configured.
pub const DEFAULT_DATABASE: &str = "mdxdb";

/// Endpoint used when none is configured.
pub const DEFAULT_URL: &str = "http://localhost:8123";

/// Settings for a ClickHouse-backed namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClickHouseConfig {
    /// HTTP interface endpoint.
    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Database holding the `data` table and the `data_latest` view.
    pub database: String,

    /// Namespace written to the `ns` column. Defaults to the database name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Width of the `embedding` column's vector index.
    pub dimensions: usize,

    /// Upper bound for each HTTP round trip.
    pub timeout_secs: u64,
}

impl ClickHouseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(&self.database)
    }
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            username: None,
            password: None,
            database: DEFAULT_DATABASE.to_string(),
            namespace: None,
            dimensions: DEFAULT_DIMENSION,
            timeout_secs: 30,
        }
    }
}
