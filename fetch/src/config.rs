//! Settings for the HTTP backend.

use std::time::Duration;

use mdxdb_core::derive_namespace;
use serde::{Deserialize, Serialize};

/// Where the remote mdxdb service lives and how to authenticate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Base URL; collections are path segments below it.
    pub url: String,

    /// Sent as a bearer token when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Defaults to the namespace derived from `url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl FetchConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            namespace: None,
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn namespace(&self) -> String {
        self.namespace
            .clone()
            .or_else(|| derive_namespace(&self.url))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_namespace_from_url() {
        assert_eq!(
            FetchConfig::new("https://db.example.com/api").namespace(),
            "db.example.com"
        );
        assert_eq!(
            FetchConfig::new("https://db.example.com")
                .with_namespace("docs")
                .namespace(),
            "docs"
        );
    }
}
