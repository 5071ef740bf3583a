//! Thin JSON-over-HTTP client shared by the database and its collections.

use std::time::Duration;

use mdxdb_core::{MdxdbError, Result};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::FetchConfig;

pub struct FetchClient {
    http: reqwest::Client,
    base: Url,
    api_key: Option<String>,
    timeout: Duration,
}

/// What a request was about, for mapping error statuses.
#[derive(Debug, Clone, Copy)]
pub struct Target<'a> {
    pub operation: &'static str,
    pub collection: &'a str,
    pub id: Option<&'a str>,
}

impl FetchClient {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let mut base = Url::parse(&config.url).map_err(|e| {
            MdxdbError::Configuration(format!("invalid fetch url {}: {e}", config.url))
        })?;
        if base.cannot_be_a_base() {
            return Err(MdxdbError::Configuration(format!(
                "fetch url {} cannot have path segments",
                config.url
            )));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            http: reqwest::Client::new(),
            base,
            api_key: config.api_key.clone(),
            timeout: config.timeout(),
        })
    }

    /// URL of `segments` below the base, each one percent-encoded.
    pub fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let mut request = self
            .http
            .request(method, self.url(segments))
            .timeout(self.timeout);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }
        request
    }

    /// Send and decode a JSON answer.
    pub async fn send_json<B, T>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
        target: Target<'_>,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(method, segments, body, target).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(target, &e))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            MdxdbError::UnexpectedResponseFormat(format!("{}: {e}", target.operation))
        })
    }

    /// Send and check the status; the body is returned untouched.
    pub async fn send<B>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
        target: Target<'_>,
    ) -> Result<Response>
    where
        B: Serialize + ?Sized,
    {
        let mut request = self.request(method, segments);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| transport_error(target, &e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = error_message(response).await;
        Err(status_error(status, message, target))
    }
}

fn transport_error(target: Target<'_>, err: &reqwest::Error) -> MdxdbError {
    if err.is_timeout() {
        MdxdbError::Timeout {
            operation: target.operation,
            message: err.to_string(),
        }
    } else {
        MdxdbError::Transport {
            operation: target.operation,
            message: err.to_string(),
        }
    }
}

/// Prefer the `error` field of a JSON body, else the raw text.
async fn error_message(response: Response) -> String {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|body| body.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or(text)
}

fn status_error(status: StatusCode, message: String, target: Target<'_>) -> MdxdbError {
    let collection = target.collection.to_string();
    let id = target.id.unwrap_or_default().to_string();
    match status {
        StatusCode::NOT_FOUND => MdxdbError::NotFound { collection, id },
        StatusCode::CONFLICT => MdxdbError::DuplicateDocument { collection, id },
        StatusCode::NOT_IMPLEMENTED => MdxdbError::NotImplemented {
            operation: target.operation,
            collection,
        },
        _ => MdxdbError::Remote {
            operation: target.operation,
            status: status.as_u16(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_url_segments_are_encoded() {
        let client = FetchClient::new(&FetchConfig::new("https://db.example.com/api")).unwrap();
        assert_eq!(
            client.url(&["posts", "https://example.com/a b"]).as_str(),
            "https://db.example.com/api/posts/https:%2F%2Fexample.com%2Fa%20b"
        );
        assert_eq!(client.url(&[]).as_str(), "https://db.example.com/api");
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(
            FetchClient::new(&FetchConfig::new("not a url")),
            Err(MdxdbError::Configuration(_))
        ));
    }
}
