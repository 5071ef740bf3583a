//! The columnar engine boundary.
//!
//! [`ColumnarEngine`] is the only thing the collection code talks to.
//! [`HttpEngine`] speaks ClickHouse's HTTP interface; tests swap in an
//! engine that records statements and replays canned rows.

use std::time::Duration;

use async_trait::async_trait;
use mdxdb_core::{MdxdbError, Result};
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::ClickHouseConfig;
use crate::response::normalize_rows;

/// Settings sent with every request. The schema needs both.
pub const ENGINE_SETTINGS: &[(&str, &str)] = &[
    ("allow_experimental_json_type", "1"),
    ("allow_experimental_vector_similarity_index", "1"),
];

/// SQL execution against a columnar store.
#[async_trait]
pub trait ColumnarEngine: Send + Sync {
    /// Run a query with typed `{name:Type}` parameters and return the
    /// decoded response body.
    async fn query(&self, sql: &str, params: &Map<String, Value>) -> Result<Value>;

    /// Run a statement that returns nothing useful (DDL, inserts).
    async fn exec(&self, sql: &str) -> Result<()>;

    /// Server version string, e.g. `24.10.1.2812`.
    async fn version(&self) -> Result<String>;
}

/// [`ColumnarEngine`] over the ClickHouse HTTP interface.
pub struct HttpEngine {
    client: reqwest::Client,
    url: String,
    database: String,
    username: Option<String>,
    password: Option<String>,
    timeout: Duration,
}

impl HttpEngine {
    pub fn new(config: &ClickHouseConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.url.trim_end_matches('/').to_string(),
            database: config.database.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            timeout: config.timeout(),
        }
    }

    async fn send(
        &self,
        operation: &'static str,
        body: String,
        params: Vec<(String, String)>,
    ) -> Result<String> {
        let mut request = self
            .client
            .post(format!("{}/", self.url))
            .query(&[("database", self.database.as_str())])
            .query(ENGINE_SETTINGS)
            .query(&params)
            .timeout(self.timeout)
            .body(body);

        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_deref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(operation, &e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| transport_error(operation, &e))?;

        if !status.is_success() {
            return Err(MdxdbError::Remote {
                operation,
                status: status.as_u16(),
                message: text.trim().to_string(),
            });
        }

        Ok(text)
    }
}

#[async_trait]
impl ColumnarEngine for HttpEngine {
    async fn query(&self, sql: &str, params: &Map<String, Value>) -> Result<Value> {
        debug!("ClickHouse query: {sql}");

        let params = params
            .iter()
            .map(|(name, value)| (format!("param_{name}"), encode_param(value)))
            .collect();

        let text = self
            .send("clickhouse query", format!("{sql} FORMAT JSON"), params)
            .await?;

        serde_json::from_str(&text).map_err(|e| {
            MdxdbError::UnexpectedResponseFormat(format!("response is not JSON: {e}"))
        })
    }

    async fn exec(&self, sql: &str) -> Result<()> {
        debug!("ClickHouse exec: {}", sql.lines().next().unwrap_or_default());
        self.send("clickhouse exec", sql.to_string(), Vec::new())
            .await?;
        Ok(())
    }

    async fn version(&self) -> Result<String> {
        let response = self.query("SELECT version() AS version", &Map::new()).await?;
        normalize_rows(response)?
            .into_iter()
            .next()
            .and_then(|row| row.get("version").and_then(Value::as_str).map(str::to_string))
            .ok_or_else(|| {
                MdxdbError::UnexpectedResponseFormat("version() returned no rows".to_string())
            })
    }
}

fn transport_error(operation: &'static str, err: &reqwest::Error) -> MdxdbError {
    if err.is_timeout() {
        MdxdbError::Timeout {
            operation,
            message: err.to_string(),
        }
    } else {
        MdxdbError::Transport {
            operation,
            message: err.to_string(),
        }
    }
}

/// Render a parameter value in the escaped text form ClickHouse expects
/// for `param_<name>` values.
pub fn encode_param(value: &Value) -> String {
    match value {
        Value::Null => "\\N".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => escape(s),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(literal).collect();
            format!("[{}]", items.join(","))
        }
        Value::Object(_) => escape(&value.to_string()),
    }
}

/// Value as it appears inside an array literal.
fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        Value::Null => "NULL".to_string(),
        other => encode_param(other),
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\t', "\\t")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}
