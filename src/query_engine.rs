//! Structured-data query collaborator
//!
//! The service that owns the schema and runs the queries lives outside this
//! crate. The core only sends it an enriched question and reads back text.

use crate::error::AssistantError;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, error};

/// Trait for the data-query agent
#[async_trait]
pub trait DataQueryEngine: Send + Sync {
    /// `{input: question}` → `{output: text}`
    async fn invoke(&self, input: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    output: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Query engine reached over HTTP JSON
#[derive(Clone)]
pub struct HttpQueryEngine {
    client: Client,
    url: String,
}

impl HttpQueryEngine {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(AssistantError::Config(
                "DATA_QUERY_URL is not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl DataQueryEngine for HttpQueryEngine {
    async fn invoke(&self, input: &str) -> Result<String> {
        debug!(url = %self.url, chars = input.len(), "Calling data query engine");

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&QueryRequest { input })
            .send()
            .await
            .map_err(|e| {
                error!("Data query request failed: {}", e);
                AssistantError::QueryEngine(format!("request failed: {}", e))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            AssistantError::QueryEngine(format!("unreadable response: {}", e))
        })?;

        if !status.is_success() {
            return Err(AssistantError::QueryEngine(format!(
                "query service returned {}: {}",
                status, body
            )));
        }

        parse_output(&body)
    }
}

fn parse_output(body: &str) -> Result<String> {
    let parsed: QueryResponse = serde_json::from_str(body)
        .map_err(|e| AssistantError::QueryEngine(format!("invalid JSON response: {}", e)))?;

    if let Some(message) = parsed.error {
        return Err(AssistantError::QueryEngine(message));
    }

    parsed
        .output
        .ok_or_else(|| AssistantError::QueryEngine("response has no 'output' field".to_string()))
}

/// Scripted query engine for development & testing
pub struct MockQueryEngine {
    script: Mutex<VecDeque<std::result::Result<String, String>>>,
    inputs: Mutex<Vec<String>>,
}

impl MockQueryEngine {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn then_reply(self, output: impl Into<String>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Ok(output.into()));
        }
        self
    }

    pub fn then_fail(self, message: impl Into<String>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Err(message.into()));
        }
        self
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().map(|i| i.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.inputs.lock().map(|i| i.len()).unwrap_or(0)
    }
}

impl Default for MockQueryEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataQueryEngine for MockQueryEngine {
    async fn invoke(&self, input: &str) -> Result<String> {
        if let Ok(mut inputs) = self.inputs.lock() {
            inputs.push(input.to_string());
        }

        match self.script.lock().ok().and_then(|mut s| s.pop_front()) {
            Some(Ok(output)) => Ok(output),
            Some(Err(message)) => Err(AssistantError::QueryEngine(message)),
            None => Err(AssistantError::QueryEngine(
                "mock query engine has no reply".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_output() {
        assert_eq!(parse_output(r#"{"output":"Total: 1,000"}"#).unwrap(), "Total: 1,000");
    }

    #[test]
    fn test_parse_output_errors() {
        assert!(parse_output("not json").is_err());
        assert!(parse_output(r#"{"result":"x"}"#).is_err());

        let err = parse_output(r#"{"output":null,"error":"relation does not exist"}"#)
            .unwrap_err()
            .to_string();
        assert!(err.contains("relation does not exist"));
    }

    #[test]
    fn test_empty_url_is_config_error() {
        let result = HttpQueryEngine::new("", Duration::from_secs(5));
        assert!(matches!(result, Err(AssistantError::Config(_))));
    }

    #[tokio::test]
    async fn test_mock_records_inputs() {
        let engine = MockQueryEngine::new().then_reply("ok").then_fail("down");
        assert_eq!(engine.invoke("q1").await.unwrap(), "ok");
        assert!(engine.invoke("q2").await.is_err());
        assert!(engine.invoke("q3").await.is_err());
        assert_eq!(engine.inputs(), vec!["q1", "q2", "q3"]);
    }
}
