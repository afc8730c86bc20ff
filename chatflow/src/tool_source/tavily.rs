//! Tavily web search as a ToolSource.
//!
//! Wraps reqwest::Client and exposes one `web_search` tool. Each call POSTs
//! the query to the Tavily search API and renders the bounded result list as
//! JSON text for the tool message.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ToolOutput, ToolSource, ToolSourceError, ToolSpec};

/// Tool name for the web search operation.
pub const TOOL_WEB_SEARCH: &str = "web_search";

const TAVILY_API_URL: &str = "https://api.tavily.com/search";

/// Default result bound per query.
const DEFAULT_MAX_RESULTS: usize = 2;

/// Tavily search tool source.
///
/// `max_results` bounds the result list per query (default 2). The API key
/// is not validated at construction; a bad key surfaces as a transport error
/// on first call.
pub struct TavilySearch {
    client: reqwest::Client,
    api_key: String,
    max_results: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize, serde::Serialize)]
struct SearchResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

impl TavilySearch {
    /// Creates a search source with the given API key and default bounds.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    /// Sets the per-query result bound (builder style).
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Uses a custom HTTP client (timeouts, proxies).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl ToolSource for TavilySearch {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolSourceError> {
        Ok(vec![ToolSpec {
            name: TOOL_WEB_SEARCH.to_string(),
            description: Some(
                "Search the web for current information. Returns a short list of \
                 results with title, url and content."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query."
                    }
                },
                "required": ["query"]
            }),
        }])
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolOutput, ToolSourceError> {
        if name != TOOL_WEB_SEARCH {
            return Err(ToolSourceError::UnknownTool(name.to_string()));
        }
        let query = arguments
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing query".to_string()))?;

        let response = self
            .client
            .post(TAVILY_API_URL)
            .json(&json!({
                "api_key": self.api_key,
                "query": query,
                "max_results": self.max_results,
            }))
            .send()
            .await
            .map_err(|e| ToolSourceError::Transport(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ToolSourceError::Transport(format!(
                "request failed with status: {}",
                response.status()
            )));
        }

        let mut body: SearchResponse = response
            .json()
            .await
            .map_err(|e| ToolSourceError::Transport(format!("failed to read response: {}", e)))?;
        body.results.truncate(self.max_results);

        let text = serde_json::to_string(&body.results)
            .map_err(|e| ToolSourceError::Transport(format!("failed to encode results: {}", e)))?;
        Ok(ToolOutput { text })
    }
}
