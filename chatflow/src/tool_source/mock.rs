//! Mock ToolSource for tests and offline runs.
//!
//! Returns a fixed tool list and a fixed call result; records every call so
//! tests can assert how often and with what arguments the pipeline dispatched.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{ToolOutput, ToolSource, ToolSourceError, ToolSpec};

/// Mock tool source: fixed tool list, fixed call result, recorded calls.
pub struct MockToolSource {
    tools: Vec<ToolSpec>,
    call_result: String,
    calls: Mutex<Vec<(String, Value)>>,
}

impl MockToolSource {
    /// A mock listing one `web_search` tool that returns a fixed result text.
    pub fn search_example() -> Self {
        Self {
            tools: vec![ToolSpec {
                name: "web_search".to_string(),
                description: Some("Search the web for current information.".to_string()),
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
            }],
            call_result: r#"[{"title":"mock result","url":"https://example.com","content":"mock content"}]"#.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A mock with a custom tool list and fixed call result.
    pub fn new(tools: Vec<ToolSpec>, call_result: String) -> Self {
        Self {
            tools,
            call_result,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sets the text returned by call_tool (builder style).
    pub fn with_call_result(mut self, text: impl Into<String>) -> Self {
        self.call_result = text.into();
        self
    }

    /// Calls recorded so far: (tool name, arguments) per invocation.
    pub fn recorded_calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl Default for MockToolSource {
    fn default() -> Self {
        Self::search_example()
    }
}

#[async_trait]
impl ToolSource for MockToolSource {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolSourceError> {
        Ok(self.tools.clone())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolOutput, ToolSourceError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((name.to_string(), arguments));
        Ok(ToolOutput {
            text: self.call_result.clone(),
        })
    }
}
