//! Model backend configuration read from the process environment.
//!
//! `LlmConfig::from_env` reads `OPENAI_MODEL`, `OPENAI_API_KEY` and
//! `OPENAI_API_BASE`. Nothing is validated here: a missing key or base URL
//! surfaces as a backend error at first use, not at startup.

/// Model backend config: model name, API key, base URL, sampling temperature.
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    /// Model name, e.g. `gpt-4o-mini`.
    pub model: String,
    /// API key. `None` is passed through; the backend rejects it on first call.
    pub api_key: Option<String>,
    /// API base URL, e.g. `https://api.openai.com/v1`. `None` uses the backend default.
    pub api_base: Option<String>,
    /// Sampling temperature 0-2, lower is more deterministic. `None` uses the API default.
    pub temperature: Option<f32>,
}

impl LlmConfig {
    /// Reads config from the environment. Missing model falls back to `gpt-4o-mini`;
    /// key and base stay `None` when unset.
    pub fn from_env() -> Self {
        Self {
            model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            api_base: std::env::var("OPENAI_API_BASE").ok(),
            temperature: std::env::var("OPENAI_TEMPERATURE")
                .ok()
                .and_then(|t| t.parse().ok()),
        }
    }

    /// Sets the model name (builder style).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the sampling temperature (builder style).
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}
