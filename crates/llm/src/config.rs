use std::sync::Arc;
use std::time::Duration;

use scholar_common::{Result, ScholarError};
use serde::{Deserialize, Serialize};

use crate::assistants::{AssistantsApi, AssistantsClient};
use crate::client::LlmClient;
use crate::openai::OpenAiClient;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    pub model: String,
    pub api_url: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_timeout_ms() -> u64 {
    60_000
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Build the chat-completions client for the configured provider.
pub fn build_llm_client(config: &LlmConfig, api_key: &str) -> Result<Arc<dyn LlmClient>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiClient::new(
            config.api_url.clone(),
            config.model.clone(),
            api_key.to_string(),
            config.timeout(),
        )?)),
        other => Err(ScholarError::Config(format!(
            "Unknown LLM provider: {other}"
        ))),
    }
}

/// Build the threads/runs client sharing the same endpoint settings.
pub fn build_assistants_client(
    api_url: Option<String>,
    api_key: &str,
    timeout: Duration,
) -> Result<Arc<dyn AssistantsApi>> {
    Ok(Arc::new(AssistantsClient::new(
        api_url,
        api_key.to_string(),
        timeout,
    )?))
}
