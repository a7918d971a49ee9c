pub mod assistants;
pub mod client;
pub mod config;
pub mod http;
pub mod openai;

pub use assistants::{
    AssistantsApi, AssistantsClient, FunctionCall, RequiredAction, Run, RunStatus, Thread,
    ThreadMessage, ToolCall, ToolOutput,
};
pub use client::{ChatMessage, LlmClient, LlmRequest, LlmResponse, Role, TokenUsage};
pub use config::{LlmConfig, build_assistants_client, build_llm_client};
pub use openai::OpenAiClient;
