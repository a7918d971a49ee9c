//! Threads, runs and messages of the hosted assistants service.
//!
//! This is the stateful protocol the run coordinator drives: messages are
//! appended to a remote thread, a run executes an assistant against it, and
//! the run's status is polled until it settles. Every call is a thin
//! pass-through; failures surface as the service reported them and nothing
//! is retried here.

use async_trait::async_trait;
use scholar_common::{Result, validate_identifier};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::http::{DEFAULT_BASE_URL, build_http_client, read_json, transport_error};

/// Observed status of a remote run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Completed,
    Failed,
    Cancelled,
    Expired,
    /// Any status this crate does not model (e.g. `cancelling`, `incomplete`).
    Other(String),
}

impl RunStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::RequiresAction => "requires_action",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Expired => "expired",
            RunStatus::Other(raw) => raw,
        }
    }

    /// `queued` and `in_progress`: the run is still working.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, RunStatus::Queued | RunStatus::InProgress)
    }

    /// In flight or paused on a tool call. Either way the thread is blocked.
    pub fn is_active(&self) -> bool {
        self.is_in_flight() || matches!(self, RunStatus::RequiresAction)
    }

    /// `completed`, `failed`, `cancelled` or `expired`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled | RunStatus::Expired
        )
    }
}

impl From<String> for RunStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "queued" => RunStatus::Queued,
            "in_progress" => RunStatus::InProgress,
            "requires_action" => RunStatus::RequiresAction,
            "completed" => RunStatus::Completed,
            "failed" => RunStatus::Failed,
            "cancelled" => RunStatus::Cancelled,
            "expired" => RunStatus::Expired,
            _ => RunStatus::Other(raw),
        }
    }
}

impl From<RunStatus> for String {
    fn from(status: RunStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub assistant_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub required_action: Option<RequiredAction>,
}

impl Run {
    /// Tool calls the run is waiting on, empty when it needs no action.
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.required_action
            .as_ref()
            .and_then(|action| action.submit_tool_outputs.as_ref())
            .map(|outputs| outputs.tool_calls.as_slice())
            .unwrap_or(&[])
    }
}

/// Action descriptor embedded in a `requires_action` run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequiredAction {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub submit_tool_outputs: Option<SubmitToolOutputs>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitToolOutputs {
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "default_tool_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

fn default_tool_kind() -> String {
    "function".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, exactly as the model produced them.
    #[serde(default)]
    pub arguments: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    pub role: String,
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

impl ThreadMessage {
    /// Concatenated text parts, `None` when the message has no text.
    pub fn text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .content
            .iter()
            .filter_map(|part| part.text.as_ref().map(|t| t.value.as_str()))
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageContent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<TextContent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextContent {
    pub value: String,
}

#[derive(Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
}

/// Remote operations the run coordinator needs.
#[async_trait]
pub trait AssistantsApi: Send + Sync {
    async fn create_thread(&self) -> Result<Thread>;

    async fn create_message(&self, thread_id: &str, content: &str) -> Result<ThreadMessage>;

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run>;

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run>;

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<Run>;

    async fn list_runs(&self, thread_id: &str) -> Result<Vec<Run>>;

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run>;

    /// Messages on the thread, newest first.
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>>;

    /// Runs on the thread whose status satisfies `predicate`.
    async fn list_runs_with_status(
        &self,
        thread_id: &str,
        predicate: for<'r> fn(&'r RunStatus) -> bool,
    ) -> Result<Vec<Run>> {
        let runs = self.list_runs(thread_id).await?;
        Ok(runs.into_iter().filter(|run| predicate(&run.status)).collect())
    }

    /// Text of the most recent assistant-authored message.
    ///
    /// `None` when that message has no text part; older replies are never used.
    async fn latest_assistant_message(&self, thread_id: &str) -> Result<Option<String>> {
        let messages = self.list_messages(thread_id).await?;
        Ok(messages
            .iter()
            .find(|message| message.role == "assistant")
            .and_then(ThreadMessage::text))
    }
}

/// HTTP implementation of [`AssistantsApi`].
pub struct AssistantsClient {
    base_url: String,
    api_key: String,
    http_client: reqwest::Client,
}

impl AssistantsClient {
    pub fn new(base_url: Option<String>, api_key: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            http_client: build_http_client(timeout)?,
        })
    }

    fn thread_url(&self, thread_id: &str, tail: &str) -> Result<String> {
        validate_identifier("thread", thread_id)?;
        Ok(format!("{}/threads/{}{}", self.base_url, thread_id, tail))
    }

    fn run_url(&self, thread_id: &str, run_id: &str, tail: &str) -> Result<String> {
        validate_identifier("run", run_id)?;
        self.thread_url(thread_id, &format!("/runs/{run_id}{tail}"))
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.http_client
            .get(url)
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.http_client
            .post(url)
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| transport_error(&format!("{context} request failed"), e))?;
        read_json(response, context).await
    }
}

#[async_trait]
impl AssistantsApi for AssistantsClient {
    async fn create_thread(&self) -> Result<Thread> {
        let url = format!("{}/threads", self.base_url);
        let thread: Thread = self
            .send(self.post(&url).json(&serde_json::json!({})), "create thread")
            .await?;
        debug!(thread_id = %thread.id, "Thread created");
        Ok(thread)
    }

    async fn create_message(&self, thread_id: &str, content: &str) -> Result<ThreadMessage> {
        let url = self.thread_url(thread_id, "/messages")?;
        let body = serde_json::json!({ "role": "user", "content": content });
        self.send(self.post(&url).json(&body), "create message").await
    }

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run> {
        validate_identifier("assistant", assistant_id)?;
        let url = self.thread_url(thread_id, "/runs")?;
        let body = serde_json::json!({ "assistant_id": assistant_id });
        let run: Run = self.send(self.post(&url).json(&body), "create run").await?;
        debug!(thread_id, assistant_id, run_id = %run.id, "Run created");
        Ok(run)
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        let url = self.run_url(thread_id, run_id, "")?;
        self.send(self.get(&url), "retrieve run").await
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<Run> {
        let url = self.run_url(thread_id, run_id, "/submit_tool_outputs")?;
        let body = serde_json::json!({ "tool_outputs": outputs });
        self.send(self.post(&url).json(&body), "submit tool outputs")
            .await
    }

    async fn list_runs(&self, thread_id: &str) -> Result<Vec<Run>> {
        let url = self.thread_url(thread_id, "/runs?limit=100")?;
        let list: ListResponse<Run> = self.send(self.get(&url), "list runs").await?;
        Ok(list.data)
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        let url = self.run_url(thread_id, run_id, "/cancel")?;
        self.send(self.post(&url), "cancel run").await
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>> {
        let url = self.thread_url(thread_id, "/messages?order=desc&limit=20")?;
        let list: ListResponse<ThreadMessage> = self.send(self.get(&url), "list messages").await?;
        Ok(list.data)
    }
}
