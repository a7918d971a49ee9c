//! Scripted stand-ins for the hosted service. No network.

#![allow(dead_code)]

use async_trait::async_trait;
use scholar_common::{Result, ScholarError};
use scholar_coordinator::{AssistantsConfig, RunCoordinator, SpecialistRegistry};
use scholar_llm::{
    AssistantsApi, LlmClient, LlmRequest, LlmResponse, Run, Thread, ThreadMessage, ToolOutput,
};
use serde_json::json;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

pub const THREAD: &str = "thread_test";
pub const ORCHESTRATOR: &str = "asst_orq";

/// One remote call as the fake saw it.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateMessage(String),
    CreateRun { assistant_id: String, run_id: String },
    Retrieve(String),
    Submit { run_id: String, outputs: Vec<(String, String)> },
    ListRuns,
    Cancel(String),
    ListMessages,
}

pub fn run(id: &str, status: &str) -> Run {
    serde_json::from_value(json!({ "id": id, "status": status })).unwrap()
}

pub fn action_run(id: &str, arguments: serde_json::Value) -> Run {
    serde_json::from_value(json!({
        "id": id,
        "status": "requires_action",
        "required_action": {
            "type": "submit_tool_outputs",
            "submit_tool_outputs": {
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {
                        "name": "encaminhar_especialista",
                        "arguments": arguments.to_string()
                    }
                }]
            }
        }
    }))
    .unwrap()
}

pub fn message(id: &str, role: &str, text: &str) -> ThreadMessage {
    serde_json::from_value(json!({
        "id": id,
        "role": role,
        "content": [{ "type": "text", "text": { "value": text, "annotations": [] } }]
    }))
    .unwrap()
}

/// An assistant reply carrying only an image part.
pub fn image_message(id: &str) -> ThreadMessage {
    serde_json::from_value(json!({
        "id": id,
        "role": "assistant",
        "content": [{ "type": "image_file", "image_file": { "file_id": "file_img" } }]
    }))
    .unwrap()
}

/// Assistants service whose responses are scripted per run id.
#[derive(Default)]
pub struct FakeAssistants {
    calls: Mutex<Vec<Call>>,
    /// Error texts returned by successive create_message calls
    message_errors: Mutex<VecDeque<String>>,
    /// Ids handed out by successive create_run calls
    run_ids: Mutex<VecDeque<String>>,
    /// Status sequence per run; the last entry repeats
    statuses: Mutex<HashMap<String, VecDeque<Run>>>,
    /// Number of retrieve calls that fail before the script resumes
    retrieve_failures: Mutex<u32>,
    runs: Mutex<Vec<Run>>,
    answer: Mutex<Option<String>>,
    /// Full thread listing, newest first; overrides `answer` when set
    messages: Mutex<Option<Vec<ThreadMessage>>>,
    cancel_fails: Mutex<bool>,
}

impl FakeAssistants {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_create_message(&self, error: &str) {
        self.message_errors.lock().unwrap().push_back(error.to_string());
    }

    /// Script a run: `create_run` hands out `id`, `retrieve_run` walks `sequence`.
    pub fn script_run(&self, id: &str, sequence: Vec<Run>) {
        self.run_ids.lock().unwrap().push_back(id.to_string());
        self.statuses
            .lock()
            .unwrap()
            .insert(id.to_string(), sequence.into());
    }

    pub fn fail_retrieves(&self, count: u32) {
        *self.retrieve_failures.lock().unwrap() = count;
    }

    pub fn set_runs(&self, runs: Vec<Run>) {
        *self.runs.lock().unwrap() = runs;
    }

    pub fn set_answer(&self, text: &str) {
        *self.answer.lock().unwrap() = Some(text.to_string());
    }

    pub fn set_messages(&self, messages: Vec<ThreadMessage>) {
        *self.messages.lock().unwrap() = Some(messages);
    }

    pub fn fail_cancels(&self) {
        *self.cancel_fails.lock().unwrap() = true;
    }

    pub fn created_runs(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::CreateRun { assistant_id, .. } => Some(assistant_id),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| predicate(call)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl AssistantsApi for FakeAssistants {
    async fn create_thread(&self) -> Result<Thread> {
        Ok(Thread {
            id: THREAD.to_string(),
        })
    }

    async fn create_message(&self, _thread_id: &str, content: &str) -> Result<ThreadMessage> {
        self.record(Call::CreateMessage(content.to_string()));
        if let Some(error) = self.message_errors.lock().unwrap().pop_front() {
            return Err(ScholarError::Api {
                status: 400,
                message: error,
            });
        }
        Ok(message("msg_user", "user", content))
    }

    async fn create_run(&self, _thread_id: &str, assistant_id: &str) -> Result<Run> {
        let run_id = self
            .run_ids
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| format!("run_for_{assistant_id}"));
        self.record(Call::CreateRun {
            assistant_id: assistant_id.to_string(),
            run_id: run_id.clone(),
        });
        Ok(run(&run_id, "queued"))
    }

    async fn retrieve_run(&self, _thread_id: &str, run_id: &str) -> Result<Run> {
        self.record(Call::Retrieve(run_id.to_string()));
        {
            let mut failures = self.retrieve_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(ScholarError::ApiConnection("connection reset".into()));
            }
        }
        let mut statuses = self.statuses.lock().unwrap();
        let sequence = statuses
            .get_mut(run_id)
            .ok_or_else(|| ScholarError::Api {
                status: 404,
                message: format!("No run found with id '{run_id}'."),
            })?;
        if sequence.len() > 1 {
            Ok(sequence.pop_front().unwrap())
        } else {
            Ok(sequence.front().cloned().unwrap())
        }
    }

    async fn submit_tool_outputs(
        &self,
        _thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<Run> {
        self.record(Call::Submit {
            run_id: run_id.to_string(),
            outputs: outputs
                .into_iter()
                .map(|o| (o.tool_call_id, o.output))
                .collect(),
        });
        Ok(run(run_id, "queued"))
    }

    async fn list_runs(&self, _thread_id: &str) -> Result<Vec<Run>> {
        self.record(Call::ListRuns);
        Ok(self.runs.lock().unwrap().clone())
    }

    async fn cancel_run(&self, _thread_id: &str, run_id: &str) -> Result<Run> {
        self.record(Call::Cancel(run_id.to_string()));
        if *self.cancel_fails.lock().unwrap() {
            return Err(ScholarError::Api {
                status: 400,
                message: format!("Cannot cancel run with status 'cancelled'. ({run_id})"),
            });
        }
        Ok(run(run_id, "cancelling"))
    }

    async fn list_messages(&self, _thread_id: &str) -> Result<Vec<ThreadMessage>> {
        self.record(Call::ListMessages);
        if let Some(messages) = self.messages.lock().unwrap().clone() {
            return Ok(messages);
        }
        let mut messages = Vec::new();
        if let Some(answer) = self.answer.lock().unwrap().clone() {
            messages.push(message("msg_answer", "assistant", &answer));
        }
        messages.push(message("msg_question", "user", "pergunta"));
        Ok(messages)
    }
}

pub fn assistants_config() -> AssistantsConfig {
    AssistantsConfig {
        thread_id: Some(THREAD.into()),
        orchestrator_id: Some(ORCHESTRATOR.into()),
        poll_interval_ms: 1,
        poll_deadline_ms: None,
        cancel_grace_ms: 0,
        cancel_settle_ms: 0,
        specialists: BTreeMap::from([
            ("mat-ass".to_string(), "asst_mat".to_string()),
            ("his-ass".to_string(), "asst_his".to_string()),
        ]),
    }
}

pub fn coordinator(fake: &Arc<FakeAssistants>, config: &AssistantsConfig) -> RunCoordinator {
    RunCoordinator::new(
        fake.clone(),
        SpecialistRegistry::from_config(config),
        config,
    )
    .unwrap()
}

/// Chat-completions client that replays canned replies and records requests.
#[derive(Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String>>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlm {
    pub fn new(replies: Vec<&str>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.to_string())).collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(error: ScholarError) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::from([Err(error)])),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        self.requests.lock().unwrap().push(request);
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ScholarError::Protocol("script exhausted".into())))?;
        Ok(LlmResponse {
            content: reply,
            model: "scripted".into(),
            usage: None,
            finish_reason: Some("stop".into()),
        })
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
