//! Entry points that validate a question and hand it to one of the flows.

use scholar_common::{InputMessage, MessageRole, Result, ScholarError, window};
use scholar_memory::ConversationStore;
use tracing::{error, info};

use crate::agent::AgentRouter;
use crate::config::{ApiConfig, ApiCredential};
use crate::lifecycle::RunCoordinator;

/// Maximum length for a question (prevents oversized payloads).
pub const MAX_QUESTION_LENGTH: usize = 10_000;

/// Trim a question, rejecting empty and oversized input.
pub fn validate_question(question: &str) -> Result<&str> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err(ScholarError::Validation(
            "A pergunta não pode estar vazia".into(),
        ));
    }
    if trimmed.len() > MAX_QUESTION_LENGTH {
        return Err(ScholarError::Validation(format!(
            "A pergunta excede o tamanho máximo de {MAX_QUESTION_LENGTH} bytes"
        )));
    }
    Ok(trimmed)
}

/// `trace_` followed by 32 random hex digits.
pub fn new_trace_id() -> String {
    format!("trace_{}", uuid::Uuid::new_v4().simple())
}

/// Keep application errors, fold everything else into a connection error.
fn rewrap(error: ScholarError) -> ScholarError {
    if error.is_recoverable() {
        error
    } else {
        error!(error = %error, "Question processing failed");
        ScholarError::ApiConnection(error.to_string())
    }
}

fn preview(question: &str) -> String {
    let mut preview: String = question.chars().take(50).collect();
    if question.chars().count() > 50 {
        preview.push_str("...");
    }
    preview
}

pub struct QuestionProcessor {
    api: ApiConfig,
    assistants: Option<RunCoordinator>,
    agents: Option<AgentRouter>,
    store: Option<ConversationStore>,
    max_context_messages: usize,
}

impl QuestionProcessor {
    pub fn new(api: ApiConfig) -> Self {
        Self {
            api,
            assistants: None,
            agents: None,
            store: None,
            max_context_messages: 10,
        }
    }

    pub fn with_assistants(mut self, coordinator: RunCoordinator) -> Self {
        self.assistants = Some(coordinator);
        self
    }

    pub fn with_agents(mut self, router: AgentRouter, max_context_messages: usize) -> Self {
        self.agents = Some(router);
        self.max_context_messages = max_context_messages;
        self
    }

    pub fn with_store(mut self, store: ConversationStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn store(&self) -> Option<&ConversationStore> {
        self.store.as_ref()
    }

    pub fn coordinator(&self) -> Option<&RunCoordinator> {
        self.assistants.as_ref()
    }

    pub fn agent_router(&self) -> Option<&AgentRouter> {
        self.agents.as_ref()
    }

    /// Thread/run flow. Returns the answer and no trace id.
    pub async fn process_assistants(&self, question: &str) -> Result<(String, Option<String>)> {
        let question = validate_question(question)?;
        self.check_credential()?;
        let coordinator = self.assistants.as_ref().ok_or_else(|| {
            ScholarError::Config("The assistants flow is not configured".into())
        })?;

        info!(question = %preview(question), "Processing question with assistants");
        let answer = coordinator.ask(question).await.map_err(rewrap)?;
        Ok((answer, None))
    }

    /// Model-call flow for a single question. Returns the answer and its trace id.
    pub async fn process_agent(&self, question: &str) -> Result<(String, Option<String>)> {
        let question = validate_question(question)?;
        self.check_credential()?;
        let router = self.router()?;

        let trace_id = new_trace_id();
        info!(question = %preview(question), trace_id = %trace_id, "Processing question");

        let outcome = router
            .run(vec![InputMessage::user(question)], trace_id)
            .await
            .map_err(rewrap)?;
        Ok((outcome.answer, Some(outcome.trace_id)))
    }

    /// Model-call flow inside a stored conversation.
    ///
    /// Creates the conversation when `conversation_id` is `None`. Both turns
    /// are persisted; the model sees at most `max_context_messages` of them.
    pub async fn process_with_context(
        &self,
        question: &str,
        conversation_id: Option<&str>,
    ) -> Result<(String, String)> {
        let question = validate_question(question)?;
        self.check_credential()?;
        let router = self.router()?;
        let store = self.store.as_ref().ok_or_else(|| {
            ScholarError::Config("The conversation store is not configured".into())
        })?;

        self.converse(router, store, question, conversation_id)
            .await
            .map_err(rewrap)
    }

    async fn converse(
        &self,
        router: &AgentRouter,
        store: &ConversationStore,
        question: &str,
        conversation_id: Option<&str>,
    ) -> Result<(String, String)> {
        let conversation_id = match conversation_id {
            Some(id) => id.to_string(),
            None => store.create(None).await?,
        };

        store
            .append(&conversation_id, MessageRole::User, question)
            .await?;
        let history = window(
            store.as_input_list(&conversation_id).await?,
            self.max_context_messages,
        );

        let trace_id = new_trace_id();
        info!(
            conversation_id = %conversation_id,
            context_messages = history.len(),
            trace_id = %trace_id,
            question = %preview(question),
            "Processing question with context"
        );

        let outcome = router.run(history, trace_id).await?;
        store
            .append(&conversation_id, MessageRole::Assistant, &outcome.answer)
            .await?;

        Ok((outcome.answer, conversation_id))
    }

    fn router(&self) -> Result<&AgentRouter> {
        self.agents
            .as_ref()
            .ok_or_else(|| ScholarError::Config("The agent flow is not configured".into()))
    }

    fn check_credential(&self) -> Result<()> {
        ApiCredential::resolve(&self.api).map(|_| ())
    }
}
