pub mod assistants;
pub mod chat;
pub mod conversations;
pub mod runs;

use anyhow::Result;
use scholar_common::ScholarError;
use scholar_coordinator::{
    AgentRouter, ApiCredential, QuestionProcessor, RunCoordinator, ScholarConfig,
    SpecialistRegistry,
};
use scholar_llm::AssistantsApi;
use scholar_memory::ConversationStore;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio_util::sync::CancellationToken;

/// Everything a subcommand needs to build its flow.
pub struct Context {
    pub config: ScholarConfig,
    pub credential: ApiCredential,
    pub shutdown: CancellationToken,
}

impl Context {
    pub fn new(config: ScholarConfig, credential: ApiCredential, shutdown: CancellationToken) -> Self {
        Self {
            config,
            credential,
            shutdown,
        }
    }

    pub fn agent_router(&self) -> Result<AgentRouter> {
        let llm = scholar_llm::build_llm_client(
            &self.config.agents.llm_config(&self.config.api),
            self.credential.expose(),
        )?;
        Ok(AgentRouter::new(llm, &self.config.agents)?)
    }

    pub fn assistants_api(&self) -> Result<Arc<dyn AssistantsApi>> {
        Ok(scholar_llm::build_assistants_client(
            self.config.api.base_url.clone(),
            self.credential.expose(),
            self.config.api.timeout(),
        )?)
    }

    pub fn run_coordinator(&self) -> Result<RunCoordinator> {
        let api = self.assistants_api()?;
        let registry = SpecialistRegistry::from_config(&self.config.assistants);
        Ok(RunCoordinator::new(api, registry, &self.config.assistants)?
            .with_cancellation(self.shutdown.clone()))
    }

    pub async fn store(&self) -> Result<ConversationStore> {
        Ok(ConversationStore::open(&self.config.store).await?)
    }

    /// Processor for the agent flow, with the conversation store attached.
    pub async fn agent_processor(&self) -> Result<QuestionProcessor> {
        Ok(QuestionProcessor::new(self.config.api.clone())
            .with_agents(self.agent_router()?, self.config.agents.max_context_messages)
            .with_store(self.store().await?))
    }

    pub fn assistants_processor(&self) -> Result<QuestionProcessor> {
        Ok(QuestionProcessor::new(self.config.api.clone()).with_assistants(self.run_coordinator()?))
    }
}

/// Line reader over stdin that gives up when the shutdown token fires.
pub struct Prompt {
    lines: Lines<BufReader<Stdin>>,
    shutdown: CancellationToken,
}

impl Prompt {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            shutdown,
        }
    }

    /// Read one trimmed line. `None` on end of input or interrupt.
    pub async fn line(&mut self, label: &str) -> Result<Option<String>> {
        print!("{label}");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Ok(None),
            line = self.lines.next_line() => line?,
        };
        Ok(line.map(|l| l.trim().to_string()))
    }

    /// Read a non-empty line, asking again on blank input.
    pub async fn question(&mut self, label: &str) -> Result<Option<String>> {
        loop {
            match self.line(label).await? {
                Some(line) if line.is_empty() => {
                    println!("Por favor, digite uma pergunta válida.");
                }
                other => return Ok(other),
            }
        }
    }
}

/// Print a recoverable error and keep going; anything else ends the session.
pub fn report(err: ScholarError) -> Result<()> {
    if err.is_recoverable() {
        println!("\n{}", err.user_message());
        Ok(())
    } else {
        tracing::error!(error = %err, "Unrecoverable error");
        Err(err.into())
    }
}
