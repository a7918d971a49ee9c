//! Drives one question through the thread/run protocol.
//!
//! ```text
//! create message ──► create run (orchestrator) ──► poll
//!                                                   │
//!                 ┌─────────────────────────────────┤
//!                 ▼                                 ▼
//!            completed                       requires_action
//!          latest answer          ack tool call ──► poll to terminal
//!                                                   │
//!                                 create run (specialist) ──► poll ──► latest answer
//! ```
//!
//! The thread holds at most one active run. A question posted while another
//! run is active fails remotely; the coordinator cancels the blocking run and
//! retries once. Nothing else is retried.

use regex::Regex;
use scholar_common::{Result, ScholarError};
use scholar_llm::{AssistantsApi, Run, RunStatus, ToolOutput};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::AssistantsConfig;
use crate::registry::SpecialistRegistry;
use crate::routing::RoutingDecision;

static ACTIVE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"run ([a-zA-Z0-9_]+) is active").unwrap());

/// Output submitted for the orchestrator's tool call. Only unblocks the run.
pub const ACK_OUTPUT: &str = "success";

/// Pull the blocking run's id out of a "run <id> is active" error.
pub fn extract_active_run_id(message: &str) -> Option<String> {
    ACTIVE_RUN
        .captures(message)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// What a poll waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollTarget {
    /// Stop on `requires_action` or any settled status.
    ActionOrTerminal,
    /// Stop on a settled status only. A tool call at this point is a protocol error.
    Terminal,
}

#[derive(Debug, Clone)]
pub struct PollOptions {
    pub interval: Duration,
    /// Give up with `Timeout` once a single wait exceeds this.
    pub deadline: Option<Duration>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            deadline: None,
        }
    }
}

/// A run together with the routing it asks for, if paused on a tool call.
#[derive(Debug, Clone)]
pub struct RunInspection {
    pub run: Run,
    pub decision: Option<RoutingDecision>,
}

/// Result of cancelling every active run on the thread.
#[derive(Debug, Clone, Default)]
pub struct CancelReport {
    pub cancelled: Vec<String>,
    /// `(run_id, error)` for each cancellation the service refused
    pub failed: Vec<(String, String)>,
}

impl CancelReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct RunCoordinator {
    api: Arc<dyn AssistantsApi>,
    registry: SpecialistRegistry,
    thread_id: String,
    orchestrator_id: String,
    poll: PollOptions,
    cancel_grace: Duration,
    cancel_settle: Duration,
    shutdown: CancellationToken,
}

impl RunCoordinator {
    pub fn new(
        api: Arc<dyn AssistantsApi>,
        registry: SpecialistRegistry,
        config: &AssistantsConfig,
    ) -> Result<Self> {
        let thread_id = config.thread_id()?.to_string();
        let orchestrator_id = config.orchestrator_id()?.to_string();

        if registry.is_empty() {
            warn!("No assistant specialists configured, every routed question will be rejected");
        }

        info!(
            thread_id = %thread_id,
            orchestrator_id = %orchestrator_id,
            specialists = registry.len(),
            "Run coordinator ready"
        );

        Ok(Self {
            api,
            registry,
            thread_id,
            orchestrator_id,
            poll: PollOptions {
                interval: config.poll_interval(),
                deadline: config.poll_deadline(),
            },
            cancel_grace: config.cancel_grace(),
            cancel_settle: config.cancel_settle(),
            shutdown: CancellationToken::new(),
        })
    }

    /// Abort waits when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn registry(&self) -> &SpecialistRegistry {
        &self.registry
    }

    /// Ask a question and return the answering assistant's reply.
    pub async fn ask(&self, question: &str) -> Result<String> {
        self.post_question(question).await?;

        let run = self
            .api
            .create_run(&self.thread_id, &self.orchestrator_id)
            .await?;
        info!(run_id = %run.id, "Orchestrator run created");

        let run = self.wait_for_run(&run.id, PollTarget::ActionOrTerminal).await?;

        match run.status {
            RunStatus::Completed => {
                info!(run_id = %run.id, "Orchestrator answered directly");
                self.latest_answer().await
            }
            RunStatus::RequiresAction => self.route_to_specialist(&run).await,
            status => Err(ScholarError::UnexpectedRunStatus {
                run_id: run.id,
                status: status.to_string(),
            }),
        }
    }

    /// Decode the routing request of a paused run. Only the first tool call counts.
    pub fn handle_action(&self, run: &Run) -> Result<RoutingDecision> {
        RoutingDecision::from_run(run).ok_or_else(|| {
            ScholarError::Protocol(format!(
                "Run {} requires action but carries no tool call",
                run.id
            ))
        })
    }

    /// Poll `run_id` until it reaches what `target` waits for.
    ///
    /// A failed status fetch is logged and retried on the next tick.
    pub async fn wait_for_run(&self, run_id: &str, target: PollTarget) -> Result<Run> {
        let started = Instant::now();
        let mut polls: u32 = 0;

        loop {
            polls += 1;
            match self.api.retrieve_run(&self.thread_id, run_id).await {
                Ok(run) => match (run.status.clone(), target) {
                    (RunStatus::RequiresAction, PollTarget::ActionOrTerminal) => {
                        debug!(run_id, polls, "Run requires action");
                        return Ok(run);
                    }
                    (RunStatus::RequiresAction, PollTarget::Terminal) => {
                        return Err(ScholarError::Protocol(format!(
                            "Run {run_id} requested another action while waiting for completion"
                        )));
                    }
                    (status, _) if status.is_in_flight() => {
                        debug!(run_id, polls, status = %status, "Run in flight");
                    }
                    (status, _) => {
                        if status.is_terminal() {
                            debug!(run_id, polls, status = %status, "Run settled");
                        } else {
                            warn!(run_id, status = %status, "Run reported an unrecognized status");
                        }
                        return Ok(run);
                    }
                },
                Err(e) => {
                    warn!(run_id, polls, error = %e, "Failed to retrieve run status, retrying");
                }
            }

            if let Some(deadline) = self.poll.deadline {
                if started.elapsed() >= deadline {
                    return Err(ScholarError::Timeout(format!(
                        "Run {run_id} did not settle within {}ms",
                        deadline.as_millis()
                    )));
                }
            }

            self.pause(self.poll.interval).await?;
        }
    }

    /// Runs that currently block the thread.
    pub async fn list_active_runs(&self) -> Result<Vec<Run>> {
        self.api
            .list_runs_with_status(&self.thread_id, RunStatus::is_active)
            .await
    }

    /// Cancel every active run, then give the service a moment to settle.
    pub async fn cancel_active_runs(&self) -> Result<CancelReport> {
        let active = self.list_active_runs().await?;
        let mut report = CancelReport::default();

        if active.is_empty() {
            info!(thread_id = %self.thread_id, "No active runs to cancel");
            return Ok(report);
        }

        info!(thread_id = %self.thread_id, count = active.len(), "Cancelling active runs");
        for run in active {
            match self.api.cancel_run(&self.thread_id, &run.id).await {
                Ok(_) => report.cancelled.push(run.id),
                Err(e) => {
                    warn!(run_id = %run.id, error = %e, "Failed to cancel run");
                    report.failed.push((run.id, e.to_string()));
                }
            }
        }

        self.pause(self.cancel_settle).await?;
        Ok(report)
    }

    /// Fetch a run and decode its routing request, if any.
    pub async fn inspect_run(&self, run_id: &str) -> Result<RunInspection> {
        let run = self.api.retrieve_run(&self.thread_id, run_id).await?;
        let decision = match run.status {
            RunStatus::RequiresAction => RoutingDecision::from_run(&run),
            _ => None,
        };
        Ok(RunInspection { run, decision })
    }

    async fn post_question(&self, question: &str) -> Result<()> {
        let error = match self.api.create_message(&self.thread_id, question).await {
            Ok(_) => {
                debug!(thread_id = %self.thread_id, "Question posted");
                return Ok(());
            }
            Err(e) => e.to_string(),
        };

        warn!(thread_id = %self.thread_id, error = %error, "Failed to post question");

        let Some(blocking_run) = extract_active_run_id(&error) else {
            return Err(ScholarError::ApiConnection(format!(
                "Failed to create message: {error}"
            )));
        };

        info!(run_id = %blocking_run, "Thread has an active run, cancelling it");
        if let Err(e) = self.api.cancel_run(&self.thread_id, &blocking_run).await {
            warn!(run_id = %blocking_run, error = %e, "Failed to cancel blocking run");
        }

        self.pause(self.cancel_grace).await?;

        self.api
            .create_message(&self.thread_id, question)
            .await
            .map_err(|e| {
                ScholarError::ApiConnection(format!(
                    "Failed to create message after cancelling run {blocking_run}: {e}"
                ))
            })?;
        info!(thread_id = %self.thread_id, "Question posted after cancelling active run");
        Ok(())
    }

    async fn route_to_specialist(&self, run: &Run) -> Result<String> {
        let decision = self.handle_action(run)?;
        info!(
            run_id = %run.id,
            tool_call_id = %decision.tool_call_id,
            function = %decision.function_name,
            specialist = ?decision.specialist,
            "Orchestrator requested a specialist"
        );

        self.api
            .submit_tool_outputs(
                &self.thread_id,
                &run.id,
                vec![ToolOutput {
                    tool_call_id: decision.tool_call_id.clone(),
                    output: ACK_OUTPUT.to_string(),
                }],
            )
            .await?;

        let settled = self.wait_for_run(&run.id, PollTarget::Terminal).await?;
        if settled.status != RunStatus::Completed {
            warn!(
                run_id = %settled.id,
                status = %settled.status,
                "Orchestrator run did not complete after acknowledgment"
            );
        }

        let key = decision.specialist.as_deref().ok_or_else(|| {
            ScholarError::Validation("The orchestrator did not name a specialist".into())
        })?;
        let handler = self.registry.resolve(key)?.to_string();

        let specialist_run = self.api.create_run(&self.thread_id, &handler).await?;
        info!(
            specialist = key,
            run_id = %specialist_run.id,
            "Specialist run created"
        );

        let finished = self
            .wait_for_run(&specialist_run.id, PollTarget::Terminal)
            .await?;
        if finished.status != RunStatus::Completed {
            return Err(ScholarError::UnexpectedRunStatus {
                run_id: finished.id,
                status: finished.status.to_string(),
            });
        }

        self.latest_answer().await
    }

    async fn latest_answer(&self) -> Result<String> {
        self.api
            .latest_assistant_message(&self.thread_id)
            .await?
            .ok_or_else(|| {
                ScholarError::Protocol(format!(
                    "No assistant message found on thread {}",
                    self.thread_id
                ))
            })
    }

    async fn pause(&self, duration: Duration) -> Result<()> {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                Err(ScholarError::Cancelled("Wait on the remote run was cancelled".into()))
            }
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}
