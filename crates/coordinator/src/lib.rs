//! Question routing for Scholar.
//!
//! A student's question goes to a triage step that picks a specialist, and
//! the specialist's reply comes back as the answer. Two flows do this:
//!
//! - **Agent flow**: two chat completions, a triage call and a specialist
//!   call, optionally inside a stored conversation.
//! - **Assistants flow**: a polling state machine over a remote thread where
//!   an orchestrator run pauses on a tool call naming the specialist.
//!
//! # Architecture
//!
//! ```text
//! Question
//!    │
//!    ▼
//! ┌────────────────────┐
//! │ QuestionProcessor  │  validation, credential, error mapping
//! └─────────┬──────────┘
//!     ┌─────┴──────────────┐
//!     ▼                    ▼
//! [AgentRouter]     [RunCoordinator] ──► SpecialistRegistry
//!  triage + answer   threads / runs
//! ```

pub mod agent;
pub mod config;
pub mod lifecycle;
pub mod processor;
pub mod registry;
pub mod routing;

pub use agent::{AgentOutcome, AgentRouter, TriageChoice, extract_json_object};
pub use config::{
    API_KEY_ENV, AgentsConfig, ApiConfig, ApiCredential, AssistantsConfig, ScholarConfig,
    SpecialistProfile,
};
pub use lifecycle::{
    ACK_OUTPUT, CancelReport, PollOptions, PollTarget, RunCoordinator, RunInspection,
    extract_active_run_id,
};
pub use processor::{QuestionProcessor, new_trace_id, validate_question};
pub use registry::SpecialistRegistry;
pub use routing::RoutingDecision;
