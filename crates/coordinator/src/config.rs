//! Configuration for the question router.
//!
//! # Security
//!
//! - Config file permission validation on Unix systems
//! - Rejects world-readable files containing API keys
//! - Warns about API keys stored in config files

use scholar_common::{Result, ScholarError};
use scholar_llm::LlmConfig;
use scholar_memory::StoreConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::warn;

/// Environment variable holding the hosted service credential.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScholarConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub assistants: AssistantsConfig,

    #[serde(default)]
    pub agents: AgentsConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

/// Endpoint settings shared by both flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the hosted service (defaults to the public endpoint)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// API key. When unset, `OPENAI_API_KEY` is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_timeout_ms() -> u64 {
    60_000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: default_timeout_ms(),
            api_key: None,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Settings for the thread/run flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantsConfig {
    /// The single remote thread every question is appended to
    #[serde(default)]
    pub thread_id: Option<String>,

    /// Handler that decides which specialist answers
    #[serde(default)]
    pub orchestrator_id: Option<String>,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Upper bound on a single wait. Unset means wait indefinitely.
    #[serde(default)]
    pub poll_deadline_ms: Option<u64>,

    /// Pause after cancelling a blocking run before retrying
    #[serde(default = "default_cancel_grace_ms")]
    pub cancel_grace_ms: u64,

    /// Pause after a bulk cancel so the service can settle
    #[serde(default = "default_cancel_settle_ms")]
    pub cancel_settle_ms: u64,

    /// Specialist key to remote handler id
    #[serde(default)]
    pub specialists: BTreeMap<String, String>,
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_cancel_grace_ms() -> u64 {
    3_000
}

fn default_cancel_settle_ms() -> u64 {
    2_000
}

impl Default for AssistantsConfig {
    fn default() -> Self {
        Self {
            thread_id: None,
            orchestrator_id: None,
            poll_interval_ms: default_poll_interval_ms(),
            poll_deadline_ms: None,
            cancel_grace_ms: default_cancel_grace_ms(),
            cancel_settle_ms: default_cancel_settle_ms(),
            specialists: BTreeMap::new(),
        }
    }
}

impl AssistantsConfig {
    pub fn thread_id(&self) -> Result<&str> {
        required(&self.thread_id, "assistants.thread_id")
    }

    pub fn orchestrator_id(&self) -> Result<&str> {
        required(&self.orchestrator_id, "assistants.orchestrator_id")
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_deadline(&self) -> Option<Duration> {
        self.poll_deadline_ms.map(Duration::from_millis)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }

    pub fn cancel_settle(&self) -> Duration {
        Duration::from_millis(self.cancel_settle_ms)
    }
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ScholarError::Config(format!("{name} is not configured")))
}

/// Settings for the model-call flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// How many stored turns are replayed to the model
    #[serde(default = "default_max_context_messages")]
    pub max_context_messages: usize,

    /// Grouping label attached to every trace
    #[serde(default = "default_trace_group_id")]
    pub trace_group_id: String,

    #[serde(default = "default_workflow_name")]
    pub workflow_name: String,

    /// Candidates the triage call chooses from, in fallback order
    #[serde(default = "default_specialists")]
    pub specialists: Vec<SpecialistProfile>,
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}

fn default_max_context_messages() -> usize {
    10
}

fn default_trace_group_id() -> String {
    "sistema_educacional".into()
}

fn default_workflow_name() -> String {
    "Sistema Educacional QA".into()
}

fn default_specialists() -> Vec<SpecialistProfile> {
    vec![
        SpecialistProfile {
            key: "historia".into(),
            name: "Especialista em História".into(),
            description: "Agente especialista em perguntas sobre História".into(),
            instructions: "Você é um especialista em História para estudantes do ensino médio. \
                Responda perguntas sobre história do Brasil, história mundial, períodos históricos, \
                revoluções, guerras e outros tópicos relacionados. Contextualize os eventos \
                históricos e explique suas causas e consequências. Use uma linguagem clara e \
                didática, adequada para estudantes do ensino médio. Ao final da sua resposta, \
                inclua a assinatura: \"[Resposta fornecida pelo Especialista em História]\""
                .into(),
        },
        SpecialistProfile {
            key: "matematica".into(),
            name: "Especialista em Matemática".into(),
            description: "Agente especialista em perguntas sobre Matemática".into(),
            instructions: "Você é um especialista em Matemática para estudantes do ensino médio. \
                Responda perguntas sobre álgebra, geometria, trigonometria, funções, estatística \
                e outros tópicos relacionados. Explique os conceitos de forma clara e didática, \
                mostrando o passo a passo da resolução quando necessário. Ao fim da resposta, \
                forneça o nome do agente especialista que forneceu a resposta."
                .into(),
        },
    ]
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: None,
            max_tokens: None,
            max_context_messages: default_max_context_messages(),
            trace_group_id: default_trace_group_id(),
            workflow_name: default_workflow_name(),
            specialists: default_specialists(),
        }
    }
}

impl AgentsConfig {
    /// Chat-completion settings for the agent flow.
    pub fn llm_config(&self, api: &ApiConfig) -> LlmConfig {
        LlmConfig {
            provider: "openai".into(),
            model: self.model.clone(),
            api_url: api.base_url.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            timeout_ms: api.timeout_ms,
        }
    }
}

/// A specialist the agent flow can hand a question to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialistProfile {
    /// Identifier the triage call answers with
    pub key: String,
    pub name: String,
    /// Shown to the triage call when choosing
    pub description: String,
    /// System prompt for the specialist call
    pub instructions: String,
}

impl ScholarConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Security
    ///
    /// - The path must be a regular file (symlinks are refused)
    /// - On Unix, the file must not be world-writable
    /// - On Unix, a file that sets `[api] api_key` must not be world-readable
    ///   and only draws a warning when group-readable
    pub fn from_file(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();

        let metadata = std::fs::symlink_metadata(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {e}", path.display()))?;
        if !metadata.is_file() {
            anyhow::bail!(
                "Config path '{}' is not a regular file (symlinks and directories are refused)",
                path.display()
            );
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;

        let embeds_key = config
            .api
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty());

        #[cfg(unix)]
        check_config_mode(path, &metadata, embeds_key)?;

        if embeds_key {
            warn!(
                path = %path.display(),
                "api.api_key is set in the config file, prefer the {API_KEY_ENV} environment variable"
            );
        }

        Ok(config)
    }

    /// Parse configuration from TOML text without touching the filesystem.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ScholarError::Config(format!("Invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make a flow unusable.
    pub fn validate(&self) -> Result<()> {
        if self.assistants.poll_interval_ms == 0 {
            return Err(ScholarError::Config(
                "assistants.poll_interval_ms must be greater than zero".into(),
            ));
        }
        if self.agents.max_context_messages == 0 {
            return Err(ScholarError::Config(
                "agents.max_context_messages must be at least 1".into(),
            ));
        }
        if self.agents.specialists.is_empty() {
            return Err(ScholarError::Config(
                "agents.specialists must list at least one specialist".into(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for profile in &self.agents.specialists {
            if !seen.insert(profile.key.as_str()) {
                return Err(ScholarError::Config(format!(
                    "Duplicate agent specialist key: {}",
                    profile.key
                )));
            }
        }
        Ok(())
    }
}

/// Mode checks for a config file whose `[api] api_key` presence is already known.
#[cfg(unix)]
fn check_config_mode(
    path: &std::path::Path,
    metadata: &std::fs::Metadata,
    embeds_key: bool,
) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = metadata.permissions().mode() & 0o777;
    let shown = path.display();

    anyhow::ensure!(
        mode & 0o002 == 0,
        "Config file '{shown}' is writable by every user (mode {mode:04o}), run: chmod o-w {shown}"
    );

    if !embeds_key {
        return Ok(());
    }

    anyhow::ensure!(
        mode & 0o004 == 0,
        "Config file '{shown}' sets api.api_key and is readable by every user (mode {mode:04o}), \
         run: chmod 600 {shown} or move the key to {API_KEY_ENV}"
    );

    if mode & 0o040 != 0 {
        warn!(
            path = %shown,
            mode = %format!("{mode:04o}"),
            "Config file sets api.api_key and is group-readable"
        );
    }

    Ok(())
}

/// The hosted service credential. Never printed in full.
#[derive(Clone)]
pub struct ApiCredential(String);

impl ApiCredential {
    /// Read the credential from `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Ok(Self(key.trim().to_string())),
            _ => Err(ScholarError::ApiKey(format!("{API_KEY_ENV} is not set"))),
        }
    }

    /// Prefer an explicit key from the config, then the environment.
    pub fn resolve(api: &ApiConfig) -> Result<Self> {
        match api.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(Self(key.to_string())),
            _ => Self::from_env(),
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// First eight characters followed by an ellipsis, for confirmation output.
    pub fn masked(&self) -> String {
        let prefix: String = self.0.chars().take(8).collect();
        format!("{prefix}...")
    }
}

impl std::fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ApiCredential").field(&self.masked()).finish()
    }
}
