//! Error types for Scholar.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScholarError {
    /// Bad or empty input, or a specialist key the registry does not know.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The API credential is missing.
    #[error("API key error: {0}")]
    ApiKey(String),

    /// Any failure talking to the hosted service, as seen by callers of the processor.
    #[error("API connection error: {0}")]
    ApiConnection(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Raw failure reported by the hosted service.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Run {run_id} finished with unexpected status: {status}")]
    UnexpectedRunStatus { run_id: String, status: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ScholarError {
    /// Application-level errors the interactive loop reports and survives.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::ApiKey(_) | Self::ApiConnection(_) | Self::Config(_)
        )
    }

    /// Human-readable message shown to the student, one per error kind.
    pub fn user_message(&self) -> String {
        match self {
            Self::ApiKey(_) => "Erro de configuração: a chave da API não está configurada \
                                corretamente. Verifique a variável OPENAI_API_KEY."
                .to_string(),
            Self::ApiConnection(msg) => format!(
                "Erro de conexão: não foi possível obter resposta da API ({msg}). \
                 Tente novamente mais tarde."
            ),
            Self::Api { message, .. } => format!("Erro na resposta da API: {message}"),
            Self::Config(msg) => format!("Erro de configuração: {msg}"),
            Self::Validation(msg) => format!("Erro de validação: {msg}"),
            other => format!("Ocorreu um erro inesperado: {other}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScholarError>;
