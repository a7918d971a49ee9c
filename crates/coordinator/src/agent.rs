//! Model-call flow: a triage call picks the specialist, the specialist answers.
//!
//! Both steps are plain chat completions. The triage call is shown the
//! configured specialists and must reply with a JSON object naming one; a
//! reply that names nobody we know falls back to the first specialist rather
//! than failing the question.

use scholar_common::{InputMessage, Result, ScholarError};
use scholar_llm::{LlmClient, LlmRequest};
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::config::{AgentsConfig, SpecialistProfile};

/// Maximum length kept from the triage call's reasoning.
const MAX_REASONING_LENGTH: usize = 500;

/// Low temperature keeps routing consistent between identical questions.
const TRIAGE_TEMPERATURE: f32 = 0.3;

const TRIAGE_PROMPT_HEADER: &str = "Você determina qual especialista deve responder à pergunta \
do estudante. Responda APENAS com um objeto JSON, sem nenhum outro texto, no formato:\n\
{\"specialist\": \"<chave>\", \"reasoning\": \"<justificativa breve>\"}\n\n\
Especialistas disponíveis (chave: descrição):";

/// Which specialist the triage call chose.
#[derive(Debug, Clone, PartialEq)]
pub struct TriageChoice {
    pub specialist: String,
    pub reasoning: String,
    /// True when the reply named no known specialist and the default was used
    pub fell_back: bool,
}

/// Answer from the model-call flow.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub answer: String,
    /// Key of the specialist that answered
    pub specialist: String,
    pub trace_id: String,
}

pub struct AgentRouter {
    llm: Arc<dyn LlmClient>,
    specialists: Vec<SpecialistProfile>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    trace_group_id: String,
    workflow_name: String,
}

impl AgentRouter {
    pub fn new(llm: Arc<dyn LlmClient>, config: &AgentsConfig) -> Result<Self> {
        if config.specialists.is_empty() {
            return Err(ScholarError::Config(
                "At least one agent specialist must be configured".into(),
            ));
        }

        info!(
            model = %llm.model_name(),
            specialists = config.specialists.len(),
            "Agent router ready"
        );

        Ok(Self {
            llm,
            specialists: config.specialists.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            trace_group_id: config.trace_group_id.clone(),
            workflow_name: config.workflow_name.clone(),
        })
    }

    pub fn specialists(&self) -> &[SpecialistProfile] {
        &self.specialists
    }

    /// Answer the last user turn of `history`, which must be non-empty.
    pub async fn run(&self, history: Vec<InputMessage>, trace_id: String) -> Result<AgentOutcome> {
        let span = info_span!(
            "agent_run",
            trace_id = %trace_id,
            workflow = %self.workflow_name,
            group_id = %self.trace_group_id
        );

        async move {
            if history.is_empty() {
                return Err(ScholarError::Validation(
                    "Cannot run the agent flow without a question".into(),
                ));
            }

            let choice = self.triage(&history).await?;
            let profile = self.profile(&choice.specialist)?;
            info!(
                specialist = %profile.key,
                fell_back = choice.fell_back,
                reasoning = %choice.reasoning,
                "Triage decision"
            );

            let request = LlmRequest {
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                ..LlmRequest::with_history(profile.instructions.clone(), history)
            };
            let response = self.llm.complete(request).await?;
            debug!(
                specialist = %profile.key,
                finish_reason = ?response.finish_reason,
                "Specialist answered"
            );

            Ok(AgentOutcome {
                answer: response.content,
                specialist: profile.key.clone(),
                trace_id,
            })
        }
        .instrument(span)
        .await
    }

    /// Ask the triage call which specialist should take the conversation.
    pub async fn triage(&self, history: &[InputMessage]) -> Result<TriageChoice> {
        let request = LlmRequest {
            temperature: Some(TRIAGE_TEMPERATURE),
            ..LlmRequest::with_history(self.triage_prompt(), history.iter().cloned())
        };
        let response = self.llm.complete(request).await?;
        debug!(response = %response.content, "Triage response");
        Ok(self.parse_triage(&response.content))
    }

    /// System prompt listing every specialist the triage call may choose.
    pub fn triage_prompt(&self) -> String {
        let mut prompt = String::from(TRIAGE_PROMPT_HEADER);
        for profile in &self.specialists {
            prompt.push_str(&format!(
                "\n- {}: {} ({})",
                profile.key, profile.description, profile.name
            ));
        }
        prompt
    }

    /// Interpret the triage reply. Never fails: unusable replies pick the default.
    pub fn parse_triage(&self, response: &str) -> TriageChoice {
        let parsed = extract_json_object(response)
            .and_then(|json| serde_json::from_str::<serde_json::Value>(json).ok());

        let Some(parsed) = parsed else {
            warn!(
                response = %response.chars().take(200).collect::<String>(),
                "No JSON object in triage response, using default specialist"
            );
            return self.fallback("Resposta de triagem sem JSON válido");
        };

        let reasoning = parsed
            .get("reasoning")
            .and_then(|v| v.as_str())
            .unwrap_or("No reasoning provided");
        let reasoning = if reasoning.chars().count() > MAX_REASONING_LENGTH {
            reasoning.chars().take(MAX_REASONING_LENGTH).collect::<String>() + "..."
        } else {
            reasoning.to_string()
        };

        let key = parsed
            .get("specialist")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .unwrap_or_default();

        if self.specialists.iter().any(|p| p.key == key) {
            TriageChoice {
                specialist: key.to_string(),
                reasoning,
                fell_back: false,
            }
        } else {
            warn!(
                invalid_specialist = key,
                "Unknown specialist in triage response, using default specialist"
            );
            self.fallback(&reasoning)
        }
    }

    fn fallback(&self, reasoning: &str) -> TriageChoice {
        TriageChoice {
            specialist: self.specialists[0].key.clone(),
            reasoning: reasoning.to_string(),
            fell_back: true,
        }
    }

    fn profile(&self, key: &str) -> Result<&SpecialistProfile> {
        self.specialists
            .iter()
            .find(|p| p.key == key)
            .ok_or_else(|| ScholarError::Validation(format!("Unknown specialist '{key}'")))
    }
}

/// Extract the first balanced JSON object from text that may surround it.
pub fn extract_json_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let mut depth = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use scholar_llm::LlmResponse;

    struct NoopClient;

    #[async_trait]
    impl LlmClient for NoopClient {
        async fn complete(&self, _request: LlmRequest) -> Result<LlmResponse> {
            Err(ScholarError::ApiConnection("offline".into()))
        }
        fn model_name(&self) -> &str {
            "noop"
        }
    }

    fn router() -> AgentRouter {
        AgentRouter::new(Arc::new(NoopClient), &AgentsConfig::default()).unwrap()
    }

    #[test]
    fn test_extract_json_object_simple() {
        let input = r#"{"specialist":"historia","reasoning":"Pergunta sobre o Brasil Colônia"}"#;
        assert_eq!(extract_json_object(input), Some(input));
    }

    #[test]
    fn test_extract_json_object_with_text() {
        let input = r#"Claro! {"specialist":"matematica"} Espero ter ajudado."#;
        assert_eq!(
            extract_json_object(input),
            Some(r#"{"specialist":"matematica"}"#)
        );
    }

    #[test]
    fn test_extract_json_object_nested() {
        let input = r#"{"specialist":"historia","meta":{"nested":true}}"#;
        assert_eq!(extract_json_object(input), Some(input));
    }

    #[test]
    fn test_extract_json_object_braces_in_strings() {
        let input = r#"{"specialist":"matematica","reasoning":"conjunto {1, 2} \" }"} fim"#;
        assert_eq!(
            extract_json_object(input),
            Some(r#"{"specialist":"matematica","reasoning":"conjunto {1, 2} \" }"}"#)
        );
    }

    #[test]
    fn test_extract_json_object_none() {
        assert_eq!(extract_json_object("Sem JSON aqui"), None);
        assert_eq!(extract_json_object(r#"{"specialist":"historia""#), None);
    }

    #[test]
    fn parse_triage_accepts_known_key() {
        let choice = router().parse_triage(
            r#"{"specialist": "matematica", "reasoning": "Multiplicação"}"#,
        );
        assert_eq!(choice.specialist, "matematica");
        assert_eq!(choice.reasoning, "Multiplicação");
        assert!(!choice.fell_back);
    }

    #[test]
    fn parse_triage_falls_back_on_unknown_key() {
        let choice = router().parse_triage(r#"{"specialist": "astrologia"}"#);
        assert_eq!(choice.specialist, "historia");
        assert!(choice.fell_back);
    }

    #[test]
    fn parse_triage_falls_back_without_json() {
        let choice = router().parse_triage("Acho que é uma pergunta de matemática.");
        assert_eq!(choice.specialist, "historia");
        assert!(choice.fell_back);
    }

    #[test]
    fn parse_triage_truncates_long_reasoning() {
        let long = "a".repeat(MAX_REASONING_LENGTH + 50);
        let response = format!(r#"{{"specialist":"historia","reasoning":"{long}"}}"#);
        let choice = router().parse_triage(&response);
        assert_eq!(choice.reasoning.chars().count(), MAX_REASONING_LENGTH + 3);
    }

    #[test]
    fn triage_prompt_lists_every_specialist() {
        let prompt = router().triage_prompt();
        assert!(prompt.contains("- historia:"));
        assert!(prompt.contains("- matematica:"));
        assert!(prompt.contains("\"specialist\""));
    }

    #[test]
    fn new_rejects_empty_specialists() {
        let config = AgentsConfig {
            specialists: Vec::new(),
            ..AgentsConfig::default()
        };
        assert!(matches!(
            AgentRouter::new(Arc::new(NoopClient), &config),
            Err(ScholarError::Config(_))
        ));
    }
}
