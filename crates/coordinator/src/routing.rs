//! Routing decisions decoded from an orchestrator tool call.

use scholar_llm::{Run, ToolCall};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Argument names the orchestrator may use for the specialist key, in priority order.
const SPECIALIST_ARGS: [&str; 2] = ["nome_assistente", "especialista"];

/// Argument carrying an optional note for the specialist.
const MESSAGE_ARG: &str = "mensagem";

/// What the orchestrator asked for when its run paused on a tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Tool call to acknowledge
    pub tool_call_id: String,

    /// Function the orchestrator invoked
    pub function_name: String,

    /// Specialist key, when the arguments named one
    pub specialist: Option<String>,

    #[serde(default)]
    pub message: Option<String>,
}

impl RoutingDecision {
    /// Decode a tool call. Malformed arguments yield a decision with no specialist.
    pub fn from_tool_call(call: &ToolCall) -> Self {
        let args = parse_arguments(&call.function.arguments);

        let specialist = SPECIALIST_ARGS
            .iter()
            .find_map(|name| non_empty_str(&args, name));
        let message = non_empty_str(&args, MESSAGE_ARG);

        Self {
            tool_call_id: call.id.clone(),
            function_name: call.function.name.clone(),
            specialist,
            message,
        }
    }

    /// Decode the first tool call of a paused run. Other calls are ignored.
    pub fn from_run(run: &Run) -> Option<Self> {
        let calls = run.tool_calls();
        if calls.len() > 1 {
            warn!(
                run_id = %run.id,
                tool_calls = calls.len(),
                "Run requested several tool calls, only the first is handled"
            );
        }
        calls.first().map(Self::from_tool_call)
    }
}

fn parse_arguments(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) => {
            warn!(arguments = %raw, "Tool call arguments are not a JSON object");
            Value::Null
        }
        Err(e) => {
            warn!(arguments = %raw, error = %e, "Failed to parse tool call arguments");
            Value::Null
        }
    }
}

fn non_empty_str(args: &Value, name: &str) -> Option<String> {
    args.get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholar_llm::FunctionCall;

    fn call(arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_1".into(),
            kind: "function".into(),
            function: FunctionCall {
                name: "encaminhar_especialista".into(),
                arguments: arguments.into(),
            },
        }
    }

    #[test]
    fn reads_nome_assistente() {
        let decision = RoutingDecision::from_tool_call(&call(
            r#"{"nome_assistente": "mat-ass", "mensagem": "Quanto é 10 * 10?"}"#,
        ));

        assert_eq!(decision.tool_call_id, "call_1");
        assert_eq!(decision.function_name, "encaminhar_especialista");
        assert_eq!(decision.specialist.as_deref(), Some("mat-ass"));
        assert_eq!(decision.message.as_deref(), Some("Quanto é 10 * 10?"));
    }

    #[test]
    fn falls_back_to_especialista() {
        let decision = RoutingDecision::from_tool_call(&call(r#"{"especialista": "his-ass"}"#));
        assert_eq!(decision.specialist.as_deref(), Some("his-ass"));
        assert!(decision.message.is_none());
    }

    #[test]
    fn empty_primary_key_falls_through() {
        let decision = RoutingDecision::from_tool_call(&call(
            r#"{"nome_assistente": "", "especialista": "port-ass"}"#,
        ));
        assert_eq!(decision.specialist.as_deref(), Some("port-ass"));
    }

    #[test]
    fn prefers_nome_assistente_when_both_present() {
        let decision = RoutingDecision::from_tool_call(&call(
            r#"{"especialista": "port-ass", "nome_assistente": "mat-ass"}"#,
        ));
        assert_eq!(decision.specialist.as_deref(), Some("mat-ass"));
    }

    #[test]
    fn malformed_arguments_yield_no_specialist() {
        for raw in ["{not json", "[\"mat-ass\"]", "", "{}"] {
            let decision = RoutingDecision::from_tool_call(&call(raw));
            assert_eq!(decision.tool_call_id, "call_1");
            assert!(decision.specialist.is_none(), "arguments: {raw}");
        }
    }

    #[test]
    fn from_run_takes_first_call_only() {
        let run: Run = serde_json::from_value(serde_json::json!({
            "id": "run_1",
            "status": "requires_action",
            "required_action": {
                "type": "submit_tool_outputs",
                "submit_tool_outputs": {
                    "tool_calls": [
                        {"id": "call_a", "type": "function",
                         "function": {"name": "f", "arguments": "{\"especialista\":\"mat-ass\"}"}},
                        {"id": "call_b", "type": "function",
                         "function": {"name": "f", "arguments": "{\"especialista\":\"his-ass\"}"}}
                    ]
                }
            }
        }))
        .unwrap();

        let decision = RoutingDecision::from_run(&run).unwrap();
        assert_eq!(decision.tool_call_id, "call_a");
        assert_eq!(decision.specialist.as_deref(), Some("mat-ass"));
    }

    #[test]
    fn from_run_without_action_is_none() {
        let run: Run =
            serde_json::from_value(serde_json::json!({"id": "run_1", "status": "completed"}))
                .unwrap();
        assert!(RoutingDecision::from_run(&run).is_none());
    }
}
