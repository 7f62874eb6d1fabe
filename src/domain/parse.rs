use crate::domain::{Part, Role, TokenUsage};
use serde_json::Value;

/// Both storage shapes persist messages and parts as the same upstream JSON
/// payloads (the relational store keeps them in `data` columns, the legacy
/// tree as one file per entity), so the shape-specific adapters share these
/// decoders.
pub fn parse_role_value(value: &Value) -> Role {
    match value.get("role").and_then(|v| v.as_str()) {
        Some("user") => Role::User,
        Some("assistant") => Role::Assistant,
        _ => Role::System,
    }
}

pub fn parse_part_value(value: &Value) -> Option<Part> {
    let kind = value.get("type").and_then(|v| v.as_str()).unwrap_or("");
    match kind {
        "text" => {
            let text = value.get("text").and_then(|v| v.as_str())?;
            Some(Part::Text {
                text: text.to_string(),
            })
        }
        "reasoning" => {
            let text = value.get("text").and_then(|v| v.as_str())?;
            Some(Part::Reasoning {
                text: text.to_string(),
            })
        }
        "tool" => {
            let tool = value
                .get("tool")
                .and_then(|v| v.as_str())
                .unwrap_or("tool");
            let state = value.get("state").unwrap_or(&Value::Null);
            let input = state.get("input").cloned().unwrap_or(Value::Null);
            let output = state
                .get("output")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
            Some(Part::ToolCall {
                tool: tool.to_string(),
                input,
                output,
            })
        }
        "step-start" => Some(Part::StepStart),
        "step-finish" => {
            let tokens = parse_token_usage(value.get("tokens").unwrap_or(&Value::Null));
            Some(Part::StepFinish { tokens })
        }
        _ => None,
    }
}

pub fn parse_token_usage(value: &Value) -> TokenUsage {
    let cache = value.get("cache").unwrap_or(&Value::Null);
    TokenUsage {
        input: value.get("input").and_then(|v| v.as_u64()).unwrap_or(0),
        output: value.get("output").and_then(|v| v.as_u64()).unwrap_or(0),
        reasoning: value.get("reasoning").and_then(|v| v.as_u64()).unwrap_or(0),
        cache_read: cache.get("read").and_then(|v| v.as_u64()).unwrap_or(0),
        cache_write: cache.get("write").and_then(|v| v.as_u64()).unwrap_or(0),
    }
}

/// Model id carried by a message payload. Newer producers nest it under
/// `model.modelID`, older ones keep a flat `modelID` or a bare string.
pub fn model_name_from_message(value: &Value) -> Option<String> {
    if let Some(model) = value.get("model") {
        if let Some(id) = model.get("modelID").and_then(|v| v.as_str()) {
            return Some(id.to_string());
        }
        if let Some(id) = model.as_str() {
            return Some(id.to_string());
        }
    }
    value
        .get("modelID")
        .and_then(|v| v.as_str())
        .map(|id| id.to_string())
}

pub fn message_time_created_ms(value: &Value) -> Option<i64> {
    value
        .get("time")
        .and_then(|t| t.get("created"))
        .and_then(|v| v.as_i64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn role_falls_back_to_system() {
        assert_eq!(parse_role_value(&json!({ "role": "user" })), Role::User);
        assert_eq!(
            parse_role_value(&json!({ "role": "assistant" })),
            Role::Assistant
        );
        assert_eq!(parse_role_value(&json!({ "role": "synthetic" })), Role::System);
        assert_eq!(parse_role_value(&json!({})), Role::System);
    }

    #[test]
    fn parses_text_and_reasoning_parts() {
        assert_eq!(
            parse_part_value(&json!({ "type": "text", "text": "hello" })),
            Some(Part::Text {
                text: "hello".to_string()
            })
        );
        assert_eq!(
            parse_part_value(&json!({ "type": "reasoning", "text": "think" })),
            Some(Part::Reasoning {
                text: "think".to_string()
            })
        );
    }

    #[test]
    fn parses_tool_part_with_state() {
        let part = parse_part_value(&json!({
            "type": "tool",
            "tool": "exec_command",
            "state": { "status": "completed", "input": { "cmd": "ls" }, "output": "ok" }
        }))
        .expect("part");
        assert_eq!(
            part,
            Part::ToolCall {
                tool: "exec_command".to_string(),
                input: json!({ "cmd": "ls" }),
                output: Some("ok".to_string()),
            }
        );
    }

    #[test]
    fn parses_step_markers_and_tokens() {
        assert_eq!(parse_part_value(&json!({ "type": "step-start" })), Some(Part::StepStart));

        let part = parse_part_value(&json!({
            "type": "step-finish",
            "tokens": { "input": 1, "output": 2, "reasoning": 3, "cache": { "read": 4, "write": 5 } }
        }))
        .expect("part");
        let Part::StepFinish { tokens } = part else {
            panic!("expected step-finish");
        };
        assert_eq!(tokens.total(), 15);
    }

    #[test]
    fn skips_unknown_part_types() {
        assert_eq!(parse_part_value(&json!({ "type": "file", "url": "x" })), None);
        assert_eq!(parse_part_value(&json!({ "type": "text" })), None);
    }

    #[test]
    fn model_name_prefers_nested_model_id() {
        assert_eq!(
            model_name_from_message(&json!({
                "model": { "providerID": "anthropic", "modelID": "nested" },
                "modelID": "flat"
            })),
            Some("nested".to_string())
        );
        assert_eq!(
            model_name_from_message(&json!({ "modelID": "flat" })),
            Some("flat".to_string())
        );
        assert_eq!(
            model_name_from_message(&json!({ "model": "bare" })),
            Some("bare".to_string())
        );
        assert_eq!(model_name_from_message(&json!({})), None);
    }
}
