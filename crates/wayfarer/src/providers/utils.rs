use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Value};

use crate::errors::{AgentError, AgentResult, ProviderError, ProviderResult};
use crate::models::message::{Message, MessageContent};
use crate::models::tool::{Tool, ToolCall};

use super::base::Usage;

/// Convert internal Message format to OpenAI's API message specification
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    let mut messages_spec = Vec::new();

    for message in messages {
        let mut converted = json!({
            "role": message.role
        });

        let mut output = Vec::new();

        for content in &message.content {
            match content {
                MessageContent::Text(text) => {
                    if !text.text.is_empty() {
                        converted["content"] = json!(text.text);
                    }
                }
                MessageContent::ToolRequest(request) => {
                    // An unusable call is still listed so its error result has a call to answer
                    let (name, arguments) = match &request.tool_call {
                        Ok(tool_call) => (tool_call.name.as_str(), tool_call.arguments.to_string()),
                        Err(_) => (request.tool_name(), "{}".to_string()),
                    };
                    let entry = json!({
                        "id": request.id,
                        "type": "function",
                        "function": {
                            "name": sanitize_function_name(name),
                            "arguments": arguments,
                        }
                    });
                    match converted.get_mut("tool_calls").and_then(Value::as_array_mut) {
                        Some(tool_calls) => tool_calls.push(entry),
                        None => converted["tool_calls"] = json!([entry]),
                    }
                }
                MessageContent::ToolResponse(response) => {
                    let content = match &response.tool_result {
                        Ok(contents) => contents
                            .iter()
                            .map(|content| content.to_model_string())
                            .collect::<Vec<_>>()
                            .join("\n"),
                        // A tool result error is shown as output so the model can interpret the error message
                        Err(e) => format!("The tool call returned the following error:\n{}", e),
                    };
                    output.push(json!({
                        "role": "tool",
                        "content": content,
                        "tool_call_id": response.id
                    }));
                }
            }
        }

        if converted.get("content").is_some() || converted.get("tool_calls").is_some() {
            output.insert(0, converted);
        }
        messages_spec.extend(output);
    }

    messages_spec
}

/// Convert internal Tool format to OpenAI's API tool specification
pub fn tools_to_openai_spec(tools: &[Tool]) -> ProviderResult<Vec<Value>> {
    let mut tool_names = std::collections::HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(ProviderError::InvalidRequest(format!(
                "Duplicate tool name: {}",
                tool.name
            )));
        }

        result.push(json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.input_schema,
            }
        }));
    }

    Ok(result)
}

/// Build a tool call from the raw function name and argument text the model produced
pub fn parse_tool_call(id: &str, function_name: &str, arguments: &str) -> AgentResult<ToolCall> {
    if !is_valid_function_name(function_name) {
        return Err(AgentError::ToolNotFound(format!(
            "The provided function name '{}' had invalid characters, it must match this regex [a-zA-Z0-9_-]+",
            function_name
        )));
    }

    // Tools without parameters are sometimes called with no argument text at all
    if arguments.trim().is_empty() {
        return Ok(ToolCall::new(function_name, json!({})));
    }

    serde_json::from_str::<Value>(arguments)
        .map(|params| ToolCall::new(function_name, params))
        .map_err(|e| {
            AgentError::InvalidParameters(format!(
                "Could not interpret tool use parameters for id {}: {}",
                id, e
            ))
        })
}

pub fn usage_from_value(usage: &Value) -> Usage {
    let input_tokens = usage
        .get("prompt_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32);

    let output_tokens = usage
        .get("completion_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32);

    let total_tokens = usage
        .get("total_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32)
        .or_else(|| match (input_tokens, output_tokens) {
            (Some(input), Some(output)) => Some(input + output),
            _ => None,
        });

    Usage::new(input_tokens, output_tokens, total_tokens)
}

static INVALID_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_-]").unwrap());
static VALID_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap());

fn sanitize_function_name(name: &str) -> String {
    INVALID_NAME_CHARS.replace_all(name, "_").to_string()
}

fn is_valid_function_name(name: &str) -> bool {
    VALID_NAME.is_match(name)
}

/// Map an OpenAI error object to the matching provider error
pub fn openai_error(error: &Value) -> ProviderError {
    let message = error
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("Unknown error")
        .to_string();
    match error.get("code").and_then(|c| c.as_str()) {
        Some("context_length_exceeded") | Some("string_above_max_length") => {
            ProviderError::ContextLengthExceeded(message)
        }
        _ => ProviderError::Stream(error.to_string()),
    }
}
