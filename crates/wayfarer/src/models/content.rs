use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextContent {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonContent {
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
/// Content produced by a tool and relayed to the LLM
pub enum Content {
    Text(TextContent),
    Json(JsonContent),
}

impl Content {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Content::Text(TextContent { text: text.into() })
    }

    pub fn json(value: Value) -> Self {
        Content::Json(JsonContent { value })
    }

    /// Get the text content if this is a TextContent variant
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(&text.text),
            _ => None,
        }
    }

    /// Get the structured value if this is a JsonContent variant
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Content::Json(json) => Some(&json.value),
            _ => None,
        }
    }

    /// Render the content the way the model receives it
    pub fn to_model_string(&self) -> String {
        match self {
            Content::Text(text) => text.text.clone(),
            Content::Json(json) => json.value.to_string(),
        }
    }
}
