use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while resolving or executing a tool call. These are stored inside
/// tool results so the model can see them, hence the serde derives.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum AgentError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Tool execution failed: {0}")]
    ExecutionError(String),

    #[error("No results found: {0}")]
    NoResultsFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Whether the agent loop should hand this error back to the model and keep going.
    /// Network, auth and parse failures inside a tool end the turn instead.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AgentError::ToolNotFound(_)
                | AgentError::InvalidParameters(_)
                | AgentError::NoResultsFound(_)
        )
    }
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Failures talking to the chat completion endpoint.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Request to the model failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Model endpoint returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Context length exceeded. Message: {0}")]
    ContextLengthExceeded(String),

    #[error("Model stream error: {0}")]
    Stream(String),

    #[error("Could not decode model response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Reasons a single user turn ends without a final answer.
#[derive(Error, Debug)]
pub enum ReplyError {
    #[error(transparent)]
    Model(#[from] ProviderError),

    #[error("Tool {tool} failed: {source}")]
    Tool { tool: String, source: AgentError },

    #[error("Gave up after {0} model calls without a final answer")]
    StepLimitExceeded(usize),

    #[error("Could not build the system prompt: {0}")]
    Prompt(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_errors() {
        assert!(AgentError::ToolNotFound("x".into()).is_recoverable());
        assert!(AgentError::InvalidParameters("x".into()).is_recoverable());
        assert!(AgentError::NoResultsFound("x".into()).is_recoverable());
        assert!(!AgentError::ExecutionError("x".into()).is_recoverable());
        assert!(!AgentError::Internal("x".into()).is_recoverable());
    }

    #[test]
    fn test_reply_error_messages() {
        let err = ReplyError::Tool {
            tool: "local_guide__geocode".to_string(),
            source: AgentError::ExecutionError("connection refused".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Tool local_guide__geocode failed: Tool execution failed: connection refused"
        );

        let err = ReplyError::from(ProviderError::Http {
            status: 401,
            body: "bad key".to_string(),
        });
        assert_eq!(err.to_string(), "Model endpoint returned 401: bad key");
    }
}
