use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::errors::{AgentResult, ProviderResult};
use crate::models::message::Message;
use crate::models::tool::{Tool, ToolCall};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// One piece of a streamed model response
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    /// Text to show to the user as soon as it arrives
    TextFragment(String),
    /// The model wants a tool invoked. Unusable calls arrive as `Err` so they can be
    /// reported back to the model instead of aborting the turn.
    ToolCallRequest {
        id: String,
        tool_call: AgentResult<ToolCall>,
    },
    /// The response is complete
    StreamEnd { usage: Option<Usage> },
}

pub type ModelStream = BoxStream<'static, ProviderResult<ModelEvent>>;

/// Base trait for chat completion providers
#[async_trait]
pub trait Provider: Send + Sync {
    /// Start generating the next assistant message for the conversation.
    ///
    /// Text fragments are yielded as they are produced. Tool call requests follow
    /// once they are complete, and the stream always finishes with `StreamEnd`.
    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> ProviderResult<ModelStream>;
}
