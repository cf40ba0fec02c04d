use async_trait::async_trait;

use crate::errors::AgentResult;
use crate::models::content::Content;
use crate::models::tool::{Tool, ToolCall};

/// A named group of tools that the agent can offer to the model
#[async_trait]
pub trait Toolkit: Send + Sync {
    /// Get the name of the toolkit, used as the prefix of every tool it exposes
    fn name(&self) -> &str;

    /// Get the toolkit description
    fn description(&self) -> &str;

    /// Get toolkit instructions, rendered into the system prompt
    fn instructions(&self) -> &str;

    /// Get available tools
    fn tools(&self) -> &[Tool];

    /// Call a tool with the given parameters. The name is the bare tool name,
    /// without the toolkit prefix.
    async fn call(&self, tool_call: ToolCall) -> AgentResult<Vec<Content>>;
}
