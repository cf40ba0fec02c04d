use futures::stream::BoxStream;
use futures::TryStreamExt;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::errors::{AgentError, AgentResult, ReplyError};
use crate::models::content::Content;
use crate::models::conversation::Conversation;
use crate::models::message::{Message, MessageContent, ToolRequest, ToolResponse};
use crate::models::tool::{Tool, ToolCall};
use crate::prompt_template::load_prompt_file;
use crate::providers::base::{ModelEvent, Provider};
use crate::toolkits::Toolkit;

pub const DEFAULT_MAX_STEPS: usize = 8;

#[derive(Clone, Debug, Serialize)]
struct ToolkitInfo {
    name: String,
    description: String,
    instructions: String,
}

impl ToolkitInfo {
    fn new(name: &str, description: &str, instructions: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            instructions: instructions.to_string(),
        }
    }
}

/// Progress of a single user turn, in the order it happens
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyEvent {
    /// A fragment of the assistant's answer
    Text(String),
    /// The model asked for a tool; it is about to run
    ToolRequest(ToolRequest),
    /// A tool finished and its result was recorded
    ToolResponse(ToolResponse),
    /// The final assistant message of the turn
    Done(Message),
}

/// Agent integrates a chat model with the toolkits it can call on, and owns the
/// conversation history of the session
pub struct Agent {
    toolkits: Vec<Box<dyn Toolkit>>,
    provider: Box<dyn Provider>,
    history: Conversation,
    max_steps: usize,
}

impl Agent {
    /// Create a new Agent with the specified provider
    pub fn new(provider: Box<dyn Provider>) -> Self {
        Self {
            toolkits: Vec::new(),
            provider,
            history: Conversation::new(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// Cap the number of model calls a single turn may make
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// Add a toolkit to the agent
    pub fn add_toolkit(&mut self, toolkit: Box<dyn Toolkit>) {
        self.toolkits.push(toolkit);
    }

    pub fn history(&self) -> &Conversation {
        &self.history
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Get all tools from all toolkits with proper toolkit prefixing
    fn get_prefixed_tools(&self) -> Vec<Tool> {
        let mut tools = Vec::new();
        for toolkit in &self.toolkits {
            for tool in toolkit.tools() {
                tools.push(Tool::new(
                    format!("{}__{}", toolkit.name(), tool.name),
                    &tool.description,
                    tool.input_schema.clone(),
                ));
            }
        }
        tools
    }

    /// Find the toolkit and bare tool name for a prefixed tool name
    fn get_toolkit_for_tool<'a>(&self, prefixed_name: &'a str) -> Option<(&dyn Toolkit, &'a str)> {
        let (toolkit_name, tool_name) = prefixed_name.split_once("__")?;
        self.toolkits
            .iter()
            .find(|toolkit| toolkit.name() == toolkit_name)
            .map(|toolkit| (&**toolkit, tool_name))
    }

    /// Dispatch a single tool call to the appropriate toolkit
    async fn dispatch_tool_call(
        &self,
        tool_call: AgentResult<ToolCall>,
    ) -> AgentResult<Vec<Content>> {
        let call = tool_call?;
        let (toolkit, tool_name) = self
            .get_toolkit_for_tool(&call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;

        info!(toolkit = toolkit.name(), tool = tool_name, "dispatching tool call");
        toolkit
            .call(ToolCall::new(tool_name, call.arguments))
            .await
    }

    fn get_system_prompt(&self) -> Result<String, ReplyError> {
        let mut context = HashMap::new();
        let toolkits_info: Vec<ToolkitInfo> = self
            .toolkits
            .iter()
            .map(|toolkit| {
                ToolkitInfo::new(toolkit.name(), toolkit.description(), toolkit.instructions())
            })
            .collect();

        context.insert("toolkits", toolkits_info);
        load_prompt_file("system.md", &context).map_err(|e| ReplyError::Prompt(e.to_string()))
    }

    /// Answer one user question.
    ///
    /// The question and everything that follows (assistant messages, tool results)
    /// are appended to the history as the returned stream is polled. The stream ends
    /// after `ReplyEvent::Done`, or with an error if the model call fails, a tool fails
    /// in a way the model cannot recover from, or the turn runs out of steps.
    pub fn reply(
        &mut self,
        question: impl Into<String>,
    ) -> BoxStream<'_, Result<ReplyEvent, ReplyError>> {
        let question = question.into();

        Box::pin(async_stream::try_stream! {
            let tools = self.get_prefixed_tools();
            let system_prompt = self.get_system_prompt()?;
            self.history.push(Message::user().with_text(question));

            let mut done = false;
            for step in 0..self.max_steps {
                debug!(step, history = self.history.len(), "requesting model response");
                let mut stream = self
                    .provider
                    .stream(&system_prompt, self.history.messages(), &tools)
                    .await?;

                let mut text = String::new();
                let mut requests: Vec<ToolRequest> = Vec::new();
                while let Some(event) = stream.try_next().await? {
                    match event {
                        ModelEvent::TextFragment(fragment) => {
                            text.push_str(&fragment);
                            yield ReplyEvent::Text(fragment);
                        }
                        ModelEvent::ToolCallRequest { id, tool_call } => {
                            requests.push(ToolRequest { id, tool_call });
                        }
                        ModelEvent::StreamEnd { usage } => {
                            if let Some(usage) = usage {
                                debug!(?usage, "model stream finished");
                            }
                            break;
                        }
                    }
                }

                // Every step leaves an assistant entry, even when the model said nothing
                let mut response = Message::assistant();
                if !text.is_empty() || requests.is_empty() {
                    response = response.with_text(text);
                }
                for request in &requests {
                    response = response.with_content(MessageContent::ToolRequest(request.clone()));
                }
                self.history.push(response.clone());

                if requests.is_empty() {
                    yield ReplyEvent::Done(response);
                    done = true;
                    break;
                }

                let mut failure: Option<(String, AgentError)> = None;
                for request in requests {
                    yield ReplyEvent::ToolRequest(request.clone());

                    let output = self.dispatch_tool_call(request.tool_call.clone()).await;
                    if let Err(e) = &output {
                        if e.is_recoverable() {
                            warn!(tool = request.tool_name(), error = %e, "tool call failed, reporting to model");
                        } else if failure.is_none() {
                            failure = Some((request.tool_name().to_string(), e.clone()));
                        }
                    }

                    let tool_response = ToolResponse {
                        id: request.id,
                        tool_result: output,
                    };
                    self.history.push(
                        Message::tool().with_content(MessageContent::ToolResponse(tool_response.clone())),
                    );
                    yield ReplyEvent::ToolResponse(tool_response);
                }

                if let Some((tool, source)) = failure {
                    Err::<(), _>(ReplyError::Tool { tool, source })?;
                }
            }

            if !done {
                Err::<(), _>(ReplyError::StepLimitExceeded(self.max_steps))?;
            }
        })
    }
}
