use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::errors::ProviderResult;
use crate::models::message::{Message, MessageContent};
use crate::models::tool::Tool;
use crate::providers::base::{ModelEvent, ModelStream, Provider};

/// A mock provider that replays pre-configured responses, one per call, for testing.
///
/// Clones share the same script and call log, so a test can keep a handle after
/// handing the provider to an agent.
#[derive(Clone, Default)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<Vec<ModelEvent>>>>,
    calls: Arc<AtomicUsize>,
    received: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of streamed responses
    pub fn new(responses: Vec<Vec<ModelEvent>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Default::default()
        }
    }

    /// Create a mock provider whose responses stream the given assistant messages
    pub fn with_replies(replies: Vec<Message>) -> Self {
        Self::new(replies.iter().map(message_to_events).collect())
    }

    /// Number of completions requested so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The conversation sent with each request, in call order
    pub fn received(&self) -> Vec<Vec<Message>> {
        self.received.lock().unwrap().clone()
    }
}

fn message_to_events(message: &Message) -> Vec<ModelEvent> {
    let mut events: Vec<ModelEvent> = message
        .content
        .iter()
        .filter_map(|content| match content {
            MessageContent::Text(text) => Some(ModelEvent::TextFragment(text.text.clone())),
            MessageContent::ToolRequest(request) => Some(ModelEvent::ToolCallRequest {
                id: request.id.clone(),
                tool_call: request.tool_call.clone(),
            }),
            MessageContent::ToolResponse(_) => None,
        })
        .collect();
    events.push(ModelEvent::StreamEnd { usage: None });
    events
}

#[async_trait]
impl Provider for MockProvider {
    async fn stream(
        &self,
        _system: &str,
        messages: &[Message],
        _tools: &[Tool],
    ) -> ProviderResult<ModelStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.received.lock().unwrap().push(messages.to_vec());

        let events = {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                // Return an empty response if no more pre-configured responses
                vec![ModelEvent::StreamEnd { usage: None }]
            } else {
                responses.remove(0)
            }
        };

        Ok(Box::pin(futures::stream::iter(events.into_iter().map(Ok))))
    }
}
