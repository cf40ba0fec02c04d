//! Incremental decoding of OpenAI-style server-sent event streams
use std::collections::BTreeMap;

use serde_json::Value;
use uuid::Uuid;

use super::base::{ModelEvent, Usage};
use super::utils::{openai_error, parse_tool_call, usage_from_value};
use crate::errors::ProviderResult;

pub const DONE_MARKER: &str = "[DONE]";

/// Splits a byte stream into `data:` payloads. Chunks may end mid-line, so the
/// unterminated tail is kept until the next push.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        let mut start = 0usize;
        for i in 0..self.buf.len() {
            if self.buf[i] == b'\n' {
                if let Some(payload) = data_payload(&self.buf[start..i]) {
                    payloads.push(payload);
                }
                start = i + 1;
            }
        }
        if start > 0 {
            self.buf.drain(0..start);
        }
        payloads
    }

    /// Flush a final line that was not newline terminated
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buf);
        data_payload(&rest)
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = std::str::from_utf8(line).ok()?.trim();
    let payload = line.strip_prefix("data:")?.trim();
    if payload.is_empty() {
        None
    } else {
        Some(payload.to_string())
    }
}

#[derive(Debug, Default, Clone)]
struct PartialToolCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Rebuilds a complete response from streamed chat completion chunks.
///
/// Text deltas are handed back right away. Tool calls arrive split across many
/// chunks keyed by index and are only emitted from `finish`.
#[derive(Debug, Default)]
pub struct StreamAssembler {
    calls: BTreeMap<usize, PartialToolCall>,
    usage: Option<Usage>,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_chunk(&mut self, chunk: &Value) -> ProviderResult<Vec<ModelEvent>> {
        if let Some(error) = chunk.get("error") {
            return Err(openai_error(error));
        }

        if let Some(usage) = chunk.get("usage").filter(|u| u.is_object()) {
            self.usage = Some(usage_from_value(usage));
        }

        let mut events = Vec::new();
        let choices = chunk
            .get("choices")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for choice in choices {
            let delta = &choice["delta"];

            if let Some(text) = delta.get("content").and_then(Value::as_str) {
                if !text.is_empty() {
                    events.push(ModelEvent::TextFragment(text.to_string()));
                }
            }

            if let Some(tool_calls) = delta.get("tool_calls").and_then(Value::as_array) {
                for (position, tool_call) in tool_calls.iter().enumerate() {
                    let index = tool_call
                        .get("index")
                        .and_then(Value::as_u64)
                        .map(|i| i as usize)
                        .unwrap_or(position);
                    self.push_tool_delta(
                        index,
                        tool_call.get("id").and_then(Value::as_str),
                        tool_call["function"].get("name").and_then(Value::as_str),
                        tool_call["function"].get("arguments").and_then(Value::as_str),
                    );
                }
            }
        }

        Ok(events)
    }

    // Indexes come from the server and may be sparse
    fn push_tool_delta(
        &mut self,
        index: usize,
        id: Option<&str>,
        name_delta: Option<&str>,
        args_delta: Option<&str>,
    ) {
        let slot = self.calls.entry(index).or_default();
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            if slot.id.is_none() {
                slot.id = Some(id.to_string());
            }
        }
        if let Some(name) = name_delta {
            slot.name.push_str(name);
        }
        if let Some(args) = args_delta {
            slot.arguments.push_str(args);
        }
    }

    /// Emit the reassembled tool calls followed by the end of stream marker
    pub fn finish(self) -> Vec<ModelEvent> {
        let mut events: Vec<ModelEvent> = self
            .calls
            .into_values()
            .filter(|call| call.id.is_some() || !call.name.is_empty())
            .map(|call| {
                let id = call
                    .id
                    .unwrap_or_else(|| format!("call_{}", Uuid::new_v4().simple()));
                let tool_call = parse_tool_call(&id, &call.name, &call.arguments);
                ModelEvent::ToolCallRequest { id, tool_call }
            })
            .collect();
        events.push(ModelEvent::StreamEnd { usage: self.usage });
        events
    }
}
