use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::base::{ModelStream, Provider};
use super::configs::OpenAiProviderConfig;
use super::sse::{SseDecoder, StreamAssembler, DONE_MARKER};
use super::utils::{messages_to_openai_spec, openai_error, tools_to_openai_spec};
use crate::errors::{ProviderError, ProviderResult};
use crate::models::message::Message;
use crate::models::tool::Tool;

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    fn build_payload(&self, system: &str, messages: &[Message], tools: &[Tool]) -> ProviderResult<Value> {
        let system_message = json!({
            "role": "system",
            "content": system
        });

        // create messages array with system message first
        let mut messages_array = vec![system_message];
        messages_array.extend(messages_to_openai_spec(messages));

        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_array,
            "stream": true,
            "stream_options": {"include_usage": true}
        });

        if !tools.is_empty() {
            payload["tools"] = json!(tools_to_openai_spec(tools)?);
        }
        if let Some(temp) = self.config.temperature {
            payload["temperature"] = json!(temp);
        }
        if let Some(tokens) = self.config.max_tokens {
            payload["max_tokens"] = json!(tokens);
        }

        Ok(payload)
    }

    async fn post(&self, payload: &Value) -> ProviderResult<reqwest::Response> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        // Raise specific error if context length is exceeded
        if let Some(error) = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|value| value.get("error").cloned())
        {
            if let err @ ProviderError::ContextLengthExceeded(_) = openai_error(&error) {
                return Err(err);
            }
        }
        Err(ProviderError::Http {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> ProviderResult<ModelStream> {
        let payload = self.build_payload(system, messages, tools)?;
        debug!(model = %self.config.model, messages = messages.len(), tools = tools.len(), "sending chat completion request");

        let response = self.post(&payload).await?;
        let mut bytes = Box::pin(response.bytes_stream());

        let stream: ModelStream = Box::pin(async_stream::try_stream! {
            let mut decoder = SseDecoder::new();
            let mut assembler = StreamAssembler::new();
            let mut ended = false;

            while !ended {
                let payloads: Vec<String> = match bytes.next().await {
                    Some(chunk) => decoder.push(&chunk.map_err(ProviderError::Request)?),
                    None => {
                        ended = true;
                        decoder.finish().into_iter().collect()
                    }
                };

                for payload in payloads {
                    if payload == DONE_MARKER {
                        ended = true;
                        break;
                    }
                    debug!(response_chunk = %payload, "chat completion chunk");
                    let chunk: Value = serde_json::from_str(&payload).map_err(ProviderError::Decode)?;
                    for event in assembler.push_chunk(&chunk)? {
                        yield event;
                    }
                }
            }

            for event in assembler.finish() {
                yield event;
            }
        });

        Ok(stream)
    }
}
