//! Anthropic Messages API backend.

use async_trait::async_trait;
use contentcrew_shared::{ContentCrewError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::types::{Generation, GenerationRequest, ResponsePart, Role};
use crate::{ApiKey, GenerativeBackend, upstream_error};

const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct AnthropicBackend {
    client: Client,
    base_url: String,
    model: String,
    api_key: ApiKey,
}

impl AnthropicBackend {
    pub fn new(client: Client, base_url: &str, model: &str, api_key: ApiKey) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl GenerativeBackend for AnthropicBackend {
    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        if request.web_search {
            return Err(ContentCrewError::Generation(
                "search grounding is not available on the anthropic backend".into(),
            ));
        }
        let api_key = self.api_key.resolve()?;

        let body = MessagesRequest {
            model: &self.model,
            max_tokens: request.max_output_tokens,
            temperature: request.temperature,
            system: request.system.as_deref(),
            messages: request
                .messages
                .iter()
                .map(|m| ChatMessage {
                    role: match m.role {
                        Role::User => "user",
                        Role::Model => "assistant",
                    },
                    content: &m.text,
                })
                .collect(),
        };

        let url = format!("{}/v1/messages", self.base_url);
        debug!(%url, messages = body.messages.len(), "calling anthropic");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key.trim())
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| ContentCrewError::Network(format!("anthropic request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ContentCrewError::parse(format!("invalid anthropic response: {e}")))?;

        let parts = parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(ResponsePart::Text { text }),
                ContentBlock::Other => None,
            })
            .collect();

        Ok(Generation {
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
            parts,
            finish_reason: parsed.stop_reason,
            grounding: None,
            tokens_in: parsed.usage.as_ref().map_or(0, |u| u.input_tokens),
            tokens_out: parsed.usage.as_ref().map_or(0, |u| u.output_tokens),
        })
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    model: Option<String>,
    stop_reason: Option<String>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}
