//! OpenRouter backend (OpenAI-compatible chat completions).

use async_trait::async_trait;
use contentcrew_shared::{ContentCrewError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::types::{Generation, GenerationRequest, ResponsePart, Role};
use crate::{ApiKey, GenerativeBackend, upstream_error};

#[derive(Debug, Clone)]
pub struct OpenRouterBackend {
    client: Client,
    base_url: String,
    model: String,
    api_key: ApiKey,
}

impl OpenRouterBackend {
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
impl GenerativeBackend for OpenRouterBackend {
    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        if request.web_search {
            return Err(ContentCrewError::Generation(
                "search grounding is not available on the openrouter backend".into(),
            ));
        }
        let api_key = self.api_key.resolve()?;

        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.extend(request.messages.iter().map(|m| ChatMessage {
            role: match m.role {
                Role::User => "user",
                Role::Model => "assistant",
            },
            content: &m.text,
        }));

        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_output_tokens,
        };

        let url = format!("{}/v1/chat/completions", self.base_url);
        debug!(%url, "calling openrouter");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key.trim())
            .json(&body)
            .send()
            .await
            .map_err(|e| ContentCrewError::Network(format!("openrouter request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ContentCrewError::parse(format!("invalid openrouter response: {e}")))?;

        let choice = parsed.choices.into_iter().next();
        let finish_reason = choice.as_ref().and_then(|c| c.finish_reason.clone());
        let parts = choice
            .and_then(|c| c.message.content)
            .filter(|text| !text.is_empty())
            .map(|text| vec![ResponsePart::Text { text }])
            .unwrap_or_default();

        Ok(Generation {
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
            parts,
            finish_reason,
            grounding: None,
            tokens_in: parsed.usage.as_ref().map_or(0, |u| u.prompt_tokens),
            tokens_out: parsed.usage.as_ref().map_or(0, |u| u.completion_tokens),
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    model: Option<String>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer) -> OpenRouterBackend {
        OpenRouterBackend::new(
            http_client(10).unwrap(),
            &server.uri(),
            "deepseek/test",
            ApiKey::Literal("or-key".into()),
        )
    }

    #[tokio::test]
    async fn bearer_auth_and_system_message_first() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer or-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "deepseek/test",
                "messages": [
                    { "role": "system", "content": "sys" },
                    { "role": "user", "content": "draft" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "deepseek/test",
                "choices": [{
                    "message": { "role": "assistant", "content": "# Post" },
                    "finish_reason": "stop"
                }],
                "usage": { "prompt_tokens": 3, "completion_tokens": 4 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request = GenerationRequest::new("draft").with_system("sys");
        let generation = backend(&server).generate(&request).await.unwrap();
        assert_eq!(generation.text(), "# Post");
        assert_eq!(generation.finish_reason.as_deref(), Some("stop"));
        assert_eq!(generation.tokens_in, 3);
    }

    #[tokio::test]
    async fn null_content_gives_empty_generation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "content": null }, "finish_reason": "length" }]
            })))
            .mount(&server)
            .await;

        let generation = backend(&server)
            .generate(&GenerationRequest::new("x"))
            .await
            .unwrap();
        assert!(generation.is_empty());
        assert_eq!(generation.finish_reason.as_deref(), Some("length"));
    }
}
