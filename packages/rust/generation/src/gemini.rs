//! Gemini `generateContent` backend, the only provider with built-in search
//! grounding.

use async_trait::async_trait;
use contentcrew_shared::{ContentCrewError, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use crate::types::{Generation, GenerationRequest, Grounding, GroundingSource, ResponsePart, Role};
use crate::{ApiKey, GenerativeBackend, upstream_error};

#[derive(Debug, Clone)]
pub struct GeminiBackend {
    client: Client,
    base_url: String,
    model: String,
    api_key: ApiKey,
}

impl GeminiBackend {
    pub fn new(client: Client, base_url: &str, model: &str, api_key: ApiKey) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
        }
    }

    fn build_body(&self, request: &GenerationRequest) -> serde_json::Value {
        let contents: Vec<_> = request
            .messages
            .iter()
            .map(|m| {
                json!({
                    "role": match m.role {
                        Role::User => "user",
                        Role::Model => "model",
                    },
                    "parts": [{ "text": m.text }],
                })
            })
            .collect();

        let mut generation_config = json!({
            "candidateCount": 1,
            "maxOutputTokens": request.max_output_tokens,
            "responseModalities": ["TEXT"],
        });
        if let Some(t) = request.temperature {
            generation_config["temperature"] = json!(t);
        }

        let mut body = json!({
            "contents": contents,
            "generationConfig": generation_config,
        });
        if let Some(system) = &request.system {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }
        if request.web_search {
            body["tools"] = json!([{ "google_search": {} }]);
        }
        body
    }
}

#[async_trait]
impl GenerativeBackend for GeminiBackend {
    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model, web_search = request.web_search))]
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        let api_key = self.api_key.resolve()?;
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        debug!(%url, "calling gemini");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key.trim())
            .json(&self.build_body(request))
            .send()
            .await
            .map_err(|e| ContentCrewError::Network(format!("gemini request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ContentCrewError::parse(format!("invalid gemini response: {e}")))?;

        Ok(into_generation(parsed, &self.model))
    }
}

fn into_generation(parsed: GenerateContentResponse, model: &str) -> Generation {
    let usage = parsed.usage_metadata.unwrap_or_default();
    let mut generation = Generation {
        model: parsed.model_version.unwrap_or_else(|| model.to_string()),
        tokens_in: usage.prompt_token_count,
        tokens_out: usage.candidates_token_count,
        ..Default::default()
    };

    let Some(candidate) = parsed.candidates.into_iter().next() else {
        generation.finish_reason = parsed.prompt_feedback.and_then(|f| f.block_reason);
        return generation;
    };

    generation.finish_reason = candidate.finish_reason;
    generation.parts = candidate
        .content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|part| {
            if let Some(text) = part.text {
                Some(ResponsePart::Text { text })
            } else if let Some(code) = part.executable_code {
                Some(ResponsePart::ExecutableCode {
                    language: code.language.unwrap_or_default(),
                    code: code.code,
                })
            } else {
                debug!("skipping non-text gemini part");
                None
            }
        })
        .collect();

    generation.grounding = candidate.grounding_metadata.map(|g| Grounding {
        rendered_content: g.search_entry_point.and_then(|s| s.rendered_content),
        sources: g
            .grounding_chunks
            .into_iter()
            .filter_map(|c| c.web)
            .filter_map(|w| {
                w.uri.map(|uri| GroundingSource {
                    title: w.title,
                    uri,
                })
            })
            .collect(),
    });

    generation
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
    model_version: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    executable_code: Option<ExecutableCode>,
}

#[derive(Deserialize)]
struct ExecutableCode {
    language: Option<String>,
    code: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    search_entry_point: Option<SearchEntryPoint>,
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchEntryPoint {
    rendered_content: Option<String>,
}

#[derive(Deserialize)]
struct GroundingChunk {
    web: Option<WebChunk>,
}

#[derive(Deserialize)]
struct WebChunk {
    uri: Option<String>,
    title: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer) -> GeminiBackend {
        GeminiBackend::new(
            http_client(10).unwrap(),
            &server.uri(),
            "gemini-test",
            ApiKey::Literal("g-key".into()),
        )
    }

    #[tokio::test]
    async fn grounded_request_enables_search_tool_and_parses_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-test:generateContent"))
            .and(header("x-goog-api-key", "g-key"))
            .and(body_partial_json(json!({
                "tools": [{ "google_search": {} }],
                "generationConfig": { "candidateCount": 1, "maxOutputTokens": 4000 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": { "role": "model", "parts": [
                        { "text": "Findings" },
                        { "executableCode": { "language": "PYTHON", "code": "print(2)" } }
                    ]},
                    "finishReason": "STOP",
                    "groundingMetadata": {
                        "searchEntryPoint": { "renderedContent": "<div>chips</div>" },
                        "groundingChunks": [{ "web": { "uri": "https://a.example", "title": "A" } }]
                    }
                }],
                "usageMetadata": { "promptTokenCount": 5, "candidatesTokenCount": 7 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request = GenerationRequest::new("find schools")
            .with_temperature(0.3)
            .with_max_output_tokens(4000)
            .with_web_search(true);
        let generation = backend(&server).generate(&request).await.unwrap();

        assert_eq!(generation.text(), "Findings");
        assert_eq!(generation.parts.len(), 2);
        assert_eq!(generation.finish_reason.as_deref(), Some("STOP"));
        let grounding = generation.grounding.unwrap();
        assert_eq!(grounding.rendered_content.as_deref(), Some("<div>chips</div>"));
        assert_eq!(grounding.sources[0].uri, "https://a.example");
        assert_eq!(generation.tokens_out, 7);
    }

    #[tokio::test]
    async fn blocked_prompt_yields_empty_generation_with_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "promptFeedback": { "blockReason": "SAFETY" }
            })))
            .mount(&server)
            .await;

        let generation = backend(&server)
            .generate(&GenerationRequest::new("x"))
            .await
            .unwrap();
        assert!(generation.is_empty());
        assert_eq!(generation.finish_reason.as_deref(), Some("SAFETY"));
    }

    #[test]
    fn ungrounded_body_has_no_tools() {
        let b = GeminiBackend::new(Client::new(), "http://x", "m", ApiKey::Literal("k".into()));
        let body = b.build_body(&GenerationRequest::new("p").with_system("sys"));
        assert!(body.get("tools").is_none());
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "sys");
        assert_eq!(body["contents"][0]["role"], "user");
    }
}
