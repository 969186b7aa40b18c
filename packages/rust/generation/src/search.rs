//! Serper web search, used to give non-grounded backends fresh search context.

use contentcrew_shared::{ContentCrewError, Result, SearchConfig};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{ApiKey, upstream_error};

/// One organic search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub snippet: String,
}

#[derive(Debug, Clone)]
pub struct SerperSearch {
    client: Client,
    base_url: String,
    api_key: ApiKey,
    max_results: usize,
}

impl SerperSearch {
    pub fn new(client: Client, base_url: &str, api_key: ApiKey, max_results: usize) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            max_results,
        }
    }

    pub fn from_config(client: Client, config: &SearchConfig) -> Self {
        Self::new(
            client,
            &config.base_url,
            ApiKey::Env(config.api_key_env.clone()),
            config.max_results,
        )
    }

    /// Whether a key is available. Callers skip search entirely when not.
    pub fn is_configured(&self) -> bool {
        self.api_key.resolve().is_ok()
    }

    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let api_key = self.api_key.resolve()?;
        let url = format!("{}/search", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("X-API-KEY", api_key.trim())
            .json(&SearchRequest {
                q: query,
                num: self.max_results,
            })
            .send()
            .await
            .map_err(|e| ContentCrewError::Network(format!("search request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| ContentCrewError::parse(format!("invalid search response: {e}")))?;

        let mut results = parsed.organic;
        results.truncate(self.max_results);
        debug!(hits = results.len(), "search complete");
        Ok(results)
    }
}

/// Render hits as a Markdown list for prompt context.
pub fn render_results(query: &str, results: &[SearchResult]) -> String {
    let mut out = format!("Search results for \"{query}\":\n");
    if results.is_empty() {
        out.push_str("\n_No results._\n");
        return out;
    }
    for (i, r) in results.iter().enumerate() {
        out.push_str(&format!("\n{}. [{}]({})", i + 1, r.title, r.link));
        if !r.snippet.is_empty() {
            out.push_str(&format!("\n   {}", r.snippet));
        }
    }
    out.push('\n');
    out
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    q: &'a str,
    num: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic: Vec<SearchResult>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn posts_query_with_key_and_caps_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("X-API-KEY", "serper-key"))
            .and(body_json(serde_json::json!({ "q": "cbse schools", "num": 2 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "searchParameters": { "q": "cbse schools" },
                "organic": [
                    { "title": "A", "link": "https://a.example", "snippet": "first", "position": 1 },
                    { "title": "B", "link": "https://b.example", "position": 2 },
                    { "title": "C", "link": "https://c.example", "snippet": "third", "position": 3 }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let search = SerperSearch::new(
            http_client(10).unwrap(),
            &server.uri(),
            ApiKey::Literal("serper-key".into()),
            2,
        );
        let results = search.search("cbse schools").await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].snippet, "");

        let md = render_results("cbse schools", &results);
        assert!(md.contains("1. [A](https://a.example)\n   first"));
        assert!(md.contains("2. [B](https://b.example)"));
    }

    #[test]
    fn missing_key_means_not_configured() {
        let search = SerperSearch::new(
            Client::new(),
            "http://localhost",
            ApiKey::Env("CC_TEST_NO_SERPER_KEY_91".into()),
            5,
        );
        assert!(!search.is_configured());
    }

    #[test]
    fn empty_results_render_placeholder() {
        assert!(render_results("q", &[]).contains("_No results._"));
    }
}
