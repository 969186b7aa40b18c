//! Provider-neutral request and response types.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// One completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
    pub max_output_tokens: u32,
    /// Ask the provider to ground the answer in live web search.
    /// Only providers with built-in search support honor it.
    pub web_search: bool,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            messages: vec![Message::user(prompt)],
            temperature: None,
            max_output_tokens: 4096,
            web_search: false,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = tokens;
        self
    }

    pub fn with_web_search(mut self, on: bool) -> Self {
        self.web_search = on;
        self
    }

    /// Prepend earlier turns (e.g. a grounding exchange) before the prompt.
    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        let mut messages = history;
        messages.append(&mut self.messages);
        self.messages = messages;
        self
    }
}

/// A piece of model output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePart {
    Text { text: String },
    ExecutableCode { language: String, code: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub title: Option<String>,
    pub uri: String,
}

/// Search grounding attached to a response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grounding {
    /// Provider-rendered search widget (HTML).
    pub rendered_content: Option<String>,
    pub sources: Vec<GroundingSource>,
}

/// One completion result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generation {
    pub model: String,
    pub parts: Vec<ResponsePart>,
    pub finish_reason: Option<String>,
    pub grounding: Option<Grounding>,
    pub tokens_in: u64,
    pub tokens_out: u64,
}

impl Generation {
    /// Concatenated text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ResponsePart::Text { text } => Some(text.as_str()),
                ResponsePart::ExecutableCode { .. } => None,
            })
            .collect()
    }

    /// True when the model produced no usable text.
    pub fn is_empty(&self) -> bool {
        self.text().trim().is_empty()
    }

    /// Render every part for a transcript log. Text parts are written as-is,
    /// code parts as fenced blocks, and the grounding widget is appended when
    /// the provider returned one. Empty when there are no parts.
    pub fn render_transcript(&self) -> String {
        if self.parts.is_empty() {
            return String::new();
        }

        let mut out = String::new();
        for part in &self.parts {
            match part {
                ResponsePart::Text { text } => out.push_str(text),
                ResponsePart::ExecutableCode { language, code } => {
                    out.push_str(&format!("\n```{}\n{code}\n```\n", fence_language(language)));
                }
            }
        }

        if let Some(rendered) = self
            .grounding
            .as_ref()
            .and_then(|g| g.rendered_content.as_deref())
        {
            out.push_str("\n--- Search Results Used ---\n");
            out.push_str(rendered);
            out.push('\n');
        }

        out
    }
}

fn fence_language(language: &str) -> String {
    match language.trim() {
        "" | "LANGUAGE_UNSPECIFIED" => "python".to_string(),
        other => other.to_ascii_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(t: &str) -> ResponsePart {
        ResponsePart::Text {
            text: t.to_string(),
        }
    }

    fn code(source: &str) -> ResponsePart {
        ResponsePart::ExecutableCode {
            language: "PYTHON".into(),
            code: source.into(),
        }
    }

    #[test]
    fn text_skips_code_parts() {
        let generation = Generation {
            parts: vec![
                text("Hello "),
                code("print(1)"),
                text("world"),
            ],
            ..Default::default()
        };
        assert_eq!(generation.text(), "Hello world");
        assert!(!generation.is_empty());
    }

    #[test]
    fn transcript_fences_code_and_appends_search_block() {
        let generation = Generation {
            parts: vec![
                text("Intro"),
                code("x = 1"),
            ],
            grounding: Some(Grounding {
                rendered_content: Some("<div>chips</div>".into()),
                sources: vec![],
            }),
            ..Default::default()
        };
        let md = generation.render_transcript();
        assert!(md.starts_with("Intro"));
        assert!(md.contains("```python\nx = 1\n```"));
        assert!(md.ends_with("\n--- Search Results Used ---\n<div>chips</div>\n"));
    }

    #[test]
    fn transcript_without_parts_is_empty() {
        let generation = Generation {
            grounding: Some(Grounding {
                rendered_content: Some("<div/>".into()),
                sources: vec![],
            }),
            ..Default::default()
        };
        assert_eq!(generation.render_transcript(), "");
        assert!(generation.is_empty());
    }

    #[test]
    fn history_goes_before_prompt() {
        let request = GenerationRequest::new("write")
            .with_history(vec![Message::user("search"), Message::model("found")]);
        let texts: Vec<_> = request.messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["search", "found", "write"]);
    }
}
