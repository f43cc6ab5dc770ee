//! Model gateway trait and request/response types
//!
//! The gateway is the only boundary to the hosted generative-language API.
//! Everything above it (reports, chat, image generation) talks to this trait.

use crate::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod mock;
pub use mock::MockGateway;

/// Stream of partial responses produced by a streaming call
pub type ResponseStream = BoxStream<'static, Result<GenerateResponse>>;

/// Capability exposed by the hosted model endpoint
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Single-shot generation
    async fn generate_content(&self, request: GenerateRequest) -> Result<GenerateResponse>;

    /// Incremental generation; each item carries the text produced since the previous one
    async fn stream_content(&self, request: GenerateRequest) -> Result<ResponseStream>;
}

//
// ================= Request =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![Part::text(text)],
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Some("model".to_string()),
            parts: vec![Part::text(text)],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    /// Base64 payload
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfig {
    pub aspect_ratio: String,
    pub image_size: String,
}

/// One generation call, independent of the wire format
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub model: String,
    pub contents: Vec<Content>,
    pub system_instruction: Option<String>,
    /// Enable the web-search grounding tool
    pub web_search: bool,
    /// JSON schema the response text must satisfy
    pub response_schema: Option<Value>,
    pub thinking_budget: Option<u32>,
    pub image: Option<ImageConfig>,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::with_contents(model, vec![Content::user(prompt)])
    }

    pub fn with_contents(model: impl Into<String>, contents: Vec<Content>) -> Self {
        Self {
            model: model.into(),
            contents,
            system_instruction: None,
            web_search: false,
            response_schema: None,
            thinking_budget: None,
            image: None,
        }
    }

    pub fn grounded(mut self) -> Self {
        self.web_search = true;
        self
    }

    pub fn json_schema(mut self, schema: Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn thinking_budget(mut self, budget: u32) -> Self {
        self.thinking_budget = Some(budget);
        self
    }

    pub fn system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn image(mut self, aspect_ratio: &str, image_size: &str) -> Self {
        self.image = Some(ImageConfig {
            aspect_ratio: aspect_ratio.to_string(),
            image_size: image_size.to_string(),
        });
        self
    }

    /// Concatenated text of the last content entry (the current prompt)
    pub fn prompt_text(&self) -> String {
        self.contents
            .last()
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

//
// ================= Response =================
//

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding_metadata: Option<GroundingMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding_chunks: Option<Vec<GroundingChunk>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_search_queries: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GroundingChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web: Option<WebSource>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WebSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl GenerateResponse {
    /// Plain text response with no metadata
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            candidates: Some(vec![Candidate {
                content: Some(Content::model(text)),
                grounding_metadata: None,
                finish_reason: Some("STOP".to_string()),
            }]),
        }
    }

    /// Attach web grounding chunks as `(title, uri)` pairs to the first candidate
    pub fn with_web_sources(mut self, sources: &[(Option<&str>, Option<&str>)]) -> Self {
        let chunks = sources
            .iter()
            .map(|(title, uri)| GroundingChunk {
                web: Some(WebSource {
                    title: title.map(str::to_string),
                    uri: uri.map(str::to_string),
                }),
            })
            .collect();

        let candidates = self.candidates.get_or_insert_with(Vec::new);
        if candidates.is_empty() {
            candidates.push(Candidate::default());
        }
        candidates[0].grounding_metadata = Some(GroundingMetadata {
            grounding_chunks: Some(chunks),
            web_search_queries: None,
        });
        self
    }

    /// Response carrying a single inline image part
    pub fn from_image(mime_type: &str, data: impl Into<String>) -> Self {
        Self {
            candidates: Some(vec![Candidate {
                content: Some(Content {
                    role: Some("model".to_string()),
                    parts: vec![Part {
                        text: None,
                        inline_data: Some(InlineData {
                            mime_type: mime_type.to_string(),
                            data: data.into(),
                        }),
                    }],
                }),
                grounding_metadata: None,
                finish_reason: Some("STOP".to_string()),
            }]),
        }
    }

    pub fn first_candidate(&self) -> Option<&Candidate> {
        self.candidates.as_ref().and_then(|c| c.first())
    }

    /// Concatenated text parts of the first candidate; empty when absent
    pub fn text(&self) -> String {
        self.first_candidate()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }

    /// First inline binary part of the first candidate
    pub fn inline_data(&self) -> Option<&InlineData> {
        self.first_candidate()
            .and_then(|c| c.content.as_ref())
            .and_then(|content| content.parts.iter().find_map(|p| p.inline_data.as_ref()))
    }
}
