//! Gemini API client
//!
//! HTTP implementation of [`ModelGateway`] over the generativelanguage REST API.
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::error::DashboardError;
use crate::gateway::{
    Content, GenerateRequest, GenerateResponse, ImageConfig, ModelGateway, ResponseStream,
};
use crate::keys::ApiKey;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info};

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: ApiKey,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: ApiKey, base_url: impl Into<String>) -> crate::Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, model: &str, method: &str, key: &str) -> String {
        match method {
            "streamGenerateContent" => format!(
                "{}/models/{}:{}?alt=sse&key={}",
                self.base_url, model, method, key
            ),
            _ => format!("{}/models/{}:{}?key={}", self.base_url, model, method, key),
        }
    }

    fn key(&self) -> crate::Result<String> {
        if !self.api_key.is_configured() {
            return Err(DashboardError::MissingApiKey);
        }
        Ok(self.api_key.get())
    }

    async fn post(&self, url: &str, body: &GeminiRequest) -> crate::Result<Response> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                DashboardError::GatewayError(format!("Gemini API error: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(status = %status, "Gemini API error response: {}", error_text);
            return Err(DashboardError::GatewayError(format!(
                "{}: {}",
                status, error_text
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl ModelGateway for GeminiClient {
    async fn generate_content(&self, request: GenerateRequest) -> crate::Result<GenerateResponse> {
        let key = self.key()?;
        let url = self.endpoint(&request.model, "generateContent", &key);
        let body = GeminiRequest::from(&request);

        info!(
            model = %request.model,
            grounded = request.web_search,
            schema = request.response_schema.is_some(),
            "Calling Gemini API"
        );

        let response = self.post(&url, &body).await?;

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            DashboardError::GatewayError(format!("Gemini parse error: {}", e))
        })?;

        debug!(
            model = %request.model,
            chars = parsed.text().len(),
            "Gemini response received"
        );

        Ok(parsed)
    }

    async fn stream_content(&self, request: GenerateRequest) -> crate::Result<ResponseStream> {
        let key = self.key()?;
        let url = self.endpoint(&request.model, "streamGenerateContent", &key);
        let body = GeminiRequest::from(&request);

        info!(model = %request.model, "Opening Gemini stream");

        let response = self.post(&url, &body).await?;
        let mut bytes = response.bytes_stream();

        let stream = async_stream::try_stream! {
            let mut decoder = SseDecoder::default();
            while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(DashboardError::from)?;
                for payload in decoder.push(&chunk) {
                    let parsed: GenerateResponse =
                        serde_json::from_str(&payload).map_err(DashboardError::from)?;
                    yield parsed;
                }
            }
            if let Some(payload) = decoder.finish() {
                let parsed: GenerateResponse =
                    serde_json::from_str(&payload).map_err(DashboardError::from)?;
                yield parsed;
            }
        };

        Ok(stream.boxed())
    }
}

//
// ================= Wire Format =================
//

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<crate::gateway::Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Debug, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_config: Option<ImageConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

impl From<&GenerateRequest> for GeminiRequest {
    fn from(request: &GenerateRequest) -> Self {
        let generation_config = GenerationConfig {
            response_mime_type: request
                .response_schema
                .as_ref()
                .map(|_| "application/json".to_string()),
            response_schema: request.response_schema.clone(),
            thinking_config: request
                .thinking_budget
                .map(|thinking_budget| ThinkingConfig { thinking_budget }),
            image_config: request.image.clone(),
        };

        let has_config = generation_config.response_schema.is_some()
            || generation_config.thinking_config.is_some()
            || generation_config.image_config.is_some();

        Self {
            contents: request.contents.clone(),
            system_instruction: request.system_instruction.as_ref().map(|text| {
                SystemInstruction {
                    parts: vec![crate::gateway::Part::text(text.clone())],
                }
            }),
            tools: request
                .web_search
                .then(|| vec![Tool { google_search: GoogleSearch {} }]),
            generation_config: has_config.then_some(generation_config),
        }
    }
}

//
// ================= Server-Sent Events =================
//

/// Incremental decoder for `alt=sse` responses. Bytes may arrive split at
/// arbitrary points, including inside a multi-byte character.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feed bytes; returns the data payload of every event completed by them
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\r', '\n']);

            if line.is_empty() {
                if !self.data.is_empty() {
                    events.push(self.data.join("\n"));
                    self.data.clear();
                }
            } else if let Some(rest) = line.strip_prefix("data:") {
                self.data.push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
            }
        }

        events
    }

    /// Payload of an event left unterminated when the stream closed
    pub fn finish(&mut self) -> Option<String> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let rest = String::from_utf8_lossy(&rest);
            let line = rest.trim_end_matches(['\r', '\n']);
            if let Some(data) = line.strip_prefix("data:") {
                self.data.push(data.strip_prefix(' ').unwrap_or(data).to_string());
            }
        }

        if self.data.is_empty() {
            None
        } else {
            let payload = self.data.join("\n");
            self.data.clear();
            Some(payload)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_grounded_request_serialization() {
        let request = GenerateRequest::new("gemini-3-flash-preview", "Latest CBSL auctions")
            .grounded();
        let json = serde_json::to_value(GeminiRequest::from(&request)).unwrap();

        assert_eq!(json["contents"][0]["parts"][0]["text"], "Latest CBSL auctions");
        assert_eq!(json["contents"][0]["role"], "user");
        assert!(json["tools"][0]["googleSearch"].is_object());
        assert!(json.get("generationConfig").is_none());
    }

    #[test]
    fn test_schema_request_sets_json_mime_type() {
        let request = GenerateRequest::new("gemini-flash-lite-latest", "Extract")
            .json_schema(json!({"type": "ARRAY"}));
        let json = serde_json::to_value(GeminiRequest::from(&request)).unwrap();

        assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(json["generationConfig"]["responseSchema"]["type"], "ARRAY");
        assert!(json.get("tools").is_none());
    }

    #[test]
    fn test_thinking_and_image_config() {
        let request = GenerateRequest::new("gemini-3-pro-preview", "Report").thinking_budget(32768);
        let json = serde_json::to_value(GeminiRequest::from(&request)).unwrap();
        assert_eq!(json["generationConfig"]["thinkingConfig"]["thinkingBudget"], 32768);

        let request = GenerateRequest::new("gemini-3-pro-image-preview", "Chart").image("16:9", "2K");
        let json = serde_json::to_value(GeminiRequest::from(&request)).unwrap();
        assert_eq!(json["generationConfig"]["imageConfig"]["aspectRatio"], "16:9");
        assert_eq!(json["generationConfig"]["imageConfig"]["imageSize"], "2K");
    }

    #[test]
    fn test_system_instruction_serialization() {
        let request = GenerateRequest::new("m", "hi").system_instruction("Be brief");
        let json = serde_json::to_value(GeminiRequest::from(&request)).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "Be brief");
    }

    #[test]
    fn test_sse_decoder_handles_split_events() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: {\"a\":").is_empty());
        let events = decoder.push(b"1}\r\n\r\ndata: {\"b\":2}\n\n");
        assert_eq!(events, vec!["{\"a\":1}".to_string(), "{\"b\":2}".to_string()]);
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_sse_decoder_multibyte_split() {
        let payload = "data: {\"text\":\"රු\"}\n\n".as_bytes();
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(&payload[..16]).is_empty());
        let events = decoder.push(&payload[16..]);
        assert_eq!(events, vec!["{\"text\":\"රු\"}".to_string()]);
    }

    #[test]
    fn test_sse_decoder_flushes_unterminated_event() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: {\"done\":true}").is_empty());
        assert_eq!(decoder.finish(), Some("{\"done\":true}".to_string()));
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let client = GeminiClient::new(ApiKey::default(), "http://127.0.0.1:9").unwrap();
        let result = client
            .generate_content(GenerateRequest::new("m", "what is SLFR?"))
            .await;

        assert!(matches!(result, Err(DashboardError::MissingApiKey)));
        let error_msg = result.unwrap_err().to_string();
        assert!(error_msg.to_lowercase().contains("api key"));
    }
}
