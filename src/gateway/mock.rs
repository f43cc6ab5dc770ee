//! Mock gateway for development & testing
//!
//! Keeps the dashboard functional without a hosted model. Behavior is
//! supplied as closures so tests can script failures, delays and streams.

use super::{GenerateRequest, GenerateResponse, ModelGateway, ResponseStream};
use crate::error::DashboardError;
use crate::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use std::sync::{Arc, Mutex};

type Responder =
    Arc<dyn Fn(GenerateRequest) -> BoxFuture<'static, Result<GenerateResponse>> + Send + Sync>;
type StreamResponder = Arc<dyn Fn(GenerateRequest) -> Result<ResponseStream> + Send + Sync>;

pub struct MockGateway {
    responder: Responder,
    stream_responder: StreamResponder,
    calls: Mutex<Vec<GenerateRequest>>,
}

impl MockGateway {
    /// Gateway answering every call synchronously with `f`
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&GenerateRequest) -> Result<GenerateResponse> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Self::new_async(move |request| {
            let f = Arc::clone(&f);
            let fut: BoxFuture<'static, Result<GenerateResponse>> =
                Box::pin(async move { f(&request) });
            fut
        })
    }

    /// Gateway answering every call with the future returned by `f`
    pub fn new_async<F>(f: F) -> Self
    where
        F: Fn(GenerateRequest) -> BoxFuture<'static, Result<GenerateResponse>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            responder: Arc::new(f),
            stream_responder: Arc::new(|_: GenerateRequest| {
                Err(DashboardError::StreamError("no stream scripted".to_string()))
            }),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Script the chunks a streaming call yields
    pub fn with_stream<F>(mut self, f: F) -> Self
    where
        F: Fn(&GenerateRequest) -> Result<Vec<Result<GenerateResponse>>> + Send + Sync + 'static,
    {
        self.stream_responder =
            Arc::new(move |request: GenerateRequest| Ok(stream::iter(f(&request)?).boxed()));
        self
    }

    /// Script a stream directly, for chunks that arrive over time
    pub fn with_live_stream<F>(mut self, f: F) -> Self
    where
        F: Fn(&GenerateRequest) -> Result<ResponseStream> + Send + Sync + 'static,
    {
        self.stream_responder = Arc::new(move |request: GenerateRequest| f(&request));
        self
    }

    /// Canned Sri Lankan market data for offline runs
    pub fn offline() -> Self {
        Self::new(|request| Ok(offline_response(request))).with_stream(|request| {
            let reply = format!(
                "(offline) You asked: {}. Connect a GEMINI_API_KEY for live analysis.",
                request.prompt_text()
            );
            Ok(reply
                .split_inclusive(' ')
                .map(|word| Ok(GenerateResponse::from_text(word)))
                .collect())
        })
    }

    /// Requests received so far, in call order
    pub fn calls(&self) -> Vec<GenerateRequest> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn record(&self, request: &GenerateRequest) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.clone());
        }
    }
}

#[async_trait]
impl ModelGateway for MockGateway {
    async fn generate_content(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        self.record(&request);
        (self.responder)(request).await
    }

    async fn stream_content(&self, request: GenerateRequest) -> Result<ResponseStream> {
        self.record(&request);
        (self.stream_responder)(request)
    }
}

fn offline_response(request: &GenerateRequest) -> GenerateResponse {
    if let Some(schema) = &request.response_schema {
        let body = if schema.get("type").and_then(|t| t.as_str()) == Some("ARRAY") {
            r#"[
                {"date":"12 Sep","91-Day":7.62,"182-Day":7.91,"364-Day":8.05},
                {"date":"19 Sep","91-Day":7.60,"182-Day":7.90,"364-Day":8.04},
                {"date":"26 Sep","91-Day":7.58,"182-Day":7.88,"364-Day":8.02},
                {"date":"03 Oct","91-Day":7.55,"182-Day":7.86,"364-Day":8.00},
                {"date":"10 Oct","91-Day":7.55,"182-Day":7.85,"364-Day":7.98}
            ]"#
        } else {
            r#"{"usdRate":"299.85","inflation":"1.5%","sdfr":"7.25%","slfr":"8.25%","inflationTrend":"neutral"}"#
        };
        return GenerateResponse::from_text(body);
    }

    if request.image.is_some() {
        // 1x1 transparent PNG
        return GenerateResponse::from_image(
            "image/png",
            "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGAWjR9awAAAABJRU5ErkJggg==",
        );
    }

    GenerateResponse::from_text(format!(
        "(offline) Canned commentary for: {}",
        request.prompt_text().lines().next().unwrap_or_default()
    ))
    .with_web_sources(&[(
        Some("Central Bank of Sri Lanka"),
        Some("https://www.cbsl.gov.lk"),
    )])
}
