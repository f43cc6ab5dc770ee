//! Result normalization
//!
//! Turns raw model responses into typed results: grounding sources from
//! response metadata, and stats / trend records via a second,
//! schema-constrained extraction call. Extraction output is trusted by the
//! hosted service's contract, so the only local check is parse-or-fail.

use crate::error::DashboardError;
use crate::gateway::{GenerateRequest, GenerateResponse, ModelGateway};
use crate::models::{EconomicStats, GroundingSource, YieldDataPoint};
use crate::prompts;
use crate::Result;
use serde_json::{json, Value};
use tracing::warn;

const DEFAULT_SOURCE_TITLE: &str = "Source";

/// Citations attached to a grounded response. Never fails: absent metadata
/// yields an empty list and entries without a URI are dropped.
pub fn extract_sources(response: &GenerateResponse) -> Vec<GroundingSource> {
    response
        .first_candidate()
        .and_then(|c| c.grounding_metadata.as_ref())
        .and_then(|m| m.grounding_chunks.as_ref())
        .map(|chunks| {
            chunks
                .iter()
                .map(|chunk| {
                    let web = chunk.web.as_ref();
                    GroundingSource {
                        title: web
                            .and_then(|w| w.title.as_deref())
                            .filter(|t| !t.is_empty())
                            .unwrap_or(DEFAULT_SOURCE_TITLE)
                            .to_string(),
                        uri: web
                            .and_then(|w| w.uri.as_deref())
                            .unwrap_or_default()
                            .to_string(),
                    }
                })
                .filter(|s| !s.uri.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Output schema of the stats extraction call
pub fn stats_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "usdRate": { "type": "STRING" },
            "inflation": { "type": "STRING" },
            "sdfr": { "type": "STRING" },
            "slfr": { "type": "STRING" },
            "inflationTrend": { "type": "STRING", "enum": ["up", "down", "neutral"] }
        },
        "required": ["usdRate", "inflation", "sdfr", "slfr", "inflationTrend"]
    })
}

/// Output schema of the trend extraction call
pub fn trend_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "date": { "type": "STRING" },
                "91-Day": { "type": "NUMBER" },
                "182-Day": { "type": "NUMBER" },
                "364-Day": { "type": "NUMBER" }
            },
            "required": ["date", "91-Day", "182-Day", "364-Day"]
        }
    })
}

/// Parse extraction text into stats; any malformation is an error
pub fn parse_stats(text: &str) -> Result<EconomicStats> {
    serde_json::from_str(text.trim()).map_err(|e| {
        DashboardError::ExtractionError(format!("stats: {} | raw={}", e, text))
    })
}

/// Parse extraction text into a weekly series, keeping the returned order
pub fn parse_trend(text: &str) -> Result<Vec<YieldDataPoint>> {
    serde_json::from_str(text.trim()).map_err(|e| {
        DashboardError::ExtractionError(format!("trend: {} | raw={}", e, text))
    })
}

/// Second call reformatting the snapshot narrative into [`EconomicStats`]
pub async fn extract_stats(
    gateway: &dyn ModelGateway,
    model: &str,
    report: &str,
) -> Result<EconomicStats> {
    let request = GenerateRequest::new(model, prompts::stats_extraction(report))
        .json_schema(stats_schema());
    let response = gateway.generate_content(request).await?;
    parse_stats(&response.text())
}

/// Second call reformatting the trend narrative into weekly points.
/// Empty or malformed output is an error here; callers decide the fallback.
pub async fn extract_trend(
    gateway: &dyn ModelGateway,
    model: &str,
    report: &str,
) -> Result<Vec<YieldDataPoint>> {
    let request = GenerateRequest::new(model, prompts::trend_extraction(report))
        .json_schema(trend_schema());
    let response = gateway.generate_content(request).await?;
    let points = parse_trend(&response.text())?;
    if points.is_empty() {
        warn!("Trend extraction returned no points");
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockGateway;
    use crate::models::InflationTrend;

    #[test]
    fn test_extract_sources_filters_empty_uri() {
        let response = GenerateResponse::from_text("narrative").with_web_sources(&[
            (Some("CBSL Press Release"), Some("https://www.cbsl.gov.lk/press")),
            (Some("No link"), Some("")),
            (None, Some("https://economynext.com")),
            (Some(""), Some("https://dailymirror.lk")),
            (Some("Missing"), None),
        ]);

        let sources = extract_sources(&response);
        assert_eq!(sources.len(), 3);
        assert!(sources.iter().all(|s| !s.uri.is_empty()));
        assert_eq!(sources[0].title, "CBSL Press Release");
        assert_eq!(sources[1].title, "Source");
        assert_eq!(sources[2].title, "Source");
    }

    #[test]
    fn test_extract_sources_absent_metadata() {
        assert!(extract_sources(&GenerateResponse::default()).is_empty());
        assert!(extract_sources(&GenerateResponse::from_text("plain")).is_empty());

        let chunk_without_web: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"groundingMetadata":{"groundingChunks":[{}]}}]}"#,
        )
        .unwrap();
        assert!(extract_sources(&chunk_without_web).is_empty());
    }

    #[test]
    fn test_parse_stats_rejects_partial_record() {
        let partial = r#"{"usdRate":"299.85","inflation":"1.5%"}"#;
        assert!(matches!(
            parse_stats(partial),
            Err(DashboardError::ExtractionError(_))
        ));
        assert!(parse_stats("").is_err());
        assert!(parse_stats(r#"{"usdRate":"1","inflation":"2","sdfr":"3","slfr":"4","inflationTrend":"sideways"}"#).is_err());
    }

    #[test]
    fn test_parse_trend_keeps_order() {
        let text = r#"[
            {"date":"26 Sep","91-Day":7.58,"182-Day":7.88,"364-Day":8.02},
            {"date":"19 Sep","91-Day":7.60,"182-Day":7.90,"364-Day":8.04}
        ]"#;
        let points = parse_trend(text).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].date, "26 Sep");
        assert_eq!(points[1].day_91, 7.60);
    }

    #[tokio::test]
    async fn test_extract_stats_sends_schema() {
        let gateway = MockGateway::new(|_| {
            Ok(GenerateResponse::from_text(
                r#"{"usdRate":"299.85","inflation":"1.5%","sdfr":"7.25%","slfr":"8.25%","inflationTrend":"up"}"#,
            ))
        });

        let stats = extract_stats(&gateway, "gemini-flash-lite-latest", "USD at 299.85")
            .await
            .unwrap();
        assert_eq!(stats.inflation_trend, InflationTrend::Up);

        let calls = gateway.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].model, "gemini-flash-lite-latest");
        assert_eq!(calls[0].response_schema, Some(stats_schema()));
        assert!(!calls[0].web_search);
        assert!(calls[0].prompt_text().contains("USD at 299.85"));
    }

    #[tokio::test]
    async fn test_extract_trend_empty_text_is_error() {
        let gateway = MockGateway::new(|_| Ok(GenerateResponse::from_text("")));
        let result = extract_trend(&gateway, "m", "nothing found").await;
        assert!(matches!(result, Err(DashboardError::ExtractionError(_))));
    }
}
