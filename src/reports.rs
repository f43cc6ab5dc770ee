//! Report fetchers
//!
//! One operation per report kind. Gateway and extraction failures are logged
//! here and folded into the kind's fallback result, so callers only ever see
//! a populated [`SearchResult`].

use crate::config::ModelConfig;
use crate::error::DashboardError;
use crate::gateway::{GenerateRequest, ModelGateway};
use crate::image::GeneratedImage;
use crate::models::{ImageSize, ReportKind, SearchResult, YieldDataPoint};
use crate::normalizer::{extract_sources, extract_stats, extract_trend};
use crate::prompts;
use crate::Result;
use chrono::Local;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct ReportService {
    gateway: Arc<dyn ModelGateway>,
    models: ModelConfig,
}

impl ReportService {
    pub fn new(gateway: Arc<dyn ModelGateway>, models: ModelConfig) -> Self {
        Self { gateway, models }
    }

    /// Grounded narrative call shared by the plain report kinds
    async fn grounded_report(&self, kind: ReportKind, request: GenerateRequest) -> SearchResult {
        match self.gateway.generate_content(request).await {
            Ok(response) => {
                let sources = extract_sources(&response);
                info!(report = %kind, sources = sources.len(), "Report fetched");
                SearchResult::new(response.text(), sources)
            }
            Err(e) => {
                error!(report = %kind, "Report fetch failed: {}", e);
                SearchResult::fallback(kind)
            }
        }
    }

    async fn try_economic_data(&self) -> Result<SearchResult> {
        let today = Local::now().date_naive();
        let request =
            GenerateRequest::new(&self.models.search, prompts::economic_snapshot(today)).grounded();

        let response = self.gateway.generate_content(request).await?;
        let sources = extract_sources(&response);
        let text = response.text();

        let stats = extract_stats(self.gateway.as_ref(), &self.models.extraction, &text).await?;

        Ok(SearchResult {
            text,
            sources,
            stats: Some(stats),
        })
    }

    /// Economic snapshot with structured stats. Any failure, including a
    /// malformed extraction, yields the snapshot fallback with no stats.
    pub async fn get_latest_economic_data(&self) -> SearchResult {
        match self.try_economic_data().await {
            Ok(result) => {
                info!(
                    report = %ReportKind::EconomicSnapshot,
                    sources = result.sources.len(),
                    "Report fetched"
                );
                result
            }
            Err(e) => {
                error!(report = %ReportKind::EconomicSnapshot, "Eco data error: {}", e);
                SearchResult::fallback(ReportKind::EconomicSnapshot)
            }
        }
    }

    pub async fn get_auction_notices(&self) -> SearchResult {
        let request =
            GenerateRequest::new(&self.models.search, prompts::auction_notices()).grounded();
        self.grounded_report(ReportKind::AuctionNotices, request).await
    }

    pub async fn get_latest_yields(&self) -> SearchResult {
        let request =
            GenerateRequest::new(&self.models.search, prompts::latest_yields()).grounded();
        self.grounded_report(ReportKind::Yields, request).await
    }

    pub async fn get_latest_news(&self) -> SearchResult {
        let request = GenerateRequest::new(&self.models.search, prompts::latest_news()).grounded();
        self.grounded_report(ReportKind::News, request).await
    }

    pub async fn get_weekly_report(&self) -> SearchResult {
        let request = GenerateRequest::new(&self.models.reasoning, prompts::weekly_report())
            .grounded()
            .thinking_budget(self.models.thinking_budget);
        self.grounded_report(ReportKind::WeeklyReport, request).await
    }

    async fn try_yield_trend(&self) -> Result<Vec<YieldDataPoint>> {
        let request = GenerateRequest::new(&self.models.search, prompts::yield_trend()).grounded();
        let response = self.gateway.generate_content(request).await?;
        extract_trend(self.gateway.as_ref(), &self.models.extraction, &response.text()).await
    }

    /// Weekly yield series. Empty means "no data", never an error.
    pub async fn get_yield_trend_data(&self) -> Vec<YieldDataPoint> {
        match self.try_yield_trend().await {
            Ok(points) => {
                info!(report = %ReportKind::YieldTrend, points = points.len(), "Report fetched");
                points
            }
            Err(e) => {
                warn!(report = %ReportKind::YieldTrend, "Yield trend error: {}", e);
                Vec::new()
            }
        }
    }

    /// Free-form analyst query answered with search and extended reasoning
    pub async fn analyze_investment(&self, query: &str) -> String {
        let request =
            GenerateRequest::new(&self.models.reasoning, prompts::investment_query(query))
                .grounded()
                .thinking_budget(self.models.thinking_budget);

        match self.gateway.generate_content(request).await {
            Ok(response) => response.text(),
            Err(e) => {
                error!(report = %ReportKind::InvestmentQuery, "Analysis error: {}", e);
                ReportKind::InvestmentQuery.fallback_text().to_string()
            }
        }
    }

    /// Image generation surfaces its failures; the caller decides whether a
    /// failure warrants key selection.
    pub async fn generate_market_image(
        &self,
        description: &str,
        size: ImageSize,
    ) -> Result<GeneratedImage> {
        let request = GenerateRequest::new(&self.models.image, prompts::market_image(description))
            .image(prompts::IMAGE_ASPECT_RATIO, size.as_str());

        let response = self.gateway.generate_content(request).await?;
        let inline = response
            .inline_data()
            .ok_or(DashboardError::NoImageGenerated)?;

        Ok(GeneratedImage::new(inline.mime_type.clone(), inline.data.clone(), size))
    }
}
