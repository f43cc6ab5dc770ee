//! Dashboard orchestrator
//!
//! Holds one slot per report kind and drives them through
//! `idle → loading → ready`. Failures still land in `ready`, carrying the
//! kind's fallback result.
//!
//! SYNC:
//! snapshot | auctions | yields | news | trend  (concurrent, each slot flips on its own)
//! → stamp last_synced
//!
//! Overlapping syncs are not de-duplicated. Each slot hands out increasing
//! tickets and ignores a completion older than the one already applied, so
//! the most recently started run ends up in every slot.

use crate::image::GeneratedImage;
use crate::keys::KeySelector;
use crate::models::{ImageSize, SearchResult, YieldDataPoint};
use crate::reports::ReportService;
use crate::view::{stat_cards, StatCard};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    Idle,
    Loading,
    Ready,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImagePhase {
    Idle,
    Generating,
    Done,
}

/// Read-only view of one report slot
#[derive(Debug, Clone, Serialize)]
pub struct ReportView<T> {
    pub state: LoadState,
    pub value: Option<T>,
}

impl<T> ReportView<T> {
    pub fn is_loading(&self) -> bool {
        self.state == LoadState::Loading
    }
}

#[derive(Debug)]
struct Slot<T> {
    requested: u64,
    applied: u64,
    value: Option<T>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            requested: 0,
            applied: 0,
            value: None,
        }
    }
}

impl<T: Clone> Slot<T> {
    /// Mark a fetch as started and return its ticket
    fn begin(&mut self) -> u64 {
        self.requested += 1;
        self.requested
    }

    /// Store a result unless a newer one is already in place
    fn complete(&mut self, ticket: u64, value: T) -> bool {
        if ticket < self.applied {
            return false;
        }
        self.applied = ticket;
        self.value = Some(value);
        true
    }

    fn state(&self) -> LoadState {
        if self.requested == 0 {
            LoadState::Idle
        } else if self.applied < self.requested {
            LoadState::Loading
        } else {
            LoadState::Ready
        }
    }

    fn view(&self) -> ReportView<T> {
        ReportView {
            state: self.state(),
            value: self.value.clone(),
        }
    }
}

/// Overlapping requests may run; the phase stays `generating` until the last
/// one settles and the most recently started success is kept.
#[derive(Debug, Default)]
struct ImageSlot {
    images: Slot<GeneratedImage>,
    in_flight: u32,
    has_key: bool,
}

impl ImageSlot {
    fn phase(&self) -> ImagePhase {
        if self.in_flight > 0 {
            ImagePhase::Generating
        } else if self.images.value.is_some() {
            ImagePhase::Done
        } else {
            ImagePhase::Idle
        }
    }
}

#[derive(Debug)]
struct DashboardState {
    economic: Slot<SearchResult>,
    auctions: Slot<SearchResult>,
    yields: Slot<SearchResult>,
    news: Slot<SearchResult>,
    trend: Slot<Vec<YieldDataPoint>>,
    weekly: Slot<SearchResult>,
    analysis: Slot<String>,
    last_synced: Option<DateTime<Local>>,
    image: ImageSlot,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self {
            economic: Slot::default(),
            auctions: Slot::default(),
            yields: Slot::default(),
            news: Slot::default(),
            trend: Slot::default(),
            weekly: Slot::default(),
            analysis: Slot::default(),
            last_synced: None,
            image: ImageSlot::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageView {
    pub phase: ImagePhase,
    pub has_key: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<ImageSize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_uri: Option<String>,
}

/// Everything a client needs to render the dashboard
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub economic: ReportView<SearchResult>,
    pub auctions: ReportView<SearchResult>,
    pub yields: ReportView<SearchResult>,
    pub news: ReportView<SearchResult>,
    pub trend: ReportView<Vec<YieldDataPoint>>,
    pub weekly: ReportView<SearchResult>,
    pub analysis: ReportView<String>,
    pub cards: Vec<StatCard>,
    pub last_synced: Option<DateTime<Local>>,
    pub image: ImageView,
}

struct SyncTickets {
    economic: u64,
    auctions: u64,
    yields: u64,
    news: u64,
    trend: u64,
}

pub struct Dashboard {
    reports: ReportService,
    key_selector: Arc<dyn KeySelector>,
    state: RwLock<DashboardState>,
}

impl Dashboard {
    pub fn new(reports: ReportService, key_selector: Arc<dyn KeySelector>) -> Self {
        Self {
            reports,
            key_selector,
            state: RwLock::new(DashboardState::default()),
        }
    }

    async fn fill<T, F>(
        &self,
        name: &'static str,
        ticket: u64,
        fetch: F,
        slot: fn(&mut DashboardState) -> &mut Slot<T>,
    ) where
        T: Clone,
        F: Future<Output = T>,
    {
        let value = fetch.await;
        let mut state = self.state.write().await;
        if slot(&mut state).complete(ticket, value) {
            debug!(slot = name, ticket, "Slot ready");
        } else {
            debug!(slot = name, ticket, "Discarding superseded result");
        }
    }

    /// Re-run every batch report concurrently
    pub async fn sync(&self) -> DashboardSnapshot {
        let tickets = {
            let mut state = self.state.write().await;
            SyncTickets {
                economic: state.economic.begin(),
                auctions: state.auctions.begin(),
                yields: state.yields.begin(),
                news: state.news.begin(),
                trend: state.trend.begin(),
            }
        };

        info!(run = tickets.economic, "Sync started");

        tokio::join!(
            self.fill(
                "economic",
                tickets.economic,
                self.reports.get_latest_economic_data(),
                |s| &mut s.economic,
            ),
            self.fill(
                "auctions",
                tickets.auctions,
                self.reports.get_auction_notices(),
                |s| &mut s.auctions,
            ),
            self.fill(
                "yields",
                tickets.yields,
                self.reports.get_latest_yields(),
                |s| &mut s.yields,
            ),
            self.fill(
                "news",
                tickets.news,
                self.reports.get_latest_news(),
                |s| &mut s.news,
            ),
            self.fill(
                "trend",
                tickets.trend,
                self.reports.get_yield_trend_data(),
                |s| &mut s.trend,
            ),
        );

        let synced_at = Local::now();
        self.state.write().await.last_synced = Some(synced_at);
        info!(run = tickets.economic, at = %synced_at.format("%H:%M:%S"), "Sync finished");

        self.snapshot().await
    }

    pub async fn generate_weekly_report(&self) -> SearchResult {
        let ticket = self.state.write().await.weekly.begin();
        let result = self.reports.get_weekly_report().await;
        self.state
            .write()
            .await
            .weekly
            .complete(ticket, result.clone());
        result
    }

    /// Answer a free-form query; blank queries are ignored
    pub async fn analyze(&self, query: &str) -> Option<String> {
        if query.trim().is_empty() {
            return None;
        }

        let ticket = self.state.write().await.analysis.begin();
        let answer = self.reports.analyze_investment(query).await;
        self.state
            .write()
            .await
            .analysis
            .complete(ticket, answer.clone());
        Some(answer)
    }

    /// Refresh the cached key status from the host
    pub async fn check_key(&self) -> bool {
        let has_key = self.key_selector.has_selected_key().await;
        self.state.write().await.image.has_key = has_key;
        has_key
    }

    /// Prompt for a key, then re-check rather than assuming the user picked one
    pub async fn select_key(&self) -> bool {
        self.key_selector.open_select_key().await;
        let has_key = self.check_key().await;
        if !has_key {
            warn!("Key selection finished without a usable key");
        }
        has_key
    }

    /// Generate a market visual. Blank prompts are ignored. A
    /// "Requested entity was not found" failure sends the user through key
    /// selection; other failures are logged and dropped.
    pub async fn generate_image(&self, prompt: &str, size: ImageSize) -> ImageView {
        if prompt.trim().is_empty() {
            return self.image_view().await;
        }

        let ticket = {
            let mut state = self.state.write().await;
            state.image.in_flight += 1;
            state.image.images.begin()
        };

        match self.reports.generate_market_image(prompt, size).await {
            Ok(image) => {
                info!(size = size.as_str(), ticket, "Market visual generated");
                let mut state = self.state.write().await;
                if !state.image.images.complete(ticket, image) {
                    debug!(ticket, "Discarding superseded visual");
                }
                state.image.in_flight -= 1;
            }
            Err(e) => {
                error!("Image generation failed: {}", e);
                if e.is_entity_not_found() {
                    self.select_key().await;
                }
                self.state.write().await.image.in_flight -= 1;
            }
        }

        self.image_view().await
    }

    pub async fn image(&self) -> Option<GeneratedImage> {
        self.state.read().await.image.images.value.clone()
    }

    async fn image_view(&self) -> ImageView {
        let state = self.state.read().await;
        image_view(&state.image)
    }

    pub async fn snapshot(&self) -> DashboardSnapshot {
        let state = self.state.read().await;
        let economic = state.economic.view();
        let cards = stat_cards(&economic);

        DashboardSnapshot {
            economic,
            auctions: state.auctions.view(),
            yields: state.yields.view(),
            news: state.news.view(),
            trend: state.trend.view(),
            weekly: state.weekly.view(),
            analysis: state.analysis.view(),
            cards,
            last_synced: state.last_synced,
            image: image_view(&state.image),
        }
    }
}

fn image_view(slot: &ImageSlot) -> ImageView {
    ImageView {
        phase: slot.phase(),
        has_key: slot.has_key,
        size: slot.images.value.as_ref().map(|i| i.size),
        data_uri: slot.images.value.as_ref().map(|i| i.data_uri()),
    }
}
