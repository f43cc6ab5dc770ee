//! Core data models for the debt market monitor

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum characters of a source title shown before truncation
pub const SOURCE_TITLE_DISPLAY_LIMIT: usize = 30;

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InflationTrend {
    Up,
    Down,
    Neutral,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    EconomicSnapshot,
    AuctionNotices,
    Yields,
    YieldTrend,
    News,
    WeeklyReport,
    InvestmentQuery,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ImageSize {
    #[default]
    #[serde(rename = "1K")]
    OneK,
    #[serde(rename = "2K")]
    TwoK,
    #[serde(rename = "4K")]
    FourK,
}

impl ImageSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSize::OneK => "1K",
            ImageSize::TwoK => "2K",
            ImageSize::FourK => "4K",
        }
    }
}

impl ReportKind {
    /// Placeholder text returned in place of a failed fetch
    pub fn fallback_text(&self) -> &'static str {
        match self {
            ReportKind::EconomicSnapshot => "Error fetching snapshot.",
            ReportKind::AuctionNotices => "Auction notices unavailable.",
            ReportKind::Yields => "Yield data unavailable.",
            ReportKind::YieldTrend => "No trend data available.",
            ReportKind::News => "News unavailable.",
            ReportKind::WeeklyReport => "Report generation failed.",
            ReportKind::InvestmentQuery => "Analysis failed.",
        }
    }
}

//
// ================= Search Results =================
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub title: String,
    pub uri: String,
}

impl GroundingSource {
    /// Title as shown in a source chip; the stored title is never altered.
    pub fn display_title(&self) -> String {
        if self.title.chars().count() > SOURCE_TITLE_DISPLAY_LIMIT {
            let head: String = self.title.chars().take(SOURCE_TITLE_DISPLAY_LIMIT).collect();
            format!("{}...", head)
        } else {
            self.title.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EconomicStats {
    pub usd_rate: String,
    pub inflation: String,
    pub sdfr: String,
    pub slfr: String,
    pub inflation_trend: InflationTrend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub text: String,
    pub sources: Vec<GroundingSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<EconomicStats>,
}

impl SearchResult {
    pub fn new(text: String, sources: Vec<GroundingSource>) -> Self {
        Self {
            text,
            sources,
            stats: None,
        }
    }

    /// Error-flavored result for a report kind
    pub fn fallback(kind: ReportKind) -> Self {
        Self {
            text: kind.fallback_text().to_string(),
            sources: Vec::new(),
            stats: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldDataPoint {
    pub date: String,
    #[serde(rename = "91-Day")]
    pub day_91: f64,
    #[serde(rename = "182-Day")]
    pub day_182: f64,
    #[serde(rename = "364-Day")]
    pub day_364: f64,
}

//
// ================= Chat =================
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}

impl fmt::Display for InflationTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InflationTrend::Up => "up",
            InflationTrend::Down => "down",
            InflationTrend::Neutral => "neutral",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReportKind::EconomicSnapshot => "Economic Snapshot",
            ReportKind::AuctionNotices => "Auction Notices",
            ReportKind::Yields => "Treasury Yields",
            ReportKind::YieldTrend => "Yield Trend",
            ReportKind::News => "Market News",
            ReportKind::WeeklyReport => "Weekly Report",
            ReportKind::InvestmentQuery => "Investment Analysis",
        };
        write!(f, "{}", s)
    }
}
