//! Presentation rules
//!
//! Stat cards, trend labels and placeholders shared by the HTTP surface and
//! the terminal monitor.

use crate::dashboard::ReportView;
use crate::models::{InflationTrend, ReportKind, SearchResult, YieldDataPoint};
use serde::Serialize;
use std::fmt::Write;

pub const LOADING_VALUE: &str = "...";
pub const MISSING_VALUE: &str = "N/A";
pub const TREND_LOADING: &str = "Fetching market trends...";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatCard {
    pub title: &'static str,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<InflationTrend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend_label: Option<&'static str>,
    pub loading: bool,
}

pub fn trend_label(trend: InflationTrend) -> &'static str {
    match trend {
        InflationTrend::Up => "↑ Rising",
        InflationTrend::Down => "↓ Falling",
        InflationTrend::Neutral => "• Stable",
    }
}

/// The four headline cards. Values read "..." while the snapshot loads and
/// "N/A" when it carries no stats.
pub fn stat_cards(economic: &ReportView<SearchResult>) -> Vec<StatCard> {
    let loading = economic.is_loading();
    let stats = economic.value.as_ref().and_then(|r| r.stats.as_ref());

    let value = |field: Option<&String>| {
        if loading {
            LOADING_VALUE.to_string()
        } else {
            field.cloned().unwrap_or_else(|| MISSING_VALUE.to_string())
        }
    };
    let card = |title, field| StatCard {
        title,
        value: value(field),
        trend: None,
        trend_label: None,
        loading,
    };

    let trend = if loading {
        None
    } else {
        stats.map(|s| s.inflation_trend)
    };

    vec![
        card("LKR/USD (Spot)", stats.map(|s| &s.usd_rate)),
        StatCard {
            trend,
            trend_label: trend.map(trend_label),
            ..card("Inflation (CCPI)", stats.map(|s| &s.inflation))
        },
        card("SDFR Rate", stats.map(|s| &s.sdfr)),
        card("SLFR Rate", stats.map(|s| &s.slfr)),
    ]
}

/// Text shown instead of the trend chart, if any
pub fn trend_placeholder(trend: &ReportView<Vec<YieldDataPoint>>) -> Option<&'static str> {
    if trend.is_loading() {
        return Some(TREND_LOADING);
    }
    match &trend.value {
        Some(points) if !points.is_empty() => None,
        _ => Some(ReportKind::YieldTrend.fallback_text()),
    }
}

/// Plain-text rendering of a report with its source chips
pub fn render_report(title: &str, result: &SearchResult) -> String {
    let mut out = format!("== {} ==\n{}\n", title, result.text.trim());
    if !result.sources.is_empty() {
        out.push_str("Sources:\n");
        for source in &result.sources {
            let _ = writeln!(out, "  - {} <{}>", source.display_title(), source.uri);
        }
    }
    out
}

pub fn render_trend(points: &[YieldDataPoint]) -> String {
    let mut out = format!("{:<10}{:>10}{:>10}{:>10}\n", "Date", "91-Day", "182-Day", "364-Day");
    for p in points {
        let _ = writeln!(
            out,
            "{:<10}{:>10.2}{:>10.2}{:>10.2}",
            p.date, p.day_91, p.day_182, p.day_364
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::LoadState;
    use crate::models::{EconomicStats, GroundingSource};

    fn snapshot(state: LoadState, stats: Option<EconomicStats>) -> ReportView<SearchResult> {
        ReportView {
            state,
            value: Some(SearchResult {
                text: "snapshot".to_string(),
                sources: Vec::new(),
                stats,
            }),
        }
    }

    fn stats() -> EconomicStats {
        EconomicStats {
            usd_rate: "299.85".to_string(),
            inflation: "1.5%".to_string(),
            sdfr: "7.25%".to_string(),
            slfr: "8.25%".to_string(),
            inflation_trend: InflationTrend::Down,
        }
    }

    #[test]
    fn test_cards_show_stats_when_ready() {
        let cards = stat_cards(&snapshot(LoadState::Ready, Some(stats())));
        let titles: Vec<&str> = cards.iter().map(|c| c.title).collect();
        assert_eq!(
            titles,
            vec!["LKR/USD (Spot)", "Inflation (CCPI)", "SDFR Rate", "SLFR Rate"]
        );
        assert_eq!(cards[0].value, "299.85");
        assert_eq!(cards[1].trend, Some(InflationTrend::Down));
        assert_eq!(cards[1].trend_label, Some("↓ Falling"));
        assert!(cards[3].trend.is_none());
    }

    #[test]
    fn test_cards_without_stats_read_na() {
        let cards = stat_cards(&snapshot(LoadState::Ready, None));
        assert!(cards.iter().all(|c| c.value == "N/A" && !c.loading));
        assert!(cards[1].trend_label.is_none());

        let idle = ReportView {
            state: LoadState::Idle,
            value: None,
        };
        assert!(stat_cards(&idle).iter().all(|c| c.value == "N/A"));
    }

    #[test]
    fn test_cards_while_loading() {
        let cards = stat_cards(&snapshot(LoadState::Loading, Some(stats())));
        assert!(cards.iter().all(|c| c.value == "..." && c.loading));
        assert!(cards[1].trend.is_none());
    }

    #[test]
    fn test_trend_labels() {
        assert_eq!(trend_label(InflationTrend::Up), "↑ Rising");
        assert_eq!(trend_label(InflationTrend::Neutral), "• Stable");
    }

    #[test]
    fn test_trend_placeholder() {
        let empty = ReportView {
            state: LoadState::Ready,
            value: Some(Vec::new()),
        };
        assert_eq!(trend_placeholder(&empty), Some("No trend data available."));

        let loading = ReportView {
            state: LoadState::Loading,
            value: None,
        };
        assert_eq!(trend_placeholder(&loading), Some(TREND_LOADING));

        let ready = ReportView {
            state: LoadState::Ready,
            value: Some(vec![YieldDataPoint {
                date: "03 Oct".to_string(),
                day_91: 7.5,
                day_182: 7.8,
                day_364: 8.0,
            }]),
        };
        assert_eq!(trend_placeholder(&ready), None);
        assert!(render_trend(ready.value.as_ref().unwrap()).contains("03 Oct"));
    }

    #[test]
    fn test_render_report_truncates_source_titles() {
        let result = SearchResult::new(
            "Yields eased.".to_string(),
            vec![GroundingSource {
                title: "Central Bank of Sri Lanka Weekly Economic Indicators".to_string(),
                uri: "https://www.cbsl.gov.lk/wei".to_string(),
            }],
        );
        let text = render_report("Latest Yields", &result);
        assert!(text.starts_with("== Latest Yields ==\nYields eased.\n"));
        assert!(text.contains("Central Bank of Sri Lanka Week... <https://www.cbsl.gov.lk/wei>"));
    }
}
