//! Prompt builders per report kind
//!
//! Pure functions: no state, no error conditions.

use chrono::NaiveDate;

/// Lookback window of the yield trend series, in weeks
pub const TREND_LOOKBACK_WEEKS: u32 = 5;

/// Treasury bill tenors tracked by the yield views
pub const TENORS: [&str; 3] = ["91-day", "182-day", "364-day"];

/// Fixed aspect ratio of generated market visuals
pub const IMAGE_ASPECT_RATIO: &str = "16:9";

pub const CHAT_SYSTEM_INSTRUCTION: &str = "You are the LankaDebt AI Specialist. Provide expert analysis on Sri Lankan debt markets. Always mention your sources when possible.";

pub const CHAT_GREETING: &str = "Hello! I am your LankaDebt AI Assistant. How can I help you with government securities or economic indicators today?";

/// Latest CBSL indicators; `today` anchors "latest" for the search
pub fn economic_snapshot(today: NaiveDate) -> String {
    format!(
        r#"Today is {}. Search for the LATEST key economic indicators for Sri Lanka from the Central Bank of Sri Lanka (CBSL).
  Extract exactly:
  1. Current Exchange Rate (LKR vs USD Selling Rate).
  2. Current CCPI Inflation (Year-on-Year percentage).
  3. Standing Deposit Facility Rate (SDFR).
  4. Standing Lending Facility Rate (SLFR).
  5. Determine if inflation is trending up, down, or neutral."#,
        today.format("%d/%m/%Y")
    )
}

pub fn auction_notices() -> String {
    "Find the LATEST Treasury Bill and Treasury Bond auction notices from the Central Bank of Sri Lanka. Include dates, types and amounts.".to_string()
}

pub fn latest_yields() -> String {
    format!(
        "Find the most recent Treasury Bill auction results for Sri Lanka, specifically the weighted average yields for {}, {}, and {} bills.",
        TENORS[0], TENORS[1], TENORS[2]
    )
}

pub fn yield_trend() -> String {
    format!(
        "Find Sri Lankan Treasury Bill secondary market yields ({}, {}, {}) for the last {} weeks.",
        TENORS[0], TENORS[1], TENORS[2], TREND_LOOKBACK_WEEKS
    )
}

pub fn latest_news() -> String {
    "Latest 5 economic news headlines for Sri Lanka from the last 7 days.".to_string()
}

pub fn weekly_report() -> String {
    "Act as a fixed income analyst and write a comprehensive weekly report on the Sri Lankan debt market. Focus on Treasury Bill and Bond performance, interest rate movements, and macroeconomic outlook.".to_string()
}

/// Free-form queries go to the model unchanged
pub fn investment_query(query: &str) -> String {
    query.trim().to_string()
}

pub fn market_image(description: &str) -> String {
    format!(
        "A high-quality, professional financial visualization: {}. Cinematic lighting, detailed infographics, 8k resolution style.",
        description.trim()
    )
}

//
// ================= Extraction =================
//

pub fn stats_extraction(report: &str) -> String {
    format!(
        "Extract numerical values from this report into JSON: \"{}\". Fields: usdRate, inflation, sdfr, slfr, inflationTrend (up/down/neutral).",
        report
    )
}

pub fn trend_extraction(report: &str) -> String {
    format!(
        "Extract weekly yield data from: \"{}\" into a JSON array of objects with date (DD MMM), 91-Day, 182-Day, 364-Day (numbers).",
        report
    )
}
