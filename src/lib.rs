//! Sri Lanka Debt Market Monitor
//!
//! A dashboard backend that:
//! - Pulls grounded market reports (CBSL indicators, auctions, yields, news)
//! - Re-extracts headline stats and weekly yield series as structured data
//! - Streams analyst chat replies with append-only transcripts
//! - Generates market visuals and serves them for download
//!
//! SYNC LOOP:
//! SEARCH → EXTRACT → NORMALIZE → SLOT (per report, concurrently)

pub mod api;
pub mod chat;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod gateway;
pub mod gemini;
pub mod image;
pub mod keys;
pub mod models;
pub mod normalizer;
pub mod prompts;
pub mod reports;
pub mod view;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use dashboard::{Dashboard, DashboardSnapshot, LoadState};
