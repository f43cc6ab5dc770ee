//! Runtime configuration loaded from the environment

use crate::chat::{DEFAULT_CHAT_IDLE_TTL, DEFAULT_MAX_CHAT_SESSIONS};
use crate::error::DashboardError;
use std::env;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_SEARCH_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_EXTRACTION_MODEL: &str = "gemini-flash-lite-latest";
pub const DEFAULT_REASONING_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-3-pro-image-preview";
pub const DEFAULT_THINKING_BUDGET: u32 = 32768;
pub const DEFAULT_PORT: u16 = 8080;

/// Model identifiers used per call type
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Grounded narrative calls (snapshot, auctions, yields, news, trend search)
    pub search: String,
    /// Schema-constrained extraction calls
    pub extraction: String,
    /// Weekly report, investment analysis and chat
    pub reasoning: String,
    pub image: String,
    pub thinking_budget: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            search: DEFAULT_SEARCH_MODEL.to_string(),
            extraction: DEFAULT_EXTRACTION_MODEL.to_string(),
            reasoning: DEFAULT_REASONING_MODEL.to_string(),
            image: DEFAULT_IMAGE_MODEL.to_string(),
            thinking_budget: DEFAULT_THINKING_BUDGET,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub api_key: String,
    pub base_url: String,
    pub models: ModelConfig,
    pub port: u16,
    /// Run one sync as soon as the service starts
    pub auto_sync: bool,
    pub chat_max_sessions: usize,
    pub chat_idle_ttl: Duration,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            models: ModelConfig::default(),
            port: DEFAULT_PORT,
            auto_sync: true,
            chat_max_sessions: DEFAULT_MAX_CHAT_SESSIONS,
            chat_idle_ttl: DEFAULT_CHAT_IDLE_TTL,
        }
    }
}

impl DashboardConfig {
    /// Build configuration from environment variables.
    /// Call `dotenv::dotenv()` beforehand to pick up a `.env` file.
    pub fn from_env() -> crate::Result<Self> {
        let defaults = Self::default();

        let port = match env::var("PORT").or_else(|_| env::var("API_PORT")) {
            Ok(raw) => raw.parse().map_err(|_| {
                DashboardError::ConfigError(format!("invalid port: {}", raw))
            })?,
            Err(_) => defaults.port,
        };

        let thinking_budget = match env::var("THINKING_BUDGET") {
            Ok(raw) => raw.parse().map_err(|_| {
                DashboardError::ConfigError(format!("invalid THINKING_BUDGET: {}", raw))
            })?,
            Err(_) => defaults.models.thinking_budget,
        };

        let chat_max_sessions = match env::var("CHAT_MAX_SESSIONS") {
            Ok(raw) => raw.parse().map_err(|_| {
                DashboardError::ConfigError(format!("invalid CHAT_MAX_SESSIONS: {}", raw))
            })?,
            Err(_) => defaults.chat_max_sessions,
        };

        let chat_idle_ttl = match env::var("CHAT_IDLE_TTL_SECS") {
            Ok(raw) => Duration::from_secs(raw.parse().map_err(|_| {
                DashboardError::ConfigError(format!("invalid CHAT_IDLE_TTL_SECS: {}", raw))
            })?),
            Err(_) => defaults.chat_idle_ttl,
        };

        let auto_sync = env::var("AUTO_SYNC")
            .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no" | "off"))
            .unwrap_or(defaults.auto_sync);

        Ok(Self {
            api_key: env::var("GEMINI_API_KEY")
                .or_else(|_| env::var("API_KEY"))
                .unwrap_or_default(),
            base_url: env_or("GEMINI_BASE_URL", &defaults.base_url)
                .trim_end_matches('/')
                .to_string(),
            models: ModelConfig {
                search: env_or("SEARCH_MODEL", &defaults.models.search),
                extraction: env_or("EXTRACTION_MODEL", &defaults.models.extraction),
                reasoning: env_or("REASONING_MODEL", &defaults.models.reasoning),
                image: env_or("IMAGE_MODEL", &defaults.models.image),
                thinking_budget,
            },
            port,
            auto_sync,
            chat_max_sessions,
            chat_idle_ttl,
        })
    }
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
