//! Error types for the debt market monitor

use thiserror::Error;

/// Result type alias for monitor operations
pub type Result<T> = std::result::Result<T, DashboardError>;

/// Message the hosted API returns when the selected key cannot reach a model.
pub const ENTITY_NOT_FOUND: &str = "Requested entity was not found";

#[derive(Error, Debug)]
pub enum DashboardError {

    // =============================
    // Gateway Errors
    // =============================

    #[error("Gemini API key not configured")]
    MissingApiKey,

    #[error("Gateway error: {0}")]
    GatewayError(String),

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("No image generated")]
    NoImageGenerated,

    // =============================
    // Normalization Errors
    // =============================

    #[error("Extraction error: {0}")]
    ExtractionError(String),

    // =============================
    // Orchestration Errors
    // =============================

    #[error("Chat session busy: {0}")]
    ChatBusy(String),

    #[error("Chat session not found: {0}")]
    ChatNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl DashboardError {
    /// True when the failure means the configured key has no access to the
    /// requested model and the user should pick another key.
    pub fn is_entity_not_found(&self) -> bool {
        self.to_string().contains(ENTITY_NOT_FOUND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_not_found_detection() {
        let err = DashboardError::GatewayError(format!(
            "404 Not Found: {{\"error\":{{\"message\":\"{}.\"}}}}",
            ENTITY_NOT_FOUND
        ));
        assert!(err.is_entity_not_found());

        let other = DashboardError::GatewayError("quota exceeded".to_string());
        assert!(!other.is_entity_not_found());
        assert!(!DashboardError::NoImageGenerated.is_entity_not_found());
    }
}
