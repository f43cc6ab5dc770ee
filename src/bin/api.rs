use lanka_debt_monitor::{
    api::start_server,
    chat::ChatRegistry,
    config::DashboardConfig,
    dashboard::Dashboard,
    gemini::GeminiClient,
    keys::{ApiKey, EnvKeySelector},
    reports::ReportService,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config = DashboardConfig::from_env()?;
    let api_key = ApiKey::new(config.api_key.clone());
    if !api_key.is_configured() {
        warn!("GEMINI_API_KEY not set in .env; requests fail until a key is selected");
    }

    info!("🚀 LankaDebt Monitor - API Server");
    info!("📍 Port: {}", config.port);

    // Create components
    let gateway = Arc::new(GeminiClient::new(api_key.clone(), config.base_url.clone())?);
    let chats = Arc::new(
        ChatRegistry::new(gateway.clone(), config.models.reasoning.clone())
            .with_limits(config.chat_max_sessions, config.chat_idle_ttl),
    );
    let dashboard = Arc::new(Dashboard::new(
        ReportService::new(gateway, config.models.clone()),
        Arc::new(EnvKeySelector::new(api_key)),
    ));

    dashboard.check_key().await;

    if config.auto_sync {
        let dashboard = Arc::clone(&dashboard);
        tokio::spawn(async move {
            dashboard.sync().await;
        });
    }

    info!("📡 Starting API server...");
    start_server(dashboard, chats, config.port).await?;

    Ok(())
}
