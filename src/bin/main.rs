use lanka_debt_monitor::{
    config::DashboardConfig,
    dashboard::Dashboard,
    gateway::{MockGateway, ModelGateway},
    gemini::GeminiClient,
    keys::{ApiKey, EnvKeySelector},
    reports::ReportService,
    view::{render_report, render_trend, trend_placeholder},
    ReportKind,
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

    dotenv::dotenv().ok();
    let config = DashboardConfig::from_env()?;
    let api_key = ApiKey::new(config.api_key.clone());

    let gateway: Arc<dyn ModelGateway> = if api_key.is_configured() {
        Arc::new(GeminiClient::new(api_key.clone(), config.base_url.clone())?)
    } else {
        warn!("GEMINI_API_KEY not set, using offline market data");
        Arc::new(MockGateway::offline())
    };

    let dashboard = Dashboard::new(
        ReportService::new(gateway, config.models.clone()),
        Arc::new(EnvKeySelector::new(api_key)),
    );

    info!("LankaDebt Monitor syncing");
    let snapshot = dashboard.sync().await;

    println!("\n=== MARKET SNAPSHOT ===");
    for card in &snapshot.cards {
        match card.trend_label {
            Some(label) => println!("{:<18} {:>10}  {}", card.title, card.value, label),
            None => println!("{:<18} {:>10}", card.title, card.value),
        }
    }

    let reports = [
        (ReportKind::EconomicSnapshot, &snapshot.economic),
        (ReportKind::AuctionNotices, &snapshot.auctions),
        (ReportKind::Yields, &snapshot.yields),
        (ReportKind::News, &snapshot.news),
    ];
    for (kind, view) in reports {
        if let Some(result) = &view.value {
            println!("\n{}", render_report(&kind.to_string(), result));
        }
    }

    println!("\n=== {} ===", ReportKind::YieldTrend);
    match trend_placeholder(&snapshot.trend) {
        Some(placeholder) => println!("{}", placeholder),
        None => print!("{}", render_trend(snapshot.trend.value.as_deref().unwrap_or_default())),
    }

    if let Some(at) = snapshot.last_synced {
        println!("\nLast synced: {}", at.format("%H:%M:%S"));
    }

    Ok(())
}
