use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use charge_gateway::config::Settings;
use charge_gateway::gateway::{AuthorizerGateway, HttpAuthorizer};
use charge_gateway::observability::{init_logging, init_metrics, LogConfig, LogFormat};
use charge_gateway::repositories::{GatewayStore, InMemoryStore};
use charge_gateway::services::{ChargeService, PaymentService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; real deployments set the environment directly.
    dotenvy::dotenv().ok();

    let settings = Settings::new()?;
    init_logging(&LogConfig {
        level: settings.application.log_level.clone(),
        format: LogFormat::from(settings.application.log_format.as_str()),
        ..LogConfig::default()
    });
    init_metrics();
    info!("Configuration loaded");

    let authorizer = Arc::new(HttpAuthorizer::new(
        settings.authorizer.base_url.clone(),
        Duration::from_millis(settings.authorizer.timeout_ms),
    )?);

    info!(
        base_url = %settings.authorizer.base_url,
        "Probing authorizer..."
    );
    let approved = authorizer.is_approved().await;
    info!(approved, "Authorizer reachable");

    let store: Arc<dyn GatewayStore> = Arc::new(InMemoryStore::new());
    let _charges = ChargeService::new(store.clone(), authorizer.clone());
    let _payments = PaymentService::new(store, authorizer);

    info!("System startup verification complete: engines wired.");

    Ok(())
}
