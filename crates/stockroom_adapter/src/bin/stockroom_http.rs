#![forbid(unsafe_code)]

use stockroom_adapter::config::ServerConfig;
use stockroom_adapter::http::router;
use stockroom_adapter::telemetry::init_tracing;
use stockroom_adapter::InventoryRuntime;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env()?;
    init_tracing("info", config.log_json, std::io::stdout);

    let runtime = InventoryRuntime::from_config(&config)?;
    let app = router(runtime.clone(), config.roles);

    info!(
        addr = %config.bind,
        products = config.roles.products,
        suppliers = config.roles.suppliers,
        inventory = config.roles.inventory,
        purchasing = config.roles.purchasing,
        journal = ?runtime.journal_path(),
        tax_rate = %config.tax_rate,
        "stockroom_http listening"
    );
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("stockroom_http stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
