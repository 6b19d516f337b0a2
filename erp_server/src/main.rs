//! Serves health, readiness and version routes over the configured ERP database.
//!
//! Run from repo root: `cargo run -p erp_server`

use scck_erp_store::{common_routes, AppState, Database, StoreConfig};
use tokio::net::TcpListener;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("scck_erp_store=info,erp_server=info")),
        )
        .init();

    let config = StoreConfig::from_env();
    let db = Database::initialize(&config).await?;
    let state = AppState::new(db);

    let app = common_routes(state.clone());
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.into());
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr = %listener.local_addr()?, backend = %state.db.backend_kind(), "erp server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;
    state.db.close().await;
    Ok(())
}
