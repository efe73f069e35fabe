use std::sync::Arc;

use miette::{IntoDiagnostic, Result};
use promptdeck_repo::DirBlobStore;
use promptdeck_server::{AppState, router};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_env_filter(EnvFilter::from_env("PROMPTDECK_LOG"))
        .init();

    let data_dir =
        std::env::var("PROMPTDECK_DATA").unwrap_or_else(|_| "./promptdeck-data".to_owned());
    let addr = std::env::var("PROMPTDECK_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_owned());

    let store = Arc::new(DirBlobStore::open(&data_dir).await?);
    let state = Arc::new(AppState::new(store));

    let app = router(state).layer(tower_http::trace::TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&addr).await.into_diagnostic()?;
    tracing::info!(%addr, %data_dir, "promptdeck listening");
    axum::serve(listener, app).await.into_diagnostic()?;
    Ok(())
}
