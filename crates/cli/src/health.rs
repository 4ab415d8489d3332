//! Liveness endpoint.
//!
//! Deliberately knows nothing about the sync loop: it only answers that the
//! process is up, so a supervisor can restart a wedged container.

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

/// Build the liveness router.
pub fn build_router() -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

/// Serve the liveness endpoint until the process exits.
pub async fn start_server(bind_addr: &str) -> anyhow::Result<()> {
    let app = build_router();
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("liveness endpoint listening on {}", bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
