use axum::{
    extract::{MatchedPath, Request},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use hl_core::Result;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::time::Instant;
use tower_http::cors::CorsLayer;
use tracing::info;

pub mod handlers;
pub mod state;

pub use state::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/articles", get(handlers::list_articles))
        .route("/feedback", post(handlers::post_feedback))
        .route_layer(middleware::from_fn(track_requests))
        .layer(cors)
        .with_state(Arc::new(state))
}

/// Counts every routed request and its latency under the matched route.
async fn track_requests(request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let started = Instant::now();

    let response = next.run(request).await;
    hl_core::metrics::record_request(&endpoint, response.status().as_u16(), started.elapsed());
    response
}

/// Serve the API on `addr` until `shutdown` resolves.
pub async fn serve<S>(addr: SocketAddr, state: AppState, shutdown: S) -> Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("🌐 API listening on {}", listener.local_addr()?);
    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

pub mod prelude {
    pub use hl_core::{StoredArticle, Result, Error};
    pub use crate::AppState;
}
