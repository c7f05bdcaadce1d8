use crate::commands::chat::{self, RelayState};
use crate::llm::assistant::Assistant;
use crate::llm::AssistantApi;
use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Uploads beyond this size are refused before reaching the handler.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

pub fn router<A: AssistantApi + 'static>(assistant: Option<Assistant<A>>) -> Router {
    let state = Arc::new(RelayState { assistant });
    Router::new()
        .route("/health", get(health))
        .route("/api/assist", post(chat::assist::<A>))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

/// Serve until ctrl-c.
pub async fn serve(listener: TcpListener, app: Router) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Listening for http on {addr}");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => warn!("ctrl-c: Stop requested"),
                Err(err) => {
                    warn!("Could not listen for ctrl-c: {err}");
                    std::future::pending::<()>().await;
                }
            }
        })
        .await
}
