pub mod conversations;
pub mod messages;
pub mod middleware;
pub mod notifications;
pub mod ws;

pub use middleware::*;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Compose the full application router: REST adapters, live channels, and
/// the shared middleware stack.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(conversations::routes())
        .merge(messages::routes())
        .merge(notifications::routes())
        .merge(ws::routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
