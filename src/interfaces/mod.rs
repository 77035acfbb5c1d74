pub mod api;
pub mod live_price;

use crate::application::orchestrator::{Orchestrator, OrchestratorRuntime};
use crate::config::Config;
use std::sync::Arc;

/// Shared handle every HTTP/WS route reaches the system through.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub runtime: Arc<OrchestratorRuntime>,
    pub config: Config,
}

pub fn router(state: AppState) -> axum::Router {
    axum::Router::new()
        .merge(api::routes())
        .merge(live_price::routes())
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
