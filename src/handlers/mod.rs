mod consensus;
mod read;
mod service_info;
mod tracks;

pub use consensus::post_consensus;
pub use read::get_read;
pub use service_info::service_info;
pub use tracks::post_track;

use crate::engine::TrackEngine;
use axum::{
    Router,
    routing::{get, post},
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: TrackEngine,
}

/// Router with every endpoint, without middleware layers.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/reads/:id/track", post(post_track))
        .route("/reads/:id/consensus", post(post_consensus))
        .route("/reads/:id/read", get(get_read))
        .route("/", get(service_info))
        .route("/service-info", get(service_info))
        .with_state(state)
}
