use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};

use crate::api::health::{SessionStats, StatsSnapshot};

#[derive(Clone)]
pub struct ApiState {
    pub stats: Arc<SessionStats>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .with_state(state)
}

async fn get_health(State(state): State<ApiState>) -> Json<StatsSnapshot> {
    Json(state.stats.snapshot())
}
