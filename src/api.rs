use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::consensus::{estimated_solve_time, forked_pools, seconds_since};
use crate::models::{
    ForkedResponse, HeightResponse, HeightsResponse, LastFoundResponse, PoolHeight,
};
use crate::state::SnapshotStore;

const HELP: &str = "Supported methods:\n\n\
/api/height - Get consensus height\n\
/api/heights - Get heights of all pools\n\
/api/lastfound - Get minutes since the consensus height last changed\n\
/api/forked - Get pools that are forked or whose API is unreachable\n";

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<SnapshotStore>,
    pub max_divergence: u64,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api", get(help))
        .route("/api/", get(help))
        .route("/api/height", get(height))
        .route("/api/height/", get(height))
        .route("/api/heights", get(heights))
        .route("/api/heights/", get(heights))
        .route("/api/lastfound", get(last_found))
        .route("/api/lastfound/", get(last_found))
        .route("/api/forked", get(forked))
        .route("/api/forked/", get(forked))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn help() -> &'static str {
    HELP
}

pub async fn height(State(state): State<ApiState>) -> Json<HeightResponse> {
    let snapshot = state.store.snapshot().await;
    Json(HeightResponse {
        height: snapshot.consensus_height,
    })
}

pub async fn heights(State(state): State<ApiState>) -> Json<HeightsResponse> {
    let snapshot = state.store.snapshot().await;
    let now = Utc::now();
    let pools = snapshot
        .pools
        .iter()
        .map(|r| PoolHeight {
            pool: r.name().to_string(),
            height: r.height,
            mode: snapshot.consensus_height,
            last_found: seconds_since(r.last_block_found_at, now),
            estimated_solve_time: estimated_solve_time(snapshot.consensus_difficulty, r.hashrate),
        })
        .collect();
    Json(HeightsResponse { pools })
}

pub async fn last_found(State(state): State<ApiState>) -> Json<LastFoundResponse> {
    let snapshot = state.store.snapshot().await;
    let elapsed = Utc::now() - snapshot.consensus_updated_at;
    Json(LastFoundResponse {
        mins_since_last_block: elapsed.num_minutes(),
    })
}

pub async fn forked(State(state): State<ApiState>) -> Json<ForkedResponse> {
    let snapshot = state.store.snapshot().await;
    Json(ForkedResponse {
        pools: forked_pools(&snapshot, state.max_divergence),
    })
}
