// src/handlers/cache.rs
use log::info;
use std::sync::Arc;
use warp::reply::Json;
use warp::Rejection;

use crate::state::AppState;

pub async fn clear_cache(state: Arc<AppState>) -> Result<Json, Rejection> {
    state.clear_cache().await;
    info!("Cache cleared on request");
    Ok(warp::reply::json(&serde_json::json!({ "cleared": true })))
}
