// src/handlers/regime.rs
use std::sync::Arc;
use warp::reply::Json;
use warp::Rejection;

use crate::state::AppState;

pub async fn get_regime(state: Arc<AppState>) -> Result<Json, Rejection> {
    let detection = state.detect_regime().await;
    let regime = detection.regime;
    Ok(warp::reply::json(&serde_json::json!({
        "regime": regime,
        "label": regime.label(),
        "description": regime.description(),
        "explanation": regime.explanation(),
        "detail": detection.detail,
    })))
}
