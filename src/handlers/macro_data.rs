// src/handlers/macro_data.rs
use log::info;
use std::sync::Arc;
use warp::reply::Json;
use warp::Rejection;

use crate::state::AppState;

pub async fn get_macro(state: Arc<AppState>) -> Result<Json, Rejection> {
    let snapshot = state.store.macro_data().await;
    Ok(warp::reply::json(&snapshot))
}

pub async fn refresh_macro(state: Arc<AppState>) -> Result<Json, Rejection> {
    let refresh = state.refresh_macro().await;
    info!(
        "Macro refresh requested: {} resolved, {} unresolved",
        refresh.snapshot.len(),
        refresh.errors.len()
    );
    Ok(warp::reply::json(&serde_json::json!({
        "snapshot": refresh.snapshot,
        "unresolved": refresh.unresolved_names(),
        "errors": refresh.errors,
    })))
}
