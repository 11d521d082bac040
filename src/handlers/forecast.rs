// src/handlers/forecast.rs
use std::sync::Arc;
use warp::reply::Json;
use warp::Rejection;

use super::error::ApiError;
use crate::services::forecast::top_funds;
use crate::state::AppState;

pub async fn calculate_forecasts(state: Arc<AppState>) -> Result<Json, Rejection> {
    let forecasts = state
        .calculate_forecasts()
        .await
        .map_err(|e| warp::reject::custom(ApiError::from(e)))?;
    let regime = state.regime.read().await.current();
    Ok(warp::reply::json(&serde_json::json!({
        "regime": regime,
        "regime_label": regime.label(),
        "forecasts": forecasts,
    })))
}

pub async fn get_top_funds(n: usize, state: Arc<AppState>) -> Result<Json, Rejection> {
    let forecasts = state.forecasts.read().await;
    Ok(warp::reply::json(&top_funds(&forecasts, n)))
}

pub async fn get_forecast(code: String, state: Arc<AppState>) -> Result<Json, Rejection> {
    let forecasts = state.forecasts.read().await;
    match forecasts.get(code.trim()) {
        Some(forecast) => Ok(warp::reply::json(forecast)),
        None => Err(warp::reject::custom(ApiError::not_found(format!("No forecast for {}", code)))),
    }
}
