// src/handlers/portfolio.rs
use std::sync::Arc;
use warp::reply::Json;
use warp::Rejection;

use super::error::ApiError;
use crate::services::portfolio::{FundSet, Portfolio};
use crate::state::AppState;

pub async fn get_portfolio(state: Arc<AppState>) -> Result<Json, Rejection> {
    let portfolio = state.portfolio.read().await;
    Ok(warp::reply::json(&*portfolio))
}

pub async fn set_portfolio(portfolio: Portfolio, state: Arc<AppState>) -> Result<Json, Rejection> {
    let portfolio = state
        .set_portfolio(portfolio)
        .await
        .map_err(|e| warp::reject::custom(ApiError::from(e)))?;
    Ok(warp::reply::json(&portfolio))
}

pub async fn equalize_portfolio(set: FundSet, state: Arc<AppState>) -> Result<Json, Rejection> {
    let portfolio = state
        .equalize_portfolio(set)
        .await
        .map_err(|e| warp::reject::custom(ApiError::from(e)))?;
    Ok(warp::reply::json(&portfolio))
}

pub async fn get_portfolio_summary(set: FundSet, state: Arc<AppState>) -> Result<Json, Rejection> {
    Ok(warp::reply::json(&state.portfolio_summary(set).await))
}
