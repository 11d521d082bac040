// src/handlers/funds.rs
use log::{error, info};
use serde::Serialize;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::Json;
use warp::{Rejection, Reply};

use super::error::ApiError;
use crate::models::FundRecord;
use crate::services::performance::{import_csv, HorizonWeights};
use crate::state::AppState;

#[derive(Serialize)]
struct FundRow<'a> {
    #[serde(flatten)]
    record: &'a FundRecord,
    daily_return: Option<&'a str>,
}

pub async fn import_funds(body: Bytes, state: Arc<AppState>) -> Result<Json, Rejection> {
    let table = import_csv(body.as_ref()).map_err(|e| {
        error!("Fund import failed: {}", e);
        warp::reject::custom(ApiError::from(e))
    })?;
    let imported = table.len();
    state.import_funds(table).await;
    Ok(warp::reply::json(&serde_json::json!({ "imported": imported })))
}

pub async fn score_funds(weights: HorizonWeights, state: Arc<AppState>) -> Result<Json, Rejection> {
    let table = state
        .score_funds(&weights)
        .await
        .map_err(|e| warp::reject::custom(ApiError::from(e)))?;
    info!("Scored {} funds", table.len());
    Ok(warp::reply::json(&table.iter().collect::<Vec<_>>()))
}

pub async fn list_funds(state: Arc<AppState>) -> Result<Json, Rejection> {
    let daily = state.store.daily_returns().await;
    let funds = state.funds.read().await;
    let rows: Vec<FundRow> = funds
        .iter()
        .flat_map(|table| table.iter())
        .map(|record| FundRow {
            record,
            daily_return: daily.get(record.code.trim()).map(String::as_str),
        })
        .collect();
    Ok(warp::reply::json(&rows))
}

pub async fn get_allocation(code: String, state: Arc<AppState>) -> Result<Json, Rejection> {
    let code = code.trim().to_uppercase();
    match state.store.fetch_fund(&code).await {
        Ok(page) => Ok(warp::reply::json(&serde_json::json!({
            "code": code,
            "allocation": page.allocation,
            "daily_return": page.daily_return,
        }))),
        Err(e) => {
            error!("Failed to fetch fund {}: {}", code, e);
            Err(warp::reject::custom(ApiError::new(
                StatusCode::BAD_GATEWAY,
                format!("Could not fetch fund {}: {}", code, e),
            )))
        }
    }
}

pub async fn start_fetch(state: Arc<AppState>) -> Result<impl Reply, Rejection> {
    let queued = state
        .start_batch_fetch()
        .await
        .map_err(|e| warp::reject::custom(ApiError::from(e)))?;
    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({ "queued": queued })),
        StatusCode::ACCEPTED,
    ))
}

pub async fn cancel_fetch(state: Arc<AppState>) -> Result<Json, Rejection> {
    let running = state.cancel_batch_fetch();
    Ok(warp::reply::json(&serde_json::json!({ "cancelling": running })))
}
