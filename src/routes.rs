// src/routes.rs
use log::info;
use std::convert::Infallible;
use std::sync::Arc;
use warp::reject::Rejection;
use warp::{Filter, Reply};

use crate::handlers::cache::clear_cache;
use crate::handlers::error::ApiError;
use crate::handlers::forecast::{calculate_forecasts, get_forecast, get_top_funds};
use crate::handlers::funds::{cancel_fetch, get_allocation, import_funds, list_funds, score_funds, start_fetch};
use crate::handlers::macro_data::{get_macro, refresh_macro};
use crate::handlers::portfolio::{equalize_portfolio, get_portfolio, get_portfolio_summary, set_portfolio};
use crate::handlers::regime::get_regime;
use crate::services::portfolio::FundSet;
use crate::state::AppState;

const MAX_CSV_BYTES: u64 = 16 * 1024 * 1024;

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let code;
    let message: String;

    if err.is_not_found() {
        code = warp::http::StatusCode::NOT_FOUND;
        message = "Not Found".to_string();
    } else if let Some(api_error) = err.find::<ApiError>() {
        code = api_error.status;
        message = api_error.message.clone();
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        code = warp::http::StatusCode::BAD_REQUEST;
        message = e.to_string();
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        code = warp::http::StatusCode::METHOD_NOT_ALLOWED;
        message = "Method Not Allowed".to_string();
    } else {
        code = warp::http::StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal Server Error".to_string();
    }

    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "error": message,
        })),
        code,
    ))
}

pub fn routes(state: Arc<AppState>) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    info!("Configuring routes...");

    let state_filter = warp::any().map(move || state.clone());

    let macro_route = warp::path!("api" / "v1" / "macro")
        .and(warp::get())
        .and(state_filter.clone())
        .and_then(get_macro);

    let macro_refresh_route = warp::path!("api" / "v1" / "macro" / "refresh")
        .and(warp::post())
        .and(state_filter.clone())
        .and_then(refresh_macro);

    let regime_route = warp::path!("api" / "v1" / "regime")
        .and(warp::get())
        .and(state_filter.clone())
        .and_then(get_regime);

    let import_route = warp::path!("api" / "v1" / "funds" / "import")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_CSV_BYTES))
        .and(warp::body::bytes())
        .and(state_filter.clone())
        .and_then(import_funds);

    let score_route = warp::path!("api" / "v1" / "funds" / "score")
        .and(warp::post())
        .and(warp::body::json())
        .and(state_filter.clone())
        .and_then(score_funds);

    let funds_route = warp::path!("api" / "v1" / "funds")
        .and(warp::get())
        .and(state_filter.clone())
        .and_then(list_funds);

    let allocation_route = warp::path!("api" / "v1" / "funds" / String / "allocation")
        .and(warp::get())
        .and(state_filter.clone())
        .and_then(get_allocation);

    let fetch_route = warp::path!("api" / "v1" / "funds" / "fetch")
        .and(warp::post())
        .and(state_filter.clone())
        .and_then(start_fetch);

    let cancel_route = warp::path!("api" / "v1" / "funds" / "fetch" / "cancel")
        .and(warp::post())
        .and(state_filter.clone())
        .and_then(cancel_fetch);

    let forecasts_route = warp::path!("api" / "v1" / "forecasts")
        .and(warp::post())
        .and(state_filter.clone())
        .and_then(calculate_forecasts);

    let top_route = warp::path!("api" / "v1" / "forecasts" / "top" / usize)
        .and(warp::get())
        .and(state_filter.clone())
        .and_then(get_top_funds);

    let forecast_route = warp::path!("api" / "v1" / "forecasts" / String)
        .and(warp::get())
        .and(state_filter.clone())
        .and_then(get_forecast);

    let portfolio_route = warp::path!("api" / "v1" / "portfolio")
        .and(warp::get())
        .and(state_filter.clone())
        .and_then(get_portfolio);

    let portfolio_update_route = warp::path!("api" / "v1" / "portfolio")
        .and(warp::put())
        .and(warp::body::json())
        .and(state_filter.clone())
        .and_then(set_portfolio);

    let equalize_route = warp::path!("api" / "v1" / "portfolio" / FundSet / "equalize")
        .and(warp::post())
        .and(state_filter.clone())
        .and_then(equalize_portfolio);

    let summary_route = warp::path!("api" / "v1" / "portfolio" / FundSet / "summary")
        .and(warp::get())
        .and(state_filter.clone())
        .and_then(get_portfolio_summary);

    let cache_route = warp::path!("api" / "v1" / "cache")
        .and(warp::delete())
        .and(state_filter.clone())
        .and_then(clear_cache);

    info!("All routes configured successfully.");

    macro_route
        .or(macro_refresh_route)
        .or(regime_route)
        .or(import_route)
        .or(score_route)
        .or(funds_route)
        .or(allocation_route)
        .or(fetch_route)
        .or(cancel_route)
        .or(forecasts_route)
        .or(top_route)
        .or(forecast_route)
        .or(portfolio_route)
        .or(portfolio_update_route)
        .or(equalize_route)
        .or(summary_route)
        .or(cache_route)
        .recover(handle_rejection)
}
