use anyhow::Context;
use dotenv::dotenv;
use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use warp::Filter;

use fund_forecast::config::Settings;
use fund_forecast::routes;
use fund_forecast::services::performance::import_path;
use fund_forecast::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Initialize the logger
    env_logger::init();
    info!("Logger initialized. Starting the application...");

    let settings = Settings::from_env();
    info!("Using PORT: {}", settings.port);
    info!("Cache file: {}", settings.cache_file.display());

    let addr: SocketAddr = ([0, 0, 0, 0], settings.port).into();
    let funds_csv = settings.funds_csv.clone();

    let state = Arc::new(AppState::new(settings).context("Failed to build provider clients")?);

    if let Some(path) = funds_csv {
        match import_path(&path) {
            Ok(table) => state.import_funds(table).await,
            Err(e) => error!("Could not load {}: {}", path.display(), e),
        }
    } else {
        warn!("FUNDS_CSV not set; import a dataset through POST /api/v1/funds/import");
    }

    tokio::spawn(Arc::clone(&state).run_macro_auto_refresh());

    let cors = warp::cors()
        .allow_any_origin()
        .allow_header("content-type")
        .allow_methods(vec!["GET", "POST", "PUT", "DELETE"]);

    let api = routes::routes(state).with(cors);
    info!("Routes configured successfully with CORS.");

    info!("Starting server on {}", addr);
    warp::serve(api).run(addr).await;
    Ok(())
}
