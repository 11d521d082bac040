use anyhow::{bail, Context};
use dotenv::dotenv;
use log::{info, warn};
use std::env;
use std::sync::Arc;

use fund_forecast::config::Settings;
use fund_forecast::services::cache::SnapshotCache;
use fund_forecast::services::forecast::{calculate_all_forecasts, top_funds};
use fund_forecast::services::macro_data::{MacroAggregator, MacroSymbols};
use fund_forecast::services::performance::import_path;
use fund_forecast::services::regime::RegimeContext;
use fund_forecast::services::throttle::FetchThrottle;
use fund_forecast::services::yahoo::YahooClient;

/// Usage: rank_funds <performance.csv> [top_n] [--refresh]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let refresh = args.iter().any(|a| a == "--refresh");
    let positional: Vec<&String> = args.iter().filter(|a| !a.starts_with("--")).collect();

    let Some(csv_path) = positional.first() else {
        bail!("usage: rank_funds <performance.csv> [top_n] [--refresh]");
    };
    let top_n: usize = match positional.get(1) {
        Some(n) => n.parse().context("top_n must be a number")?,
        None => 10,
    };

    let settings = Settings::from_env();
    let table = import_path(csv_path.as_str()).with_context(|| format!("Failed to import {}", csv_path))?;

    let cache = SnapshotCache::new(settings.cache_file.clone(), settings.market_tz);
    let mut contents = cache.load();

    if refresh || contents.macro_data.is_empty() {
        info!("Refreshing macro data...");
        let aggregator = MacroAggregator::new(Arc::new(YahooClient::new()?), MacroSymbols::default())
            .with_throttle(Arc::new(FetchThrottle::for_macro(&settings)));
        let result = aggregator.refresh().await;
        if !result.errors.is_empty() {
            warn!("Unresolved: {}", result.unresolved_names().join(", "));
        }
        if !result.snapshot.is_empty() {
            contents.macro_data = result.snapshot;
            if let Err(e) = cache.save(&contents) {
                warn!("Ranking without a saved snapshot: {}", e);
            }
        }
    }

    let mut ctx = RegimeContext::default();
    let forecasts = calculate_all_forecasts(&mut ctx, &table, &contents.allocations, &contents.macro_data);
    let regime = ctx.current();

    println!("Regime: {} - {}", regime.label(), regime.description());
    println!("{}", regime.explanation());
    println!();
    println!("{:<4} {:<6} {:>8} {:>8} {:>8} {:>8} {:>8}", "#", "Code", "Score", "Mom", "Rot", "R/R", "Cons");
    for (i, ranked) in top_funds(&forecasts, top_n).iter().enumerate() {
        let n = &ranked.detail.normalized;
        println!(
            "{:<4} {:<6} {:>8.1} {:>8.1} {:>8.1} {:>8.1} {:>8.1}",
            i + 1,
            ranked.code,
            ranked.score,
            n.momentum,
            n.rotation,
            n.risk_return,
            n.consistency
        );
    }

    Ok(())
}
