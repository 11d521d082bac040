use dotenv::dotenv;
use log::{error, info};
use std::env;

use fund_forecast::services::macro_data::summarize_closes;
use fund_forecast::services::sources::{QuoteRange, QuoteSource};
use fund_forecast::services::yahoo::YahooClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let symbol = env::args().nth(1).unwrap_or_else(|| "XU100.IS".to_string());
    let range = match env::args().nth(2).as_deref() {
        Some("5d") => QuoteRange::Week,
        _ => QuoteRange::Quarter,
    };
    info!("Debugging quote fetch for {} ({})", symbol, range.as_param());

    let client = YahooClient::new()?;
    match client.daily_closes(&symbol, range).await {
        Ok(closes) => {
            info!("Received {} closes", closes.len());
            if let (Some(first), Some(last)) = (closes.first(), closes.last()) {
                println!("first close: {:.4}", first);
                println!("last close:  {:.4}", last);
            }
            match summarize_closes(&closes) {
                Some(quote) => println!("{}", serde_json::to_string_pretty(&quote)?),
                None => error!("Not enough closes to summarize"),
            }
        }
        Err(e) => {
            error!("Fetch failed for {}: {}", symbol, e);
            if e.is_blocked() {
                error!("Provider is refusing requests; wait before retrying");
            }
        }
    }

    Ok(())
}
