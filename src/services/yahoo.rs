// src/services/yahoo.rs
use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::sources::{QuoteRange, QuoteSource};
use crate::error::FetchError;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 Chrome/120.0.0.0 Safari/537.36";
const CHART_HOSTS: [&str; 2] = ["query2", "query1"];

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Default, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartResult {
    #[serde(default)]
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteBlock>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteBlock {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct SparkResponse {
    spark: SparkBody,
}

#[derive(Debug, Default, Deserialize)]
struct SparkBody {
    #[serde(default)]
    result: Option<Vec<SparkResult>>,
}

#[derive(Debug, Default, Deserialize)]
struct SparkResult {
    #[serde(default)]
    response: Vec<ChartResult>,
}

impl ChartResult {
    fn closes(&self) -> Vec<f64> {
        self.indicators
            .quote
            .first()
            .map(|q| q.close.iter().flatten().copied().collect())
            .unwrap_or_default()
    }
}

/// Closing prices from a chart endpoint body, nulls dropped.
pub fn parse_chart_closes(body: &str) -> Result<Vec<f64>, FetchError> {
    let response: ChartResponse = serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;
    Ok(response
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .map(|r| r.closes())
        .unwrap_or_default())
}

/// Closing prices from a spark endpoint body, nulls dropped.
pub fn parse_spark_closes(body: &str) -> Result<Vec<f64>, FetchError> {
    let response: SparkResponse = serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;
    Ok(response
        .spark
        .result
        .and_then(|results| results.into_iter().next())
        .and_then(|r| r.response.into_iter().next())
        .map(|r| r.closes())
        .unwrap_or_default())
}

pub struct YahooClient {
    client: Client,
}

impl YahooClient {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(YahooClient { client })
    }

    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        debug!("Fetching {}", url);
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.text().await?)
    }

    async fn fetch_chart(&self, host: &str, symbol: &str, range: QuoteRange) -> Result<Vec<f64>, FetchError> {
        let url = format!(
            "https://{}.finance.yahoo.com/v8/finance/chart/{}?range={}&interval=1d",
            host,
            symbol,
            range.as_param()
        );
        parse_chart_closes(&self.get_text(&url).await?)
    }

    async fn fetch_spark(&self, symbol: &str, range: QuoteRange) -> Result<Vec<f64>, FetchError> {
        let url = format!(
            "https://query2.finance.yahoo.com/v7/finance/spark?symbols={}&range={}&interval=1d",
            symbol,
            range.as_param()
        );
        parse_spark_closes(&self.get_text(&url).await?)
    }
}

fn usable(symbol: &str, closes: Vec<f64>) -> Result<Vec<f64>, FetchError> {
    if closes.len() >= 2 {
        Ok(closes)
    } else {
        Err(FetchError::InsufficientData {
            symbol: symbol.to_string(),
            points: closes.len(),
        })
    }
}

#[async_trait]
impl QuoteSource for YahooClient {
    async fn daily_closes(&self, symbol: &str, range: QuoteRange) -> Result<Vec<f64>, FetchError> {
        let mut last_error = None;

        for host in CHART_HOSTS {
            match self.fetch_chart(host, symbol, range).await.and_then(|c| usable(symbol, c)) {
                Ok(closes) => return Ok(closes),
                Err(e) => {
                    debug!("Chart request for {} via {} failed: {}", symbol, host, e);
                    last_error = Some(e);
                }
            }
        }

        if range == QuoteRange::Quarter {
            match self.fetch_spark(symbol, range).await.and_then(|c| usable(symbol, c)) {
                Ok(closes) => {
                    info!("Fetched {} closes for {} from spark fallback", closes.len(), symbol);
                    return Ok(closes);
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.unwrap_or_else(|| FetchError::NoData(symbol.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chart_drops_nulls() {
        let body = r#"{"chart":{"result":[{"meta":{"symbol":"GC=F"},"indicators":{"quote":[{"close":[2010.5,null,2020.0,2031.25]}]}}],"error":null}}"#;
        assert_eq!(parse_chart_closes(body).unwrap(), vec![2010.5, 2020.0, 2031.25]);
    }

    #[test]
    fn test_parse_chart_without_result() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found"}}}"#;
        assert!(parse_chart_closes(body).unwrap().is_empty());
    }

    #[test]
    fn test_parse_chart_rejects_garbage() {
        assert!(matches!(parse_chart_closes("<html>"), Err(FetchError::Parse(_))));
    }

    #[test]
    fn test_parse_spark() {
        let body = r#"{"spark":{"result":[{"symbol":"BZ=F","response":[{"indicators":{"quote":[{"close":[80.1,81.2,null]}]}}]}]}}"#;
        assert_eq!(parse_spark_closes(body).unwrap(), vec![80.1, 81.2]);
    }

    #[test]
    fn test_usable_requires_two_points() {
        assert!(usable("X", vec![1.0]).is_err());
        assert_eq!(usable("X", vec![1.0, 2.0]).unwrap(), vec![1.0, 2.0]);
    }
}
