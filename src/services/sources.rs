// src/services/sources.rs
use async_trait::async_trait;
use serde::Serialize;

use crate::error::FetchError;
use crate::models::Allocation;

/// How much daily history to request for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteRange {
    /// About three months, enough for monthly and quarterly changes.
    Quarter,
    /// Last few sessions, enough for price and daily change.
    Week,
}

impl QuoteRange {
    pub fn as_param(&self) -> &'static str {
        match self {
            QuoteRange::Quarter => "3mo",
            QuoteRange::Week => "5d",
        }
    }
}

/// Daily closing prices for a market symbol, oldest first, nulls removed.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn daily_closes(&self, symbol: &str, range: QuoteRange) -> Result<Vec<f64>, FetchError>;
}

/// What a fund's detail page yields once parsed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FundPage {
    pub allocation: Allocation,
    pub daily_return: Option<String>,
}

#[async_trait]
pub trait FundPageSource: Send + Sync {
    async fn fetch_fund_page(&self, code: &str) -> Result<FundPage, FetchError>;
}
