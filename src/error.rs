// src/error.rs
use thiserror::Error;

/// Failure of a single upstream request (one symbol or one fund).
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Parsing error: {0}")]
    Parse(String),

    #[error("Insufficient data for {symbol}: {points} closes")]
    InsufficientData { symbol: String, points: usize },

    #[error("No data returned for {0}")]
    NoData(String),
}

impl FetchError {
    /// Upstream refused us, usually after too many requests.
    pub fn is_blocked(&self) -> bool {
        matches!(self, FetchError::Status { status: 403 | 429, .. })
    }
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug, PartialEq)]
pub enum ScoreError {
    #[error("Horizon weights must sum to 10 (got {0:.2})")]
    WeightSum(f64),

    #[error("No fund data loaded")]
    NoFunds,
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug, PartialEq)]
pub enum BatchError {
    #[error("A batch fetch is already running")]
    AlreadyRunning,

    #[error("No fund data loaded")]
    NoFunds,
}

#[derive(Error, Debug, PartialEq)]
pub enum PortfolioError {
    #[error("Portfolio value cannot be negative (got {0})")]
    NegativeValue(f64),

    #[error("Share of {code} cannot be negative (got {share})")]
    NegativeShare { code: String, share: f64 },

    #[error("No {0} funds defined")]
    EmptySet(&'static str),
}
