// src/services/macro_data.rs
use log::{error, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::numeric::pct_change;
use super::sources::{QuoteRange, QuoteSource};
use super::throttle::{FetchThrottle, RequestClass};
use crate::error::FetchError;
use crate::models::{MacroQuote, MacroSnapshot};

/// Trading sessions in roughly one month and one quarter.
pub const MONTH_SESSIONS: usize = 22;
pub const QUARTER_SESSIONS: usize = 60;

/// Display name → market symbol, plus the names quoted in a foreign
/// currency that are converted with the `fx` series before summarizing.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroSymbols {
    pub symbols: Vec<(String, String)>,
    pub converted: Vec<String>,
    pub fx: String,
}

impl Default for MacroSymbols {
    fn default() -> Self {
        let symbols = [
            ("BIST-100", "XU100.IS"),
            ("Gold", "GC=F"),
            ("Silver", "SI=F"),
            ("USD/TRY", "USDTRY=X"),
            ("EUR/TRY", "EURTRY=X"),
            ("Brent", "BZ=F"),
            ("BTC", "BTC-USD"),
            ("ETH", "ETH-USD"),
        ];
        MacroSymbols {
            symbols: symbols.iter().map(|(n, s)| (n.to_string(), s.to_string())).collect(),
            converted: vec!["Gold".to_string(), "Silver".to_string()],
            fx: "USD/TRY".to_string(),
        }
    }
}

impl MacroSymbols {
    pub fn is_converted(&self, name: &str) -> bool {
        self.converted.iter().any(|c| c == name)
    }
}

/// Multiply a series by the FX series point by point, up to the shorter length.
pub fn to_local_currency(closes: &[f64], fx: &[f64]) -> Vec<f64> {
    closes.iter().zip(fx).map(|(c, r)| c * r).collect()
}

/// Price and changes of a close series, or `None` with fewer than two points.
pub fn summarize_closes(closes: &[f64]) -> Option<MacroQuote> {
    let n = closes.len();
    if n < 2 {
        return None;
    }
    let current = closes[n - 1];

    Some(MacroQuote {
        price: current,
        daily: pct_change(closes[n - 2], current),
        monthly: (n >= MONTH_SESSIONS).then(|| pct_change(closes[n - MONTH_SESSIONS], current)),
        quarterly: (n >= QUARTER_SESSIONS).then(|| pct_change(closes[0], current)),
    })
}

#[derive(Debug, Serialize)]
pub struct SymbolFailure {
    pub name: String,
    #[serde(serialize_with = "as_message")]
    pub error: FetchError,
}

fn as_message<S: serde::Serializer>(error: &FetchError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// Outcome of a full refresh: whatever resolved, plus per-name failures.
#[derive(Debug, Default, Serialize)]
pub struct MacroRefresh {
    pub snapshot: MacroSnapshot,
    pub errors: Vec<SymbolFailure>,
}

impl MacroRefresh {
    pub fn unresolved_names(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.name.as_str()).collect()
    }
}

pub struct MacroAggregator {
    source: Arc<dyn QuoteSource>,
    symbols: MacroSymbols,
    throttle: Option<Arc<FetchThrottle>>,
}

impl MacroAggregator {
    pub fn new(source: Arc<dyn QuoteSource>, symbols: MacroSymbols) -> Self {
        MacroAggregator {
            source,
            symbols,
            throttle: None,
        }
    }

    pub fn with_throttle(mut self, throttle: Arc<FetchThrottle>) -> Self {
        self.throttle = Some(throttle);
        self
    }

    /// Fetch every symbol's close series, in table order. A failing symbol
    /// is reported and skipped.
    async fn fetch_all(&self, range: QuoteRange) -> (HashMap<String, Vec<f64>>, Vec<SymbolFailure>) {
        let mut closes = HashMap::new();
        let mut errors = Vec::new();

        for (name, symbol) in &self.symbols.symbols {
            if let Some(throttle) = &self.throttle {
                throttle.await_turn(RequestClass::Batch).await;
            }
            match self.source.daily_closes(symbol, range).await {
                Ok(series) => {
                    closes.insert(name.clone(), series);
                }
                Err(e) => {
                    if e.is_blocked() {
                        error!("Quote provider refused {} ({}): {}", name, symbol, e);
                    } else {
                        warn!("Failed to fetch {} ({}): {}", name, symbol, e);
                    }
                    errors.push(SymbolFailure { name: name.clone(), error: e });
                }
            }
        }

        (closes, errors)
    }

    /// Series for `name` in local currency where conversion applies.
    fn local_series<'a>(&self, name: &str, series: &'a [f64], fx: Option<&[f64]>) -> std::borrow::Cow<'a, [f64]> {
        match fx {
            Some(fx) if self.symbols.is_converted(name) => to_local_currency(series, fx).into(),
            None if self.symbols.is_converted(name) => {
                warn!("No {} series, {} left unconverted", self.symbols.fx, name);
                series.into()
            }
            _ => series.into(),
        }
    }

    /// Full refresh over about three months of closes.
    pub async fn refresh(&self) -> MacroRefresh {
        let (closes, mut errors) = self.fetch_all(QuoteRange::Quarter).await;
        let fx = closes.get(&self.symbols.fx).map(Vec::as_slice);

        let mut snapshot = MacroSnapshot::new();
        for (name, _) in &self.symbols.symbols {
            let Some(series) = closes.get(name) else {
                continue;
            };
            let series = self.local_series(name, series, fx);
            match summarize_closes(&series) {
                Some(quote) => {
                    snapshot.insert(name.clone(), quote);
                }
                None => errors.push(SymbolFailure {
                    name: name.clone(),
                    error: FetchError::InsufficientData {
                        symbol: name.clone(),
                        points: series.len(),
                    },
                }),
            }
        }

        info!(
            "Macro refresh: {} of {} symbols resolved",
            snapshot.len(),
            self.symbols.symbols.len()
        );
        MacroRefresh { snapshot, errors }
    }

    /// Latest price and daily change per name over the last few sessions.
    ///
    /// Converted names are scaled by the latest FX close alone, so their
    /// daily change is the change of the foreign price.
    pub async fn quick_quotes(&self) -> Vec<QuickQuote> {
        let (closes, _errors) = self.fetch_all(QuoteRange::Week).await;
        let rate = closes
            .get(&self.symbols.fx)
            .filter(|fx| fx.len() >= 2)
            .and_then(|fx| fx.last().copied());

        let mut quotes = Vec::new();
        for (name, _) in &self.symbols.symbols {
            let Some(series) = closes.get(name).filter(|s| s.len() >= 2) else {
                continue;
            };
            let (mut prev, mut current) = (series[series.len() - 2], series[series.len() - 1]);
            if self.symbols.is_converted(name) {
                match rate {
                    Some(rate) => {
                        prev *= rate;
                        current *= rate;
                    }
                    None => warn!("No {} rate, {} left unconverted", self.symbols.fx, name),
                }
            }
            quotes.push(QuickQuote {
                name: name.clone(),
                price: current,
                daily: pct_change(prev, current),
            });
        }
        quotes
    }
}

/// Price and daily change for one name from a quick refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuickQuote {
    pub name: String,
    pub price: f64,
    pub daily: f64,
}

/// Write quick quotes into `snapshot`. Only `price` and `daily` change on
/// existing entries; new names get no monthly or quarterly change.
/// Returns how many entries were updated.
pub fn apply_quick_quotes(snapshot: &mut MacroSnapshot, quotes: &[QuickQuote]) -> usize {
    for quote in quotes {
        snapshot
            .entry(quote.name.clone())
            .and_modify(|q| {
                q.price = quote.price;
                q.daily = quote.daily;
            })
            .or_insert(MacroQuote {
                price: quote.price,
                daily: quote.daily,
                monthly: None,
                quarterly: None,
            });
    }
    quotes.len()
}
