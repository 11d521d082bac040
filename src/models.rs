// src/models.rs
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Performance horizons reported for every fund, shortest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Horizon {
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
    ThreeYears,
    FiveYears,
}

impl Horizon {
    pub const ALL: [Horizon; 6] = [
        Horizon::OneMonth,
        Horizon::ThreeMonths,
        Horizon::SixMonths,
        Horizon::OneYear,
        Horizon::ThreeYears,
        Horizon::FiveYears,
    ];

    /// Horizons short enough to be compared month by month.
    pub const SHORT_AND_ONE_YEAR: [Horizon; 4] = [
        Horizon::OneMonth,
        Horizon::ThreeMonths,
        Horizon::SixMonths,
        Horizon::OneYear,
    ];

    pub fn months(self) -> f64 {
        match self {
            Horizon::OneMonth => 1.0,
            Horizon::ThreeMonths => 3.0,
            Horizon::SixMonths => 6.0,
            Horizon::OneYear => 12.0,
            Horizon::ThreeYears => 36.0,
            Horizon::FiveYears => 60.0,
        }
    }

    /// Column header used by the performance dataset export.
    pub fn column(self) -> &'static str {
        match self {
            Horizon::OneMonth => "1 Ay (%)",
            Horizon::ThreeMonths => "3 Ay (%)",
            Horizon::SixMonths => "6 Ay (%)",
            Horizon::OneYear => "1 Yıl (%)",
            Horizon::ThreeYears => "3 Yıl (%)",
            Horizon::FiveYears => "5 Yıl (%)",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Percentage return per horizon. A reported value of exactly 0 means
/// "no data" and is stored as `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodReturns([Option<f64>; 6]);

impl PeriodReturns {
    pub fn from_raw(values: [f64; 6]) -> Self {
        let mut returns = PeriodReturns::default();
        for (horizon, value) in Horizon::ALL.into_iter().zip(values) {
            returns.set(horizon, value);
        }
        returns
    }

    pub fn set(&mut self, horizon: Horizon, value: f64) {
        self.0[horizon.index()] = (value != 0.0 && value.is_finite()).then_some(value);
    }

    pub fn get(&self, horizon: Horizon) -> Option<f64> {
        self.0[horizon.index()]
    }

    /// Value as reported, with missing horizons read back as 0.
    pub fn raw(&self, horizon: Horizon) -> f64 {
        self.get(horizon).unwrap_or(0.0)
    }

    /// Available horizons in `horizons` order, missing ones skipped.
    pub fn available<'a>(&'a self, horizons: &'a [Horizon]) -> impl Iterator<Item = (Horizon, f64)> + 'a {
        horizons.iter().filter_map(move |h| self.get(*h).map(|v| (*h, v)))
    }

    /// Each available horizon's return divided by its length in months.
    pub fn monthly_normalized(&self, horizons: &[Horizon]) -> Vec<f64> {
        self.available(horizons)
            .map(|(h, v)| v / h.months())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TypeRank {
    pub rank: usize,
    pub of: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundRecord {
    pub code: String,
    pub name: String,
    pub fund_type: String,
    pub returns: PeriodReturns,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub type_rank: Option<TypeRank>,
}

impl FundRecord {
    pub fn new(code: impl Into<String>, name: impl Into<String>, fund_type: impl Into<String>, returns: PeriodReturns) -> Self {
        FundRecord {
            code: code.into(),
            name: name.into(),
            fund_type: fund_type.into(),
            returns,
            score: None,
            type_rank: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationEntry {
    pub percentage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Asset label as reported by the source → weight in percent.
pub type Allocation = HashMap<String, AllocationEntry>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    Equity,
    FixedIncome,
    PreciousMetal,
    ForeignCurrency,
    MoneyMarket,
    FundOfFunds,
}

impl AssetClass {
    pub const ALL: [AssetClass; 6] = [
        AssetClass::Equity,
        AssetClass::FixedIncome,
        AssetClass::PreciousMetal,
        AssetClass::ForeignCurrency,
        AssetClass::MoneyMarket,
        AssetClass::FundOfFunds,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroQuote {
    pub price: f64,
    pub daily: f64,
    #[serde(default)]
    pub monthly: Option<f64>,
    #[serde(default)]
    pub quarterly: Option<f64>,
}

/// Display name → latest quote summary.
pub type MacroSnapshot = HashMap<String, MacroQuote>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    RiskOn,
    Defensive,
    Inflation,
    #[default]
    Neutral,
}

impl Regime {
    pub const ALL: [Regime; 4] = [Regime::RiskOn, Regime::Defensive, Regime::Inflation, Regime::Neutral];

    pub fn key(self) -> &'static str {
        match self {
            Regime::RiskOn => "risk_on",
            Regime::Defensive => "defensive",
            Regime::Inflation => "inflation",
            Regime::Neutral => "neutral",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_returns_are_missing() {
        let returns = PeriodReturns::from_raw([3.0, 6.0, 0.0, 12.0, 0.0, 0.0]);
        assert_eq!(returns.get(Horizon::SixMonths), None);
        assert_eq!(returns.raw(Horizon::SixMonths), 0.0);
        assert_eq!(returns.get(Horizon::OneYear), Some(12.0));
        assert_eq!(returns.available(&Horizon::ALL).count(), 3);
    }

    #[test]
    fn test_monthly_normalized_skips_missing() {
        let returns = PeriodReturns::from_raw([2.0, 0.0, 6.0, 24.0, 36.0, 0.0]);
        let monthly = returns.monthly_normalized(&Horizon::SHORT_AND_ONE_YEAR);
        assert_eq!(monthly, vec![2.0, 1.0, 2.0]);
    }

    #[test]
    fn test_macro_quote_reads_missing_changes() {
        let quote: MacroQuote = serde_json::from_str(r#"{"price": 10.5, "daily": 1.2, "monthly": null}"#).unwrap();
        assert_eq!(quote.monthly, None);
        assert_eq!(quote.quarterly, None);
    }

    #[test]
    fn test_regime_serializes_as_key() {
        assert_eq!(serde_json::to_string(&Regime::RiskOn).unwrap(), "\"risk_on\"");
        for regime in Regime::ALL {
            assert_eq!(serde_json::to_value(regime).unwrap(), regime.key());
        }
    }
}
