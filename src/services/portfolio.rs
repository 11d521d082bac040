// src/services/portfolio.rs
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use super::allocation::classify_label;
use super::numeric::round_to;
use super::performance::FundTable;
use super::store::{DAILY_FETCH_ERROR, DAILY_NOT_AVAILABLE};
use crate::error::PortfolioError;
use crate::models::{Allocation, AssetClass, Horizon};

/// How far the distribution total may sit from 100 and still count as complete.
pub const DISTRIBUTION_TOLERANCE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundSet {
    /// Funds currently held.
    Current,
    /// Funds the holder intends to buy.
    Planned,
}

impl FundSet {
    pub fn name(self) -> &'static str {
        match self {
            FundSet::Current => "current",
            FundSet::Planned => "planned",
        }
    }
}

impl FromStr for FundSet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "current" => Ok(FundSet::Current),
            "planned" => Ok(FundSet::Planned),
            other => Err(format!("Unknown fund set: {}", other)),
        }
    }
}

/// Holder's fund sets, total value in TRY and percentage share per fund.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    #[serde(default)]
    pub total_value: f64,
    #[serde(default)]
    pub current: BTreeSet<String>,
    #[serde(default)]
    pub planned: BTreeSet<String>,
    #[serde(default)]
    pub distribution: HashMap<String, f64>,
}

fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

impl Portfolio {
    /// Codes trimmed and upper-cased, empty codes dropped, values checked.
    pub fn normalized(self) -> Result<Self, PortfolioError> {
        if self.total_value < 0.0 || !self.total_value.is_finite() {
            return Err(PortfolioError::NegativeValue(self.total_value));
        }

        let codes = |set: BTreeSet<String>| -> BTreeSet<String> {
            set.iter().map(|c| normalize_code(c)).filter(|c| !c.is_empty()).collect()
        };

        let mut distribution = HashMap::new();
        for (code, share) in self.distribution {
            let code = normalize_code(&code);
            if code.is_empty() {
                continue;
            }
            if share < 0.0 || !share.is_finite() {
                return Err(PortfolioError::NegativeShare { code, share });
            }
            distribution.insert(code, share);
        }

        Ok(Portfolio {
            total_value: self.total_value,
            current: codes(self.current),
            planned: codes(self.planned),
            distribution,
        })
    }

    pub fn funds(&self, set: FundSet) -> &BTreeSet<String> {
        match set {
            FundSet::Current => &self.current,
            FundSet::Planned => &self.planned,
        }
    }

    pub fn share(&self, code: &str) -> f64 {
        self.distribution.get(code).copied().unwrap_or(0.0)
    }

    /// Value held in `code`.
    pub fn amount(&self, code: &str) -> f64 {
        self.total_value * (self.share(code) / 100.0)
    }

    pub fn distribution_total(&self, set: FundSet) -> f64 {
        self.funds(set).iter().map(|c| self.share(c)).sum()
    }

    /// Split 100% evenly over the set, shares rounded to two decimals.
    /// The last fund in code order takes the remainder so the set sums to 100.
    pub fn equalize(&mut self, set: FundSet) -> Result<(), PortfolioError> {
        let funds: Vec<String> = self.funds(set).iter().cloned().collect();
        let Some((last, rest)) = funds.split_last() else {
            return Err(PortfolioError::EmptySet(set.name()));
        };

        let equal = round_to(100.0 / funds.len() as f64, 2);
        for code in rest {
            self.distribution.insert(code.clone(), equal);
        }
        let assigned: f64 = rest.iter().map(|c| self.share(c)).sum();
        self.distribution.insert(last.clone(), round_to(100.0 - assigned, 2));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HorizonAmount {
    pub horizon: Horizon,
    /// `None` when no fund reported this horizon.
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundGains {
    pub code: String,
    pub share: f64,
    pub amount: f64,
    pub gains: Vec<HorizonAmount>,
}

/// Money made or lost per horizon, per fund and in total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodGains {
    pub funds: Vec<FundGains>,
    pub totals: Vec<HorizonAmount>,
}

/// Gain per horizon for every fund with a positive share. Horizons a fund
/// has no data for are left out of its row and of the totals.
pub fn period_gains(portfolio: &Portfolio, set: FundSet, table: &FundTable) -> PeriodGains {
    let mut totals: Vec<HorizonAmount> = Horizon::ALL
        .into_iter()
        .map(|horizon| HorizonAmount { horizon, amount: None })
        .collect();
    let mut funds = Vec::new();

    for code in portfolio.funds(set) {
        let share = portfolio.share(code);
        if share <= 0.0 {
            continue;
        }
        let amount = portfolio.amount(code);
        let returns = table.get(code).map(|f| f.returns);

        let gains: Vec<HorizonAmount> = Horizon::ALL
            .into_iter()
            .map(|horizon| HorizonAmount {
                horizon,
                amount: returns.and_then(|r| r.get(horizon)).map(|pct| amount * (pct / 100.0)),
            })
            .collect();

        for (total, gain) in totals.iter_mut().zip(&gains) {
            if let Some(value) = gain.amount {
                total.amount = Some(total.amount.unwrap_or(0.0) + value);
            }
        }
        funds.push(FundGains {
            code: code.clone(),
            share,
            amount,
            gains,
        });
    }

    PeriodGains { funds, totals }
}

/// Daily return as reported by the fund page ("%0,45"), or `None` for the
/// fetch markers and anything unparseable.
pub fn parse_daily_return(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() || raw == DAILY_NOT_AVAILABLE || raw == DAILY_FETCH_ERROR {
        return None;
    }
    raw.replace('%', "")
        .replace(',', ".")
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Today's change in value over funds with a share and a known daily return.
pub fn todays_change(portfolio: &Portfolio, set: FundSet, daily_returns: &HashMap<String, String>) -> Option<f64> {
    let changes: Vec<f64> = portfolio
        .funds(set)
        .iter()
        .filter(|code| portfolio.share(code) > 0.0)
        .filter_map(|code| {
            let daily = daily_returns.get(code.as_str()).and_then(|d| parse_daily_return(d))?;
            Some(portfolio.amount(code) * (daily / 100.0))
        })
        .collect();

    (!changes.is_empty()).then(|| changes.iter().sum())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Weighting {
    Distribution,
    Equal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetShare {
    pub label: String,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassShare {
    pub class: AssetClass,
    pub percentage: f64,
}

/// Asset mix of a fund set, each fund weighted by its share.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedAllocation {
    pub funds: Vec<String>,
    pub missing: Vec<String>,
    pub weighting: Weighting,
    pub assets: Vec<AssetShare>,
    pub classes: Vec<ClassShare>,
}

/// Combine the cached allocations of a fund set. Funds without a share get
/// an equal weight over the funds that have data. `None` when no fund in
/// the set has allocation data.
pub fn combined_allocation(
    portfolio: &Portfolio,
    set: FundSet,
    allocations: &HashMap<String, Allocation>,
) -> Option<CombinedAllocation> {
    let (available, missing): (Vec<&String>, Vec<&String>) = portfolio
        .funds(set)
        .iter()
        .partition(|code| allocations.get(code.as_str()).is_some_and(|a| !a.is_empty()));
    if available.is_empty() {
        return None;
    }

    let equal_weight = 1.0 / available.len() as f64;
    let mut combined: HashMap<&str, f64> = HashMap::new();
    for code in &available {
        let share = portfolio.share(code);
        let weight = if share > 0.0 { share / 100.0 } else { equal_weight };
        for (label, entry) in allocations.get(code.as_str()).into_iter().flatten() {
            if entry.percentage > 0.0 {
                *combined.entry(label.as_str()).or_insert(0.0) += entry.percentage * weight;
            }
        }
    }

    let mut assets: Vec<AssetShare> = combined
        .into_iter()
        .map(|(label, percentage)| AssetShare {
            label: label.to_string(),
            percentage,
        })
        .collect();
    assets.sort_by(|a, b| b.percentage.total_cmp(&a.percentage).then_with(|| a.label.cmp(&b.label)));

    let mut by_class = [0.0; 6];
    for asset in &assets {
        by_class[classify_label(&asset.label).index()] += asset.percentage;
    }
    let mut classes: Vec<ClassShare> = AssetClass::ALL
        .into_iter()
        .filter(|c| by_class[c.index()] > 0.0)
        .map(|class| ClassShare {
            class,
            percentage: by_class[class.index()],
        })
        .collect();
    classes.sort_by(|a, b| b.percentage.total_cmp(&a.percentage));

    let weighting = if portfolio.funds(set).iter().any(|c| portfolio.share(c) > 0.0) {
        Weighting::Distribution
    } else {
        Weighting::Equal
    };

    Some(CombinedAllocation {
        funds: available.into_iter().cloned().collect(),
        missing: missing.into_iter().cloned().collect(),
        weighting,
        assets,
        classes,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub set: FundSet,
    pub funds: Vec<String>,
    pub total_value: f64,
    pub distribution_total: f64,
    pub distribution_complete: bool,
    pub gains: Option<PeriodGains>,
    pub todays_change: Option<f64>,
    pub allocation: Option<CombinedAllocation>,
}

/// Everything known about one fund set. Gains and today's change need a
/// portfolio value and a distribution.
pub fn summarize(
    portfolio: &Portfolio,
    set: FundSet,
    table: Option<&FundTable>,
    allocations: &HashMap<String, Allocation>,
    daily_returns: &HashMap<String, String>,
) -> PortfolioSummary {
    let distribution_total = portfolio.distribution_total(set);
    let valued = portfolio.total_value > 0.0 && distribution_total > 0.0;

    PortfolioSummary {
        set,
        funds: portfolio.funds(set).iter().cloned().collect(),
        total_value: portfolio.total_value,
        distribution_total,
        distribution_complete: (distribution_total - 100.0).abs() < DISTRIBUTION_TOLERANCE,
        gains: table.filter(|_| valued).map(|t| period_gains(portfolio, set, t)),
        todays_change: if valued { todays_change(portfolio, set, daily_returns) } else { None },
        allocation: combined_allocation(portfolio, set, allocations),
    }
}
