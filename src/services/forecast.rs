// src/services/forecast.rs
use log::info;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::HashMap;

use super::factors::{self, ConsistencyScore, MomentumScore, RiskReturnScore, RotationScore};
use super::numeric::{normalize, round_to};
use super::performance::FundTable;
use super::regime::RegimeContext;
use crate::models::{Allocation, FundRecord, MacroSnapshot, Regime};

// Source ranges mapped onto 0..100 before weighting.
const MOMENTUM_RANGE: (f64, f64) = (-50.0, 100.0);
const ROTATION_RANGE: (f64, f64) = (0.0, 40.0);
const RISK_RETURN_RANGE: (f64, f64) = (-30.0, 30.0);
const CONSISTENCY_RANGE: (f64, f64) = (0.0, 15.0);

/// Share of each sub-score in the composite. Sums to 1 for every regime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompositeWeights {
    pub momentum: f64,
    pub rotation: f64,
    pub risk_return: f64,
    pub consistency: f64,
}

impl CompositeWeights {
    pub fn for_regime(regime: Regime) -> Self {
        let (momentum, rotation) = match regime {
            Regime::RiskOn => (0.40, 0.25),
            Regime::Defensive => (0.25, 0.40),
            Regime::Inflation => (0.30, 0.35),
            Regime::Neutral => (0.35, 0.30),
        };
        CompositeWeights {
            momentum,
            rotation,
            risk_return: 0.20,
            consistency: 0.15,
        }
    }

    pub fn sum(&self) -> f64 {
        self.momentum + self.rotation + self.risk_return + self.consistency
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalizedScores {
    pub momentum: f64,
    pub rotation: f64,
    pub risk_return: f64,
    pub consistency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastResult {
    pub momentum: MomentumScore,
    pub rotation: RotationScore,
    pub risk_return: RiskReturnScore,
    pub consistency: ConsistencyScore,
    pub composite: f64,
    pub regime: Regime,
    pub regime_label: &'static str,
    pub regime_desc: &'static str,
    pub weights: CompositeWeights,
    pub normalized: NormalizedScores,
}

/// Score one fund under an already known regime.
pub fn calculate_forecast(fund: &FundRecord, allocation: Option<&Allocation>, regime: Regime) -> ForecastResult {
    let momentum = factors::momentum(&fund.returns);
    let rotation = factors::rotation(allocation, regime);
    let risk_return = factors::risk_return(&fund.returns);
    let consistency = factors::consistency(&fund.returns);

    let weights = CompositeWeights::for_regime(regime);
    let mom = normalize(momentum.total, MOMENTUM_RANGE.0, MOMENTUM_RANGE.1);
    let rot = normalize(rotation.total, ROTATION_RANGE.0, ROTATION_RANGE.1);
    let rr = normalize(risk_return.total, RISK_RETURN_RANGE.0, RISK_RETURN_RANGE.1);
    let con = normalize(consistency.total, CONSISTENCY_RANGE.0, CONSISTENCY_RANGE.1);

    let composite = mom * weights.momentum
        + rot * weights.rotation
        + rr * weights.risk_return
        + con * weights.consistency;

    ForecastResult {
        momentum,
        rotation,
        risk_return,
        consistency,
        composite: round_to(composite, 1),
        regime,
        regime_label: regime.label(),
        regime_desc: regime.description(),
        weights,
        normalized: NormalizedScores {
            momentum: round_to(mom, 1),
            rotation: round_to(rot, 1),
            risk_return: round_to(rr, 1),
            consistency: round_to(con, 1),
        },
    }
}

impl RegimeContext {
    /// Score one fund, re-detecting the regime first when a snapshot is given.
    pub fn forecast(
        &mut self,
        fund: &FundRecord,
        allocation: Option<&Allocation>,
        snapshot: Option<&MacroSnapshot>,
    ) -> ForecastResult {
        if let Some(snapshot) = snapshot.filter(|s| !s.is_empty()) {
            self.detect(snapshot);
        }
        calculate_forecast(fund, allocation, self.current())
    }
}

/// Forecasts keyed by fund code, kept in table order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForecastTable {
    entries: Vec<(String, ForecastResult)>,
}

impl ForecastTable {
    pub fn get(&self, code: &str) -> Option<&ForecastResult> {
        self.entries.iter().find(|(c, _)| c == code).map(|(_, f)| f)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ForecastResult)> {
        self.entries.iter().map(|(c, f)| (c.as_str(), f))
    }

    /// Insert or replace, keeping the existing position on replace.
    pub fn insert(&mut self, code: String, forecast: ForecastResult) {
        match self.entries.iter_mut().find(|(c, _)| *c == code) {
            Some(entry) => entry.1 = forecast,
            None => self.entries.push((code, forecast)),
        }
    }
}

impl Serialize for ForecastTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (code, forecast) in &self.entries {
            map.serialize_entry(code, forecast)?;
        }
        map.end()
    }
}

/// Detect the regime once from `snapshot`, then score every fund with a code.
pub fn calculate_all_forecasts(
    ctx: &mut RegimeContext,
    table: &FundTable,
    allocations: &HashMap<String, Allocation>,
    snapshot: &MacroSnapshot,
) -> ForecastTable {
    let regime = ctx.detect(snapshot).regime;

    let mut forecasts = ForecastTable::default();
    for fund in table.iter() {
        let code = fund.code.trim();
        if code.is_empty() {
            continue;
        }
        let forecast = calculate_forecast(fund, allocations.get(code), regime);
        forecasts.insert(code.to_string(), forecast);
    }

    info!("Calculated {} forecasts under {} regime", forecasts.len(), regime.label());
    forecasts
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedFund {
    pub code: String,
    pub score: f64,
    pub detail: ForecastResult,
}

/// Top `n` funds by composite, highest first. Equal scores keep table order.
pub fn top_funds(forecasts: &ForecastTable, n: usize) -> Vec<RankedFund> {
    let mut ranked: Vec<(&str, &ForecastResult)> = forecasts.iter().collect();
    ranked.sort_by(|a, b| b.1.composite.total_cmp(&a.1.composite));
    ranked
        .into_iter()
        .take(n)
        .map(|(code, f)| RankedFund {
            code: code.to_string(),
            score: f.composite,
            detail: f.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AllocationEntry, MacroQuote, PeriodReturns};

    fn fund(code: &str, raw: [f64; 6]) -> FundRecord {
        FundRecord::new(code, format!("{} Fund", code), "Hisse Senedi Fonu", PeriodReturns::from_raw(raw))
    }

    fn with_composite(composite: f64) -> ForecastResult {
        let mut f = calculate_forecast(&fund("X", [1.0; 6]), None, Regime::Neutral);
        f.composite = composite;
        f
    }

    #[test]
    fn test_composite_weights_sum_to_one() {
        for regime in Regime::ALL {
            assert!((CompositeWeights::for_regime(regime).sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_composite_is_bounded() {
        let extremes = [
            [500.0, 900.0, 1200.0, 3000.0, 9000.0, 20000.0],
            [-90.0, -80.0, -70.0, -60.0, -95.0, -99.0],
            [0.0; 6],
            [40.0, -30.0, 5.0, -2.0, 0.0, 300.0],
        ];
        let mut heavy = Allocation::new();
        heavy.insert("Hisse Senedi".to_string(), AllocationEntry { percentage: 400.0, color: None });

        for raw in extremes {
            for regime in Regime::ALL {
                for allocation in [None, Some(&heavy)] {
                    let result = calculate_forecast(&fund("X", raw), allocation, regime);
                    assert!((0.0..=100.0).contains(&result.composite), "{:?} {:?}", raw, result.composite);
                }
            }
        }
    }

    #[test]
    fn test_forecast_reports_regime_and_weights() {
        let result = calculate_forecast(&fund("AFA", [3.0, 6.0, 0.0, 12.0, 0.0, 0.0]), None, Regime::Defensive);
        assert_eq!(result.regime, Regime::Defensive);
        assert_eq!(result.regime_label, "Defensive");
        assert_eq!(result.weights.rotation, 0.40);
        assert_eq!(result.normalized.rotation, 0.0);
        assert!(!result.rotation.has_data);
    }

    #[test]
    fn test_top_funds_orders_by_composite() {
        let mut forecasts = ForecastTable::default();
        forecasts.insert("A".to_string(), with_composite(80.0));
        forecasts.insert("B".to_string(), with_composite(40.0));
        forecasts.insert("C".to_string(), with_composite(60.0));

        let top = top_funds(&forecasts, 2);
        let codes: Vec<(&str, f64)> = top.iter().map(|r| (r.code.as_str(), r.score)).collect();
        assert_eq!(codes, vec![("A", 80.0), ("C", 60.0)]);
    }

    #[test]
    fn test_top_funds_ties_keep_input_order() {
        let mut forecasts = ForecastTable::default();
        forecasts.insert("Z".to_string(), with_composite(55.0));
        forecasts.insert("A".to_string(), with_composite(55.0));
        forecasts.insert("M".to_string(), with_composite(70.0));

        let codes: Vec<String> = top_funds(&forecasts, 10).into_iter().map(|r| r.code).collect();
        assert_eq!(codes, vec!["M", "Z", "A"]);
    }

    #[test]
    fn test_top_funds_empty() {
        assert!(top_funds(&ForecastTable::default(), 5).is_empty());
    }

    #[test]
    fn test_calculate_all_detects_regime_once() {
        let table = FundTable::from_records(vec![
            fund("AAA", [3.0, 6.0, 9.0, 20.0, 0.0, 0.0]),
            fund("  ", [1.0, 1.0, 1.0, 1.0, 1.0, 1.0]),
            fund("BBB", [-2.0, -1.0, 4.0, 10.0, 0.0, 0.0]),
        ]);
        let mut snapshot = MacroSnapshot::new();
        snapshot.insert(
            "BIST-100".to_string(),
            MacroQuote { price: 9000.0, daily: 0.2, monthly: Some(6.5), quarterly: None },
        );

        let mut ctx = RegimeContext::default();
        let forecasts = calculate_all_forecasts(&mut ctx, &table, &HashMap::new(), &snapshot);
        assert_eq!(ctx.current(), Regime::RiskOn);
        assert_eq!(forecasts.len(), 2);
        assert!(forecasts.get("BBB").is_some());
        assert!(forecasts.iter().all(|(_, f)| f.regime == Regime::RiskOn));

        let json = serde_json::to_value(&forecasts).unwrap();
        assert!(json["AAA"]["composite"].is_number());
    }

    #[test]
    fn test_context_forecast_keeps_last_regime_without_snapshot() {
        let mut ctx = RegimeContext::default();
        let mut snapshot = MacroSnapshot::new();
        snapshot.insert(
            "USD/TRY".to_string(),
            MacroQuote { price: 34.0, daily: 0.9, monthly: Some(6.0), quarterly: Some(12.0) },
        );
        let a = fund("AAA", [3.0, 6.0, 9.0, 20.0, 0.0, 0.0]);

        assert_eq!(ctx.forecast(&a, None, Some(&snapshot)).regime, Regime::Inflation);
        assert_eq!(ctx.forecast(&a, None, None).regime, Regime::Inflation);
    }
}
