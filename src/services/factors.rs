// src/services/factors.rs
//
// Per-fund sub-scores. Missing horizons are excluded from every blend,
// average and deviation below; they never count as a literal zero.
use serde::Serialize;

use super::allocation::{aggregate, rotation_weight};
use super::numeric::{calculate_average, round_to, sample_std_dev};
use crate::models::{Allocation, AssetClass, Horizon, PeriodReturns, Regime};

// (horizon, blend weight, divisor applied to the raw return)
const SHORT_TERM: [(Horizon, f64, f64); 3] = [
    (Horizon::OneMonth, 0.4, 1.0),
    (Horizon::ThreeMonths, 0.3, 1.0),
    (Horizon::SixMonths, 0.3, 1.0),
];

// Multi-year returns are annualized before blending.
const LONG_TERM: [(Horizon, f64, f64); 3] = [
    (Horizon::OneYear, 0.5, 1.0),
    (Horizon::ThreeYears, 0.3, 3.0),
    (Horizon::FiveYears, 0.2, 5.0),
];

const SHORT_SHARE: f64 = 0.6;
const LONG_SHARE: f64 = 0.4;
const VOLATILITY_FLOOR: f64 = 0.001;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MomentumScore {
    pub short_momentum: f64,
    pub long_momentum: f64,
    pub acceleration: f64,
    pub consistency_bonus: f64,
    pub positive_periods: usize,
    pub total_periods: usize,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassContribution {
    pub class: AssetClass,
    pub percentage: f64,
    pub weight: f64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RotationScore {
    pub breakdown: Vec<ClassContribution>,
    pub total: f64,
    pub has_data: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskReturnScore {
    pub avg_return: f64,
    pub volatility: f64,
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsistencyScore {
    pub std_dev: f64,
    pub trend: f64,
    pub avg_monthly: f64,
    pub total: f64,
}

/// Weighted mean over the horizons that have data, weights renormalized.
fn blend(returns: &PeriodReturns, table: &[(Horizon, f64, f64)]) -> f64 {
    let (sum, weight_sum) = table
        .iter()
        .filter_map(|(h, w, div)| returns.get(*h).map(|v| (v / div * w, *w)))
        .fold((0.0, 0.0), |(s, ws), (v, w)| (s + v, ws + w));

    if weight_sum > 0.0 {
        sum / weight_sum
    } else {
        0.0
    }
}

/// Multiplier rewarding funds whose available horizons are mostly positive.
pub fn consistency_multiplier(positive: usize, total: usize) -> f64 {
    if total == 0 {
        return 1.0;
    }
    let ratio = positive as f64 / total as f64;
    if ratio >= 1.0 {
        1.25
    } else if ratio >= 0.83 {
        1.15
    } else if ratio >= 0.67 {
        1.10
    } else {
        1.0
    }
}

/// Latest month against the monthly pace of the last quarter, for display.
fn acceleration(returns: &PeriodReturns) -> f64 {
    let quarter_monthly = returns.raw(Horizon::ThreeMonths) / 3.0;
    let ratio = match returns.get(Horizon::OneMonth) {
        Some(m1) if quarter_monthly.abs() > 0.001 => m1 / quarter_monthly,
        _ => 1.0,
    };
    ratio.clamp(0.1, 5.0)
}

pub fn momentum(returns: &PeriodReturns) -> MomentumScore {
    let short_momentum = blend(returns, &SHORT_TERM);
    let long_momentum = blend(returns, &LONG_TERM);

    let available: Vec<f64> = returns.available(&Horizon::ALL).map(|(_, v)| v).collect();
    let total_periods = available.len();
    let positive_periods = available.iter().filter(|v| **v > 0.0).count();
    let consistency_bonus = consistency_multiplier(positive_periods, total_periods);

    let combined = short_momentum * SHORT_SHARE + long_momentum * LONG_SHARE;

    MomentumScore {
        short_momentum: round_to(short_momentum, 2),
        long_momentum: round_to(long_momentum, 2),
        acceleration: round_to(acceleration(returns), 2),
        consistency_bonus,
        positive_periods,
        total_periods,
        total: round_to(combined * consistency_bonus, 2),
    }
}

/// How well the allocation matches the regime's target asset mix.
pub fn rotation(allocation: Option<&Allocation>, regime: Regime) -> RotationScore {
    let allocation = match allocation {
        Some(a) if !a.is_empty() => a,
        _ => {
            return RotationScore {
                breakdown: Vec::new(),
                total: 0.0,
                has_data: false,
                detail: Some("No allocation data".to_string()),
            }
        }
    };

    let totals = aggregate(allocation);
    let mut total = 0.0;
    let mut breakdown = Vec::new();

    for (class, pct) in totals.iter() {
        let weight = rotation_weight(regime, class);
        let score = pct * weight;
        total += score;
        if pct > 0.0 {
            breakdown.push(ClassContribution {
                class,
                percentage: round_to(pct, 1),
                weight,
                score: round_to(score, 2),
            });
        }
    }

    RotationScore {
        breakdown,
        total: round_to(total, 2),
        has_data: true,
        detail: None,
    }
}

pub fn risk_return(returns: &PeriodReturns) -> RiskReturnScore {
    let monthly = returns.monthly_normalized(&Horizon::SHORT_AND_ONE_YEAR);
    let avg_return = calculate_average(&monthly);
    let volatility = sample_std_dev(&monthly).unwrap_or(VOLATILITY_FLOOR);

    let sharpe = if volatility > VOLATILITY_FLOOR {
        (avg_return / volatility).clamp(-5.0, 5.0)
    } else {
        0.0
    };

    let raw: Vec<f64> = returns.available(&Horizon::SHORT_AND_ONE_YEAR).map(|(_, v)| v).collect();
    let max_drawdown = match (
        raw.iter().copied().reduce(f64::max),
        raw.iter().copied().reduce(f64::min),
    ) {
        (Some(max), Some(min)) => (max - min) / max.abs().max(1.0),
        _ => 0.0,
    };

    RiskReturnScore {
        avg_return: round_to(avg_return, 2),
        volatility: round_to(volatility, 2),
        sharpe: round_to(sharpe, 2),
        max_drawdown: round_to(max_drawdown, 2),
        total: round_to(sharpe * 10.0 - max_drawdown * 5.0, 2),
    }
}

pub fn consistency(returns: &PeriodReturns) -> ConsistencyScore {
    let monthly = returns.monthly_normalized(&Horizon::SHORT_AND_ONE_YEAR);
    let avg_monthly = calculate_average(&monthly);
    let std_dev = sample_std_dev(&monthly).unwrap_or(0.0);

    // Shortest horizon is the most recent one.
    let trend = match (monthly.first(), monthly.last()) {
        (Some(recent), Some(oldest)) if monthly.len() >= 2 => {
            if recent > oldest {
                1.0
            } else if recent < oldest {
                -0.5
            } else {
                0.0
            }
        }
        _ => 0.0,
    };

    ConsistencyScore {
        std_dev: round_to(std_dev, 2),
        trend,
        avg_monthly: round_to(avg_monthly, 2),
        total: round_to((10.0 - std_dev * 2.0).max(0.0) + trend * 3.0, 2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AllocationEntry;

    fn alloc(items: &[(&str, f64)]) -> Allocation {
        items
            .iter()
            .map(|(label, pct)| (label.to_string(), AllocationEntry { percentage: *pct, color: None }))
            .collect()
    }

    #[test]
    fn test_momentum_counts_only_available_periods() {
        let returns = PeriodReturns::from_raw([3.0, 6.0, 0.0, 12.0, 0.0, 0.0]);
        let score = momentum(&returns);
        assert_eq!(score.total_periods, 3);
        assert_eq!(score.positive_periods, 3);
        assert_eq!(score.consistency_bonus, 1.25);
        // short: (3*0.4 + 6*0.3) / 0.7, long: 12
        assert_eq!(score.short_momentum, 4.29);
        assert_eq!(score.long_momentum, 12.0);
        assert_eq!(score.acceleration, 1.5);
    }

    #[test]
    fn test_momentum_annualizes_long_horizons() {
        let returns = PeriodReturns::from_raw([0.0, 0.0, 0.0, 0.0, 30.0, 50.0]);
        let score = momentum(&returns);
        assert_eq!(score.short_momentum, 0.0);
        // (10*0.3 + 10*0.2) / 0.5
        assert_eq!(score.long_momentum, 10.0);
        assert_eq!(score.total, 5.0);
        assert_eq!(score.acceleration, 1.0);
    }

    #[test]
    fn test_consistency_multiplier_brackets() {
        assert_eq!(consistency_multiplier(0, 0), 1.0);
        assert_eq!(consistency_multiplier(6, 6), 1.25);
        assert_eq!(consistency_multiplier(5, 6), 1.15);
        assert_eq!(consistency_multiplier(2, 3), 1.0);
        assert_eq!(consistency_multiplier(3, 4), 1.10);
        assert_eq!(consistency_multiplier(1, 4), 1.0);
    }

    #[test]
    fn test_missing_horizon_changes_nothing() {
        let a = PeriodReturns::from_raw([2.0, 4.5, 0.0, 20.0, 0.0, 0.0]);
        let mut b = a;
        b.set(Horizon::SixMonths, 0.0);
        assert_eq!(momentum(&a), momentum(&b));
        assert_eq!(risk_return(&a), risk_return(&b));
        assert_eq!(consistency(&a), consistency(&b));

        b.set(Horizon::SixMonths, 9.0);
        assert_ne!(risk_return(&a), risk_return(&b));
    }

    #[test]
    fn test_rotation_uses_regime_weights() {
        let allocation = alloc(&[("Hisse Senedi", 60.0), ("Devlet Tahvili", 30.0), ("Diğer", 10.0)]);
        let score = rotation(Some(&allocation), Regime::RiskOn);
        assert!(score.has_data);
        // 60*0.4 + 30*0.1 + 10*0.3
        assert_eq!(score.total, 30.0);
        assert_eq!(score.breakdown.len(), 3);
        assert_eq!(score.breakdown[0].class, AssetClass::Equity);
        assert_eq!(score.breakdown[0].score, 24.0);
    }

    #[test]
    fn test_rotation_without_allocation() {
        let score = rotation(None, Regime::Defensive);
        assert!(!score.has_data);
        assert_eq!(score.total, 0.0);
        assert!(score.detail.is_some());
        assert!(!rotation(Some(&Allocation::new()), Regime::Defensive).has_data);
    }

    #[test]
    fn test_risk_return_single_point_has_no_sharpe() {
        let returns = PeriodReturns::from_raw([4.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let score = risk_return(&returns);
        assert_eq!(score.volatility, 0.0);
        assert_eq!(score.sharpe, 0.0);
        assert_eq!(score.max_drawdown, 0.0);
        assert_eq!(score.total, 0.0);
    }

    #[test]
    fn test_risk_return_steady_fund() {
        // monthly: 2, 2, 2, 2 -> zero deviation
        let returns = PeriodReturns::from_raw([2.0, 6.0, 12.0, 24.0, 0.0, 0.0]);
        let score = risk_return(&returns);
        assert_eq!(score.avg_return, 2.0);
        assert_eq!(score.sharpe, 0.0);
        // (24 - 2) / 24
        assert_eq!(score.max_drawdown, 0.92);
    }

    #[test]
    fn test_consistency_trend() {
        let accelerating = PeriodReturns::from_raw([3.0, 6.0, 0.0, 12.0, 0.0, 0.0]);
        let score = consistency(&accelerating);
        assert_eq!(score.trend, 1.0);

        let slowing = PeriodReturns::from_raw([0.5, 6.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(consistency(&slowing).trend, -0.5);

        let empty = consistency(&PeriodReturns::default());
        assert_eq!(empty.trend, 0.0);
        assert_eq!(empty.total, 10.0);
    }
}
