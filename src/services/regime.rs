// src/services/regime.rs
use log::{debug, info};
use serde::Serialize;

use crate::models::{MacroSnapshot, Regime};

/// Which snapshot entries feed the classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct RegimeIndicators {
    pub equity: String,
    pub metal: String,
    pub fx: String,
}

impl Default for RegimeIndicators {
    fn default() -> Self {
        RegimeIndicators {
            equity: "BIST-100".to_string(),
            metal: "Gold".to_string(),
            fx: "USD/TRY".to_string(),
        }
    }
}

/// Monthly and daily change of the three indicators; missing reads as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RegimeSignals {
    pub equity_monthly: f64,
    pub metal_monthly: f64,
    pub fx_monthly: f64,
    pub equity_daily: f64,
    pub metal_daily: f64,
    pub fx_daily: f64,
}

impl RegimeSignals {
    pub fn from_snapshot(snapshot: &MacroSnapshot, indicators: &RegimeIndicators) -> Self {
        let monthly = |name: &str| snapshot.get(name).and_then(|q| q.monthly).unwrap_or(0.0);
        let daily = |name: &str| snapshot.get(name).map(|q| q.daily).unwrap_or(0.0);

        RegimeSignals {
            equity_monthly: monthly(&indicators.equity),
            metal_monthly: monthly(&indicators.metal),
            fx_monthly: monthly(&indicators.fx),
            equity_daily: daily(&indicators.equity),
            metal_daily: daily(&indicators.metal),
            fx_daily: daily(&indicators.fx),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegimeScores {
    pub risk_on: i32,
    pub defensive: i32,
    pub inflation: i32,
}

impl RegimeScores {
    pub fn max(&self) -> i32 {
        self.risk_on.max(self.defensive).max(self.inflation)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegimeDetail {
    #[serde(flatten)]
    pub signals: RegimeSignals,
    pub scores: RegimeScores,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegimeDetection {
    pub regime: Regime,
    pub detail: RegimeDetail,
}

pub fn score_signals(s: &RegimeSignals) -> RegimeScores {
    let mut scores = RegimeScores::default();

    if s.equity_monthly > 5.0 {
        scores.risk_on += 3;
    } else if s.equity_monthly > 2.0 {
        scores.risk_on += 2;
    } else if s.equity_monthly > 0.0 {
        scores.risk_on += 1;
    } else if s.equity_monthly < -5.0 {
        scores.defensive += 3;
    } else if s.equity_monthly < -2.0 {
        scores.defensive += 2;
    } else if s.equity_monthly < 0.0 {
        scores.defensive += 1;
    }

    if s.metal_monthly > 5.0 {
        scores.defensive += 2;
        scores.inflation += 1;
    } else if s.metal_monthly > 2.0 {
        scores.defensive += 1;
    }

    if s.fx_monthly > 5.0 {
        scores.inflation += 3;
    } else if s.fx_monthly > 3.0 {
        scores.inflation += 2;
    } else if s.fx_monthly > 1.0 {
        scores.inflation += 1;
    }

    // Daily momentum bonus
    if s.equity_daily > 1.0 {
        scores.risk_on += 1;
    }
    if s.metal_daily > 1.0 {
        scores.defensive += 1;
    }
    if s.fx_daily > 0.5 {
        scores.inflation += 1;
    }

    scores
}

/// Neutral unless some candidate scores above 1; ties go to the earlier
/// candidate (risk-on, defensive, inflation).
pub fn pick_regime(scores: &RegimeScores) -> Regime {
    if scores.max() <= 1 {
        return Regime::Neutral;
    }
    let candidates = [
        (Regime::RiskOn, scores.risk_on),
        (Regime::Defensive, scores.defensive),
        (Regime::Inflation, scores.inflation),
    ];
    let mut best = candidates[0];
    for candidate in &candidates[1..] {
        if candidate.1 > best.1 {
            best = *candidate;
        }
    }
    best.0
}

/// Classify the macro snapshot. Pure: same snapshot, same answer.
pub fn classify(snapshot: &MacroSnapshot, indicators: &RegimeIndicators) -> RegimeDetection {
    if snapshot.is_empty() {
        return RegimeDetection {
            regime: Regime::Neutral,
            detail: RegimeDetail {
                signals: RegimeSignals::default(),
                scores: RegimeScores::default(),
                reason: Some("No macro data".to_string()),
            },
        };
    }

    let signals = RegimeSignals::from_snapshot(snapshot, indicators);
    let scores = score_signals(&signals);
    let regime = pick_regime(&scores);
    debug!("Regime scores {:?} -> {:?}", scores, regime);

    RegimeDetection {
        regime,
        detail: RegimeDetail {
            signals,
            scores,
            reason: None,
        },
    }
}

/// Holds the last detected regime so scorers can be run without fresh
/// macro data. Passed explicitly to whoever needs it.
#[derive(Debug, Clone, Default)]
pub struct RegimeContext {
    indicators: RegimeIndicators,
    last: Option<RegimeDetection>,
}

impl RegimeContext {
    pub fn new(indicators: RegimeIndicators) -> Self {
        RegimeContext { indicators, last: None }
    }

    pub fn detect(&mut self, snapshot: &MacroSnapshot) -> &RegimeDetection {
        let detection = classify(snapshot, &self.indicators);
        if self.current() != detection.regime {
            info!("Market regime changed: {} -> {}", self.current().label(), detection.regime.label());
        }
        self.last.insert(detection)
    }

    pub fn current(&self) -> Regime {
        self.last.as_ref().map(|d| d.regime).unwrap_or_default()
    }

    pub fn last_detection(&self) -> Option<&RegimeDetection> {
        self.last.as_ref()
    }
}

impl Regime {
    pub fn label(self) -> &'static str {
        match self {
            Regime::RiskOn => "Risk-On",
            Regime::Defensive => "Defensive",
            Regime::Inflation => "Inflation Hedge",
            Regime::Neutral => "Neutral",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Regime::RiskOn => "Equity-heavy funds stand out",
            Regime::Defensive => "Gold and bond funds stand out",
            Regime::Inflation => "FX and gold funds stand out",
            Regime::Neutral => "A balanced allocation is preferred",
        }
    }

    /// Why the regime was chosen and what it does to the composite weights.
    pub fn explanation(self) -> &'static str {
        match self {
            Regime::RiskOn => {
                "The equity index is trending up while the currency is stable.\n\
                 Equity-heavy funds are favoured.\n\
                 Momentum weight raised to 40%."
            }
            Regime::Defensive => {
                "The equity index is falling or gold is rising.\n\
                 Gold and bond funds are favoured.\n\
                 Asset rotation weight raised to 40%."
            }
            Regime::Inflation => {
                "The local currency is weakening quickly.\n\
                 FX and gold funds are favoured.\n\
                 Asset rotation weight raised to 35%."
            }
            Regime::Neutral => {
                "No clear market direction.\n\
                 Funds are judged on a balanced allocation.\n\
                 All components are weighted evenly."
            }
        }
    }
}
