// src/services/allocation.rs
use serde::Serialize;

use crate::models::{Allocation, AssetClass, Regime};

/// Keywords per asset class, scanned in this order; first hit wins.
/// Labels are matched as reported by the fund pages.
pub const ASSET_CLASS_KEYWORDS: [(AssetClass, &[&str]); 6] = [
    (AssetClass::Equity, &["Hisse Senedi", "Pay Senedi", "Hisse"]),
    (
        AssetClass::FixedIncome,
        &[
            "Devlet Tahvili",
            "Özel Sektör Tahvili",
            "Borçlanma Araçları",
            "Eurobond",
            "Kamu Borçlanma",
            "Özel Sektör Borçlanma",
            "Kira Sertifikaları",
            "Kamu Kira Sertifika",
        ],
    ),
    (AssetClass::PreciousMetal, &["Kıymetli Madenler", "Altın", "Kıymetli Maden"]),
    (AssetClass::ForeignCurrency, &["Döviz", "YP Cinsinden", "Yabancı Para"]),
    (AssetClass::MoneyMarket, &["Repo", "Ters Repo", "Katılma Hesabı", "Mevduat"]),
    (AssetClass::FundOfFunds, &["Yatırım Fonları", "Borsa Yatırım Fonları", "BYF"]),
];

/// Asset class for a reported label. Unmatched labels land in
/// `FundOfFunds`, the catch-all.
pub fn classify_label(label: &str) -> AssetClass {
    let label = label.to_lowercase();
    ASSET_CLASS_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| label.contains(&k.to_lowercase())))
        .map(|(class, _)| *class)
        .unwrap_or(AssetClass::FundOfFunds)
}

/// Summed percentage per asset class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AssetClassTotals([f64; 6]);

impl AssetClassTotals {
    pub fn get(&self, class: AssetClass) -> f64 {
        self.0[class.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (AssetClass, f64)> + '_ {
        AssetClass::ALL.into_iter().map(move |c| (c, self.get(c)))
    }

    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }
}

pub fn aggregate(allocation: &Allocation) -> AssetClassTotals {
    let mut totals = AssetClassTotals::default();
    for (label, entry) in allocation {
        totals.0[classify_label(label).index()] += entry.percentage;
    }
    totals
}

/// Target weight of an asset class under a regime. Each regime's weights sum to 1.
pub fn rotation_weight(regime: Regime, class: AssetClass) -> f64 {
    use AssetClass::*;
    match (regime, class) {
        (Regime::RiskOn, Equity) => 0.40,
        (Regime::RiskOn, FixedIncome) => 0.10,
        (Regime::RiskOn, PreciousMetal) => 0.10,
        (Regime::RiskOn, ForeignCurrency) => 0.05,
        (Regime::RiskOn, MoneyMarket) => 0.05,
        (Regime::RiskOn, FundOfFunds) => 0.30,

        (Regime::Defensive, Equity) => 0.05,
        (Regime::Defensive, FixedIncome) => 0.30,
        (Regime::Defensive, PreciousMetal) => 0.35,
        (Regime::Defensive, ForeignCurrency) => 0.10,
        (Regime::Defensive, MoneyMarket) => 0.15,
        (Regime::Defensive, FundOfFunds) => 0.05,

        (Regime::Inflation, Equity) => 0.10,
        (Regime::Inflation, FixedIncome) => 0.10,
        (Regime::Inflation, PreciousMetal) => 0.30,
        (Regime::Inflation, ForeignCurrency) => 0.30,
        (Regime::Inflation, MoneyMarket) => 0.05,
        (Regime::Inflation, FundOfFunds) => 0.15,

        (Regime::Neutral, Equity) => 0.20,
        (Regime::Neutral, FixedIncome) => 0.20,
        (Regime::Neutral, PreciousMetal) => 0.20,
        (Regime::Neutral, ForeignCurrency) => 0.10,
        (Regime::Neutral, MoneyMarket) => 0.10,
        (Regime::Neutral, FundOfFunds) => 0.20,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AllocationEntry;

    fn allocation(items: &[(&str, f64)]) -> Allocation {
        items
            .iter()
            .map(|(label, pct)| (label.to_string(), AllocationEntry { percentage: *pct, color: None }))
            .collect()
    }

    #[test]
    fn test_classify_in_table_order() {
        assert_eq!(classify_label("Hisse Senedi"), AssetClass::Equity);
        assert_eq!(classify_label("yabancı hisse"), AssetClass::Equity);
        assert_eq!(classify_label("Kamu Kira Sertifikaları (Döviz)"), AssetClass::FixedIncome);
        assert_eq!(classify_label("Kıymetli Madenler"), AssetClass::PreciousMetal);
        assert_eq!(classify_label("Döviz Ödemeli Bono"), AssetClass::ForeignCurrency);
        assert_eq!(classify_label("Ters-Repo"), AssetClass::MoneyMarket);
        assert_eq!(classify_label("Borsa Yatırım Fonları"), AssetClass::FundOfFunds);
        assert_eq!(classify_label("Vadeli İşlemler Nakit Teminatları"), AssetClass::FundOfFunds);
    }

    #[test]
    fn test_aggregate_keeps_every_weight() {
        let alloc = allocation(&[
            ("Hisse Senedi", 40.0),
            ("Pay Senedi", 10.5),
            ("Devlet Tahvili", 20.0),
            ("Altın", 9.5),
            ("Mevduat", 15.0),
            ("Diğer", 7.0),
        ]);
        let totals = aggregate(&alloc);
        assert_eq!(totals.get(AssetClass::Equity), 50.5);
        assert_eq!(totals.get(AssetClass::FixedIncome), 20.0);
        assert_eq!(totals.get(AssetClass::PreciousMetal), 9.5);
        assert_eq!(totals.get(AssetClass::MoneyMarket), 15.0);
        assert_eq!(totals.get(AssetClass::FundOfFunds), 7.0);

        let raw: f64 = alloc.values().map(|e| e.percentage).sum();
        assert!((totals.total() - raw).abs() < 1e-9);
    }

    #[test]
    fn test_rotation_weights_sum_to_one() {
        for regime in Regime::ALL {
            let sum: f64 = AssetClass::ALL.iter().map(|c| rotation_weight(regime, *c)).sum();
            assert!((sum - 1.0).abs() < 1e-9, "{:?} sums to {}", regime, sum);
        }
    }
}
