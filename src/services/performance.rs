// src/services/performance.rs
use csv::{ReaderBuilder, StringRecord, Trim};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::numeric::safe_float;
use crate::error::{ImportError, ScoreError};
use crate::models::{FundRecord, Horizon, PeriodReturns, TypeRank};

pub const CODE_COLUMN: &str = "Fon Kodu";
pub const NAME_COLUMN: &str = "Fon Adı";
pub const TYPE_COLUMN: &str = "Fon Türü";

pub const WEIGHT_TOTAL: f64 = 10.0;
pub const WEIGHT_TOLERANCE: f64 = 0.01;

/// Imported performance dataset, one record per fund, in display order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FundTable {
    records: Vec<FundRecord>,
}

impl FundTable {
    pub fn from_records(records: Vec<FundRecord>) -> Self {
        FundTable { records }
    }

    pub fn get(&self, code: &str) -> Option<&FundRecord> {
        let code = code.trim();
        self.records.iter().find(|r| r.code.trim() == code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FundRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn codes(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|r| r.code.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    }
}

fn column_index(headers: &StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
}

/// Read a performance dataset. All fund columns and the six horizon
/// columns must be present; unparseable cells read as "no data".
pub fn import_csv<R: Read>(reader: R) -> Result<FundTable, ImportError> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();

    let mut missing = Vec::new();
    let mut lookup = |name: &str| {
        let idx = column_index(&headers, name);
        if idx.is_none() {
            missing.push(name.to_string());
        }
        idx
    };
    let code_idx = lookup(CODE_COLUMN);
    let name_idx = lookup(NAME_COLUMN);
    let type_idx = lookup(TYPE_COLUMN);
    let horizon_idx: Vec<Option<usize>> = Horizon::ALL.iter().map(|h| lookup(h.column())).collect();

    let (Some(code_idx), Some(name_idx), Some(type_idx)) = (code_idx, name_idx, type_idx) else {
        return Err(ImportError::MissingColumns(missing));
    };
    if !missing.is_empty() {
        return Err(ImportError::MissingColumns(missing));
    }

    let mut records = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping unreadable row {}: {}", row + 1, e);
                continue;
            }
        };
        let cell = |idx: usize| record.get(idx).unwrap_or("").to_string();

        let mut returns = PeriodReturns::default();
        for (horizon, idx) in Horizon::ALL.iter().zip(&horizon_idx) {
            let value = idx.and_then(|i| record.get(i)).map(safe_float).unwrap_or(0.0);
            returns.set(*horizon, value);
        }

        records.push(FundRecord::new(cell(code_idx), cell(name_idx), cell(type_idx), returns));
    }

    info!("Imported {} funds", records.len());
    Ok(FundTable::from_records(records))
}

pub fn import_path(path: impl AsRef<Path>) -> Result<FundTable, ImportError> {
    let path = path.as_ref();
    info!("Loading performance data from {}", path.display());
    import_csv(File::open(path)?)
}

/// Weight per enabled horizon. Enabled weights must add up to 10.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HorizonWeights(HashMap<Horizon, f64>);

impl HorizonWeights {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, horizon: Horizon, weight: f64) -> Self {
        self.0.insert(horizon, weight);
        self
    }

    /// Spread the total evenly over `horizons`.
    pub fn equal(horizons: &[Horizon]) -> Self {
        let share = if horizons.is_empty() { 0.0 } else { WEIGHT_TOTAL / horizons.len() as f64 };
        HorizonWeights(horizons.iter().map(|h| (*h, share)).collect())
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    pub fn validate(&self) -> Result<(), ScoreError> {
        let total = self.total();
        if (total - WEIGHT_TOTAL).abs() > WEIGHT_TOLERANCE {
            return Err(ScoreError::WeightSum(total));
        }
        Ok(())
    }

    /// Monthly-normalized weighted return. Missing horizons contribute 0.
    pub fn score(&self, returns: &PeriodReturns) -> f64 {
        Horizon::ALL
            .iter()
            .filter_map(|h| self.0.get(h).map(|w| returns.raw(*h) / h.months() * (w / WEIGHT_TOTAL)))
            .sum()
    }
}

/// Score every fund, rank it within its type and sort the table by score.
pub fn score_funds(table: &mut FundTable, weights: &HorizonWeights) -> Result<(), ScoreError> {
    if table.is_empty() {
        return Err(ScoreError::NoFunds);
    }
    weights.validate()?;

    for record in table.records.iter_mut() {
        record.score = Some(weights.score(&record.returns));
    }

    let mut by_type: HashMap<&str, Vec<f64>> = HashMap::new();
    for record in &table.records {
        by_type
            .entry(record.fund_type.as_str())
            .or_default()
            .push(record.score.unwrap_or(0.0));
    }

    // "min" ranking: equal scores share the best rank
    let ranks: Vec<TypeRank> = table
        .records
        .iter()
        .map(|record| {
            let score = record.score.unwrap_or(0.0);
            let peers = by_type.get(record.fund_type.as_str()).map(Vec::as_slice).unwrap_or(&[]);
            TypeRank {
                rank: 1 + peers.iter().filter(|s| **s > score).count(),
                of: peers.len(),
            }
        })
        .collect();
    for (record, rank) in table.records.iter_mut().zip(ranks) {
        record.type_rank = Some(rank);
    }

    table
        .records
        .sort_by(|a, b| b.score.unwrap_or(0.0).total_cmp(&a.score.unwrap_or(0.0)));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "\u{feff}Fon Kodu,Fon Adı,Fon Türü,1 Ay (%),3 Ay (%),6 Ay (%),1 Yıl (%),3 Yıl (%),5 Yıl (%)\n";

    fn table(rows: &str) -> FundTable {
        import_csv(format!("{}{}", HEADER, rows).as_bytes()).unwrap()
    }

    #[test]
    fn test_import_parses_locale_numbers() {
        let t = table("AFA,Alpha Fund,Hisse,\"3,5\",6%,,abc,12.0,0\n");
        assert_eq!(t.len(), 1);
        let fund = t.get("AFA").unwrap();
        assert_eq!(fund.name, "Alpha Fund");
        assert_eq!(fund.returns.get(Horizon::OneMonth), Some(3.5));
        assert_eq!(fund.returns.get(Horizon::ThreeMonths), Some(6.0));
        assert_eq!(fund.returns.get(Horizon::SixMonths), None);
        assert_eq!(fund.returns.get(Horizon::OneYear), None);
        assert_eq!(fund.returns.get(Horizon::ThreeYears), Some(12.0));
        assert_eq!(fund.returns.get(Horizon::FiveYears), None);
    }

    #[test]
    fn test_import_reports_missing_columns() {
        let err = import_csv("Fon Kodu,Fon Adı,1 Ay (%)\nAFA,Alpha,1\n".as_bytes()).unwrap_err();
        match err {
            ImportError::MissingColumns(cols) => {
                assert!(cols.contains(&TYPE_COLUMN.to_string()));
                assert!(cols.contains(&"5 Yıl (%)".to_string()));
                assert!(!cols.contains(&CODE_COLUMN.to_string()));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_weights_must_sum_to_ten() {
        let weights = HorizonWeights::new().with(Horizon::OneMonth, 5.0).with(Horizon::OneYear, 4.0);
        assert_eq!(weights.validate(), Err(ScoreError::WeightSum(9.0)));
        assert!(HorizonWeights::equal(&Horizon::ALL).validate().is_ok());
        assert!(HorizonWeights::equal(&Horizon::SHORT_AND_ONE_YEAR[..3]).validate().is_ok());
    }

    #[test]
    fn test_score_funds_ranks_within_type() {
        let mut t = table(
            "AAA,A,Hisse,2,0,0,0,0,0\n\
             BBB,B,Borç,1,0,0,0,0,0\n\
             CCC,C,Hisse,4,0,0,0,0,0\n\
             DDD,D,Hisse,2,0,0,0,0,0\n",
        );
        let weights = HorizonWeights::new().with(Horizon::OneMonth, 10.0);
        score_funds(&mut t, &weights).unwrap();

        let order: Vec<&str> = t.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(order, vec!["CCC", "AAA", "DDD", "BBB"]);

        assert_eq!(t.get("CCC").unwrap().type_rank, Some(TypeRank { rank: 1, of: 3 }));
        assert_eq!(t.get("AAA").unwrap().type_rank, Some(TypeRank { rank: 2, of: 3 }));
        assert_eq!(t.get("DDD").unwrap().type_rank, Some(TypeRank { rank: 2, of: 3 }));
        assert_eq!(t.get("BBB").unwrap().type_rank, Some(TypeRank { rank: 1, of: 1 }));
    }

    #[test]
    fn test_score_normalizes_by_months() {
        let returns = PeriodReturns::from_raw([3.0, 9.0, 0.0, 24.0, 0.0, 0.0]);
        let weights = HorizonWeights::new()
            .with(Horizon::OneMonth, 5.0)
            .with(Horizon::ThreeMonths, 2.5)
            .with(Horizon::OneYear, 2.5);
        // 3*0.5 + 3*0.25 + 2*0.25
        assert!((weights.score(&returns) - 2.75).abs() < 1e-9);
    }

    #[test]
    fn test_score_empty_table() {
        let mut t = FundTable::default();
        assert_eq!(score_funds(&mut t, &HorizonWeights::equal(&Horizon::ALL)), Err(ScoreError::NoFunds));
    }
}
