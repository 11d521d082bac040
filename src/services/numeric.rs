// src/services/numeric.rs

/// Parse a locale-formatted percentage ("12,5", "3.4%", " -1,2 % ").
/// Anything that is not a number becomes 0.0.
pub fn safe_float(raw: &str) -> f64 {
    let cleaned = raw.trim().replace(',', ".").replace('%', "");
    match cleaned.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

/// Map `value` from `[min, max]` onto `[0, 100]`, clamping outside the range.
pub fn normalize(value: f64, min: f64, max: f64) -> f64 {
    if max == min {
        return 50.0;
    }
    ((value - min) / (max - min) * 100.0).clamp(0.0, 100.0)
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

pub fn calculate_average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Sample standard deviation (n - 1 divisor). Needs at least two points.
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = calculate_average(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Percentage change from `start` to `end`.
pub fn pct_change(start: f64, end: f64) -> f64 {
    (end - start) / start * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_float_locale_formats() {
        assert_eq!(safe_float("12,5"), 12.5);
        assert_eq!(safe_float("3.4%"), 3.4);
        assert_eq!(safe_float(" -1,25 % "), -1.25);
        assert_eq!(safe_float(""), 0.0);
        assert_eq!(safe_float("N/A"), 0.0);
        assert_eq!(safe_float("NaN"), 0.0);
    }

    #[test]
    fn test_normalize_clamps() {
        assert_eq!(normalize(25.0, -50.0, 100.0), 50.0);
        assert_eq!(normalize(-80.0, -50.0, 100.0), 0.0);
        assert_eq!(normalize(140.0, 0.0, 40.0), 100.0);
        assert_eq!(normalize(3.0, 1.0, 1.0), 50.0);
    }

    #[test]
    fn test_sample_std_dev() {
        assert_eq!(sample_std_dev(&[4.0]), None);
        let sd = sample_std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((sd - 2.138).abs() < 0.001);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.23456, 2), 1.23);
        assert_eq!(round_to(-0.06, 1), -0.1);
    }
}
