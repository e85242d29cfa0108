//! Z-score scaling with statistics frozen at training time

use crate::errors::{ChurnError, Result};
use serde::{Deserialize, Serialize};

/// Mean and population standard deviation of one numeric field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleStat {
    pub field: String,
    pub mean: f64,
    pub std: f64,
}

impl ScaleStat {
    /// Standardize a value; a zero spread leaves the centered value unscaled
    pub fn apply(&self, value: f64) -> f64 {
        let centered = value - self.mean;
        if self.std > 1e-12 {
            centered / self.std
        } else {
            centered
        }
    }
}

/// Standard scaler over a fixed set of fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericScaler {
    stats: Option<Vec<ScaleStat>>,
}

impl NumericScaler {
    /// Create an unfitted scaler
    pub fn new() -> Self {
        Self { stats: None }
    }

    /// Fit statistics; `columns[i]` holds every sample of `fields[i]`
    pub fn fit(fields: &[&str], columns: &[Vec<f64>]) -> Result<Self> {
        let mut stats = Vec::with_capacity(fields.len());

        for (field, values) in fields.iter().zip(columns) {
            if values.is_empty() {
                return Err(ChurnError::Training(format!(
                    "cannot fit scaler for `{field}` with zero samples"
                )));
            }
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            stats.push(ScaleStat {
                field: field.to_string(),
                mean,
                std: variance.sqrt(),
            });
        }

        Ok(Self { stats: Some(stats) })
    }

    pub fn is_fitted(&self) -> bool {
        self.stats.is_some()
    }

    pub fn stats(&self) -> Result<&[ScaleStat]> {
        self.stats.as_deref().ok_or(ChurnError::EncoderNotFitted)
    }

    /// Statistics for one field, if it is scaled
    pub fn stat(&self, field: &str) -> Result<Option<&ScaleStat>> {
        Ok(self.stats()?.iter().find(|s| s.field == field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_population_std() {
        let scaler = NumericScaler::fit(&["tenure"], &[vec![1.0, 2.0, 3.0, 4.0]]).unwrap();
        let stat = scaler.stat("tenure").unwrap().unwrap();
        assert_eq!(stat.mean, 2.5);
        assert!((stat.std - 1.118_033_988_749_895).abs() < 1e-12);
        assert!((stat.apply(2.5)).abs() < 1e-12);
        assert!((stat.apply(4.0) - 1.341_640_786_499_874).abs() < 1e-12);
    }

    #[test]
    fn test_constant_column_is_only_centered() {
        let scaler = NumericScaler::fit(&["TotalCharges"], &[vec![5.0, 5.0]]).unwrap();
        let stat = scaler.stat("TotalCharges").unwrap().unwrap();
        assert_eq!(stat.std, 0.0);
        assert_eq!(stat.apply(7.0), 2.0);
    }

    #[test]
    fn test_single_row_inference_uses_frozen_stats() {
        let scaler =
            NumericScaler::fit(&["MonthlyCharges"], &[vec![20.0, 60.0, 100.0]]).unwrap();
        let stat = scaler.stat("MonthlyCharges").unwrap().unwrap();
        let value = stat.apply(95.5);
        assert!(value.is_finite());
        assert!(value > 1.0);
    }

    #[test]
    fn test_unfitted_and_empty() {
        assert!(matches!(
            NumericScaler::new().stats(),
            Err(ChurnError::EncoderNotFitted)
        ));
        assert!(matches!(
            NumericScaler::fit(&["tenure"], &[vec![]]),
            Err(ChurnError::Training(_))
        ));
        let scaler = NumericScaler::fit(&["tenure"], &[vec![1.0]]).unwrap();
        assert!(scaler.stat("gender").unwrap().is_none());
    }
}
