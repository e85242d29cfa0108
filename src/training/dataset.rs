//! Raw churn dataset ingestion and overview

use crate::errors::{ChurnError, Result};
use crate::types::record::parse_yes_no;
use crate::types::{FieldValue, RawRecord};
use serde::Serialize;
use std::fmt;
use std::io;
use std::path::Path;
use tracing::info;

/// Labelled customer records loaded from CSV
#[derive(Debug, Clone)]
pub struct Dataset {
    /// CSV header, target column included
    pub headers: Vec<String>,
    /// Records without the target column
    pub records: Vec<RawRecord>,
    /// 1 for churned customers
    pub labels: Vec<u8>,
}

impl Dataset {
    /// Load a CSV file; every cell is kept as text
    pub fn from_csv(path: impl AsRef<Path>, target_column: &str) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ChurnError::Dataset(format!(
                "raw data not found at {}",
                path.display()
            )));
        }
        let file = std::fs::File::open(path)?;
        let dataset = Self::from_reader(file, target_column)?;

        info!(
            path = %path.display(),
            rows = dataset.len(),
            columns = dataset.headers.len(),
            positive_rate = dataset.positive_rate(),
            "Loaded dataset"
        );
        Ok(dataset)
    }

    pub fn from_reader<R: io::Read>(reader: R, target_column: &str) -> Result<Self> {
        let mut csv = csv::Reader::from_reader(reader);
        let headers: Vec<String> = csv.headers()?.iter().map(str::to_string).collect();
        let target = headers
            .iter()
            .position(|h| h == target_column)
            .ok_or_else(|| {
                ChurnError::Dataset(format!("target column `{target_column}` not in header"))
            })?;

        let mut records = Vec::new();
        let mut labels = Vec::new();
        for (line, row) in csv.records().enumerate() {
            let row = row?;
            let mut record = RawRecord::new();
            for (i, (name, cell)) in headers.iter().zip(row.iter()).enumerate() {
                if i == target {
                    let label = parse_yes_no(name, &FieldValue::from(cell)).map_err(|e| {
                        ChurnError::Dataset(format!("row {}: {e}", line + 1))
                    })?;
                    labels.push(label as u8);
                } else {
                    record.insert(name.as_str(), cell);
                }
            }
            records.push(record);
        }

        if records.is_empty() {
            return Err(ChurnError::Dataset("dataset has no rows".to_string()));
        }

        Ok(Self {
            headers,
            records,
            labels,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Fraction of churned customers
    pub fn positive_rate(&self) -> f64 {
        if self.labels.is_empty() {
            return 0.0;
        }
        self.labels.iter().map(|&l| f64::from(l)).sum::<f64>() / self.labels.len() as f64
    }

    /// Records and labels at `indices`
    pub fn subset(&self, indices: &[usize]) -> (Vec<RawRecord>, Vec<u8>) {
        indices
            .iter()
            .map(|&i| (self.records[i].clone(), self.labels[i]))
            .unzip()
    }
}

/// Inferred storage type of a CSV column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Float,
    Text,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Integer => write!(f, "int64"),
            ColumnType::Float => write!(f, "float64"),
            ColumnType::Text => write!(f, "object"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub dtype: ColumnType,
    /// Empty cells
    pub missing: usize,
}

/// Shape, column types and missing counts of a raw CSV
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetOverview {
    pub rows: usize,
    pub columns: Vec<ColumnSummary>,
}

impl DatasetOverview {
    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ChurnError::Dataset(format!(
                "raw data not found at {}",
                path.display()
            )));
        }
        Self::from_reader(std::fs::File::open(path)?)
    }

    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self> {
        let mut csv = csv::Reader::from_reader(reader);
        let headers: Vec<String> = csv.headers()?.iter().map(str::to_string).collect();

        let mut missing = vec![0usize; headers.len()];
        let mut all_int = vec![true; headers.len()];
        let mut all_float = vec![true; headers.len()];
        let mut rows = 0;

        for row in csv.records() {
            let row = row?;
            rows += 1;
            for (i, cell) in row.iter().enumerate().take(headers.len()) {
                if cell.is_empty() {
                    missing[i] += 1;
                    continue;
                }
                all_int[i] &= cell.parse::<i64>().is_ok();
                all_float[i] &= cell.parse::<f64>().is_ok();
            }
        }

        let columns = headers
            .into_iter()
            .enumerate()
            .map(|(i, name)| {
                // Missing cells force a float column, as with NaN
                let dtype = if all_int[i] && missing[i] == 0 {
                    ColumnType::Integer
                } else if all_float[i] {
                    ColumnType::Float
                } else {
                    ColumnType::Text
                };
                ColumnSummary {
                    name,
                    dtype,
                    missing: missing[i],
                }
            })
            .collect();

        Ok(Self { rows, columns })
    }
}

impl fmt::Display for DatasetOverview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Shape ===")?;
        writeln!(f, "({}, {})", self.rows, self.columns.len())?;

        writeln!(f, "\n=== Dtypes ===")?;
        let width = self.columns.iter().map(|c| c.name.len()).max().unwrap_or(0);
        for column in &self.columns {
            writeln!(f, "{:<width$}  {}", column.name, column.dtype)?;
        }

        writeln!(f, "\n=== Missing Values ===")?;
        let mut by_missing: Vec<&ColumnSummary> = self.columns.iter().collect();
        by_missing.sort_by(|a, b| b.missing.cmp(&a.missing));
        for column in by_missing.into_iter().take(20) {
            writeln!(f, "{:<width$}  {}", column.name, column.missing)?;
        }
        Ok(())
    }
}
