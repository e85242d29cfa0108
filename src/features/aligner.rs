//! Reindexing encoded rows to the column list the model was trained on

use super::EncodedRow;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Ordered feature columns recorded at training time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrainingColumns {
    columns: Vec<String>,
}

/// Difference between a column list and what an encoder produces
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnDiff {
    /// Expected by the model but not produced
    pub missing: Vec<String>,
    /// Produced but unknown to the model
    pub extra: Vec<String>,
}

impl ColumnDiff {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty()
    }
}

impl TrainingColumns {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Compare against another ordered column list
    pub fn diff(&self, produced: &[String]) -> ColumnDiff {
        let expected: HashSet<&str> = self.columns.iter().map(String::as_str).collect();
        let produced_set: HashSet<&str> = produced.iter().map(String::as_str).collect();

        ColumnDiff {
            missing: self
                .columns
                .iter()
                .filter(|c| !produced_set.contains(c.as_str()))
                .cloned()
                .collect(),
            extra: produced
                .iter()
                .filter(|c| !expected.contains(c.as_str()))
                .cloned()
                .collect(),
        }
    }

    /// Reindex rows to these columns: missing columns become 0.0 and
    /// unknown ones are dropped
    pub fn align(&self, encoded: &[EncodedRow]) -> Vec<EncodedRow> {
        let target: Arc<[String]> = self.columns.clone().into();
        let mut positions: Option<(Arc<[String]>, Vec<Option<usize>>)> = None;

        encoded
            .iter()
            .map(|row| {
                // Rows of one batch share their column list; map it once
                let reuse = matches!(&positions, Some((cols, _)) if Arc::ptr_eq(cols, row.shared_columns()));
                if !reuse {
                    let index: HashMap<&str, usize> = row
                        .columns()
                        .iter()
                        .enumerate()
                        .map(|(i, c)| (c.as_str(), i))
                        .collect();
                    let mapping = self
                        .columns
                        .iter()
                        .map(|c| index.get(c.as_str()).copied())
                        .collect();
                    positions = Some((Arc::clone(row.shared_columns()), mapping));
                }

                let values = match &positions {
                    Some((_, mapping)) => mapping
                        .iter()
                        .map(|i| i.map_or(0.0, |i| row.values()[i]))
                        .collect(),
                    None => vec![0.0; target.len()],
                };
                EncodedRow::new(Arc::clone(&target), values)
            })
            .collect()
    }
}

impl From<Vec<String>> for TrainingColumns {
    fn from(columns: Vec<String>) -> Self {
        Self::new(columns)
    }
}

/// Free-function form of [`TrainingColumns::align`]
pub fn align(encoded: &[EncodedRow], columns: &TrainingColumns) -> Vec<EncodedRow> {
    columns.align(encoded)
}

/// True when a non-empty aligned batch carries nothing but zeros
pub fn batch_is_all_zero(rows: &[EncodedRow]) -> bool {
    !rows.is_empty() && rows.iter().all(EncodedRow::is_all_zero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn row(columns: &[&str], values: &[f64]) -> EncodedRow {
        let columns: Arc<[String]> = columns.iter().map(|c| c.to_string()).collect();
        EncodedRow::new(columns, values.to_vec())
    }

    fn training() -> TrainingColumns {
        TrainingColumns::new(vec!["a".into(), "b".into(), "c".into()])
    }

    #[test]
    fn test_align_reorders_fills_and_drops() {
        let rows = vec![row(&["c", "z", "a"], &[3.0, 9.0, 1.0])];
        let aligned = training().align(&rows);

        assert_eq!(aligned.len(), 1);
        assert_eq!(aligned[0].columns(), &["a", "b", "c"]);
        assert_eq!(aligned[0].values(), &[1.0, 0.0, 3.0]);
    }

    #[test]
    fn test_align_mixed_column_lists() {
        let rows = vec![
            row(&["a", "b"], &[1.0, 2.0]),
            row(&["c"], &[5.0]),
            row(&["a", "b"], &[3.0, 4.0]),
        ];
        let aligned = align(&rows, &training());

        assert_eq!(aligned[0].values(), &[1.0, 2.0, 0.0]);
        assert_eq!(aligned[1].values(), &[0.0, 0.0, 5.0]);
        assert_eq!(aligned[2].values(), &[3.0, 4.0, 0.0]);
    }

    #[test]
    fn test_all_zero_detection() {
        let disjoint = training().align(&[row(&["x", "y"], &[1.0, 2.0])]);
        assert!(batch_is_all_zero(&disjoint));

        let overlapping = training().align(&[row(&["b"], &[0.5])]);
        assert!(!batch_is_all_zero(&overlapping));
        assert!(!batch_is_all_zero(&[]));
    }

    #[test]
    fn test_diff() {
        let produced = vec!["a".to_string(), "c".to_string(), "d".to_string()];
        let diff = training().diff(&produced);
        assert_eq!(diff.missing, vec!["b"]);
        assert_eq!(diff.extra, vec!["d"]);
        assert!(!diff.is_empty());

        let same: Vec<String> = training().columns().to_vec();
        assert!(training().diff(&same).is_empty());
    }

    #[test]
    fn test_serializes_as_plain_list() {
        let json = serde_json::to_string(&training()).unwrap();
        assert_eq!(json, r#"["a","b","c"]"#);
    }

    proptest! {
        #[test]
        fn aligned_rows_match_training_columns(
            training_cols in proptest::collection::btree_set("[a-e]{1,2}", 0..12),
            row_cols in proptest::collection::btree_map("[a-f]{1,2}", -10.0f64..10.0, 0..12),
            batch in 1usize..4,
        ) {
            let columns = TrainingColumns::new(training_cols.iter().cloned().collect());
            let names: Vec<&str> = row_cols.keys().map(String::as_str).collect();
            let values: Vec<f64> = row_cols.values().copied().collect();
            let rows = vec![row(&names, &values); batch];

            let aligned = columns.align(&rows);
            prop_assert_eq!(aligned.len(), batch);
            for out in &aligned {
                prop_assert_eq!(out.columns(), columns.columns());
                for (name, value) in out.columns().iter().zip(out.values()) {
                    let expected = row_cols.get(name).copied().unwrap_or(0.0);
                    prop_assert_eq!(*value, expected);
                }
            }
        }
    }
}
