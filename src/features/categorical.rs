//! One-hot encoder for multi-valued categorical fields

use crate::errors::{ChurnError, Result};
use crate::types::RawRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Categories observed for one field at fit time, sorted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryField {
    pub name: String,
    pub categories: Vec<String>,
}

impl CategoryField {
    fn column_name(&self, category: &str) -> String {
        format!("{}_{}", self.name, category)
    }
}

/// Frozen one-hot encoder.
///
/// Unknown categories at transform time produce all-zero indicator columns
/// for their field instead of an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoricalEncoder {
    fields: Option<Vec<CategoryField>>,
}

impl CategoricalEncoder {
    /// Create an unfitted encoder
    pub fn new() -> Self {
        Self { fields: None }
    }

    /// Fit category lists for `field_names` from the given records
    pub fn fit(field_names: &[String], records: &[RawRecord]) -> Result<Self> {
        let mut fields = Vec::with_capacity(field_names.len());

        for name in field_names {
            let mut categories = BTreeSet::new();
            for record in records {
                categories.insert(record.require_text(name)?.to_string());
            }
            debug!(field = %name, categories = categories.len(), "Fitted categorical field");
            fields.push(CategoryField {
                name: name.clone(),
                categories: categories.into_iter().collect(),
            });
        }

        Ok(Self {
            fields: Some(fields),
        })
    }

    pub fn is_fitted(&self) -> bool {
        self.fields.is_some()
    }

    /// Fitted fields
    pub fn fields(&self) -> Result<&[CategoryField]> {
        self.fields.as_deref().ok_or(ChurnError::EncoderNotFitted)
    }

    /// Output column names, `<field>_<category>` in fit order
    pub fn output_columns(&self) -> Result<Vec<String>> {
        Ok(self
            .fields()?
            .iter()
            .flat_map(|f| f.categories.iter().map(move |c| f.column_name(c)))
            .collect())
    }

    /// Number of indicator columns produced per record
    pub fn width(&self) -> Result<usize> {
        Ok(self.fields()?.iter().map(|f| f.categories.len()).sum())
    }

    /// Append the indicator columns for `record` to `out`
    pub fn transform_into(&self, record: &RawRecord, out: &mut Vec<f64>) -> Result<()> {
        for field in self.fields()? {
            let value = record.require_text(&field.name)?;
            let position = field.categories.iter().position(|c| c == value);
            if position.is_none() {
                debug!(field = %field.name, value = %value, "Unknown category, emitting zero indicators");
            }
            out.extend((0..field.categories.len()).map(|i| {
                if Some(i) == position {
                    1.0
                } else {
                    0.0
                }
            }));
        }
        Ok(())
    }
}
