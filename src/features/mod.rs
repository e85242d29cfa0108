//! Feature encoding for churn model inference.
//!
//! Turns raw customer records into the numeric rows the classifier was
//! trained on. Everything that depends on training data (category lists,
//! scaling statistics, the field classification itself) lives in the frozen
//! [`FeatureEncoder`] artifact, so a batch of one record encodes exactly
//! like the same record inside a training batch.

pub mod aligner;
pub mod categorical;
pub mod scaler;

pub use aligner::{align, batch_is_all_zero, ColumnDiff, TrainingColumns};
pub use categorical::{CategoricalEncoder, CategoryField};
pub use scaler::{NumericScaler, ScaleStat};

use crate::errors::{ChurnError, Result};
use crate::schema::{FieldKind, FieldLayout, NumericRule, SCALED_FIELDS};
use crate::types::record::{
    coerce_total_charges, parse_amount, parse_count, parse_gender, parse_yes_no,
};
use crate::types::{FieldValue, RawRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A numeric feature row: shared ordered column names plus one value each
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedRow {
    columns: Arc<[String]>,
    values: Vec<f64>,
}

impl EncodedRow {
    pub fn new(columns: Arc<[String]>, values: Vec<f64>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub(crate) fn shared_columns(&self) -> &Arc<[String]> {
        &self.columns
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of a named column
    pub fn get(&self, column: &str) -> Option<f64> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.values[i])
    }

    pub fn is_all_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }
}

/// Frozen encoder artifact: field layout, one-hot encoder and scaler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    layout: FieldLayout,
    categorical: CategoricalEncoder,
    scaler: NumericScaler,
}

impl FeatureEncoder {
    /// Encoder with the registry layout whose encoder and scaler are not fitted
    pub fn unfitted() -> Self {
        Self {
            layout: FieldLayout::from_registry(),
            categorical: CategoricalEncoder::new(),
            scaler: NumericScaler::new(),
        }
    }

    pub fn from_parts(
        layout: FieldLayout,
        categorical: CategoricalEncoder,
        scaler: NumericScaler,
    ) -> Self {
        Self {
            layout,
            categorical,
            scaler,
        }
    }

    /// Fit category lists and scaling statistics on training records
    pub fn fit(records: &[RawRecord]) -> Result<Self> {
        if records.is_empty() {
            return Err(ChurnError::Training(
                "cannot fit feature encoder on an empty dataset".to_string(),
            ));
        }

        let layout = FieldLayout::from_registry();
        let categorical = CategoricalEncoder::fit(&layout.categorical_fields(), records)?;

        let mut columns = vec![Vec::with_capacity(records.len()); SCALED_FIELDS.len()];
        for record in records {
            for (column, name) in columns.iter_mut().zip(SCALED_FIELDS) {
                let rule = match layout.kind_of(name) {
                    Some(FieldKind::Numeric(rule)) => rule,
                    _ => {
                        return Err(ChurnError::Training(format!(
                            "scaled field `{name}` is not numeric in the schema registry"
                        )))
                    }
                };
                column.push(numeric_value(record, name, rule)?);
            }
        }
        let scaler = NumericScaler::fit(SCALED_FIELDS, &columns)?;

        debug!(
            records = records.len(),
            categorical_columns = categorical.width()?,
            "Feature encoder fitted"
        );

        Ok(Self {
            layout,
            categorical,
            scaler,
        })
    }

    pub fn is_fitted(&self) -> bool {
        self.categorical.is_fitted() && self.scaler.is_fitted()
    }

    pub fn layout(&self) -> &FieldLayout {
        &self.layout
    }

    pub fn categorical(&self) -> &CategoricalEncoder {
        &self.categorical
    }

    pub fn scaler(&self) -> &NumericScaler {
        &self.scaler
    }

    /// Columns produced for schema fields, in output order
    pub fn output_columns(&self) -> Result<Vec<String>> {
        if !self.is_fitted() {
            return Err(ChurnError::EncoderNotFitted);
        }
        let mut columns: Vec<String> = self
            .layout
            .scalar_fields()
            .map(|f| f.name.clone())
            .collect();
        columns.extend(self.categorical.output_columns()?);
        Ok(columns)
    }

    /// Encode a batch of records.
    ///
    /// Schema columns come first. Fields the layout does not know about are
    /// appended per record in name order: numbers pass through and strings
    /// become a code derived from the string alone, so a record encodes the
    /// same whatever batch it arrives in.
    pub fn encode(&self, records: &[RawRecord]) -> Result<Vec<EncodedRow>> {
        let schema_columns: Arc<[String]> = self.output_columns()?.into();
        let mut extended: HashMap<Vec<&str>, Arc<[String]>> = HashMap::new();

        records
            .iter()
            .map(|record| {
                let mut values = Vec::with_capacity(schema_columns.len());
                self.encode_into(record, &mut values)?;

                let extras: Vec<(&str, &FieldValue)> = record
                    .iter()
                    .filter(|(name, _)| !self.layout.contains(name))
                    .collect();
                if extras.is_empty() {
                    return Ok(EncodedRow::new(Arc::clone(&schema_columns), values));
                }

                values.extend(extras.iter().map(|(_, v)| extra_value(v)));
                let names: Vec<&str> = extras.iter().map(|(name, _)| *name).collect();
                let columns = extended.entry(names).or_insert_with_key(|names| {
                    debug!(fields = ?names, "Encoding fields outside the schema");
                    schema_columns
                        .iter()
                        .cloned()
                        .chain(names.iter().map(|n| n.to_string()))
                        .collect()
                });
                Ok(EncodedRow::new(Arc::clone(columns), values))
            })
            .collect()
    }

    /// Encode a single record
    pub fn encode_one(&self, record: &RawRecord) -> Result<EncodedRow> {
        let mut rows = self.encode(std::slice::from_ref(record))?;
        rows.pop()
            .ok_or_else(|| ChurnError::Training("encoder returned no row".to_string()))
    }

    fn encode_into(&self, record: &RawRecord, out: &mut Vec<f64>) -> Result<()> {
        for field in self.layout.scalar_fields() {
            let name = field.name.as_str();
            let value = match field.kind {
                FieldKind::Gender => parse_gender(name, record.require(name)?)?,
                FieldKind::Binary => parse_yes_no(name, record.require(name)?)?,
                FieldKind::Numeric(rule) => {
                    let raw = numeric_value(record, name, rule)?;
                    match self.scaler.stat(name)? {
                        Some(stat) => stat.apply(raw),
                        None => raw,
                    }
                }
                FieldKind::Identifier | FieldKind::Categorical => continue,
            };
            out.push(value);
        }
        self.categorical.transform_into(record, out)
    }
}

fn numeric_value(record: &RawRecord, name: &str, rule: NumericRule) -> Result<f64> {
    let value = match rule {
        NumericRule::Coerced => coerce_total_charges(record.get(name)),
        NumericRule::Count => parse_count(name, record.require(name)?)?,
        NumericRule::Amount => parse_amount(name, record.require(name)?)?,
    };
    Ok(value)
}

/// Value of a field outside the layout
fn extra_value(value: &FieldValue) -> f64 {
    match value {
        FieldValue::Number(n) => *n,
        FieldValue::Text(s) => category_code(s),
        FieldValue::Null => 0.0,
    }
}

/// Stable code for a free-text value: the first six bytes of its blake3
/// digest, which stay exactly representable as an f64
pub fn category_code(value: &str) -> f64 {
    let digest = blake3::hash(value.as_bytes());
    let mut bytes = [0u8; 8];
    bytes[..6].copy_from_slice(&digest.as_bytes()[..6]);
    u64::from_le_bytes(bytes) as f64
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::errors::SchemaError;
    use crate::schema::IDENTIFIER_FIELD;

    /// The reference customer used across the test suite
    pub(crate) fn sample_record() -> RawRecord {
        RawRecord::new()
            .with("gender", "Female")
            .with("SeniorCitizen", "No")
            .with("Partner", "No")
            .with("Dependents", "No")
            .with("tenure", 3_i64)
            .with("PhoneService", "Yes")
            .with("MultipleLines", "Yes")
            .with("InternetService", "Fiber optic")
            .with("OnlineSecurity", "No")
            .with("OnlineBackup", "No")
            .with("DeviceProtection", "No")
            .with("TechSupport", "No")
            .with("StreamingTV", "Yes")
            .with("StreamingMovies", "Yes")
            .with("Contract", "Month-to-month")
            .with("PaperlessBilling", "Yes")
            .with("PaymentMethod", "Electronic check")
            .with("MonthlyCharges", 95.5)
            .with("TotalCharges", 280.0)
    }

    pub(crate) fn training_records() -> Vec<RawRecord> {
        let mut long_tenure = sample_record()
            .with("gender", "Male")
            .with("tenure", 60_i64)
            .with("MultipleLines", "No phone service")
            .with("PhoneService", "No")
            .with("InternetService", "DSL")
            .with("Contract", "Two year")
            .with("PaymentMethod", "Credit card (automatic)")
            .with("MonthlyCharges", 45.0)
            .with("TotalCharges", "2700.0");
        long_tenure.insert(IDENTIFIER_FIELD, "7590-VHVEG");

        let offline = sample_record()
            .with("tenure", 12_i64)
            .with("MultipleLines", "No")
            .with("InternetService", "No")
            .with("OnlineSecurity", "No internet service")
            .with("OnlineBackup", "No internet service")
            .with("DeviceProtection", "No internet service")
            .with("TechSupport", "No internet service")
            .with("StreamingTV", "No internet service")
            .with("StreamingMovies", "No internet service")
            .with("Contract", "One year")
            .with("PaymentMethod", "Mailed check")
            .with("MonthlyCharges", 20.0)
            .with("TotalCharges", " ");

        let transfer = sample_record()
            .with("SeniorCitizen", 1_i64)
            .with("OnlineSecurity", "Yes")
            .with("PaymentMethod", "Bank transfer (automatic)");

        vec![sample_record(), long_tenure, offline, transfer]
    }

    pub(crate) fn fitted_encoder() -> FeatureEncoder {
        FeatureEncoder::fit(&training_records()).unwrap()
    }

    #[test]
    fn test_output_columns() {
        let encoder = fitted_encoder();
        let columns = encoder.output_columns().unwrap();

        // 9 scalar, then MultipleLines, InternetService, OnlineSecurity,
        // five two-valued add-ons, Contract and PaymentMethod
        assert_eq!(columns.len(), 9 + 3 + 3 + 3 + 5 * 2 + 3 + 4);
        assert_eq!(&columns[..3], &["gender", "SeniorCitizen", "Partner"]);
        assert!(columns.contains(&"MultipleLines_No phone service".to_string()));
        assert!(columns.contains(&"PaymentMethod_Bank transfer (automatic)".to_string()));
        assert!(!columns.contains(&IDENTIFIER_FIELD.to_string()));
    }

    #[test]
    fn test_gender_mapping() {
        let encoder = fitted_encoder();
        let female = encoder.encode_one(&sample_record()).unwrap();
        let male = encoder
            .encode_one(&sample_record().with("gender", "Male"))
            .unwrap();

        assert_eq!(female.get("gender"), Some(0.0));
        assert_eq!(male.get("gender"), Some(1.0));
    }

    #[test]
    fn test_unknown_gender_is_schema_error() {
        let encoder = fitted_encoder();
        let err = encoder
            .encode_one(&sample_record().with("gender", "Unknown"))
            .unwrap_err();
        assert!(matches!(
            err,
            ChurnError::Schema(SchemaError::UnknownValue { ref field, .. }) if field == "gender"
        ));
    }

    #[test]
    fn test_binary_fields_use_registry() {
        // A batch holding only "No" still maps the field as binary
        let encoder = fitted_encoder();
        let rows = encoder
            .encode(&[sample_record(), sample_record().with("Partner", "No")])
            .unwrap();
        for row in &rows {
            assert_eq!(row.get("Partner"), Some(0.0));
            assert_eq!(row.get("PhoneService"), Some(1.0));
        }
        assert_eq!(rows[0].columns(), encoder.output_columns().unwrap().as_slice());
    }

    #[test]
    fn test_unknown_category_zero_indicators() {
        let encoder = fitted_encoder();
        let known = encoder.encode_one(&sample_record()).unwrap();
        let unknown = encoder
            .encode_one(&sample_record().with("Contract", "Three year"))
            .unwrap();

        for column in unknown.columns() {
            if column.starts_with("Contract_") {
                assert_eq!(unknown.get(column), Some(0.0), "{column}");
            } else {
                assert_eq!(unknown.get(column), known.get(column), "{column}");
            }
        }
    }

    #[test]
    fn test_scaling_uses_frozen_statistics() {
        let encoder = fitted_encoder();
        let row = encoder.encode_one(&sample_record()).unwrap();
        let stat = encoder.scaler().stat("tenure").unwrap().unwrap().clone();

        assert_eq!(row.get("tenure"), Some(stat.apply(3.0)));
        assert!(row.values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_batch_and_single_agree() {
        let encoder = fitted_encoder();
        let records = training_records();
        let batch = encoder.encode(&records).unwrap();

        for (record, row) in records.iter().zip(&batch) {
            let single = encoder.encode_one(record).unwrap();
            assert_eq!(&single, row);
        }
    }

    #[test]
    fn test_missing_required_field() {
        let encoder = fitted_encoder();
        let mut record = sample_record();
        record.remove("tenure");
        assert!(matches!(
            encoder.encode_one(&record),
            Err(ChurnError::Schema(SchemaError::MissingField(ref f))) if f == "tenure"
        ));

        // TotalCharges is coerced rather than required
        let mut record = sample_record();
        record.remove("TotalCharges");
        let row = encoder.encode_one(&record).unwrap();
        let stat = encoder.scaler().stat("TotalCharges").unwrap().unwrap().clone();
        assert_eq!(row.get("TotalCharges"), Some(stat.apply(0.0)));
    }

    #[test]
    fn test_extra_fields_fallback() {
        let encoder = fitted_encoder();
        let records = vec![
            sample_record().with("Churn", "Yes").with("region", 4.0),
            sample_record().with("Churn", "No"),
        ];
        let rows = encoder.encode(&records).unwrap();
        let schema_width = encoder.output_columns().unwrap().len();

        assert_eq!(rows[0].len(), schema_width + 2);
        assert_eq!(rows[1].len(), schema_width + 1);
        assert_eq!(&rows[0].columns()[schema_width..], &["Churn", "region"]);
        assert_eq!(rows[0].get("Churn"), Some(category_code("Yes")));
        assert_eq!(rows[1].get("Churn"), Some(category_code("No")));
        assert_eq!(rows[0].get("region"), Some(4.0));
        assert_eq!(rows[1].get("region"), None);
    }

    #[test]
    fn test_batch_and_single_agree_with_extra_fields() {
        let encoder = fitted_encoder();
        let records = vec![
            sample_record().with("region", "north"),
            sample_record().with("region", "east").with("Churn", "No"),
            sample_record(),
        ];
        let batch = encoder.encode(&records).unwrap();

        for (record, row) in records.iter().zip(&batch) {
            assert_eq!(&encoder.encode_one(record).unwrap(), row);
        }
        assert_ne!(batch[0].get("region"), batch[1].get("region"));
        assert_eq!(batch[2].columns(), encoder.output_columns().unwrap().as_slice());
    }

    #[test]
    fn test_category_code_is_stable() {
        assert_eq!(category_code("north"), category_code("north"));
        assert_ne!(category_code("north"), category_code("south"));
        assert!(category_code("north") < 2f64.powi(48));
    }

    #[test]
    fn test_unfitted_encoder() {
        let encoder = FeatureEncoder::unfitted();
        assert!(!encoder.is_fitted());
        assert!(matches!(
            encoder.encode(&[sample_record()]),
            Err(ChurnError::EncoderNotFitted)
        ));
    }

    #[test]
    fn test_fit_requires_records() {
        assert!(matches!(
            FeatureEncoder::fit(&[]),
            Err(ChurnError::Training(_))
        ));
    }
}
