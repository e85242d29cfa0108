//! Raw customer records as they arrive from the dataset, the API or the form

use crate::errors::SchemaError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single raw field value: text, a number, or explicitly missing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Null,
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of the value; numeric strings are parsed
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok(),
            FieldValue::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Text(s) => write!(f, "{s}"),
            FieldValue::Null => write!(f, "null"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        FieldValue::Number(f64::from(value))
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// One customer as ingested: field name -> raw value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.fields.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Present, non-null value of a required field
    pub fn require(&self, name: &str) -> Result<&FieldValue, SchemaError> {
        match self.fields.get(name) {
            Some(FieldValue::Null) | None => Err(SchemaError::MissingField(name.to_string())),
            Some(value) => Ok(value),
        }
    }

    /// Text value of a required string field
    pub fn require_text(&self, name: &str) -> Result<&str, SchemaError> {
        let value = self.require(name)?;
        value.as_text().ok_or_else(|| SchemaError::Mistyped {
            field: name.to_string(),
            expected: "a string",
            value: value.to_string(),
        })
    }
}

impl FromIterator<(String, FieldValue)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Coerce a TotalCharges value to a finite non-negative float.
///
/// Numbers pass through unchanged; blank, unparsable, missing, negative and
/// non-finite values all become 0.0.
pub fn coerce_total_charges(value: Option<&FieldValue>) -> f64 {
    match value.and_then(FieldValue::as_number) {
        Some(n) if n.is_finite() && n >= 0.0 => n,
        _ => 0.0,
    }
}

/// Parse a whole, non-negative count such as tenure in months
pub fn parse_count(name: &str, value: &FieldValue) -> Result<f64, SchemaError> {
    match value.as_number() {
        Some(n) if n.is_finite() && n >= 0.0 && n.fract() == 0.0 => Ok(n),
        _ => Err(SchemaError::Mistyped {
            field: name.to_string(),
            expected: "a non-negative integer",
            value: value.to_string(),
        }),
    }
}

/// Parse a finite, non-negative currency amount
pub fn parse_amount(name: &str, value: &FieldValue) -> Result<f64, SchemaError> {
    match value.as_number() {
        Some(n) if n.is_finite() && n >= 0.0 => Ok(n),
        _ => Err(SchemaError::Mistyped {
            field: name.to_string(),
            expected: "a non-negative amount",
            value: value.to_string(),
        }),
    }
}

/// Map a Yes/No field to 1/0; numeric 0/1 flags are normalized too
pub fn parse_yes_no(name: &str, value: &FieldValue) -> Result<f64, SchemaError> {
    let flag = match value {
        FieldValue::Text(s) => match s.trim() {
            "Yes" | "1" => Some(1.0),
            "No" | "0" => Some(0.0),
            _ => None,
        },
        FieldValue::Number(n) if *n == 1.0 => Some(1.0),
        FieldValue::Number(n) if *n == 0.0 => Some(0.0),
        _ => None,
    };

    flag.ok_or_else(|| SchemaError::UnknownValue {
        field: name.to_string(),
        value: value.to_string(),
        expected: vec!["Yes".to_string(), "No".to_string()],
    })
}

/// Map gender to Male -> 1, Female -> 0; anything else is rejected
pub fn parse_gender(name: &str, value: &FieldValue) -> Result<f64, SchemaError> {
    match value.as_text().map(str::trim) {
        Some("Male") => Ok(1.0),
        Some("Female") => Ok(0.0),
        _ => Err(SchemaError::UnknownValue {
            field: name.to_string(),
            value: value.to_string(),
            expected: vec!["Male".to_string(), "Female".to_string()],
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_charges_coercion() {
        assert_eq!(coerce_total_charges(Some(&FieldValue::Number(280.0))), 280.0);
        assert_eq!(coerce_total_charges(Some(&"1889.5".into())), 1889.5);
        assert_eq!(coerce_total_charges(Some(&"".into())), 0.0);
        assert_eq!(coerce_total_charges(Some(&" ".into())), 0.0);
        assert_eq!(coerce_total_charges(Some(&"NA".into())), 0.0);
        assert_eq!(coerce_total_charges(Some(&"NaN".into())), 0.0);
        assert_eq!(coerce_total_charges(Some(&FieldValue::Number(-3.0))), 0.0);
        assert_eq!(coerce_total_charges(Some(&FieldValue::Null)), 0.0);
        assert_eq!(coerce_total_charges(None), 0.0);
    }

    #[test]
    fn test_total_charges_coercion_is_idempotent() {
        for raw in [0.0, 19.85, 280.0, 8684.8] {
            let once = coerce_total_charges(Some(&FieldValue::Number(raw)));
            let twice = coerce_total_charges(Some(&FieldValue::Number(once)));
            assert_eq!(once.to_bits(), raw.to_bits());
            assert_eq!(twice.to_bits(), once.to_bits());
        }
    }

    #[test]
    fn test_yes_no_normalization() {
        assert_eq!(parse_yes_no("Partner", &"Yes".into()).unwrap(), 1.0);
        assert_eq!(parse_yes_no("Partner", &"No".into()).unwrap(), 0.0);
        assert_eq!(parse_yes_no("SeniorCitizen", &FieldValue::Number(1.0)).unwrap(), 1.0);
        assert_eq!(parse_yes_no("SeniorCitizen", &"0".into()).unwrap(), 0.0);
        assert!(matches!(
            parse_yes_no("Partner", &"Maybe".into()),
            Err(SchemaError::UnknownValue { .. })
        ));
        assert!(parse_yes_no("SeniorCitizen", &FieldValue::Number(2.0)).is_err());
    }

    #[test]
    fn test_gender_fails_closed() {
        assert_eq!(parse_gender("gender", &"Male".into()).unwrap(), 1.0);
        assert_eq!(parse_gender("gender", &"Female".into()).unwrap(), 0.0);
        assert!(parse_gender("gender", &"female".into()).is_err());
        assert!(parse_gender("gender", &FieldValue::Number(1.0)).is_err());
    }

    #[test]
    fn test_numeric_parsing() {
        assert_eq!(parse_count("tenure", &FieldValue::Number(3.0)).unwrap(), 3.0);
        assert_eq!(parse_count("tenure", &"72".into()).unwrap(), 72.0);
        assert!(parse_count("tenure", &FieldValue::Number(-1.0)).is_err());
        assert!(parse_count("tenure", &FieldValue::Number(2.5)).is_err());
        assert!(parse_count("tenure", &"twelve".into()).is_err());

        assert_eq!(parse_amount("MonthlyCharges", &"95.5".into()).unwrap(), 95.5);
        assert!(parse_amount("MonthlyCharges", &"".into()).is_err());
    }

    #[test]
    fn test_record_json() {
        let json = r#"{"gender":"Female","tenure":3,"TotalCharges":" ","customerID":null}"#;
        let record: RawRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.len(), 4);
        assert_eq!(record.get("tenure"), Some(&FieldValue::Number(3.0)));
        assert_eq!(record.require_text("gender").unwrap(), "Female");
        assert!(matches!(
            record.require("customerID"),
            Err(SchemaError::MissingField(_))
        ));
        assert!(matches!(
            record.require_text("tenure"),
            Err(SchemaError::Mistyped { .. })
        ));
    }
}
