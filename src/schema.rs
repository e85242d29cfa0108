//! Schema registry for raw customer records.
//!
//! The registry is the single static classification of every raw input
//! field into identifier, binary, categorical or numeric. Training copies
//! it into the encoder artifact as a [`FieldLayout`], so inference never
//! has to guess a field's kind from the values present in a batch.

use serde::{Deserialize, Serialize};

/// Customer identifier column, dropped before encoding
pub const IDENTIFIER_FIELD: &str = "customerID";

/// Churn label column in the raw dataset
pub const TARGET_FIELD: &str = "Churn";

/// Numeric fields standardized with the frozen training-time scaler
pub const SCALED_FIELDS: &[&str] = &["tenure", "MonthlyCharges", "TotalCharges"];

const YES_NO: &[&str] = &["Yes", "No"];
const GENDER: &[&str] = &["Male", "Female"];
const PHONE_LINES: &[&str] = &["No", "Yes", "No phone service"];
const INTERNET: &[&str] = &["DSL", "Fiber optic", "No"];
const INTERNET_ADDON: &[&str] = &["Yes", "No", "No internet service"];
const CONTRACT: &[&str] = &["Month-to-month", "One year", "Two year"];
const PAYMENT: &[&str] = &[
    "Electronic check",
    "Mailed check",
    "Bank transfer (automatic)",
    "Credit card (automatic)",
];

/// How a numeric field is parsed from a raw value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericRule {
    /// Non-negative whole number (months)
    Count,
    /// Non-negative finite currency amount
    Amount,
    /// Currency amount where anything unparsable becomes 0.0
    Coerced,
}

/// Encoding class of a raw field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Identifier,
    /// Male -> 1, Female -> 0
    Gender,
    /// Yes -> 1, No -> 0
    Binary,
    /// One-hot expanded through the categorical encoder
    Categorical,
    Numeric(NumericRule),
}

/// Static description of one raw field
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Allowed values for string fields, empty for numeric ones
    pub domain: &'static [&'static str],
}

impl FieldSpec {
    const fn new(name: &'static str, kind: FieldKind, domain: &'static [&'static str]) -> Self {
        Self { name, kind, domain }
    }
}

/// Raw fields in dataset column order
pub const FIELDS: &[FieldSpec] = &[
    FieldSpec::new(IDENTIFIER_FIELD, FieldKind::Identifier, &[]),
    FieldSpec::new("gender", FieldKind::Gender, GENDER),
    FieldSpec::new("SeniorCitizen", FieldKind::Binary, YES_NO),
    FieldSpec::new("Partner", FieldKind::Binary, YES_NO),
    FieldSpec::new("Dependents", FieldKind::Binary, YES_NO),
    FieldSpec::new("tenure", FieldKind::Numeric(NumericRule::Count), &[]),
    FieldSpec::new("PhoneService", FieldKind::Binary, YES_NO),
    FieldSpec::new("MultipleLines", FieldKind::Categorical, PHONE_LINES),
    FieldSpec::new("InternetService", FieldKind::Categorical, INTERNET),
    FieldSpec::new("OnlineSecurity", FieldKind::Categorical, INTERNET_ADDON),
    FieldSpec::new("OnlineBackup", FieldKind::Categorical, INTERNET_ADDON),
    FieldSpec::new("DeviceProtection", FieldKind::Categorical, INTERNET_ADDON),
    FieldSpec::new("TechSupport", FieldKind::Categorical, INTERNET_ADDON),
    FieldSpec::new("StreamingTV", FieldKind::Categorical, INTERNET_ADDON),
    FieldSpec::new("StreamingMovies", FieldKind::Categorical, INTERNET_ADDON),
    FieldSpec::new("Contract", FieldKind::Categorical, CONTRACT),
    FieldSpec::new("PaperlessBilling", FieldKind::Binary, YES_NO),
    FieldSpec::new("PaymentMethod", FieldKind::Categorical, PAYMENT),
    FieldSpec::new("MonthlyCharges", FieldKind::Numeric(NumericRule::Amount), &[]),
    FieldSpec::new("TotalCharges", FieldKind::Numeric(NumericRule::Coerced), &[]),
];

/// Look up a field by name
pub fn field(name: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|f| f.name == name)
}

/// Fields a caller has to supply for a prediction
pub fn input_fields() -> impl Iterator<Item = &'static FieldSpec> {
    FIELDS.iter().filter(|f| f.kind != FieldKind::Identifier)
}

/// One entry of a frozen field layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutField {
    pub name: String,
    pub kind: FieldKind,
}

/// Field classification frozen into the encoder artifact at training time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldLayout {
    fields: Vec<LayoutField>,
}

impl FieldLayout {
    /// Snapshot the registry
    pub fn from_registry() -> Self {
        Self {
            fields: FIELDS
                .iter()
                .map(|f| LayoutField {
                    name: f.name.to_string(),
                    kind: f.kind,
                })
                .collect(),
        }
    }

    pub fn fields(&self) -> &[LayoutField] {
        &self.fields
    }

    pub fn kind_of(&self, name: &str) -> Option<FieldKind> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.kind)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kind_of(name).is_some()
    }

    /// Names of the categorical fields, in layout order
    pub fn categorical_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.kind == FieldKind::Categorical)
            .map(|f| f.name.clone())
            .collect()
    }

    /// Fields emitted as a single column each (everything except identifier
    /// and categorical), in layout order
    pub fn scalar_fields(&self) -> impl Iterator<Item = &LayoutField> {
        self.fields
            .iter()
            .filter(|f| !matches!(f.kind, FieldKind::Identifier | FieldKind::Categorical))
    }
}

impl Default for FieldLayout {
    fn default() -> Self {
        Self::from_registry()
    }
}
