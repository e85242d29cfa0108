//! Seeded synthetic telecom customers for local training runs and tests

use crate::errors::Result;
use crate::models::gbdt::sigmoid;
use crate::schema::{FIELDS, IDENTIFIER_FIELD, TARGET_FIELD};
use crate::types::{FieldValue, RawRecord};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io;

/// Generates customers whose churn odds follow contract, tenure,
/// fiber service, charges and payment method
pub struct CustomerGenerator {
    rng: StdRng,
    counter: u64,
}

impl CustomerGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            counter: 0,
        }
    }

    /// One customer, identifier and `Churn` label included
    pub fn generate(&mut self) -> RawRecord {
        self.counter += 1;

        let contract = self.choose(&[
            ("Month-to-month", 0.55),
            ("One year", 0.21),
            ("Two year", 0.24),
        ]);
        let tenure: u32 = match contract {
            "Month-to-month" => self.rng.gen_range(0..40),
            "One year" => self.rng.gen_range(6..60),
            _ => self.rng.gen_range(12..73),
        };
        let phone = self.rng.gen_bool(0.9);
        let internet = self.choose(&[("Fiber optic", 0.44), ("DSL", 0.34), ("No", 0.22)]);
        let has_internet = internet != "No";

        let lines = if phone {
            if self.rng.gen_bool(0.45) { "Yes" } else { "No" }
        } else {
            "No phone service"
        };
        let addons: Vec<&'static str> = (0..6)
            .map(|_| {
                if !has_internet {
                    "No internet service"
                } else if self.rng.gen_bool(0.4) {
                    "Yes"
                } else {
                    "No"
                }
            })
            .collect();

        let payment = self.choose(&[
            ("Electronic check", 0.34),
            ("Mailed check", 0.23),
            ("Bank transfer (automatic)", 0.22),
            ("Credit card (automatic)", 0.21),
        ]);

        let base = match internet {
            "Fiber optic" => 70.0,
            "DSL" => 45.0,
            _ => 20.0,
        };
        let phone_charge = if phone { 5.0 } else { 0.0 };
        let addon_charge = addons.iter().filter(|a| **a == "Yes").count() as f64 * 5.0;
        let monthly: f64 = base + phone_charge + addon_charge + self.rng.gen_range(-5.0..5.0);
        let monthly = (monthly.max(18.25) * 100.0).round() / 100.0;
        // New customers have not been billed yet
        let total = if tenure == 0 {
            " ".to_string()
        } else {
            format!("{:.2}", monthly * f64::from(tenure) * self.rng.gen_range(0.95..1.05))
        };

        let senior = self.rng.gen_bool(0.16);
        let contract_effect = match contract {
            "Month-to-month" => 1.3,
            "One year" => -0.4,
            _ => -1.6,
        };
        let flag = |on: bool, effect: f64| if on { effect } else { 0.0 };
        let margin = -1.2 + contract_effect - 0.04 * f64::from(tenure)
            + flag(internet == "Fiber optic", 0.8)
            + flag(payment == "Electronic check", 0.6)
            + flag(senior, 0.3)
            + 0.01 * (monthly - 65.0);
        let churn = self.rng.gen_bool(sigmoid(margin).clamp(0.01, 0.99));

        let yes_no = |b: bool| if b { "Yes" } else { "No" };
        let mut record = RawRecord::new()
            .with(IDENTIFIER_FIELD, format!("{:04}-SYNTH{:05}", self.counter % 10_000, self.counter))
            .with("gender", if self.rng.gen_bool(0.5) { "Male" } else { "Female" })
            .with("SeniorCitizen", if senior { "1" } else { "0" })
            .with("Partner", yes_no(self.rng.gen_bool(0.48)))
            .with("Dependents", yes_no(self.rng.gen_bool(0.3)))
            .with("tenure", tenure.to_string())
            .with("PhoneService", yes_no(phone))
            .with("MultipleLines", lines)
            .with("InternetService", internet)
            .with("Contract", contract)
            .with("PaperlessBilling", yes_no(self.rng.gen_bool(0.59)))
            .with("PaymentMethod", payment)
            .with("MonthlyCharges", format!("{monthly:.2}"))
            .with("TotalCharges", total)
            .with(TARGET_FIELD, yes_no(churn));

        for (name, value) in [
            "OnlineSecurity",
            "OnlineBackup",
            "DeviceProtection",
            "TechSupport",
            "StreamingTV",
            "StreamingMovies",
        ]
        .into_iter()
        .zip(addons)
        {
            record.insert(name, value);
        }
        record
    }

    fn choose(&mut self, weighted: &[(&'static str, f64)]) -> &'static str {
        let total: f64 = weighted.iter().map(|(_, w)| w).sum();
        let mut pick = self.rng.gen_range(0.0..total);
        for &(value, weight) in weighted {
            if pick < weight {
                return value;
            }
            pick -= weight;
        }
        weighted.last().map_or("", |&(v, _)| v)
    }
}

impl Iterator for CustomerGenerator {
    type Item = RawRecord;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.generate())
    }
}

/// CSV header: raw dataset column order with the label last
pub fn csv_header() -> Vec<&'static str> {
    FIELDS
        .iter()
        .map(|f| f.name)
        .chain(std::iter::once(TARGET_FIELD))
        .collect()
}

/// Write records as a raw churn CSV
pub fn write_csv<W: io::Write>(writer: W, records: &[RawRecord]) -> Result<()> {
    let header = csv_header();
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(&header)?;
    for record in records {
        csv.write_record(header.iter().map(|name| match record.get(name) {
            Some(FieldValue::Null) | None => String::new(),
            Some(value) => value.to_string(),
        }))?;
    }
    csv.flush()?;
    Ok(())
}
