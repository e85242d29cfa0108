//! Sample Churn Data Generator
//!
//! Writes a synthetic telecom customer CSV with the raw dataset header, for
//! local training runs without the real data.

use anyhow::Context;
use churn_prediction_pipeline::schema::TARGET_FIELD;
use churn_prediction_pipeline::training::synthetic::{write_csv, CustomerGenerator};
use churn_prediction_pipeline::types::RawRecord;
use clap::Parser;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "sample-data", about = "Generate a synthetic churn dataset")]
struct Args {
    /// Number of customers
    #[arg(short, long, default_value_t = 2000)]
    rows: usize,

    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Output CSV
    #[arg(short, long, default_value = "data/raw/telco_customer_churn.csv")]
    output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sample_data=info".parse()?),
        )
        .init();

    let args = Args::parse();
    info!(rows = args.rows, seed = args.seed, output = %args.output.display(), "Generating customers");

    let records: Vec<RawRecord> = CustomerGenerator::new(args.seed).take(args.rows).collect();
    let churned = records
        .iter()
        .filter(|r| r.get(TARGET_FIELD).and_then(|v| v.as_text()) == Some("Yes"))
        .count();

    if let Some(parent) = args.output.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file = File::create(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    write_csv(BufWriter::new(file), &records)?;

    info!(
        rows = records.len(),
        churned = churned,
        churn_rate = format!("{:.1}%", churned as f64 / records.len().max(1) as f64 * 100.0),
        "Sample dataset written"
    );
    Ok(())
}
