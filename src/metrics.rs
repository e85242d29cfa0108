//! Prediction metrics for the serving process

use crate::errors::ChurnError;
use crate::types::{ChurnLabel, ChurnPrediction};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Latency samples kept for percentile estimates
const LATENCY_WINDOW: usize = 10_000;

/// Metrics collector shared by request handlers
pub struct PredictionMetrics {
    /// Successful predictions
    pub predictions: AtomicU64,
    /// Predictions labelled as churn
    pub churn_predicted: AtomicU64,
    /// Predictions made on an all-zero feature vector
    pub feature_mismatches: AtomicU64,
    /// Requests rejected before or during encoding (422)
    pub rejected_requests: AtomicU64,
    /// Requests that failed for any other reason
    pub internal_errors: AtomicU64,
    /// Prediction latencies (in microseconds)
    latencies: RwLock<Vec<u64>>,
    /// Churn probability distribution buckets
    probability_buckets: RwLock<[u64; 10]>,
    start_time: Instant,
}

impl PredictionMetrics {
    pub fn new() -> Self {
        Self {
            predictions: AtomicU64::new(0),
            churn_predicted: AtomicU64::new(0),
            feature_mismatches: AtomicU64::new(0),
            rejected_requests: AtomicU64::new(0),
            internal_errors: AtomicU64::new(0),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            probability_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a served prediction
    pub fn record_prediction(&self, latency: Duration, prediction: &ChurnPrediction) {
        self.predictions.fetch_add(1, Ordering::Relaxed);
        if prediction.label == ChurnLabel::Churn {
            self.churn_predicted.fetch_add(1, Ordering::Relaxed);
        }
        if prediction.feature_mismatch {
            self.feature_mismatches.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut times) = self.latencies.write() {
            times.push(latency.as_micros() as u64);
            if times.len() > LATENCY_WINDOW {
                times.drain(0..LATENCY_WINDOW / 2);
            }
        }

        let bucket = ((prediction.probability * 10.0) as usize).min(9);
        if let Ok(mut buckets) = self.probability_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    /// Record a failed prediction
    pub fn record_error(&self, error: &ChurnError) {
        if error.is_request_scoped() {
            self.record_rejection();
        } else {
            self.internal_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a request answered with 422
    pub fn record_rejection(&self) {
        self.rejected_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn latency_stats(&self) -> LatencyStats {
        let Ok(times) = self.latencies.read() else {
            return LatencyStats::default();
        };
        if times.is_empty() {
            return LatencyStats::default();
        }

        let mut sorted = times.clone();
        drop(times);
        sorted.sort_unstable();

        let count = sorted.len();
        let at = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];
        LatencyStats {
            count: count as u64,
            mean_us: sorted.iter().sum::<u64>() / count as u64,
            p50_us: at(0.5),
            p95_us: at(0.95),
            p99_us: at(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Predictions per second since start
    pub fn throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.predictions.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn probability_distribution(&self) -> [u64; 10] {
        self.probability_buckets
            .read()
            .map(|b| *b)
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            predictions: self.predictions.load(Ordering::Relaxed),
            churn_predicted: self.churn_predicted.load(Ordering::Relaxed),
            feature_mismatches: self.feature_mismatches.load(Ordering::Relaxed),
            rejected_requests: self.rejected_requests.load(Ordering::Relaxed),
            internal_errors: self.internal_errors.load(Ordering::Relaxed),
            throughput: self.throughput(),
            latency: self.latency_stats(),
            probability_distribution: self.probability_distribution(),
        }
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let snapshot = self.snapshot();
        let churn_rate = if snapshot.predictions > 0 {
            snapshot.churn_predicted as f64 / snapshot.predictions as f64 * 100.0
        } else {
            0.0
        };
        let latency = &snapshot.latency;

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║            CHURN PREDICTION SERVICE - METRICS SUMMARY        ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Predictions Served: {:>8}  │  Throughput: {:>6.1} req/s   ║",
            snapshot.predictions, snapshot.throughput
        );
        info!(
            "║ Churn Predicted:    {:>8}  │  Churn Rate: {:>6.1}%        ║",
            snapshot.churn_predicted, churn_rate
        );
        info!(
            "║ Rejected: {:>6}  Internal Errors: {:>6}  Mismatch: {:>5}      ║",
            snapshot.rejected_requests, snapshot.internal_errors, snapshot.feature_mismatches
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Latency (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5}       ║",
            latency.mean_us, latency.p50_us, latency.p95_us, latency.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Churn Probability Distribution:                              ║");
        let total: u64 = snapshot.probability_distribution.iter().sum();
        for (i, &count) in snapshot.probability_distribution.iter().enumerate() {
            let pct = if total > 0 {
                count as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            let bar = "█".repeat(((pct / 2.0) as usize).min(20));
            info!(
                "║   {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for PredictionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Latency statistics
#[derive(Debug, Default, Clone, Serialize)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Point-in-time view of the metrics, served as JSON
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub predictions: u64,
    pub churn_predicted: u64,
    pub feature_mismatches: u64,
    pub rejected_requests: u64,
    pub internal_errors: u64,
    pub throughput: f64,
    pub latency: LatencyStats,
    pub probability_distribution: [u64; 10],
}

/// Periodic metrics summary logger
pub struct MetricsReporter {
    metrics: Arc<PredictionMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<PredictionMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Run the reporting loop
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SchemaError;

    #[test]
    fn test_metrics_recording() {
        let metrics = PredictionMetrics::new();

        metrics.record_prediction(Duration::from_micros(100), &ChurnPrediction::new(0.8, 0.5));
        metrics.record_prediction(
            Duration::from_micros(300),
            &ChurnPrediction::new(0.1, 0.5).with_feature_mismatch(true),
        );
        metrics.record_error(&ChurnError::from(SchemaError::MissingField("tenure".into())));
        metrics.record_error(&ChurnError::EncoderNotFitted);
        metrics.record_error(&ChurnError::FeatureMismatch);
        metrics.record_rejection();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.predictions, 2);
        assert_eq!(snapshot.churn_predicted, 1);
        assert_eq!(snapshot.feature_mismatches, 1);
        assert_eq!(snapshot.rejected_requests, 3);
        assert_eq!(snapshot.internal_errors, 1);
        assert_eq!(snapshot.probability_distribution[8], 1);
        assert_eq!(snapshot.probability_distribution[1], 1);
        assert_eq!(snapshot.latency.count, 2);
        assert_eq!(snapshot.latency.max_us, 300);
    }

    #[test]
    fn test_probability_one_lands_in_last_bucket() {
        let metrics = PredictionMetrics::new();
        metrics.record_prediction(Duration::from_micros(1), &ChurnPrediction::new(1.0, 0.5));
        assert_eq!(metrics.probability_distribution()[9], 1);
    }

    #[test]
    fn test_empty_latency_stats() {
        let stats = PredictionMetrics::new().latency_stats();
        assert_eq!(stats.count, 0);
        assert_eq!(stats.p99_us, 0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let json = serde_json::to_value(PredictionMetrics::new().snapshot()).unwrap();
        assert_eq!(json["predictions"], 0);
        assert!(json["latency"]["p95_us"].is_number());
    }
}
