//! HTTP surface: JSON prediction API and the HTML form page

pub mod api;
pub mod ui;

use crate::metrics::PredictionMetrics;
use crate::models::InferenceService;
use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<InferenceService>,
    pub metrics: Arc<PredictionMetrics>,
}

impl AppState {
    pub fn new(service: Arc<InferenceService>, metrics: Arc<PredictionMetrics>) -> Self {
        Self { service, metrics }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ui::form_page).post(ui::submit_form))
        .route("/predict", post(api::predict))
        .route("/health", get(api::health))
        .route("/metrics", get(api::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until ctrl-c
pub async fn serve(addr: &str, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {addr}"))?;
    info!(addr = %addr, run_id = %state.service.run_id(), "Serving churn predictions");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server terminated unexpectedly")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
