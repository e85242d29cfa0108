//! JSON endpoints

use super::AppState;
use crate::errors::ChurnError;
use crate::metrics::MetricsSnapshot;
use crate::schema;
use crate::types::{ChurnPrediction, PredictionResponse, RawRecord};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, error};
use uuid::Uuid;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Error returned to API callers as `{"error": ...}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&ChurnError> for ApiError {
    fn from(err: &ChurnError) -> Self {
        let status = if err.is_request_scoped() {
            StatusCode::UNPROCESSABLE_ENTITY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, payload).into_response()
    }
}

/// Reject keys the schema registry does not know
pub fn check_fields(record: &RawRecord) -> Result<(), ApiError> {
    match record.iter().find(|(name, _)| schema::field(name).is_none()) {
        Some((name, _)) => Err(ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("unknown field `{name}`"),
        )),
        None => Ok(()),
    }
}

/// Run one record through the service, recording metrics either way
pub fn run_prediction(state: &AppState, record: &RawRecord) -> Result<ChurnPrediction, ApiError> {
    let start = Instant::now();
    match state.service.predict(record) {
        Ok(prediction) => {
            state.metrics.record_prediction(start.elapsed(), &prediction);
            Ok(prediction)
        }
        Err(e) => {
            state.metrics.record_error(&e);
            if e.is_request_scoped() {
                debug!(error = %e, "Rejected prediction request");
            } else {
                error!(error = %e, "Prediction failed");
            }
            Err(ApiError::from(&e))
        }
    }
}

/// `POST /predict`
pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<RawRecord>, JsonRejection>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let record = match payload {
        Ok(Json(record)) => check_fields(&record).map(|_| record),
        Err(e) => Err(ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, e.body_text())),
    };
    let record = record.inspect_err(|e| {
        state.metrics.record_rejection();
        debug!(error = %e.message(), "Rejected prediction request");
    })?;

    let prediction = run_prediction(&state, &record)?;
    debug!(
        label = %prediction.label,
        probability = prediction.probability,
        "Prediction served"
    );
    Ok(Json(PredictionResponse::from(&prediction)))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub run_id: Uuid,
    pub features: usize,
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        run_id: state.service.run_id(),
        features: state.service.feature_count(),
    })
}

/// `GET /metrics`
pub async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SchemaError;

    #[test]
    fn test_error_status_mapping() {
        let err = ChurnError::from(SchemaError::MissingField("tenure".to_string()));
        assert_eq!(ApiError::from(&err).status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err = ChurnError::FeatureMismatch;
        assert_eq!(ApiError::from(&err).status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err = ChurnError::EncoderNotFitted;
        assert_eq!(ApiError::from(&err).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_check_fields() {
        let record = RawRecord::new()
            .with("customerID", "7590-VHVEG")
            .with("tenure", 3u32);
        assert!(check_fields(&record).is_ok());

        let record = record.with("favourite_colour", "teal");
        let err = check_fields(&record).unwrap_err();
        assert!(err.message().contains("favourite_colour"));
    }
}
