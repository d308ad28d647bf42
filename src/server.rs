//! ==============================================================================
//! server.rs - readings http api
//! ==============================================================================
//!
//! routes:
//!     GET  /                    greeting, doubles as a liveness check
//!     POST /readings/store      json array of {date?, moisture, light?}
//!     GET  /readings            ?start=<rfc3339>&end=<rfc3339>[&resolution=N]
//!     GET  /readings/current    latest reading
//!     GET  /readings/watering   watering verdict for the latest reading
//!
//! errors are plain text with a human-readable message. every response
//! carries a permissive cors header so browser dashboards can poll directly.
//!
//! relationships:
//!     - uses: storage.rs (any SensorStore), domain.rs (normalize),
//!       downsample.rs, detection.rs
//!     - used by: main.rs
//!
//! ==============================================================================

use crate::detection::{DetectionStrategy, WateringDetector};
use crate::domain::{self, PendingReading, Reading};
use crate::downsample::downsample;
use crate::storage::{SensorStore, StorageError};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::CorsLayer;

// ==============================================================================
// shared state
// ==============================================================================

pub struct AppState<S> {
    pub store: S,
    pub detector: WateringDetector,
    /// history considered by the watering detector
    pub detection_window: chrono::Duration,
    pub greeting_name: String,
}

impl<S: SensorStore> AppState<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            detector: WateringDetector::default(),
            detection_window: chrono::Duration::minutes(60),
            greeting_name: "World".to_string(),
        }
    }
}

// ==============================================================================
// errors
// ==============================================================================

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(&'static str),

    #[error("Content-Type header is not application/json")]
    UnsupportedMediaType,

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{message}")]
    Storage {
        message: &'static str,
        #[source]
        source: StorageError,
    },
}

impl ApiError {
    fn storage(message: &'static str) -> impl FnOnce(StorageError) -> Self {
        move |source| ApiError::Storage { message, source }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Storage { message, source } = &self {
            tracing::error!(error = %source, "{}", message);
        }
        (self.status(), self.to_string()).into_response()
    }
}

// ==============================================================================
// router
// ==============================================================================

pub fn router<S: SensorStore>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route("/", get(greeting_handler::<S>))
        .route("/readings", get(readings_handler::<S>))
        .route("/readings/store", post(store_handler::<S>))
        .route("/readings/current", get(current_handler::<S>))
        .route("/readings/watering", get(watering_handler::<S>))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve<S: SensorStore>(state: AppState<S>, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router(Arc::new(state))).await?;
    Ok(())
}

// ==============================================================================
// handlers
// ==============================================================================

async fn greeting_handler<S: SensorStore>(State(state): State<Arc<AppState<S>>>) -> String {
    format!("Hello {}!\n", state.greeting_name)
}

/// POST /readings/store
async fn store_handler<S: SensorStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, ApiError> {
    if !is_json(&headers) {
        return Err(ApiError::UnsupportedMediaType);
    }

    let pending: Vec<PendingReading> =
        serde_json::from_slice(&body).map_err(|_| ApiError::Validation("Unable to parse request json"))?;

    let readings = domain::normalize(pending);
    state
        .store
        .store(&readings)
        .await
        .map_err(ApiError::storage("Unable to write to database"))?;

    tracing::info!(count = readings.len(), "readings written");
    Ok("Readings written")
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

/// GET /readings query string, every field arrives as text
#[derive(Debug, Default, Deserialize)]
pub struct ReadingsParams {
    start: Option<String>,
    end: Option<String>,
    resolution: Option<String>,
}

/// a validated range request
#[derive(Debug, PartialEq)]
pub struct RangeQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub resolution: Option<NonZeroUsize>,
}

impl TryFrom<ReadingsParams> for RangeQuery {
    type Error = ApiError;

    fn try_from(params: ReadingsParams) -> Result<Self, ApiError> {
        let present = |v: Option<String>| v.filter(|s| !s.is_empty());

        let (Some(start), Some(end)) = (present(params.start), present(params.end)) else {
            return Err(ApiError::Validation(
                "Must specify start and end query strings in URL parameters",
            ));
        };

        let parse = |s: &str| DateTime::parse_from_rfc3339(s).map(|d| d.with_timezone(&Utc));
        let (Ok(start), Ok(end)) = (parse(&start), parse(&end)) else {
            return Err(ApiError::Validation(
                "Start and end query parameters must be according to RFC3339",
            ));
        };

        let resolution = present(params.resolution)
            .map(|r| r.parse::<NonZeroUsize>())
            .transpose()
            .map_err(|_| ApiError::Validation("Resolution must be a valid, positive integer"))?;

        Ok(RangeQuery { start, end, resolution })
    }
}

/// GET /readings
async fn readings_handler<S: SensorStore>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<ReadingsParams>,
) -> Result<Json<Vec<Reading>>, ApiError> {
    let range = RangeQuery::try_from(params)?;

    let readings = state
        .store
        .query(range.start, range.end)
        .await
        .map_err(ApiError::storage("Unable to read from database"))?;

    let readings = match range.resolution {
        Some(resolution) => downsample(&readings, resolution),
        None => readings,
    };
    Ok(Json(readings))
}

async fn latest<S: SensorStore>(store: &S) -> Result<Reading, ApiError> {
    store
        .current_reading()
        .await
        .map_err(ApiError::storage("Unable to read current sensor status"))?
        .ok_or(ApiError::NotFound("No readings stored"))
}

/// GET /readings/current
async fn current_handler<S: SensorStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Reading>, ApiError> {
    Ok(Json(latest(&state.store).await?))
}

#[derive(Debug, Serialize)]
pub struct WateringReport {
    pub reading: Reading,
    pub strategy: DetectionStrategy,
    /// history readings the verdict was computed from
    pub samples: usize,
    /// `None` when there is not enough usable history for a verdict
    pub watering: Option<bool>,
}

/// GET /readings/watering
async fn watering_handler<S: SensorStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<WateringReport>, ApiError> {
    let reading = latest(&state.store).await?;

    let since = reading
        .date
        .checked_sub_signed(state.detection_window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let mut history = state
        .store
        .query(since, reading.date)
        .await
        .map_err(ApiError::storage("Unable to read from database"))?;
    history.retain(|r| r.date < reading.date);

    let watering = match state.detector.evaluate(&reading, &history) {
        Ok(verdict) => Some(verdict.watering()),
        Err(e) => {
            tracing::debug!(reason = %e, "no watering verdict");
            None
        }
    };

    Ok(Json(WateringReport {
        reading,
        strategy: state.detector.strategy(),
        samples: history.len(),
        watering,
    }))
}
