//! HTTP API for the ELD planner.
//!
//! This module exposes the planning engine over a small REST API using
//! the [`axum`](https://crates.io/crates/axum) framework.  The route
//! planner front end posts a trip request and receives the route summary
//! and daily log sheets in JSON.  Planning is CPU-bound, so each request
//! runs on Tokio's blocking pool.

use crate::config::Config;
use crate::distance::{load_route_tables_from_dir, DistanceProvider, TableProvider};
use crate::engine::{plan_batch, plan_trip};
use crate::error::PlanError;
use crate::models::{PlanResponse, TripRequest};
use crate::rules::HosRules;
use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Application state shared across requests.
pub struct AppState {
    pub provider: Arc<dyn DistanceProvider>,
    pub rules: HosRules,
    pub default_start_hour: u32,
}

impl AppState {
    fn default_start(&self) -> NaiveDateTime {
        default_trip_start(Local::now().date_naive(), self.default_start_hour)
    }
}

/// Build the API router, loading route tables from the configured
/// directory.  Returns the router and a handle to the state.
pub async fn build_router(config: &Config) -> Result<(Router, Arc<AppState>)> {
    let tables = load_route_tables_from_dir(&config.route_table_dir)?;
    let provider = TableProvider::from_tables(tables);
    info!(
        dir = %config.route_table_dir.display(),
        places = provider.place_count(),
        "route tables loaded"
    );
    let state = Arc::new(AppState {
        provider: Arc::new(provider),
        rules: config.rules.clone(),
        default_start_hour: config.default_start_hour,
    });
    Ok((router(state.clone()), state))
}

/// Router over an already built state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/calculate-route", post(calculate_route_handler))
        .route("/api/calculate-routes", post(calculate_routes_handler))
        .route("/api/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handler for POST /api/calculate-route
async fn calculate_route_handler(
    State(app_state): State<Arc<AppState>>,
    Json(input): Json<TripRequest>,
) -> Result<Json<PlanResponse>, PlanError> {
    let start = input.start_time.unwrap_or_else(|| app_state.default_start());
    let report = tokio::task::spawn_blocking(move || {
        plan_trip(&input, start, app_state.provider.as_ref(), &app_state.rules)
    })
    .await
    .map_err(|err| PlanError::Internal(format!("planning task failed: {err}")))??;
    Ok(Json(report.to_response()))
}

/// One element of a batch response.
#[derive(Serialize)]
#[serde(untagged)]
enum BatchItem {
    Planned(PlanResponse),
    Failed { error: String },
}

/// Handler for POST /api/calculate-routes
async fn calculate_routes_handler(
    State(app_state): State<Arc<AppState>>,
    Json(inputs): Json<Vec<TripRequest>>,
) -> Result<Json<Vec<BatchItem>>, PlanError> {
    let default_start = app_state.default_start();
    let results = tokio::task::spawn_blocking(move || {
        plan_batch(
            inputs,
            default_start,
            app_state.provider.as_ref(),
            &app_state.rules,
        )
    })
    .await
    .map_err(|err| PlanError::Internal(format!("planning task failed: {err}")))?;
    let items = results
        .into_iter()
        .map(|result| match result {
            Ok(report) => BatchItem::Planned(report.to_response()),
            Err(err) => BatchItem::Failed {
                error: err.to_string(),
            },
        })
        .collect();
    Ok(Json(items))
}

/// Handler for GET /api/health
async fn health_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "provider": app_state.provider.name(),
    }))
}

impl PlanError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PlanError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            PlanError::Provider(_) => StatusCode::BAD_GATEWAY,
            PlanError::Unschedulable(_) | PlanError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for PlanError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "trip planning failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// The start used for requests without a `startTime`: `hour` o'clock on
/// `today`.  Hours past 23 fall back to midnight.
pub fn default_trip_start(today: NaiveDate, hour: u32) -> NaiveDateTime {
    let time = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN);
    today.and_time(time)
}

/// Launch the API server.  This function builds the router from the
/// configured route tables and binds to the configured address.  It
/// blocks until the server terminates.
pub async fn serve(config: Config) -> Result<()> {
    let (router, _state) = build_router(&config).await?;
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("server listening on {}", config.bind_addr);
    axum::serve(listener, router).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::ProviderError;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use std::path::PathBuf;
    use tower::ServiceExt;

    fn test_config() -> Config {
        let mut config = Config::from_lookup(|_| None).unwrap();
        config.route_table_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("route_tables");
        config
    }

    async fn post_json(router: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn trip(cycle: f64) -> Value {
        json!({
            "currentLocation": "New York, NY",
            "pickupLocation": "Chicago, IL",
            "dropoffLocation": "Los Angeles, CA",
            "currentCycleUsed": cycle,
            "startTime": "2024-06-15T06:00:00"
        })
    }

    #[tokio::test]
    async fn test_calculate_route() {
        let (router, _state) = build_router(&test_config()).await.unwrap();
        let (status, body) = post_json(router, "/api/calculate-route", trip(0.0)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["route"]["totalDistance"], 2805.0);
        assert!(body["route"]["fuelStops"].as_u64().unwrap() >= 3);
        assert_eq!(body["route"]["waypoints"][0]["type"], "start");
        assert_eq!(body["logSheets"][0]["date"], "2024-06-15");
        assert_eq!(body["logSheets"][0]["entries"][0]["time"], "06:00");
    }

    #[tokio::test]
    async fn test_invalid_cycle_is_bad_request() {
        let (router, _state) = build_router(&test_config()).await.unwrap();
        let (status, body) = post_json(router, "/api/calculate-route", trip(75.0)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("currentCycleUsed"));
    }

    #[tokio::test]
    async fn test_unknown_location_is_bad_gateway() {
        let (router, _state) = build_router(&test_config()).await.unwrap();
        let mut request = trip(0.0);
        request["pickupLocation"] = json!("Atlantis");
        let (status, body) = post_json(router, "/api/calculate-route", request).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("Atlantis"));
    }

    #[tokio::test]
    async fn test_batch_reports_each_trip() {
        let (router, _state) = build_router(&test_config()).await.unwrap();
        let (status, body) =
            post_json(router, "/api/calculate-routes", json!([trip(0.0), trip(-1.0)])).await;
        assert_eq!(status, StatusCode::OK);
        let items = body.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert!(items[0]["route"].is_object());
        assert!(items[1]["error"].is_string());
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _state) = build_router(&test_config()).await.unwrap();
        let request = Request::builder()
            .uri("/api/health")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["provider"], "route-table");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            PlanError::invalid("pickupLocation", "must not be empty").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PlanError::from(ProviderError::Incomplete("timeout".into())).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            PlanError::Unschedulable("too many steps".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_default_trip_start() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        assert_eq!(default_trip_start(today, 6).to_string(), "2024-06-15 06:00:00");
        assert_eq!(default_trip_start(today, 30).to_string(), "2024-06-15 00:00:00");
    }
}
