//! Read-only display API

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use country_resolver::{DashboardCounters, PointOrigin};
use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use threat_timeline::{SourceError, ThreatDataSource, TimelineEvent, TimelineQuery};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::error;

use crate::pipeline::{CountryCount, DashboardSnapshot, DEFAULT_TOP_COUNTRIES};
use crate::render::to_feature_collection;

#[derive(Clone)]
pub struct AppState {
    pub snapshot: Arc<DashboardSnapshot>,
    pub source: Arc<dyn ThreatDataSource>,
}

#[derive(Deserialize)]
pub struct TopParams {
    pub top: Option<usize>,
}

#[derive(Serialize)]
pub struct SummaryResponse {
    pub counters: DashboardCounters,
    pub origin: PointOrigin,
    pub points: usize,
    pub generated_at: DateTime<Utc>,
}

pub enum ApiError {
    BadRequest(String),
    Unavailable,
}

impl From<SourceError> for ApiError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Query(e) => ApiError::BadRequest(e.to_string()),
            other => {
                error!("Timeline fetch failed: {}", other);
                ApiError::Unavailable
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Unavailable => (StatusCode::BAD_GATEWAY, "failed to load".to_string()),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/globe", get(globe))
        .route("/countries", get(countries))
        .route("/summary", get(summary))
        .route("/timeline", get(timeline))
        .with_state(state);

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "apt-atlas",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Plot points as GeoJSON
async fn globe(State(state): State<AppState>) -> Json<FeatureCollection> {
    Json(to_feature_collection(&state.snapshot.globe))
}

async fn countries(State(state): State<AppState>, Query(params): Query<TopParams>) -> Json<Vec<CountryCount>> {
    Json(state.snapshot.top(params.top.unwrap_or(DEFAULT_TOP_COUNTRIES)))
}

async fn summary(State(state): State<AppState>) -> Json<SummaryResponse> {
    let snapshot = &state.snapshot;
    Json(SummaryResponse {
        counters: snapshot.counters,
        origin: snapshot.globe.origin,
        points: snapshot.globe.points.len(),
        generated_at: snapshot.generated_at,
    })
}

/// Forwarded to the data source with the same filter parameters
async fn timeline(
    State(state): State<AppState>,
    Query(query): Query<TimelineQuery>,
) -> Result<Json<Vec<TimelineEvent>>, ApiError> {
    let events = state.source.fetch_timeline(&query).await?;
    Ok(Json(events))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;
    use crate::render::MemoryRenderer;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use threat_timeline::StaticDataSource;
    use tower::ServiceExt;

    fn events() -> Vec<TimelineEvent> {
        vec![
            TimelineEvent::new("APT28", "Fancy Bear").with_country("Russia").with_date("2016-06-01"),
            TimelineEvent::new("APT28", "Sofacy").with_country("Russia").with_date("2014-10-01"),
            TimelineEvent::new("APT33", "Shamoon").with_country("Iran").with_date("2017-01-01"),
            TimelineEvent::new("Unknown", "Orphan").with_country("Unknown").with_date("2019-03-01"),
        ]
    }

    async fn app() -> Router {
        let source: Arc<dyn ThreatDataSource> = Arc::new(StaticDataSource::new().with_events(events()));
        let (snapshot, _) = Pipeline::new(source.clone())
            .with_seed(5)
            .run(&mut MemoryRenderer::new())
            .await
            .unwrap();
        router(AppState { snapshot: Arc::new(snapshot), source })
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_json(app().await, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_countries_ranked() {
        let (status, body) = get_json(app().await, "/api/v1/countries?top=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!([{"country": "Russia", "incidents": 2}]));
    }

    #[tokio::test]
    async fn test_summary_and_globe_sentinel() {
        // No gazetteer in the static source, so the globe falls back to sentinels
        let (_, body) = get_json(app().await, "/api/v1/summary").await;
        assert_eq!(body["origin"], "sentinel");
        assert_eq!(body["points"], 3);
        assert_eq!(body["counters"]["incidents"], 3);
        assert_eq!(body["counters"]["events"], 4);

        let (_, body) = get_json(app().await, "/api/v1/globe").await;
        assert_eq!(body["type"], "FeatureCollection");
        assert_eq!(body["features"].as_array().map(Vec::len), Some(3));
        assert_eq!(body["features"][0]["properties"]["sentinel"], true);
    }

    #[tokio::test]
    async fn test_timeline_filters_forwarded() {
        let uri = "/api/v1/timeline?group=apt28&sort=date_asc&include_unknown_groups=false";
        let (status, body) = get_json(app().await, uri).await;
        assert_eq!(status, StatusCode::OK);
        let campaigns: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["campaign"].as_str().unwrap())
            .collect();
        assert_eq!(campaigns, vec!["Sofacy", "Fancy Bear"]);
    }

    #[tokio::test]
    async fn test_timeline_bad_limit() {
        let (status, body) = get_json(app().await, "/api/v1/timeline?limit=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Limit"));
    }

    #[test]
    fn test_transport_error_maps_to_generic_message() {
        let err = ApiError::from(SourceError::Status { url: "http://api".to_string(), status: 500 });
        assert!(matches!(err, ApiError::Unavailable));
    }
}
