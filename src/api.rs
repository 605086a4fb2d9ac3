use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::{Html, IntoResponse},
    routing::get,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::area::WayArea;
use crate::coords::LatLon;
use crate::error::ApiError;
use crate::overpass::WaySource;

pub const API_V1: &str = "/api/v1";

/// Default extension when the caller doesn't pass one.
pub const DEFAULT_EXTENSION_METERS: f64 = 1000.0;

// Shared State for concurrency
pub struct AppState {
    pub ways: Arc<dyn WaySource>,
    /// Pre-rendered client-only map page.
    pub map_page: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    // Any origin: the map page may be served from a different host than the API.
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let accidents = Router::new().route("/accident_area", get(accident_area));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/map", get(map_page))
        .route("/way/:way_id/coordinates", get(way_coordinates))
        .nest(&format!("{API_V1}/accidents"), accidents)
        .layer(cors)
        .with_state(state)
}

// --- API DTOs ---

#[derive(Debug, Deserialize)]
pub struct AccidentAreaQuery {
    way_id: i64,
    #[serde(default = "default_extension")]
    extension_meters: f64,
}

fn default_extension() -> f64 {
    DEFAULT_EXTENSION_METERS
}

// --- Handlers ---

async fn root() -> Json<Value> {
    Json(json!({ "message": "Welcome to Accident Area API" }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

async fn map_page(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Html(state.map_page.clone())
}

/// Raw node coordinates of a way, in way order.
async fn way_coordinates(
    State(state): State<Arc<AppState>>,
    Path(way_id): Path<i64>,
) -> Result<Json<Vec<LatLon>>, ApiError> {
    Ok(Json(fetch_way(&state, way_id).await?))
}

async fn accident_area(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AccidentAreaQuery>,
) -> Result<Json<Vec<LatLon>>, ApiError> {
    let way_id = query.way_id;

    let coordinates = fetch_way(&state, way_id).await?;

    let area = WayArea::new(&coordinates).accident_area(query.extension_meters)?;
    info!(
        way_id,
        nodes = coordinates.len(),
        extension_meters = query.extension_meters,
        points = area.len(),
        "Accident area computed"
    );

    Ok(Json(area))
}

async fn fetch_way(state: &AppState, way_id: i64) -> Result<Vec<LatLon>, ApiError> {
    match state.ways.way_coordinates(way_id).await {
        Ok(Some(coords)) if !coords.is_empty() => Ok(coords),
        Ok(_) => Err(ApiError::WayNotFound),
        Err(e) => {
            warn!(way_id, error = %e, "Failed to fetch way geometry");
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::error::OverpassError;

    struct MemoryWays(HashMap<i64, Vec<LatLon>>);

    #[async_trait]
    impl WaySource for MemoryWays {
        async fn way_coordinates(&self, way_id: i64) -> Result<Option<Vec<LatLon>>, OverpassError> {
            if way_id < 0 {
                return Err(OverpassError::Status(504));
            }
            Ok(self.0.get(&way_id).cloned())
        }
    }

    fn app() -> Router {
        let mut ways = HashMap::new();
        ways.insert(
            1,
            vec![
                LatLon::new(55.750, 37.610),
                LatLon::new(55.750, 37.611),
                LatLon::new(55.751, 37.611),
            ],
        );
        ways.insert(2, vec![LatLon::new(55.750, 37.610)]);
        ways.insert(3, vec![]);

        router(Arc::new(AppState {
            ways: Arc::new(MemoryWays(ways)),
            map_page: "<div id=\"map\"></div>".to_string(),
        }))
    }

    async fn fetch(uri: &str) -> (StatusCode, Vec<u8>) {
        let resp = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn health_reports_healthy() {
        let (status, body) = fetch("/health").await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
    }

    #[tokio::test]
    async fn accident_area_returns_closed_ring() {
        let (status, body) = fetch("/api/v1/accidents/accident_area?way_id=1&extension_meters=50").await;
        assert_eq!(status, StatusCode::OK);

        let ring: Vec<[f64; 2]> = serde_json::from_slice(&body).unwrap();
        assert!(ring.len() >= 4);
        assert_eq!(ring.first(), ring.last());
    }

    #[tokio::test]
    async fn extension_defaults_to_a_kilometre() {
        let (status, body) = fetch("/api/v1/accidents/accident_area?way_id=1").await;
        assert_eq!(status, StatusCode::OK);

        let ring: Vec<LatLon> = serde_json::from_slice(&body).unwrap();
        let south = ring.iter().map(|p| p.lat).fold(f64::INFINITY, f64::min);
        // 1 km is roughly 0.009 degrees of latitude.
        assert!(south < 55.750 - 0.008);
    }

    #[tokio::test]
    async fn unknown_or_empty_way_is_not_found() {
        for uri in [
            "/api/v1/accidents/accident_area?way_id=404",
            "/api/v1/accidents/accident_area?way_id=3",
        ] {
            let (status, body) = fetch(uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            let json: Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(json["detail"], "Way not found or has no coordinates");
        }
    }

    #[tokio::test]
    async fn single_node_way_is_unprocessable() {
        let (status, _) = fetch("/api/v1/accidents/accident_area?way_id=2").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn non_finite_extension_is_unprocessable() {
        for value in ["NaN", "inf", "-inf"] {
            let uri = format!("/api/v1/accidents/accident_area?way_id=1&extension_meters={value}");
            let (status, body) = fetch(&uri).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{value}");
            let json: Value = serde_json::from_slice(&body).unwrap();
            assert!(json["detail"].as_str().unwrap().contains("extension_meters"));
        }
    }

    #[tokio::test]
    async fn way_coordinates_are_returned_in_order() {
        let (status, body) = fetch("/way/1/coordinates").await;
        assert_eq!(status, StatusCode::OK);
        let coords: Vec<LatLon> = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            coords,
            vec![
                LatLon::new(55.750, 37.610),
                LatLon::new(55.750, 37.611),
                LatLon::new(55.751, 37.611),
            ]
        );

        let (status, _) = fetch("/way/404/coordinates").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = fetch("/way/-1/coordinates").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn overpass_failure_is_bad_gateway() {
        let (status, _) = fetch("/api/v1/accidents/accident_area?way_id=-1").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn missing_way_id_is_rejected() {
        let (status, _) = fetch("/api/v1/accidents/accident_area").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn map_page_is_served() {
        let (status, body) = fetch("/map").await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8(body).unwrap().contains("id=\"map\""));
    }
}
