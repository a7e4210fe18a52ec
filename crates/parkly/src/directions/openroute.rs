//! `OpenRouteService` walking directions.

use std::fmt;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{DirectionsError, DirectionsProvider, DirectionsRequest, Result, Route, RouteStep};
use crate::geo::Coordinate;

/// Public API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openrouteservice.org";

/// "Route could not be found" and "point not found" API error codes.
const NO_ROUTE_CODES: [u32; 2] = [2009, 2010];

/// Hosted directions from openrouteservice.org using the `foot-walking` profile.
pub struct OpenRouteServiceProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl fmt::Debug for OpenRouteServiceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenRouteServiceProvider")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl OpenRouteServiceProvider {
    /// Create a provider for `base_url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DirectionsError::unavailable(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v2/directions/foot-walking/geojson", self.base_url)
    }
}

#[async_trait::async_trait]
impl DirectionsProvider for OpenRouteServiceProvider {
    fn name(&self) -> &'static str {
        "openroute"
    }

    async fn calculate(&self, request: DirectionsRequest) -> Result<Vec<Route>> {
        let url = self.endpoint();
        let body = json!({
            "coordinates": [
                [request.source.longitude, request.source.latitude],
                [request.destination.longitude, request.destination.latitude]
            ],
            "instructions": true
        });

        debug!(url = %url, "Calling openrouteservice directions");

        let response = self
            .client
            .post(&url)
            .header("Authorization", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Directions request failed");
                DirectionsError::unavailable(e.to_string())
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| DirectionsError::unavailable(e.to_string()))?;

        if !status.is_success() {
            return Err(interpret_error(status, &text));
        }

        parse_routes(&text)
    }
}

#[derive(Deserialize)]
struct ErrorPayload {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    code: u32,
    message: String,
}

#[derive(Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    geometry: Geometry,
    properties: Properties,
}

#[derive(Deserialize)]
struct Geometry {
    coordinates: Vec<Vec<f64>>,
}

#[derive(Deserialize)]
struct Properties {
    #[serde(default)]
    segments: Vec<Segment>,
    #[serde(default)]
    summary: Summary,
}

#[derive(Deserialize)]
struct Segment {
    #[serde(default)]
    steps: Vec<Step>,
}

#[derive(Deserialize)]
struct Step {
    distance: f64,
    instruction: String,
}

#[derive(Deserialize, Default)]
struct Summary {
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    duration: f64,
}

/// Map a non-success response to a directions error.
fn interpret_error(status: StatusCode, text: &str) -> DirectionsError {
    match serde_json::from_str::<ErrorPayload>(text) {
        Ok(payload) if NO_ROUTE_CODES.contains(&payload.error.code) => {
            debug!(code = payload.error.code, message = %payload.error.message, "No walking route");
            DirectionsError::NoRouteFound
        }
        Ok(payload) => {
            warn!(code = payload.error.code, message = %payload.error.message, "Directions API error");
            DirectionsError::unavailable(format!(
                "API error (code {}): {}",
                payload.error.code, payload.error.message
            ))
        }
        Err(_) => {
            warn!(%status, "Directions API returned an unstructured error");
            DirectionsError::unavailable(format!("HTTP {status}"))
        }
    }
}

/// Convert a GeoJSON directions response into routes.
fn parse_routes(text: &str) -> Result<Vec<Route>> {
    let collection: FeatureCollection = serde_json::from_str(text)
        .map_err(|e| DirectionsError::unavailable(format!("malformed response: {e}")))?;

    Ok(collection
        .features
        .into_iter()
        .filter_map(|feature| {
            let polyline = feature
                .geometry
                .coordinates
                .iter()
                .filter_map(|position| match position.as_slice() {
                    [lon, lat, ..] => Some(Coordinate::new(*lat, *lon)),
                    _ => None,
                })
                .collect();

            let steps = feature
                .properties
                .segments
                .into_iter()
                .flat_map(|segment| segment.steps)
                .map(|step| RouteStep {
                    distance_meters: step.distance,
                    instructions: step.instruction,
                })
                .collect();

            let summary = feature.properties.summary;
            let travel_time = Duration::try_from_secs_f64(summary.duration).unwrap_or_default();
            Route::new(polyline, steps, summary.distance, travel_time)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "bbox": [-122.001, 37.0, -122.0, 37.001],
        "features": [{
            "type": "Feature",
            "bbox": [-122.001, 37.0, -122.0, 37.001],
            "properties": {
                "segments": [{
                    "distance": 160.2,
                    "duration": 115.3,
                    "steps": [
                        {"distance": 80.1, "duration": 57.6, "type": 11, "instruction": "Head south on Main Street", "name": "Main Street", "way_points": [0, 1]},
                        {"distance": 80.1, "duration": 57.7, "type": 1, "instruction": "Turn right onto Oak Avenue", "name": "Oak Avenue", "way_points": [1, 2]},
                        {"distance": 0.0, "duration": 0.0, "type": 10, "instruction": "Arrive at Oak Avenue", "name": "-", "way_points": [2, 2]}
                    ]
                }],
                "summary": {"distance": 160.2, "duration": 115.3},
                "way_points": [0, 2]
            },
            "geometry": {
                "coordinates": [[-122.001, 37.001], [-122.001, 37.0], [-122.0, 37.0, 12.5]],
                "type": "LineString"
            }
        }]
    }"#;

    #[test]
    fn test_parse_routes() {
        let routes = parse_routes(SAMPLE).unwrap();
        assert_eq!(routes.len(), 1);

        let route = &routes[0];
        assert_eq!(route.polyline.len(), 3);
        assert_eq!(route.polyline[0], Coordinate::new(37.001, -122.001));
        assert_eq!(route.polyline[2], Coordinate::new(37.0, -122.0));
        assert_eq!(route.steps.len(), 3);
        assert_eq!(route.steps[1].instructions, "Turn right onto Oak Avenue");
        assert!((route.distance_meters - 160.2).abs() < 1e-9);
        assert!((route.expected_travel_time.as_secs_f64() - 115.3).abs() < 1e-6);
        assert_eq!(route.bounding_region.min, Coordinate::new(37.0, -122.001));
    }

    #[test]
    fn test_parse_routes_empty_collection() {
        let routes = parse_routes(r#"{"type": "FeatureCollection", "features": []}"#).unwrap();
        assert!(routes.is_empty());
    }

    #[test]
    fn test_parse_routes_skips_empty_geometry() {
        let text = r#"{"features": [{"geometry": {"coordinates": []}, "properties": {}}]}"#;
        assert!(parse_routes(text).unwrap().is_empty());
    }

    #[test]
    fn test_parse_routes_malformed() {
        let err = parse_routes("<html>").unwrap_err();
        assert!(matches!(err, DirectionsError::ProviderUnavailable(_)));
    }

    #[test]
    fn test_interpret_no_route_code() {
        let text = r#"{"error": {"code": 2009, "message": "Route could not be found"}}"#;
        assert_eq!(
            interpret_error(StatusCode::NOT_FOUND, text),
            DirectionsError::NoRouteFound
        );
        let text = r#"{"error": {"code": 2010, "message": "Could not find routable point"}}"#;
        assert_eq!(
            interpret_error(StatusCode::NOT_FOUND, text),
            DirectionsError::NoRouteFound
        );
    }

    #[test]
    fn test_interpret_other_api_error() {
        let text = r#"{"error": {"code": 2004, "message": "Request parameters exceed the server configuration limits"}}"#;
        let err = interpret_error(StatusCode::BAD_REQUEST, text);
        assert!(err.to_string().contains("2004"));
    }

    #[test]
    fn test_interpret_unstructured_error() {
        let err = interpret_error(StatusCode::FORBIDDEN, "Access denied");
        assert!(err.to_string().contains("403"));
    }

    #[test]
    fn test_debug_redacts_key() {
        let provider =
            OpenRouteServiceProvider::new("secret-key", DEFAULT_BASE_URL, Duration::from_secs(5))
                .unwrap();
        let debug = format!("{provider:?}");
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let provider =
            OpenRouteServiceProvider::new("key", "http://localhost:8080/", Duration::from_secs(5))
                .unwrap();
        assert_eq!(
            provider.endpoint(),
            "http://localhost:8080/v2/directions/foot-walking/geojson"
        );
    }

    #[tokio::test]
    async fn test_unreachable_service_is_unavailable() {
        let provider =
            OpenRouteServiceProvider::new("key", "http://127.0.0.1:9", Duration::from_secs(1))
                .unwrap();
        let err = provider
            .calculate(DirectionsRequest::walking(
                Coordinate::new(37.0, -122.0),
                Coordinate::new(37.001, -122.001),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, DirectionsError::ProviderUnavailable(_)));
    }
}
