//! Walking directions.
//!
//! Routing itself is delegated to a [`DirectionsProvider`]. This module defines
//! the route model, the provider seam and [`compute_walking_route`], which turns
//! a provider's raw answer into exactly one route or a [`DirectionsError`].

mod direct;
mod openroute;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::geo::{BoundingRegion, Coordinate};

pub use direct::DirectRouteProvider;
pub use openroute::{OpenRouteServiceProvider, DEFAULT_BASE_URL as OPENROUTE_BASE_URL};

/// Why no route came back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectionsError {
    /// The provider answered but had no route between the points.
    #[error("no route found")]
    NoRouteFound,

    /// The provider could not be reached or failed.
    #[error("directions provider unavailable: {0}")]
    ProviderUnavailable(String),
}

impl DirectionsError {
    /// Create a provider-unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::ProviderUnavailable(message.into())
    }
}

/// Result type for directions operations.
pub type Result<T> = std::result::Result<T, DirectionsError>;

/// How the route will be travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportType {
    /// On foot.
    Walking,
}

/// One routing query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionsRequest {
    /// Start point.
    pub source: Coordinate,
    /// End point.
    pub destination: Coordinate,
    /// Travel mode.
    pub transport_type: TransportType,
}

impl DirectionsRequest {
    /// A walking request between two points.
    #[must_use]
    pub const fn walking(source: Coordinate, destination: Coordinate) -> Self {
        Self {
            source,
            destination,
            transport_type: TransportType::Walking,
        }
    }
}

/// One turn-by-turn instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStep {
    /// Length of this step in meters.
    pub distance_meters: f64,
    /// Human-readable instruction.
    pub instructions: String,
}

/// A computed route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Path geometry, start to end.
    pub polyline: Vec<Coordinate>,
    /// Turn-by-turn steps in travel order.
    pub steps: Vec<RouteStep>,
    /// Bounds of the polyline.
    pub bounding_region: BoundingRegion,
    /// Total length in meters.
    pub distance_meters: f64,
    /// Expected travel time.
    #[serde(with = "duration_secs")]
    pub expected_travel_time: Duration,
}

impl Route {
    /// Build a route, deriving its bounds from the polyline.
    ///
    /// Returns `None` for an empty polyline.
    #[must_use]
    pub fn new(
        polyline: Vec<Coordinate>,
        steps: Vec<RouteStep>,
        distance_meters: f64,
        expected_travel_time: Duration,
    ) -> Option<Self> {
        let bounding_region = BoundingRegion::enclosing(&polyline)?;
        Some(Self {
            polyline,
            steps,
            bounding_region,
            distance_meters,
            expected_travel_time,
        })
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

/// An external routing service.
///
/// Each call is independent; implementors hold no per-request state.
#[async_trait::async_trait]
pub trait DirectionsProvider: Send + Sync + std::fmt::Debug {
    /// Name for logs.
    fn name(&self) -> &'static str;

    /// Compute candidate routes, best first. An empty list means no route.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot answer.
    async fn calculate(&self, request: DirectionsRequest) -> Result<Vec<Route>>;
}

/// Compute one walking route from `from` to `to`.
///
/// # Errors
///
/// Returns [`DirectionsError::NoRouteFound`] when the provider answers with no
/// routes, or the provider's own error.
pub async fn compute_walking_route(
    provider: &dyn DirectionsProvider,
    from: Coordinate,
    to: Coordinate,
) -> Result<Route> {
    let request = DirectionsRequest::walking(from, to);
    debug!(provider = provider.name(), %from, %to, "Requesting walking route");

    let routes = provider.calculate(request).await?;
    routes.into_iter().next().ok_or(DirectionsError::NoRouteFound)
}
