//! Offline straight-line provider.
//!
//! Produces a single leg from source to destination. Useful when no hosted
//! routing service is configured; it does not follow footpaths.

use std::time::Duration;

use super::{DirectionsProvider, DirectionsRequest, Result, Route, RouteStep};

/// Average walking speed in meters per second.
const WALKING_SPEED_MPS: f64 = 1.4;

/// A provider that answers with the direct line between the two points.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectRouteProvider;

impl DirectRouteProvider {
    /// Create a direct-line provider.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl DirectionsProvider for DirectRouteProvider {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn calculate(&self, request: DirectionsRequest) -> Result<Vec<Route>> {
        let distance = request.source.distance_to(&request.destination);
        let step = RouteStep {
            distance_meters: distance,
            instructions: format!("Walk {distance:.0} m to your car"),
        };
        let travel_time =
            Duration::try_from_secs_f64(distance / WALKING_SPEED_MPS).unwrap_or_default();

        Ok(Route::new(
            vec![request.source, request.destination],
            vec![step],
            distance,
            travel_time,
        )
        .into_iter()
        .collect())
    }
}
