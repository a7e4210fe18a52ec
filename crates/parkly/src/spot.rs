//! The parked-car marker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;

/// Default callout title for a parking spot.
pub const DEFAULT_TITLE: &str = "We Parked Here";

/// Default callout subtitle for a parking spot.
pub const DEFAULT_SUBTITLE: &str = "Tap for directions";

/// Where the marked coordinate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkSource {
    /// The device's own location fix.
    DeviceLocation,
    /// A long press on the map surface.
    MapPress,
}

impl std::fmt::Display for MarkSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeviceLocation => write!(f, "device_location"),
            Self::MapPress => write!(f, "map_press"),
        }
    }
}

/// One marked parking location.
///
/// Fields are fixed at construction. A session holds at most one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParkingSpot {
    coordinate: Coordinate,
    title: String,
    subtitle: String,
    source: MarkSource,
    marked_at: DateTime<Utc>,
}

impl ParkingSpot {
    /// Create a spot with the default title and subtitle.
    #[must_use]
    pub fn new(coordinate: Coordinate, source: MarkSource) -> Self {
        Self::with_labels(coordinate, source, DEFAULT_TITLE, DEFAULT_SUBTITLE)
    }

    /// Create a spot with custom callout labels.
    #[must_use]
    pub fn with_labels(
        coordinate: Coordinate,
        source: MarkSource,
        title: impl Into<String>,
        subtitle: impl Into<String>,
    ) -> Self {
        Self {
            coordinate,
            title: title.into(),
            subtitle: subtitle.into(),
            source,
            marked_at: Utc::now(),
        }
    }

    /// Where the car is.
    #[must_use]
    pub const fn coordinate(&self) -> Coordinate {
        self.coordinate
    }

    /// Callout title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Callout subtitle.
    #[must_use]
    pub fn subtitle(&self) -> &str {
        &self.subtitle
    }

    /// How the spot was marked.
    #[must_use]
    pub const fn source(&self) -> MarkSource {
        self.source
    }

    /// When the spot was marked.
    #[must_use]
    pub const fn marked_at(&self) -> DateTime<Utc> {
        self.marked_at
    }
}
