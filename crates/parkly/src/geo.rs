//! Geographic value types shared by the location, directions and session layers.
//!
//! Coordinates are plain `(latitude, longitude)` pairs in degrees. The valid range
//! (-90..=90, -180..=180) is assumed rather than enforced, except when parsing
//! user-supplied text.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Mean Earth radius in meters (IUGG).
const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// A point on the Earth's surface, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees, positive north.
    pub latitude: f64,
    /// Longitude in degrees, positive east.
    pub longitude: f64,
}

impl Coordinate {
    /// Create a coordinate without range checks.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance to `other` in meters (haversine).
    #[must_use]
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_METERS * a.sqrt().asin()
    }

    /// Whether both components are finite and inside their valid ranges.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

impl FromStr for Coordinate {
    type Err = Error;

    /// Parse `"lat,lon"` text, rejecting out-of-range values.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lon) = s
            .split_once(',')
            .ok_or_else(|| Error::invalid_coordinate(s, "expected LAT,LON"))?;

        let latitude: f64 = lat
            .trim()
            .parse()
            .map_err(|_| Error::invalid_coordinate(s, "latitude is not a number"))?;
        let longitude: f64 = lon
            .trim()
            .parse()
            .map_err(|_| Error::invalid_coordinate(s, "longitude is not a number"))?;

        let coordinate = Self::new(latitude, longitude);
        if !coordinate.is_valid() {
            return Err(Error::invalid_coordinate(s, "out of range"));
        }

        Ok(coordinate)
    }
}

/// A map region centered on a coordinate with a span in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Center of the visible area.
    pub center: Coordinate,
    /// North-south extent in meters.
    pub latitudinal_meters: f64,
    /// East-west extent in meters.
    pub longitudinal_meters: f64,
}

impl Region {
    /// A square region of `span_meters` on each side.
    #[must_use]
    pub const fn around(center: Coordinate, span_meters: f64) -> Self {
        Self {
            center,
            latitudinal_meters: span_meters,
            longitudinal_meters: span_meters,
        }
    }
}

/// Axis-aligned latitude/longitude bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingRegion {
    /// South-west corner.
    pub min: Coordinate,
    /// North-east corner.
    pub max: Coordinate,
}

impl BoundingRegion {
    /// Smallest bounds containing every point, or `None` for an empty slice.
    #[must_use]
    pub fn enclosing(points: &[Coordinate]) -> Option<Self> {
        let first = points.first()?;
        let init = Self {
            min: *first,
            max: *first,
        };

        Some(points.iter().skip(1).fold(init, |acc, p| Self {
            min: Coordinate::new(acc.min.latitude.min(p.latitude), acc.min.longitude.min(p.longitude)),
            max: Coordinate::new(acc.max.latitude.max(p.latitude), acc.max.longitude.max(p.longitude)),
        }))
    }

    /// Midpoint of the bounds.
    #[must_use]
    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            (self.min.latitude + self.max.latitude) / 2.0,
            (self.min.longitude + self.max.longitude) / 2.0,
        )
    }

    /// Attach display padding.
    #[must_use]
    pub const fn padded(self, padding: EdgePadding) -> PaddedRegion {
        PaddedRegion {
            bounds: self,
            padding,
        }
    }
}

/// Screen-space insets, in display units, kept clear around drawn content.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgePadding {
    /// Top inset.
    pub top: f64,
    /// Left inset.
    pub left: f64,
    /// Bottom inset.
    pub bottom: f64,
    /// Right inset.
    pub right: f64,
}

impl Default for EdgePadding {
    fn default() -> Self {
        Self {
            top: 200.0,
            left: 50.0,
            bottom: 50.0,
            right: 50.0,
        }
    }
}

impl EdgePadding {
    /// Whether every inset is finite and non-negative.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        [self.top, self.left, self.bottom, self.right]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
    }
}

/// Bounds plus the padding a map surface should keep around them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaddedRegion {
    /// Geographic bounds to fit.
    pub bounds: BoundingRegion,
    /// Screen insets.
    pub padding: EdgePadding,
}
