//! `parkly` - Remember where you parked and walk back to it
//!
//! This library holds the parking-session state machine and the location and
//! directions plumbing it depends on. A map UI feeds [`Intent`]s into a
//! [`ParkingSessionController`] and renders the [`SessionEvent`]s it returns.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod directions;
pub mod error;
pub mod geo;
pub mod location;
pub mod logging;
pub mod session;
pub mod simulation;
pub mod spot;

pub use config::Config;
pub use directions::{compute_walking_route, DirectionsProvider, Route};
pub use error::{Error, Result};
pub use geo::Coordinate;
pub use location::{LocationProvider, PositionSource};
pub use logging::init_logging;
pub use session::{Intent, ParkingSessionController, SessionEvent, SessionState};
pub use spot::ParkingSpot;
