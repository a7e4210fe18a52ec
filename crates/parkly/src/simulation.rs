//! Scripted parking sessions.
//!
//! Plays a park, walk away and find-the-car sequence against a
//! [`ManualPositionSource`] so the whole workflow can be exercised without a
//! device or a map.

use std::sync::Arc;

use tracing::debug;

use crate::config::Config;
use crate::directions::Route;
use crate::error::Result;
use crate::geo::Coordinate;
use crate::location::{AuthorizationState, LocationProvider, ManualPositionSource, PositionSource};
use crate::session::{Intent, ParkingSessionController, SessionEvent, SessionState};

/// What to simulate.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationPlan {
    /// Where the device is when parking.
    pub park: Coordinate,
    /// Mark this map coordinate by long press instead of the device location.
    pub long_press: Option<Coordinate>,
    /// Where the user walks before asking for directions.
    pub walk_to: Option<Coordinate>,
    /// Number of fixes along the walk.
    pub legs: u32,
    /// The answer to the location permission prompt.
    pub authorization: AuthorizationState,
}

impl SimulationPlan {
    /// Park at `park` with location access granted, without walking away.
    #[must_use]
    pub const fn new(park: Coordinate) -> Self {
        Self {
            park,
            long_press: None,
            walk_to: None,
            legs: 4,
            authorization: AuthorizationState::AuthorizedWhenInUse,
        }
    }

    /// Evenly spaced fixes from the parking spot to `walk_to`, end inclusive.
    #[must_use]
    pub fn walk(&self) -> Vec<Coordinate> {
        let Some(end) = self.walk_to else {
            return Vec::new();
        };
        let legs = self.legs.max(1);
        (1..=legs)
            .map(|i| {
                if i == legs {
                    return end;
                }
                let t = f64::from(i) / f64::from(legs);
                Coordinate::new(
                    self.park.latitude + (end.latitude - self.park.latitude) * t,
                    self.park.longitude + (end.longitude - self.park.longitude) * t,
                )
            })
            .collect()
    }
}

/// Everything a simulated session produced.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    /// Events in emission order.
    pub events: Vec<SessionEvent>,
    /// State at the end of the run.
    pub final_state: SessionState,
    /// The route drawn at the end, if any.
    pub route: Option<Route>,
}

/// Run `plan` with the providers and settings from `config`.
///
/// # Errors
///
/// Returns an error if the configured directions provider cannot be built.
pub async fn simulate(config: &Config, plan: &SimulationPlan) -> Result<SimulationReport> {
    let source = Arc::new(ManualPositionSource::new(AuthorizationState::NotDetermined));
    source.answer_prompt_with(plan.authorization);

    let location = Arc::new(LocationProvider::with_config(
        Arc::clone(&source) as Arc<dyn PositionSource>,
        config.location_provider_config(),
    ));
    location.request_authorization();
    debug!(state = %location.authorization_state(), "Simulated permission prompt answered");

    let mut controller = ParkingSessionController::new(
        Arc::clone(&location),
        config.directions_provider()?,
        config.session_config(),
    );
    let mut events = Vec::new();

    let move_to = |controller: &mut ParkingSessionController,
                   coordinate: Coordinate|
     -> Result<Vec<SessionEvent>> {
        source.set_fix(coordinate);
        Ok(match location.check_for_update()? {
            Some(sample) => controller.on_location_update(&sample),
            None => Vec::new(),
        })
    };

    events.extend(move_to(&mut controller, plan.park)?);

    let mark = match plan.long_press {
        Some(coordinate) => Intent::LongPressAt { coordinate },
        None => Intent::TogglePark,
    };
    events.extend(controller.handle(mark));

    for fix in plan.walk() {
        events.extend(move_to(&mut controller, fix)?);
    }

    events.extend(controller.handle(Intent::RequestDirections));
    if controller.session().directions_in_flight() {
        if let Some(completion) = controller.next_completion().await {
            events.extend(controller.complete_directions(completion));
        }
    }

    Ok(SimulationReport {
        events,
        final_state: controller.state(),
        route: controller.session().pending_route().cloned(),
    })
}
