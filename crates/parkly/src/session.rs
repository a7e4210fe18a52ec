//! The parking session state machine.
//!
//! A [`ParkingSessionController`] owns the one [`ParkingSession`] for a map
//! screen. Every transition is a synchronous method returning the
//! [`SessionEvent`]s a map surface should render, in order. Directions requests
//! run on spawned tasks and report back through a channel the controller owns,
//! so the session itself is only ever touched through `&mut self`.
//!
//! Failures are quiet by default: a missing location fix or a failed route makes
//! the intent a no-op. Set [`SessionConfig::notify_failures`] to get explicit
//! failure events instead.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::directions::{
    self, compute_walking_route, DirectionsError, DirectionsProvider, Route, RouteStep,
};
use crate::geo::{Coordinate, EdgePadding, PaddedRegion, Region};
use crate::location::{LocationProvider, LocationSample};
use crate::spot::{MarkSource, ParkingSpot, DEFAULT_SUBTITLE, DEFAULT_TITLE};

/// Capacity of the directions completion channel.
const COMPLETION_CHANNEL_CAPACITY: usize = 4;

/// A user action on the map screen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    /// Park at the device's current location.
    MarkHere,
    /// Park at a coordinate picked on the map.
    LongPressAt {
        /// The pressed map coordinate.
        coordinate: Coordinate,
    },
    /// Forget the parking spot.
    Clear,
    /// Show walking directions back to the car.
    RequestDirections,
    /// Center the map on the device.
    Recenter,
    /// The park button: park when idle, clear when parked.
    TogglePark,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MarkHere => write!(f, "mark_here"),
            Self::LongPressAt { .. } => write!(f, "long_press_at"),
            Self::Clear => write!(f, "clear"),
            Self::RequestDirections => write!(f, "request_directions"),
            Self::Recenter => write!(f, "recenter"),
            Self::TogglePark => write!(f, "toggle_park"),
        }
    }
}

/// Rendering instructions for the map surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Drop a pin for the parking spot.
    AddAnnotation {
        /// The new spot.
        spot: ParkingSpot,
    },
    /// Remove drawn route overlays.
    RemoveAllOverlays,
    /// Draw a route and fit the map to it.
    DrawRoute {
        /// Route geometry.
        polyline: Vec<Coordinate>,
        /// Bounds to fit, with screen padding.
        region: PaddedRegion,
    },
    /// Enable or disable the directions button.
    SetDirectionsControlEnabled {
        /// New state.
        enabled: bool,
    },
    /// Turn-by-turn steps of the drawn route.
    LogRouteSteps {
        /// Steps in travel order.
        steps: Vec<RouteStep>,
    },
    /// Center the map on a region.
    Recenter {
        /// Region to show.
        region: Region,
    },
    /// A directions request failed. Only emitted with `notify_failures`.
    DirectionsUnavailable {
        /// Why.
        reason: String,
    },
    /// An intent needed a location fix and none was available. Only emitted with
    /// `notify_failures`.
    LocationUnavailable {
        /// The intent that was ignored.
        action: String,
    },
}

/// Whether a car is parked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No spot marked.
    Idle,
    /// One spot marked.
    Parked,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Parked => write!(f, "parked"),
        }
    }
}

/// Session state: zero or one spot, the last route, and the in-flight flag.
#[derive(Debug, Clone, Default)]
pub struct ParkingSession {
    spot: Option<ParkingSpot>,
    pending_route: Option<Route>,
    directions_in_flight: bool,
    // Bumped whenever the spot is replaced or cleared.
    generation: u64,
}

impl ParkingSession {
    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        if self.spot.is_some() {
            SessionState::Parked
        } else {
            SessionState::Idle
        }
    }

    /// The marked spot, if any.
    #[must_use]
    pub const fn spot(&self) -> Option<&ParkingSpot> {
        self.spot.as_ref()
    }

    /// The last route drawn for the current spot, if any.
    #[must_use]
    pub const fn pending_route(&self) -> Option<&Route> {
        self.pending_route.as_ref()
    }

    /// Whether a directions request is outstanding.
    #[must_use]
    pub const fn directions_in_flight(&self) -> bool {
        self.directions_in_flight
    }
}

/// Controller settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Span of the region shown when recentering.
    pub recenter_span_meters: f64,
    /// Padding applied when fitting a route.
    pub route_padding: EdgePadding,
    /// Recenter on every reported fix.
    pub follow_user: bool,
    /// Emit failure events instead of silently ignoring failures.
    pub notify_failures: bool,
    /// Marker callout title.
    pub spot_title: String,
    /// Marker callout subtitle.
    pub spot_subtitle: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            recenter_span_meters: 500.0,
            route_padding: EdgePadding::default(),
            follow_user: true,
            notify_failures: false,
            spot_title: DEFAULT_TITLE.to_string(),
            spot_subtitle: DEFAULT_SUBTITLE.to_string(),
        }
    }
}

/// The result of one directions request.
#[derive(Debug)]
pub struct DirectionsCompletion {
    generation: u64,
    result: directions::Result<Route>,
}

impl DirectionsCompletion {
    /// The provider's answer.
    #[must_use]
    pub const fn result(&self) -> &directions::Result<Route> {
        &self.result
    }
}

/// Drives a [`ParkingSession`] from user intents and provider callbacks.
#[derive(Debug)]
pub struct ParkingSessionController {
    location: Arc<LocationProvider>,
    directions: Arc<dyn DirectionsProvider>,
    config: SessionConfig,
    session: ParkingSession,
    completions_tx: mpsc::Sender<DirectionsCompletion>,
    completions_rx: mpsc::Receiver<DirectionsCompletion>,
}

impl ParkingSessionController {
    /// Create an idle controller.
    #[must_use]
    pub fn new(
        location: Arc<LocationProvider>,
        directions: Arc<dyn DirectionsProvider>,
        config: SessionConfig,
    ) -> Self {
        let (completions_tx, completions_rx) = mpsc::channel(COMPLETION_CHANNEL_CAPACITY);
        Self {
            location,
            directions,
            config,
            session: ParkingSession::default(),
            completions_tx,
            completions_rx,
        }
    }

    /// The session as it stands.
    #[must_use]
    pub const fn session(&self) -> &ParkingSession {
        &self.session
    }

    /// Shorthand for `session().state()`.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Apply one intent.
    pub fn handle(&mut self, intent: Intent) -> Vec<SessionEvent> {
        debug!(%intent, state = %self.state(), "Handling intent");
        match intent {
            Intent::MarkHere => self.mark_here(),
            Intent::LongPressAt { coordinate } => self.long_press_at(coordinate),
            Intent::Clear => self.clear(),
            Intent::RequestDirections => self.request_directions(),
            Intent::Recenter => self.recenter(),
            Intent::TogglePark => self.toggle_park(),
        }
    }

    /// Park at the current device location. No-op without a fix.
    pub fn mark_here(&mut self) -> Vec<SessionEvent> {
        let Some(coordinate) = self.location.current_location() else {
            debug!("No location fix, ignoring mark");
            return self.location_unavailable(Intent::MarkHere);
        };
        self.place_spot(coordinate, MarkSource::DeviceLocation)
    }

    /// Park at a coordinate chosen on the map.
    pub fn long_press_at(&mut self, coordinate: Coordinate) -> Vec<SessionEvent> {
        self.place_spot(coordinate, MarkSource::MapPress)
    }

    /// Forget the spot. No-op when idle.
    pub fn clear(&mut self) -> Vec<SessionEvent> {
        if self.session.spot.take().is_none() {
            debug!("Nothing parked, ignoring clear");
            return Vec::new();
        }

        self.session.generation += 1;
        self.session.pending_route = None;
        info!("Parking spot cleared");

        let mut events = vec![
            SessionEvent::RemoveAllOverlays,
            SessionEvent::SetDirectionsControlEnabled { enabled: false },
        ];
        if let Some(region) = self.current_region() {
            events.push(SessionEvent::Recenter { region });
        }
        events
    }

    /// Park when idle, clear when parked.
    pub fn toggle_park(&mut self) -> Vec<SessionEvent> {
        match self.state() {
            SessionState::Idle => self.mark_here(),
            SessionState::Parked => self.clear(),
        }
    }

    /// Center the map on the device. No-op without a fix.
    pub fn recenter(&mut self) -> Vec<SessionEvent> {
        match self.current_region() {
            Some(region) => vec![SessionEvent::Recenter { region }],
            None => self.location_unavailable(Intent::Recenter),
        }
    }

    /// Start a walking-route request from the device to the spot.
    ///
    /// No-op without a fix, without a spot, or while a request is already in
    /// flight. The route arrives later through [`Self::next_completion`] and is
    /// applied with [`Self::complete_directions`]; [`Self::run`] does both.
    ///
    /// Must be called from within a tokio runtime.
    pub fn request_directions(&mut self) -> Vec<SessionEvent> {
        let Some(from) = self.location.current_location() else {
            debug!("No location fix, ignoring directions request");
            return self.location_unavailable(Intent::RequestDirections);
        };
        let Some(to) = self.session.spot.as_ref().map(ParkingSpot::coordinate) else {
            debug!("Nothing parked, ignoring directions request");
            return Vec::new();
        };
        if self.session.directions_in_flight {
            debug!("Directions request already in flight, coalescing");
            return Vec::new();
        }

        self.session.directions_in_flight = true;
        self.session.pending_route = None;

        let provider = Arc::clone(&self.directions);
        let tx = self.completions_tx.clone();
        let generation = self.session.generation;
        tokio::spawn(async move {
            // Routing runs in its own task so a panicking provider still
            // produces a completion and the in-flight flag is released.
            let routing =
                tokio::spawn(async move { compute_walking_route(provider.as_ref(), from, to).await });
            let result = match routing.await {
                Ok(result) => result,
                Err(e) => {
                    warn!(error = %e, "Directions task failed");
                    Err(DirectionsError::unavailable(format!(
                        "directions task failed: {e}"
                    )))
                }
            };
            if tx.send(DirectionsCompletion { generation, result }).await.is_err() {
                debug!("Session controller gone, dropping directions result");
            }
        });

        vec![SessionEvent::RemoveAllOverlays]
    }

    /// Wait for the next directions result.
    pub async fn next_completion(&mut self) -> Option<DirectionsCompletion> {
        self.completions_rx.recv().await
    }

    /// Apply a directions result.
    ///
    /// Always clears the in-flight flag. Results for a spot that has since been
    /// cleared or replaced are dropped.
    pub fn complete_directions(&mut self, completion: DirectionsCompletion) -> Vec<SessionEvent> {
        self.session.directions_in_flight = false;

        if completion.generation != self.session.generation || self.session.spot.is_none() {
            debug!("Spot changed while routing, dropping result");
            return Vec::new();
        }

        match completion.result {
            Ok(route) => {
                info!(
                    distance_m = route.distance_meters,
                    steps = route.steps.len(),
                    "Walking route ready"
                );
                for step in &route.steps {
                    info!(distance_m = step.distance_meters, "{}", step.instructions);
                }

                let events = vec![
                    SessionEvent::DrawRoute {
                        polyline: route.polyline.clone(),
                        region: route.bounding_region.padded(self.config.route_padding),
                    },
                    SessionEvent::LogRouteSteps {
                        steps: route.steps.clone(),
                    },
                ];
                self.session.pending_route = Some(route);
                events
            }
            Err(e) => {
                debug!(error = %e, "No walking route");
                if self.config.notify_failures {
                    vec![SessionEvent::DirectionsUnavailable {
                        reason: e.to_string(),
                    }]
                } else {
                    Vec::new()
                }
            }
        }
    }

    /// React to a reported fix.
    pub fn on_location_update(&mut self, sample: &LocationSample) -> Vec<SessionEvent> {
        if !self.config.follow_user {
            return Vec::new();
        }
        vec![SessionEvent::Recenter {
            region: Region::around(sample.coordinate, self.config.recenter_span_meters),
        }]
    }

    /// Run the controller until `intents` closes or `events` is dropped.
    ///
    /// Intents, location fixes and directions results are applied one at a time
    /// in arrival order. Returns the final session.
    pub async fn run(
        mut self,
        mut intents: mpsc::Receiver<Intent>,
        events: mpsc::Sender<SessionEvent>,
    ) -> ParkingSession {
        let mut locations = self.location.subscribe();
        let mut locations_open = true;

        debug!("Parking session started");

        loop {
            let batch = tokio::select! {
                intent = intents.recv() => match intent {
                    Some(intent) => self.handle(intent),
                    None => break,
                },
                Some(completion) = self.completions_rx.recv() => self.complete_directions(completion),
                sample = locations.next(), if locations_open => match sample {
                    Some(sample) => self.on_location_update(&sample),
                    None => {
                        locations_open = false;
                        Vec::new()
                    }
                },
            };

            for event in batch {
                if events.send(event).await.is_err() {
                    debug!("Event receiver dropped, ending session");
                    return self.session;
                }
            }
        }

        debug!(state = %self.state(), "Parking session ended");
        self.session
    }

    fn place_spot(&mut self, coordinate: Coordinate, source: MarkSource) -> Vec<SessionEvent> {
        let spot = ParkingSpot::with_labels(
            coordinate,
            source,
            self.config.spot_title.clone(),
            self.config.spot_subtitle.clone(),
        );

        self.session.generation += 1;
        self.session.pending_route = None;
        self.session.spot = Some(spot.clone());
        info!(location = %coordinate, %source, "Parked");

        vec![
            SessionEvent::RemoveAllOverlays,
            SessionEvent::AddAnnotation { spot },
            SessionEvent::SetDirectionsControlEnabled { enabled: true },
        ]
    }

    fn current_region(&self) -> Option<Region> {
        self.location
            .current_location()
            .map(|c| Region::around(c, self.config.recenter_span_meters))
    }

    fn location_unavailable(&self, intent: Intent) -> Vec<SessionEvent> {
        if self.config.notify_failures {
            vec![SessionEvent::LocationUnavailable {
                action: intent.to_string(),
            }]
        } else {
            Vec::new()
        }
    }
}
