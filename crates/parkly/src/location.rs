//! Device location tracking.
//!
//! [`LocationProvider`] wraps a platform [`PositionSource`], polls it for fixes,
//! applies a distance filter and publishes the latest reported fix to any number
//! of subscribers. "No location" is a normal state here, not an error: callers
//! get `None` from [`LocationProvider::current_location`] until a fix arrives
//! while authorized.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, trace, warn};

use crate::geo::Coordinate;

/// Errors reported by a positioning source.
#[derive(Debug, Error)]
pub enum LocationError {
    /// The platform positioning subsystem failed.
    #[error("positioning source failed: {0}")]
    SourceFailed(String),
}

/// Result type for location operations.
pub type Result<T> = std::result::Result<T, LocationError>;

/// Location permission state as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationState {
    /// The user has not been asked yet.
    NotDetermined,
    /// Access is blocked by policy and the user cannot grant it.
    Restricted,
    /// The user refused access.
    Denied,
    /// Access granted while the app is in use.
    AuthorizedWhenInUse,
    /// Access granted at all times.
    AuthorizedAlways,
}

impl AuthorizationState {
    /// Whether fixes may be reported in this state.
    #[must_use]
    pub const fn is_authorized(self) -> bool {
        matches!(self, Self::AuthorizedWhenInUse | Self::AuthorizedAlways)
    }
}

impl fmt::Display for AuthorizationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotDetermined => write!(f, "not_determined"),
            Self::Restricted => write!(f, "restricted"),
            Self::Denied => write!(f, "denied"),
            Self::AuthorizedWhenInUse => write!(f, "authorized_when_in_use"),
            Self::AuthorizedAlways => write!(f, "authorized_always"),
        }
    }
}

/// One reported fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    /// Where the device was.
    pub coordinate: Coordinate,
    /// Authorization at the time of the fix.
    pub authorization_state: AuthorizationState,
    /// When the fix was reported.
    pub received_at: DateTime<Utc>,
}

/// The platform positioning subsystem.
///
/// Implementors bridge to whatever the host offers (a GPS daemon, a mobile OS
/// location manager, a scripted track). All methods must return promptly.
pub trait PositionSource: Send + Sync + fmt::Debug {
    /// Current permission state.
    fn authorization_state(&self) -> AuthorizationState;

    /// Show the platform permission prompt. Only called while `NotDetermined`.
    fn request_authorization(&self);

    /// The most recent raw fix, if the hardware has one.
    ///
    /// # Errors
    ///
    /// Returns an error if the positioning hardware or service fails.
    fn latest_fix(&self) -> Result<Option<Coordinate>>;
}

/// Configuration for a [`LocationProvider`].
#[derive(Debug, Clone, PartialEq)]
pub struct LocationProviderConfig {
    /// Minimum movement, in meters, before a new fix is reported.
    pub distance_filter_meters: f64,

    /// Interval between source polls.
    pub poll_interval: Duration,
}

impl Default for LocationProviderConfig {
    fn default() -> Self {
        Self {
            distance_filter_meters: 50.0,
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Publishes distance-filtered location fixes from a [`PositionSource`].
#[derive(Debug)]
pub struct LocationProvider {
    source: Arc<dyn PositionSource>,
    config: LocationProviderConfig,
    latest: watch::Sender<Option<LocationSample>>,
    running: Arc<AtomicBool>,
    stop_requested: Arc<AtomicBool>,
}

impl LocationProvider {
    /// Create a provider with default configuration.
    #[must_use]
    pub fn new(source: Arc<dyn PositionSource>) -> Self {
        Self::with_config(source, LocationProviderConfig::default())
    }

    /// Create a provider with custom configuration.
    #[must_use]
    pub fn with_config(source: Arc<dyn PositionSource>, config: LocationProviderConfig) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            source,
            config,
            latest,
            running: Arc::new(AtomicBool::new(false)),
            stop_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The most recent reported fix, or `None` without a fix or permission.
    #[must_use]
    pub fn current_location(&self) -> Option<Coordinate> {
        self.latest_sample().map(|sample| sample.coordinate)
    }

    /// The most recent reported sample, or `None` without a fix or permission.
    #[must_use]
    pub fn latest_sample(&self) -> Option<LocationSample> {
        if !self.authorization_state().is_authorized() {
            return None;
        }
        *self.latest.borrow()
    }

    /// Current permission state.
    #[must_use]
    pub fn authorization_state(&self) -> AuthorizationState {
        self.source.authorization_state()
    }

    /// Ask the platform for permission if the user has not been asked yet.
    pub fn request_authorization(&self) {
        let state = self.authorization_state();
        if state == AuthorizationState::NotDetermined {
            debug!("Requesting location authorization");
            self.source.request_authorization();
        } else {
            trace!(%state, "Authorization already determined, not prompting");
        }
    }

    /// Register for fix notifications. Drop the subscription to unsubscribe.
    #[must_use]
    pub fn subscribe(&self) -> LocationSubscription {
        LocationSubscription {
            rx: self.latest.subscribe(),
        }
    }

    /// Poll the source once and report a new fix if it passes the distance filter.
    ///
    /// Returns `Some(sample)` when a fix was published, `None` when unauthorized,
    /// without a fix, or when the device has not moved far enough.
    ///
    /// # Errors
    ///
    /// Returns an error if the positioning source fails.
    pub fn check_for_update(&self) -> Result<Option<LocationSample>> {
        let authorization_state = self.authorization_state();
        if !authorization_state.is_authorized() {
            trace!(state = %authorization_state, "Location not authorized, skipping poll");
            return Ok(None);
        }

        let Some(fix) = self.source.latest_fix()? else {
            return Ok(None);
        };

        // The borrow must end before send_replace takes the write lock.
        let moved = self
            .latest
            .borrow()
            .as_ref()
            .map(|last| last.coordinate.distance_to(&fix));

        if let Some(moved) = moved {
            if moved < self.config.distance_filter_meters {
                trace!(
                    moved_m = moved,
                    filter_m = self.config.distance_filter_meters,
                    "Fix inside distance filter, not reporting"
                );
                return Ok(None);
            }
        }

        let sample = LocationSample {
            coordinate: fix,
            authorization_state,
            received_at: Utc::now(),
        };
        debug!(location = %fix, "New location fix");
        self.latest.send_replace(Some(sample));
        Ok(Some(sample))
    }

    /// Poll the source until stopped.
    ///
    /// Fixes start flowing as soon as authorization is granted. Calling this while
    /// already running is a no-op. A stop requested before the loop starts is
    /// honored, and a stopped provider stays stopped.
    pub async fn run(&self) {
        if self.stop_requested.load(Ordering::SeqCst) {
            debug!("Location provider stopped before it started");
            return;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Location provider already running");
            return;
        }

        debug!(
            interval_ms = self.config.poll_interval.as_millis(),
            filter_m = self.config.distance_filter_meters,
            "Starting location updates"
        );

        let mut ticker = interval(self.config.poll_interval);
        let mut last_state = None;

        while !self.stop_requested.load(Ordering::SeqCst) {
            ticker.tick().await;
            if self.stop_requested.load(Ordering::SeqCst) {
                break;
            }

            let state = self.authorization_state();
            if last_state != Some(state) {
                debug!(%state, "Location authorization state");
                last_state = Some(state);
            }

            if let Err(e) = self.check_for_update() {
                warn!(error = %e, "Error reading location");
            }
        }

        self.running.store(false, Ordering::SeqCst);
        debug!("Location updates stopped");
    }

    /// Stop the poll loop, whether or not it has started yet.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    /// Whether the poll loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get a handle that can stop the poll loop from another task.
    #[must_use]
    pub fn stop_handle(&self) -> LocationProviderHandle {
        LocationProviderHandle {
            running: Arc::clone(&self.running),
            stop_requested: Arc::clone(&self.stop_requested),
        }
    }
}

/// A handle to control a running [`LocationProvider`].
#[derive(Debug, Clone)]
pub struct LocationProviderHandle {
    running: Arc<AtomicBool>,
    stop_requested: Arc<AtomicBool>,
}

impl LocationProviderHandle {
    /// Stop the associated provider.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    /// Check if the provider is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// A stream of reported fixes.
#[derive(Debug)]
pub struct LocationSubscription {
    rx: watch::Receiver<Option<LocationSample>>,
}

impl LocationSubscription {
    /// Wait for the next reported fix. Returns `None` once the provider is gone.
    pub async fn next(&mut self) -> Option<LocationSample> {
        loop {
            self.rx.changed().await.ok()?;
            if let Some(sample) = *self.rx.borrow_and_update() {
                return Some(sample);
            }
        }
    }
}

/// A [`PositionSource`] driven by explicit calls.
///
/// Used by the simulator and tests. The permission prompt resolves immediately
/// to the configured answer.
#[derive(Debug)]
pub struct ManualPositionSource {
    state: Mutex<ManualState>,
}

#[derive(Debug)]
struct ManualState {
    authorization: AuthorizationState,
    prompt_answer: AuthorizationState,
    fix: Option<Coordinate>,
    prompts: u32,
}

impl ManualPositionSource {
    /// A source in the given authorization state, with no fix.
    #[must_use]
    pub fn new(authorization: AuthorizationState) -> Self {
        Self {
            state: Mutex::new(ManualState {
                authorization,
                prompt_answer: AuthorizationState::AuthorizedWhenInUse,
                fix: None,
                prompts: 0,
            }),
        }
    }

    /// An already-authorized source.
    #[must_use]
    pub fn authorized() -> Self {
        Self::new(AuthorizationState::AuthorizedWhenInUse)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move the device.
    pub fn set_fix(&self, coordinate: Coordinate) {
        self.lock().fix = Some(coordinate);
    }

    /// Lose the fix.
    pub fn clear_fix(&self) {
        self.lock().fix = None;
    }

    /// Change the permission state directly.
    pub fn set_authorization(&self, state: AuthorizationState) {
        self.lock().authorization = state;
    }

    /// What the user answers when prompted.
    pub fn answer_prompt_with(&self, state: AuthorizationState) {
        self.lock().prompt_answer = state;
    }

    /// How many times the prompt was shown.
    #[must_use]
    pub fn prompt_count(&self) -> u32 {
        self.lock().prompts
    }
}

impl PositionSource for ManualPositionSource {
    fn authorization_state(&self) -> AuthorizationState {
        self.lock().authorization
    }

    fn request_authorization(&self) {
        let mut state = self.lock();
        state.prompts += 1;
        if state.authorization == AuthorizationState::NotDetermined {
            state.authorization = state.prompt_answer;
        }
    }

    fn latest_fix(&self) -> Result<Option<Coordinate>> {
        Ok(self.lock().fix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_with(source: &Arc<ManualPositionSource>) -> LocationProvider {
        LocationProvider::new(Arc::clone(source) as Arc<dyn PositionSource>)
    }

    #[test]
    fn test_authorization_state_is_authorized() {
        assert!(AuthorizationState::AuthorizedWhenInUse.is_authorized());
        assert!(AuthorizationState::AuthorizedAlways.is_authorized());
        assert!(!AuthorizationState::NotDetermined.is_authorized());
        assert!(!AuthorizationState::Denied.is_authorized());
        assert!(!AuthorizationState::Restricted.is_authorized());
    }

    #[test]
    fn test_authorization_state_display() {
        assert_eq!(AuthorizationState::Denied.to_string(), "denied");
        assert_eq!(
            AuthorizationState::AuthorizedWhenInUse.to_string(),
            "authorized_when_in_use"
        );
    }

    #[test]
    fn test_no_location_before_first_fix() {
        let source = Arc::new(ManualPositionSource::authorized());
        let provider = provider_with(&source);
        assert!(provider.current_location().is_none());
        assert!(provider.check_for_update().unwrap().is_none());
        assert!(provider.current_location().is_none());
    }

    #[test]
    fn test_first_fix_always_reported() {
        let source = Arc::new(ManualPositionSource::authorized());
        let provider = provider_with(&source);
        source.set_fix(Coordinate::new(37.0, -122.0));

        let sample = provider.check_for_update().unwrap().unwrap();
        assert_eq!(sample.coordinate, Coordinate::new(37.0, -122.0));
        assert_eq!(
            sample.authorization_state,
            AuthorizationState::AuthorizedWhenInUse
        );
        assert_eq!(provider.current_location(), Some(Coordinate::new(37.0, -122.0)));
    }

    #[test]
    fn test_distance_filter_suppresses_small_moves() {
        let source = Arc::new(ManualPositionSource::authorized());
        let provider = provider_with(&source);
        source.set_fix(Coordinate::new(37.0, -122.0));
        provider.check_for_update().unwrap();

        // ~11 m north
        source.set_fix(Coordinate::new(37.0001, -122.0));
        assert!(provider.check_for_update().unwrap().is_none());
        assert_eq!(provider.current_location(), Some(Coordinate::new(37.0, -122.0)));

        // ~111 m north of the last reported fix
        source.set_fix(Coordinate::new(37.001, -122.0));
        assert!(provider.check_for_update().unwrap().is_some());
        assert_eq!(provider.current_location(), Some(Coordinate::new(37.001, -122.0)));
    }

    #[test]
    fn test_filter_measures_from_last_reported_fix() {
        let source = Arc::new(ManualPositionSource::authorized());
        let provider = provider_with(&source);
        source.set_fix(Coordinate::new(0.0, 0.0));
        provider.check_for_update().unwrap();

        // Two 33 m steps: the second crosses 50 m from the reported origin.
        source.set_fix(Coordinate::new(0.0003, 0.0));
        assert!(provider.check_for_update().unwrap().is_none());
        source.set_fix(Coordinate::new(0.0006, 0.0));
        assert!(provider.check_for_update().unwrap().is_some());
    }

    #[test]
    fn test_denied_never_reports() {
        let source = Arc::new(ManualPositionSource::new(AuthorizationState::Denied));
        let provider = provider_with(&source);
        source.set_fix(Coordinate::new(37.0, -122.0));

        assert!(provider.check_for_update().unwrap().is_none());
        assert!(provider.current_location().is_none());
    }

    #[test]
    fn test_revoked_permission_hides_location() {
        let source = Arc::new(ManualPositionSource::authorized());
        let provider = provider_with(&source);
        source.set_fix(Coordinate::new(37.0, -122.0));
        provider.check_for_update().unwrap();
        assert!(provider.current_location().is_some());

        source.set_authorization(AuthorizationState::Denied);
        assert!(provider.current_location().is_none());
    }

    #[test]
    fn test_request_authorization_prompts_once() {
        let source = Arc::new(ManualPositionSource::new(AuthorizationState::NotDetermined));
        let provider = provider_with(&source);

        provider.request_authorization();
        assert_eq!(source.prompt_count(), 1);
        assert_eq!(
            provider.authorization_state(),
            AuthorizationState::AuthorizedWhenInUse
        );

        // Already determined: no second prompt.
        provider.request_authorization();
        assert_eq!(source.prompt_count(), 1);
    }

    #[test]
    fn test_request_authorization_denied_answer() {
        let source = Arc::new(ManualPositionSource::new(AuthorizationState::NotDetermined));
        source.answer_prompt_with(AuthorizationState::Denied);
        let provider = provider_with(&source);

        provider.request_authorization();
        assert_eq!(provider.authorization_state(), AuthorizationState::Denied);
        provider.request_authorization();
        assert_eq!(source.prompt_count(), 1);
    }

    #[derive(Debug)]
    struct BrokenSource;

    impl PositionSource for BrokenSource {
        fn authorization_state(&self) -> AuthorizationState {
            AuthorizationState::AuthorizedAlways
        }

        fn request_authorization(&self) {}

        fn latest_fix(&self) -> Result<Option<Coordinate>> {
            Err(LocationError::SourceFailed("gps offline".to_string()))
        }
    }

    #[test]
    fn test_source_failure_propagates() {
        let provider = LocationProvider::new(Arc::new(BrokenSource));
        let err = provider.check_for_update().unwrap_err();
        assert!(err.to_string().contains("gps offline"));
        assert!(provider.current_location().is_none());
    }

    #[tokio::test]
    async fn test_subscribers_all_notified() {
        let source = Arc::new(ManualPositionSource::authorized());
        let provider = provider_with(&source);
        let mut first = provider.subscribe();
        let mut second = provider.subscribe();

        source.set_fix(Coordinate::new(37.0, -122.0));
        provider.check_for_update().unwrap();

        assert_eq!(
            first.next().await.map(|s| s.coordinate),
            Some(Coordinate::new(37.0, -122.0))
        );
        assert_eq!(
            second.next().await.map(|s| s.coordinate),
            Some(Coordinate::new(37.0, -122.0))
        );
    }

    #[tokio::test]
    async fn test_subscription_ends_with_provider() {
        let source = Arc::new(ManualPositionSource::authorized());
        let provider = provider_with(&source);
        let mut sub = provider.subscribe();
        drop(provider);
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn test_run_publishes_and_stops() {
        let source = Arc::new(ManualPositionSource::authorized());
        let provider = Arc::new(LocationProvider::with_config(
            Arc::clone(&source) as Arc<dyn PositionSource>,
            LocationProviderConfig {
                distance_filter_meters: 50.0,
                poll_interval: Duration::from_millis(5),
            },
        ));
        let mut sub = provider.subscribe();
        let handle = provider.stop_handle();

        let task = tokio::spawn({
            let provider = Arc::clone(&provider);
            async move { provider.run().await }
        });

        source.set_fix(Coordinate::new(37.0, -122.0));
        let sample = tokio::time::timeout(Duration::from_secs(2), sub.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sample.coordinate, Coordinate::new(37.0, -122.0));
        assert!(handle.is_running());

        handle.stop();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert!(!provider.is_running());
    }

    #[tokio::test]
    async fn test_stop_before_run_is_honored() {
        let source = Arc::new(ManualPositionSource::authorized());
        let provider = Arc::new(provider_with(&source));
        let handle = provider.stop_handle();
        handle.stop();

        let task = tokio::spawn({
            let provider = Arc::clone(&provider);
            async move { provider.run().await }
        });
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert!(!provider.is_running());
        assert!(!handle.is_running());
    }
}
