//! Configuration management for parkly.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::directions::{
    DirectRouteProvider, DirectionsProvider, OpenRouteServiceProvider, OPENROUTE_BASE_URL,
};
use crate::error::{Error, Result};
use crate::geo::EdgePadding;
use crate::location::LocationProviderConfig;
use crate::session::SessionConfig;
use crate::spot::{DEFAULT_SUBTITLE, DEFAULT_TITLE};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default config directory name.
const CONFIG_DIR_NAME: &str = "parkly";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `PARKLY_`)
/// 2. TOML config file at `~/.config/parkly/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Location tracking configuration.
    pub location: LocationConfig,
    /// Map presentation configuration.
    pub map: MapConfig,
    /// Parking session configuration.
    pub session: SessionSettings,
    /// Directions provider configuration.
    pub directions: DirectionsConfig,
}

/// Location tracking configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Minimum movement in meters before a new fix is reported.
    pub distance_filter_meters: f64,
    /// Interval between position polls in milliseconds.
    pub poll_interval_ms: u64,
}

/// Map presentation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Width and height, in meters, of the region shown when recentering.
    pub recenter_span_meters: f64,
    /// Screen insets kept clear around a drawn route.
    pub route_padding: EdgePadding,
}

/// Parking session behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Recenter the map on every reported fix.
    pub follow_user: bool,
    /// Emit explicit failure events instead of silently ignoring them.
    pub notify_failures: bool,
    /// Callout title for the parking marker.
    pub spot_title: String,
    /// Callout subtitle for the parking marker.
    pub spot_subtitle: String,
}

/// Which directions backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Straight line, no network.
    #[default]
    Direct,
    /// Hosted openrouteservice.org.
    Openroute,
}

/// Directions provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionsConfig {
    /// Backend selection.
    pub provider: ProviderKind,
    /// API key for hosted providers.
    pub api_key: Option<String>,
    /// Base URL for hosted providers.
    pub base_url: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            distance_filter_meters: 50.0,
            poll_interval_ms: 1000,
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            recenter_span_meters: 500.0,
            route_padding: EdgePadding::default(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            follow_user: true,
            notify_failures: false,
            spot_title: DEFAULT_TITLE.to_string(),
            spot_subtitle: DEFAULT_SUBTITLE.to_string(),
        }
    }
}

impl Default for DirectionsConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Direct,
            api_key: None,
            base_url: OPENROUTE_BASE_URL.to_string(),
            timeout_ms: 15_000,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("PARKLY_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let filter = self.location.distance_filter_meters;
        if !filter.is_finite() || filter <= 0.0 {
            return Err(Error::config_validation(format!(
                "distance_filter_meters must be a positive number, got {filter}"
            )));
        }

        if self.location.poll_interval_ms == 0 {
            return Err(Error::config_validation(
                "poll_interval_ms must be greater than 0",
            ));
        }

        let span = self.map.recenter_span_meters;
        if !span.is_finite() || span <= 0.0 {
            return Err(Error::config_validation(format!(
                "recenter_span_meters must be a positive number, got {span}"
            )));
        }

        if !self.map.route_padding.is_valid() {
            return Err(Error::config_validation(
                "route_padding insets must be non-negative",
            ));
        }

        if self.directions.timeout_ms == 0 {
            return Err(Error::config_validation("timeout_ms must be greater than 0"));
        }

        if self.directions.provider == ProviderKind::Openroute
            && self.directions.api_key.as_deref().map_or(true, str::is_empty)
        {
            return Err(Error::config_validation(
                "the openroute provider requires directions.api_key",
            ));
        }

        Ok(())
    }

    /// Get the position poll interval as a Duration.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.location.poll_interval_ms)
    }

    /// Get the directions request timeout as a Duration.
    #[must_use]
    pub fn directions_timeout(&self) -> Duration {
        Duration::from_millis(self.directions.timeout_ms)
    }

    /// Settings for the location provider.
    #[must_use]
    pub fn location_provider_config(&self) -> LocationProviderConfig {
        LocationProviderConfig {
            distance_filter_meters: self.location.distance_filter_meters,
            poll_interval: self.poll_interval(),
        }
    }

    /// Settings for the session controller.
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            recenter_span_meters: self.map.recenter_span_meters,
            route_padding: self.map.route_padding,
            follow_user: self.session.follow_user,
            notify_failures: self.session.notify_failures,
            spot_title: self.session.spot_title.clone(),
            spot_subtitle: self.session.spot_subtitle.clone(),
        }
    }

    /// Build the configured directions provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider needs an API key that is missing, or if
    /// its HTTP client cannot be built.
    pub fn directions_provider(&self) -> Result<Arc<dyn DirectionsProvider>> {
        match self.directions.provider {
            ProviderKind::Direct => Ok(Arc::new(DirectRouteProvider::new())),
            ProviderKind::Openroute => {
                let api_key = self.directions.api_key.clone().ok_or_else(|| {
                    Error::config_validation("the openroute provider requires directions.api_key")
                })?;
                let provider = OpenRouteServiceProvider::new(
                    api_key,
                    self.directions.base_url.clone(),
                    self.directions_timeout(),
                )?;
                Ok(Arc::new(provider))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!((config.location.distance_filter_meters - 50.0).abs() < f64::EPSILON);
        assert_eq!(config.location.poll_interval_ms, 1000);
        assert!((config.map.recenter_span_meters - 500.0).abs() < f64::EPSILON);
        assert_eq!(config.map.route_padding, EdgePadding::default());
        assert!(config.session.follow_user);
        assert!(!config.session.notify_failures);
        assert_eq!(config.session.spot_title, "We Parked Here");
        assert_eq!(config.session.spot_subtitle, "Tap for directions");
        assert_eq!(config.directions.provider, ProviderKind::Direct);
        assert!(config.directions.api_key.is_none());
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_distance_filter() {
        let mut config = Config::default();
        config.location.distance_filter_meters = 0.0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("distance_filter_meters"));

        config.location.distance_filter_meters = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_poll_interval() {
        let mut config = Config::default();
        config.location.poll_interval_ms = 0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("poll_interval_ms"));
    }

    #[test]
    fn test_validate_span() {
        let mut config = Config::default();
        config.map.recenter_span_meters = -5.0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("recenter_span_meters"));
    }

    #[test]
    fn test_validate_padding() {
        let mut config = Config::default();
        config.map.route_padding.left = -1.0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("route_padding"));
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default();
        config.directions.timeout_ms = 0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("timeout_ms"));
    }

    #[test]
    fn test_validate_openroute_requires_key() {
        let mut config = Config::default();
        config.directions.provider = ProviderKind::Openroute;
        assert!(config.validate().is_err());

        config.directions.api_key = Some(String::new());
        assert!(config.validate().is_err());

        config.directions.api_key = Some("key".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_durations() {
        let config = Config::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.directions_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_location_provider_config() {
        let mut config = Config::default();
        config.location.distance_filter_meters = 25.0;
        config.location.poll_interval_ms = 250;
        let provider_config = config.location_provider_config();
        assert!((provider_config.distance_filter_meters - 25.0).abs() < f64::EPSILON);
        assert_eq!(provider_config.poll_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_session_config() {
        let mut config = Config::default();
        config.session.notify_failures = true;
        config.session.spot_title = "Level 3".to_string();
        let session = config.session_config();
        assert!(session.notify_failures);
        assert!(session.follow_user);
        assert_eq!(session.spot_title, "Level 3");
        assert_eq!(session.route_padding, EdgePadding::default());
    }

    #[test]
    fn test_directions_provider_direct() {
        let provider = Config::default().directions_provider().unwrap();
        assert_eq!(provider.name(), "direct");
    }

    #[test]
    fn test_directions_provider_openroute() {
        let mut config = Config::default();
        config.directions.provider = ProviderKind::Openroute;
        assert!(config.directions_provider().is_err());

        config.directions.api_key = Some("key".to_string());
        let provider = config.directions_provider().unwrap();
        assert_eq!(provider.name(), "openroute");
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("parkly"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let result = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml")));
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), Config::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = std::env::temp_dir().join(format!("parkly-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(
            &path,
            r#"
[location]
distance_filter_meters = 20.0

[session]
notify_failures = true

[map.route_padding]
top = 120.0
"#,
        )
        .unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert!((config.location.distance_filter_meters - 20.0).abs() < f64::EPSILON);
        assert!(config.session.notify_failures);
        assert!((config.map.route_padding.top - 120.0).abs() < f64::EPSILON);
        assert!((config.map.route_padding.left - 50.0).abs() < f64::EPSILON);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = std::env::temp_dir().join(format!("parkly-bad-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "[location]\npoll_interval_ms = 0\n").unwrap();

        let err = Config::load_from(Some(path)).unwrap_err();
        assert!(matches!(err, Error::ConfigValidation { .. }));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_provider_kind_serialize() {
        assert_eq!(
            serde_json::to_string(&ProviderKind::Openroute).unwrap(),
            "\"openroute\""
        );
    }

    #[test]
    fn test_config_serialize() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(json.contains("distance_filter_meters"));
        assert!(json.contains("route_padding"));
    }
}
