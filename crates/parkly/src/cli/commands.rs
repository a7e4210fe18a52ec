//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::geo::Coordinate;
use crate::location::AuthorizationState;
use crate::simulation::SimulationPlan;

/// Simulate command arguments.
#[derive(Debug, Args)]
pub struct SimulateCommand {
    /// Device location when parking, as LAT,LON
    #[arg(long, value_name = "LAT,LON", allow_hyphen_values = true)]
    pub park: Coordinate,

    /// Walk to this point before asking for directions
    #[arg(long, value_name = "LAT,LON", allow_hyphen_values = true)]
    pub walk_to: Option<Coordinate>,

    /// Number of location fixes along the walk
    #[arg(long, default_value = "4")]
    pub legs: u32,

    /// Mark this point with a long press instead of the device location
    #[arg(long, value_name = "LAT,LON", allow_hyphen_values = true)]
    pub long_press: Option<Coordinate>,

    /// Deny location access at the permission prompt
    #[arg(long)]
    pub deny: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

impl SimulateCommand {
    /// The scripted session these arguments describe.
    #[must_use]
    pub const fn plan(&self) -> SimulationPlan {
        SimulationPlan {
            park: self.park,
            long_press: self.long_press,
            walk_to: self.walk_to,
            legs: self.legs,
            authorization: if self.deny {
                AuthorizationState::Denied
            } else {
                AuthorizationState::AuthorizedWhenInUse
            },
        }
    }
}

/// Route command arguments.
#[derive(Debug, Args)]
pub struct RouteCommand {
    /// Start point, as LAT,LON
    #[arg(long, value_name = "LAT,LON", allow_hyphen_values = true)]
    pub from: Coordinate,

    /// Destination, as LAT,LON
    #[arg(long, value_name = "LAT,LON", allow_hyphen_values = true)]
    pub to: Coordinate,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines
    #[default]
    Plain,
    /// One JSON document
    Json,
}
