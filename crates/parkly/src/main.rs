//! `parkly` - CLI for the parking session library.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::fmt::Write as _;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use parkly::cli::{Cli, Command, ConfigCommand, OutputFormat, RouteCommand, SimulateCommand};
use parkly::directions::RouteStep;
use parkly::simulation::simulate;
use parkly::{compute_walking_route, init_logging, Config, Route, SessionEvent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("loading configuration")?;

    match cli.command {
        Command::Simulate(cmd) => handle_simulate(&config, &cmd).await,
        Command::Route(cmd) => handle_route(&config, &cmd).await,
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

async fn handle_simulate(config: &Config, cmd: &SimulateCommand) -> anyhow::Result<()> {
    let plan = cmd.plan();
    info!(park = %plan.park, legs = plan.legs, "Simulating parking session");

    let report = simulate(config, &plan).await?;

    match cmd.format {
        OutputFormat::Json => {
            let doc = serde_json::json!({
                "events": report.events,
                "final_state": report.final_state,
                "route": report.route,
            });
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        OutputFormat::Plain => {
            for event in &report.events {
                println!("{}", describe(event));
            }
            println!();
            println!("Final state: {}", report.final_state);
            if let Some(route) = &report.route {
                print_summary(route);
            }
        }
    }
    Ok(())
}

async fn handle_route(config: &Config, cmd: &RouteCommand) -> anyhow::Result<()> {
    let provider = config.directions_provider()?;
    let route = compute_walking_route(provider.as_ref(), cmd.from, cmd.to)
        .await
        .with_context(|| format!("no walking route from {} to {}", cmd.from, cmd.to))?;

    match cmd.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&route)?),
        OutputFormat::Plain => {
            print_steps(&route.steps);
            print_summary(&route);
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Location]");
                println!(
                    "  Distance filter (m): {}",
                    config.location.distance_filter_meters
                );
                println!("  Poll interval (ms):  {}", config.location.poll_interval_ms);
                println!();
                println!("[Map]");
                println!("  Recenter span (m):   {}", config.map.recenter_span_meters);
                let p = config.map.route_padding;
                println!(
                    "  Route padding:       top {} left {} bottom {} right {}",
                    p.top, p.left, p.bottom, p.right
                );
                println!();
                println!("[Session]");
                println!("  Follow user:         {}", config.session.follow_user);
                println!("  Notify failures:     {}", config.session.notify_failures);
                println!("  Spot title:          {}", config.session.spot_title);
                println!("  Spot subtitle:       {}", config.session.spot_subtitle);
                println!();
                println!("[Directions]");
                println!("  Provider:            {:?}", config.directions.provider);
                println!("  Base URL:            {}", config.directions.base_url);
                println!(
                    "  API key:             {}",
                    if config.directions.api_key.is_some() {
                        "set"
                    } else {
                        "not set"
                    }
                );
                println!("  Timeout (ms):        {}", config.directions.timeout_ms);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}

fn describe(event: &SessionEvent) -> String {
    match event {
        SessionEvent::AddAnnotation { spot } => format!(
            "add annotation    {} \"{}\" ({})",
            spot.coordinate(),
            spot.title(),
            spot.source()
        ),
        SessionEvent::RemoveAllOverlays => "remove overlays".to_string(),
        SessionEvent::DrawRoute { polyline, region } => format!(
            "draw route        {} points, centered on {}",
            polyline.len(),
            region.bounds.center()
        ),
        SessionEvent::SetDirectionsControlEnabled { enabled } => {
            format!("directions button {}", if *enabled { "on" } else { "off" })
        }
        SessionEvent::LogRouteSteps { steps } => {
            let mut out = format!("route steps       {}", steps.len());
            for step in steps {
                let _ = write!(
                    out,
                    "\n    {:>6.0} m  {}",
                    step.distance_meters, step.instructions
                );
            }
            out
        }
        SessionEvent::Recenter { region } => format!("recenter          {}", region.center),
        SessionEvent::DirectionsUnavailable { reason } => {
            format!("directions failed {reason}")
        }
        SessionEvent::LocationUnavailable { action } => {
            format!("no location for   {action}")
        }
    }
}

fn print_steps(steps: &[RouteStep]) {
    for (i, step) in steps.iter().enumerate() {
        println!(
            "{:>3}. {:>6.0} m  {}",
            i + 1,
            step.distance_meters,
            step.instructions
        );
    }
}

fn print_summary(route: &Route) {
    println!(
        "Total: {:.0} m, about {} min on foot",
        route.distance_meters,
        route.expected_travel_time.as_secs().div_ceil(60)
    );
}
