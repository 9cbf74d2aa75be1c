//! Command line front end for quoting and scheduling waste pickups with wastewise.

mod demo;

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use wastewise_catalog_colombo as colombo;
use wastewise_core::{Envelope, FeeRequest, SchedulingError, SchedulingRules, SchedulingService};

/// Upper bound for a resident directory round trip.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(
    name = "wastewise",
    version,
    about = "Quote and schedule municipal waste pickups"
)]
struct Cli {
    /// JSON file overriding the default scheduling rules.
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the days that can currently be booked.
    Dates,
    /// List the bookable time slots.
    Slots,
    /// List the collectable waste types.
    WasteTypes,
    /// Show the active bins of a resident.
    Bins {
        /// Resident id, e.g. R-1001.
        resident_id: String,
    },
    /// Check whether a slot is still open on a day.
    Availability {
        /// Day as YYYY-MM-DD.
        date: String,
        /// Slot key, e.g. morning.
        time_slot: String,
    },
    /// Quote a pickup.
    Quote {
        /// Waste type key.
        #[arg(long)]
        waste_type: Option<String>,
        /// Bins to collect, comma separated.
        #[arg(long, value_delimiter = ',')]
        bins: Vec<String>,
        /// Billing model: flat, weightBased or hybrid.
        #[arg(long)]
        model: Option<String>,
        /// Estimated weight in kg.
        #[arg(long)]
        weight: Option<f64>,
    },
    /// Walk a booking through quote, confirmation, collection, feedback, and cancellation.
    Demo,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_missing| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let rules = match &cli.rules {
        Some(path) => load_rules(path)?,
        None => SchedulingRules::default(),
    };

    let service = SchedulingService::new(colombo::plugin(), rules);
    tracing::debug!(area = %service.area().id, "service ready");

    match cli.command {
        Command::Dates => print(&success(service.available_dates())),
        Command::Slots => print(&success(service.time_slots())),
        Command::WasteTypes => print(&success(service.waste_types())),
        Command::Bins { resident_id } => {
            let result = tokio::time::timeout(LOOKUP_TIMEOUT, service.resident_bins(&resident_id))
                .await
                .unwrap_or_else(|_elapsed| {
                    tracing::warn!(resident = %resident_id, "resident lookup timed out");
                    Err(SchedulingError::System("Resident lookup timed out".to_owned()))
                });
            print(&Envelope::from(result))
        }
        Command::Availability { date, time_slot } => {
            print(&Envelope::from(service.check_availability(&date, &time_slot)))
        }
        Command::Quote {
            waste_type,
            bins,
            model,
            weight,
        } => {
            let request = FeeRequest {
                waste_type,
                bin_ids: Some(bins),
                billing_model: model,
                estimated_weight: weight,
            };
            print(&Envelope::from(service.calculate_fee(&request)))
        }
        Command::Demo => print(&success(demo::run(service).await?)),
    }
}

fn load_rules(path: &Path) -> Result<SchedulingRules> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading rules from {}", path.display()))?;
    let rules: SchedulingRules = serde_json::from_str(&raw)
        .with_context(|| format!("parsing rules in {}", path.display()))?;
    rules
        .validate()
        .with_context(|| format!("checking rules in {}", path.display()))?;
    tracing::info!(path = %path.display(), "loaded scheduling rules");
    Ok(rules)
}

fn success<T>(data: T) -> Envelope<T> {
    Envelope::from(Ok::<_, SchedulingError>(data))
}

fn print(value: &impl Serialize) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}
