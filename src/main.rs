use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::info;

use london_housing::analytics::{kpi_tiles, leaderboard};
use london_housing::valuation::run_training;
use london_housing::web::{self, AppState};
use london_housing::{DashboardFilter, HousingConfig, telemetry};

#[derive(Parser)]
#[command(name = "london-housing", version, about)]
struct Cli {
    /// Configuration file (defaults to ./config.toml, then the user config dir)
    #[arg(long, global = true, env = "HOUSING_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the dashboard (the default)
    Serve {
        /// Listening port, overrides server.port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Tune and train the price model, then write it to data.model_path
    Train,
    /// Print the headline figures and the borough leaderboard
    Report {
        /// Comma-separated borough names
        #[arg(long)]
        boroughs: Option<String>,
        /// First history date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last history date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = HousingConfig::load_from_path(cli.config)?;
    telemetry::init(&config.logging);

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
                config.validate()?;
            }
            let state = AppState::load(&config).await?;
            web::serve(&config, state).await?;
        }

        Commands::Train => {
            info!("Training price model from {}", config.data.csv_path.display());
            let report = run_training(&config).await?;
            println!("{report}");
            println!("Model saved to {}", config.data.model_path.display());
        }

        Commands::Report { boroughs, from, to } => {
            let filter = DashboardFilter::new(
                boroughs.as_deref().map(DashboardFilter::parse_boroughs).unwrap_or_default(),
                from,
                to,
            )?;
            let state = AppState::load(&config).await?;
            let rows = filter.apply(&state.dataset);

            println!("London housing market ({} rows selected)", rows.len());
            for tile in kpi_tiles(&rows) {
                println!("  {:<28} {}", tile.label, tile.value);
            }

            println!("\nBorough leaderboard");
            for entry in leaderboard(&rows) {
                println!(
                    "  {:<4} {:<24} {:>12} {}",
                    entry.badge, entry.borough, entry.avg_price_label, entry.delta_label
                );
            }
        }
    }

    Ok(())
}
