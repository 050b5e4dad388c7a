pub mod types;
pub mod config;
pub mod data;
pub mod selection;
pub mod spatial;
pub mod map;
pub mod html;
pub mod server;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the interactive map
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Compose one map view and write it as JSON
    Export {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        /// Province
        #[arg(long)]
        admin1: Option<String>,
        /// District
        #[arg(long)]
        admin2: Option<String>,
        /// Town
        #[arg(long)]
        admin3: Option<String>,
        /// Include the health facilities layer
        #[arg(long)]
        hospitals: bool,
        /// Include the ports layer
        #[arg(long)]
        ports: bool,
        /// Output file, stdout when omitted
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")).into())
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => {
            info!("Serving map with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(&config)?;
            let store = data::DataStore::open(&app_config)?;
            server::start_server(store).await?;
        }
        Commands::Export { config, admin1, admin2, admin3, hospitals, ports, output } => {
            info!("Exporting map view with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(&config)?;
            let store = data::DataStore::open(&app_config)?;

            let selection = selection::Selection { admin1, admin2, admin3 };
            let request = map::LayerRequest { hospitals, ports };
            let view = map::build_view(&store, &selection, request).await;
            let json = serde_json::to_string_pretty(&view)?;

            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("Failed to write view to {:?}", path))?;
                    info!("Wrote view to {:?}", path);
                }
                None => println!("{}", json),
            }
        }
    }

    Ok(())
}
