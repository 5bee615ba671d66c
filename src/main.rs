//! Climate API - HTTP server
//!
//! Serves precipitation, station and temperature summaries from a
//! pre-populated PostgreSQL copy of the station/measurement dataset.
//!
//! Usage:
//!   cargo run --release                          # Listen on 0.0.0.0:5000
//!   cargo run --release -- --port 8080           # Override the port
//!   cargo run --release -- --config api.toml     # Use a specific config file
//!   cargo run --release -- --skip-verify         # Don't check tables at startup
//!
//! Environment:
//!   DATABASE_URL - PostgreSQL connection string
//!   RUST_LOG     - log filter (default: info)

use climate_api::config;
use climate_api::db::{self, DataSource};
use climate_api::endpoint::{self, Api};
use std::env;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Parse command-line arguments
    let args: Vec<String> = env::args().collect();
    let mut port: Option<u16> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut skip_verify = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" => match args.get(i + 1).and_then(|p| p.parse().ok()) {
                Some(p) => {
                    port = Some(p);
                    i += 2;
                }
                None => {
                    eprintln!("Error: --port requires a port number");
                    std::process::exit(1);
                }
            },
            "--config" => match args.get(i + 1) {
                Some(path) => {
                    config_path = Some(PathBuf::from(path));
                    i += 2;
                }
                None => {
                    eprintln!("Error: --config requires a file path");
                    std::process::exit(1);
                }
            },
            "--skip-verify" => {
                skip_verify = true;
                i += 1;
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                eprintln!("Usage: {} [--port PORT] [--config PATH] [--skip-verify]", args[0]);
                std::process::exit(1);
            }
        }
    }

    let mut config = match config::load_config(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    if let Some(port) = port {
        config.port = port;
    }

    let source = match DataSource::from_env(config.schema.clone()) {
        Ok(source) => source,
        Err(e) => {
            error!("\n{}\n", e);
            std::process::exit(1);
        }
    };

    if !skip_verify {
        info!("Checking station and measurement tables...");
        let checked = source
            .session()
            .and_then(|mut client| db::verify_tables(&mut client));
        if let Err(e) = checked {
            error!("\n{}\n", e);
            std::process::exit(1);
        }
        info!("Tables verified");
    }

    info!(anchor = ?config.anchor(), tobs_start = %config.tobs.start, tobs_end = %config.tobs.end, "Query windows");

    let api = Api::from_config(&config, source);
    if let Err(e) = endpoint::serve(&config, api) {
        error!("{}", e);
        std::process::exit(1);
    }
}
