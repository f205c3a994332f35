//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `geotor` library that handles:
//! - Command-line argument parsing
//! - Environment variable loading (.env file)
//! - Logger initialization
//! - Printing lookups as JSON
//!
//! With no addresses on the command line it keeps the service running, with
//! both update pipelines active, until Ctrl-C.

use std::net::IpAddr;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use geotor::config::{
    MAXMIND_LICENSE_KEY_ENV, MAXMIND_UPDATE_INTERVAL, TOR_EXIT_LIST_URL, TOR_UPDATE_INTERVAL,
};
use geotor::initialization::init_logger_with;
use geotor::{Config, GeoService, LogFormat, LogLevel};

/// Look up the location, ISP and Tor exit status of IP addresses.
#[derive(Parser, Debug)]
#[command(name = "geotor", version, about)]
struct Cli {
    /// Addresses to look up; with none, run until interrupted
    ips: Vec<IpAddr>,

    /// Directory holding the MaxMind databases and version record
    #[arg(long, default_value = geotor::config::DEFAULT_GEO_DB_PATH)]
    db_path: PathBuf,

    /// MaxMind license key
    #[arg(long, env = MAXMIND_LICENSE_KEY_ENV, hide_env_values = true, default_value = "")]
    license_key: String,

    /// Tor exit address list URL
    #[arg(long, default_value = TOR_EXIT_LIST_URL)]
    tor_url: String,

    /// Seconds between MaxMind update checks
    #[arg(long, default_value_t = MAXMIND_UPDATE_INTERVAL.as_secs())]
    geo_interval: u64,

    /// Seconds between Tor exit list refreshes
    #[arg(long, default_value_t = TOR_UPDATE_INTERVAL.as_secs())]
    tor_interval: u64,

    /// Only serve databases already installed in --db-path
    #[arg(long)]
    no_geo_updates: bool,

    /// Do not fetch the Tor exit list
    #[arg(long)]
    no_tor_updates: bool,

    /// Seconds to wait for the databases to load
    #[arg(long, default_value_t = 120)]
    load_timeout: u64,

    /// Seconds to wait for each lookup
    #[arg(long, default_value_t = 5)]
    query_timeout: u64,

    /// Seconds to wait for the first Tor exit list before answering
    #[arg(long, default_value_t = 0)]
    tor_warmup: u64,

    /// Log level
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Log format
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    log_format: LogFormat,
}

impl Cli {
    fn to_config(&self) -> Config {
        Config {
            geo_db_path: self.db_path.clone(),
            maxmind_license_key: self.license_key.clone(),
            tor_url: self.tor_url.clone(),
            maxmind_update_interval: Duration::from_secs(self.geo_interval),
            tor_update_interval: Duration::from_secs(self.tor_interval),
            enable_geo_updates: !self.no_geo_updates,
            enable_tor_updates: !self.no_tor_updates,
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file (if it exists)
    // This allows setting MAXMIND_LICENSE_KEY in .env without exporting it manually
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logger_with(cli.log_level.clone().into(), cli.log_format.clone())
        .context("Failed to initialize logger")?;

    let config = cli.to_config();
    if config.enable_geo_updates && config.maxmind_license_key.is_empty() {
        log::warn!(
            "{} is not set; MaxMind updates will be rejected",
            MAXMIND_LICENSE_KEY_ENV
        );
    }

    let service = GeoService::start(config).context("Failed to start geo service")?;
    let result = run(&service, &cli).await;
    service.shutdown().await;

    if let Err(e) = result {
        eprintln!("geotor error: {:#}", e);
        process::exit(1);
    }
    Ok(())
}

async fn run(service: &GeoService, cli: &Cli) -> Result<()> {
    if cli.ips.is_empty() {
        log::info!("Serving until interrupted");
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?;
        print_stats(service);
        return Ok(());
    }

    if !service
        .wait_until_loaded(Duration::from_secs(cli.load_timeout))
        .await
    {
        anyhow::bail!(
            "geo databases did not load within {}s (is {} populated?)",
            cli.load_timeout,
            cli.db_path.display()
        );
    }
    if cli.tor_warmup > 0 {
        tokio::time::sleep(Duration::from_secs(cli.tor_warmup)).await;
    }

    let timeout = Duration::from_secs(cli.query_timeout);
    let mut failures = 0;
    for ip in &cli.ips {
        match service.lookup(*ip, timeout).await {
            Ok(location) => {
                let json = serde_json::json!({ "ip": ip, "result": location });
                println!("{}", json);
            }
            Err(e) => {
                failures += 1;
                eprintln!("{}: {}", ip, e);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} lookups failed", failures, cli.ips.len());
    }
    Ok(())
}

fn print_stats(service: &GeoService) {
    for (kind, count) in service.stats().non_zero() {
        println!("{}: {}", kind, count);
    }
}
