//! Track logger daemon
//!
//! Usage: `pmotracker [CONFIG_DIR]`

use pmoantenne::AntenneClient;
use pmoconfig::Config;
use pmotracker::{
    init_logging, shutdown_signal, ParquetWriter, RelevantStations, ShutdownReport,
    SnapshotFetcher, Tracker, TrackerSettings,
};
use std::env;
use std::process::ExitCode;
use tracing::{error, info};

async fn run(config_dir: &str) -> pmotracker::Result<ShutdownReport> {
    let config = Config::load_config(config_dir)?;
    let settings = TrackerSettings::from_config(&config)?;
    init_logging(&settings.logging)?;

    let relevant = RelevantStations::load(&settings.stations_file)?;
    if relevant.is_empty() {
        info!("No station allow-list, tracking every station");
    } else {
        info!(stations = relevant.len(), "Tracking allow-listed stations only");
    }

    let client = AntenneClient::builder()
        .url(settings.source.url.clone())
        .timeout(settings.source.timeout)
        .max_retries(settings.source.max_retries)
        .backoff_base(settings.source.backoff_base)
        .build()?;

    let fetcher = SnapshotFetcher::new(client, relevant);
    let writer = ParquetWriter::new(settings.output_dir.clone());
    let mut tracker = Tracker::new(fetcher, writer, settings.flush_policy());

    Ok(tracker.run(shutdown_signal()).await)
}

#[tokio::main]
async fn main() -> ExitCode {
    let config_dir = env::args().nth(1).unwrap_or_default();

    match run(&config_dir).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            // logging may not be initialised yet
            error!("Exception occurred: {err:?}");
            eprintln!("pmotracker: {err}");
            ExitCode::FAILURE
        }
    }
}
