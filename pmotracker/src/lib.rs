//! antenne.de track logger
//!
//! Polls the antenne.de "now playing" endpoint on a fixed interval, detects
//! when a new track starts on each station and stores every detected track in
//! one Parquet file per day.
//!
//! # Architecture
//!
//! One cycle flows through the modules in order:
//!
//! - [`fetcher`]: fetches a [`StationSnapshot`](pmoantenne::StationSnapshot),
//!   filtered by the [`stations`] allow-list; failures become an empty snapshot
//! - [`detector`]: diffs the snapshot against the previous one
//! - [`buffer`]: accumulates new tracks and decides when to flush
//! - [`storage`]: appends flushed batches to daily Parquet partitions
//! - [`scheduler`]: owns the state above, runs the loop and the final flush
//!
//! # Example
//!
//! ```no_run
//! use pmoantenne::AntenneClient;
//! use pmotracker::{FlushPolicy, ParquetWriter, RelevantStations, SnapshotFetcher, Tracker};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fetcher = SnapshotFetcher::new(AntenneClient::new()?, RelevantStations::all());
//!     let writer = ParquetWriter::new("gathered_data");
//!
//!     let mut tracker = Tracker::new(fetcher, writer, FlushPolicy::default());
//!     tracker.run(pmotracker::shutdown_signal()).await;
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod detector;
pub mod error;
pub mod fetcher;
pub mod logging;
pub mod scheduler;
pub mod settings;
pub mod stations;
pub mod storage;

pub use buffer::{EventBuffer, FlushPolicy, DEFAULT_MAX_BATCH_SIZE, DEFAULT_REFRESH_RATE};
pub use detector::{detect, ChangeDetector};
pub use error::{FetchError, Result, StorageError, TrackerError};
pub use fetcher::{build_snapshot, SnapshotFetcher, SnapshotSource};
pub use logging::{init_logging, LoggingOptions};
pub use scheduler::{
    shutdown_signal, Clock, CycleReport, FlushOutcome, Lifecycle, ShutdownReport, Tracker,
};
pub use settings::{SourceSettings, TrackerSettings};
pub use stations::RelevantStations;
pub use storage::{BatchWriter, ParquetWriter};
