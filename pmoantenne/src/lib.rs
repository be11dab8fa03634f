//! antenne.de metadata client library
//!
//! This crate provides a Rust client for the public antenne.de "now playing"
//! endpoint, which reports the track currently playing on every antenne.de
//! stream (mountpoint).
//!
//! # Features
//!
//! - **Now Playing**: one request returns every mountpoint with its current
//!   artist, title, ISRC and start time
//! - **Retry Policy**: transient failures are retried with exponential backoff,
//!   bounded by a configurable retry count
//! - **Domain Types**: [`TrackEvent`] and [`StationSnapshot`] for change detection
//!
//! # Example
//!
//! ```no_run
//! use pmoantenne::{AntenneClient, StationSnapshot, TrackEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = AntenneClient::new()?;
//!
//!     let snapshot: StationSnapshot = client
//!         .now_playing()
//!         .await?
//!         .into_iter()
//!         .filter(|entry| entry.is_music())
//!         .map(TrackEvent::from_entry)
//!         .collect();
//!
//!     println!("{} stations playing music", snapshot.len());
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod models;

// Re-exports
pub use client::{AntenneClient, Backoff, ClientBuilder};
pub use error::{Error, Result};
pub use models::{NowPlayingResponse, StationEntry, StationSnapshot, TrackEvent, MUSIC_CLASS};
