//! Example: Print what every antenne.de station is playing
//!
//! Run with: cargo run -p pmoantenne --example now_playing
//! Or only one station: cargo run -p pmoantenne --example now_playing -- top-40

use pmoantenne::{AntenneClient, StationSnapshot, TrackEvent};
use std::env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let station = env::args().nth(1);

    let client = AntenneClient::new()?;
    let entries = client.now_playing().await?;
    println!("{} entries received", entries.len());

    let snapshot: StationSnapshot = entries
        .into_iter()
        .filter(|entry| entry.is_music())
        .filter(|entry| station.as_deref().is_none_or(|s| s == entry.mountpoint))
        .map(TrackEvent::from_entry)
        .collect();

    for track in snapshot.iter() {
        println!("  {track}");
        if !track.start_time().is_empty() {
            println!("    started at {}", track.start_time());
        }
    }

    Ok(())
}
