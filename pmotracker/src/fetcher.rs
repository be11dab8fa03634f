//! Station snapshot fetcher
//!
//! Turns one poll of the metadata source into a [`StationSnapshot`]: entries
//! outside the allow-list are dropped first, then everything that is not
//! classified as music, and the rest is projected onto [`TrackEvent`].

use crate::error::FetchError;
use crate::stations::RelevantStations;
use async_trait::async_trait;
use pmoantenne::{AntenneClient, StationEntry, StationSnapshot, TrackEvent};
use tracing::warn;

/// Something that can report what every station is playing right now
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn try_fetch(&self) -> Result<Vec<StationEntry>, FetchError>;
}

#[async_trait]
impl SnapshotSource for AntenneClient {
    async fn try_fetch(&self) -> Result<Vec<StationEntry>, FetchError> {
        Ok(self.now_playing().await?)
    }
}

/// Filter and project raw entries into a snapshot
pub fn build_snapshot(entries: Vec<StationEntry>, relevant: &RelevantStations) -> StationSnapshot {
    entries
        .into_iter()
        .filter(|entry| relevant.accepts(&entry.mountpoint))
        .filter(StationEntry::is_music)
        .map(TrackEvent::from_entry)
        .collect()
}

/// Fetches filtered station snapshots from a [`SnapshotSource`]
#[derive(Debug)]
pub struct SnapshotFetcher<S> {
    source: S,
    relevant: RelevantStations,
}

impl<S: SnapshotSource> SnapshotFetcher<S> {
    pub fn new(source: S, relevant: RelevantStations) -> Self {
        Self { source, relevant }
    }

    pub fn relevant_stations(&self) -> &RelevantStations {
        &self.relevant
    }

    /// Fetch a snapshot, reporting failures to the caller
    pub async fn try_fetch_snapshot(&self) -> Result<StationSnapshot, FetchError> {
        let entries = self.source.try_fetch().await?;
        Ok(build_snapshot(entries, &self.relevant))
    }

    /// Fetch a snapshot; any failure yields an empty snapshot
    pub async fn fetch(&self) -> StationSnapshot {
        match self.try_fetch_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!("Could not fetch station data, using an empty snapshot: {err}");
                StationSnapshot::new()
            }
        }
    }
}
