//! Change detection between consecutive snapshots
//!
//! A station's current track is reported as new when:
//! 1. the station was not in the previous snapshot, or
//! 2. the current track carries an ISRC that differs from the previous one
//!    (text differences are ignored when the ISRC is known), or
//! 3. the current track has no ISRC and any tracked field changed.
//!
//! Stations that disappeared from the feed produce nothing and are forgotten.

use pmoantenne::{StationSnapshot, TrackEvent};

/// Whether `current` is a different track than `previous` on the same station
fn is_new_track(previous: Option<&TrackEvent>, current: &TrackEvent) -> bool {
    match previous {
        None => true,
        Some(previous) => match current.isrc() {
            Some(isrc) => previous.isrc() != Some(isrc),
            None => previous != current,
        },
    }
}

/// Tracks in `current` that started since `previous`, in station order
pub fn detect(previous: &StationSnapshot, current: &StationSnapshot) -> Vec<TrackEvent> {
    current
        .iter()
        .filter(|track| is_new_track(previous.get(track.station_id()), track))
        .cloned()
        .collect()
}

/// Holds the last observed snapshot between polling cycles
#[derive(Debug, Default)]
pub struct ChangeDetector {
    previous: StationSnapshot,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous(&self) -> &StationSnapshot {
        &self.previous
    }

    /// Diff `current` against the retained snapshot, then retain `current`
    pub fn observe(&mut self, current: StationSnapshot) -> Vec<TrackEvent> {
        let new_tracks = detect(&self.previous, &current);
        self.previous = current;
        new_tracks
    }
}
