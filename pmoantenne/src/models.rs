//! Data models for the antenne.de now-playing API
//!
//! The endpoint answers with `{"data": [ ... ]}` where each entry describes
//! what one mountpoint (station stream) is currently playing. Entries are
//! deserialised leniently: only `mountpoint` is required, everything else may
//! be absent or `null`.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Classification value of entries that are songs (as opposed to news, ads, ...)
pub const MUSIC_CLASS: &str = "Music";

/// Deserialize a string, number or null into the verbatim text of the value
fn deserialize_verbatim_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(serde_json::Number),
    }

    Ok(
        Option::<StringOrNumber>::deserialize(deserializer)?.map(|value| match value {
            StringOrNumber::String(s) => s,
            StringOrNumber::Number(n) => n.to_string(),
        }),
    )
}

/// Response body of the now-playing endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NowPlayingResponse {
    pub data: Vec<StationEntry>,
}

/// One station entry as delivered by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationEntry {
    /// Stable stream identifier (e.g. `"top-40"`)
    pub mountpoint: String,

    /// Content classification (`"Music"`, `"News"`, `"Spot"`, ...)
    #[serde(default)]
    pub class: Option<String>,

    #[serde(default)]
    pub artist: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    /// International Standard Recording Code, when the feed knows it
    #[serde(default)]
    pub isrc: Option<String>,

    /// Start time as supplied by the feed, never reparsed
    #[serde(default, deserialize_with = "deserialize_verbatim_text")]
    pub starttime: Option<String>,
}

impl StationEntry {
    /// Whether this entry describes a song
    pub fn is_music(&self) -> bool {
        self.class.as_deref() == Some(MUSIC_CLASS)
    }
}

/// A detected (or detectable) track start on one station
///
/// Built once from a [`StationEntry`] and never modified afterwards. When
/// serialised, the station identifier is written as `station` and the start
/// time as `starttime`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackEvent {
    #[serde(rename = "station")]
    station_id: String,
    artist: String,
    title: String,
    isrc: Option<String>,
    #[serde(rename = "starttime")]
    start_time: String,
}

impl TrackEvent {
    pub fn new(
        station_id: impl Into<String>,
        artist: impl Into<String>,
        title: impl Into<String>,
        isrc: Option<String>,
        start_time: impl Into<String>,
    ) -> Self {
        Self {
            station_id: station_id.into(),
            artist: artist.into(),
            title: title.into(),
            isrc,
            start_time: start_time.into(),
        }
    }

    /// Project an API entry down to the tracked fields
    pub fn from_entry(entry: StationEntry) -> Self {
        Self {
            station_id: entry.mountpoint,
            artist: entry.artist.unwrap_or_default(),
            title: entry.title.unwrap_or_default(),
            isrc: entry.isrc,
            start_time: entry.starttime.unwrap_or_default(),
        }
    }

    pub fn station_id(&self) -> &str {
        &self.station_id
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn isrc(&self) -> Option<&str> {
        self.isrc.as_deref()
    }

    pub fn start_time(&self) -> &str {
        &self.start_time
    }
}

impl std::fmt::Display for TrackEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {} - {}", self.station_id, self.artist, self.title)?;
        if let Some(isrc) = &self.isrc {
            write!(f, " ({isrc})")?;
        }
        Ok(())
    }
}

/// What every monitored station is playing at one point in time
///
/// Holds at most one [`TrackEvent`] per station, iterated in station order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StationSnapshot {
    tracks: BTreeMap<String, TrackEvent>,
}

impl StationSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a track, replacing any previous track for the same station
    pub fn insert(&mut self, track: TrackEvent) -> Option<TrackEvent> {
        self.tracks.insert(track.station_id.clone(), track)
    }

    pub fn get(&self, station_id: &str) -> Option<&TrackEvent> {
        self.tracks.get(station_id)
    }

    pub fn contains(&self, station_id: &str) -> bool {
        self.tracks.contains_key(station_id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackEvent> {
        self.tracks.values()
    }

    pub fn stations(&self) -> impl Iterator<Item = &str> {
        self.tracks.keys().map(String::as_str)
    }
}

impl FromIterator<TrackEvent> for StationSnapshot {
    fn from_iter<I: IntoIterator<Item = TrackEvent>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for track in iter {
            snapshot.insert(track);
        }
        snapshot
    }
}

impl std::fmt::Display for StationSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for track in self.iter() {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{track}")?;
            first = false;
        }
        Ok(())
    }
}
