//! Station allow-list
//!
//! Only songs from stations listed in the allow-list file are tracked. The
//! file holds one mountpoint per line; a missing or empty file means every
//! station is monitored.

use crate::error::{Result, TrackerError};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

/// The set of station identifiers to monitor, read once at startup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelevantStations {
    ids: BTreeSet<String>,
}

impl RelevantStations {
    /// An empty allow-list: every station is accepted
    pub fn all() -> Self {
        Self::default()
    }

    pub fn from_ids<I, T>(ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            ids: ids
                .into_iter()
                .map(Into::into)
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect(),
        }
    }

    /// Parse the allow-list file format: one identifier per line
    pub fn parse(text: &str) -> Self {
        Self::from_ids(text.lines())
    }

    /// Read the allow-list file, treating a missing file as "accept all"
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let stations = match fs::read_to_string(path) {
            Ok(text) => Self::parse(&text),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Self::all(),
            Err(source) => {
                return Err(TrackerError::Stations {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        tracing::debug!(path = %path.display(), "Relevant stations: {:?}", stations.ids);
        Ok(stations)
    }

    /// Whether a station passes the allow-list
    pub fn accepts(&self, station_id: &str) -> bool {
        self.ids.is_empty() || self.ids.contains(station_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
