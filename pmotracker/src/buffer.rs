//! In-memory event buffer and the policy deciding when to flush it

use crate::error::StorageError;
use crate::storage::BatchWriter;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use pmoantenne::TrackEvent;
use std::time::Duration;

/// Buffered songs above which a flush is forced
pub const DEFAULT_MAX_BATCH_SIZE: usize = 1000;

/// Default polling interval
pub const DEFAULT_REFRESH_RATE: Duration = Duration::from_secs(90);

/// Track events detected since the last successful flush, in arrival order
#[derive(Debug, Default)]
pub struct EventBuffer {
    events: Vec<TrackEvent>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append events without merging or deduplicating them
    pub fn accumulate(&mut self, events: impl IntoIterator<Item = TrackEvent>) {
        self.events.extend(events);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[TrackEvent] {
        &self.events
    }

    /// Hand the whole buffer to `writer` as one batch
    ///
    /// The buffer is cleared only when the write succeeds; on error it is left
    /// exactly as it was. An empty buffer issues no write and returns `Ok(0)`.
    pub async fn flush<W>(&mut self, writer: &W, date: NaiveDate) -> Result<usize, StorageError>
    where
        W: BatchWriter + ?Sized,
    {
        if self.events.is_empty() {
            return Ok(0);
        }

        let written = writer.write_batch(date, &self.events).await?;
        self.events.clear();
        Ok(written)
    }
}

/// Decides, once per cycle, whether the buffer must be flushed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushPolicy {
    interval: Duration,
    max_batch_size: usize,
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_RATE, DEFAULT_MAX_BATCH_SIZE)
    }
}

impl FlushPolicy {
    pub fn new(interval: Duration, max_batch_size: usize) -> Self {
        Self {
            interval,
            max_batch_size,
        }
    }

    /// The polling interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Whether this cycle sits on the midnight boundary
    ///
    /// True when the time elapsed since local midnight, measured at
    /// `now - interval`, is at most one interval.
    pub fn straddles_midnight(&self, now: NaiveDateTime) -> bool {
        let interval = TimeDelta::from_std(self.interval).unwrap_or(TimeDelta::MAX);
        let shifted = now.checked_sub_signed(interval).unwrap_or(now);
        let since_midnight = shifted.time() - NaiveTime::MIN;
        since_midnight <= interval
    }

    /// Flush when crossing midnight or when the buffer outgrew the batch size
    pub fn should_flush(&self, now: NaiveDateTime, buffered: usize) -> bool {
        self.straddles_midnight(now) || buffered > self.max_batch_size
    }
}
