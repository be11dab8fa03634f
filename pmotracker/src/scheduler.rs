//! Polling loop and process lifecycle
//!
//! The [`Tracker`] owns every piece of mutable state (previous snapshot, event
//! buffer) and drives the fetch → detect → accumulate → maybe-flush cycle on a
//! fixed delay. A shutdown request is observed while fetching and while
//! sleeping; it abandons an in-flight fetch, never a detection or a write, and
//! leads to exactly one final flush. A failed final flush is logged as lost
//! data; it does not turn the shutdown into a failure.

use crate::buffer::{EventBuffer, FlushPolicy};
use crate::detector::ChangeDetector;
use crate::fetcher::{SnapshotFetcher, SnapshotSource};
use crate::storage::BatchWriter;
use chrono::{Local, NaiveDateTime};
use pmoantenne::StationSnapshot;
use std::future::Future;
use tracing::{debug, error, info, warn};

/// Source of the local wall-clock time
pub type Clock = fn() -> NaiveDateTime;

/// Current local time
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Lifecycle of the polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Constructed, loop not started
    Idle,
    /// Polling cycles are running
    Running,
    /// Shutdown requested, final flush in progress
    Draining,
    /// Final flush done
    Terminated,
}

/// What a cycle did with the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The flush policy did not trigger
    Skipped,
    /// The buffer was persisted and cleared
    Written(usize),
    /// The write failed; the buffer was kept
    Failed,
}

/// Summary of one polling cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Stations in the fetched snapshot
    pub fetched: usize,
    /// Track starts detected this cycle
    pub new_events: usize,
    /// Events left in the buffer after the cycle
    pub buffered: usize,
    pub flush: FlushOutcome,
}

/// Outcome of the final flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Events persisted by the final flush
    pub written: usize,
    /// Events still buffered when the final flush failed
    pub lost: usize,
}

/// The polling engine
pub struct Tracker<S, W> {
    fetcher: SnapshotFetcher<S>,
    detector: ChangeDetector,
    buffer: EventBuffer,
    policy: FlushPolicy,
    writer: W,
    clock: Clock,
    state: Lifecycle,
}

impl<S, W> Tracker<S, W>
where
    S: SnapshotSource,
    W: BatchWriter,
{
    pub fn new(fetcher: SnapshotFetcher<S>, writer: W, policy: FlushPolicy) -> Self {
        Self {
            fetcher,
            detector: ChangeDetector::new(),
            buffer: EventBuffer::new(),
            policy,
            writer,
            clock: local_now,
            state: Lifecycle::Idle,
        }
    }

    /// Replace the wall clock used by the flush policy and partition dates
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> Lifecycle {
        self.state
    }

    pub fn buffer(&self) -> &EventBuffer {
        &self.buffer
    }

    /// Snapshot retained from the last cycle
    pub fn previous(&self) -> &StationSnapshot {
        self.detector.previous()
    }

    pub fn policy(&self) -> &FlushPolicy {
        &self.policy
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Run one fetch → detect → accumulate → maybe-flush cycle
    pub async fn run_cycle(&mut self) -> CycleReport {
        let snapshot = self.fetcher.fetch().await;
        self.process(snapshot).await
    }

    async fn process(&mut self, snapshot: StationSnapshot) -> CycleReport {
        debug!("Currently playing: {snapshot}");
        let fetched = snapshot.len();

        let new_songs = self.detector.observe(snapshot);
        let new_events = new_songs.len();
        info!("{new_events} new songs");
        for song in &new_songs {
            debug!(station = song.station_id(), "New song playing: {song}");
        }
        self.buffer.accumulate(new_songs);

        let now = (self.clock)();
        let flush = if self.policy.should_flush(now, self.buffer.len()) {
            self.flush(now).await
        } else {
            FlushOutcome::Skipped
        };

        CycleReport {
            fetched,
            new_events,
            buffered: self.buffer.len(),
            flush,
        }
    }

    async fn flush(&mut self, now: NaiveDateTime) -> FlushOutcome {
        match self.buffer.flush(&self.writer, now.date()).await {
            Ok(written) => FlushOutcome::Written(written),
            Err(err) => {
                error!(
                    buffered = self.buffer.len(),
                    "Failed to write songs, keeping them for the next flush: {err}"
                );
                FlushOutcome::Failed
            }
        }
    }

    /// Poll until `shutdown` resolves, then drain
    pub async fn run<F>(&mut self, shutdown: F) -> ShutdownReport
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        self.state = Lifecycle::Running;
        info!(
            interval_secs = self.policy.interval().as_secs(),
            max_batch_size = self.policy.max_batch_size(),
            "Start"
        );

        loop {
            let snapshot = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                snapshot = self.fetcher.fetch() => snapshot,
            };

            self.process(snapshot).await;

            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.policy.interval()) => {}
            }
        }

        self.drain().await
    }

    /// Perform the final flush and terminate
    pub async fn drain(&mut self) -> ShutdownReport {
        self.state = Lifecycle::Draining;
        info!(buffered = self.buffer.len(), "Got exit signal");

        let now = (self.clock)();
        let report = match self.buffer.flush(&self.writer, now.date()).await {
            Ok(written) => {
                debug!("Final flush wrote {written} songs");
                ShutdownReport { written, lost: 0 }
            }
            Err(err) => {
                let lost = self.buffer.len();
                error!(lost, "Final flush failed, buffered songs are lost: {err}");
                ShutdownReport { written: 0, lost }
            }
        };

        self.state = Lifecycle::Terminated;
        info!("Stop");
        report
    }
}

/// Resolves on Ctrl-C (SIGINT) or, on Unix, SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, StorageError};
    use crate::stations::RelevantStations;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use pmoantenne::{StationEntry, TrackEvent};
    use std::time::Duration;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 2)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn after_midnight() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 3)
            .unwrap()
            .and_hms_opt(0, 2, 0)
            .unwrap()
    }

    struct OneStation;

    #[async_trait]
    impl SnapshotSource for OneStation {
        async fn try_fetch(&self) -> Result<Vec<StationEntry>, FetchError> {
            Ok(vec![StationEntry {
                mountpoint: "pop1".to_string(),
                class: Some("Music".to_string()),
                artist: Some("A".to_string()),
                title: Some("T".to_string()),
                isrc: Some("A1".to_string()),
                starttime: None,
            }])
        }
    }

    struct NullWriter;

    #[async_trait]
    impl BatchWriter for NullWriter {
        async fn write_batch(&self, _date: NaiveDate, events: &[TrackEvent]) -> Result<usize, StorageError> {
            Ok(events.len())
        }
    }

    fn tracker(clock: Clock) -> Tracker<OneStation, NullWriter> {
        Tracker::new(
            SnapshotFetcher::new(OneStation, RelevantStations::all()),
            NullWriter,
            FlushPolicy::new(Duration::from_secs(90), 1000),
        )
        .with_clock(clock)
    }

    #[tokio::test]
    async fn test_cycle_buffers_until_policy_triggers() {
        let mut tracker = tracker(noon);
        assert_eq!(tracker.state(), Lifecycle::Idle);

        let report = tracker.run_cycle().await;
        assert_eq!(
            report,
            CycleReport {
                fetched: 1,
                new_events: 1,
                buffered: 1,
                flush: FlushOutcome::Skipped,
            }
        );
        assert!(tracker.previous().contains("pop1"));

        let report = tracker.run_cycle().await;
        assert_eq!(report.new_events, 0);
        assert_eq!(report.buffered, 1);
    }

    #[tokio::test]
    async fn test_midnight_cycle_flushes() {
        let mut tracker = tracker(after_midnight);

        let report = tracker.run_cycle().await;
        assert_eq!(report.flush, FlushOutcome::Written(1));
        assert!(tracker.buffer().is_empty());
    }

    #[tokio::test]
    async fn test_immediate_shutdown_terminates_without_polling() {
        let mut tracker = tracker(noon);

        let report = tracker.run(async {}).await;

        assert_eq!(report, ShutdownReport::default());
        assert_eq!(tracker.state(), Lifecycle::Terminated);
        assert!(tracker.previous().is_empty());
    }
}
