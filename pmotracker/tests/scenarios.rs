//! End-to-end polling scenarios

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use pmoantenne::{AntenneClient, StationEntry, TrackEvent};
use pmotracker::{
    BatchWriter, FetchError, FlushOutcome, FlushPolicy, Lifecycle, ParquetWriter,
    RelevantStations, ShutdownReport, SnapshotFetcher, SnapshotSource, StorageError, Tracker,
};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn noon() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 2)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

fn music(station: &str, title: &str, isrc: Option<&str>) -> StationEntry {
    StationEntry {
        mountpoint: station.to_string(),
        class: Some("Music".to_string()),
        artist: Some("Artist".to_string()),
        title: Some(title.to_string()),
        isrc: isrc.map(str::to_string),
        starttime: Some("2024-05-02 11:58:00".to_string()),
    }
}

type Poll = Result<Vec<StationEntry>, String>;

/// Replays scripted polls, then requests shutdown and never answers again
struct ScriptedSource {
    polls: Mutex<VecDeque<Poll>>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
}

impl ScriptedSource {
    fn new(polls: Vec<Poll>) -> Self {
        Self {
            polls: Mutex::new(polls.into()),
            shutdown: Mutex::new(None),
        }
    }

    fn with_shutdown(polls: Vec<Poll>) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        let source = Self::new(polls);
        *source.shutdown.lock().unwrap() = Some(tx);
        (source, rx)
    }
}

#[async_trait]
impl SnapshotSource for ScriptedSource {
    async fn try_fetch(&self) -> Result<Vec<StationEntry>, FetchError> {
        let next = self.polls.lock().unwrap().pop_front();
        match next {
            Some(poll) => poll.map_err(FetchError::other),
            None => {
                let shutdown = self.shutdown.lock().unwrap().take();
                if let Some(tx) = shutdown {
                    let _ = tx.send(());
                }
                std::future::pending().await
            }
        }
    }
}

#[derive(Default)]
struct RecordingWriter {
    failing: AtomicBool,
    batches: Mutex<Vec<(NaiveDate, Vec<TrackEvent>)>>,
}

impl RecordingWriter {
    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn batches(&self) -> Vec<(NaiveDate, Vec<TrackEvent>)> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl BatchWriter for RecordingWriter {
    async fn write_batch(&self, date: NaiveDate, events: &[TrackEvent]) -> Result<usize, StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::other("storage unavailable"));
        }
        self.batches.lock().unwrap().push((date, events.to_vec()));
        Ok(events.len())
    }
}

fn tracker(
    source: ScriptedSource,
    relevant: RelevantStations,
    max_batch_size: usize,
) -> Tracker<ScriptedSource, RecordingWriter> {
    Tracker::new(
        SnapshotFetcher::new(source, relevant),
        RecordingWriter::default(),
        FlushPolicy::new(Duration::from_millis(1), max_batch_size),
    )
    .with_clock(noon)
}

#[tokio::test]
async fn test_isrc_change_on_known_station() {
    let source = ScriptedSource::new(vec![
        Ok(vec![music("pop1", "Song", Some("A1"))]),
        Ok(vec![music("pop1", "Song", Some("A1"))]),
        Ok(vec![music("pop1", "Song", Some("A2"))]),
    ]);
    let mut tracker = tracker(source, RelevantStations::all(), 1000);

    assert_eq!(tracker.run_cycle().await.new_events, 1);
    assert_eq!(tracker.run_cycle().await.new_events, 0);
    assert_eq!(tracker.run_cycle().await.new_events, 1);

    let isrcs: Vec<_> = tracker.buffer().events().iter().map(|e| e.isrc()).collect();
    assert_eq!(isrcs, vec![Some("A1"), Some("A2")]);
}

#[tokio::test]
async fn test_title_change_without_isrc() {
    let source = ScriptedSource::new(vec![
        Ok(vec![music("rock1", "Song X", None)]),
        Ok(vec![music("rock1", "Song X", None)]),
        Ok(vec![music("rock1", "Song Y", None)]),
    ]);
    let mut tracker = tracker(source, RelevantStations::all(), 1000);

    assert_eq!(tracker.run_cycle().await.new_events, 1);
    assert_eq!(tracker.run_cycle().await.new_events, 0);
    assert_eq!(tracker.run_cycle().await.new_events, 1);

    let titles: Vec<_> = tracker.buffer().events().iter().map(|e| e.title()).collect();
    assert_eq!(titles, vec!["Song X", "Song Y"]);
}

#[tokio::test]
async fn test_allow_list_restricts_snapshot() {
    let source = ScriptedSource::new(vec![Ok(vec![
        music("pop1", "A", Some("A1")),
        music("rock1", "B", None),
    ])]);
    let mut tracker = tracker(source, RelevantStations::from_ids(["pop1"]), 1000);

    let report = tracker.run_cycle().await;

    assert_eq!(report.fetched, 1);
    assert_eq!(report.new_events, 1);
    assert!(tracker.previous().contains("pop1"));
    assert!(!tracker.previous().contains("rock1"));
    assert_eq!(tracker.buffer().events()[0].station_id(), "pop1");
}

#[tokio::test]
async fn test_failed_flush_is_retried_with_accumulated_events() {
    let source = ScriptedSource::new(vec![
        Ok(vec![music("pop1", "A", Some("A1")), music("rock1", "B", None)]),
        Ok(vec![music("pop1", "C", Some("A2")), music("rock1", "B", None)]),
    ]);
    let mut tracker = tracker(source, RelevantStations::all(), 1);
    tracker.writer().set_failing(true);

    let report = tracker.run_cycle().await;
    assert_eq!(report.flush, FlushOutcome::Failed);
    assert_eq!(report.buffered, 2);
    let retained = tracker.buffer().events().to_vec();

    tracker.writer().set_failing(false);
    let report = tracker.run_cycle().await;
    assert_eq!(report.flush, FlushOutcome::Written(3));
    assert!(tracker.buffer().is_empty());

    let batches = tracker.writer().batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(&batches[0].1[..2], retained.as_slice());
    assert_eq!(batches[0].1[2].title(), "C");
}

#[tokio::test]
async fn test_shutdown_flushes_buffer_exactly_once() {
    let (source, shutdown) = ScriptedSource::with_shutdown(vec![Ok(vec![
        music("pop1", "A", Some("A1")),
        music("pop2", "B", Some("B1")),
        music("rock1", "C", None),
    ])]);
    let mut tracker = tracker(source, RelevantStations::all(), 1000);

    let report = tracker
        .run(async {
            let _ = shutdown.await;
        })
        .await;

    assert_eq!(report, ShutdownReport { written: 3, lost: 0 });
    assert_eq!(tracker.state(), Lifecycle::Terminated);
    assert!(tracker.buffer().is_empty());

    let batches = tracker.writer().batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].0, noon().date());
    assert_eq!(batches[0].1.len(), 3);
}

#[tokio::test]
async fn test_failed_final_flush_reports_loss_and_terminates() {
    let (source, shutdown) = ScriptedSource::with_shutdown(vec![Ok(vec![
        music("pop1", "A", Some("A1")),
        music("rock1", "B", None),
    ])]);
    let mut tracker = tracker(source, RelevantStations::all(), 1000);
    tracker.writer().set_failing(true);

    let report = tracker
        .run(async {
            let _ = shutdown.await;
        })
        .await;

    assert_eq!(report, ShutdownReport { written: 0, lost: 2 });
    assert_eq!(tracker.state(), Lifecycle::Terminated);
    assert!(tracker.writer().batches().is_empty());
}

#[tokio::test]
async fn test_fetch_failure_forgets_previous_snapshot() {
    let source = ScriptedSource::new(vec![
        Ok(vec![music("pop1", "A", Some("A1"))]),
        Err("connection reset".to_string()),
        Ok(vec![music("pop1", "A", Some("A1"))]),
    ]);
    let mut tracker = tracker(source, RelevantStations::all(), 1000);

    assert_eq!(tracker.run_cycle().await.new_events, 1);

    let report = tracker.run_cycle().await;
    assert_eq!(report.fetched, 0);
    assert_eq!(report.new_events, 0);
    assert!(tracker.previous().is_empty());

    // the station comes back as a fresh one
    assert_eq!(tracker.run_cycle().await.new_events, 1);
    assert_eq!(tracker.buffer().len(), 2);
}

#[tokio::test]
async fn test_live_client_into_parquet() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/metadata/now"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {
                    "mountpoint": "top-40",
                    "class": "Music",
                    "artist": "Dua Lipa",
                    "title": "Houdini",
                    "isrc": "GBAHT2300845",
                    "starttime": "2024-05-02T11:58:00+02:00"
                },
                {
                    "mountpoint": "rockantenne",
                    "class": "Music",
                    "artist": "Foo Fighters",
                    "title": "Everlong",
                    "isrc": null,
                    "starttime": "2024-05-02T11:59:10+02:00"
                },
                {
                    "mountpoint": "antenne",
                    "class": "News",
                    "artist": null,
                    "title": "Nachrichten",
                    "isrc": null,
                    "starttime": "2024-05-02T12:00:00+02:00"
                }
            ]
        })))
        .mount(&server)
        .await;

    let client = AntenneClient::builder()
        .url(format!("{}/api/metadata/now", server.uri()))
        .max_retries(0)
        .build()
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let writer = ParquetWriter::new(dir.path());
    let partition = writer.partition_path(noon().date());

    let mut tracker = Tracker::new(
        SnapshotFetcher::new(client, RelevantStations::all()),
        writer,
        FlushPolicy::new(Duration::from_secs(90), 1),
    )
    .with_clock(noon);

    let report = tracker.run_cycle().await;
    assert_eq!(report.fetched, 2);
    assert_eq!(report.flush, FlushOutcome::Written(2));

    let report = tracker.run_cycle().await;
    assert_eq!(report.new_events, 0);
    assert_eq!(report.flush, FlushOutcome::Skipped);

    assert_eq!(tracker.drain().await, ShutdownReport::default());

    assert_eq!(partition, dir.path().join("2024/5/2024-05-02.parquet"));
    let stored = ParquetWriter::read_partition(&partition).unwrap();
    let stations: Vec<_> = stored.iter().map(|e| e.station_id()).collect();
    assert_eq!(stations, vec!["rockantenne", "top-40"]);
    assert_eq!(stored[0].isrc(), None);
    assert_eq!(stored[1].isrc(), Some("GBAHT2300845"));
    assert_eq!(stored[1].start_time(), "2024-05-02T11:58:00+02:00");
}
