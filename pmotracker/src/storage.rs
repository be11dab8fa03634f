//! Durable storage of track events in daily Parquet partitions
//!
//! Files are laid out as `{root}/{year}/{month}/{YYYY-MM-DD}.parquet`, with the
//! month not zero-padded. Parquet files cannot be extended in place, so an
//! append reads the existing rows, writes old and new rows to a temporary file
//! and renames it over the partition. A failed append leaves the previous file
//! untouched.

use crate::error::StorageError;
use arrow_array::{Array, ArrayRef, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use pmoantenne::TrackEvent;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const COL_ARTIST: &str = "artist";
const COL_TITLE: &str = "title";
const COL_ISRC: &str = "isrc";
const COL_STARTTIME: &str = "starttime";
const COL_STATION: &str = "station";

/// Destination for flushed batches of track events
#[async_trait]
pub trait BatchWriter: Send + Sync {
    /// Append `events`, in order, to the partition of `date`
    ///
    /// Returns the number of events written. Either every event is persisted
    /// or an error is returned.
    async fn write_batch(&self, date: NaiveDate, events: &[TrackEvent]) -> Result<usize, StorageError>;
}

/// Writes track events to one Parquet file per calendar day
#[derive(Debug, Clone)]
pub struct ParquetWriter {
    root: PathBuf,
}

impl ParquetWriter {
    /// Create a writer storing partitions under `root` (e.g. `gathered_data`)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the partition file for `date`
    pub fn partition_path(&self, date: NaiveDate) -> PathBuf {
        self.root
            .join(date.year().to_string())
            .join(date.month().to_string())
            .join(format!("{}.parquet", date.format("%Y-%m-%d")))
    }

    /// Arrow schema of the partition files
    pub fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new(COL_ARTIST, DataType::Utf8, false),
            Field::new(COL_TITLE, DataType::Utf8, false),
            Field::new(COL_ISRC, DataType::Utf8, true),
            Field::new(COL_STARTTIME, DataType::Utf8, false),
            Field::new(COL_STATION, DataType::Utf8, false),
        ]))
    }

    fn to_record_batch(events: &[TrackEvent]) -> Result<RecordBatch, StorageError> {
        let artist: StringArray = events.iter().map(|e| Some(e.artist())).collect();
        let title: StringArray = events.iter().map(|e| Some(e.title())).collect();
        let isrc: StringArray = events.iter().map(|e| e.isrc()).collect();
        let start: StringArray = events.iter().map(|e| Some(e.start_time())).collect();
        let station: StringArray = events.iter().map(|e| Some(e.station_id())).collect();

        let columns: Vec<ArrayRef> = vec![
            Arc::new(artist),
            Arc::new(title),
            Arc::new(isrc),
            Arc::new(start),
            Arc::new(station),
        ];
        Ok(RecordBatch::try_new(Self::schema(), columns)?)
    }

    fn read_batches(path: &Path) -> Result<Vec<RecordBatch>, StorageError> {
        let schema = Self::schema();
        let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?.build()?;

        let mut batches = Vec::new();
        for batch in reader {
            // re-attach our schema so the writer accepts the batch
            let batch = batch?;
            batches.push(RecordBatch::try_new(schema.clone(), batch.columns().to_vec())?);
        }
        Ok(batches)
    }

    fn write_file(path: &Path, batches: &[RecordBatch]) -> Result<(), StorageError> {
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let mut writer = ArrowWriter::try_new(File::create(path)?, Self::schema(), Some(props))?;
        for batch in batches {
            writer.write(batch)?;
        }
        writer.close()?;
        Ok(())
    }

    /// Append a batch to a partition file, creating it if needed
    fn append_partition(path: &Path, batch: RecordBatch) -> Result<usize, StorageError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let mut batches = if path.exists() {
            Self::read_batches(path)?
        } else {
            Vec::new()
        };
        let written = batch.num_rows();
        batches.push(batch);

        let tmp = path.with_extension("parquet.tmp");
        let result = Self::write_file(&tmp, &batches)
            .and_then(|()| fs::rename(&tmp, path).map_err(StorageError::from));
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result.map(|()| written)
    }

    /// Read every event stored in a partition file, in write order
    pub fn read_partition(path: impl AsRef<Path>) -> Result<Vec<TrackEvent>, StorageError> {
        let mut events = Vec::new();
        for batch in Self::read_batches(path.as_ref())? {
            let artist = string_column(&batch, COL_ARTIST)?;
            let title = string_column(&batch, COL_TITLE)?;
            let isrc = string_column(&batch, COL_ISRC)?;
            let start = string_column(&batch, COL_STARTTIME)?;
            let station = string_column(&batch, COL_STATION)?;

            for row in 0..batch.num_rows() {
                events.push(TrackEvent::new(
                    station.value(row),
                    artist.value(row),
                    title.value(row),
                    (!isrc.is_null(row)).then(|| isrc.value(row).to_string()),
                    start.value(row),
                ));
            }
        }
        Ok(events)
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, StorageError> {
    batch
        .column_by_name(name)
        .and_then(|column| column.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| StorageError::other(format!("missing or non-string column '{name}'")))
}

#[async_trait]
impl BatchWriter for ParquetWriter {
    async fn write_batch(&self, date: NaiveDate, events: &[TrackEvent]) -> Result<usize, StorageError> {
        if events.is_empty() {
            return Ok(0);
        }

        let path = self.partition_path(date);
        debug!(path = %path.display(), "Starting to write {} new songs", events.len());

        let batch = Self::to_record_batch(events)?;
        let task_path = path.clone();
        let written = tokio::task::spawn_blocking(move || Self::append_partition(&task_path, batch))
            .await
            .map_err(|err| StorageError::Task(err.to_string()))??;

        debug!(path = %path.display(), "Finished to write {} new songs", written);
        Ok(written)
    }
}
