//! Batched CSV sink
//!
//! Records reach the sink in fixed-size batches, each flushed as a
//! unit, so an interrupted run loses at most one batch. The file is
//! opened lazily on the first non-empty batch; a run that produces no
//! rows leaves the sink exactly as it found it.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::SinkError;
use crate::resume::WriteMode;

pub struct BatchWriter {
    path: PathBuf,
    mode: WriteMode,
    header_needed: bool,
    batch_size: usize,
    writer: Option<csv::Writer<BufWriter<File>>>,
    rows_written: u64,
    batches_written: u64,
}

impl BatchWriter {
    pub fn new(
        path: impl Into<PathBuf>,
        mode: WriteMode,
        header_needed: bool,
        batch_size: usize,
    ) -> Self {
        Self {
            path: path.into(),
            mode,
            header_needed,
            batch_size: batch_size.max(1),
            writer: None,
            rows_written: 0,
            batches_written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn batches_written(&self) -> u64 {
        self.batches_written
    }

    /// Write one batch and flush it, returning the rows written. An
    /// empty batch is a no-op: it neither opens the file nor writes
    /// the header.
    pub fn write_batch<T: Serialize>(&mut self, batch: &[T]) -> Result<usize, SinkError> {
        if batch.is_empty() {
            return Ok(0);
        }
        let writer = self.open()?;
        for record in batch {
            writer.serialize(record).map_err(SinkError::Csv)?;
        }
        writer.flush().map_err(SinkError::Io)?;
        self.rows_written += batch.len() as u64;
        self.batches_written += 1;
        Ok(batch.len())
    }

    /// Cut `records` into fixed batches and write them in order.
    pub fn write_batches<T: Serialize>(&mut self, records: &[T]) -> Result<usize, SinkError> {
        let mut written = 0;
        for chunk in records.chunks(self.batch_size) {
            written += self.write_batch(chunk)?;
        }
        Ok(written)
    }

    /// Flush, hand the buffer back and sync the file to disk. A writer
    /// that never opened its file closes as a no-op.
    pub fn close(mut self) -> Result<(), SinkError> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        writer.flush().map_err(SinkError::Io)?;
        let buffered = writer
            .into_inner()
            .map_err(|e| SinkError::Io(io::Error::new(e.error().kind(), e.to_string())))?;
        let file = buffered
            .into_inner()
            .map_err(|e| SinkError::Io(e.into_error()))?;
        file.sync_all().map_err(SinkError::Io)?;
        Ok(())
    }

    fn open(&mut self) -> Result<&mut csv::Writer<BufWriter<File>>, SinkError> {
        match self.writer {
            Some(ref mut writer) => Ok(writer),
            None => {
                let mut options = OpenOptions::new();
                match self.mode {
                    WriteMode::Fresh => options.write(true).create(true).truncate(true),
                    WriteMode::Append => options.append(true).create(true),
                };
                let file = options.open(&self.path).map_err(SinkError::Io)?;
                let writer = csv::WriterBuilder::new()
                    .quote_style(csv::QuoteStyle::Always)
                    .has_headers(self.header_needed)
                    .from_writer(BufWriter::new(file));
                Ok(self.writer.insert(writer))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[derive(Serialize)]
    struct Row {
        movie_id: u64,
        title: String,
    }

    fn row(movie_id: u64, title: &str) -> Row {
        Row {
            movie_id,
            title: title.to_string(),
        }
    }

    fn rows(n: u64) -> Vec<Row> {
        (1..=n).map(|i| row(i, "x")).collect()
    }

    #[test]
    fn no_rows_creates_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movies.csv");

        let mut writer = BatchWriter::new(&path, WriteMode::Fresh, true, 500);
        writer.write_batch::<Row>(&[]).unwrap();
        writer.close().unwrap();

        assert!(!path.exists());
    }

    #[test]
    fn fresh_with_no_rows_leaves_existing_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movies.csv");
        fs::write(&path, "\"movie_id\",\"title\"\n\"1\",\"Heat\"\n").unwrap();

        let mut writer = BatchWriter::new(&path, WriteMode::Fresh, true, 500);
        writer.write_batches::<Row>(&[]).unwrap();
        writer.close().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "\"movie_id\",\"title\"\n\"1\",\"Heat\"\n");
    }

    #[test]
    fn header_appears_once_across_batches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movies.csv");

        let mut writer = BatchWriter::new(&path, WriteMode::Fresh, true, 500);
        writer.write_batch(&[row(1, "Heat"), row(2, "Ronin")]).unwrap();
        writer.write_batch(&[row(3, "Rope")]).unwrap();
        writer.close().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "\"movie_id\",\"title\"");
        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines.iter().filter(|l| l.contains("movie_id")).count(),
            1
        );
    }

    #[test]
    fn every_field_is_quoted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movies.csv");

        let mut writer = BatchWriter::new(&path, WriteMode::Fresh, true, 500);
        writer.write_batch(&[row(550, "Fight Club")]).unwrap();
        writer.close().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"550\",\"Fight Club\""));
    }

    #[test]
    fn append_mode_extends_without_a_second_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movies.csv");
        fs::write(&path, "\"movie_id\",\"title\"\n\"1\",\"Heat\"\n").unwrap();

        let mut writer = BatchWriter::new(&path, WriteMode::Append, false, 500);
        writer.write_batch(&[row(2, "Ronin")]).unwrap();
        writer.close().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "\"movie_id\",\"title\"");
        assert_eq!(lines[2], "\"2\",\"Ronin\"");
    }

    #[test]
    fn fresh_mode_truncates_prior_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movies.csv");
        fs::write(&path, "\"movie_id\",\"title\"\n\"9\",\"Stale\"\n").unwrap();

        let mut writer = BatchWriter::new(&path, WriteMode::Fresh, true, 500);
        writer.write_batch(&[row(1, "Heat")]).unwrap();
        writer.close().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.contains("Stale"));
        assert!(content.contains("\"1\",\"Heat\""));
    }

    #[test]
    fn empty_batches_between_real_ones_change_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movies.csv");

        let mut writer = BatchWriter::new(&path, WriteMode::Fresh, true, 500);
        writer.write_batch::<Row>(&[]).unwrap();
        writer.write_batch(&[row(1, "Heat")]).unwrap();
        writer.write_batch::<Row>(&[]).unwrap();
        writer.close().unwrap();

        assert_eq!(writer_rows(&path), 1);
    }

    #[test]
    fn write_batches_cuts_fixed_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movies.csv");

        let mut writer = BatchWriter::new(&path, WriteMode::Fresh, true, 500);
        let written = writer.write_batches(&rows(1200)).unwrap();

        assert_eq!(written, 1200);
        assert_eq!(writer.batches_written(), 3);
        assert_eq!(writer.rows_written(), 1200);
        writer.close().unwrap();

        // header plus every record
        assert_eq!(writer_rows(&path), 1200);
    }

    #[test]
    fn short_tail_batch_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movies.csv");

        let mut writer = BatchWriter::new(&path, WriteMode::Fresh, true, 2);
        writer.write_batches(&rows(5)).unwrap();
        assert_eq!(writer.batches_written(), 3);
        writer.close().unwrap();

        assert_eq!(writer_rows(&path), 5);
    }

    fn writer_rows(path: &Path) -> usize {
        let content = fs::read_to_string(path).unwrap();
        content.lines().count() - 1
    }
}
