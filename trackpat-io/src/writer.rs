//! Track writers.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use trackpat_algorithms::EventResult;
use trackpat_core::{Point3, Track};

/// One output line: a track with its event number and hit positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    /// Event the track belongs to.
    pub event: u64,
    /// The track.
    #[serde(flatten)]
    pub track: Track,
    /// Hit positions in the order of `track.hits`.
    pub positions: Vec<Point3>,
}

impl TrackRecord {
    /// Builds the records of one event.
    #[must_use]
    pub fn from_event(result: &EventResult) -> Vec<Self> {
        result
            .tracks
            .iter()
            .map(|track| Self {
                event: result.number,
                track: track.clone(),
                positions: track
                    .hits
                    .iter()
                    .map(|&id| result.arena.get(id).position)
                    .collect(),
            })
            .collect()
    }
}

/// Writer for track output.
///
/// JSON lines carry everything; the CSV form is a one-row-per-track summary.
pub struct TrackFileWriter {
    writer: BufWriter<File>,
}

impl TrackFileWriter {
    /// CSV column names.
    pub const CSV_HEADER: &'static str =
        "event,track,n_hits,complete,curler,chi2,ndf,omega,phi0,d0,z0,tan_lambda,merged_from";

    /// Creates a new file writer.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        Ok(Self { writer })
    }

    /// Writes the tracks of one event as JSON lines. Returns the number of tracks written.
    ///
    /// # Errors
    /// Returns an error if serialization or writing fails.
    pub fn write_event_jsonl(&mut self, result: &EventResult) -> Result<usize> {
        let records = TrackRecord::from_event(result);
        for record in &records {
            serde_json::to_writer(&mut self.writer, record)?;
            self.writer.write_all(b"\n")?;
        }
        Ok(records.len())
    }

    /// Writes the CSV header line.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_csv_header(&mut self) -> Result<()> {
        writeln!(self.writer, "{}", Self::CSV_HEADER)?;
        Ok(())
    }

    /// Writes one CSV row per track of one event. Returns the number of rows written.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_event_csv(&mut self, result: &EventResult) -> Result<usize> {
        for t in &result.tracks {
            let merged: Vec<String> = t.merged_from.iter().map(|id| id.0.to_string()).collect();
            let s = &t.state_ref;
            writeln!(
                self.writer,
                "{},{},{},{},{},{},{},{},{},{},{},{},{}",
                result.number,
                t.id.0,
                t.len(),
                t.complete,
                t.flags.is_curler,
                t.chi2,
                t.ndf,
                s.omega,
                s.phi0,
                s.d0,
                s.z0,
                s.tan_lambda,
                merged.join(";")
            )?;
        }
        Ok(result.tracks.len())
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Reads back a JSON-lines track file.
///
/// # Errors
/// Returns an error if the file cannot be read or a line does not parse.
pub fn read_track_records<P: AsRef<Path>>(path: P) -> Result<Vec<TrackRecord>> {
    let text = fs::read_to_string(path)?;
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| Ok(serde_json::from_str(line)?))
        .collect()
}
