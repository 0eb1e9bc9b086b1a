//! trackpat-io: Event input and track output for trackpat.
//!
//! Events are read from JSON, either a single array or one event per line.
//! Tracks are written as JSON lines or as a CSV summary.
//!

mod error;
mod reader;
mod writer;

pub use error::{Error, Result};
pub use reader::{load_run_config, parse_events, read_events, RunConfig};
pub use writer::{read_track_records, TrackFileWriter, TrackRecord};
