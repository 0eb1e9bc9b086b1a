//! Event and configuration readers.

use crate::{Error, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use trackpat_core::{CylindricalGeometry, DetectorGeometry, Event, TrackingConfig};

/// Parses events from JSON text.
///
/// Accepts either a single JSON array of events or JSON lines with one
/// event per line. Blank lines are skipped.
///
/// # Errors
/// Returns an error naming the offending line if an event does not parse.
pub fn parse_events(text: &str) -> Result<Vec<Event>> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }

    let lines: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .collect();
    lines
        .par_iter()
        .map(|&(n, line)| {
            serde_json::from_str(line)
                .map_err(|e| Error::InvalidFormat(format!("line {}: {e}", n + 1)))
        })
        .collect()
}

/// Reads all events of a JSON or JSON-lines file.
///
/// # Errors
/// Returns an error if the file cannot be read or does not parse.
pub fn read_events<P: AsRef<Path>>(path: P) -> Result<Vec<Event>> {
    let text = fs::read_to_string(&path)?;
    let events = parse_events(&text)?;
    log::debug!(
        "read {} events from {}",
        events.len(),
        path.as_ref().display()
    );
    Ok(events)
}

/// Settings for a run: the finder configuration and the detector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Track finding parameters.
    pub tracking: TrackingConfig,
    /// Detector description.
    pub geometry: CylindricalGeometry,
}

/// Loads and validates a run configuration from a JSON file.
///
/// Missing fields take their default values.
///
/// # Errors
/// Returns an error if the file cannot be read, does not parse, or holds
/// out-of-range values.
pub fn load_run_config<P: AsRef<Path>>(path: P) -> Result<RunConfig> {
    let text = fs::read_to_string(path)?;
    let config: RunConfig = serde_json::from_str(&text)?;
    config.tracking.validate()?;
    config.geometry.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const LINES: &str = r#"
{"number": 1, "hits": [{"position": {"x": 110.0, "y": 0.0, "z": 5.0}, "truth": 3}]}

{"number": 2, "hits": [], "auxiliary_hits": [{"position": {"x": 40.0, "y": 1.0, "z": 0.0}, "layer": 0}]}
"#;

    #[test]
    fn test_parse_json_lines() {
        let events = parse_events(LINES).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].number, 1);
        assert_eq!(events[0].hits[0].truth, Some(3));
        assert!(events[1].is_empty());
        assert_eq!(events[1].auxiliary_hits.len(), 1);
    }

    #[test]
    fn test_parse_array() {
        let text = r#"[{"hits": [{"position": {"x": 1.0, "y": 2.0, "z": 3.0}}]}, {"number": 4, "hits": []}]"#;
        let events = parse_events(text).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].number, 0);
        assert!(events[0].hits[0].truth.is_none());
        assert_eq!(events[1].number, 4);
    }

    #[test]
    fn test_parse_error_names_line() {
        let err = parse_events("{\"hits\": []}\n{not json}\n").unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn test_read_events_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(LINES.as_bytes()).unwrap();
        let events = read_events(file.path()).unwrap();
        assert_eq!(events.len(), 2);
        assert!(read_events("/nonexistent/events.jsonl").is_err());
    }

    #[test]
    fn test_load_run_config_defaults_and_validation() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{"tracking": {"distance_cut": 25.0}, "geometry": {"n_layers": 50, "inner_radius": 100.0, "outer_radius": 600.0, "max_drift_length": 1200.0}}"#)
            .unwrap();
        let config = load_run_config(file.path()).unwrap();
        assert!((config.tracking.distance_cut - 25.0).abs() < f64::EPSILON);
        assert_eq!(config.tracking.seed_passes, 4);
        assert_eq!(config.geometry.n_layers, 50);

        let mut bad = NamedTempFile::new().unwrap();
        bad.write_all(br#"{"tracking": {"seed_passes": 0}}"#).unwrap();
        assert!(matches!(
            load_run_config(bad.path()),
            Err(Error::CoreError(_))
        ));
    }
}
