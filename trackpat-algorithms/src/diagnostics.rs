//! Post-hoc checks of the final tracks.
//!
//! Nothing here changes the result; the reports are meant for logs and for
//! tuning the configuration on simulated events.
#![allow(clippy::cast_precision_loss)]

use crate::quality::duplicate_row_fraction;
use std::collections::HashMap;
use trackpat_core::{Detector, HitArena, HitId, SegmentId, Track};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A track with too many multiply-occupied pad rows.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DuplicateRowIssue {
    /// Offending track.
    pub track: SegmentId,
    /// Fraction of its occupied rows holding more than one hit.
    pub fraction: f64,
}

/// Tracks whose main-tracker duplicate-row fraction exceeds `max_fraction`.
#[must_use]
pub fn duplicate_row_report(
    arena: &HitArena,
    tracks: &[Track],
    max_fraction: f64,
) -> Vec<DuplicateRowIssue> {
    tracks
        .iter()
        .filter_map(|track| {
            let main: Vec<HitId> = track
                .hits
                .iter()
                .copied()
                .filter(|&id| arena.get(id).detector == Detector::Main)
                .collect();
            let fraction = duplicate_row_fraction(arena, &main);
            (fraction > max_fraction).then_some(DuplicateRowIssue {
                track: track.id,
                fraction,
            })
        })
        .collect()
}

/// A track whose hits come from more than one true particle.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PurityIssue {
    /// Offending track.
    pub track: SegmentId,
    /// Truth label holding most of the hits.
    pub dominant: u64,
    /// Share of labelled hits carrying the dominant label.
    pub purity: f64,
}

/// Tracks whose dominant truth label holds less than `min_purity` of the
/// labelled hits. Tracks without labelled hits are skipped.
#[must_use]
pub fn truth_purity_report(arena: &HitArena, tracks: &[Track], min_purity: f64) -> Vec<PurityIssue> {
    tracks
        .iter()
        .filter_map(|track| {
            let mut counts: HashMap<u64, usize> = HashMap::new();
            for &id in &track.hits {
                if let Some(label) = arena.get(id).truth {
                    *counts.entry(label).or_default() += 1;
                }
            }
            let labelled: usize = counts.values().sum();
            let (dominant, count) = counts
                .into_iter()
                .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))?;
            let purity = count as f64 / labelled as f64;
            (purity < min_purity).then_some(PurityIssue {
                track: track.id,
                dominant,
                purity,
            })
        })
        .collect()
}
