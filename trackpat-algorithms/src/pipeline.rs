//! Event-level track finding.

use crate::classify::SegmentClassifier;
use crate::diagnostics::{duplicate_row_report, truth_purity_report, DuplicateRowIssue, PurityIssue};
use crate::extension::{Direction, SegmentExtender};
use crate::index::HitIndex;
use crate::merge::{MergeRound, SegmentMerger};
use crate::nn::MergePredicate;
use crate::pickup::AuxiliaryPickup;
use crate::predicate::{CircleCenterDistance, SegmentView, TrackParameterDistance};
use crate::seeding::{windows, SeedScanner};
use crate::segment::Segment;
use rayon::prelude::*;
use trackpat_core::{
    Detector, DetectorGeometry, Event, EventStatistics, HitArena, HitId, IncrementalFit,
    Result, SegmentId, SegmentStatus, Track, TrackFitter, TrackingConfig,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Rounds of parameter-based merging for incomplete segments.
const INCOMPLETE_MERGE_ROUNDS: usize = 2;
/// Rounds of circle-based merging for curlers.
const CURLER_MERGE_ROUNDS: usize = 1;

/// A segment absorbed by a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConsumedSegment {
    /// The absorbed segment.
    pub id: SegmentId,
    /// Segment it was merged into.
    pub into: SegmentId,
    /// Its hits at the time of the merge.
    pub hits: Vec<HitId>,
}

/// Reports on the final tracks.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventDiagnostics {
    /// Tracks with too many multiply-occupied rows.
    pub duplicate_rows: Vec<DuplicateRowIssue>,
    /// Tracks mixing truth labels.
    pub impure: Vec<PurityIssue>,
}

/// Everything produced for one event.
#[derive(Debug, Clone, Default)]
pub struct EventResult {
    /// Event number.
    pub number: u64,
    /// Final tracks: complete tracks in promotion order, then merged, then the rest.
    pub tracks: Vec<Track>,
    /// Segments absorbed by merges.
    pub consumed: Vec<ConsumedSegment>,
    /// Segments dropped because they could not be fitted or classified.
    /// Their hits went back to the pool.
    pub discarded: Vec<SegmentId>,
    /// Counters.
    pub statistics: EventStatistics,
    /// Checks of the final tracks.
    pub diagnostics: EventDiagnostics,
    /// Hits the track handles refer to.
    pub arena: HitArena,
}

/// Results of a batch of events.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    /// Per-event results in input order.
    pub events: Vec<EventResult>,
    /// Counters summed over the batch.
    pub statistics: EventStatistics,
}

/// The track finder.
///
/// Holds no per-event state, so one finder can process many events, also
/// concurrently.
#[derive(Debug, Clone)]
pub struct TrackFinder<F, G> {
    config: TrackingConfig,
    fitter: F,
    geometry: G,
}

impl<F: TrackFitter, G: DetectorGeometry> TrackFinder<F, G> {
    /// Creates a finder after validating the configuration and geometry.
    pub fn new(config: TrackingConfig, fitter: F, geometry: G) -> Result<Self> {
        config.validate()?;
        geometry.validate()?;
        Ok(Self {
            config,
            fitter,
            geometry,
        })
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// Fitter in use.
    #[must_use]
    pub fn fitter(&self) -> &F {
        &self.fitter
    }

    /// Geometry in use.
    #[must_use]
    pub fn geometry(&self) -> &G {
        &self.geometry
    }

    /// Finds the tracks of one event.
    pub fn process_event(&self, event: &Event) -> EventResult {
        let mut stats = EventStatistics {
            events: 1,
            ..EventStatistics::default()
        };
        if event.is_empty() {
            log::warn!("event {} has no hits", event.number);
            return EventResult {
                number: event.number,
                statistics: stats,
                ..EventResult::default()
            };
        }

        let build = HitArena::from_event(
            event,
            &self.geometry,
            self.config.n_bins,
            self.config.r_min_cut,
        );
        let arena = build.arena;
        stats.hits = arena.ids_of(Detector::Main).count();
        stats.hits_dropped = build.dropped;

        let mut index = HitIndex::new(&arena, self.geometry.n_layers());
        let mut next_id = 0u32;
        let mut segments = self.find_segments(&arena, &mut index, &mut next_id, &mut stats);

        for segment in &mut segments {
            if segment.status == SegmentStatus::Extended {
                self.classify(&arena, &mut index, segment);
            }
        }
        let mut promoted = Vec::new();
        for (i, segment) in segments.iter_mut().enumerate() {
            if route(segment) {
                promoted.push(i);
            }
        }

        let merger = SegmentMerger::new(&self.fitter, self.config.max_merge_chi2);
        let by_parameters = TrackParameterDistance::new(
            self.config.max_merge_chi2,
            self.config.merge_resolution.clone(),
        );
        for _ in 0..INCOMPLETE_MERGE_ROUNDS {
            self.merge_stage(
                &arena,
                &merger,
                &mut segments,
                &mut index,
                false,
                &by_parameters,
                &mut next_id,
                &mut promoted,
                &mut stats,
            );
        }
        let by_circle = CircleCenterDistance::new(
            self.config.curler_center_dist,
            self.config.curler_radius_tolerance,
        );
        for _ in 0..CURLER_MERGE_ROUNDS {
            self.merge_stage(
                &arena,
                &merger,
                &mut segments,
                &mut index,
                true,
                &by_circle,
                &mut next_id,
                &mut promoted,
                &mut stats,
            );
        }

        // everything still waiting is emitted as is, merged segments first
        let mut rest: Vec<usize> = segments
            .iter()
            .enumerate()
            .filter(|(_, s)| s.status == SegmentStatus::MergeCandidate)
            .map(|(i, _)| i)
            .collect();
        rest.sort_by_key(|&i| (segments[i].merged_from.is_empty(), segments[i].id));
        for &i in &rest {
            segments[i].status = SegmentStatus::Promoted;
        }
        let order: Vec<usize> = promoted.into_iter().chain(rest).collect();
        debug_assert!(segments.iter().all(|s| s.status.is_terminal()));

        if self.config.pick_up_auxiliary_hits {
            let pickup = AuxiliaryPickup::new(&self.config, &self.geometry);
            let mut used = vec![false; arena.len()];
            for &i in &order {
                stats.auxiliary_hits += pickup.pick_up(&arena, &mut segments[i], &mut used).len();
            }
        }

        let tracks: Vec<Track> = order
            .iter()
            .filter_map(|&i| segments[i].to_track(&arena))
            .collect();
        stats.tracks = tracks.len();
        stats.complete_tracks = tracks.iter().filter(|t| t.complete).count();

        let mut consumed = Vec::new();
        let mut discarded = Vec::new();
        for segment in segments {
            match segment.status {
                SegmentStatus::Merged { into } => consumed.push(ConsumedSegment {
                    id: segment.id,
                    into,
                    hits: segment.hits,
                }),
                SegmentStatus::Discarded => discarded.push(segment.id),
                _ => {}
            }
        }

        let diagnostics = EventDiagnostics {
            duplicate_rows: duplicate_row_report(
                &arena,
                &tracks,
                self.config.duplicate_row_fraction,
            ),
            impure: truth_purity_report(&arena, &tracks, self.config.min_truth_purity),
        };

        log::debug!(
            "event {}: {} hits, {} seeds, {} merged, {} tracks ({} complete)",
            event.number,
            stats.hits,
            stats.seeds,
            stats.merged_segments,
            stats.tracks,
            stats.complete_tracks
        );
        if !diagnostics.duplicate_rows.is_empty() || !diagnostics.impure.is_empty() {
            log::debug!(
                "event {}: {} tracks with duplicate rows, {} impure tracks",
                event.number,
                diagnostics.duplicate_rows.len(),
                diagnostics.impure.len()
            );
        }

        EventResult {
            number: event.number,
            tracks,
            consumed,
            discarded,
            statistics: stats,
            diagnostics,
            arena,
        }
    }

    /// Processes independent events in parallel. Results keep the input order.
    pub fn process_events(&self, events: &[Event]) -> BatchResult {
        let events: Vec<EventResult> = events
            .par_iter()
            .map(|event| self.process_event(event))
            .collect();
        let mut statistics = EventStatistics::default();
        for result in &events {
            statistics += result.statistics;
        }
        BatchResult { events, statistics }
    }

    /// Seed scan over all passes and windows, extending each seed as it is found.
    fn find_segments(
        &self,
        arena: &HitArena,
        index: &mut HitIndex,
        next_id: &mut u32,
        stats: &mut EventStatistics,
    ) -> Vec<Segment<F::Fit>> {
        let scanner = SeedScanner::new(&self.config);
        let windows = windows(self.geometry.n_layers(), self.config.seed_row_range);
        let mut segments = Vec::new();

        for pass in 1..=self.config.seed_passes {
            let cut = self.config.distance_cut_for_pass(pass);
            for &window in &windows {
                let scan = scanner.scan_window(arena, index, window, cut);
                stats.rejected_duplicate_rows += scan.rejected_duplicate_rows;
                stats.split_clusters += scan.split_clusters;
                for seed in scan.seeds {
                    stats.seeds += 1;
                    segments.push(self.grow(arena, index, seed, next_id, stats));
                }
            }
            log::trace!(
                "pass {pass} (cut {cut:.1}): {} segments, {} hits left",
                segments.len(),
                index.len()
            );
        }
        segments
    }

    /// Fits a claimed seed, extends it both ways and fills the layers it
    /// skipped. A seed that cannot be fitted is discarded and gives its hits
    /// back.
    fn grow(
        &self,
        arena: &HitArena,
        index: &mut HitIndex,
        seed: Vec<HitId>,
        next_id: &mut u32,
        stats: &mut EventStatistics,
    ) -> Segment<F::Fit> {
        let id = SegmentId(*next_id);
        *next_id += 1;
        let Some(fit) = self.fitter.initialize(&arena.resolve(&seed)) else {
            log::trace!("{} fit failed for seed of {} hits", self.fitter.name(), seed.len());
            let mut segment = Segment::unfitted(id, seed);
            index.release_all(&segment.discard());
            stats.failed_fits += 1;
            return segment;
        };

        let mut segment = Segment::new(id, seed, fit);
        let extender = SegmentExtender::new(&self.config, &self.geometry);
        for direction in [Direction::Forward, Direction::Backward] {
            let outcome = extender.extend(arena, index, &mut segment, direction);
            stats.extension_hits += outcome.added.len();
        }
        stats.extension_hits += extender.fill_gaps(arena, index, &mut segment).len();
        if let Some(fit) = segment.fit.as_mut() {
            fit.smooth();
        }
        segment.status = SegmentStatus::Extended;
        segment
    }

    /// Sets flags and marks the segment classified. A segment that cannot
    /// be classified is discarded.
    fn classify(&self, arena: &HitArena, index: &mut HitIndex, segment: &mut Segment<F::Fit>) {
        match SegmentClassifier::new(&self.config, &self.geometry).classify(arena, segment) {
            Some(flags) => {
                segment.flags = Some(flags);
                segment.status = SegmentStatus::Classified;
            }
            None => {
                log::trace!("segment {} could not be classified", segment.id.0);
                index.release_all(&segment.discard());
            }
        }
    }

    /// One merge round over the waiting segments that are (`curlers`) or are
    /// not curlers.
    #[allow(clippy::too_many_arguments)]
    fn merge_stage<P>(
        &self,
        arena: &HitArena,
        merger: &SegmentMerger<'_, F>,
        segments: &mut Vec<Segment<F::Fit>>,
        index: &mut HitIndex,
        curlers: bool,
        predicate: &P,
        next_id: &mut u32,
        promoted: &mut Vec<usize>,
        stats: &mut EventStatistics,
    ) where
        P: for<'v> MergePredicate<SegmentView<'v, F::Fit>>,
    {
        let candidates: Vec<usize> = segments
            .iter()
            .enumerate()
            .filter(|(_, s)| {
                s.status == SegmentStatus::MergeCandidate
                    && s.flags.is_some_and(|f| f.is_curler == curlers)
            })
            .map(|(i, _)| i)
            .collect();
        if candidates.len() < 2 {
            return;
        }

        let first_new = segments.len();
        let MergeRound {
            created,
            absorbed,
            failed,
        } = merger.merge_round(arena, segments, &candidates, predicate, next_id);
        stats.merged_segments += absorbed;
        stats.failed_merges += failed;

        for i in first_new..segments.len() {
            self.classify(arena, index, &mut segments[i]);
            if route(&mut segments[i]) {
                promoted.push(i);
            }
        }
        if !created.is_empty() {
            log::debug!(
                "merged {absorbed} {} segments into {}",
                if curlers { "curling" } else { "incomplete" },
                created.len()
            );
        }
    }
}

/// Promotes a classified complete segment or queues it for merging. Returns
/// true if it was promoted.
fn route<T>(segment: &mut Segment<T>) -> bool {
    if segment.status != SegmentStatus::Classified {
        return false;
    }
    let complete = segment.flags.is_some_and(|f| f.is_complete());
    segment.status = if complete {
        SegmentStatus::Promoted
    } else {
        SegmentStatus::MergeCandidate
    };
    complete
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helix::HelixFitter;
    use trackpat_core::{CylindricalGeometry, Error, SegmentFlags};

    #[test]
    fn test_new_validates_geometry() {
        let build = |geometry: CylindricalGeometry| {
            TrackFinder::new(TrackingConfig::default(), HelixFitter::new(&geometry), geometry)
        };
        assert!(build(CylindricalGeometry::new(20, 100.0, 300.0, 1000.0)).is_ok());
        assert!(matches!(
            build(CylindricalGeometry::new(0, 100.0, 300.0, 1000.0)),
            Err(Error::InvalidGeometry(_))
        ));
        assert!(matches!(
            build(CylindricalGeometry::new(20, 100.0, 300.0, 0.0)),
            Err(Error::InvalidGeometry(_))
        ));
        let aux_outside = CylindricalGeometry::new(20, 100.0, 300.0, 1000.0)
            .with_auxiliary_radii(vec![150.0]);
        assert!(matches!(build(aux_outside), Err(Error::InvalidGeometry(_))));
    }

    #[test]
    fn test_route_only_classified() {
        let complete = SegmentFlags {
            starts_inner: true,
            is_central: true,
            ..SegmentFlags::default()
        };

        let mut segment = Segment::new(SegmentId(0), vec![HitId(0)], ());
        segment.flags = Some(complete);
        assert!(!route(&mut segment));
        assert_eq!(segment.status, SegmentStatus::Seeded);

        segment.status = SegmentStatus::Classified;
        assert!(route(&mut segment));
        assert_eq!(segment.status, SegmentStatus::Promoted);

        let mut partial = Segment::new(SegmentId(1), vec![HitId(1)], ());
        partial.flags = Some(SegmentFlags::default());
        partial.status = SegmentStatus::Classified;
        assert!(!route(&mut partial));
        assert_eq!(partial.status, SegmentStatus::MergeCandidate);

        let mut dropped: Segment<()> = Segment::unfitted(SegmentId(2), vec![HitId(2)]);
        assert!(!route(&mut dropped));
        assert_eq!(dropped.status, SegmentStatus::Discarded);
    }
}
