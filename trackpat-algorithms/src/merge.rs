//! Second-stage clustering of segments into tracks.
//!
//! Segments are clustered with a segment-level [`MergePredicate`]; every
//! group of two or more is refitted as one. Groups whose refit fails are
//! left untouched.

use crate::nn::{MergePredicate, NearestNeighborClustering};
use crate::predicate::SegmentView;
use crate::segment::Segment;
use trackpat_core::{HitArena, HitId, IncrementalFit, SegmentId, SegmentStatus, TrackFitter};

/// Counters of one merge round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeRound {
    /// Segments created by the round.
    pub created: Vec<SegmentId>,
    /// Segments absorbed into new ones.
    pub absorbed: usize,
    /// Groups whose refit failed.
    pub failed: usize,
}

/// Merges compatible segments and refits them.
#[derive(Debug, Clone, Copy)]
pub struct SegmentMerger<'a, T> {
    fitter: &'a T,
    max_chi2_per_ndf: f64,
}

impl<'a, T: TrackFitter> SegmentMerger<'a, T> {
    /// Creates a merger; a merged refit must stay below `max_chi2_per_ndf`.
    #[must_use]
    pub fn new(fitter: &'a T, max_chi2_per_ndf: f64) -> Self {
        Self {
            fitter,
            max_chi2_per_ndf,
        }
    }

    /// Runs one round over `candidates` (indices into `segments`).
    ///
    /// New segments are appended to `segments` with ids taken from
    /// `next_id`. Absorbed segments are marked [`SegmentStatus::Merged`] and
    /// lose their fit; their hits stay listed for traceability.
    pub fn merge_round<P>(
        &self,
        arena: &HitArena,
        segments: &mut Vec<Segment<T::Fit>>,
        candidates: &[usize],
        predicate: &P,
        next_id: &mut u32,
    ) -> MergeRound
    where
        P: for<'v> MergePredicate<SegmentView<'v, T::Fit>> + ?Sized,
    {
        let mut round = MergeRound::default();

        let groups: Vec<Vec<usize>> = {
            let (owners, views): (Vec<usize>, Vec<SegmentView<'_, T::Fit>>) = candidates
                .iter()
                .filter_map(|&i| segments[i].view(arena).map(|view| (i, view)))
                .unzip();
            NearestNeighborClustering::new(2)
                .cluster(&views, |_| 0, predicate)
                .into_iter()
                .map(|members| members.into_iter().map(|m| owners[m]).collect())
                .collect()
        };

        for group in groups {
            let mut hits: Vec<HitId> = group
                .iter()
                .flat_map(|&i| segments[i].hits.iter().copied())
                .collect();
            hits.sort_unstable();
            hits.dedup();

            let refit = self
                .fitter
                .initialize(&arena.resolve(&hits))
                .filter(|fit| fit.chi2_per_ndf() <= self.max_chi2_per_ndf);
            let Some(mut fit) = refit else {
                log::trace!("merge of {} segments failed the refit", group.len());
                round.failed += 1;
                continue;
            };
            fit.smooth();

            let id = SegmentId(*next_id);
            *next_id += 1;
            let mut merged = Segment::new(id, hits, fit);
            merged.status = SegmentStatus::Extended;
            for &i in &group {
                let constituent = &mut segments[i];
                merged.merged_from.push(constituent.id);
                merged.merged_from.extend_from_slice(&constituent.merged_from);
                constituent.status = SegmentStatus::Merged { into: id };
                constituent.release_fit();
            }
            merged.merged_from.sort_unstable();
            merged.merged_from.dedup();

            log::trace!(
                "merged {:?} into segment {} ({} hits)",
                merged.merged_from,
                id.0,
                merged.len()
            );
            round.absorbed += group.len();
            round.created.push(id);
            segments.push(merged);
        }
        round
    }
}
