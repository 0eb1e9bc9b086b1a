//! Segment bookkeeping and final track types.

use crate::fit::TrackState;
use crate::hit::HitId;
use std::ops::AddAssign;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifier of a segment within one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SegmentId(pub u32);

/// Lifecycle of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SegmentStatus {
    /// Found by the seed scan.
    Seeded,
    /// Grown by the extension step.
    Extended,
    /// Flags computed.
    Classified,
    /// Waiting for the second-stage clustering.
    MergeCandidate,
    /// Absorbed into another segment.
    Merged {
        /// Segment that absorbed this one.
        into: SegmentId,
    },
    /// Emitted as a final track.
    Promoted,
    /// Dropped by a quality filter or a failed fit.
    Discarded,
}

impl SegmentStatus {
    /// Returns true for the terminal states.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Promoted | Self::Discarded | Self::Merged { .. })
    }
}

/// Geometric classification of a fitted segment.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SegmentFlags {
    /// First hit close to the inner boundary.
    pub starts_inner: bool,
    /// Last hit close to the outer radius.
    pub is_central: bool,
    /// Last hit close to the end plate.
    pub is_forward: bool,
    /// Curvature above the curler threshold.
    pub is_curler: bool,
    /// Smallest hit z.
    pub z_min: f64,
    /// Largest hit z.
    pub z_max: f64,
    /// Mean hit z.
    pub z_avg: f64,
}

impl SegmentFlags {
    /// Starts inner, leaves through an outer boundary and does not curl.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.starts_inner && (self.is_central || self.is_forward) && !self.is_curler
    }
}

/// A finalized track segment.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Track {
    /// Segment the track was promoted from.
    pub id: SegmentId,
    /// Hits ordered from the innermost to the outermost layer.
    pub hits: Vec<HitId>,
    /// Parameters at the first (innermost) hit.
    pub state_first: TrackState,
    /// Parameters at the last (outermost) hit.
    pub state_last: TrackState,
    /// Parameters at the nominal reference point (origin).
    pub state_ref: TrackState,
    /// Fit chi-square.
    pub chi2: f64,
    /// Fit degrees of freedom.
    pub ndf: u32,
    /// Classification flags.
    pub flags: SegmentFlags,
    /// Whether the track spans the volume.
    pub complete: bool,
    /// Segments absorbed into this track.
    pub merged_from: Vec<SegmentId>,
}

impl Track {
    /// Number of hits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Returns true if the track has no hits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Counters collected while processing events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventStatistics {
    /// Events processed.
    pub events: usize,
    /// Main tracker hits accepted into the arena.
    pub hits: usize,
    /// Hits dropped by the geometry or radius cut.
    pub hits_dropped: usize,
    /// Seed clusters accepted.
    pub seeds: usize,
    /// Clusters rejected for duplicate rows.
    pub rejected_duplicate_rows: usize,
    /// Clusters split by multiplicity.
    pub split_clusters: usize,
    /// Seeds whose fit could not be initialized.
    pub failed_fits: usize,
    /// Hits added by extension.
    pub extension_hits: usize,
    /// Segments absorbed by merges.
    pub merged_segments: usize,
    /// Merges that failed the refit.
    pub failed_merges: usize,
    /// Auxiliary hits picked up.
    pub auxiliary_hits: usize,
    /// Final tracks emitted.
    pub tracks: usize,
    /// Final tracks flagged complete.
    pub complete_tracks: usize,
}

impl AddAssign for EventStatistics {
    fn add_assign(&mut self, rhs: Self) {
        self.events += rhs.events;
        self.hits += rhs.hits;
        self.hits_dropped += rhs.hits_dropped;
        self.seeds += rhs.seeds;
        self.rejected_duplicate_rows += rhs.rejected_duplicate_rows;
        self.split_clusters += rhs.split_clusters;
        self.failed_fits += rhs.failed_fits;
        self.extension_hits += rhs.extension_hits;
        self.merged_segments += rhs.merged_segments;
        self.failed_merges += rhs.failed_merges;
        self.auxiliary_hits += rhs.auxiliary_hits;
        self.tracks += rhs.tracks;
        self.complete_tracks += rhs.complete_tracks;
    }
}
