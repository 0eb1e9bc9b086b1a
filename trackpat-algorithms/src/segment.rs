//! Track segments while they move through the pipeline.

use crate::predicate::SegmentView;
use trackpat_core::{
    HitArena, HitId, IncrementalFit, Point3, SegmentFlags, SegmentId, SegmentStatus, Track,
    TrackState,
};

/// A cluster of hits together with its live fit.
///
/// The fit is owned by the segment and dropped by [`Segment::release_fit`]
/// or when the segment itself goes away.
#[derive(Debug)]
pub struct Segment<T> {
    /// Identifier within the event.
    pub id: SegmentId,
    /// Member hits, duplicate-free.
    pub hits: Vec<HitId>,
    /// Live fit, if one is held.
    pub fit: Option<T>,
    /// Classification, once computed.
    pub flags: Option<SegmentFlags>,
    /// Lifecycle state.
    pub status: SegmentStatus,
    /// Segments absorbed into this one.
    pub merged_from: Vec<SegmentId>,
}

impl<T> Segment<T> {
    /// Creates a seeded segment.
    #[must_use]
    pub fn new(id: SegmentId, hits: Vec<HitId>, fit: T) -> Self {
        let mut hits = hits;
        hits.sort_unstable();
        hits.dedup();
        Self {
            id,
            hits,
            fit: Some(fit),
            flags: None,
            status: SegmentStatus::Seeded,
            merged_from: Vec::new(),
        }
    }

    /// Creates a segment whose fit could not be initialized. It starts out
    /// discarded and holds its hits only until [`Segment::discard`] hands
    /// them back.
    #[must_use]
    pub fn unfitted(id: SegmentId, hits: Vec<HitId>) -> Self {
        Self {
            id,
            hits,
            fit: None,
            flags: None,
            status: SegmentStatus::Discarded,
            merged_from: Vec::new(),
        }
    }

    /// Number of hits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Returns true if the segment holds no hits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Whether the segment is still part of the event (not merged away or discarded).
    #[must_use]
    pub fn is_live(&self) -> bool {
        !matches!(
            self.status,
            SegmentStatus::Merged { .. } | SegmentStatus::Discarded
        )
    }

    /// Drops the fit and returns the fitter's resources.
    pub fn release_fit(&mut self) {
        self.fit = None;
    }

    /// Marks the segment discarded, drops its fit and returns its hits.
    pub fn discard(&mut self) -> Vec<HitId> {
        self.status = SegmentStatus::Discarded;
        self.release_fit();
        std::mem::take(&mut self.hits)
    }

    /// Adds a hit unless it is already a member.
    pub fn push_hit(&mut self, id: HitId) {
        if let Err(pos) = self.hits.binary_search(&id) {
            self.hits.insert(pos, id);
        }
    }

    /// Innermost and outermost hit positions by transverse radius.
    #[must_use]
    pub fn end_points(&self, arena: &HitArena) -> Option<(Point3, Point3)> {
        let by_rho = |a: &&HitId, b: &&HitId| {
            let ra = arena.get(**a).position.rho();
            let rb = arena.get(**b).position.rho();
            ra.total_cmp(&rb)
        };
        let inner = self.hits.iter().min_by(by_rho)?;
        let outer = self.hits.iter().max_by(by_rho)?;
        Some((arena.get(*inner).position, arena.get(*outer).position))
    }

    /// Hits ordered from the innermost to the outermost, by radius.
    #[must_use]
    pub fn ordered_hits(&self, arena: &HitArena) -> Vec<HitId> {
        let mut hits = self.hits.clone();
        hits.sort_by(|a, b| {
            let ra = arena.get(*a).position.rho();
            let rb = arena.get(*b).position.rho();
            ra.total_cmp(&rb).then(a.cmp(b))
        });
        hits
    }
}

impl<T: IncrementalFit> Segment<T> {
    /// View handed to the segment-level merge predicates.
    #[must_use]
    pub fn view(&self, arena: &HitArena) -> Option<SegmentView<'_, T>> {
        let fit = self.fit.as_ref()?;
        let (inner, outer) = self.end_points(arena)?;
        let state = fit.propagate(&Point3::default())?;
        Some(SegmentView {
            id: self.id,
            inner,
            outer,
            state,
            fit,
        })
    }

    /// Builds the output track. Returns `None` without a fit.
    #[must_use]
    pub fn to_track(&self, arena: &HitArena) -> Option<Track> {
        let fit = self.fit.as_ref()?;
        let (inner, outer) = self.end_points(arena)?;
        let state_at = |point: &Point3| fit.propagate(point).unwrap_or_else(|| TrackState {
            reference: *point,
            ..TrackState::default()
        });
        let flags = self.flags.unwrap_or_default();
        Some(Track {
            id: self.id,
            hits: self.ordered_hits(arena),
            state_first: state_at(&inner),
            state_last: state_at(&outer),
            state_ref: state_at(&Point3::default()),
            chi2: fit.chi2(),
            ndf: fit.ndf(),
            flags,
            complete: flags.is_complete(),
            merged_from: self.merged_from.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trackpat_core::{CylindricalGeometry, Event, RawHit};

    #[test]
    fn test_new_deduplicates() {
        let segment = Segment::new(SegmentId(0), vec![HitId(3), HitId(1), HitId(3)], ());
        assert_eq!(segment.hits, vec![HitId(1), HitId(3)]);
        assert_eq!(segment.status, SegmentStatus::Seeded);
        assert!(segment.is_live());
    }

    #[test]
    fn test_discard_returns_hits() {
        let mut segment = Segment::new(SegmentId(4), vec![HitId(2), HitId(0)], 1u8);
        assert_eq!(segment.discard(), vec![HitId(0), HitId(2)]);
        assert_eq!(segment.status, SegmentStatus::Discarded);
        assert!(segment.fit.is_none() && segment.is_empty());
        assert!(!segment.is_live());

        let mut unfitted: Segment<u8> = Segment::unfitted(SegmentId(5), vec![HitId(1)]);
        assert!(!unfitted.is_live());
        assert_eq!(unfitted.discard(), vec![HitId(1)]);
    }

    #[test]
    fn test_push_hit_keeps_set() {
        let mut segment = Segment::new(SegmentId(0), vec![HitId(1), HitId(5)], ());
        segment.push_hit(HitId(3));
        segment.push_hit(HitId(5));
        assert_eq!(segment.hits, vec![HitId(1), HitId(3), HitId(5)]);
    }

    #[test]
    fn test_release_fit() {
        let mut segment = Segment::new(SegmentId(2), vec![HitId(0)], 7u8);
        assert!(segment.fit.is_some());
        segment.release_fit();
        assert!(segment.fit.is_none());
    }

    #[test]
    fn test_ordering_by_radius() {
        let geometry = CylindricalGeometry::new(10, 100.0, 200.0, 1000.0);
        let event = Event::new(
            0,
            vec![
                RawHit::new(150.0, 0.0, 0.0),
                RawHit::new(110.0, 0.0, 0.0),
                RawHit::new(190.0, 0.0, 0.0),
            ],
        );
        let arena = HitArena::from_event(&event, &geometry, 10, 0.0).arena;
        let segment = Segment::new(SegmentId(0), vec![HitId(0), HitId(1), HitId(2)], ());
        assert_eq!(segment.ordered_hits(&arena), vec![HitId(1), HitId(0), HitId(2)]);
        let (inner, outer) = segment.end_points(&arena).unwrap();
        assert!((inner.x - 110.0).abs() < 1e-12);
        assert!((outer.x - 190.0).abs() < 1e-12);
    }
}
