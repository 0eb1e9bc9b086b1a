//! Layer-by-layer segment extension.

use crate::index::HitIndex;
use crate::segment::Segment;
use std::collections::BTreeSet;
use trackpat_core::{
    DetectorGeometry, DetectorLayer, HitArena, HitId, IncrementalFit, TrackingConfig,
};

/// Direction of extension in layer space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Toward decreasing layer index (inward).
    Forward,
    /// Toward increasing layer index (outward).
    Backward,
}

impl Direction {
    /// Layer after `layer` in this direction, `None` past the first or last row.
    #[must_use]
    pub fn step(self, layer: u32, n_layers: u32) -> Option<u32> {
        match self {
            Self::Forward => layer.checked_sub(1),
            Self::Backward => layer.checked_add(1).filter(|&l| l < n_layers),
        }
    }
}

/// What one directional extension did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionOutcome {
    /// Hits added, in the order they were picked.
    pub added: Vec<HitId>,
    /// Consecutive misses when the walk ended.
    pub misses: u32,
    /// Whether the walk stopped on too many consecutive misses.
    pub aborted: bool,
}

/// Grows segments through neighbouring layers using the segment's fit.
#[derive(Debug, Clone, Copy)]
pub struct SegmentExtender<'a, G: ?Sized> {
    config: &'a TrackingConfig,
    geometry: &'a G,
}

impl<'a, G: DetectorGeometry + ?Sized> SegmentExtender<'a, G> {
    /// Creates an extender.
    #[must_use]
    pub fn new(config: &'a TrackingConfig, geometry: &'a G) -> Self {
        Self { config, geometry }
    }

    /// Extends `segment` in `direction`, claiming every hit it adds.
    ///
    /// At each layer the fit predicts the crossing point. Available hits
    /// within the drift-bin gate and the distance cut of the prediction are
    /// candidates; the one with the smallest chi-square increment is offered
    /// to the fit.
    pub fn extend<F: IncrementalFit>(
        &self,
        arena: &HitArena,
        index: &mut HitIndex,
        segment: &mut Segment<F>,
        direction: Direction,
    ) -> ExtensionOutcome {
        let mut outcome = ExtensionOutcome::default();
        let n_layers = index.n_layers();
        let layers = segment.hits.iter().map(|&id| arena.get(id).layer);
        let edge = match direction {
            Direction::Forward => layers.min(),
            Direction::Backward => layers.max(),
        };
        let (Some(mut layer), Some(fit)) = (edge, segment.fit.as_mut()) else {
            return outcome;
        };

        while let Some(next) = direction.step(layer, n_layers) {
            layer = next;

            if let Some((id, dc)) = self.take_best(arena, index, fit, layer) {
                log::trace!("{direction:?}: layer {layer} took hit {} (dchi2 {dc:.2})", id.0);
                index.claim(id);
                outcome.added.push(id);
                outcome.misses = 0;
            } else {
                outcome.misses += 1;
                if outcome.misses > self.config.max_step_without_hit {
                    outcome.aborted = true;
                    break;
                }
            }
        }

        for &id in &outcome.added {
            segment.push_hit(id);
        }
        outcome
    }

    /// Offers available hits in the empty layers between the segment's
    /// first and last layer to its fit, innermost first. Returns the hits
    /// added, all of them claimed.
    pub fn fill_gaps<F: IncrementalFit>(
        &self,
        arena: &HitArena,
        index: &mut HitIndex,
        segment: &mut Segment<F>,
    ) -> Vec<HitId> {
        let mut added = Vec::new();
        let occupied: BTreeSet<u32> = segment.hits.iter().map(|&id| arena.get(id).layer).collect();
        let (Some(&first), Some(&last), Some(fit)) =
            (occupied.first(), occupied.last(), segment.fit.as_mut())
        else {
            return added;
        };

        for layer in (first..=last).filter(|l| !occupied.contains(l)) {
            if let Some((id, dc)) = self.take_best(arena, index, fit, layer) {
                log::trace!("gap: layer {layer} took hit {} (dchi2 {dc:.2})", id.0);
                index.claim(id);
                added.push(id);
            }
        }

        for &id in &added {
            segment.push_hit(id);
        }
        added
    }

    /// Available hit of `layer` near the fit's crossing with the smallest
    /// chi-square increment, if the fit accepts it.
    fn take_best<F: IncrementalFit>(
        &self,
        arena: &HitArena,
        index: &HitIndex,
        fit: &mut F,
        layer: u32,
    ) -> Option<(HitId, f64)> {
        let crossing = fit.intersect_layer(DetectorLayer::Main(layer))?;
        let predicted_bin = self.geometry.bin_of(&crossing.point, self.config.n_bins);
        let cut_squared = self.config.distance_cut * self.config.distance_cut;
        let (id, dc) = index
            .layer(layer)
            .iter()
            .filter_map(|&id| {
                let hit = arena.get(id);
                if hit.bin.abs_diff(predicted_bin) > self.config.max_bin_distance
                    || hit.position.distance_squared(&crossing.point) >= cut_squared
                {
                    return None;
                }
                fit.delta_chi2(hit).map(|dc| (id, dc))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))?;
        (dc < self.config.max_delta_chi2
            && fit.add_hit(arena.get(id), self.config.max_delta_chi2).accepted)
            .then_some((id, dc))
    }
}
