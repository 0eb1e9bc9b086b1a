//! Inward extension of finished tracks into the auxiliary layers.

use crate::segment::Segment;
use trackpat_core::{
    Detector, DetectorGeometry, DetectorLayer, HitArena, HitId, IncrementalFit, TrackingConfig,
};

/// Picks up auxiliary hits along a track's fitted trajectory.
#[derive(Debug, Clone, Copy)]
pub struct AuxiliaryPickup<'a, G: ?Sized> {
    config: &'a TrackingConfig,
    geometry: &'a G,
}

impl<'a, G: DetectorGeometry + ?Sized> AuxiliaryPickup<'a, G> {
    /// Creates the pickup pass.
    #[must_use]
    pub fn new(config: &'a TrackingConfig, geometry: &'a G) -> Self {
        Self { config, geometry }
    }

    /// Walks the auxiliary layers from the outermost inward and adds the
    /// nearest compatible hit of each. `used` marks arena hits already taken
    /// by another track. Returns the hits added.
    pub fn pick_up<F: IncrementalFit>(
        &self,
        arena: &HitArena,
        segment: &mut Segment<F>,
        used: &mut [bool],
    ) -> Vec<HitId> {
        let mut added = Vec::new();
        let Some(fit) = segment.fit.as_mut() else {
            return added;
        };
        let n_aux = u32::try_from(self.geometry.auxiliary_radii().len()).unwrap_or(u32::MAX);

        for layer in (0..n_aux).rev() {
            let Some(crossing) = fit.intersect_layer(DetectorLayer::Auxiliary(layer)) else {
                continue;
            };
            let nearest = arena
                .ids_of(Detector::Auxiliary)
                .filter(|id| !used.get(id.index()).copied().unwrap_or(true))
                .filter(|&id| arena.get(id).layer == layer)
                .map(|id| (id, arena.get(id).position.distance(&crossing.point)))
                .filter(|&(_, d)| d < self.config.distance_cut)
                .min_by(|a, b| a.1.total_cmp(&b.1));
            let Some((id, _)) = nearest else {
                continue;
            };
            if fit.add_hit(arena.get(id), self.config.max_delta_chi2).accepted {
                used[id.index()] = true;
                added.push(id);
            }
        }

        for &id in &added {
            segment.push_hit(id);
        }
        added
    }
}
