//! Geometric classification of fitted segments.
#![allow(clippy::cast_precision_loss)]

use crate::segment::Segment;
use trackpat_core::{DetectorGeometry, HitArena, IncrementalFit, Point3, SegmentFlags, TrackingConfig};

/// Derives [`SegmentFlags`] from a segment's hits and fit.
///
/// The flags depend only on the hit content and the fit, so classifying an
/// unchanged segment twice gives the same answer.
#[derive(Debug, Clone, Copy)]
pub struct SegmentClassifier<'a, G: ?Sized> {
    config: &'a TrackingConfig,
    geometry: &'a G,
}

impl<'a, G: DetectorGeometry + ?Sized> SegmentClassifier<'a, G> {
    /// Creates a classifier.
    #[must_use]
    pub fn new(config: &'a TrackingConfig, geometry: &'a G) -> Self {
        Self { config, geometry }
    }

    /// Flags for `segment`; `None` without hits or without a usable fit.
    pub fn classify<F: IncrementalFit>(
        &self,
        arena: &HitArena,
        segment: &Segment<F>,
    ) -> Option<SegmentFlags> {
        let (first, last) = segment.end_points(arena)?;
        let state = segment.fit.as_ref()?.propagate(&Point3::default())?;

        let zs = segment.hits.iter().map(|&id| arena.get(id).position.z);
        let z_min = zs.clone().fold(f64::INFINITY, f64::min);
        let z_max = zs.clone().fold(f64::NEG_INFINITY, f64::max);
        let z_avg = zs.sum::<f64>() / segment.len() as f64;

        Some(SegmentFlags {
            starts_inner: first.rho() - self.geometry.inner_radius() < self.config.starts_inner_dist,
            is_central: self.geometry.outer_radius() - last.rho()
                < self.config.ends_outer_central_dist,
            is_forward: self.geometry.max_drift_length() - last.z.abs()
                < self.config.ends_outer_forward_dist,
            is_curler: state.omega.abs() > self.config.curler_omega,
            z_min,
            z_max,
            z_avg,
        })
    }
}
