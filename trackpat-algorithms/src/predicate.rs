//! Merge conditions used with [`NearestNeighborClustering`].
//!
//! [`NearestNeighborClustering`]: crate::NearestNeighborClustering

use crate::nn::MergePredicate;
use trackpat_core::{
    wrap_angle, Hit, IncrementalFit, MergeResolution, Point3, SegmentId, TrackState,
};

/// Hit-to-hit condition: neighbouring layers, close in space, and optionally
/// pointing in a similar direction from the origin.
#[derive(Debug, Clone, Copy)]
pub struct HitDistance {
    cut_squared: f64,
    cos_alpha_cut: Option<f64>,
}

impl HitDistance {
    /// Creates the predicate with a distance cut in mm.
    #[must_use]
    pub fn new(distance_cut: f64, cos_alpha_cut: Option<f64>) -> Self {
        Self {
            cut_squared: distance_cut * distance_cut,
            cos_alpha_cut,
        }
    }
}

impl MergePredicate<Hit> for HitDistance {
    fn mergeable(&self, a: &Hit, b: &Hit) -> bool {
        // never merge within a layer, never skip a layer
        if a.layer.abs_diff(b.layer) != 1 {
            return false;
        }
        if a.position.distance_squared(&b.position) >= self.cut_squared {
            return false;
        }
        self.cos_alpha_cut
            .is_none_or(|cut| a.position.cos_angle(&b.position) > cut)
    }
}

/// What the segment-level predicates see of a fitted segment.
#[derive(Debug)]
pub struct SegmentView<'a, F> {
    /// Segment the view belongs to.
    pub id: SegmentId,
    /// Innermost hit position.
    pub inner: Point3,
    /// Outermost hit position.
    pub outer: Point3,
    /// Parameters at the nominal reference point.
    pub state: TrackState,
    /// The segment's live fit.
    pub fit: &'a F,
}

impl<F> SegmentView<'_, F> {
    /// Midpoint of the two closest segment ends of `self` and `other`.
    #[must_use]
    pub fn common_reference(&self, other: &Self) -> Point3 {
        let mut best = (f64::INFINITY, Point3::default());
        for a in [self.inner, self.outer] {
            for b in [other.inner, other.outer] {
                let d = a.distance_squared(&b);
                if d < best.0 {
                    best = (
                        d,
                        Point3::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0, (a.z + b.z) / 2.0),
                    );
                }
            }
        }
        best.1
    }
}

/// Chi-square of the parameter differences of two states at the same reference.
#[must_use]
pub fn parameter_chi2(a: &TrackState, b: &TrackState, resolution: &MergeResolution) -> f64 {
    let pull = |delta: f64, sigma: f64| (delta / sigma).powi(2);
    pull(a.omega - b.omega, resolution.omega)
        + pull(wrap_angle(a.phi0 - b.phi0), resolution.phi0)
        + pull(a.d0 - b.d0, resolution.d0)
        + pull(a.z0 - b.z0, resolution.z0)
        + pull(a.tan_lambda - b.tan_lambda, resolution.tan_lambda)
}

/// Condition for incomplete segments: both fits, propagated to a common
/// reference between them, agree within `max_chi2`.
#[derive(Debug, Clone)]
pub struct TrackParameterDistance {
    max_chi2: f64,
    resolution: MergeResolution,
}

impl TrackParameterDistance {
    /// Creates the predicate.
    #[must_use]
    pub fn new(max_chi2: f64, resolution: MergeResolution) -> Self {
        Self {
            max_chi2,
            resolution,
        }
    }

    /// Parameter chi-square of two segments, `None` if a propagation fails.
    pub fn chi2<F: IncrementalFit>(&self, a: &SegmentView<'_, F>, b: &SegmentView<'_, F>) -> Option<f64> {
        let reference = a.common_reference(b);
        let sa = a.fit.propagate(&reference)?;
        let sb = b.fit.propagate(&reference)?;
        Some(parameter_chi2(&sa, &sb, &self.resolution))
    }
}

impl<F: IncrementalFit> MergePredicate<SegmentView<'_, F>> for TrackParameterDistance {
    fn mergeable(&self, a: &SegmentView<'_, F>, b: &SegmentView<'_, F>) -> bool {
        self.chi2(a, b).is_some_and(|chi2| chi2 < self.max_chi2)
    }
}

/// Condition for curlers: circle centres close and radii similar.
#[derive(Debug, Clone, Copy)]
pub struct CircleCenterDistance {
    max_distance_squared: f64,
    radius_tolerance: f64,
}

impl CircleCenterDistance {
    /// Creates the predicate with a centre distance in mm and a relative radius tolerance.
    #[must_use]
    pub fn new(max_distance: f64, radius_tolerance: f64) -> Self {
        Self {
            max_distance_squared: max_distance * max_distance,
            radius_tolerance,
        }
    }

    /// Whether two circles given by state match.
    #[must_use]
    pub fn matches(&self, a: &TrackState, b: &TrackState) -> bool {
        let (r1, r2) = (a.radius(), b.radius());
        let dr = 2.0 * (r1 - r2).abs() / (r1 + r2);
        let (x1, y1) = a.center();
        let (x2, y2) = b.center();
        let dist = (x1 - x2).powi(2) + (y1 - y2).powi(2);
        dr < self.radius_tolerance && dist < self.max_distance_squared
    }
}

impl<F> MergePredicate<SegmentView<'_, F>> for CircleCenterDistance {
    fn mergeable(&self, a: &SegmentView<'_, F>, b: &SegmentView<'_, F>) -> bool {
        self.matches(&a.state, &b.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trackpat_core::Detector;

    fn hit(layer: u32, x: f64, y: f64, z: f64) -> Hit {
        Hit {
            position: Point3::new(x, y, z),
            layer,
            bin: 0,
            detector: Detector::Main,
            truth: None,
        }
    }

    #[test]
    fn test_hit_distance_layers() {
        let predicate = HitDistance::new(10.0, None);
        let a = hit(4, 100.0, 0.0, 0.0);
        assert!(predicate.mergeable(&a, &hit(5, 105.0, 0.0, 0.0)));
        assert!(predicate.mergeable(&a, &hit(3, 95.0, 0.0, 0.0)));
        assert!(!predicate.mergeable(&a, &hit(4, 101.0, 0.0, 0.0)));
        assert!(!predicate.mergeable(&a, &hit(6, 102.0, 0.0, 0.0)));
        assert!(!predicate.mergeable(&a, &hit(5, 100.0, 20.0, 0.0)));
    }

    #[test]
    fn test_hit_distance_angle() {
        let strict = HitDistance::new(100.0, Some(0.999));
        let loose = HitDistance::new(100.0, Some(0.9));
        let a = hit(0, 100.0, 0.0, 0.0);
        let b = hit(1, 105.0, 15.0, 0.0);
        assert!(!strict.mergeable(&a, &b));
        assert!(loose.mergeable(&a, &b));
    }

    #[test]
    fn test_circle_center_distance() {
        let predicate = CircleCenterDistance::new(30.0, 0.1);
        let base = TrackState {
            omega: 0.002,
            ..Default::default()
        };
        let close = TrackState {
            omega: 0.00205,
            d0: 3.0,
            ..Default::default()
        };
        let far = TrackState {
            omega: 0.002,
            d0: 80.0,
            ..Default::default()
        };
        let other_radius = TrackState {
            omega: 0.003,
            ..Default::default()
        };
        assert!(predicate.matches(&base, &close));
        assert!(!predicate.matches(&base, &far));
        assert!(!predicate.matches(&base, &other_radius));
    }

    #[test]
    fn test_parameter_chi2_wraps_phi() {
        let resolution = MergeResolution::default();
        let a = TrackState {
            phi0: std::f64::consts::PI - 0.01,
            ..Default::default()
        };
        let b = TrackState {
            phi0: -std::f64::consts::PI + 0.01,
            ..Default::default()
        };
        let chi2 = parameter_chi2(&a, &b, &resolution);
        assert!((chi2 - (0.02f64 / 0.05).powi(2)).abs() < 1e-9);
    }
}
