//! Contract with the incremental trajectory fitter.
//!
//! The track finder never looks inside a fit. It initializes one per
//! segment, feeds it hits, and asks it for predictions. A fit object is an
//! owned value: dropping it releases whatever the fitter allocated, so a
//! segment that is finalized or discarded returns its resources on every
//! path.

use crate::hit::{Hit, Point3};
use std::f64::consts::PI;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Helix parameters relative to a reference point.
///
/// The point of closest approach to `reference` is
/// `reference + d0 * (-sin phi0, cos phi0)`; the direction of flight there is
/// `(cos phi0, sin phi0)`; positive `omega` turns counter-clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackState {
    /// Signed transverse impact parameter (mm).
    pub d0: f64,
    /// Azimuth of the direction at closest approach (rad).
    pub phi0: f64,
    /// Signed curvature (1/mm).
    pub omega: f64,
    /// z at closest approach (mm).
    pub z0: f64,
    /// Slope dz/ds.
    pub tan_lambda: f64,
    /// Reference point the parameters refer to.
    pub reference: Point3,
}

impl TrackState {
    /// Transverse radius of curvature.
    #[must_use]
    pub fn radius(&self) -> f64 {
        1.0 / self.omega.abs()
    }

    /// Centre of the transverse circle.
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        let (sin, cos) = self.phi0.sin_cos();
        let scale = self.d0 + 1.0 / self.omega;
        (self.reference.x - scale * sin, self.reference.y + scale * cos)
    }

    /// Point of closest approach to the reference point.
    #[must_use]
    pub fn closest_approach(&self) -> Point3 {
        let (sin, cos) = self.phi0.sin_cos();
        Point3::new(
            self.reference.x - self.d0 * sin,
            self.reference.y + self.d0 * cos,
            self.z0,
        )
    }
}

/// Wraps an angle difference into `(-pi, pi]`.
#[must_use]
pub fn wrap_angle(mut angle: f64) -> f64 {
    while angle > PI {
        angle -= 2.0 * PI;
    }
    while angle <= -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// A named detection surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DetectorLayer {
    /// Pad row of the main tracker.
    Main(u32),
    /// Auxiliary layer, 0 = innermost.
    Auxiliary(u32),
}

/// Crossing of a trajectory with a detection surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerIntersection {
    /// Crossing point.
    pub point: Point3,
    /// Surface that was crossed.
    pub layer: DetectorLayer,
}

/// Result of offering a hit to a fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AddHitOutcome {
    /// Whether the hit became part of the fit.
    pub accepted: bool,
    /// Chi-square increment the hit would cause (or caused).
    pub delta_chi2: f64,
}

impl AddHitOutcome {
    /// A rejected hit with the given cost.
    #[must_use]
    pub fn rejected(delta_chi2: f64) -> Self {
        Self {
            accepted: false,
            delta_chi2,
        }
    }
}

/// A live fit of one segment.
pub trait IncrementalFit {
    /// Chi-square increment `hit` would cause, without adding it.
    fn delta_chi2(&self, hit: &Hit) -> Option<f64>;

    /// Adds `hit` if its chi-square increment is below `max_delta_chi2`.
    fn add_hit(&mut self, hit: &Hit, max_delta_chi2: f64) -> AddHitOutcome;

    /// Finalizes the fit after all hits were added.
    fn smooth(&mut self);

    /// Track parameters with respect to `reference`.
    fn propagate(&self, reference: &Point3) -> Option<TrackState>;

    /// Crossing of the trajectory with `layer`, nearest to the hits already fitted.
    fn intersect_layer(&self, layer: DetectorLayer) -> Option<LayerIntersection>;

    /// Total chi-square.
    fn chi2(&self) -> f64;

    /// Degrees of freedom.
    fn ndf(&self) -> u32;

    /// Number of hits in the fit.
    fn n_hits(&self) -> usize;

    /// Chi-square per degree of freedom; infinite without degrees of freedom.
    fn chi2_per_ndf(&self) -> f64 {
        match self.ndf() {
            0 => f64::INFINITY,
            ndf => self.chi2() / f64::from(ndf),
        }
    }
}

/// Factory for fits.
pub trait TrackFitter: Send + Sync {
    /// Fit object produced by this fitter.
    type Fit: IncrementalFit;

    /// Fits `hits`; `None` when the geometry is degenerate or there are too few hits.
    fn initialize(&self, hits: &[&Hit]) -> Option<Self::Fit>;

    /// Name of the fitter, for logs.
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_center_counter_clockwise() {
        // circle of radius 100 around (0, 100), passing through the origin heading +x
        let state = TrackState {
            d0: 0.0,
            phi0: 0.0,
            omega: 0.01,
            z0: 0.0,
            tan_lambda: 0.0,
            reference: Point3::default(),
        };
        let (cx, cy) = state.center();
        assert_relative_eq!(cx, 0.0, epsilon = 1e-9);
        assert_relative_eq!(cy, 100.0, epsilon = 1e-9);
        assert_relative_eq!(state.radius(), 100.0);
    }

    #[test]
    fn test_center_clockwise_with_offset() {
        let state = TrackState {
            d0: 5.0,
            phi0: 0.0,
            omega: -0.01,
            z0: 0.0,
            tan_lambda: 0.0,
            reference: Point3::default(),
        };
        let pca = state.closest_approach();
        assert_relative_eq!(pca.y, 5.0);
        let (_, cy) = state.center();
        assert_relative_eq!(cy, -95.0, epsilon = 1e-9);
    }

    #[test]
    fn test_wrap_angle() {
        assert_relative_eq!(wrap_angle(3.0 * PI / 2.0), -PI / 2.0);
        assert_relative_eq!(wrap_angle(-3.0 * PI / 2.0), PI / 2.0);
        assert_relative_eq!(wrap_angle(0.25), 0.25);
    }
}
