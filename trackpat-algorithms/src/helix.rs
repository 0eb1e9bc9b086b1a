//! Reference helix fitter.
//!
//! Every change to the hit content refits from scratch: an algebraic circle
//! fit in the transverse plane (Bullock's method on mean-centred
//! coordinates, or the principal axis when the hits are collinear) followed
//! by a straight-line fit of z against the arc length.
//! Good enough to drive pattern recognition on clean tracks; not a
//! substitute for a Kalman filter with material effects.
#![allow(clippy::cast_precision_loss, clippy::many_single_char_names)]

use std::f64::consts::PI;
use std::sync::Arc;
use trackpat_core::{
    wrap_angle, AddHitOutcome, DetectorGeometry, DetectorLayer, Hit, IncrementalFit,
    LayerIntersection, Point3, TrackFitter, TrackState,
};

/// Single-hit measurement errors of the reference fitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HelixResolution {
    /// Transverse (r-phi) resolution (mm).
    pub rphi: f64,
    /// Longitudinal resolution (mm).
    pub z: f64,
}

impl Default for HelixResolution {
    fn default() -> Self {
        Self { rphi: 0.1, z: 0.5 }
    }
}

/// Radii of every surface the fitter can intersect.
#[derive(Debug)]
struct Surfaces {
    main: Vec<f64>,
    auxiliary: Vec<f64>,
}

impl Surfaces {
    fn radius(&self, layer: DetectorLayer) -> Option<f64> {
        match layer {
            DetectorLayer::Main(l) => self.main.get(l as usize).copied(),
            DetectorLayer::Auxiliary(l) => self.auxiliary.get(l as usize).copied(),
        }
    }
}

/// Fitter producing [`HelixFit`]s.
#[derive(Debug, Clone)]
pub struct HelixFitter {
    surfaces: Arc<Surfaces>,
    resolution: HelixResolution,
}

impl HelixFitter {
    /// Creates a fitter for the surfaces of `geometry`.
    #[must_use]
    pub fn new<G: DetectorGeometry + ?Sized>(geometry: &G) -> Self {
        let main = (0..geometry.n_layers())
            .map(|l| geometry.layer_radius(l).unwrap_or(f64::NAN))
            .collect();
        Self {
            surfaces: Arc::new(Surfaces {
                main,
                auxiliary: geometry.auxiliary_radii().to_vec(),
            }),
            resolution: HelixResolution::default(),
        }
    }

    /// Sets the measurement errors.
    #[must_use]
    pub fn with_resolution(mut self, resolution: HelixResolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Measurement errors in use.
    #[must_use]
    pub fn resolution(&self) -> HelixResolution {
        self.resolution
    }
}

impl TrackFitter for HelixFitter {
    type Fit = HelixFit;

    fn initialize(&self, hits: &[&Hit]) -> Option<HelixFit> {
        let points: Vec<Point3> = hits.iter().map(|h| h.position).collect();
        let params = Helix::fit(&points, self.resolution)?;
        Some(HelixFit {
            surfaces: Arc::clone(&self.surfaces),
            resolution: self.resolution,
            points,
            helix: params,
        })
    }

    fn name(&self) -> &'static str {
        "helix"
    }
}

/// Transverse projection of the trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Path {
    Circle {
        xc: f64,
        yc: f64,
        radius: f64,
        /// +1 if the track turns counter-clockwise moving outward, -1 otherwise.
        sense: f64,
        /// Angle around the centre of the innermost hit; arc length is zero there.
        theta0: f64,
    },
    /// Straight line through the projection of the innermost hit, `(ux, uy)`
    /// pointing outward.
    Line { x0: f64, y0: f64, ux: f64, uy: f64 },
}

impl Path {
    /// Signed arc length from the anchor. On a circle it lies in
    /// `[-pi/2, 3pi/2) * R`.
    fn arc_length(&self, p: &Point3) -> f64 {
        match *self {
            Self::Circle {
                xc,
                yc,
                radius,
                sense,
                theta0,
            } => {
                let turned = sense * ((p.y - yc).atan2(p.x - xc) - theta0);
                radius * ((turned + PI / 2.0).rem_euclid(2.0 * PI) - PI / 2.0)
            }
            Self::Line { x0, y0, ux, uy } => (p.x - x0) * ux + (p.y - y0) * uy,
        }
    }

    fn residual(&self, p: &Point3) -> f64 {
        match *self {
            Self::Circle { xc, yc, radius, .. } => (p.x - xc).hypot(p.y - yc) - radius,
            Self::Line { x0, y0, ux, uy } => (p.y - y0) * ux - (p.x - x0) * uy,
        }
    }

    /// Closest point to `(x, y)` and the unit direction of flight there.
    fn closest(&self, x: f64, y: f64) -> Option<((f64, f64), (f64, f64))> {
        match *self {
            Self::Circle {
                xc,
                yc,
                radius,
                sense,
                ..
            } => {
                let (dx, dy) = (x - xc, y - yc);
                let dist = dx.hypot(dy);
                if dist == 0.0 {
                    return None;
                }
                let (ux, uy) = (dx / dist, dy / dist);
                Some((
                    (xc + radius * ux, yc + radius * uy),
                    (-sense * uy, sense * ux),
                ))
            }
            Self::Line { x0, y0, ux, uy } => {
                let s = (x - x0) * ux + (y - y0) * uy;
                Some(((x0 + s * ux, y0 + s * uy), (ux, uy)))
            }
        }
    }

    fn omega(&self) -> f64 {
        match *self {
            Self::Circle { radius, sense, .. } => sense / radius,
            Self::Line { .. } => 0.0,
        }
    }

    /// Crossings with a cylinder of radius `r` around the z axis.
    fn crossings(&self, r: f64) -> Option<[(f64, f64); 2]> {
        match *self {
            Self::Circle {
                xc, yc, radius, ..
            } => {
                let d = xc.hypot(yc);
                if d == 0.0 || d > r + radius || d < (r - radius).abs() {
                    return None;
                }
                let a = (r * r - radius * radius + d * d) / (2.0 * d);
                let h = (r * r - a * a).max(0.0).sqrt();
                let (ex, ey) = (xc / d, yc / d);
                let (bx, by) = (a * ex, a * ey);
                Some([(bx - h * ey, by + h * ex), (bx + h * ey, by - h * ex)])
            }
            Self::Line { x0, y0, ux, uy } => {
                let b = x0 * ux + y0 * uy;
                let disc = b * b - (x0 * x0 + y0 * y0 - r * r);
                if disc < 0.0 {
                    return None;
                }
                let root = disc.sqrt();
                let at = |s: f64| (x0 + s * ux, y0 + s * uy);
                Some([at(-b + root), at(-b - root)])
            }
        }
    }
}

/// Fitted helix: transverse path plus linear z(s).
#[derive(Debug, Clone, Copy, PartialEq)]
struct Helix {
    path: Path,
    z_at_anchor: f64,
    tan_lambda: f64,
    chi2: f64,
}

impl Helix {
    const MIN_POINTS: usize = 3;

    fn fit(points: &[Point3], resolution: HelixResolution) -> Option<Self> {
        if points.len() < Self::MIN_POINTS {
            return None;
        }
        let n = points.len() as f64;
        let mx = points.iter().map(|p| p.x).sum::<f64>() / n;
        let my = points.iter().map(|p| p.y).sum::<f64>() / n;

        let (mut suu, mut suv, mut svv) = (0.0, 0.0, 0.0);
        let (mut suuu, mut svvv, mut suvv, mut svuu) = (0.0, 0.0, 0.0, 0.0);
        for p in points {
            let u = p.x - mx;
            let v = p.y - my;
            suu += u * u;
            suv += u * v;
            svv += v * v;
            suuu += u * u * u;
            svvv += v * v * v;
            suvv += u * v * v;
            svuu += v * u * u;
        }
        let spread = suu + svv;
        if spread <= 0.0 || spread.is_nan() {
            // coincident points
            return None;
        }

        let mut ordered: Vec<&Point3> = points.iter().collect();
        ordered.sort_by(|a, b| a.rho().total_cmp(&b.rho()));
        let (inner, outer) = (ordered[0], ordered[ordered.len() - 1]);

        let det = suu * svv - suv * suv;
        let path = if det.abs() <= 1e-12 * spread * spread {
            // collinear: principal axis of the points
            let angle = 0.5 * (2.0 * suv).atan2(suu - svv);
            let (mut uy, mut ux) = angle.sin_cos();
            if (outer.x - inner.x) * ux + (outer.y - inner.y) * uy < 0.0 {
                (ux, uy) = (-ux, -uy);
            }
            let s = (inner.x - mx) * ux + (inner.y - my) * uy;
            Path::Line {
                x0: mx + s * ux,
                y0: my + s * uy,
                ux,
                uy,
            }
        } else {
            let bu = 0.5 * (suuu + suvv);
            let bv = 0.5 * (svvv + svuu);
            let uc = (bu * svv - bv * suv) / det;
            let vc = (bv * suu - bu * suv) / det;
            let radius = (uc * uc + vc * vc + spread / n).sqrt();
            let (xc, yc) = (uc + mx, vc + my);

            let theta_of = |p: &Point3| (p.y - yc).atan2(p.x - xc);
            let turn: f64 = ordered
                .windows(2)
                .map(|w| wrap_angle(theta_of(w[1]) - theta_of(w[0])))
                .sum();
            Path::Circle {
                xc,
                yc,
                radius,
                sense: if turn < 0.0 { -1.0 } else { 1.0 },
                theta0: theta_of(inner),
            }
        };

        let mut helix = Self {
            path,
            z_at_anchor: 0.0,
            tan_lambda: 0.0,
            chi2: 0.0,
        };

        let s: Vec<f64> = points.iter().map(|p| path.arc_length(p)).collect();
        let ms = s.iter().sum::<f64>() / n;
        let mz = points.iter().map(|p| p.z).sum::<f64>() / n;
        let sss: f64 = s.iter().map(|si| (si - ms) * (si - ms)).sum();
        let ssz: f64 = s
            .iter()
            .zip(points)
            .map(|(si, p)| (si - ms) * (p.z - mz))
            .sum();
        helix.tan_lambda = if sss > 1e-12 { ssz / sss } else { 0.0 };
        helix.z_at_anchor = mz - helix.tan_lambda * ms;
        helix.chi2 = points.iter().map(|p| helix.hit_chi2(p, resolution)).sum();
        helix.chi2.is_finite().then_some(helix)
    }

    fn z_at(&self, p: &Point3) -> f64 {
        self.z_at_anchor + self.tan_lambda * self.path.arc_length(p)
    }

    fn hit_chi2(&self, p: &Point3, resolution: HelixResolution) -> f64 {
        let rphi = self.path.residual(p);
        let z = p.z - self.z_at(p);
        (rphi / resolution.rphi).powi(2) + (z / resolution.z).powi(2)
    }

    fn state_at(&self, reference: &Point3) -> Option<TrackState> {
        let ((px, py), (tx, ty)) = self.path.closest(reference.x, reference.y)?;
        let d0 = (px - reference.x) * -ty + (py - reference.y) * tx;
        Some(TrackState {
            d0,
            phi0: ty.atan2(tx),
            omega: self.path.omega(),
            z0: self.z_at(&Point3::new(px, py, 0.0)),
            tan_lambda: self.tan_lambda,
            reference: *reference,
        })
    }
}

/// A live helix fit.
#[derive(Debug, Clone)]
pub struct HelixFit {
    surfaces: Arc<Surfaces>,
    resolution: HelixResolution,
    points: Vec<Point3>,
    helix: Helix,
}

impl HelixFit {
    /// Signed curvature of the current fit, zero for a straight line.
    #[must_use]
    pub fn omega(&self) -> f64 {
        self.helix.path.omega()
    }

    /// Circle centre and radius of the current fit. `None` when the hits
    /// were fitted with a straight line.
    #[must_use]
    pub fn circle(&self) -> Option<(f64, f64, f64)> {
        match self.helix.path {
            Path::Circle { xc, yc, radius, .. } => Some((xc, yc, radius)),
            Path::Line { .. } => None,
        }
    }
}

impl IncrementalFit for HelixFit {
    fn delta_chi2(&self, hit: &Hit) -> Option<f64> {
        let chi2 = self.helix.hit_chi2(&hit.position, self.resolution);
        chi2.is_finite().then_some(chi2)
    }

    fn add_hit(&mut self, hit: &Hit, max_delta_chi2: f64) -> AddHitOutcome {
        let Some(delta_chi2) = self.delta_chi2(hit) else {
            return AddHitOutcome::rejected(f64::INFINITY);
        };
        if delta_chi2 >= max_delta_chi2 {
            return AddHitOutcome::rejected(delta_chi2);
        }
        self.points.push(hit.position);
        match Helix::fit(&self.points, self.resolution) {
            Some(helix) => {
                self.helix = helix;
                AddHitOutcome {
                    accepted: true,
                    delta_chi2,
                }
            }
            None => {
                self.points.pop();
                AddHitOutcome::rejected(delta_chi2)
            }
        }
    }

    fn smooth(&mut self) {
        if let Some(helix) = Helix::fit(&self.points, self.resolution) {
            self.helix = helix;
        }
    }

    fn propagate(&self, reference: &Point3) -> Option<TrackState> {
        self.helix.state_at(reference)
    }

    fn intersect_layer(&self, layer: DetectorLayer) -> Option<LayerIntersection> {
        let r = self.surfaces.radius(layer)?;
        if !r.is_finite() {
            return None;
        }
        let candidates = self.helix.path.crossings(r)?;
        let nearest = |(x, y): (f64, f64)| {
            self.points
                .iter()
                .map(|p| (p.x - x).hypot(p.y - y))
                .fold(f64::INFINITY, f64::min)
        };
        let (x, y) = if nearest(candidates[0]) <= nearest(candidates[1]) {
            candidates[0]
        } else {
            candidates[1]
        };
        let z = self.helix.z_at(&Point3::new(x, y, 0.0));
        Some(LayerIntersection {
            point: Point3::new(x, y, z),
            layer,
        })
    }

    fn chi2(&self) -> f64 {
        self.helix.chi2
    }

    fn ndf(&self) -> u32 {
        u32::try_from(2 * self.points.len())
            .unwrap_or(u32::MAX)
            .saturating_sub(5)
    }

    fn n_hits(&self) -> usize {
        self.points.len()
    }
}
