//! Synthetic events for the integration tests.
#![allow(dead_code)]

use trackpat_core::{CylindricalGeometry, Point3, RawHit};

/// 20 pad rows between r = 100 and r = 300, rows 10 mm high.
pub fn geometry() -> CylindricalGeometry {
    CylindricalGeometry::new(20, 100.0, 300.0, 1000.0)
}

/// Centre radius of pad row `layer` in [`geometry`].
pub fn row_radius(layer: u32) -> f64 {
    105.0 + 10.0 * f64::from(layer)
}

/// Helix starting at the origin with azimuth `phi`, signed radius `radius`
/// (positive turns counter-clockwise) and slope `tan_lambda`.
#[derive(Debug, Clone, Copy)]
pub struct Helix {
    pub radius: f64,
    pub phi: f64,
    pub tan_lambda: f64,
}

impl Helix {
    pub fn new(radius: f64, phi: f64, tan_lambda: f64) -> Self {
        Self {
            radius,
            phi,
            tan_lambda,
        }
    }

    /// Point of the helix at transverse radius `rho` (first crossing).
    pub fn at_rho(&self, rho: f64) -> Point3 {
        let r = self.radius;
        let s = 2.0 * r * (rho / (2.0 * r)).asin();
        let (cx, cy) = (-r * self.phi.sin(), r * self.phi.cos());
        let a = self.phi + s / r;
        Point3::new(cx + r * a.sin(), cy - r * a.cos(), self.tan_lambda * s)
    }

    /// One hit per listed row, labelled with `truth`.
    pub fn hits(&self, layers: impl IntoIterator<Item = u32>, truth: u64) -> Vec<RawHit> {
        layers
            .into_iter()
            .map(|l| {
                let p = self.at_rho(row_radius(l));
                RawHit::new(p.x, p.y, p.z).with_truth(truth)
            })
            .collect()
    }
}

/// Small deterministic generator for noise hits.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Uniform in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }
}
