//! Detector geometry lookup.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_lossless
)]

use crate::error::{Error, Result};
use crate::hit::Point3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Static facts about the tracking volume.
///
/// Layer indices grow with radius: layer 0 is the innermost pad row.
pub trait DetectorGeometry: Send + Sync {
    /// Number of pad rows.
    fn n_layers(&self) -> u32;

    /// Inner radius of the sensitive volume (mm).
    fn inner_radius(&self) -> f64;

    /// Outer radius of the sensitive volume (mm).
    fn outer_radius(&self) -> f64;

    /// Maximum drift length, i.e. half length in z (mm).
    fn max_drift_length(&self) -> f64;

    /// Pad row containing the given position, if any.
    fn layer_of(&self, position: &Point3) -> Option<u32>;

    /// Nominal radius of a pad row.
    fn layer_radius(&self, layer: u32) -> Option<f64>;

    /// Radii of the auxiliary layers, innermost first.
    fn auxiliary_radii(&self) -> &[f64] {
        &[]
    }

    /// Drift-length bin of a position; `n_bins` bins span `0..max_drift_length`.
    fn bin_of(&self, position: &Point3, n_bins: u32) -> u32 {
        if n_bins == 0 {
            return 0;
        }
        let frac = position.z.abs() / self.max_drift_length();
        ((frac * f64::from(n_bins)) as u32).min(n_bins - 1)
    }

    /// Checks that the description spans a non-empty volume.
    fn validate(&self) -> Result<()> {
        if self.n_layers() == 0 {
            return Err(Error::InvalidGeometry("no pad rows".into()));
        }
        let (inner, outer) = (self.inner_radius(), self.outer_radius());
        if !(inner >= 0.0 && outer > inner) {
            return Err(Error::InvalidGeometry(format!(
                "radial extent {inner}..{outer} is empty"
            )));
        }
        if self.max_drift_length() <= 0.0 {
            return Err(Error::InvalidGeometry(
                "max drift length must be positive".into(),
            ));
        }
        if self
            .auxiliary_radii()
            .iter()
            .any(|&r| r <= 0.0 || r >= inner)
        {
            return Err(Error::InvalidGeometry(
                "auxiliary layers must lie inside the inner radius".into(),
            ));
        }
        Ok(())
    }
}

/// Cylinder with equally spaced pad rows.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CylindricalGeometry {
    /// Number of pad rows.
    pub n_layers: u32,
    /// Inner radius (mm).
    pub inner_radius: f64,
    /// Outer radius (mm).
    pub outer_radius: f64,
    /// Half length in z (mm).
    pub max_drift_length: f64,
    /// Auxiliary layer radii, innermost first.
    #[cfg_attr(feature = "serde", serde(default))]
    pub auxiliary_radii: Vec<f64>,
}

impl Default for CylindricalGeometry {
    fn default() -> Self {
        // ILD-like large TPC
        Self {
            n_layers: 220,
            inner_radius: 329.0,
            outer_radius: 1808.0,
            max_drift_length: 2350.0,
            auxiliary_radii: Vec::new(),
        }
    }
}

impl CylindricalGeometry {
    /// Creates a geometry without auxiliary layers.
    #[must_use]
    pub fn new(n_layers: u32, inner_radius: f64, outer_radius: f64, max_drift_length: f64) -> Self {
        Self {
            n_layers,
            inner_radius,
            outer_radius,
            max_drift_length,
            auxiliary_radii: Vec::new(),
        }
    }

    /// Sets the auxiliary layer radii.
    #[must_use]
    pub fn with_auxiliary_radii(mut self, radii: Vec<f64>) -> Self {
        self.auxiliary_radii = radii;
        self
    }

    /// Radial pitch of a pad row.
    #[must_use]
    pub fn row_height(&self) -> f64 {
        (self.outer_radius - self.inner_radius) / f64::from(self.n_layers)
    }
}

impl DetectorGeometry for CylindricalGeometry {
    fn n_layers(&self) -> u32 {
        self.n_layers
    }

    fn inner_radius(&self) -> f64 {
        self.inner_radius
    }

    fn outer_radius(&self) -> f64 {
        self.outer_radius
    }

    fn max_drift_length(&self) -> f64 {
        self.max_drift_length
    }

    fn layer_of(&self, position: &Point3) -> Option<u32> {
        let rho = position.rho();
        if rho < self.inner_radius || rho >= self.outer_radius {
            return None;
        }
        let row = ((rho - self.inner_radius) / self.row_height()) as u32;
        Some(row.min(self.n_layers - 1))
    }

    fn layer_radius(&self, layer: u32) -> Option<f64> {
        (layer < self.n_layers)
            .then(|| self.inner_radius + (f64::from(layer) + 0.5) * self.row_height())
    }

    fn auxiliary_radii(&self) -> &[f64] {
        &self.auxiliary_radii
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_layer_lookup() {
        let geometry = CylindricalGeometry::new(100, 100.0, 200.0, 1000.0);
        assert_eq!(geometry.layer_of(&Point3::new(100.0, 0.0, 0.0)), Some(0));
        assert_eq!(geometry.layer_of(&Point3::new(0.0, 150.5, 0.0)), Some(50));
        assert_eq!(geometry.layer_of(&Point3::new(199.99, 0.0, 0.0)), Some(99));
        assert_eq!(geometry.layer_of(&Point3::new(99.0, 0.0, 0.0)), None);
        assert_eq!(geometry.layer_of(&Point3::new(200.0, 0.0, 0.0)), None);
    }

    #[test]
    fn test_layer_radius() {
        let geometry = CylindricalGeometry::new(100, 100.0, 200.0, 1000.0);
        assert_relative_eq!(geometry.layer_radius(0).unwrap(), 100.5);
        assert_relative_eq!(geometry.layer_radius(99).unwrap(), 199.5);
        assert!(geometry.layer_radius(100).is_none());
    }

    #[test]
    fn test_bin_lookup() {
        let geometry = CylindricalGeometry::new(10, 100.0, 200.0, 1000.0);
        assert_eq!(geometry.bin_of(&Point3::new(0.0, 0.0, 0.0), 100), 0);
        assert_eq!(geometry.bin_of(&Point3::new(0.0, 0.0, -505.0), 100), 50);
        assert_eq!(geometry.bin_of(&Point3::new(0.0, 0.0, 5000.0), 100), 99);
        assert_eq!(geometry.bin_of(&Point3::new(0.0, 0.0, 5000.0), 0), 0);
    }

    #[test]
    fn test_validate() {
        assert!(CylindricalGeometry::default().validate().is_ok());
        assert!(CylindricalGeometry::new(0, 1.0, 2.0, 1.0).validate().is_err());
        assert!(CylindricalGeometry::new(5, 2.0, 1.0, 1.0).validate().is_err());
        let bad_aux = CylindricalGeometry::new(5, 100.0, 200.0, 1.0).with_auxiliary_radii(vec![150.0]);
        assert!(bad_aux.validate().is_err());
    }
}
