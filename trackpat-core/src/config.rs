//! Track finding configuration.
//!
//! Numeric defaults are tuned for a large TPC with ~200 pad rows and a
//! 3.5 T field. They are starting points, not invariants.

use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Highest hit multiplicity per layer handled by the splitter.
pub const MAX_SPLIT_MULTIPLICITY: usize = 5;

/// Parameter resolutions used to normalise segment-to-segment differences.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MergeResolution {
    /// Curvature resolution (1/mm).
    pub omega: f64,
    /// Azimuth resolution (rad).
    pub phi0: f64,
    /// Transverse impact parameter resolution (mm).
    pub d0: f64,
    /// Longitudinal impact parameter resolution (mm).
    pub z0: f64,
    /// Dip slope resolution.
    pub tan_lambda: f64,
}

impl Default for MergeResolution {
    fn default() -> Self {
        Self {
            omega: 1.0e-4,
            phi0: 0.05,
            d0: 5.0,
            z0: 20.0,
            tan_lambda: 0.05,
        }
    }
}

/// Configuration for the track finder.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TrackingConfig {
    /// Nominal hit-to-hit distance cut (mm).
    pub distance_cut: f64,
    /// Minimum cosine between hit position vectors; `None` disables the check.
    pub cos_alpha_cut: Option<f64>,
    /// Number of seeding passes; pass `p` uses `distance_cut * p / seed_passes`.
    pub seed_passes: u32,
    /// Minimum number of hits for a seed cluster.
    pub min_cluster_size: usize,
    /// Maximum fraction of occupied layers holding more than one hit.
    pub duplicate_row_fraction: f64,
    /// Width of the seeding window in pad rows.
    pub seed_row_range: u32,
    /// Number of drift-length bins.
    pub n_bins: u32,
    /// Minimum fraction of occupied layers with exactly `k` hits, indexed by `k - 2`.
    pub min_layer_fraction: [f64; MAX_SPLIT_MULTIPLICITY - 1],
    /// Minimum number of layers with exactly `k` hits, indexed by `k - 2`.
    pub min_layer_count: [usize; MAX_SPLIT_MULTIPLICITY - 1],
    /// Maximum chi-square increment for adding a hit.
    pub max_delta_chi2: f64,
    /// Maximum parameter chi-square (and refit chi2/ndf) for merging segments.
    pub max_merge_chi2: f64,
    /// Consecutive layers without an accepted hit before extension stops.
    pub max_step_without_hit: u32,
    /// Maximum drift-bin difference between a candidate and the prediction.
    pub max_bin_distance: u32,
    /// A segment starts inner if its first hit is this close to the inner radius (mm).
    pub starts_inner_dist: f64,
    /// A segment is central if its last hit is this close to the outer radius (mm).
    pub ends_outer_central_dist: f64,
    /// A segment is forward if its last hit is this close to the end plate (mm).
    pub ends_outer_forward_dist: f64,
    /// Curvature above which a segment is a curler (1/mm).
    pub curler_omega: f64,
    /// Maximum circle-centre distance for merging curlers (mm).
    pub curler_center_dist: f64,
    /// Maximum relative radius difference for merging curlers.
    pub curler_radius_tolerance: f64,
    /// Clusters spanning this fraction of a window are reclustered.
    pub fragment_span_fraction: f64,
    /// Distance cut multiplier used when reclustering fragments.
    pub repair_cut_multiplier: f64,
    /// Hits with a transverse radius below this are ignored (mm).
    pub r_min_cut: f64,
    /// Resolutions for the segment parameter distance.
    pub merge_resolution: MergeResolution,
    /// Extend final tracks into the auxiliary layers.
    pub pick_up_auxiliary_hits: bool,
    /// Tracks below this truth purity are reported by diagnostics.
    pub min_truth_purity: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            distance_cut: 40.0,
            cos_alpha_cut: Some(0.9),
            seed_passes: 4,
            min_cluster_size: 6,
            duplicate_row_fraction: 0.1,
            seed_row_range: 12,
            n_bins: 150,
            min_layer_fraction: [0.6; MAX_SPLIT_MULTIPLICITY - 1],
            min_layer_count: [5; MAX_SPLIT_MULTIPLICITY - 1],
            max_delta_chi2: 35.0,
            max_merge_chi2: 100.0,
            max_step_without_hit: 3,
            max_bin_distance: 1,
            starts_inner_dist: 25.0,
            ends_outer_central_dist: 25.0,
            ends_outer_forward_dist: 40.0,
            curler_omega: 0.001,
            curler_center_dist: 30.0,
            curler_radius_tolerance: 0.1,
            fragment_span_fraction: 0.8,
            repair_cut_multiplier: 1.5,
            r_min_cut: 0.0,
            merge_resolution: MergeResolution::default(),
            pick_up_auxiliary_hits: false,
            min_truth_purity: 0.99,
        }
    }
}

impl TrackingConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the distance cut.
    #[must_use]
    pub fn with_distance_cut(mut self, cut: f64) -> Self {
        self.distance_cut = cut;
        self
    }

    /// Sets or disables the angular cut.
    #[must_use]
    pub fn with_cos_alpha_cut(mut self, cut: Option<f64>) -> Self {
        self.cos_alpha_cut = cut;
        self
    }

    /// Sets the number of seeding passes.
    #[must_use]
    pub fn with_seed_passes(mut self, passes: u32) -> Self {
        self.seed_passes = passes;
        self
    }

    /// Sets the minimum cluster size.
    #[must_use]
    pub fn with_min_cluster_size(mut self, size: usize) -> Self {
        self.min_cluster_size = size;
        self
    }

    /// Sets the allowed duplicate-row fraction.
    #[must_use]
    pub fn with_duplicate_row_fraction(mut self, fraction: f64) -> Self {
        self.duplicate_row_fraction = fraction;
        self
    }

    /// Sets the seeding window width.
    #[must_use]
    pub fn with_seed_row_range(mut self, rows: u32) -> Self {
        self.seed_row_range = rows;
        self
    }

    /// Sets the number of drift bins.
    #[must_use]
    pub fn with_n_bins(mut self, n_bins: u32) -> Self {
        self.n_bins = n_bins;
        self
    }

    /// Sets the splitting thresholds for multiplicity `k` (2..=5).
    #[must_use]
    pub fn with_multiplicity_threshold(mut self, k: usize, fraction: f64, count: usize) -> Self {
        if (2..=MAX_SPLIT_MULTIPLICITY).contains(&k) {
            self.min_layer_fraction[k - 2] = fraction;
            self.min_layer_count[k - 2] = count;
        }
        self
    }

    /// Sets the maximum chi-square increment per hit.
    #[must_use]
    pub fn with_max_delta_chi2(mut self, chi2: f64) -> Self {
        self.max_delta_chi2 = chi2;
        self
    }

    /// Sets the merge chi-square cut.
    #[must_use]
    pub fn with_max_merge_chi2(mut self, chi2: f64) -> Self {
        self.max_merge_chi2 = chi2;
        self
    }

    /// Sets the number of tolerated consecutive misses.
    #[must_use]
    pub fn with_max_step_without_hit(mut self, steps: u32) -> Self {
        self.max_step_without_hit = steps;
        self
    }

    /// Sets the curler curvature threshold.
    #[must_use]
    pub fn with_curler_omega(mut self, omega: f64) -> Self {
        self.curler_omega = omega;
        self
    }

    /// Sets the minimum transverse radius of accepted hits.
    #[must_use]
    pub fn with_r_min_cut(mut self, r: f64) -> Self {
        self.r_min_cut = r;
        self
    }

    /// Enables or disables the auxiliary-hit pickup.
    #[must_use]
    pub fn with_auxiliary_pickup(mut self, enabled: bool) -> Self {
        self.pick_up_auxiliary_hits = enabled;
        self
    }

    /// Distance cut used in seeding pass `pass` (1-based).
    #[must_use]
    pub fn distance_cut_for_pass(&self, pass: u32) -> f64 {
        self.distance_cut * f64::from(pass) / f64::from(self.seed_passes.max(1))
    }

    /// Splitting thresholds `(fraction, count)` for multiplicity `k`.
    #[must_use]
    pub fn multiplicity_threshold(&self, k: usize) -> Option<(f64, usize)> {
        (2..=MAX_SPLIT_MULTIPLICITY)
            .contains(&k)
            .then(|| (self.min_layer_fraction[k - 2], self.min_layer_count[k - 2]))
    }

    /// Checks that all values are in range.
    pub fn validate(&self) -> Result<()> {
        fn positive(name: &str, value: f64) -> Result<()> {
            if value > 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(Error::ConfigError(format!("{name} must be positive, got {value}")))
            }
        }

        positive("distance_cut", self.distance_cut)?;
        positive("max_delta_chi2", self.max_delta_chi2)?;
        positive("max_merge_chi2", self.max_merge_chi2)?;
        positive("curler_omega", self.curler_omega)?;
        positive("repair_cut_multiplier", self.repair_cut_multiplier)?;
        positive("merge_resolution.omega", self.merge_resolution.omega)?;
        positive("merge_resolution.phi0", self.merge_resolution.phi0)?;
        positive("merge_resolution.d0", self.merge_resolution.d0)?;
        positive("merge_resolution.z0", self.merge_resolution.z0)?;
        positive("merge_resolution.tan_lambda", self.merge_resolution.tan_lambda)?;

        if let Some(cut) = self.cos_alpha_cut {
            if !(-1.0..=1.0).contains(&cut) {
                return Err(Error::ConfigError(format!(
                    "cos_alpha_cut must be in [-1, 1], got {cut}"
                )));
            }
        }
        if self.seed_passes == 0 {
            return Err(Error::ConfigError("seed_passes must be at least 1".into()));
        }
        if self.min_cluster_size < 2 {
            return Err(Error::ConfigError(
                "min_cluster_size must be at least 2".into(),
            ));
        }
        if self.seed_row_range < 2 {
            return Err(Error::ConfigError(
                "seed_row_range must be at least 2".into(),
            ));
        }
        if self.n_bins == 0 {
            return Err(Error::ConfigError("n_bins must be at least 1".into()));
        }
        for fraction in [
            self.duplicate_row_fraction,
            self.fragment_span_fraction,
            self.min_truth_purity,
        ]
        .into_iter()
        .chain(self.min_layer_fraction)
        {
            if !(0.0..=1.0).contains(&fraction) {
                return Err(Error::ConfigError(format!(
                    "fraction {fraction} outside [0, 1]"
                )));
            }
        }
        Ok(())
    }
}
