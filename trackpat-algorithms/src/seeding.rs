//! Seed-window scanning.
//!
//! Seeds are searched in windows of consecutive pad rows, outermost window
//! first, where occupancy is lowest. Accepted seeds are claimed from the
//! index immediately.
#![allow(clippy::cast_precision_loss)]

use crate::index::HitIndex;
use crate::nn::NearestNeighborClustering;
use crate::predicate::HitDistance;
use crate::quality::{remerge, ClusterFilter};
use trackpat_core::{Hit, HitArena, HitId, TrackingConfig};

/// Inclusive layer windows of `range` rows, outermost first, overlapping by half a window.
#[must_use]
pub fn windows(n_layers: u32, range: u32) -> Vec<(u32, u32)> {
    if n_layers == 0 || range == 0 {
        return Vec::new();
    }
    let range = range.min(n_layers);
    let step = (range / 2).max(1);
    let mut out = Vec::new();
    let mut hi = n_layers - 1;
    loop {
        let lo = (hi + 1).saturating_sub(range);
        out.push((lo, hi));
        if lo == 0 {
            break;
        }
        hi -= step;
    }
    out
}

/// Number of rows between the innermost and outermost hit, inclusive.
fn layer_span(arena: &HitArena, hits: &[HitId]) -> u32 {
    let layers = hits.iter().map(|&id| arena.get(id).layer);
    match (layers.clone().min(), layers.max()) {
        (Some(lo), Some(hi)) => hi - lo + 1,
        _ => 0,
    }
}

/// Result of scanning one window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowScan {
    /// Accepted seeds, already claimed from the index.
    pub seeds: Vec<Vec<HitId>>,
    /// Clusters rejected for duplicate rows.
    pub rejected_duplicate_rows: usize,
    /// Clusters split by multiplicity.
    pub split_clusters: usize,
    /// Window-spanning clusters that went through the repair reclustering.
    pub repaired: usize,
}

/// Finds seed clusters among the available hits of a window.
#[derive(Debug, Clone, Copy)]
pub struct SeedScanner<'a> {
    config: &'a TrackingConfig,
    filter: ClusterFilter<'a>,
}

impl<'a> SeedScanner<'a> {
    /// Creates a scanner for `config`.
    #[must_use]
    pub fn new(config: &'a TrackingConfig) -> Self {
        Self {
            config,
            filter: ClusterFilter::new(config),
        }
    }

    /// Clusters the available hits of `window` with distance cut `cut`,
    /// filters the clusters and claims the accepted seeds.
    pub fn scan_window(
        &self,
        arena: &HitArena,
        index: &mut HitIndex,
        window: (u32, u32),
        cut: f64,
    ) -> WindowScan {
        let mut scan = WindowScan::default();
        let min_size = self.config.min_cluster_size;
        let (lo, hi) = window;

        let ids = index.hits_in_range(lo, hi);
        if ids.len() < min_size {
            return scan;
        }
        let hits: Vec<Hit> = ids.iter().map(|&id| *arena.get(id)).collect();
        let predicate = HitDistance::new(cut, self.config.cos_alpha_cut);
        let mut clusters: Vec<Vec<HitId>> = NearestNeighborClustering::new(min_size)
            .cluster(&hits, |h| i64::from(h.layer), &predicate)
            .into_iter()
            .map(|members| members.into_iter().map(|i| ids[i]).collect())
            .collect();

        // clusters spanning the window may be fragments cut at its edges
        let width = f64::from(hi - lo + 1);
        let (spanning, mut kept): (Vec<_>, Vec<_>) = clusters.into_iter().partition(|c| {
            f64::from(layer_span(arena, c)) >= self.config.fragment_span_fraction * width
        });
        if !spanning.is_empty() {
            scan.repaired = spanning.len();
            let pool: Vec<HitId> = spanning.concat();
            let repair = HitDistance::new(
                cut * self.config.repair_cut_multiplier,
                self.config.cos_alpha_cut,
            );
            kept.extend(remerge(arena, &pool, &repair, min_size));
        }
        clusters = kept;

        for cluster in clusters {
            let outcome = self.filter.apply(arena, cluster, &predicate);
            scan.rejected_duplicate_rows += outcome.rejected_duplicate_rows;
            scan.split_clusters += usize::from(outcome.split);
            for seed in outcome.seeds {
                index.claim_all(&seed);
                scan.seeds.push(seed);
            }
        }

        log::trace!(
            "window {lo}..={hi} cut {cut:.1}: {} seeds, {} rejected, {} split",
            scan.seeds.len(),
            scan.rejected_duplicate_rows,
            scan.split_clusters
        );
        scan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trackpat_core::{CylindricalGeometry, Event, RawHit};

    #[test]
    fn test_windows_outer_first() {
        assert_eq!(windows(20, 8), vec![(12, 19), (8, 15), (4, 11), (0, 7)]);
        assert_eq!(windows(5, 12), vec![(0, 4)]);
        assert_eq!(windows(10, 3), vec![(7, 9), (6, 8), (5, 7), (4, 6), (3, 5), (2, 4), (1, 3), (0, 2)]);
        assert!(windows(0, 12).is_empty());
    }

    #[test]
    fn test_windows_cover_every_layer() {
        for n in 1..40 {
            for range in 2..14 {
                let ws = windows(n, range);
                for layer in 0..n {
                    assert!(ws.iter().any(|&(lo, hi)| (lo..=hi).contains(&layer)));
                }
            }
        }
    }

    fn radial_line(n: u32, y: f64) -> Vec<RawHit> {
        (0..n).map(|l| RawHit::new(105.0 + 10.0 * f64::from(l), y, 0.0)).collect()
    }

    #[test]
    fn test_scan_claims_seeds() {
        let geometry = CylindricalGeometry::new(20, 100.0, 300.0, 1000.0);
        let mut hits = radial_line(20, 0.0);
        hits.extend(radial_line(3, 150.0));
        let arena = HitArena::from_event(&Event::new(0, hits), &geometry, 10, 0.0).arena;
        let mut index = HitIndex::new(&arena, 20);
        let config = TrackingConfig::default();

        let scan = SeedScanner::new(&config).scan_window(&arena, &mut index, (8, 19), 20.0);
        assert_eq!(scan.seeds.len(), 1);
        assert_eq!(scan.seeds[0].len(), 12);
        assert_eq!(scan.repaired, 1);
        assert_eq!(index.len(), 11);
        assert!(scan.seeds[0].iter().all(|&id| !index.is_available(id)));
    }

    #[test]
    fn test_scan_leaves_small_clusters() {
        let geometry = CylindricalGeometry::new(20, 100.0, 300.0, 1000.0);
        let arena =
            HitArena::from_event(&Event::new(0, radial_line(4, 0.0)), &geometry, 10, 0.0).arena;
        let mut index = HitIndex::new(&arena, 20);
        let config = TrackingConfig::default();
        let scan = SeedScanner::new(&config).scan_window(&arena, &mut index, (0, 11), 40.0);
        assert!(scan.seeds.is_empty());
        assert_eq!(index.len(), 4);
    }
}
