//! Seed cluster quality filters.
//!
//! A candidate cluster is first checked for a dominant hit multiplicity per
//! layer; such clusters are split into that many sub-tracks. Anything else
//! with too many multiply-occupied layers is rejected and its hits stay
//! available. Undersized pieces are pooled and clustered once more.
#![allow(clippy::cast_precision_loss)]

use crate::nn::{MergePredicate, NearestNeighborClustering};
use std::collections::BTreeMap;
use trackpat_core::{Hit, HitArena, HitId, TrackingConfig, MAX_SPLIT_MULTIPLICITY};

/// Hits of a cluster grouped by layer, innermost layer first.
fn by_layer(arena: &HitArena, hits: &[HitId]) -> BTreeMap<u32, Vec<HitId>> {
    let mut layers: BTreeMap<u32, Vec<HitId>> = BTreeMap::new();
    for &id in hits {
        layers.entry(arena.get(id).layer).or_default().push(id);
    }
    layers
}

/// Fraction of occupied layers holding more than one hit.
#[must_use]
pub fn duplicate_row_fraction(arena: &HitArena, hits: &[HitId]) -> f64 {
    let layers = by_layer(arena, hits);
    if layers.is_empty() {
        return 0.0;
    }
    let duplicated = layers.values().filter(|ids| ids.len() > 1).count();
    duplicated as f64 / layers.len() as f64
}

/// Rejects clusters with too many multiply-occupied layers.
#[derive(Debug, Clone, Copy)]
pub struct DuplicateRows {
    max_fraction: f64,
}

impl DuplicateRows {
    /// Creates the filter with the allowed fraction.
    #[must_use]
    pub fn new(max_fraction: f64) -> Self {
        Self { max_fraction }
    }

    /// Whether the cluster must be rejected.
    #[must_use]
    pub fn is_rejected(&self, arena: &HitArena, hits: &[HitId]) -> bool {
        duplicate_row_fraction(arena, hits) > self.max_fraction
    }
}

/// A cluster split into `k` sub-tracks.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiplicitySplit {
    /// Multiplicity the split was made for.
    pub k: usize,
    /// One hit list per sub-track.
    pub tracks: Vec<Vec<HitId>>,
    /// Hits in layers of any other multiplicity.
    pub leftover: Vec<HitId>,
}

/// All orderings of `0..k`.
fn permutations(k: usize) -> Vec<Vec<usize>> {
    fn extend(prefix: &mut Vec<usize>, used: &mut [bool], out: &mut Vec<Vec<usize>>) {
        if prefix.len() == used.len() {
            out.push(prefix.clone());
            return;
        }
        for i in 0..used.len() {
            if !used[i] {
                used[i] = true;
                prefix.push(i);
                extend(prefix, used, out);
                prefix.pop();
                used[i] = false;
            }
        }
    }
    let mut out = Vec::new();
    extend(&mut Vec::with_capacity(k), &mut vec![false; k], &mut out);
    out
}

/// Splits a cluster if one multiplicity `k` in `2..=5` dominates its layers.
///
/// When several multiplicities qualify the one with the most layers wins.
/// Layers with exactly `k` hits are walked from outer to inner; hits are
/// handed to the sub-tracks by the assignment with the smallest total
/// distance to each sub-track's previous hit.
#[must_use]
pub fn split_multiplicity(
    arena: &HitArena,
    hits: &[HitId],
    config: &TrackingConfig,
) -> Option<MultiplicitySplit> {
    let layers = by_layer(arena, hits);
    let occupied = layers.len();
    if occupied == 0 {
        return None;
    }

    let mut best: Option<(usize, usize)> = None;
    for k in 2..=MAX_SPLIT_MULTIPLICITY {
        let (fraction, min_count) = config.multiplicity_threshold(k)?;
        let count = layers.values().filter(|ids| ids.len() == k).count();
        if count as f64 / occupied as f64 >= fraction
            && count >= min_count.max(1)
            && best.is_none_or(|(_, c)| count > c)
        {
            best = Some((k, count));
        }
    }
    let (k, _) = best?;

    let orders = permutations(k);
    let mut tracks: Vec<Vec<HitId>> = vec![Vec::new(); k];
    let mut leftover = Vec::new();
    for ids in layers.values().rev() {
        if ids.len() != k {
            leftover.extend_from_slice(ids);
            continue;
        }
        if tracks[0].is_empty() {
            for (track, &id) in tracks.iter_mut().zip(ids) {
                track.push(id);
            }
            continue;
        }
        let cost = |order: &Vec<usize>| -> f64 {
            order
                .iter()
                .enumerate()
                .map(|(t, &h)| {
                    let prev = tracks[t].last().map_or_else(Default::default, |&p| arena.get(p).position);
                    prev.distance(&arena.get(ids[h]).position)
                })
                .sum()
        };
        let Some(order) = orders.iter().min_by(|a, b| cost(a).total_cmp(&cost(b))) else {
            continue;
        };
        for (t, &h) in order.iter().enumerate() {
            tracks[t].push(ids[h]);
        }
    }

    Some(MultiplicitySplit {
        k,
        tracks,
        leftover,
    })
}

/// What the filters made of one candidate cluster.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOutcome {
    /// Clusters accepted as seeds.
    pub seeds: Vec<Vec<HitId>>,
    /// Hits that stay available.
    pub released: Vec<HitId>,
    /// Clusters rejected for duplicate rows.
    pub rejected_duplicate_rows: usize,
    /// Whether the cluster was split by multiplicity.
    pub split: bool,
}

/// Applies the split, duplicate-row and remerge filters to seed candidates.
#[derive(Debug, Clone, Copy)]
pub struct ClusterFilter<'a> {
    config: &'a TrackingConfig,
    duplicates: DuplicateRows,
}

impl<'a> ClusterFilter<'a> {
    /// Creates the filter chain for `config`.
    #[must_use]
    pub fn new(config: &'a TrackingConfig) -> Self {
        Self {
            config,
            duplicates: DuplicateRows::new(config.duplicate_row_fraction),
        }
    }

    /// Runs the filters on one cluster. `predicate` is used to recluster
    /// undersized pieces.
    pub fn apply<P>(&self, arena: &HitArena, cluster: Vec<HitId>, predicate: &P) -> FilterOutcome
    where
        P: MergePredicate<Hit> + ?Sized,
    {
        let mut outcome = FilterOutcome::default();

        let Some(split) = split_multiplicity(arena, &cluster, self.config) else {
            if self.duplicates.is_rejected(arena, &cluster) {
                log::trace!("rejected cluster of {} hits for duplicate rows", cluster.len());
                outcome.rejected_duplicate_rows += 1;
                outcome.released = cluster;
            } else {
                outcome.seeds.push(cluster);
            }
            return outcome;
        };

        log::trace!(
            "split cluster of {} hits into {} sub-tracks",
            cluster.len(),
            split.k
        );
        outcome.split = true;
        let mut pool = split.leftover;
        for track in split.tracks {
            if track.len() < self.config.min_cluster_size {
                pool.extend(track);
            } else {
                self.accept_or_release(arena, track, &mut outcome);
            }
        }

        for piece in remerge(arena, &pool, predicate, self.config.min_cluster_size) {
            self.accept_or_release(arena, piece, &mut outcome);
        }

        let mut claimed: Vec<HitId> = outcome.seeds.iter().flatten().copied().collect();
        claimed.sort_unstable();
        outcome.released = cluster
            .into_iter()
            .filter(|id| claimed.binary_search(id).is_err())
            .collect();
        outcome
    }

    fn accept_or_release(&self, arena: &HitArena, hits: Vec<HitId>, outcome: &mut FilterOutcome) {
        if self.duplicates.is_rejected(arena, &hits) {
            outcome.rejected_duplicate_rows += 1;
        } else {
            outcome.seeds.push(hits);
        }
    }
}

/// Clusters a pool of loose hits with `predicate`, keeping clusters of at
/// least `min_size` hits.
pub fn remerge<P>(arena: &HitArena, pool: &[HitId], predicate: &P, min_size: usize) -> Vec<Vec<HitId>>
where
    P: MergePredicate<Hit> + ?Sized,
{
    if pool.len() < min_size {
        return Vec::new();
    }
    let hits: Vec<Hit> = pool.iter().map(|&id| *arena.get(id)).collect();
    NearestNeighborClustering::new(min_size)
        .cluster(&hits, |h| i64::from(h.layer), predicate)
        .into_iter()
        .map(|members| members.into_iter().map(|i| pool[i]).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::HitDistance;
    use trackpat_core::{CylindricalGeometry, Event, RawHit};

    fn geometry() -> CylindricalGeometry {
        CylindricalGeometry::new(20, 100.0, 300.0, 1000.0)
    }

    /// Hits at layer centres along the x axis, `offsets` adding extra hits in y.
    fn arena(layers: &[(u32, &[f64])]) -> (HitArena, Vec<HitId>) {
        let mut hits = Vec::new();
        for &(layer, ys) in layers {
            let r = 105.0 + 10.0 * f64::from(layer);
            for &y in ys {
                hits.push(RawHit::new(r, y, 0.0));
            }
        }
        let arena = HitArena::from_event(&Event::new(0, hits), &geometry(), 10, 0.0).arena;
        let ids = arena.iter().map(|(id, _)| id).collect();
        (arena, ids)
    }

    #[test]
    fn test_duplicate_fraction() {
        let (arena, ids) = arena(&[(0, &[0.0]), (1, &[0.0, 20.0]), (2, &[0.0]), (3, &[0.0])]);
        assert!((duplicate_row_fraction(&arena, &ids) - 0.25).abs() < 1e-12);
        assert!(DuplicateRows::new(0.1).is_rejected(&arena, &ids));
        assert!(!DuplicateRows::new(0.3).is_rejected(&arena, &ids));
        assert!((duplicate_row_fraction(&arena, &[]) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_permutations() {
        assert_eq!(permutations(1), vec![vec![0]]);
        assert_eq!(permutations(3).len(), 6);
        assert_eq!(permutations(5).len(), 120);
    }

    #[test]
    fn test_split_two_tracks() {
        let layers: Vec<(u32, &[f64])> = (0..8).map(|l| (l, &[0.0, 30.0][..])).collect();
        let (arena, ids) = arena(&layers);
        let split = split_multiplicity(&arena, &ids, &TrackingConfig::default()).unwrap();
        assert_eq!(split.k, 2);
        assert!(split.leftover.is_empty());
        for track in &split.tracks {
            assert_eq!(track.len(), 8);
            let y0 = arena.get(track[0]).position.y;
            assert!(track.iter().all(|&id| (arena.get(id).position.y - y0).abs() < 1e-9));
        }
    }

    #[test]
    fn test_split_requires_fraction_and_count() {
        let mut layers: Vec<(u32, &[f64])> = (0..4).map(|l| (l, &[0.0, 30.0][..])).collect();
        layers.extend((4..8).map(|l| (l, &[0.0][..])));
        let (arena, ids) = arena(&layers);
        assert!(split_multiplicity(&arena, &ids, &TrackingConfig::default()).is_none());

        let config = TrackingConfig::default().with_multiplicity_threshold(2, 0.5, 4);
        let split = split_multiplicity(&arena, &ids, &config).unwrap();
        assert_eq!(split.leftover.len(), 4);
    }

    #[test]
    fn test_filter_rejects_half_duplicated() {
        let layers: Vec<(u32, &[f64])> = (0..10)
            .map(|l| if l % 2 == 0 { (l, &[0.0, 8.0][..]) } else { (l, &[0.0][..]) })
            .collect();
        let (arena, ids) = arena(&layers);
        let config = TrackingConfig::default();
        let predicate = HitDistance::new(40.0, None);
        let outcome = ClusterFilter::new(&config).apply(&arena, ids.clone(), &predicate);
        assert!(outcome.seeds.is_empty());
        assert_eq!(outcome.rejected_duplicate_rows, 1);
        assert_eq!(outcome.released.len(), ids.len());
    }

    #[test]
    fn test_filter_splits_and_releases_rest() {
        let mut layers: Vec<(u32, &[f64])> = (0..8).map(|l| (l, &[0.0, 30.0][..])).collect();
        layers.push((8, &[0.0][..]));
        let (arena, ids) = arena(&layers);
        let config = TrackingConfig::default();
        let predicate = HitDistance::new(15.0, None);
        let outcome = ClusterFilter::new(&config).apply(&arena, ids, &predicate);
        assert!(outcome.split);
        assert_eq!(outcome.seeds.len(), 2);
        assert_eq!(outcome.released.len(), 1);
    }

    #[test]
    fn test_remerge_min_size() {
        let layers: Vec<(u32, &[f64])> = (0..5).map(|l| (l, &[0.0][..])).collect();
        let (arena, ids) = arena(&layers);
        let predicate = HitDistance::new(15.0, None);
        assert_eq!(remerge(&arena, &ids, &predicate, 5).len(), 1);
        assert!(remerge(&arena, &ids, &predicate, 6).is_empty());
    }
}
