use std::collections::HashSet;
use trackpat_algorithms::{HelixFitter, HitIndex, SeedScanner, TrackFinder};
use trackpat_core::{Event, HitArena, HitId, RawHit, SegmentId, TrackingConfig};

mod common;
use common::{geometry, row_radius, Helix};

fn finder(config: TrackingConfig) -> TrackFinder<HelixFitter, trackpat_core::CylindricalGeometry> {
    let geometry = geometry();
    TrackFinder::new(config, HelixFitter::new(&geometry), geometry).unwrap()
}

fn truths(result: &trackpat_algorithms::EventResult, hits: &[HitId]) -> HashSet<u64> {
    hits.iter()
        .filter_map(|&id| result.arena.get(id).truth)
        .collect()
}

#[test]
fn test_single_circle_becomes_one_complete_track() {
    let helix = Helix::new(2000.0, 0.4, 0.3);
    let event = Event::new(1, helix.hits(0..20, 1));

    let result = finder(TrackingConfig::default()).process_event(&event);

    assert_eq!(result.tracks.len(), 1, "tracks: {:?}", result.tracks);
    let track = &result.tracks[0];
    assert_eq!(track.len(), 20);
    assert!(track.complete);
    assert!(track.flags.starts_inner && track.flags.is_central);
    assert!(!track.flags.is_curler);
    assert!(result.consumed.is_empty());
    assert_eq!(result.statistics.complete_tracks, 1);

    // hits ordered inner to outer
    let layers: Vec<u32> = track
        .hits
        .iter()
        .map(|&id| result.arena.get(id).layer)
        .collect();
    assert_eq!(layers, (0..20).collect::<Vec<_>>());
    assert!((track.state_ref.omega - 1.0 / 2000.0).abs() < 1e-7);
}

#[test]
fn test_interleaved_pair_is_split() {
    let a = Helix::new(2000.0, 0.40, 0.3);
    let b = Helix::new(2000.0, 0.44, 0.3);
    let mut hits = a.hits(0..20, 1);
    hits.extend(b.hits(0..20, 2));
    let event = Event::new(2, hits);

    let result = finder(TrackingConfig::default()).process_event(&event);

    assert!(result.statistics.split_clusters >= 1);
    assert_eq!(result.tracks.len(), 2);
    for track in &result.tracks {
        assert_eq!(track.len(), 20);
        assert_eq!(truths(&result, &track.hits).len(), 1);
        assert!(track.complete);
    }
    assert!(result.diagnostics.impure.is_empty());
}

#[test]
fn test_mostly_interleaved_pair_keeps_every_hit() {
    // the second track misses 4 of 20 rows, so 80% of the rows hold two hits
    let a = Helix::new(2000.0, 0.40, 0.3);
    let b = Helix::new(2000.0, 0.44, 0.3);
    let mut hits = a.hits(0..20, 1);
    hits.extend(b.hits((0..20).filter(|l| ![2, 7, 12, 17].contains(l)), 2));
    let event = Event::new(7, hits);

    let result = finder(TrackingConfig::default()).process_event(&event);

    assert!(result.statistics.split_clusters >= 1);
    assert_eq!(result.tracks.len(), 2, "tracks: {:?}", result.tracks);
    let mut by_truth: Vec<(u64, usize)> = result
        .tracks
        .iter()
        .map(|track| {
            let labels = truths(&result, &track.hits);
            assert_eq!(labels.len(), 1);
            assert!(track.complete);
            (labels.into_iter().next().unwrap(), track.len())
        })
        .collect();
    by_truth.sort_unstable();
    assert_eq!(by_truth, vec![(1, 20), (2, 16)]);
    assert!(result.diagnostics.impure.is_empty());
}

#[test]
fn test_straight_track_is_found() {
    let hits = (0..20)
        .map(|l| {
            let rho = row_radius(l);
            RawHit::new(rho * 0.3f64.cos(), rho * 0.3f64.sin(), 0.2 * rho).with_truth(1)
        })
        .collect();

    let result = finder(TrackingConfig::default()).process_event(&Event::new(8, hits));

    assert_eq!(result.statistics.failed_fits, 0);
    assert!(result.discarded.is_empty());
    assert_eq!(result.tracks.len(), 1);
    let track = &result.tracks[0];
    assert_eq!(track.len(), 20);
    assert!(track.complete);
    assert!(track.state_ref.omega.abs() < 1e-12);
    assert!((track.state_ref.phi0 - 0.3).abs() < 1e-9);
}

#[test]
fn test_half_duplicated_cluster_rejected_and_reclusterable() {
    let helix = Helix::new(2000.0, 0.4, 0.0);
    let mut hits = helix.hits(8..20, 1);
    for layer in (8..20).step_by(2) {
        let p = helix.at_rho(row_radius(layer));
        // 8 mm off the track, perpendicular to the radius
        let (ux, uy) = (-p.y / p.norm(), p.x / p.norm());
        hits.push(RawHit::new(p.x + 8.0 * ux, p.y + 8.0 * uy, p.z).with_truth(2));
    }
    let geometry = geometry();
    let arena = HitArena::from_event(&Event::new(3, hits), &geometry, 150, 0.0).arena;
    let mut index = HitIndex::new(&arena, 20);
    let config = TrackingConfig::default();
    let scanner = SeedScanner::new(&config);

    let scan = scanner.scan_window(&arena, &mut index, (8, 19), 20.0);
    assert!(scan.seeds.is_empty());
    assert_eq!(scan.rejected_duplicate_rows, 1);
    assert_eq!(index.len(), 18);

    // still available: a second look finds and rejects the same cluster
    let again = scanner.scan_window(&arena, &mut index, (8, 19), 20.0);
    assert_eq!(again.rejected_duplicate_rows, 1);
    assert_eq!(index.len(), 18);
}

#[test]
fn test_rejected_hits_are_rescanned_by_later_passes() {
    let helix = Helix::new(2000.0, 0.4, 0.0);
    let mut hits = helix.hits(8..20, 1);
    for layer in (8..20).step_by(2) {
        let p = helix.at_rho(row_radius(layer));
        let (ux, uy) = (-p.y / p.norm(), p.x / p.norm());
        hits.push(RawHit::new(p.x + 8.0 * ux, p.y + 8.0 * uy, p.z).with_truth(2));
    }
    let result = finder(TrackingConfig::default()).process_event(&Event::new(9, hits));

    // cuts of 20, 30 and 40 mm in passes 2 to 4 each rebuild and reject the
    // cluster from the released hits
    assert!(
        result.statistics.rejected_duplicate_rows >= 3,
        "statistics: {:?}",
        result.statistics
    );
    assert_eq!(result.statistics.seeds, 0);
    assert!(result.tracks.is_empty());
    assert!(result.discarded.is_empty());
}

#[test]
fn test_split_segments_of_one_circle_are_merged() {
    let helix = Helix::new(2000.0, -0.8, 0.2);
    let event = Event::new(4, helix.hits((0..8).chain(12..20), 1));

    let result = finder(TrackingConfig::default()).process_event(&event);

    assert_eq!(result.tracks.len(), 1, "tracks: {:?}", result.tracks);
    let track = &result.tracks[0];
    assert_eq!(track.len(), 16);
    assert!(track.complete);
    assert_eq!(track.merged_from.len(), 2);
    assert_eq!(result.consumed.len(), 2);
    assert_eq!(result.statistics.merged_segments, 2);

    let consumed: HashSet<HitId> = result
        .consumed
        .iter()
        .flat_map(|c| c.hits.iter().copied())
        .collect();
    let final_hits: HashSet<HitId> = track.hits.iter().copied().collect();
    assert_eq!(consumed, final_hits);
    assert!(result.consumed.iter().all(|c| c.into == track.id));
    assert!(!track.merged_from.contains(&track.id));
}

#[test]
fn test_incompatible_segments_stay_apart() {
    let inner = Helix::new(2000.0, -0.8, 0.2);
    let outer = Helix::new(-1500.0, 0.9, -0.3);
    let mut hits = inner.hits(0..8, 1);
    hits.extend(outer.hits(12..20, 2));

    let result = finder(TrackingConfig::default()).process_event(&Event::new(5, hits));

    assert_eq!(result.tracks.len(), 2);
    assert!(result.tracks.iter().all(|t| !t.complete && t.len() == 8));
    assert!(result.consumed.is_empty());
    let ids: Vec<SegmentId> = result.tracks.iter().map(|t| t.id).collect();
    assert!(ids[0] < ids[1]);
}

#[test]
fn test_empty_event() {
    let result = finder(TrackingConfig::default()).process_event(&Event::new(6, Vec::new()));
    assert!(result.tracks.is_empty());
    assert_eq!(result.statistics.events, 1);
    assert_eq!(result.number, 6);
}
