#![allow(clippy::uninlined_format_args)]
use stripsync_algorithms::{
    accumulate_occupancy, accumulate_occupancy_batched, cluster_strips, OccupancyAccumulator,
    StripCluster,
};
use stripsync_core::{Channel, ClassifiedHit, DetectorGeometry, Waveform};

fn signal_hit(tile: u16, strip: u16) -> ClassifiedHit {
    ClassifiedHit::new(
        Waveform::new(Channel::new(55, tile, strip), 200, 30, 50.0, 4.0),
        true,
    )
}

// Deterministic pseudo-random strip sets (linear congruential generator).
fn strip_sets() -> Vec<Vec<u16>> {
    let mut state: u32 = 12_345;
    let mut next = move || {
        state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        (state >> 16) as u16
    };
    (0..50)
        .map(|_| {
            let n = next() % 60;
            (0..n).map(|_| next() % 256).collect()
        })
        .collect()
}

fn strips_of(clusters: &[StripCluster]) -> Vec<Vec<u16>> {
    clusters.iter().map(|c| c.strips().collect()).collect()
}

#[test]
fn test_clusters_are_contiguous_and_separated() {
    let geometry = DetectorGeometry::default();
    for strips in strip_sets() {
        let hits: Vec<_> = strips.iter().map(|&s| signal_hit(0, s)).collect();
        let clusters = cluster_strips(&geometry, 0, &hits);

        for cluster in &clusters {
            assert!(!cluster.is_empty());
            let members: Vec<u16> = cluster.strips().collect();
            for pair in members.windows(2) {
                assert_eq!(pair[1] - pair[0], 1, "gap inside cluster {:?}", members);
            }
        }
        for pair in clusters.windows(2) {
            let gap = pair[1].first_strip().unwrap() - pair[0].last_strip().unwrap();
            assert!(gap >= 2, "clusters too close: gap {}", gap);
        }

        // Union of members equals the deduplicated input
        let mut expected = strips.clone();
        expected.sort_unstable();
        expected.dedup();
        let members: Vec<u16> = clusters.iter().flat_map(StripCluster::strips).collect();
        assert_eq!(members, expected);
    }
}

#[test]
fn test_clustering_is_order_independent() {
    let geometry = DetectorGeometry::default();
    for strips in strip_sets() {
        let hits: Vec<_> = strips.iter().map(|&s| signal_hit(0, s)).collect();
        let mut reversed = hits.clone();
        reversed.reverse();
        let mut rotated = hits.clone();
        if !rotated.is_empty() {
            let mid = rotated.len() / 2;
            rotated.rotate_left(mid);
        }

        let reference = strips_of(&cluster_strips(&geometry, 0, &hits));
        assert_eq!(strips_of(&cluster_strips(&geometry, 0, &reversed)), reference);
        assert_eq!(strips_of(&cluster_strips(&geometry, 0, &rotated)), reference);
    }
}

#[test]
fn test_concrete_strip_clusters() {
    let hits: Vec<_> = [10, 4, 11, 3, 5].iter().map(|&s| signal_hit(2, s)).collect();
    let clusters = cluster_strips(&DetectorGeometry::default(), 2, &hits);
    assert_eq!(strips_of(&clusters), vec![vec![3, 4, 5], vec![10, 11]]);
    assert!(clusters.iter().all(|c| c.unit == 2));
}

#[test]
fn test_batched_occupancy_matches_single_pass() {
    let geometry = DetectorGeometry::default();
    let batches: Vec<Vec<ClassifiedHit>> = strip_sets()
        .into_iter()
        .enumerate()
        .map(|(i, strips)| {
            strips
                .into_iter()
                .map(|s| signal_hit((i % 8) as u16, s))
                .collect()
        })
        .collect();
    let total_events = batches.len() as u64;

    let single = accumulate_occupancy(batches.iter().flatten(), total_events, &geometry, 0.2);
    let batched = accumulate_occupancy_batched(&batches, total_events, &geometry, 0.2);
    assert_eq!(single, batched);

    // Manual merge of two halves gives identical counts
    let (first, second) = batches.split_at(batches.len() / 2);
    let mut left = OccupancyAccumulator::new(geometry.clone());
    let mut right = OccupancyAccumulator::new(geometry.clone());
    first.iter().for_each(|hits| left.add_event(hits));
    second.iter().for_each(|hits| right.add_event(hits));
    left.merge(&right);
    assert_eq!(left.events(), total_events);
    assert_eq!(left.finish(total_events, 0.2), single);
}
