//! Index-backed snapping checked against an exhaustive scan on seeded random
//! networks.

use geosnap_algo::{aggregate_matches, snap_observations, SnapConfig, Snapper};
use geosnap_core::{
    Coord, Crs, EdgeKey, LineString, NodeId, ObservationSet, Road, RoadNetwork,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const CRS: Crs = Crs::CH1903P_LV95;

fn random_network(rng: &mut StdRng, roads: usize) -> RoadNetwork {
    let mut network = RoadNetwork::with_crs(CRS);
    for i in 0..roads {
        let vertices = rng.gen_range(2..6);
        let mut x = rng.gen_range(0.0..1000.0);
        let mut y = rng.gen_range(0.0..1000.0);
        let mut coords = vec![(x, y)];
        for _ in 1..vertices {
            x += rng.gen_range(-80.0..80.0);
            y += rng.gen_range(-80.0..80.0);
            coords.push((x, y));
        }
        let key = EdgeKey::new(NodeId::new(1000 + i as u64), NodeId::new(5000 + i as u64), 0);
        network
            .insert_road(Road::new(key, LineString::from(coords)))
            .unwrap();
    }
    network
}

fn random_points(rng: &mut StdRng, count: usize) -> ObservationSet {
    let coords: Vec<(f64, f64)> = (0..count)
        .map(|_| (rng.gen_range(-100.0..1100.0), rng.gen_range(-100.0..1100.0)))
        .collect();
    ObservationSet::from_coords(Some(CRS), coords)
}

fn segment_distance(p: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len2 = dx * dx + dy * dy;
    let t = if len2 > 0.0 {
        (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (cx, cy) = (a.x + t * dx, a.y + t * dy);
    ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt()
}

/// Exhaustive nearest road: smallest key among roads within `eps` of the minimum.
fn brute_force(p: Coord<f64>, network: &RoadNetwork, eps: f64) -> (EdgeKey, f64) {
    let distances: Vec<(EdgeKey, f64)> = network
        .roads()
        .map(|road| {
            let d = road
                .geometry
                .0
                .windows(2)
                .map(|w| segment_distance(p, w[0], w[1]))
                .fold(f64::INFINITY, f64::min);
            (road.key, d)
        })
        .collect();
    let min = distances.iter().map(|(_, d)| *d).fold(f64::INFINITY, f64::min);
    distances
        .into_iter()
        .filter(|(_, d)| *d <= min + eps)
        .min_by_key(|(key, _)| *key)
        .unwrap()
}

#[test]
fn test_matches_exhaustive_scan() {
    let mut rng = StdRng::seed_from_u64(42);
    let network = random_network(&mut rng, 60);
    let points = random_points(&mut rng, 400);
    let config = SnapConfig::default();

    let outcome = snap_observations(&points, &network, &config).unwrap();
    assert_eq!(outcome.matches.len(), points.len());

    for (observation, m) in points.iter().zip(&outcome.matches) {
        assert_eq!(observation.id, m.point);
        let (edge, distance) = brute_force(observation.coord, &network, config.tie_epsilon);
        assert!(m.distance >= 0.0);
        assert!(
            (m.distance - distance).abs() < 1e-9,
            "point {}: {} vs {}",
            m.point,
            m.distance,
            distance
        );
        assert_eq!(m.edge, edge, "point {}", m.point);
    }
}

#[test]
fn test_snapped_coordinate_lies_at_reported_distance() {
    let mut rng = StdRng::seed_from_u64(7);
    let network = random_network(&mut rng, 25);
    let points = random_points(&mut rng, 100);

    let outcome = snap_observations(&points, &network, &SnapConfig::default()).unwrap();
    for (observation, m) in points.iter().zip(&outcome.matches) {
        let d = ((observation.coord.x - m.snapped.x).powi(2)
            + (observation.coord.y - m.snapped.y).powi(2))
        .sqrt();
        assert!((d - m.distance).abs() < 1e-9);
    }
}

#[test]
fn test_parallel_and_sequential_agree() {
    let mut rng = StdRng::seed_from_u64(2024);
    let network = random_network(&mut rng, 40);
    let points = random_points(&mut rng, 300);

    let parallel = snap_observations(&points, &network, &SnapConfig::default()).unwrap();
    let sequential =
        snap_observations(&points, &network, &SnapConfig::default().sequential()).unwrap();
    assert_eq!(parallel.matches, sequential.matches);

    let a = aggregate_matches(&parallel.matches, &network).unwrap();
    let b = aggregate_matches(&sequential.matches, &network).unwrap();
    assert_eq!(a.iter().collect::<Vec<_>>(), b.iter().collect::<Vec<_>>());
}

#[test]
fn test_repeated_runs_are_identical() {
    let mut rng = StdRng::seed_from_u64(99);
    let network = random_network(&mut rng, 30);
    let points = random_points(&mut rng, 200);
    let snapper = Snapper::new(&network, SnapConfig::default()).unwrap();

    let first = snapper.snap(&points).unwrap();
    let second = snapper.snap(&points).unwrap();
    assert_eq!(first.matches, second.matches);
}

#[test]
fn test_every_point_accounted_for_with_radius() {
    let mut rng = StdRng::seed_from_u64(5);
    let network = random_network(&mut rng, 15);
    let points = random_points(&mut rng, 250);
    let config = SnapConfig::default().with_max_distance(25.0);

    let outcome = snap_observations(&points, &network, &config).unwrap();
    assert_eq!(outcome.total(), points.len());
    assert!(outcome.matches.iter().all(|m| m.distance <= 25.0));
    assert!(outcome.unmatched.iter().all(|u| u.nearest_distance > 25.0));

    let mut seen: Vec<u64> = outcome
        .matches
        .iter()
        .map(|m| m.point.value())
        .chain(outcome.unmatched.iter().map(|u| u.point.value()))
        .collect();
    seen.sort_unstable();
    assert_eq!(seen, (0..points.len() as u64).collect::<Vec<_>>());

    let table = aggregate_matches(&outcome.matches, &network).unwrap();
    assert_eq!(table.total_count(), outcome.matches.len());
}
