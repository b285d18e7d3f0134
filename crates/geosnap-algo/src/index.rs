//! R-tree over road segments.
//!
//! Each polyline is split into its straight segments and every segment is
//! indexed by its bounding box. A nearest-neighbour walk over the tree yields
//! segments in order of exact point-to-segment distance, so the first hit is
//! the nearest road and the walk can stop as soon as distances leave the tie
//! window.

use geo::{Coord, Line};
use geosnap_core::{EdgeKey, RoadNetwork};
use rstar::{PointDistance, RTree, RTreeObject, AABB};

/// Closest point to `p` on the segment `line`.
///
/// The orthogonal projection parameter is clamped to `[0, 1]`, so a
/// projection falling beyond an end lands on that endpoint rather than on the
/// infinite line. A zero-length segment collapses to its start.
pub fn closest_on_segment(line: &Line<f64>, p: Coord<f64>) -> Coord<f64> {
    let d = line.delta();
    let len2 = d.x * d.x + d.y * d.y;
    if len2 == 0.0 {
        return line.start;
    }
    let t = (((p.x - line.start.x) * d.x + (p.y - line.start.y) * d.y) / len2).clamp(0.0, 1.0);
    Coord {
        x: line.start.x + t * d.x,
        y: line.start.y + t * d.y,
    }
}

fn is_finite(c: Coord<f64>) -> bool {
    c.x.is_finite() && c.y.is_finite()
}

/// One straight piece of a road polyline.
#[derive(Debug, Clone)]
pub struct SegmentEntry {
    /// Position of the owning road in [`RoadIndex::keys`]
    pub road: usize,
    pub line: Line<f64>,
}

impl SegmentEntry {
    pub fn closest(&self, p: Coord<f64>) -> Coord<f64> {
        closest_on_segment(&self.line, p)
    }
}

impl RTreeObject for SegmentEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.line.start.x, self.line.start.y],
            [self.line.end.x, self.line.end.y],
        )
    }
}

impl PointDistance for SegmentEntry {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let p = Coord {
            x: point[0],
            y: point[1],
        };
        let c = self.closest(p);
        let (dx, dy) = (p.x - c.x, p.y - c.y);
        dx * dx + dy * dy
    }
}

/// Segment index for one road network.
#[derive(Debug)]
pub struct RoadIndex {
    tree: RTree<SegmentEntry>,
    keys: Vec<EdgeKey>,
}

impl RoadIndex {
    /// Roads with an empty geometry are not indexed. A single-vertex road is
    /// indexed as a degenerate segment so it can still be matched. Segments
    /// with a non-finite endpoint are left out, so a road whose every segment
    /// is broken cannot be matched at all.
    pub fn build(network: &RoadNetwork) -> Self {
        let mut keys = Vec::with_capacity(network.road_count());
        let mut segments = Vec::new();
        for road in network.roads() {
            let position = keys.len();
            keys.push(road.key);
            let lines: Vec<Line<f64>> = match road.geometry.0.as_slice() {
                [] => Vec::new(),
                [only] => vec![Line::new(*only, *only)],
                _ => road.geometry.lines().collect(),
            };
            segments.extend(
                lines
                    .into_iter()
                    .filter(|line| is_finite(line.start) && is_finite(line.end))
                    .map(|line| SegmentEntry {
                        road: position,
                        line,
                    }),
            );
        }
        Self {
            tree: RTree::bulk_load(segments),
            keys,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    pub fn segment_count(&self) -> usize {
        self.tree.size()
    }

    pub fn key(&self, road: usize) -> EdgeKey {
        self.keys[road]
    }

    /// Segments by increasing planar distance, with the squared distance.
    pub fn nearest_segments(
        &self,
        p: Coord<f64>,
    ) -> impl Iterator<Item = (&SegmentEntry, f64)> + '_ {
        self.tree.nearest_neighbor_iter_with_distance_2(&[p.x, p.y])
    }
}
