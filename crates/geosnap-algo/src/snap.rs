//! Nearest-road snapping.
//!
//! Every observation is assigned to the road whose polyline lies closest to
//! it. Candidates come from the [`RoadIndex`] R-tree, so a query touches only
//! the handful of segments around the point instead of the whole network.
//!
//! ## Tie-break
//!
//! Roads whose distance is within `tie_epsilon` of the minimum are treated as
//! equidistant; among them the smallest [`EdgeKey`] (lexicographic over
//! `(u, v, key)`) wins. Results are therefore independent of index layout,
//! thread scheduling and insertion order.
//!
//! ## Metrics
//!
//! - [`DistanceMetric::Euclidean`]: planar distance in CRS units. Use with a
//!   projected (metric) CRS.
//! - [`DistanceMetric::Haversine`]: great-circle metres for WGS 84 data.
//!   Segments are visited in degree-space order and scored by the
//!   great-circle distance to their planar closest point. The walk stops once
//!   a lower bound for every remaining segment exceeds the best score, and
//!   never before `candidate_pool` segments have been scored.

use geo::{Coord, Distance, Haversine, Point};
use geosnap_core::{
    Crs, Degrees, EdgeKey, GeoSnapError, GeoSnapResult, Observation, ObservationSet, PointId,
    RoadNetwork,
};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::index::RoadIndex;
use crate::reproject::ensure_common_crs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    #[default]
    Euclidean,
    Haversine,
}

/// Snapper configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapConfig {
    pub metric: DistanceMetric,
    /// Points farther than this from every road are reported as unmatched.
    /// `None` searches without limit.
    pub max_distance: Option<f64>,
    /// Distances closer than this count as a tie
    pub tie_epsilon: f64,
    /// Minimum number of segments scored per query under
    /// [`DistanceMetric::Haversine`]
    pub candidate_pool: usize,
    /// Run per-point queries on the rayon pool (needs the `parallel` feature)
    pub parallel: bool,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self {
            metric: DistanceMetric::Euclidean,
            max_distance: None,
            tie_epsilon: 1e-9,
            candidate_pool: 8,
            parallel: true,
        }
    }
}

impl SnapConfig {
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_max_distance(mut self, max_distance: f64) -> Self {
        self.max_distance = Some(max_distance);
        self
    }

    pub fn with_tie_epsilon(mut self, tie_epsilon: f64) -> Self {
        self.tie_epsilon = tie_epsilon;
        self
    }

    pub fn with_candidate_pool(mut self, candidate_pool: usize) -> Self {
        self.candidate_pool = candidate_pool;
        self
    }

    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    pub fn validate(&self) -> GeoSnapResult<()> {
        if let Some(radius) = self.max_distance {
            if radius.is_nan() || radius < 0.0 {
                return Err(GeoSnapError::Config(format!(
                    "max_distance must be a non-negative number, got {radius}"
                )));
            }
        }
        if !self.tie_epsilon.is_finite() || self.tie_epsilon < 0.0 {
            return Err(GeoSnapError::Config(format!(
                "tie_epsilon must be finite and non-negative, got {}",
                self.tie_epsilon
            )));
        }
        if self.candidate_pool == 0 {
            return Err(GeoSnapError::Config(
                "candidate_pool must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// One observation assigned to its nearest road.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match {
    pub point: PointId,
    pub edge: EdgeKey,
    /// Non-negative, in CRS units (Euclidean) or metres (Haversine)
    pub distance: f64,
    /// Closest position on the road
    pub snapped: Coord<f64>,
}

/// An observation left out of the aggregates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Unmatched {
    pub point: PointId,
    /// Distance to the nearest road; NaN for points with non-finite coordinates
    pub nearest_distance: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SnapOutcome {
    /// In input order
    pub matches: Vec<Match>,
    /// In input order
    pub unmatched: Vec<Unmatched>,
}

impl SnapOutcome {
    pub fn total(&self) -> usize {
        self.matches.len() + self.unmatched.len()
    }
}

/// A nearest-road query result before it is tied to an observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub edge: EdgeKey,
    pub distance: f64,
    pub closest: Coord<f64>,
}

/// Radius used by `geo`'s haversine formula (m)
const MEAN_EARTH_RADIUS: f64 = 6_371_008.8;

/// Lower bound on the great-circle distance from `origin` to any point at
/// least `degrees` away in lon/lat space. A path leaving that disc stays at
/// latitudes up to `|lat| + degrees`, where one degree in any direction spans
/// at least `cos(lat)` of a meridian degree.
fn haversine_lower_bound(origin: Coord<f64>, degrees: f64) -> f64 {
    let highest = (Degrees(origin.y.abs()) + Degrees(degrees)).value().min(90.0);
    MEAN_EARTH_RADIUS * Degrees(degrees).to_radians().value() * Degrees(highest).to_radians().cos()
}

/// Smallest key among candidates within `epsilon` of the minimum distance.
fn break_ties(candidates: &[Candidate], epsilon: f64) -> Option<Candidate> {
    let min_distance = candidates
        .iter()
        .map(|c| c.distance)
        .fold(f64::INFINITY, f64::min);
    candidates
        .iter()
        .filter(|c| c.distance <= min_distance + epsilon)
        .min_by(|a, b| a.edge.cmp(&b.edge))
        .copied()
}

/// Nearest-road lookup over one network.
#[derive(Debug)]
pub struct Snapper<'a> {
    network: &'a RoadNetwork,
    index: RoadIndex,
    config: SnapConfig,
}

impl<'a> Snapper<'a> {
    /// Build the segment index. Fails with `NoEdgesAvailable` when the
    /// network has no road with a usable geometry.
    pub fn new(network: &'a RoadNetwork, config: SnapConfig) -> GeoSnapResult<Self> {
        config.validate()?;
        let geographic = network.crs.is_some_and(|crs| crs.is_geographic());
        match config.metric {
            DistanceMetric::Haversine if !geographic => {
                return Err(GeoSnapError::Config(
                    "haversine distances need a geographic (lon/lat) network".into(),
                ))
            }
            DistanceMetric::Euclidean if geographic => {
                warn!("snapping with planar distances on lon/lat coordinates; reproject for metric results");
            }
            _ => {}
        }

        let index = RoadIndex::build(network);
        if index.is_empty() {
            return Err(GeoSnapError::NoEdgesAvailable);
        }
        debug!(
            roads = network.road_count(),
            segments = index.segment_count(),
            "built road segment index"
        );
        Ok(Self {
            network,
            index,
            config,
        })
    }

    pub fn config(&self) -> &SnapConfig {
        &self.config
    }

    pub fn network(&self) -> &RoadNetwork {
        self.network
    }

    /// Nearest road to `coord` regardless of the search radius. `coord` is
    /// taken to be in the network's CRS; no reference system check happens
    /// here.
    pub fn nearest(&self, coord: Coord<f64>) -> Option<Candidate> {
        if !(coord.x.is_finite() && coord.y.is_finite()) {
            return None;
        }
        match self.config.metric {
            DistanceMetric::Euclidean => self.nearest_planar(coord),
            DistanceMetric::Haversine => self.nearest_haversine(coord),
        }
    }

    fn nearest_planar(&self, coord: Coord<f64>) -> Option<Candidate> {
        let mut window: Vec<Candidate> = Vec::new();
        let mut min_distance = None;
        for (segment, distance_2) in self.index.nearest_segments(coord) {
            let distance = distance_2.sqrt();
            let min = *min_distance.get_or_insert(distance);
            if distance > min + self.config.tie_epsilon {
                break;
            }
            window.push(Candidate {
                edge: self.index.key(segment.road),
                distance,
                closest: segment.closest(coord),
            });
        }
        break_ties(&window, self.config.tie_epsilon)
    }

    fn nearest_haversine(&self, coord: Coord<f64>) -> Option<Candidate> {
        let origin = Point::from(coord);
        let mut scored: Vec<Candidate> = Vec::new();
        let mut best = f64::INFINITY;
        for (segment, distance_2) in self.index.nearest_segments(coord) {
            if scored.len() >= self.config.candidate_pool
                && haversine_lower_bound(coord, distance_2.sqrt())
                    > best + self.config.tie_epsilon
            {
                break;
            }
            let closest = segment.closest(coord);
            let distance = Haversine.distance(origin, Point::from(closest));
            best = best.min(distance);
            scored.push(Candidate {
                edge: self.index.key(segment.road),
                distance,
                closest,
            });
        }
        break_ties(&scored, self.config.tie_epsilon)
    }

    fn classify(&self, observation: &Observation) -> Result<Match, Unmatched> {
        let Some(nearest) = self.nearest(observation.coord) else {
            return Err(Unmatched {
                point: observation.id,
                nearest_distance: f64::NAN,
            });
        };
        match self.config.max_distance {
            Some(radius) if nearest.distance > radius => Err(Unmatched {
                point: observation.id,
                nearest_distance: nearest.distance,
            }),
            _ => Ok(Match {
                point: observation.id,
                edge: nearest.edge,
                distance: nearest.distance,
                snapped: nearest.closest,
            }),
        }
    }

    /// Snap a single observation given in `crs`. Fails with
    /// `ReferenceSystemMismatch` unless `crs` is the network's, and with
    /// `UnmatchedPoint` when the nearest road is beyond `max_distance` or the
    /// coordinate is not finite.
    pub fn snap_one(&self, observation: &Observation, crs: Option<Crs>) -> GeoSnapResult<Match> {
        ensure_common_crs(crs, self.network.crs)?;
        self.classify(observation)
            .map_err(|unmatched| GeoSnapError::UnmatchedPoint {
                point: unmatched.point,
                max_distance: self.config.max_distance.unwrap_or(f64::INFINITY),
            })
    }

    /// Snap every observation. Each input point ends up in exactly one of
    /// `matches` or `unmatched`, in input order.
    pub fn snap(&self, observations: &ObservationSet) -> GeoSnapResult<SnapOutcome> {
        ensure_common_crs(observations.crs, self.network.crs)?;

        let results = self.classify_all(&observations.observations);
        let mut outcome = SnapOutcome::default();
        for result in results {
            match result {
                Ok(m) => outcome.matches.push(m),
                Err(u) => outcome.unmatched.push(u),
            }
        }
        if !outcome.unmatched.is_empty() {
            warn!(
                unmatched = outcome.unmatched.len(),
                total = outcome.total(),
                "observations without a road in range"
            );
        }
        Ok(outcome)
    }

    #[cfg(feature = "parallel")]
    fn classify_all(&self, observations: &[Observation]) -> Vec<Result<Match, Unmatched>> {
        if self.config.parallel {
            observations.par_iter().map(|o| self.classify(o)).collect()
        } else {
            observations.iter().map(|o| self.classify(o)).collect()
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn classify_all(&self, observations: &[Observation]) -> Vec<Result<Match, Unmatched>> {
        observations.iter().map(|o| self.classify(o)).collect()
    }
}

/// Snap `observations` onto `network`.
///
/// Checks the reference systems first (`ReferenceSystemMismatch`), then the
/// edge set (`NoEdgesAvailable`).
pub fn snap_observations(
    observations: &ObservationSet,
    network: &RoadNetwork,
    config: &SnapConfig,
) -> GeoSnapResult<SnapOutcome> {
    ensure_common_crs(observations.crs, network.crs)?;
    Snapper::new(network, config.clone())?.snap(observations)
}
