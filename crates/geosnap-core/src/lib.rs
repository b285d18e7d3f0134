//! # geosnap-core: Road Network and Observation Model
//!
//! Provides the data structures used to snap point observations (accident
//! locations, sensor readings, bus stops) onto the edges of a road network.
//!
//! ## Design Philosophy
//!
//! Networks are modeled as **directed multigraphs**, the way OpenStreetMap
//! street graphs are:
//! - **Nodes**: [`Junction`]s with an id and a coordinate
//! - **Edges**: [`Road`]s with a polyline geometry and an [`EdgeKey`]
//!
//! An [`EdgeKey`] is the triple `(u, v, key)`: the two junction ids plus a
//! discriminator for parallel roads between the same pair. Keys order
//! lexicographically, which is what the snapper uses to break distance ties.
//!
//! Both layers carry an explicit [`Crs`]. Nothing assumes a default system.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use geosnap_core::*;
//!
//! let mut network = RoadNetwork::with_crs(Crs::CH1903P_LV95);
//! network.add_junction(NodeId::new(1), Coord { x: 2_666_000.0, y: 1_211_000.0 });
//! network.add_junction(NodeId::new(2), Coord { x: 2_666_250.0, y: 1_211_100.0 });
//!
//! // Straight road between the junctions, key assigned automatically
//! let key = network.add_road(NodeId::new(1), NodeId::new(2), None).unwrap();
//! assert_eq!(key, EdgeKey::new(NodeId::new(1), NodeId::new(2), 0));
//!
//! let mut accidents = ObservationSet::with_crs(Crs::CH1903P_LV95);
//! accidents.push(
//!     Observation::new(PointId::new(0), 2_666_100.0, 1_211_060.0)
//!         .with_attribute("AccidentUID", "9FD6441F802C20A6E0430A865E3377D4"),
//! );
//! ```
//!
//! ## Modules
//!
//! - [`crs`] - Reference system tags
//! - [`observation`] - Point observations with opaque payloads
//! - [`graph_utils`] - Connectivity statistics and island filtering
//! - [`diagnostics`] - Validation reporting
//! - [`units`] - Degree/radian newtypes used by projections

use geo::{BoundingRect, Rect};
use petgraph::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

pub mod crs;
pub mod diagnostics;
pub mod error;
pub mod graph_utils;
pub mod observation;
pub mod units;

pub use crs::Crs;
pub use diagnostics::{Category, DiagnosticIssue, Diagnostics, Severity, Subject};
pub use error::{GeoSnapError, GeoSnapResult};
pub use geo::{Coord, LineString};
pub use graph_utils::*;
pub use observation::{Observation, ObservationSet};
pub use petgraph::graph::NodeIndex;
pub use units::{Degrees, Radians};

/// Opaque per-feature payload. Passed through unchanged.
pub type Attributes = BTreeMap<String, serde_json::Value>;

// Newtype wrappers for IDs for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PointId(u64);

impl NodeId {
    #[inline]
    pub fn new(value: u64) -> Self {
        NodeId(value)
    }
    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl PointId {
    #[inline]
    pub fn new(value: u64) -> Self {
        PointId(value)
    }
    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identifier of a road: `(u, v, key)`.
///
/// Field order matters: the derived `Ord` compares `u`, then `v`, then `key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey {
    pub u: NodeId,
    pub v: NodeId,
    pub key: u32,
}

impl EdgeKey {
    pub fn new(u: NodeId, v: NodeId, key: u32) -> Self {
        Self { u, v, key }
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.u, self.v, self.key)
    }
}

/// A network node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Junction {
    pub id: NodeId,
    pub coord: Coord<f64>,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

/// A network edge with its polyline geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Road {
    pub key: EdgeKey,
    pub geometry: LineString<f64>,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

impl Road {
    pub fn new(key: EdgeKey, geometry: LineString<f64>) -> Self {
        Self {
            key,
            geometry,
            attributes: Attributes::new(),
        }
    }

    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

/// The road network graph
#[derive(Debug, Clone, Default)]
pub struct RoadNetwork {
    pub crs: Option<Crs>,
    pub graph: Graph<Junction, Road, Directed>,
    junctions: HashMap<NodeId, NodeIndex>,
}

impl RoadNetwork {
    /// Empty network with an unknown reference system.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_crs(crs: Crs) -> Self {
        Self {
            crs: Some(crs),
            ..Self::default()
        }
    }

    /// Build a network from standalone roads. Junctions are created at the
    /// first and last vertex of each polyline when not already present.
    pub fn from_roads<I>(crs: Option<Crs>, roads: I) -> GeoSnapResult<Self>
    where
        I: IntoIterator<Item = Road>,
    {
        let mut network = Self {
            crs,
            ..Self::default()
        };
        for road in roads {
            network.insert_road(road)?;
        }
        Ok(network)
    }

    /// Add a junction. An existing junction with the same id is kept as is.
    pub fn add_junction(&mut self, id: NodeId, coord: Coord<f64>) -> NodeIndex {
        if let Some(&index) = self.junctions.get(&id) {
            return index;
        }
        let index = self.graph.add_node(Junction {
            id,
            coord,
            attributes: Attributes::new(),
        });
        self.junctions.insert(id, index);
        index
    }

    pub fn junction(&self, id: NodeId) -> Option<&Junction> {
        self.junctions.get(&id).map(|&index| &self.graph[index])
    }

    /// Connect two existing junctions. Without a geometry the road is the
    /// straight segment between them. The parallel-edge key is one past the
    /// highest key already used between `u` and `v`.
    pub fn add_road(
        &mut self,
        u: NodeId,
        v: NodeId,
        geometry: Option<LineString<f64>>,
    ) -> GeoSnapResult<EdgeKey> {
        let (ui, vi) = self.junction_pair(u, v)?;
        let key = match self
            .graph
            .edges_connecting(ui, vi)
            .map(|edge| edge.weight().key.key)
            .max()
        {
            None => 0,
            Some(highest) => highest.checked_add(1).ok_or_else(|| {
                GeoSnapError::Validation(format!(
                    "no parallel-edge key left between junctions {u} and {v}"
                ))
            })?,
        };
        let geometry = geometry.unwrap_or_else(|| {
            LineString::from(vec![self.graph[ui].coord, self.graph[vi].coord])
        });
        let edge_key = EdgeKey::new(u, v, key);
        self.graph.add_edge(ui, vi, Road::new(edge_key, geometry));
        Ok(edge_key)
    }

    /// Insert a road with an explicit key. Missing junctions are created at
    /// the polyline endpoints; a key that is already present is rejected.
    pub fn insert_road(&mut self, road: Road) -> GeoSnapResult<()> {
        let (first, last) = match (road.geometry.0.first(), road.geometry.0.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => {
                return Err(GeoSnapError::Validation(format!(
                    "road {} has an empty geometry",
                    road.key
                )))
            }
        };
        let ui = self.add_junction(road.key.u, first);
        let vi = self.add_junction(road.key.v, last);
        if self
            .graph
            .edges_connecting(ui, vi)
            .any(|edge| edge.weight().key == road.key)
        {
            return Err(GeoSnapError::Validation(format!(
                "duplicate road key {}",
                road.key
            )));
        }
        self.graph.add_edge(ui, vi, road);
        Ok(())
    }

    pub fn road(&self, key: &EdgeKey) -> Option<&Road> {
        let ui = *self.junctions.get(&key.u)?;
        let vi = *self.junctions.get(&key.v)?;
        self.graph
            .edges_connecting(ui, vi)
            .map(|edge| edge.weight())
            .find(|road| road.key == *key)
    }

    /// Roads in insertion order.
    pub fn roads(&self) -> impl Iterator<Item = &Road> {
        self.graph.edge_weights()
    }

    pub fn road_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn junction_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Extent of all junctions and road geometries.
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        let junction_rects = self
            .graph
            .node_weights()
            .map(|junction| Rect::new(junction.coord, junction.coord));
        let road_rects = self
            .roads()
            .filter_map(|road| road.geometry.bounding_rect());
        junction_rects.chain(road_rects).reduce(|a, b| {
            Rect::new(
                Coord {
                    x: a.min().x.min(b.min().x),
                    y: a.min().y.min(b.min().y),
                },
                Coord {
                    x: a.max().x.max(b.max().x),
                    y: a.max().y.max(b.max().y),
                },
            )
        })
    }

    /// Populate `diag` with issues that would make snapping unreliable.
    pub fn validate_into(&self, diag: &mut Diagnostics) {
        if self.crs.is_none() {
            diag.warning(Category::Reference, Subject::Network, "no reference system");
        }
        if self.road_count() == 0 {
            diag.warning(Category::Structure, Subject::Network, "no roads");
            return;
        }

        for road in self.roads() {
            let subject = Subject::Road(road.key);
            let coords = &road.geometry.0;
            if coords.len() < 2 {
                diag.error(Category::Geometry, subject, "fewer than two vertices");
                continue;
            }
            if coords.iter().any(|c| !(c.x.is_finite() && c.y.is_finite())) {
                diag.error(Category::Geometry, subject, "non-finite coordinate");
                continue;
            }
            if coords.windows(2).all(|pair| pair[0] == pair[1]) {
                diag.warning(Category::Geometry, subject, "zero length");
            }
        }
    }

    fn junction_pair(&self, u: NodeId, v: NodeId) -> GeoSnapResult<(NodeIndex, NodeIndex)> {
        let lookup = |id: NodeId| {
            self.junctions
                .get(&id)
                .copied()
                .ok_or_else(|| GeoSnapError::Validation(format!("unknown junction {id}")))
        };
        Ok((lookup(u)?, lookup(v)?))
    }
}
