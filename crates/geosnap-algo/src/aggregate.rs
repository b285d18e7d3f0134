//! Per-road aggregation of snapped observations.
//!
//! Matches are grouped by [`EdgeKey`]. Groups appear in the order their edge
//! was first seen in the match sequence, so a table built from the same
//! matches is always identical regardless of how the matches were computed.
//! Each group keeps the road's own geometry, never a point's.

use std::collections::HashMap;

use geosnap_core::{EdgeKey, GeoSnapError, GeoSnapResult, LineString, PointId, RoadNetwork};
use serde::Serialize;

use crate::snap::Match;

/// Summary of all observations that snapped to one road.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeAggregate {
    pub edge: EdgeKey,
    pub count: usize,
    /// Geometry of the road itself
    pub geometry: LineString<f64>,
    /// Members in match order
    pub point_ids: Vec<PointId>,
    pub min_distance: f64,
    pub max_distance: f64,
    pub mean_distance: f64,
}

impl EdgeAggregate {
    fn new(edge: EdgeKey, geometry: LineString<f64>) -> Self {
        Self {
            edge,
            count: 0,
            geometry,
            point_ids: Vec::new(),
            min_distance: f64::INFINITY,
            max_distance: 0.0,
            mean_distance: 0.0,
        }
    }

    fn add(&mut self, m: &Match) {
        self.count += 1;
        self.point_ids.push(m.point);
        self.min_distance = self.min_distance.min(m.distance);
        self.max_distance = self.max_distance.max(m.distance);
        // running mean
        self.mean_distance += (m.distance - self.mean_distance) / self.count as f64;
    }
}

/// Aggregates keyed by road, in first-occurrence order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregateTable {
    rows: Vec<EdgeAggregate>,
    #[serde(skip)]
    index: HashMap<EdgeKey, usize>,
}

impl AggregateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, edge: &EdgeKey) -> Option<&EdgeAggregate> {
        self.index.get(edge).map(|&row| &self.rows[row])
    }

    pub fn iter(&self) -> impl Iterator<Item = &EdgeAggregate> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sum of all counts; equals the number of aggregated matches.
    pub fn total_count(&self) -> usize {
        self.rows.iter().map(|row| row.count).sum()
    }

    /// Rows by descending count, equal counts by ascending key.
    pub fn ranked(&self) -> Vec<&EdgeAggregate> {
        let mut ranked: Vec<&EdgeAggregate> = self.rows.iter().collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.edge.cmp(&b.edge)));
        ranked
    }

    fn entry(&mut self, edge: EdgeKey, network: &RoadNetwork) -> GeoSnapResult<&mut EdgeAggregate> {
        let row = match self.index.get(&edge).copied() {
            Some(row) => row,
            None => {
                let road = network
                    .road(&edge)
                    .ok_or(GeoSnapError::UnknownEdge(edge))?;
                self.rows
                    .push(EdgeAggregate::new(edge, road.geometry.clone()));
                self.index.insert(edge, self.rows.len() - 1);
                self.rows.len() - 1
            }
        };
        Ok(&mut self.rows[row])
    }
}

impl<'a> IntoIterator for &'a AggregateTable {
    type Item = &'a EdgeAggregate;
    type IntoIter = std::slice::Iter<'a, EdgeAggregate>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Group `matches` by road. An empty slice yields an empty table; a match
/// on a road missing from `network` fails with `UnknownEdge`.
pub fn aggregate_matches(matches: &[Match], network: &RoadNetwork) -> GeoSnapResult<AggregateTable> {
    let mut table = AggregateTable::new();
    for m in matches {
        table.entry(m.edge, network)?.add(m);
    }
    Ok(table)
}
