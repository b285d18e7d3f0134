//! End-to-end analysis: reconcile reference systems, snap, aggregate.

use std::fs;
use std::path::Path;

use geosnap_core::{
    graph_stats, Crs, Diagnostics, GeoSnapError, GeoSnapResult, ObservationSet, RoadNetwork,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::aggregate::{aggregate_matches, AggregateTable};
use crate::reproject::{ProjectionTarget, Reprojector};
use crate::snap::{Match, SnapConfig, Snapper, Unmatched};

/// Configuration for [`analyze`].
///
/// ```json
/// {
///   "projection": { "epsg": "EPSG:2056" },
///   "snap": { "max_distance": 50.0 }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub projection: ProjectionTarget,
    pub snap: SnapConfig,
}

impl AnalysisConfig {
    pub fn with_projection(mut self, projection: ProjectionTarget) -> Self {
        self.projection = projection;
        self
    }

    pub fn with_snap(mut self, snap: SnapConfig) -> Self {
        self.snap = snap;
        self
    }

    pub fn from_json_str(json: &str) -> GeoSnapResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> GeoSnapResult<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            GeoSnapError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> GeoSnapResult<()> {
        self.snap.validate()
    }
}

/// Result of one analysis pass.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    /// Reference system all distances are expressed in
    pub crs: Crs,
    pub matches: Vec<Match>,
    pub unmatched: Vec<Unmatched>,
    pub aggregates: AggregateTable,
}

impl AnalysisReport {
    pub fn matched_count(&self) -> usize {
        self.matches.len()
    }

    pub fn unmatched_count(&self) -> usize {
        self.unmatched.len()
    }
}

/// Validate both layers without modifying them. Observation issues come
/// first.
pub fn validate_inputs(observations: &ObservationSet, network: &RoadNetwork) -> Diagnostics {
    let mut diag = Diagnostics::new();
    observations.validate_into(&mut diag);
    let mut network_diag = Diagnostics::new();
    network.validate_into(&mut network_diag);
    diag.merge(network_diag);
    diag
}

/// Run the full pass: bring both layers into one CRS, snap every observation
/// and count matches per road.
///
/// Fails with `ReferenceSystemMismatch` when either layer lacks a CRS (or the
/// layers disagree under [`ProjectionTarget::Keep`]) and with
/// `NoEdgesAvailable` when the network has no usable road.
pub fn analyze(
    observations: &ObservationSet,
    network: &RoadNetwork,
    config: &AnalysisConfig,
) -> GeoSnapResult<AnalysisReport> {
    config.validate()?;
    let diag = validate_inputs(observations, network);
    if !diag.is_clean() {
        warn!(summary = %diag.summary(), "input layers have issues");
        for issue in &diag.issues {
            debug!(%issue, "input issue");
        }
    }
    let stats = graph_stats(network);
    debug!(
        junctions = stats.node_count,
        roads = stats.edge_count,
        components = stats.connected_components,
        min_degree = stats.min_degree,
        avg_degree = stats.avg_degree,
        max_degree = stats.max_degree,
        density = stats.density,
        "road network"
    );
    if stats.connected_components > 1 {
        warn!(
            components = stats.connected_components,
            "road network is fragmented; points may snap to isolated roads"
        );
    }
    let reconciled = Reprojector::new().reconcile(observations, network, config.projection)?;

    let snapper = Snapper::new(&reconciled.network, config.snap.clone())?;
    let outcome = snapper.snap(&reconciled.observations)?;
    let aggregates = aggregate_matches(&outcome.matches, &reconciled.network)?;

    info!(
        crs = %reconciled.crs,
        observations = observations.len(),
        matched = outcome.matches.len(),
        unmatched = outcome.unmatched.len(),
        roads_hit = aggregates.len(),
        "analysis complete"
    );

    Ok(AnalysisReport {
        crs: reconciled.crs,
        matches: outcome.matches,
        unmatched: outcome.unmatched,
        aggregates,
    })
}
