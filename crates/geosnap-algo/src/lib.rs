//! # geosnap-algo: Snapping and Aggregation
//!
//! Assigns point observations to the nearest road of a [`RoadNetwork`] and
//! summarises them per road.
//!
//! ## Pipeline
//!
//! | Stage | Entry point | Fails with |
//! |-------|-------------|------------|
//! | Reproject | [`Reprojector::reconcile`] | `ReferenceSystemMismatch`, `UnsupportedTransform` |
//! | Snap | [`Snapper::snap`], [`snap_observations`] | `ReferenceSystemMismatch`, `NoEdgesAvailable` |
//! | Aggregate | [`aggregate_matches`] | `UnknownEdge` |
//!
//! [`analyze`] runs all three with one [`AnalysisConfig`].
//!
//! ### Snapping
//!
//! Road polylines are split into segments and bulk-loaded into an R-tree.
//! The distance from a point to a road is the distance to its closest
//! segment, with projections clamped to the segment ends. Equidistant roads
//! (within `tie_epsilon`) resolve to the smallest [`EdgeKey`].
//!
//! With the `parallel` feature (default) queries run on the rayon pool; the
//! output order is the input order either way.
//!
//! ## Example
//!
//! ```ignore
//! use geosnap_algo::{analyze, AnalysisConfig, ProjectionTarget, SnapConfig};
//! use geosnap_core::Crs;
//!
//! let config = AnalysisConfig::default()
//!     .with_projection(ProjectionTarget::Epsg(Crs::CH1903P_LV95))
//!     .with_snap(SnapConfig::default().with_max_distance(50.0));
//!
//! let report = analyze(&accidents, &streets, &config)?;
//! for row in report.aggregates.ranked().iter().take(10) {
//!     println!("{}: {} accidents", row.edge, row.count);
//! }
//! ```
//!
//! [`RoadNetwork`]: geosnap_core::RoadNetwork
//! [`EdgeKey`]: geosnap_core::EdgeKey

pub mod aggregate;
pub mod index;
pub mod pipeline;
pub mod reproject;
pub mod snap;

pub use aggregate::{aggregate_matches, AggregateTable, EdgeAggregate};
pub use index::{closest_on_segment, RoadIndex};
pub use pipeline::{analyze, validate_inputs, AnalysisConfig, AnalysisReport};
pub use reproject::{
    ensure_common_crs, utm_zone_for, BuiltinTransform, CoordTransform, ProjectionTarget,
    Reconciled, Reprojector,
};
pub use snap::{
    snap_observations, Candidate, DistanceMetric, Match, SnapConfig, SnapOutcome, Snapper,
    Unmatched,
};
