//! Unified error type for snapping and aggregation.
//!
//! # Example
//!
//! ```ignore
//! use geosnap_core::{GeoSnapError, GeoSnapResult};
//!
//! fn run(points: &ObservationSet, roads: &RoadNetwork) -> GeoSnapResult<()> {
//!     let crs = ensure_common_crs(points.crs, roads.crs)?;
//!     snap_observations(points, roads, &SnapConfig::default())?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::{Crs, EdgeKey, PointId};

fn describe(crs: &Option<Crs>) -> String {
    match crs {
        Some(crs) => crs.to_string(),
        None => "unknown".to_string(),
    }
}

/// Errors raised by the geosnap crates.
#[derive(Error, Debug)]
pub enum GeoSnapError {
    /// Points and edges are not in one known reference system
    #[error(
        "reference system mismatch: points in {}, edges in {}; reproject first",
        describe(.points),
        describe(.edges)
    )]
    ReferenceSystemMismatch {
        points: Option<Crs>,
        edges: Option<Crs>,
    },

    /// Snapping was attempted against an empty edge set
    #[error("no edges available to snap against")]
    NoEdgesAvailable,

    /// No edge lies within the configured search radius
    #[error("point {point} has no edge within {max_distance}")]
    UnmatchedPoint { point: PointId, max_distance: f64 },

    /// The configured transform cannot convert between the two systems
    #[error("no transform from {from} to {to}")]
    UnsupportedTransform { from: Crs, to: Crs },

    /// A match refers to an edge the network does not contain
    #[error("edge {0} not found in network")]
    UnknownEdge(EdgeKey),

    /// I/O errors (config files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience type alias for Results using GeoSnapError.
pub type GeoSnapResult<T> = Result<T, GeoSnapError>;

impl From<serde_json::Error> for GeoSnapError {
    fn from(err: serde_json::Error) -> Self {
        GeoSnapError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeId;

    #[test]
    fn test_mismatch_display() {
        let err = GeoSnapError::ReferenceSystemMismatch {
            points: Some(Crs::WGS84),
            edges: None,
        };
        let text = err.to_string();
        assert!(text.contains("EPSG:4326"));
        assert!(text.contains("unknown"));
    }

    #[test]
    fn test_unknown_edge_display() {
        let err = GeoSnapError::UnknownEdge(EdgeKey::new(NodeId::new(1), NodeId::new(2), 0));
        assert_eq!(err.to_string(), "edge (1, 2, 0) not found in network");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: GeoSnapError = io_err.into();
        assert!(matches!(err, GeoSnapError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: GeoSnapError = json_err.into();
        assert!(matches!(err, GeoSnapError::Parse(_)));
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> GeoSnapResult<()> {
            Err(GeoSnapError::NoEdgesAvailable)
        }

        fn outer() -> GeoSnapResult<()> {
            inner()?;
            Ok(())
        }

        assert!(matches!(outer(), Err(GeoSnapError::NoEdgesAvailable)));
    }
}
