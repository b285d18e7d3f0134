use std::io::Write;

use geosnap_algo::{AnalysisConfig, DistanceMetric, ProjectionTarget};
use geosnap_core::{Crs, GeoSnapError};
use tempfile::NamedTempFile;

#[test]
fn test_load_config_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "projection": {{"epsg": "EPSG:21781"}},
            "snap": {{"metric": "euclidean", "max_distance": 30.0, "parallel": false}}
        }}"#
    )
    .unwrap();

    let config = AnalysisConfig::from_path(file.path()).unwrap();
    assert_eq!(config.projection, ProjectionTarget::Epsg(Crs::CH1903_LV03));
    assert_eq!(config.snap.metric, DistanceMetric::Euclidean);
    assert_eq!(config.snap.max_distance, Some(30.0));
    assert!(!config.snap.parallel);
    assert_eq!(config.snap.tie_epsilon, 1e-9);
}

#[test]
fn test_empty_object_gives_defaults() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"{}").unwrap();
    let config = AnalysisConfig::from_path(file.path()).unwrap();
    assert_eq!(config, AnalysisConfig::default());
}

#[test]
fn test_invalid_file_contents() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(br#"{"snap": {"candidate_pool": 0}}"#).unwrap();
    let err = AnalysisConfig::from_path(file.path()).unwrap_err();
    assert!(matches!(err, GeoSnapError::Config(_)));

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(br#"{"projection": {"epsg": "EPSG:abc"}}"#).unwrap();
    let err = AnalysisConfig::from_path(file.path()).unwrap_err();
    assert!(matches!(err, GeoSnapError::Parse(_)));
}

#[test]
fn test_config_round_trips_through_json() {
    let config = AnalysisConfig::default().with_projection(ProjectionTarget::Keep);
    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(AnalysisConfig::from_json_str(&json).unwrap(), config);
}
