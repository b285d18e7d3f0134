//! Reprojection between coordinate reference systems.
//!
//! Nearest-road distances are only meaningful in a planar, metric system, so
//! observations and the road network must be brought into one CRS before
//! snapping. This module provides:
//!
//! - [`CoordTransform`]: the seam for plugging in a projection library
//! - [`BuiltinTransform`]: a self-contained implementation for the systems
//!   street-level analyses in Switzerland and elsewhere typically need
//! - [`Reprojector`]: applies one transform uniformly to both layers
//! - [`ensure_common_crs`]: the guard every distance computation goes through
//!
//! ## Built-in systems
//!
//! | CRS | Method | Accuracy |
//! |-----|--------|----------|
//! | EPSG:4326 | pivot (lon/lat degrees) | exact |
//! | EPSG:3857 | spherical Mercator | exact |
//! | EPSG:326zz / 327zz | Transverse Mercator series (Snyder 1987) | < 1 mm within the zone |
//! | EPSG:2056, EPSG:21781 | swisstopo approximate formulas | ~1 m |
//!
//! Any pair is converted through WGS 84. Pairs involving other codes fail
//! with [`GeoSnapError::UnsupportedTransform`].

use geo::Coord;
use geosnap_core::{
    Crs, Degrees, GeoSnapError, GeoSnapResult, ObservationSet, Radians, RoadNetwork,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// WGS 84 semi-major axis (m)
const WGS84_A: f64 = 6_378_137.0;
/// WGS 84 flattening
const WGS84_F: f64 = 1.0 / 298.257_223_563;
/// UTM central scale factor
const UTM_K0: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Converts single coordinates between reference systems.
pub trait CoordTransform: Send + Sync {
    fn transform(&self, coord: Coord<f64>, from: Crs, to: Crs) -> GeoSnapResult<Coord<f64>>;
}

/// Projection formulas for WGS 84, Web Mercator, UTM and the Swiss grids.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTransform;

impl BuiltinTransform {
    /// `coord` in `from` → WGS 84 lon/lat degrees
    fn to_wgs84(&self, coord: Coord<f64>, from: Crs) -> Option<Coord<f64>> {
        match from {
            Crs::WGS84 => Some(coord),
            Crs::WEB_MERCATOR => Some(web_mercator_inverse(coord)),
            Crs::CH1903P_LV95 => Some(swiss_inverse(coord)),
            Crs::CH1903_LV03 => Some(swiss_inverse(Coord {
                x: coord.x + 2_000_000.0,
                y: coord.y + 1_000_000.0,
            })),
            other => other
                .utm_zone()
                .map(|(zone, north)| utm_inverse(coord, zone, north)),
        }
    }

    /// WGS 84 lon/lat degrees → `to`
    fn from_wgs84(&self, lonlat: Coord<f64>, to: Crs) -> Option<Coord<f64>> {
        match to {
            Crs::WGS84 => Some(lonlat),
            Crs::WEB_MERCATOR => Some(web_mercator_forward(lonlat)),
            Crs::CH1903P_LV95 => Some(swiss_forward(lonlat)),
            Crs::CH1903_LV03 => {
                let lv95 = swiss_forward(lonlat);
                Some(Coord {
                    x: lv95.x - 2_000_000.0,
                    y: lv95.y - 1_000_000.0,
                })
            }
            other => other
                .utm_zone()
                .map(|(zone, north)| utm_forward(lonlat, zone, north)),
        }
    }
}

impl CoordTransform for BuiltinTransform {
    fn transform(&self, coord: Coord<f64>, from: Crs, to: Crs) -> GeoSnapResult<Coord<f64>> {
        if from == to {
            return Ok(coord);
        }
        self.to_wgs84(coord, from)
            .and_then(|lonlat| self.from_wgs84(lonlat, to))
            .ok_or(GeoSnapError::UnsupportedTransform { from, to })
    }
}

// =============================================================================
// Projection formulas
// =============================================================================

fn web_mercator_forward(lonlat: Coord<f64>) -> Coord<f64> {
    let lambda = Degrees(lonlat.x).to_radians();
    let phi = Degrees(lonlat.y).to_radians();
    Coord {
        x: WGS84_A * lambda.value(),
        y: WGS84_A * (std::f64::consts::FRAC_PI_4 + phi.value() / 2.0).tan().ln(),
    }
}

fn web_mercator_inverse(xy: Coord<f64>) -> Coord<f64> {
    let lambda = Radians(xy.x / WGS84_A);
    let phi = Radians(2.0 * (xy.y / WGS84_A).exp().atan() - std::f64::consts::FRAC_PI_2);
    Coord {
        x: lambda.to_degrees().value(),
        y: phi.to_degrees().value(),
    }
}

fn utm_central_meridian(zone: u8) -> Radians {
    Degrees(f64::from(zone) * 6.0 - 183.0).to_radians()
}

/// Meridian arc length from the equator to latitude `phi`.
fn meridian_arc(phi: Radians, e2: f64) -> f64 {
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    let phi = phi.value();
    WGS84_A
        * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
}

fn utm_forward(lonlat: Coord<f64>, zone: u8, north: bool) -> Coord<f64> {
    let e2 = WGS84_F * (2.0 - WGS84_F);
    let ep2 = e2 / (1.0 - e2);
    let phi = Degrees(lonlat.y).to_radians();
    let lambda = Degrees(lonlat.x).to_radians();

    let n = WGS84_A / (1.0 - e2 * phi.sin().powi(2)).sqrt();
    let t = phi.tan().powi(2);
    let c = ep2 * phi.cos().powi(2);
    let a = phi.cos() * (lambda - utm_central_meridian(zone)).value();
    let m = meridian_arc(phi, e2);

    let easting = UTM_K0
        * n
        * (a + (1.0 - t + c) * a.powi(3) / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0)
        + UTM_FALSE_EASTING;
    let mut northing = UTM_K0
        * (m + n
            * phi.tan()
            * (a * a / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0));
    if !north {
        northing += UTM_FALSE_NORTHING_SOUTH;
    }
    Coord {
        x: easting,
        y: northing,
    }
}

fn utm_inverse(xy: Coord<f64>, zone: u8, north: bool) -> Coord<f64> {
    let e2 = WGS84_F * (2.0 - WGS84_F);
    let ep2 = e2 / (1.0 - e2);
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    let northing = if north {
        xy.y
    } else {
        xy.y - UTM_FALSE_NORTHING_SOUTH
    };

    let m = northing / UTM_K0;
    let mu = m / (WGS84_A * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));
    let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());
    // footpoint latitude
    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let sin1 = phi1.sin();
    let n1 = WGS84_A / (1.0 - e2 * sin1 * sin1).sqrt();
    let t1 = phi1.tan().powi(2);
    let c1 = ep2 * phi1.cos().powi(2);
    let r1 = WGS84_A * (1.0 - e2) / (1.0 - e2 * sin1 * sin1).powf(1.5);
    let d = (xy.x - UTM_FALSE_EASTING) / (n1 * UTM_K0);

    let phi = phi1
        - (n1 * phi1.tan() / r1)
            * (d * d / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                    * d.powi(6)
                    / 720.0);
    let lambda = utm_central_meridian(zone).value()
        + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1)
                * d.powi(5)
                / 120.0)
            / phi1.cos();

    Coord {
        x: Radians(lambda).to_degrees().value(),
        y: Radians(phi).to_degrees().value(),
    }
}

/// WGS 84 → LV95 (swisstopo approximate formulas, auxiliary values in 10000")
fn swiss_forward(lonlat: Coord<f64>) -> Coord<f64> {
    let phi = (Degrees(lonlat.y).to_arc_seconds() - 169_028.66) / 10_000.0;
    let lambda = (Degrees(lonlat.x).to_arc_seconds() - 26_782.5) / 10_000.0;

    let east = 2_600_072.37 + 211_455.93 * lambda
        - 10_938.51 * lambda * phi
        - 0.36 * lambda * phi * phi
        - 44.54 * lambda.powi(3);
    let north = 1_200_147.07 + 308_807.95 * phi + 3_745.25 * lambda * lambda + 76.63 * phi * phi
        - 194.56 * lambda * lambda * phi
        + 119.79 * phi.powi(3);
    Coord { x: east, y: north }
}

/// LV95 → WGS 84
fn swiss_inverse(en: Coord<f64>) -> Coord<f64> {
    let y = (en.x - 2_600_000.0) / 1_000_000.0;
    let x = (en.y - 1_200_000.0) / 1_000_000.0;

    let lambda = 2.677_909_4 + 4.728_982 * y + 0.791_484 * y * x + 0.130_6 * y * x * x
        - 0.043_6 * y.powi(3);
    let phi = 16.902_389_2 + 3.238_272 * x
        - 0.270_978 * y * y
        - 0.002_528 * x * x
        - 0.044_7 * y * y * x
        - 0.014_0 * x.powi(3);
    // unit 10000" → degrees
    Coord {
        x: lambda * 100.0 / 36.0,
        y: phi * 100.0 / 36.0,
    }
}

/// UTM zone containing a WGS 84 position (no Norway/Svalbard exceptions).
pub fn utm_zone_for(lonlat: Coord<f64>) -> Crs {
    let zone = (((lonlat.x + 180.0) / 6.0).floor() as i64 + 1).clamp(1, 60) as u8;
    Crs::utm(zone, lonlat.y >= 0.0)
}

// =============================================================================
// Layer reprojection
// =============================================================================

/// Where to put both layers before snapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionTarget {
    /// Leave coordinates alone; both layers must already share a CRS.
    Keep,
    /// Reproject both layers to this CRS.
    Epsg(Crs),
    /// Reproject to the UTM zone of the network's centre.
    #[default]
    AutoUtm,
}

/// Both layers in one verified reference system.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub observations: ObservationSet,
    pub network: RoadNetwork,
    pub crs: Crs,
}

/// The only place where points and edges may meet: returns their shared CRS
/// or fails if either is unknown or they differ.
pub fn ensure_common_crs(points: Option<Crs>, edges: Option<Crs>) -> GeoSnapResult<Crs> {
    match (points, edges) {
        (Some(p), Some(e)) if p == e => Ok(p),
        _ => Err(GeoSnapError::ReferenceSystemMismatch { points, edges }),
    }
}

/// Applies a [`CoordTransform`] uniformly to observations and road networks.
#[derive(Debug, Clone, Default)]
pub struct Reprojector<T = BuiltinTransform> {
    transform: T,
}

impl Reprojector<BuiltinTransform> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: CoordTransform> Reprojector<T> {
    pub fn with_transform(transform: T) -> Self {
        Self { transform }
    }

    pub fn reproject_coord(
        &self,
        coord: Coord<f64>,
        from: Crs,
        to: Crs,
    ) -> GeoSnapResult<Coord<f64>> {
        self.transform.transform(coord, from, to)
    }

    /// Fails with `ReferenceSystemMismatch` (points side unknown) when the
    /// set carries no CRS.
    pub fn reproject_observations(
        &self,
        observations: &ObservationSet,
        to: Crs,
    ) -> GeoSnapResult<ObservationSet> {
        let from = observations
            .crs
            .ok_or(GeoSnapError::ReferenceSystemMismatch {
                points: None,
                edges: Some(to),
            })?;
        debug!(
            count = observations.len(),
            %from,
            %to,
            "reprojecting observations"
        );
        let mut projected = observations.clone();
        projected.crs = Some(to);
        for observation in &mut projected.observations {
            observation.coord = self.transform.transform(observation.coord, from, to)?;
        }
        Ok(projected)
    }

    /// Transforms junction coordinates and every road vertex. Fails with
    /// `ReferenceSystemMismatch` (edges side unknown) when the network carries
    /// no CRS.
    pub fn reproject_network(&self, network: &RoadNetwork, to: Crs) -> GeoSnapResult<RoadNetwork> {
        let from = network.crs.ok_or(GeoSnapError::ReferenceSystemMismatch {
            points: Some(to),
            edges: None,
        })?;
        debug!(
            junctions = network.junction_count(),
            roads = network.road_count(),
            %from,
            %to,
            "reprojecting network"
        );
        let mut projected = network.clone();
        projected.crs = Some(to);
        for junction in projected.graph.node_weights_mut() {
            junction.coord = self.transform.transform(junction.coord, from, to)?;
        }
        for road in projected.graph.edge_weights_mut() {
            for coord in road.geometry.0.iter_mut() {
                *coord = self.transform.transform(*coord, from, to)?;
            }
        }
        Ok(projected)
    }

    /// Resolve a [`ProjectionTarget`] to a concrete CRS. `Keep` resolves to
    /// `None`. `AutoUtm` uses the centre of the network extent, falling back
    /// to the observations when the network is empty.
    pub fn resolve_target(
        &self,
        target: ProjectionTarget,
        observations: &ObservationSet,
        network: &RoadNetwork,
    ) -> GeoSnapResult<Option<Crs>> {
        match target {
            ProjectionTarget::Keep => Ok(None),
            ProjectionTarget::Epsg(crs) => Ok(Some(crs)),
            ProjectionTarget::AutoUtm => {
                let (centre, from) = match (network.bounding_rect(), network.crs) {
                    (Some(rect), Some(crs)) => (rect.center(), crs),
                    _ => match (observations.bounding_rect(), observations.crs) {
                        (Some(rect), Some(crs)) => (rect.center(), crs),
                        _ => {
                            return Err(GeoSnapError::Validation(
                                "cannot choose a UTM zone for empty or untagged layers".into(),
                            ))
                        }
                    },
                };
                let lonlat = self.transform.transform(centre, from, Crs::WGS84)?;
                Ok(Some(utm_zone_for(lonlat)))
            }
        }
    }

    /// The single explicit reprojection step: both layers must carry a known
    /// CRS, are brought to `target`, and are then checked to agree.
    pub fn reconcile(
        &self,
        observations: &ObservationSet,
        network: &RoadNetwork,
        target: ProjectionTarget,
    ) -> GeoSnapResult<Reconciled> {
        if observations.crs.is_none() || network.crs.is_none() {
            return Err(GeoSnapError::ReferenceSystemMismatch {
                points: observations.crs,
                edges: network.crs,
            });
        }
        let (observations, network) = match self.resolve_target(target, observations, network)? {
            None => (observations.clone(), network.clone()),
            Some(to) => (
                self.reproject_observations(observations, to)?,
                self.reproject_network(network, to)?,
            ),
        };
        let crs = ensure_common_crs(observations.crs, network.crs)?;
        Ok(Reconciled {
            observations,
            network,
            crs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geosnap_core::{NodeId, Observation, PointId};

    fn close(a: Coord<f64>, b: Coord<f64>, tol: f64) -> bool {
        (a.x - b.x).abs() < tol && (a.y - b.y).abs() < tol
    }

    #[test]
    fn test_utm_on_central_meridian() {
        let xy = utm_forward(Coord { x: 9.0, y: 45.0 }, 32, true);
        assert!(close(xy, Coord { x: 500_000.0, y: 4_982_950.400 }, 0.01));
    }

    #[test]
    fn test_utm_round_trip_both_hemispheres() {
        let t = BuiltinTransform;
        for (lonlat, crs) in [
            (Coord { x: 8.3093, y: 47.0502 }, Crs::utm(32, true)),
            (Coord { x: -70.65, y: -33.45 }, Crs::utm(19, false)),
        ] {
            let xy = t.transform(lonlat, Crs::WGS84, crs).unwrap();
            let back = t.transform(xy, crs, Crs::WGS84).unwrap();
            assert!(close(back, lonlat, 1e-7), "{back:?} != {lonlat:?}");
        }
        let santiago = utm_forward(Coord { x: -70.65, y: -33.45 }, 19, false);
        assert!(santiago.y > 6_000_000.0 && santiago.y < 7_000_000.0);
    }

    #[test]
    fn test_swiss_reference_point() {
        // swisstopo worked example: 46°2'38.87" N, 8°43'49.79" E
        let lonlat = Coord {
            x: 8.0 + 43.0 / 60.0 + 49.79 / 3600.0,
            y: 46.0 + 2.0 / 60.0 + 38.87 / 3600.0,
        };
        let t = BuiltinTransform;
        let lv95 = t.transform(lonlat, Crs::WGS84, Crs::CH1903P_LV95).unwrap();
        assert!(close(lv95, Coord { x: 2_699_999.76, y: 1_099_999.97 }, 0.05));
        let lv03 = t.transform(lonlat, Crs::WGS84, Crs::CH1903_LV03).unwrap();
        assert!(close(lv03, Coord { x: 699_999.76, y: 99_999.97 }, 0.05));
    }

    #[test]
    fn test_swiss_round_trip_through_pivot() {
        let t = BuiltinTransform;
        let lucerne = Coord { x: 2_666_156.86, y: 1_211_385.54 };
        let lonlat = t.transform(lucerne, Crs::CH1903P_LV95, Crs::WGS84).unwrap();
        assert!(close(lonlat, Coord { x: 8.3093, y: 47.0502 }, 1e-4));

        // LV95 → UTM goes through WGS 84 without complaint
        let utm = t.transform(lucerne, Crs::CH1903P_LV95, Crs::utm(32, true)).unwrap();
        assert!(close(utm, Coord { x: 447_538.4, y: 5_210_974.1 }, 2.0));
    }

    #[test]
    fn test_web_mercator() {
        let t = BuiltinTransform;
        let edge = t
            .transform(Coord { x: 180.0, y: 0.0 }, Crs::WGS84, Crs::WEB_MERCATOR)
            .unwrap();
        assert!((edge.x - 20_037_508.342_789_244).abs() < 1e-6);
        assert!(edge.y.abs() < 1e-6);

        let p = Coord { x: 8.3, y: 47.05 };
        let xy = t.transform(p, Crs::WGS84, Crs::WEB_MERCATOR).unwrap();
        let back = t.transform(xy, Crs::WEB_MERCATOR, Crs::WGS84).unwrap();
        assert!(close(back, p, 1e-9));
    }

    #[test]
    fn test_unsupported_transform() {
        let err = BuiltinTransform
            .transform(Coord { x: 0.0, y: 0.0 }, Crs::epsg(27700), Crs::WGS84)
            .unwrap_err();
        assert!(matches!(
            err,
            GeoSnapError::UnsupportedTransform { from, .. } if from == Crs::epsg(27700)
        ));
    }

    #[test]
    fn test_utm_zone_for() {
        assert_eq!(utm_zone_for(Coord { x: 8.3, y: 47.0 }), Crs::utm(32, true));
        assert_eq!(utm_zone_for(Coord { x: -180.0, y: -1.0 }), Crs::utm(1, false));
        assert_eq!(utm_zone_for(Coord { x: 180.0, y: 10.0 }), Crs::utm(60, true));
    }

    #[test]
    fn test_ensure_common_crs() {
        assert_eq!(
            ensure_common_crs(Some(Crs::WGS84), Some(Crs::WGS84)).unwrap(),
            Crs::WGS84
        );
        assert!(matches!(
            ensure_common_crs(Some(Crs::WGS84), Some(Crs::CH1903P_LV95)),
            Err(GeoSnapError::ReferenceSystemMismatch { .. })
        ));
        assert!(matches!(
            ensure_common_crs(None, None),
            Err(GeoSnapError::ReferenceSystemMismatch { points: None, edges: None })
        ));
    }

    fn lucerne_layers() -> (ObservationSet, RoadNetwork) {
        let mut network = RoadNetwork::with_crs(Crs::WGS84);
        network.add_junction(NodeId::new(1), Coord { x: 8.30, y: 47.05 });
        network.add_junction(NodeId::new(2), Coord { x: 8.31, y: 47.05 });
        network
            .add_road(NodeId::new(1), NodeId::new(2), None)
            .unwrap();

        let mut accidents = ObservationSet::with_crs(Crs::CH1903P_LV95);
        accidents.push(Observation::new(PointId::new(0), 2_666_156.86, 1_211_385.54));
        (accidents, network)
    }

    #[test]
    fn test_reconcile_auto_utm() {
        let (accidents, network) = lucerne_layers();
        let reconciled = Reprojector::new()
            .reconcile(&accidents, &network, ProjectionTarget::AutoUtm)
            .unwrap();
        assert_eq!(reconciled.crs, Crs::utm(32, true));
        assert_eq!(reconciled.network.crs, Some(Crs::utm(32, true)));

        // junction and road vertex move together
        let junction = reconciled.network.junction(NodeId::new(1)).unwrap().coord;
        let road = reconciled.network.roads().next().unwrap();
        assert_eq!(road.geometry.0[0], junction);
        assert!(junction.x > 100_000.0);
    }

    #[test]
    fn test_reconcile_keep_rejects_mixed_systems() {
        let (accidents, network) = lucerne_layers();
        let err = Reprojector::new()
            .reconcile(&accidents, &network, ProjectionTarget::Keep)
            .unwrap_err();
        assert!(matches!(err, GeoSnapError::ReferenceSystemMismatch { .. }));
    }

    #[test]
    fn test_reconcile_requires_known_crs() {
        let (mut accidents, network) = lucerne_layers();
        accidents.crs = None;
        let err = Reprojector::new()
            .reconcile(&accidents, &network, ProjectionTarget::Epsg(Crs::CH1903P_LV95))
            .unwrap_err();
        assert!(matches!(
            err,
            GeoSnapError::ReferenceSystemMismatch { points: None, .. }
        ));
    }

    #[test]
    fn test_projection_target_config_names() {
        let keep: ProjectionTarget = serde_json::from_str("\"keep\"").unwrap();
        assert_eq!(keep, ProjectionTarget::Keep);
        let lv95: ProjectionTarget = serde_json::from_str(r#"{"epsg":"EPSG:2056"}"#).unwrap();
        assert_eq!(lv95, ProjectionTarget::Epsg(Crs::CH1903P_LV95));
        assert_eq!(ProjectionTarget::default(), ProjectionTarget::AutoUtm);
    }
}
