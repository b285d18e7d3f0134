//! Coordinate reference system tags.
//!
//! Every observation set and every road network carries an explicit
//! [`Crs`]. There is no process-wide default: data without a tag is treated
//! as "unknown" and cannot take part in distance computations until it has
//! been assigned one.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::GeoSnapError;

/// A coordinate reference system identified by its EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Crs(u32);

impl Crs {
    /// WGS 84 longitude/latitude in degrees.
    pub const WGS84: Crs = Crs(4326);
    /// Spherical ("Web") Mercator in metres.
    pub const WEB_MERCATOR: Crs = Crs(3857);
    /// Swiss CH1903 / LV03 in metres (y east, x north).
    pub const CH1903_LV03: Crs = Crs(21781);
    /// Swiss CH1903+ / LV95 in metres.
    pub const CH1903P_LV95: Crs = Crs(2056);

    #[inline]
    pub const fn epsg(code: u32) -> Self {
        Crs(code)
    }

    /// WGS 84 / UTM zone `zone` (1..=60), northern or southern hemisphere.
    pub fn utm(zone: u8, north: bool) -> Self {
        let base = if north { 32600 } else { 32700 };
        Crs(base + u32::from(zone))
    }

    #[inline]
    pub const fn code(&self) -> u32 {
        self.0
    }

    /// Returns `(zone, north)` if this is a WGS 84 UTM system.
    pub fn utm_zone(&self) -> Option<(u8, bool)> {
        match self.0 {
            32601..=32660 => Some(((self.0 - 32600) as u8, true)),
            32701..=32760 => Some(((self.0 - 32700) as u8, false)),
            _ => None,
        }
    }

    /// True for angular (degree-based) systems.
    pub fn is_geographic(&self) -> bool {
        matches!(self.0, 4326 | 4258 | 4269 | 4150)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

impl FromStr for Crs {
    type Err = GeoSnapError;

    /// Accepts `EPSG:2056`, `epsg:2056` and a bare `2056`.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let digits = match trimmed.split_once(':') {
            Some((authority, code)) if authority.eq_ignore_ascii_case("epsg") => code,
            Some((authority, _)) => {
                return Err(GeoSnapError::Parse(format!(
                    "unsupported CRS authority '{authority}'"
                )))
            }
            None => trimmed,
        };
        digits
            .trim()
            .parse::<u32>()
            .map(Crs)
            .map_err(|_| GeoSnapError::Parse(format!("invalid EPSG code '{input}'")))
    }
}

impl TryFrom<String> for Crs {
    type Error = GeoSnapError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Crs> for String {
    fn from(crs: Crs) -> Self {
        crs.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variants() {
        assert_eq!("EPSG:2056".parse::<Crs>().unwrap(), Crs::CH1903P_LV95);
        assert_eq!("epsg:4326".parse::<Crs>().unwrap(), Crs::WGS84);
        assert_eq!("21781".parse::<Crs>().unwrap(), Crs::CH1903_LV03);
        assert!("ESRI:102100".parse::<Crs>().is_err());
        assert!("EPSG:abc".parse::<Crs>().is_err());
    }

    #[test]
    fn test_utm_codes() {
        let crs = Crs::utm(32, true);
        assert_eq!(crs.code(), 32632);
        assert_eq!(crs.utm_zone(), Some((32, true)));
        assert_eq!(Crs::utm(19, false).utm_zone(), Some((19, false)));
        assert_eq!(Crs::WGS84.utm_zone(), None);
    }

    #[test]
    fn test_geographic_flag() {
        assert!(Crs::WGS84.is_geographic());
        assert!(!Crs::CH1903P_LV95.is_geographic());
        assert!(!Crs::utm(32, true).is_geographic());
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&Crs::CH1903P_LV95).unwrap();
        assert_eq!(json, "\"EPSG:2056\"");
        let back: Crs = serde_json::from_str("\"epsg:3857\"").unwrap();
        assert_eq!(back, Crs::WEB_MERCATOR);
    }
}
