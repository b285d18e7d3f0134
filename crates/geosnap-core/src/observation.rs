//! Point observations (accidents, sensor readings, stops) to be snapped.

use geo::{Coord, Rect};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::{Attributes, Category, Crs, Diagnostics, PointId, Subject};

/// A single observation with a 2D coordinate and an opaque payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: PointId,
    pub coord: Coord<f64>,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

impl Observation {
    pub fn new(id: PointId, x: f64, y: f64) -> Self {
        Self {
            id,
            coord: Coord { x, y },
            attributes: Attributes::new(),
        }
    }

    /// Attach a payload field; the core never interprets it.
    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

/// An ordered collection of observations sharing one reference system.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationSet {
    pub crs: Option<Crs>,
    pub observations: Vec<Observation>,
}

impl ObservationSet {
    /// Empty set with an unknown reference system.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_crs(crs: Crs) -> Self {
        Self {
            crs: Some(crs),
            observations: Vec::new(),
        }
    }

    /// Build a set from bare coordinates, numbering points from zero.
    pub fn from_coords<I>(crs: Option<Crs>, coords: I) -> Self
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let observations = coords
            .into_iter()
            .enumerate()
            .map(|(i, (x, y))| Observation::new(PointId::new(i as u64), x, y))
            .collect();
        Self { crs, observations }
    }

    pub fn push(&mut self, observation: Observation) {
        self.observations.push(observation);
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Observation> {
        self.observations.iter()
    }

    /// Axis-aligned extent of all finite coordinates.
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        let mut coords = self
            .observations
            .iter()
            .map(|o| o.coord)
            .filter(|c| c.x.is_finite() && c.y.is_finite());
        let first = coords.next()?;
        let (min, max) = coords.fold((first, first), |(min, max), c| {
            (
                Coord {
                    x: min.x.min(c.x),
                    y: min.y.min(c.y),
                },
                Coord {
                    x: max.x.max(c.x),
                    y: max.y.max(c.y),
                },
            )
        });
        Some(Rect::new(min, max))
    }

    /// Record missing CRS, duplicate ids and non-finite coordinates.
    pub fn validate_into(&self, diag: &mut Diagnostics) {
        if self.crs.is_none() {
            diag.warning(Category::Reference, Subject::Observations, "no reference system");
        }

        let mut seen = HashSet::with_capacity(self.observations.len());
        for observation in &self.observations {
            let subject = Subject::Point(observation.id);
            if !seen.insert(observation.id) {
                diag.error(Category::Structure, subject, "duplicate point id");
            }
            if !(observation.coord.x.is_finite() && observation.coord.y.is_finite()) {
                diag.error(Category::Geometry, subject, "non-finite coordinate");
            }
        }
    }
}
