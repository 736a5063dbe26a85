use anyhow::{Context, Result};
use geo::algorithm::Distance;
use geo::{Haversine, LineString, Point};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::bbox::{BoundingBox, Coordinate};
use crate::osm::parse_max_speed;

/// Speed attributes of a way in m/s. `0.0` means the tag was absent or unparseable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeedLimits {
    pub max_speed: f64,
    pub advisory: f64,
    pub practical: f64,
    pub practical_forward: f64,
    pub practical_backward: f64,
    pub forward: f64,
    pub backward: f64,
}

impl SpeedLimits {
    pub fn from_tags(tags: &HashMap<String, String>) -> Self {
        let speed = |key: &str| tags.get(key).map(|v| parse_max_speed(v)).unwrap_or(0.0);
        Self {
            max_speed: speed("maxspeed"),
            advisory: speed("maxspeed:advisory"),
            practical: speed("maxspeed:practical"),
            practical_forward: speed("maxspeed:practical:forward"),
            practical_backward: speed("maxspeed:practical:backward"),
            forward: speed("maxspeed:forward"),
            backward: speed("maxspeed:backward"),
        }
    }
}

/// A way as handed over by the map-data reader, before indexing.
#[derive(Clone, Debug, Default)]
pub struct RawWay {
    pub id: i64,
    pub tags: HashMap<String, String>,
    pub coordinates: Vec<Coordinate>,
}

/// A road segment as stored in tile files.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Way {
    pub id: i64,
    pub bounds: BoundingBox,
    pub name: String,
    pub reference: String,
    pub hazard: String,
    pub speeds: SpeedLimits,
    pub lanes: u8,
    pub one_way: bool,
    pub coordinates: Vec<Coordinate>,
}

impl Way {
    /// Builds a way from raw tags, applying the practical-speed override if one exists.
    pub fn from_raw(raw: RawWay, bounds: BoundingBox, overrides: &SpeedOverrides) -> Self {
        let RawWay {
            id,
            mut tags,
            coordinates,
        } = raw;

        let mut speeds = SpeedLimits::from_tags(&tags);
        if let Some(practical) = overrides.practical_speed(id) {
            speeds.practical = practical;
        }

        let lanes = tags
            .get("lanes")
            .and_then(|v| v.trim().parse::<u8>().ok())
            .unwrap_or(0);
        let one_way = tags.get("oneway").is_some_and(|v| v == "yes");

        Self {
            id,
            bounds,
            name: tags.remove("name").unwrap_or_default(),
            reference: tags.remove("ref").unwrap_or_default(),
            hazard: tags.remove("hazard").unwrap_or_default(),
            speeds,
            lanes,
            one_way,
            coordinates,
        }
    }

    pub fn line_string(&self) -> LineString<f64> {
        LineString::from(
            self.coordinates
                .iter()
                .map(|&c| geo::Coord::from(c))
                .collect::<Vec<_>>(),
        )
    }

    /// Geodesic length in meters.
    pub fn length(&self) -> f64 {
        self.line_string()
            .lines()
            .map(|segment| {
                Haversine.distance(Point::from(segment.start), Point::from(segment.end))
            })
            .sum()
    }
}

const BUNDLED_OVERRIDES: &str = include_str!("../data/speed_overrides.json");

/// Read-only lookup of practical speed overrides in km/h, keyed by way id.
#[derive(Clone, Debug, Default)]
pub struct SpeedOverrides {
    by_way: HashMap<i64, f64>,
}

impl SpeedOverrides {
    /// Loads a JSON object mapping way ids to km/h, e.g. `{"28345080": 65}`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read(path)
            .with_context(|| format!("could not read speed overrides {:?}", path))?;
        let by_way: HashMap<i64, f64> = serde_json::from_slice(&contents)
            .with_context(|| format!("could not parse speed overrides {:?}", path))?;
        Ok(Self { by_way })
    }

    /// The override table shipped with the crate in `data/speed_overrides.json`.
    pub fn bundled() -> Result<Self> {
        let by_way: HashMap<i64, f64> = serde_json::from_str(BUNDLED_OVERRIDES)
            .context("could not parse bundled speed overrides")?;
        Ok(Self { by_way })
    }

    pub fn len(&self) -> usize {
        self.by_way.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_way.is_empty()
    }

    pub fn kmh(&self, way_id: i64) -> Option<f64> {
        self.by_way.get(&way_id).copied()
    }

    /// Override converted to m/s.
    pub fn practical_speed(&self, way_id: i64) -> Option<f64> {
        self.kmh(way_id).map(|kmh| kmh / 3.6)
    }
}

impl FromIterator<(i64, f64)> for SpeedOverrides {
    fn from_iter<I: IntoIterator<Item = (i64, f64)>>(iter: I) -> Self {
        Self {
            by_way: iter.into_iter().collect(),
        }
    }
}
