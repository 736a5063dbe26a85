use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use osmpbf::{Element, ElementReader};
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use crate::bbox::Coordinate;
use crate::way::RawWay;

const KMH_TO_MS: f64 = 1.0 / 3.6;
const MPH_TO_MS: f64 = 0.44704;
const KNOTS_TO_MS: f64 = 0.514444;

/// Parses an OSM `maxspeed` value into m/s.
///
/// Plain numbers are km/h. Values that carry no number (`none`, `walk`,
/// `PL:urban`, ...) yield `0.0`, the unset sentinel.
pub fn parse_max_speed(value: &str) -> f64 {
    let v = value.trim();
    let (number, factor) = if let Some(n) = v.strip_suffix("mph") {
        (n, MPH_TO_MS)
    } else if let Some(n) = v.strip_suffix("knots") {
        (n, KNOTS_TO_MS)
    } else if let Some(n) = v.strip_suffix("km/h") {
        (n, KMH_TO_MS)
    } else {
        (v, KMH_TO_MS)
    };

    match number.trim().parse::<f64>() {
        Ok(speed) if speed.is_finite() && speed > 0.0 => speed * factor,
        _ => 0.0,
    }
}

struct PendingWay {
    id: i64,
    refs: Vec<i64>,
    tags: HashMap<String, String>,
}

/// Reads every way of an `.osm.pbf` file together with its node positions.
///
/// Node positions are taken from the way itself when the file was written with
/// locations on ways; otherwise they are resolved against the file's node table.
pub fn read_ways(pbf_path: impl AsRef<Path>) -> Result<Vec<RawWay>> {
    let pbf_path = pbf_path.as_ref();
    let start_time = Instant::now();

    let reader = ElementReader::from_path(pbf_path)
        .with_context(|| format!("could not open map file {:?}", pbf_path))?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("[{elapsed_precise}] {spinner} {pos} elements - Scanning ways")?,
    );

    let mut nodes: HashMap<i64, Coordinate> = HashMap::new();
    let mut ways: Vec<RawWay> = Vec::new();
    let mut pending: Vec<PendingWay> = Vec::new();

    reader
        .for_each(|element| {
            pb.inc(1);
            match element {
                Element::Node(node) => {
                    nodes.insert(node.id(), Coordinate::new(node.lat(), node.lon()));
                }
                Element::DenseNode(node) => {
                    nodes.insert(node.id(), Coordinate::new(node.lat(), node.lon()));
                }
                Element::Way(way) => {
                    let tags: HashMap<String, String> = way
                        .tags()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect();

                    let located: Vec<Coordinate> = way
                        .node_locations()
                        .map(|loc| Coordinate::new(loc.lat(), loc.lon()))
                        .collect();

                    if !located.is_empty() {
                        ways.push(RawWay {
                            id: way.id(),
                            tags,
                            coordinates: located,
                        });
                    } else {
                        pending.push(PendingWay {
                            id: way.id(),
                            refs: way.refs().collect(),
                            tags,
                        });
                    }
                }
                Element::Relation(_) => {}
            }
        })
        .with_context(|| format!("could not decode map file {:?}", pbf_path))?;

    pb.finish_and_clear();

    debug!(
        "Scanned {} nodes, {} located ways, {} ways to resolve",
        nodes.len(),
        ways.len(),
        pending.len()
    );

    let mut unresolved = 0usize;
    for way in pending {
        let coordinates: Vec<Coordinate> = way
            .refs
            .iter()
            .filter_map(|id| nodes.get(id).copied())
            .collect();
        if coordinates.len() != way.refs.len() {
            unresolved += 1;
        }
        ways.push(RawWay {
            id: way.id,
            tags: way.tags,
            coordinates,
        });
    }

    if unresolved > 0 {
        warn!(
            "{} ways reference nodes missing from {:?}; their geometry is partial",
            unresolved, pbf_path
        );
    }

    info!(
        "Read {} ways from {:?} in {:?}",
        ways.len(),
        pbf_path,
        start_time.elapsed()
    );

    Ok(ways)
}
