use log::debug;

use crate::bbox::BoundingBox;
use crate::way::{RawWay, SpeedOverrides, Way};

/// Ingested ways with their bounding boxes and the dataset-wide box.
#[derive(Clone, Debug, Default)]
pub struct WayIndex {
    ways: Vec<Way>,
    bounds: Option<BoundingBox>,
    discarded: usize,
}

impl WayIndex {
    /// Indexes raw ways in order. Ways with fewer than two points are dropped.
    pub fn build<I>(raw_ways: I, overrides: &SpeedOverrides) -> Self
    where
        I: IntoIterator<Item = RawWay>,
    {
        let mut index = Self::default();
        for raw in raw_ways {
            index.push(raw, overrides);
        }
        debug!(
            "Indexed {} ways, discarded {}, global bounds {:?}",
            index.ways.len(),
            index.discarded,
            index.bounds
        );
        index
    }

    fn push(&mut self, raw: RawWay, overrides: &SpeedOverrides) {
        if raw.coordinates.len() < 2 {
            self.discarded += 1;
            return;
        }
        let Some(bounds) = BoundingBox::around(&raw.coordinates) else {
            self.discarded += 1;
            return;
        };

        self.bounds = Some(match self.bounds {
            Some(global) => global.union(&bounds),
            None => bounds,
        });
        self.ways.push(Way::from_raw(raw, bounds, overrides));
    }

    pub fn ways(&self) -> &[Way] {
        &self.ways
    }

    /// Box enclosing every indexed way; `None` when no way was kept.
    pub fn bounds(&self) -> Option<BoundingBox> {
        self.bounds
    }

    pub fn discarded(&self) -> usize {
        self.discarded
    }

    pub fn len(&self) -> usize {
        self.ways.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ways.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::Coordinate;

    fn raw(id: i64, points: &[(f64, f64)]) -> RawWay {
        RawWay {
            id,
            coordinates: points
                .iter()
                .map(|&(lat, lon)| Coordinate::new(lat, lon))
                .collect(),
            ..RawWay::default()
        }
    }

    #[test]
    fn test_way_and_global_bounds() {
        let index = WayIndex::build(
            vec![
                raw(1, &[(50.1, 16.2), (50.3, 16.1), (50.2, 16.4)]),
                raw(2, &[(-10.0, 100.0), (-10.5, 100.5)]),
            ],
            &SpeedOverrides::default(),
        );

        assert_eq!(index.len(), 2);
        assert_eq!(
            index.ways()[0].bounds,
            BoundingBox::new(50.1, 16.1, 50.3, 16.4)
        );
        assert_eq!(
            index.ways()[1].bounds,
            BoundingBox::new(-10.5, 100.0, -10.0, 100.5)
        );
        assert_eq!(
            index.bounds(),
            Some(BoundingBox::new(-10.5, 16.1, 50.3, 100.5))
        );
    }

    #[test]
    fn test_short_ways_are_discarded() {
        let index = WayIndex::build(
            vec![raw(1, &[(1.0, 1.0)]), raw(2, &[]), raw(3, &[(1.0, 1.0), (1.1, 1.1)])],
            &SpeedOverrides::default(),
        );
        assert_eq!(index.len(), 1);
        assert_eq!(index.discarded(), 2);
        assert_eq!(index.ways()[0].id, 3);
    }

    #[test]
    fn test_empty_dataset_has_no_bounds() {
        let index = WayIndex::build(Vec::new(), &SpeedOverrides::default());
        assert!(index.is_empty());
        assert!(index.bounds().is_none());
    }
}
