use log::debug;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::bbox::{BoundingBox, Coordinate};
use crate::codec::TileFile;
use crate::config::GridConfig;
use crate::error::TileError;
use crate::grid::{Cell, Grid};

/// Result of a point lookup.
#[derive(Debug, PartialEq)]
pub enum TileLookup {
    /// Raw bytes of the tile covering the point. A tile may hold zero ways.
    Tile { cell: Cell, bytes: Vec<u8> },
    /// No grid cell contains the point under the configured boundary policy.
    OutsideGrid,
    /// The covering cell has no tile on disk; it was never generated.
    NotGenerated { cell: Cell, path: PathBuf },
}

impl TileLookup {
    /// Plain bytes view: the tile bytes, or an empty buffer when there is no tile.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            TileLookup::Tile { bytes, .. } => bytes,
            TileLookup::OutsideGrid | TileLookup::NotGenerated { .. } => Vec::new(),
        }
    }
}

/// The on-disk tile tree: `<root>/<groupLat>/<groupLon>/<minLat>_<minLon>_<maxLat>_<maxLon>`.
///
/// Paths are always recomputed from cell bounds; no index file exists.
#[derive(Clone, Debug)]
pub struct TileStore {
    root: PathBuf,
    group_degrees: u32,
    grid: Grid,
}

impl TileStore {
    pub fn new(root: impl Into<PathBuf>, config: &GridConfig) -> Result<Self, TileError> {
        Ok(Self {
            root: root.into(),
            group_degrees: config.group_degrees,
            grid: Grid::new(config)?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn ensure_root(&self) -> Result<(), TileError> {
        fs::create_dir_all(&self.root).map_err(|e| TileError::io(&self.root, e))
    }

    pub fn shard_dir(&self, bounds: &BoundingBox) -> PathBuf {
        let group = self.group_degrees as i64;
        let group_lat = (bounds.min_lat / group as f64).floor() as i64 * group;
        let group_lon = (bounds.min_lon / group as f64).floor() as i64 * group;
        self.root
            .join(group_lat.to_string())
            .join(group_lon.to_string())
    }

    pub fn resolve_path(&self, bounds: &BoundingBox) -> PathBuf {
        self.shard_dir(bounds).join(tile_file_name(bounds))
    }

    /// Writes a tile atomically: temporary sibling, fsync, rename over the final path.
    pub fn write_tile(&self, bounds: &BoundingBox, data: &[u8]) -> Result<PathBuf, TileError> {
        let dir = self.shard_dir(bounds);
        fs::create_dir_all(&dir).map_err(|e| TileError::io(&dir, e))?;

        let name = tile_file_name(bounds);
        let path = dir.join(&name);
        let tmp_path = dir.join(format!("{}.tmp", name));

        let written = File::create(&tmp_path).and_then(|mut file| {
            file.write_all(data)?;
            file.sync_all()
        });
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(TileError::io(&tmp_path, e));
        }

        if let Err(e) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(TileError::io(&path, e));
        }
        debug!("Wrote {} bytes to {:?}", data.len(), path);
        Ok(path)
    }

    /// Flushes the root directory so a finished build survives a crash.
    pub fn sync_root(&self) -> Result<(), TileError> {
        let dir = File::open(&self.root).map_err(|e| TileError::io(&self.root, e))?;
        dir.sync_all().map_err(|e| TileError::io(&self.root, e))
    }

    pub fn find_tile_for_point(&self, lat: f64, lon: f64) -> Result<TileLookup, TileError> {
        let Some(cell) = self.grid.cell_containing(Coordinate::new(lat, lon)) else {
            return Ok(TileLookup::OutsideGrid);
        };

        let path = self.resolve_path(&cell.bounds);
        debug!("Loading tile file {:?}", path);
        match fs::read(&path) {
            Ok(bytes) => Ok(TileLookup::Tile { cell, bytes }),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Ok(TileLookup::NotGenerated { cell, path })
            }
            Err(e) => Err(TileError::io(path, e)),
        }
    }

    /// Looks up and decodes the tile covering a point; `None` when there is no tile.
    pub fn load_tile_for_point(&self, lat: f64, lon: f64) -> Result<Option<TileFile>, TileError> {
        match self.find_tile_for_point(lat, lon)? {
            TileLookup::Tile { bytes, .. } => TileFile::decode(&bytes).map(Some),
            TileLookup::OutsideGrid | TileLookup::NotGenerated { .. } => Ok(None),
        }
    }
}

fn tile_file_name(bounds: &BoundingBox) -> String {
    format!(
        "{:.6}_{:.6}_{:.6}_{:.6}",
        bounds.min_lat, bounds.min_lon, bounds.max_lat, bounds.max_lon
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::config::BoundaryPolicy;

    fn store(root: &Path) -> TileStore {
        TileStore::new(root, &GridConfig::default()).unwrap()
    }

    #[test]
    fn test_path_scheme() {
        let store = store(Path::new("/offline"));

        assert_eq!(
            store.resolve_path(&BoundingBox::new(50.25, 16.5, 50.5, 16.75)),
            PathBuf::from("/offline/50/16/50.250000_16.500000_50.500000_16.750000")
        );
        assert_eq!(
            store.resolve_path(&BoundingBox::new(51.0, 17.0, 51.25, 17.25)),
            PathBuf::from("/offline/50/16/51.000000_17.000000_51.250000_17.250000")
        );
        assert_eq!(
            store.resolve_path(&BoundingBox::new(-0.25, -180.0, 0.0, -179.75)),
            PathBuf::from("/offline/-2/-180/-0.250000_-180.000000_0.000000_-179.750000")
        );
    }

    #[test]
    fn test_path_is_deterministic() {
        let store = store(Path::new("offline"));
        let bounds = BoundingBox::new(-33.75, 151.0, -33.5, 151.25);
        assert_eq!(store.resolve_path(&bounds), store.resolve_path(&bounds));
    }

    #[test]
    fn test_write_then_find() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.ensure_root().unwrap();

        let cell = store
            .grid()
            .cell_containing(Coordinate::new(50.6, 16.6))
            .unwrap();
        let bytes = codec::encode(cell.bounds, 0.01, &[]).unwrap();
        let path = store.write_tile(&cell.bounds, &bytes).unwrap();
        store.sync_root().unwrap();

        assert!(path.exists());
        assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);

        match store.find_tile_for_point(50.6, 16.6).unwrap() {
            TileLookup::Tile { cell: found, bytes: read } => {
                assert_eq!(found, cell);
                assert_eq!(read, bytes);
            }
            other => panic!("unexpected lookup result {:?}", other),
        }

        let tile = store.load_tile_for_point(50.6, 16.6).unwrap().unwrap();
        assert!(tile.ways.is_empty());
    }

    #[test]
    fn test_rewrite_replaces_tile() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let bounds = BoundingBox::new(0.0, 0.0, 0.25, 0.25);

        store.write_tile(&bounds, b"first version").unwrap();
        let path = store.write_tile(&bounds, b"second").unwrap();
        assert_eq!(fs::read(path).unwrap(), b"second");
    }

    #[test]
    fn test_missing_tile_is_not_generated() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let lookup = store.find_tile_for_point(10.1, 10.1).unwrap();
        assert!(matches!(lookup, TileLookup::NotGenerated { .. }));
        assert!(lookup.into_bytes().is_empty());
        assert!(store.load_tile_for_point(10.1, 10.1).unwrap().is_none());
    }

    #[test]
    fn test_strict_lookup_on_grid_line() {
        let dir = tempfile::tempdir().unwrap();
        let config = GridConfig {
            boundary_policy: BoundaryPolicy::Strict,
            ..GridConfig::default()
        };
        let store = TileStore::new(dir.path(), &config).unwrap();

        assert_eq!(
            store.find_tile_for_point(0.0, 0.0).unwrap(),
            TileLookup::OutsideGrid
        );
        assert_eq!(
            store.find_tile_for_point(91.0, 0.0).unwrap(),
            TileLookup::OutsideGrid
        );
    }

    #[test]
    fn test_far_out_of_range_lookup_is_outside_grid() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        for (lat, lon) in [(1e300, 0.0), (-1e300, 0.0), (0.0, 1e300), (0.0, -1e300)] {
            assert_eq!(
                store.find_tile_for_point(lat, lon).unwrap(),
                TileLookup::OutsideGrid
            );
        }
    }

    #[test]
    fn test_failed_write_leaves_no_temporary_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let bounds = BoundingBox::new(0.0, 0.0, 0.25, 0.25);

        // A non-empty directory at the final path makes the rename fail.
        let path = store.resolve_path(&bounds);
        fs::create_dir_all(path.join("occupied")).unwrap();

        let err = store.write_tile(&bounds, b"data").unwrap_err();
        assert!(matches!(err, TileError::Io { .. }));

        let leftovers: Vec<_> = fs::read_dir(store.shard_dir(&bounds))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .filter(|name| name.to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "{:?}", leftovers);
    }
}
