//! Offline road tiles.
//!
//! Partitions OpenStreetMap ways into a fixed latitude/longitude grid and
//! writes each cell as a self-contained binary tile, so a device without
//! network access can fetch the roads around a position with a single file read.
//!
//! Build: [`osm::read_ways`] → [`indexer::WayIndex`] → [`assigner::TileAssigner`]
//! → [`codec::encode`] → [`store::TileStore::write_tile`], driven by
//! [`builder::OfflineBuilder`]. Query: [`store::TileStore::find_tile_for_point`].

pub mod assigner;
pub mod bbox;
pub mod builder;
pub mod codec;
pub mod config;
pub mod error;
pub mod grid;
pub mod indexer;
pub mod osm;
pub mod store;
pub mod way;

pub use bbox::{BoundingBox, Coordinate, overlaps, point_in_box};
pub use builder::{BuildReport, OfflineBuilder};
pub use codec::TileFile;
pub use config::{AssignStrategy, BoundaryPolicy, BuildOptions, GenerationWindow, GridConfig};
pub use error::TileError;
pub use grid::{Cell, Grid};
pub use indexer::WayIndex;
pub use store::{TileLookup, TileStore};
pub use way::{RawWay, SpeedLimits, SpeedOverrides, Way};
