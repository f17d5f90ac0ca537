//! A Rust library for cutting an area of interest into the tiles of a processing grid.
//!
//! An area of interest (a table, a bounding box, GeoJSON, a vector file or a polygon)
//! and a tiling grid (a table, a GeoParquet URL, a vector file, the `"EU"` LAEA grid or
//! the `"global"` grid from managed storage) are normalized to EPSG:4326 and
//! intersected. Every overlapping tile becomes one row of a job table that a batch-job
//! manager can consume directly.

pub mod aoi;
pub mod config;
pub mod error;
pub mod grid;
pub mod http;
pub mod job;
pub mod projection;
pub mod reader;
pub mod storage;
pub mod table;
pub mod tiler;

pub use aoi::{AoiFeature, AoiLayer, AoiSource, load_aoi};
pub use config::*;
pub use error::*;
pub use grid::{GridLoader, GridSource, GridTile, TilingGrid, load_grid};
pub use job::*;
pub use storage::*;
pub use table::*;
pub use tiler::{Tiler, tile};
