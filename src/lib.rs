//! Tile map exporter library
//!
//! Composites decoded terrain tile maps into preview rasters and per-tile
//! manifests. Re-exports modules for use by the binary and integration tests.

pub mod atlas;
pub mod blend;
pub mod blocks;
pub mod color_match;
pub mod compositor;
pub mod config;
pub mod error;
pub mod export;
pub mod manifest;
pub mod map_source;
pub mod masks;
pub mod neighbors;
pub mod terrain;
pub mod terrain_ini;
pub mod tilemap;

pub use error::{ExportError, ExportResult};
