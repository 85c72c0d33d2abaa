//! Neighbor analysis: decides whether a blend applies and which mask it uses
//!
//! Edge blends compare the one neighbor in the blend direction against the
//! tile's base texture. Diagonal blends inspect the corner neighbor plus the
//! two edge neighbors sharing that corner, and pick a mask by how many of
//! them show the descriptor's target texture:
//! - two or more: the `*_corner` mask
//! - exactly one: the plain diagonal mask
//! - none: no blend
//!
//! Texture identity comes from a `TextureProbe`, so the same analysis runs on
//! raw grid values (primary pass) or on the rendered raster (three-way pass).

use crate::atlas::TextureAtlas;
use crate::blend::{DirectionClass, EffectiveDirection, MaskKey};
use crate::terrain::TerrainGrid;
use crate::tilemap::TileCoord;

/// Source of texture identity for a tile coordinate.
pub trait TextureProbe {
    /// Texture name visible at `coord`, `None` if nothing resolves there.
    fn texture_at(&mut self, coord: TileCoord) -> Option<String>;
}

/// Reads texture identity from raw tile values.
pub struct GridProbe<'a> {
    grid: &'a TerrainGrid,
    atlas: &'a TextureAtlas,
}

impl<'a> GridProbe<'a> {
    pub fn new(grid: &'a TerrainGrid, atlas: &'a TextureAtlas) -> Self {
        Self { grid, atlas }
    }
}

impl TextureProbe for GridProbe<'_> {
    fn texture_at(&mut self, coord: TileCoord) -> Option<String> {
        let value = self.grid.tile_value(coord)?;
        let (entry, _) = self.atlas.resolve(u32::from(value))?;
        Some(entry.name.clone())
    }
}

/// Outcome of neighbor analysis for one tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlendContext {
    pub should_blend: bool,
    pub mask_key: Option<MaskKey>,
}

impl BlendContext {
    pub const NONE: BlendContext = BlendContext {
        should_blend: false,
        mask_key: None,
    };

    fn with_mask(key: Option<MaskKey>) -> Self {
        match key {
            Some(key) => Self {
                should_blend: true,
                mask_key: Some(key),
            },
            None => Self::NONE,
        }
    }
}

/// The single neighbor inspected by an edge blend.
pub fn edge_neighbor(coord: TileCoord, direction: EffectiveDirection) -> Option<TileCoord> {
    if direction.class() != DirectionClass::Edge {
        return None;
    }
    let (dx, dy) = direction.unit_offset();
    Some(coord.offset(dx, dy))
}

/// Corner neighbor first, then the vertical and horizontal edge neighbors
/// that share the corner. `None` for edge directions.
pub fn diagonal_neighbors(coord: TileCoord, direction: EffectiveDirection) -> Option<[TileCoord; 3]> {
    if direction.class() != DirectionClass::Diagonal {
        return None;
    }
    let (dx, dy) = direction.unit_offset();
    Some([coord.offset(dx, dy), coord.offset(0, dy), coord.offset(dx, 0)])
}

pub struct NeighborAnalyzer<'a> {
    atlas: &'a TextureAtlas,
}

impl<'a> NeighborAnalyzer<'a> {
    pub fn new(atlas: &'a TextureAtlas) -> Self {
        Self { atlas }
    }

    /// Decide whether a blend towards `direction` applies at `coord`.
    ///
    /// `secondary_tile` is the descriptor's tile value; its texture is the
    /// target a diagonal blend looks for among the neighbors.
    pub fn analyze(
        &self,
        coord: TileCoord,
        direction: EffectiveDirection,
        base_texture: &str,
        secondary_tile: u32,
        probe: &mut dyn TextureProbe,
    ) -> BlendContext {
        match direction.class() {
            DirectionClass::Edge => Self::analyze_edge(coord, direction, base_texture, probe),
            DirectionClass::Diagonal => {
                self.analyze_diagonal(coord, direction, base_texture, secondary_tile, probe)
            }
        }
    }

    fn analyze_edge(
        coord: TileCoord,
        direction: EffectiveDirection,
        base_texture: &str,
        probe: &mut dyn TextureProbe,
    ) -> BlendContext {
        let Some(neighbor) = edge_neighbor(coord, direction) else {
            return BlendContext::NONE;
        };
        match probe.texture_at(neighbor) {
            Some(name) if name != base_texture => BlendContext::with_mask(direction.edge_mask()),
            _ => BlendContext::NONE,
        }
    }

    fn analyze_diagonal(
        &self,
        coord: TileCoord,
        direction: EffectiveDirection,
        base_texture: &str,
        secondary_tile: u32,
        probe: &mut dyn TextureProbe,
    ) -> BlendContext {
        let Some(neighbors) = diagonal_neighbors(coord, direction) else {
            return BlendContext::NONE;
        };

        let candidates: Vec<String> = neighbors
            .iter()
            .filter_map(|&n| probe.texture_at(n))
            .filter(|name| name != base_texture)
            .collect();
        if candidates.is_empty() {
            return BlendContext::NONE;
        }

        let Some((target, _)) = self.atlas.resolve(secondary_tile) else {
            return BlendContext::NONE;
        };

        let matches = candidates.iter().filter(|name| **name == target.name).count();
        match matches {
            0 => BlendContext::NONE,
            1 => BlendContext::with_mask(direction.diagonal_mask()),
            _ => BlendContext::with_mask(direction.corner_mask()),
        }
    }
}
