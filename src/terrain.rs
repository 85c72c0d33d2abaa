//! Read-only terrain tile grid with its two blend layers.

use thiserror::Error;

use crate::tilemap::{TileCoord, Tilemap};

/// Why a set of layers does not form a valid grid.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("map dimensions must be non-zero, got {width}x{height}")]
    EmptyDimensions { width: usize, height: usize },

    #[error("{layer} layer must hold {expected} values, got {actual}")]
    LayerLength {
        layer: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Which blend layer a pass reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlendLayer {
    Primary,
    ThreeWay,
}

impl BlendLayer {
    pub fn label(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::ThreeWay => "three-way",
        }
    }
}

/// Tile values plus the primary and three-way blend-descriptor indices.
/// A blend index of 0 means "no blend at this tile".
#[derive(Clone, Debug)]
pub struct TerrainGrid {
    tiles: Tilemap<u16>,
    primary: Tilemap<u32>,
    three_way: Tilemap<u32>,
}

impl TerrainGrid {
    /// Build from row-major layers. Empty blend layers are treated as all-zero.
    pub fn new(
        width: usize,
        height: usize,
        tiles: Vec<u16>,
        primary: Vec<u32>,
        three_way: Vec<u32>,
    ) -> Result<Self, GridError> {
        if width == 0 || height == 0 {
            return Err(GridError::EmptyDimensions { width, height });
        }
        let actual = tiles.len();
        let tiles = Tilemap::from_vec(width, height, tiles).ok_or(GridError::LayerLength {
            layer: "tile",
            expected: width * height,
            actual,
        })?;
        let primary = blend_layer(width, height, primary, "blend")?;
        let three_way = blend_layer(width, height, three_way, "three-way blend")?;

        Ok(Self {
            tiles,
            primary,
            three_way,
        })
    }

    pub fn width(&self) -> usize {
        self.tiles.width
    }

    pub fn height(&self) -> usize {
        self.tiles.height
    }

    /// Tile value at a coordinate, `None` outside the grid.
    pub fn tile_value(&self, coord: TileCoord) -> Option<u16> {
        self.tiles.at(coord).copied()
    }

    /// Raw blend-layer value at a coordinate, `None` outside the grid.
    pub fn blend_index(&self, layer: BlendLayer, coord: TileCoord) -> Option<u32> {
        match layer {
            BlendLayer::Primary => self.primary.at(coord).copied(),
            BlendLayer::ThreeWay => self.three_way.at(coord).copied(),
        }
    }
}

fn blend_layer(
    width: usize,
    height: usize,
    data: Vec<u32>,
    layer: &'static str,
) -> Result<Tilemap<u32>, GridError> {
    if data.is_empty() {
        return Ok(Tilemap::new(width, height));
    }
    let actual = data.len();
    Tilemap::from_vec(width, height, data).ok_or(GridError::LayerLength {
        layer,
        expected: width * height,
        actual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_blend_layers_default_to_zero() {
        let grid = TerrainGrid::new(2, 1, vec![3, 4], vec![], vec![]).unwrap();
        assert_eq!(grid.tile_value(TileCoord::new(1, 0)), Some(4));
        assert_eq!(grid.blend_index(BlendLayer::Primary, TileCoord::new(0, 0)), Some(0));
        assert_eq!(grid.blend_index(BlendLayer::ThreeWay, TileCoord::new(1, 0)), Some(0));
    }

    #[test]
    fn test_out_of_range_is_no_value() {
        let grid = TerrainGrid::new(1, 1, vec![9], vec![2], vec![0]).unwrap();
        assert_eq!(grid.tile_value(TileCoord::new(0, 1)), None);
        assert_eq!(grid.blend_index(BlendLayer::Primary, TileCoord::new(-1, 0)), None);
    }

    #[test]
    fn test_rejects_mismatched_layers() {
        assert_eq!(
            TerrainGrid::new(2, 2, vec![0; 3], vec![], vec![]).unwrap_err(),
            GridError::LayerLength {
                layer: "tile",
                expected: 4,
                actual: 3
            }
        );
        let err = TerrainGrid::new(2, 2, vec![0; 4], vec![0; 2], vec![]).unwrap_err();
        assert_eq!(err.to_string(), "blend layer must hold 4 values, got 2");
        assert_eq!(
            TerrainGrid::new(0, 2, vec![], vec![], vec![]).unwrap_err(),
            GridError::EmptyDimensions { width: 0, height: 2 }
        );
    }
}
