//! Block splitting for large previews
//!
//! Cuts a finished raster into square blocks of `block_tiles` tiles per side,
//! written as `blocks/block_<row>_<col>.png`. Rows count from the top of the
//! raster. Blocks on the right and bottom edges are cropped to what remains.

use std::path::Path;

use image::{imageops, ImageError, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::{ExportError, ExportResult};
use crate::manifest::write_json;

pub const BLOCKS_DIR: &str = "blocks";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BlockIndex {
    pub work_directory: String,
    pub block_pixel_size: u32,
    pub block_tile_size: u32,
    pub blocks: Vec<BlockEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BlockEntry {
    pub index: usize,
    pub grid_x: u32,
    pub grid_y: u32,
    /// Path relative to the work directory
    pub path: String,
}

/// One block image with its grid position.
pub struct Block {
    pub grid_x: u32,
    pub grid_y: u32,
    pub image: RgbaImage,
}

impl Block {
    pub fn file_name(&self) -> String {
        format!("block_{}_{}.png", self.grid_y, self.grid_x)
    }
}

/// Split `raster` into blocks of `block_tiles * cell_pixels` pixels, row by row.
pub fn split(raster: &RgbaImage, block_tiles: u32, cell_pixels: u32) -> Vec<Block> {
    let size = block_tiles.max(1) * cell_pixels.max(1);
    let (width, height) = raster.dimensions();
    let cols = width.div_ceil(size);
    let rows = height.div_ceil(size);

    let mut blocks = Vec::with_capacity((cols * rows) as usize);
    for grid_y in 0..rows {
        for grid_x in 0..cols {
            let x = grid_x * size;
            let y = grid_y * size;
            let w = size.min(width - x);
            let h = size.min(height - y);
            blocks.push(Block {
                grid_x,
                grid_y,
                image: imageops::crop_imm(raster, x, y, w, h).to_image(),
            });
        }
    }
    blocks
}

/// Save a raster as PNG. I/O failures are reported as write errors.
pub fn save_png(image: &RgbaImage, path: &Path) -> ExportResult<()> {
    image.save(path).map_err(|e| match e {
        ImageError::IoError(io) => ExportError::io_write(path, io),
        other => other.into(),
    })
}

/// Write every block under `<work_dir>/blocks/` and the index as `<work_dir>/blocks.json`.
pub fn write_blocks(
    raster: &RgbaImage,
    work_dir: &Path,
    block_tiles: u32,
    cell_pixels: u32,
) -> ExportResult<BlockIndex> {
    let dir = work_dir.join(BLOCKS_DIR);
    std::fs::create_dir_all(&dir).map_err(|e| ExportError::io_write(&dir, e))?;

    let blocks = split(raster, block_tiles, cell_pixels);
    let mut entries = Vec::with_capacity(blocks.len());
    for (index, block) in blocks.iter().enumerate() {
        let file = block.file_name();
        save_png(&block.image, &dir.join(&file))?;
        entries.push(BlockEntry {
            index,
            grid_x: block.grid_x,
            grid_y: block.grid_y,
            path: format!("{}/{}", BLOCKS_DIR, file),
        });
    }
    log::debug!("wrote {} blocks to {}", entries.len(), dir.display());

    let index = BlockIndex {
        work_directory: work_dir.display().to_string(),
        block_pixel_size: block_tiles.max(1) * cell_pixels.max(1),
        block_tile_size: block_tiles,
        blocks: entries,
    };
    write_json(&work_dir.join("blocks.json"), &index)?;
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_split_covers_raster_with_cropped_edges() {
        let raster = RgbaImage::from_fn(10, 6, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        let blocks = split(&raster, 2, 2);
        assert_eq!(blocks.len(), 3 * 2);

        let dims: Vec<_> = blocks.iter().map(|b| b.image.dimensions()).collect();
        assert_eq!(dims, vec![(4, 4), (4, 4), (2, 4), (4, 2), (4, 2), (2, 2)]);

        let covered: u32 = dims.iter().map(|(w, h)| w * h).sum();
        assert_eq!(covered, 10 * 6);

        let last = &blocks[5];
        assert_eq!((last.grid_x, last.grid_y), (2, 1));
        assert_eq!(last.image.get_pixel(1, 1), &Rgba([9, 5, 0, 255]));
        assert_eq!(last.file_name(), "block_1_2.png");
    }

    #[test]
    fn test_single_block_when_raster_is_small() {
        let raster = RgbaImage::new(3, 3);
        let blocks = split(&raster, 16, 32);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].image.dimensions(), (3, 3));
    }
}
