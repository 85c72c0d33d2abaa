//! Three-pass tile compositor
//!
//! Renders one map into an RGBA raster:
//! 1. base tiles: every resolvable tile value copies its atlas cell
//! 2. primary blend: masked overlays decided from raw grid texture identity
//! 3. three-way blend: masked overlays decided from the raster left by pass 2
//!
//! Passes always run in that order over the whole grid, column-major. Pass 3
//! reads pixels written by pass 2, so reordering changes the output.
//!
//! A tile whose texture, descriptor, or mask cannot be resolved is skipped
//! and recorded in `CompositeStats`; it never aborts the export.

use image::{imageops, RgbaImage};
use serde::Serialize;

use crate::atlas::TextureAtlas;
use crate::blend::DescriptorTable;
use crate::color_match::{ColorResolver, RasterProbe};
use crate::error::{ExportError, ExportResult};
use crate::masks::{Mask, MaskLibrary};
use crate::neighbors::{GridProbe, NeighborAnalyzer};
use crate::terrain::{BlendLayer, TerrainGrid};
use crate::tilemap::{column_major, ScreenLayout, TileCoord};

/// One resolved tile, as listed in the manifest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileRecord {
    pub coord: TileCoord,
    pub tile_value: u16,
    /// Declared index of the texture owning the tile value
    pub texture_index: usize,
    /// Pixel offset of the drawn cell inside the atlas image
    pub cell_offset: (u32, u32),
    pub blend: Option<u32>,
    pub three_way_blend: Option<u32>,
}

/// Counters collected while compositing one map.
#[derive(Clone, Debug, Default, Serialize)]
pub struct CompositeStats {
    pub tiles_painted: usize,
    pub tiles_unresolved: usize,
    pub primary_blends: usize,
    pub three_way_blends: usize,
    /// Blend entries where neighbor analysis decided not to blend
    pub blends_skipped: usize,
    /// Blend entries dropped because something could not be resolved
    pub blends_failed: usize,
    pub warnings: Vec<String>,
}

impl CompositeStats {
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{}", message);
        self.warnings.push(message);
    }
}

/// Finished raster plus what went into it.
pub struct CompositeResult {
    pub raster: RgbaImage,
    pub tiles: Vec<TileRecord>,
    pub stats: CompositeStats,
}

pub struct Compositor<'a> {
    grid: &'a TerrainGrid,
    descriptors: &'a DescriptorTable,
    atlas: &'a TextureAtlas,
    masks: Option<&'a MaskLibrary>,
    layout: ScreenLayout,
    raster: RgbaImage,
    stats: CompositeStats,
}

impl<'a> Compositor<'a> {
    /// Start with a transparent raster of `preview_cell` pixels per tile.
    /// Without a mask library the blend passes are no-ops.
    pub fn new(
        grid: &'a TerrainGrid,
        descriptors: &'a DescriptorTable,
        atlas: &'a TextureAtlas,
        masks: Option<&'a MaskLibrary>,
        preview_cell: u32,
    ) -> Self {
        let layout = ScreenLayout::new(grid.width() as u32, grid.height() as u32, preview_cell);
        let (w, h) = layout.raster_size();
        Self {
            grid,
            descriptors,
            atlas,
            masks,
            layout,
            raster: RgbaImage::new(w, h),
            stats: CompositeStats::default(),
        }
    }

    /// Run all three passes in order.
    pub fn composite(mut self) -> CompositeResult {
        let tiles = self.paint_base_tiles();
        self.apply_blend_layer(BlendLayer::Primary);
        self.apply_blend_layer(BlendLayer::ThreeWay);
        self.finish(tiles)
    }

    fn finish(self, tiles: Vec<TileRecord>) -> CompositeResult {
        CompositeResult {
            raster: self.raster,
            tiles,
            stats: self.stats,
        }
    }

    /// Pass 1. Returns a record for every tile whose value resolved.
    fn paint_base_tiles(&mut self) -> Vec<TileRecord> {
        let mut tiles = Vec::with_capacity(self.grid.width() * self.grid.height());

        for coord in column_major(self.grid.width(), self.grid.height()) {
            let Some(value) = self.grid.tile_value(coord) else {
                continue;
            };
            let Some((entry, _)) = self.atlas.resolve(u32::from(value)) else {
                self.stats.tiles_unresolved += 1;
                log::debug!(
                    "tile ({}, {}) value {} is outside every atlas range",
                    coord.x,
                    coord.y,
                    value
                );
                continue;
            };
            let Some((rect, y_flipped)) = self
                .layout
                .screen_rect(coord)
                .zip(self.layout.flipped_row(coord.y as u32))
            else {
                continue;
            };

            let offset = self.atlas.cell_offset(entry, coord.x as u32, y_flipped);
            tiles.push(TileRecord {
                coord,
                tile_value: value,
                texture_index: entry.index,
                cell_offset: offset,
                blend: self.layer_value(BlendLayer::Primary, coord),
                three_way_blend: self.layer_value(BlendLayer::ThreeWay, coord),
            });

            match self.atlas.cell_image(entry, offset) {
                Some(cell) => {
                    let cell = fit_cell(cell, self.layout.cell_pixels);
                    imageops::replace(&mut self.raster, &cell, i64::from(rect.x), i64::from(rect.y));
                    self.stats.tiles_painted += 1;
                }
                None => self.stats.warn(format!(
                    "tile ({}, {}): cell {:?} lies outside texture '{}'",
                    coord.x, coord.y, offset, entry.name
                )),
            }
        }

        tiles
    }

    /// Pass 2 or 3, depending on `layer`.
    fn apply_blend_layer(&mut self, layer: BlendLayer) {
        let Some(masks) = self.masks else {
            return;
        };
        let mut resolver = match layer {
            BlendLayer::Primary => None,
            BlendLayer::ThreeWay => Some(ColorResolver::new(self.atlas)),
        };

        for coord in column_major(self.grid.width(), self.grid.height()) {
            let Some(index) = self.layer_value(layer, coord) else {
                continue;
            };
            match self.blend_tile(coord, index, masks, resolver.as_mut()) {
                Ok(true) => match layer {
                    BlendLayer::Primary => self.stats.primary_blends += 1,
                    BlendLayer::ThreeWay => self.stats.three_way_blends += 1,
                },
                Ok(false) => self.stats.blends_skipped += 1,
                Err(e) => {
                    self.stats.blends_failed += 1;
                    self.stats.warn(format!(
                        "{} blend at ({}, {}) skipped: {}",
                        layer.label(),
                        coord.x,
                        coord.y,
                        e
                    ));
                }
            }
        }
    }

    fn layer_value(&self, layer: BlendLayer, coord: TileCoord) -> Option<u32> {
        self.grid.blend_index(layer, coord).filter(|&v| v != 0)
    }

    /// Blend one tile. `Ok(false)` means neighbor analysis ruled the blend out.
    ///
    /// The tile itself must resolve in the atlas. With a resolver, base and
    /// neighbor identity then come from the raster (falling back to the grid
    /// texture for the base); otherwise from raw tile values.
    fn blend_tile(
        &mut self,
        coord: TileCoord,
        index: u32,
        masks: &MaskLibrary,
        resolver: Option<&mut ColorResolver>,
    ) -> ExportResult<bool> {
        let blend = *self.descriptors.lookup(index).ok_or_else(|| {
            ExportError::texture(
                format!("blend #{}", index),
                format!("descriptor table has {} entries", self.descriptors.len()),
            )
        })?;

        let grid_base = self.grid_texture(coord)?;
        let analyzer = NeighborAnalyzer::new(self.atlas);
        let context = match resolver {
            None => {
                let mut probe = GridProbe::new(self.grid, self.atlas);
                analyzer.analyze(coord, blend.direction, &grid_base, blend.secondary_tile, &mut probe)
            }
            Some(resolver) => {
                let base = resolver
                    .texture_at(&self.raster, &self.layout, coord)
                    .unwrap_or(grid_base);
                let mut probe = RasterProbe::new(resolver, &self.raster, self.layout);
                analyzer.analyze(coord, blend.direction, &base, blend.secondary_tile, &mut probe)
            }
        };

        let Some(key) = context.mask_key.filter(|_| context.should_blend) else {
            return Ok(false);
        };
        let mask = masks
            .get(key)
            .ok_or_else(|| ExportError::texture(key.to_string(), "mask not loaded"))?;

        let (secondary, _) = self.atlas.resolve(blend.secondary_tile).ok_or_else(|| {
            ExportError::texture(
                format!("tile {}", blend.secondary_tile),
                "secondary tile value is outside every atlas range",
            )
        })?;
        let (rect, y_flipped) = self
            .layout
            .screen_rect(coord)
            .zip(self.layout.flipped_row(coord.y as u32))
            .ok_or_else(|| ExportError::texture(&secondary.name, "tile lies outside the map"))?;

        let offset = self.atlas.cell_offset(secondary, coord.x as u32, y_flipped);
        let mut cell = self
            .atlas
            .cell_image(secondary, offset)
            .ok_or_else(|| ExportError::texture(&secondary.name, "blend cell lies outside the image"))?;
        apply_mask(&mut cell, mask);
        let cell = fit_cell(cell, self.layout.cell_pixels);
        draw_over(&mut self.raster, &cell, rect.x, rect.y);

        Ok(true)
    }

    fn grid_texture(&self, coord: TileCoord) -> ExportResult<String> {
        let value = self
            .grid
            .tile_value(coord)
            .ok_or_else(|| ExportError::texture("<grid>", "tile lies outside the map"))?;
        self.atlas
            .resolve(u32::from(value))
            .map(|(entry, _)| entry.name.clone())
            .ok_or_else(|| {
                ExportError::texture(
                    format!("tile {}", value),
                    "base tile value is outside every atlas range",
                )
            })
    }
}

/// Replace each pixel's alpha with the mask's alpha. Pixels outside the mask
/// become transparent.
pub fn apply_mask(cell: &mut RgbaImage, mask: &Mask) {
    for (x, y, pixel) in cell.enumerate_pixels_mut() {
        pixel[3] = if x < mask.width() && y < mask.height() {
            mask.alpha(x, y)
        } else {
            0
        };
    }
}

fn fit_cell(cell: RgbaImage, size: u32) -> RgbaImage {
    if cell.dimensions() == (size, size) {
        cell
    } else {
        imageops::resize(&cell, size, size, imageops::FilterType::Nearest)
    }
}

/// Source-over composite of `top` onto `canvas` at `(x, y)`, integer math.
pub fn draw_over(canvas: &mut RgbaImage, top: &RgbaImage, x: u32, y: u32) {
    for (tx, ty, src) in top.enumerate_pixels() {
        let (cx, cy) = (x + tx, y + ty);
        if cx >= canvas.width() || cy >= canvas.height() {
            continue;
        }
        let dst = canvas.get_pixel_mut(cx, cy);
        let sa = u32::from(src[3]);
        if sa == 0 {
            continue;
        }
        if sa == 255 {
            *dst = *src;
            continue;
        }

        let da = u32::from(dst[3]);
        // Alpha scaled by 255 to keep the division exact until the end.
        let out_a = sa * 255 + da * (255 - sa);
        for c in 0..3 {
            let s = u32::from(src[c]);
            let d = u32::from(dst[c]);
            dst[c] = ((s * sa * 255 + d * da * (255 - sa) + out_a / 2) / out_a) as u8;
        }
        dst[3] = ((out_a + 127) / 255) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::{TextureDecl, TileAddressing};
    use crate::blend::{BlendDescriptor, BlendDirection};
    use crate::masks::MaskSources;
    use image::Rgba;
    use std::sync::Arc;

    const CELL: u32 = 4;
    const RED: Rgba<u8> = Rgba([200, 20, 20, 255]);
    const GREEN: Rgba<u8> = Rgba([20, 200, 20, 255]);
    const BLUE: Rgba<u8> = Rgba([20, 20, 200, 255]);

    fn atlas_of(images: Vec<RgbaImage>) -> TextureAtlas {
        let decls: Vec<_> = (0..images.len())
            .map(|i| TextureDecl {
                name: ["A", "B", "C"][i].to_string(),
                cell_size: CELL,
            })
            .collect();
        let images: Vec<_> = images.into_iter().map(Arc::new).collect();
        let (atlas, warnings) = TextureAtlas::build(&decls, CELL, TileAddressing::Cell, |d| {
            let i = decls.iter().position(|x| x == d).unwrap();
            Ok(images[i].clone())
        });
        assert!(warnings.is_empty());
        atlas
    }

    fn alpha_mask(f: impl Fn(u32, u32) -> u8) -> Mask {
        Mask::new(RgbaImage::from_fn(CELL, CELL, |x, y| Rgba([0, 0, 0, f(x, y)])))
    }

    fn masks(horizontal: [u8; 4], diagonal: u8, corner: u8) -> MaskLibrary {
        MaskLibrary::from_sources(
            MaskSources {
                horizontal: alpha_mask(|x, _| horizontal[x as usize]),
                vertical: alpha_mask(|_, _| 0),
                diagonal: alpha_mask(|_, _| diagonal),
                diagonal_with_neighbors: alpha_mask(|_, _| corner),
            },
            CELL,
        )
    }

    fn b_texture() -> RgbaImage {
        RgbaImage::from_fn(CELL, CELL, |x, y| Rgba([10 + x as u8 * 10, 100 + y as u8 * 10, 150, 255]))
    }

    #[test]
    fn test_right_blend_boundary_takes_secondary_pixels() {
        let atlas = atlas_of(vec![RgbaImage::from_pixel(CELL, CELL, RED), b_texture()]);
        // (0,0)=A (1,0)=B, top row all A; RIGHT blend at (0,0) towards B
        let grid = TerrainGrid::new(2, 2, vec![0, 1, 0, 0], vec![1, 0, 0, 0], vec![]).unwrap();
        let descriptors = DescriptorTable::new(&[BlendDescriptor {
            direction: BlendDirection::Right,
            flipped: false,
            secondary_tile: 1,
        }]);
        let library = masks([255, 170, 85, 0], 0, 0);
        let right = library.get(crate::blend::MaskKey::Right).unwrap();

        let result = Compositor::new(&grid, &descriptors, &atlas, Some(&library), CELL).composite();
        assert_eq!(result.stats.primary_blends, 1);

        // Tile (0,0) occupies raster rows 4..8; column 3 borders tile (1,0).
        let pixel = result.raster.get_pixel(3, 5);
        assert_eq!(right.alpha(3, 1), 255);
        assert_eq!(pixel[3], right.alpha(3, 1));
        let b = b_texture();
        let expected = b.get_pixel(3, 1);
        assert_eq!(&pixel.0[..3], &expected.0[..3]);

        // Mask alpha 0 leaves the base texture untouched.
        assert_eq!(result.raster.get_pixel(0, 5), &RED);
    }

    #[test]
    fn test_masked_cell_alpha_equals_mask_alpha() {
        let mut cell = b_texture();
        let mask = alpha_mask(|x, y| (x * 60 + y) as u8);
        apply_mask(&mut cell, &mask);
        for (x, y, p) in cell.enumerate_pixels() {
            assert_eq!(p[3], mask.alpha(x, y));
            assert_eq!(&p.0[..3], &b_texture().get_pixel(x, y).0[..3]);
        }
    }

    fn three_way_fixture(primary: Vec<u32>) -> CompositeResult {
        let atlas = atlas_of(vec![
            RgbaImage::from_pixel(CELL, CELL, RED),
            RgbaImage::from_pixel(CELL, CELL, GREEN),
            RgbaImage::from_pixel(CELL, CELL, BLUE),
        ]);
        // (0,0)=A (1,0)=C
        // (0,1)=A (1,1)=B
        let grid = TerrainGrid::new(2, 2, vec![0, 2, 0, 1], primary, vec![2, 0, 0, 0]).unwrap();
        let descriptors = DescriptorTable::new(&[
            BlendDescriptor {
                direction: BlendDirection::Right,
                flipped: false,
                secondary_tile: 1,
            },
            BlendDescriptor {
                direction: BlendDirection::TopRight,
                flipped: false,
                secondary_tile: 1,
            },
        ]);
        // Opaque edge masks, invisible diagonal mask, opaque corner mask
        let library = masks([255; 4], 0, 255);
        Compositor::new(&grid, &descriptors, &atlas, Some(&library), CELL).composite()
    }

    #[test]
    fn test_three_way_sees_primary_pass_output() {
        // The primary pass turns (0,1) visibly into B, so the three-way blend
        // at (0,0) finds two B neighbors and uses the corner mask.
        let result = three_way_fixture(vec![0, 0, 1, 0]);
        assert_eq!(result.stats.primary_blends, 1);
        assert_eq!(result.stats.three_way_blends, 1);
        assert_eq!(result.raster.get_pixel(2, 2 + CELL), &GREEN);
        assert_eq!(result.raster.get_pixel(1, 5), &GREEN);
    }

    #[test]
    fn test_three_way_without_primary_uses_diagonal_mask() {
        // Only the corner neighbor is B: diagonal mask, fully transparent here.
        let result = three_way_fixture(vec![]);
        assert_eq!(result.stats.three_way_blends, 1);
        assert_eq!(result.raster.get_pixel(1, 5), &RED);
        assert_eq!(result.raster.get_pixel(1, 1), &RED);
    }

    #[test]
    fn test_three_way_on_unresolved_tile_is_skipped() {
        let atlas = atlas_of(vec![
            RgbaImage::from_pixel(CELL, CELL, RED),
            RgbaImage::from_pixel(CELL, CELL, GREEN),
        ]);
        // (1,0) is outside every atlas range but carries a three-way entry.
        let grid = TerrainGrid::new(2, 1, vec![1, 9], vec![], vec![0, 1]).unwrap();
        let descriptors = DescriptorTable::new(&[BlendDescriptor {
            direction: BlendDirection::Right,
            flipped: true,
            secondary_tile: 1,
        }]);
        let library = masks([255; 4], 0, 0);
        let result = Compositor::new(&grid, &descriptors, &atlas, Some(&library), CELL).composite();
        assert_eq!(result.stats.blends_failed, 1);
        assert_eq!(result.stats.three_way_blends, 0);
        assert_eq!(result.raster.get_pixel(CELL + 1, 1)[3], 0);
    }

    #[test]
    fn test_row_zero_is_painted_at_the_bottom() {
        let atlas = atlas_of(vec![
            RgbaImage::from_pixel(CELL, CELL, RED),
            RgbaImage::from_pixel(CELL, CELL, GREEN),
        ]);
        for height in 1..5usize {
            let mut tiles = vec![1u16; height];
            tiles[0] = 0;
            let grid = TerrainGrid::new(1, height, tiles, vec![], vec![]).unwrap();
            let descriptors = DescriptorTable::default();
            let result = Compositor::new(&grid, &descriptors, &atlas, None, CELL).composite();
            let bottom = height as u32 * CELL - CELL;
            assert_eq!(result.raster.get_pixel(0, bottom), &RED);
            if height > 1 {
                assert_eq!(result.raster.get_pixel(0, 0), &GREEN);
            }
        }
    }

    #[test]
    fn test_unresolved_tiles_stay_transparent() {
        let atlas = atlas_of(vec![RgbaImage::from_pixel(CELL, CELL, RED)]);
        let grid = TerrainGrid::new(2, 1, vec![0, 40], vec![], vec![]).unwrap();
        let descriptors = DescriptorTable::default();
        let result = Compositor::new(&grid, &descriptors, &atlas, None, CELL).composite();
        assert_eq!(result.tiles.len(), 1);
        assert_eq!(result.stats.tiles_unresolved, 1);
        assert_eq!(result.raster.get_pixel(CELL + 1, 1)[3], 0);
    }

    #[test]
    fn test_bad_descriptor_index_skips_only_that_tile() {
        let atlas = atlas_of(vec![
            RgbaImage::from_pixel(CELL, CELL, RED),
            RgbaImage::from_pixel(CELL, CELL, GREEN),
        ]);
        let grid = TerrainGrid::new(2, 1, vec![0, 1], vec![7, 1], vec![]).unwrap();
        let descriptors = DescriptorTable::new(&[BlendDescriptor {
            direction: BlendDirection::Right,
            flipped: true,
            secondary_tile: 0,
        }]);
        let library = masks([255; 4], 0, 0);
        let result = Compositor::new(&grid, &descriptors, &atlas, Some(&library), CELL).composite();
        assert_eq!(result.stats.blends_failed, 1);
        assert_eq!(result.stats.warnings.len(), 1);
        // (1,0) blends LEFT towards A
        assert_eq!(result.stats.primary_blends, 1);
        assert_eq!(result.raster.get_pixel(CELL, 0), &RED);
    }

    #[test]
    fn test_preview_cells_are_rescaled() {
        let atlas = atlas_of(vec![RgbaImage::from_pixel(CELL, CELL, RED)]);
        let grid = TerrainGrid::new(2, 3, vec![0; 6], vec![], vec![]).unwrap();
        let descriptors = DescriptorTable::default();
        let result = Compositor::new(&grid, &descriptors, &atlas, None, 2).composite();
        assert_eq!(result.raster.dimensions(), (4, 6));
        assert!(result.raster.pixels().all(|p| *p == RED));
    }

    #[test]
    fn test_draw_over_half_alpha() {
        let mut canvas = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255]));
        let top = RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 128]));
        draw_over(&mut canvas, &top, 0, 0);
        let p = canvas.get_pixel(0, 0);
        assert_eq!(p[3], 255);
        assert_eq!(p[0], 128);
    }
}
