//! Reverse lookup from rendered color to texture
//!
//! The three-way pass needs to know which texture is *visible* at a tile after
//! the primary pass, which may differ from the tile's raw value. It samples
//! the raster at the tile's center pixel and picks the texture whose
//! representative color (the center pixel of its atlas image) is nearest in
//! squared RGB distance.
//!
//! This is an approximation: it depends on textures having distinguishable
//! center colors and on the passes having run in order.

use std::collections::HashMap;

use image::RgbaImage;

use crate::atlas::TextureAtlas;
use crate::neighbors::TextureProbe;
use crate::tilemap::{ScreenLayout, TileCoord};

/// Squared RGB distance; alpha is ignored.
pub fn color_distance(a: [u8; 3], b: [u8; 3]) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = i32::from(x) - i32::from(y);
            (d * d) as u32
        })
        .sum()
}

pub struct ColorResolver {
    /// One representative color per loaded texture, atlas order
    palette: Vec<(String, [u8; 3])>,
    memo: HashMap<[u8; 3], String>,
}

impl ColorResolver {
    /// Sample the center pixel of every loaded atlas image.
    pub fn new(atlas: &TextureAtlas) -> Self {
        let palette = atlas
            .entries()
            .iter()
            .filter(|e| e.image.width() > 0 && e.image.height() > 0)
            .map(|e| {
                let p = e.image.get_pixel(e.image.width() / 2, e.image.height() / 2);
                (e.name.clone(), [p[0], p[1], p[2]])
            })
            .collect();
        Self::from_palette(palette)
    }

    pub fn from_palette(palette: Vec<(String, [u8; 3])>) -> Self {
        Self {
            palette,
            memo: HashMap::new(),
        }
    }

    /// Texture whose representative color is nearest to `rgb`. Ties keep the
    /// earlier texture.
    pub fn nearest(&mut self, rgb: [u8; 3]) -> Option<String> {
        if let Some(name) = self.memo.get(&rgb) {
            return Some(name.clone());
        }

        let mut best: Option<(&str, u32)> = None;
        for (name, color) in &self.palette {
            let distance = color_distance(rgb, *color);
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((name.as_str(), distance));
            }
        }

        let name = best.map(|(name, _)| name.to_string())?;
        self.memo.insert(rgb, name.clone());
        Some(name)
    }

    /// Texture visible at a tile's center pixel, `None` outside the raster.
    pub fn texture_at(
        &mut self,
        raster: &RgbaImage,
        layout: &ScreenLayout,
        coord: TileCoord,
    ) -> Option<String> {
        let (cx, cy) = layout.pixel_center(coord)?;
        if cx >= raster.width() || cy >= raster.height() {
            return None;
        }
        let p = raster.get_pixel(cx, cy);
        self.nearest([p[0], p[1], p[2]])
    }

    #[cfg(test)]
    fn memo_len(&self) -> usize {
        self.memo.len()
    }
}

/// Texture probe backed by the current raster.
pub struct RasterProbe<'a> {
    resolver: &'a mut ColorResolver,
    raster: &'a RgbaImage,
    layout: ScreenLayout,
}

impl<'a> RasterProbe<'a> {
    pub fn new(resolver: &'a mut ColorResolver, raster: &'a RgbaImage, layout: ScreenLayout) -> Self {
        Self {
            resolver,
            raster,
            layout,
        }
    }
}

impl TextureProbe for RasterProbe<'_> {
    fn texture_at(&mut self, coord: TileCoord) -> Option<String> {
        self.resolver.texture_at(self.raster, &self.layout, coord)
    }
}
