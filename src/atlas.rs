//! Texture atlas resolution
//!
//! Each declared terrain texture is one atlas image cut into square cells of
//! `cell_size` pixels. Tile values address cells through cumulative ranges:
//! the first loaded texture owns `[0, n0)`, the next `[n0, n0 + n1)`, and so on,
//! where `n = (image_width / cell_size) * (image_height / cell_size)`.
//!
//! A texture whose image cannot be loaded is left out of the atlas, which
//! shifts the ranges of every later texture down. This mirrors how the map
//! data was authored and is kept as is.
//!
//! The cell drawn for a tile is not the tile's own cell index: it is picked by
//! the tile's map position so a texture repeats seamlessly across the map.
//! Both axes wrap by the number of cells in one image row (`cells_x`), so a
//! non-square texture may yield an offset outside the image; such tiles have
//! no cell image and stay transparent.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use image::{imageops, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::{ExportError, ExportResult};
use crate::terrain_ini::TerrainMappings;

/// Stored tile values address sub-cells this many times finer than atlas cells.
pub const SUB_CELLS_PER_CELL: u32 = 4;

/// How tile values map onto atlas cells.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TileAddressing {
    /// Tile values are atlas cell indices.
    #[default]
    Cell,
    /// Tile values are divided by `SUB_CELLS_PER_CELL` first.
    SubCell,
}

impl TileAddressing {
    pub fn atlas_cell(self, tile_value: u32) -> u32 {
        match self {
            Self::Cell => tile_value,
            Self::SubCell => tile_value / SUB_CELLS_PER_CELL,
        }
    }
}

/// A texture as declared by the map, in declaration order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureDecl {
    pub name: String,
    /// Cell size as declared by the map (informational).
    #[serde(default)]
    pub cell_size: u32,
}

/// A loaded texture with its cell range.
#[derive(Clone, Debug)]
pub struct AtlasEntry {
    /// Position in the map's declared texture list
    pub index: usize,
    pub name: String,
    /// First atlas cell owned by this texture
    pub cell_start: u32,
    pub cell_count: u32,
    /// Cells in one image row
    pub cells_x: u32,
    pub image: Arc<RgbaImage>,
}

impl AtlasEntry {
    pub fn contains(&self, cell: u32) -> bool {
        cell >= self.cell_start && cell < self.cell_start + self.cell_count
    }
}

/// Resolves tile values to atlas entries for one map.
#[derive(Clone, Debug)]
pub struct TextureAtlas {
    entries: Vec<AtlasEntry>,
    cell_size: u32,
    addressing: TileAddressing,
    total_cells: u32,
}

impl TextureAtlas {
    /// Build cumulative cell ranges over the declared textures.
    ///
    /// `load` supplies each texture's image. Textures that fail to load are
    /// skipped and their errors returned alongside the atlas.
    pub fn build<F>(
        textures: &[TextureDecl],
        cell_size: u32,
        addressing: TileAddressing,
        mut load: F,
    ) -> (Self, Vec<ExportError>)
    where
        F: FnMut(&TextureDecl) -> ExportResult<Arc<RgbaImage>>,
    {
        let mut entries = Vec::with_capacity(textures.len());
        let mut warnings = Vec::new();
        let mut cell_start = 0u32;

        for (index, decl) in textures.iter().enumerate() {
            let image = match load(decl) {
                Ok(image) => image,
                Err(e) => {
                    warnings.push(e);
                    continue;
                }
            };

            let cells_x = image.width() / cell_size.max(1);
            let cells_y = image.height() / cell_size.max(1);
            let cell_count = cells_x * cells_y;
            if cell_count == 0 {
                warnings.push(ExportError::texture(
                    &decl.name,
                    format!(
                        "image {}x{} is smaller than one {}px cell",
                        image.width(),
                        image.height(),
                        cell_size
                    ),
                ));
            }

            entries.push(AtlasEntry {
                index,
                name: decl.name.clone(),
                cell_start,
                cell_count,
                cells_x,
                image,
            });
            cell_start += cell_count;
        }

        let atlas = Self {
            entries,
            cell_size,
            addressing,
            total_cells: cell_start,
        };
        (atlas, warnings)
    }

    /// Find the entry owning a tile value, with the value's index local to it.
    pub fn resolve(&self, tile_value: u32) -> Option<(&AtlasEntry, u32)> {
        let cell = self.addressing.atlas_cell(tile_value);
        if cell >= self.total_cells {
            return None;
        }
        // Ranges are contiguous and ascending; empty ranges are skipped here.
        let pos = self
            .entries
            .partition_point(|e| e.cell_start + e.cell_count <= cell);
        let entry = self.entries.get(pos)?;
        entry
            .contains(cell)
            .then(|| (entry, cell - entry.cell_start))
    }

    /// Pixel offset of the cell drawn at map column `x` and flipped row `y_flipped`.
    pub fn cell_offset(&self, entry: &AtlasEntry, x: u32, y_flipped: u32) -> (u32, u32) {
        let per_row = entry.cells_x.max(1);
        ((x % per_row) * self.cell_size, (y_flipped % per_row) * self.cell_size)
    }

    /// Copy of the `cell_size` x `cell_size` cell at the given offset.
    pub fn cell_image(&self, entry: &AtlasEntry, offset: (u32, u32)) -> Option<RgbaImage> {
        let (ox, oy) = offset;
        if entry.cell_count == 0
            || ox + self.cell_size > entry.image.width()
            || oy + self.cell_size > entry.image.height()
        {
            return None;
        }
        Some(imageops::crop_imm(entry.image.as_ref(), ox, oy, self.cell_size, self.cell_size).to_image())
    }

    pub fn entries(&self) -> &[AtlasEntry] {
        &self.entries
    }

    /// Loaded entry for a declared texture index.
    pub fn entry_for_declared(&self, index: usize) -> Option<&AtlasEntry> {
        self.entries.iter().find(|e| e.index == index)
    }

    pub fn total_cells(&self) -> u32 {
        self.total_cells
    }
}

/// Process-wide cache of decoded texture images, keyed by texture name.
///
/// Safe to share across concurrent map exports: each name is loaded at most
/// once (population happens under the write lock) and never mutated after.
/// Failed loads are remembered too so a missing file is only probed once.
pub struct TextureCache {
    textures_dir: PathBuf,
    mappings: Arc<TerrainMappings>,
    images: RwLock<HashMap<String, Option<Arc<RgbaImage>>>>,
}

impl TextureCache {
    pub fn new(textures_dir: impl Into<PathBuf>, mappings: Arc<TerrainMappings>) -> Self {
        Self {
            textures_dir: textures_dir.into(),
            mappings,
            images: RwLock::new(HashMap::new()),
        }
    }

    /// Pre-populate an image for a texture name.
    #[cfg(test)]
    pub(crate) fn insert(&self, name: impl Into<String>, image: RgbaImage) {
        let mut images = self.images.write().unwrap_or_else(PoisonError::into_inner);
        images.insert(name.into(), Some(Arc::new(image)));
    }

    /// Image file mapped to a texture name, if any.
    pub fn file_name(&self, name: &str) -> Option<&str> {
        self.mappings.file_for(name)
    }

    pub fn get_or_load(&self, name: &str) -> ExportResult<Arc<RgbaImage>> {
        {
            let images = self.images.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = images.get(name) {
                return cached
                    .clone()
                    .ok_or_else(|| ExportError::texture(name, "image failed to load earlier"));
            }
        }

        let mut images = self.images.write().unwrap_or_else(PoisonError::into_inner);
        // Another export may have loaded it while we waited for the lock.
        if let Some(cached) = images.get(name) {
            return cached
                .clone()
                .ok_or_else(|| ExportError::texture(name, "image failed to load earlier"));
        }

        let loaded = self.load_uncached(name);
        images.insert(name.to_string(), loaded.as_ref().ok().cloned());
        loaded
    }

    fn load_uncached(&self, name: &str) -> ExportResult<Arc<RgbaImage>> {
        let file = self
            .mappings
            .file_for(name)
            .ok_or_else(|| ExportError::texture(name, "no texture mapping for this terrain"))?;
        let path = self.textures_dir.join(file);
        if !path.exists() {
            return Err(ExportError::texture(
                name,
                format!("missing image file {}", path.display()),
            ));
        }
        let image = image::open(&path)
            .map_err(|e| ExportError::texture(name, format!("cannot decode {}: {}", path.display(), e)))?;
        log::debug!("loaded texture {} from {}", name, path.display());
        Ok(Arc::new(image.to_rgba8()))
    }

    /// Number of names probed so far (loaded or failed).
    #[cfg(test)]
    fn len(&self) -> usize {
        self.images.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}
