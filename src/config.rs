//! Exporter configuration
//!
//! Settings come from a `config.ini` of `key = value` lines (`#` and `;`
//! start comment lines). Command-line flags override individual values
//! after loading; see `main.rs`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::atlas::TileAddressing;
use crate::error::{ExportError, ExportResult};

pub const DEFAULT_CONFIG_FILE: &str = "config.ini";
pub const DEFAULT_TILE_SIZE: u32 = 32;
pub const DEFAULT_PREVIEW_TILE_SIZE: u32 = 32;
/// Tiles per block side when splitting previews
pub const DEFAULT_BLOCK_SIZE: u32 = 16;
pub const DEFAULT_MASKS_DIR: &str = "blend-masks";

/// Commented configuration written by `--init-config`.
pub const DEFAULT_CONFIG: &str = "\
# Map exporter configuration

# Atlas cell size in pixels. Usually you do not need to change it.
tile_size = 32

# Tile size in the preview image; smaller values scale the preview down
preview_tile_size = 32

# Split large previews into blocks of block_size x block_size tiles? 0,1
split_image_by_blocks = 0
block_size = 16

# Write tilemap.png? 0,1
generate_previews = 1

# Apply blend masks between terrains? 0,1
blend_tiles = 1

# Export tilemap.png / tilemap.json at all? 0,1
generate_tilemap = 1

# Tile values address quarter cells (divide by 4 before atlas lookup)? 0,1
sub_cell_addressing = 0

# Decoded map documents (*.json), no subfolders
path_to_maps_folder = maps

# Terrain texture images, no subfolders
path_to_textures_folder = textures

# Output directory, one subfolder per map
path_to_output = output

# Maps terrain names to texture files
path_to_terrain_ini = terrain.ini

# horizontal.png, vertical.png, diagonal.png, diagonal_with_neighbors.png
path_to_blend_masks = blend-masks
";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportConfig {
    pub tile_size: u32,
    pub preview_tile_size: u32,
    pub block_size: u32,
    pub split_image_by_blocks: bool,
    pub generate_previews: bool,
    pub blend_tiles: bool,
    pub generate_tilemap: bool,
    pub addressing: TileAddressing,
    pub maps_dir: PathBuf,
    pub textures_dir: PathBuf,
    pub output_dir: PathBuf,
    pub terrain_ini: PathBuf,
    pub masks_dir: PathBuf,
}

impl ExportConfig {
    /// Defaults for every optional setting around the four required paths.
    pub fn with_paths(
        maps_dir: impl Into<PathBuf>,
        textures_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        terrain_ini: impl Into<PathBuf>,
    ) -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            preview_tile_size: DEFAULT_PREVIEW_TILE_SIZE,
            block_size: DEFAULT_BLOCK_SIZE,
            split_image_by_blocks: false,
            generate_previews: true,
            blend_tiles: true,
            generate_tilemap: true,
            addressing: TileAddressing::Cell,
            maps_dir: maps_dir.into(),
            textures_dir: textures_dir.into(),
            output_dir: output_dir.into(),
            terrain_ini: terrain_ini.into(),
            masks_dir: PathBuf::from(DEFAULT_MASKS_DIR),
        }
    }

    pub fn load(path: &Path) -> ExportResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ExportError::configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> ExportResult<Self> {
        let values = IniValues::parse(text);

        let mut config = Self::with_paths(
            values.required_path("path_to_maps_folder")?,
            values.required_path("path_to_textures_folder")?,
            values.required_path("path_to_output")?,
            values.required_path("path_to_terrain_ini")?,
        );
        if let Some(dir) = values.get("path_to_blend_masks") {
            config.masks_dir = PathBuf::from(dir);
        }

        config.tile_size = values.positive("tile_size", DEFAULT_TILE_SIZE)?;
        config.preview_tile_size = values.positive("preview_tile_size", DEFAULT_PREVIEW_TILE_SIZE)?;
        config.block_size = values.positive("block_size", DEFAULT_BLOCK_SIZE)?;
        config.split_image_by_blocks = values.flag("split_image_by_blocks", false)?;
        config.generate_previews = match values.get("generate_previews") {
            Some(_) => values.flag("generate_previews", true)?,
            None => values.flag("generate_preview", true)?,
        };
        config.blend_tiles = values.flag("blend_tiles", true)?;
        config.generate_tilemap = values.flag("generate_tilemap", true)?;
        if values.flag("sub_cell_addressing", false)? {
            config.addressing = TileAddressing::SubCell;
        }

        Ok(config)
    }

    /// Write `DEFAULT_CONFIG` to `path`, refusing to overwrite.
    pub fn write_default(path: &Path) -> ExportResult<()> {
        if path.exists() {
            return Err(ExportError::configuration(format!(
                "{} already exists",
                path.display()
            )));
        }
        std::fs::write(path, DEFAULT_CONFIG).map_err(|e| ExportError::io_write(path, e))
    }
}

struct IniValues {
    values: HashMap<String, String>,
}

impl IniValues {
    fn parse(text: &str) -> Self {
        let values = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with(';'))
            .filter_map(|line| line.split_once('='))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();
        Self { values }
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    fn required_path(&self, key: &str) -> ExportResult<PathBuf> {
        self.get(key)
            .map(PathBuf::from)
            .ok_or_else(|| ExportError::configuration(format!("missing required setting '{}'", key)))
    }

    fn positive(&self, key: &str, default: u32) -> ExportResult<u32> {
        let Some(raw) = self.get(key) else {
            return Ok(default);
        };
        match raw.parse::<u32>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(ExportError::configuration(format!(
                "'{}' must be a positive integer, got '{}'",
                key, raw
            ))),
        }
    }

    fn flag(&self, key: &str, default: bool) -> ExportResult<bool> {
        let Some(raw) = self.get(key) else {
            return Ok(default);
        };
        match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(ExportError::configuration(format!(
                "'{}' must be 0 or 1, got '{}'",
                key, raw
            ))),
        }
    }
}
