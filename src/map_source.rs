//! Parsed map documents
//!
//! Maps arrive already decoded from their binary container, as JSON:
//!
//! ```json
//! {
//!   "name": "coast",
//!   "width": 2, "height": 2,
//!   "tiles": [0, 1, 0, 0],
//!   "blends": [1, 0, 0, 0],
//!   "blend_descriptors": [{"direction": "right", "flipped": false, "secondary_tile": 1}],
//!   "textures": [{"name": "Grass", "cell_size": 32}, {"name": "Sand", "cell_size": 32}]
//! }
//! ```
//!
//! Layers are row-major with row 0 first. `blends` and `three_way_blends`
//! may be omitted, which means no blending on that layer.

use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::atlas::TextureDecl;
use crate::blend::{BlendDescriptor, DescriptorTable};
use crate::error::{ExportError, ExportResult};
use crate::terrain::{GridError, TerrainGrid};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MapDocument {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub width: usize,
    pub height: usize,
    pub tiles: Vec<u16>,
    #[serde(default)]
    pub blends: Vec<u32>,
    #[serde(default)]
    pub three_way_blends: Vec<u32>,
    #[serde(default)]
    pub blend_descriptors: Vec<BlendDescriptor>,
    #[serde(default)]
    pub textures: Vec<TextureDecl>,
}

impl MapDocument {
    /// Validate dimensions and split the document into a tile grid.
    pub fn to_grid(&self) -> Result<TerrainGrid, GridError> {
        TerrainGrid::new(
            self.width,
            self.height,
            self.tiles.clone(),
            self.blends.clone(),
            self.three_way_blends.clone(),
        )
    }

    pub fn descriptor_table(&self) -> DescriptorTable {
        DescriptorTable::new(&self.blend_descriptors)
    }

    /// Declared name, or the file stem when the document has none.
    pub fn display_name(&self, path: &Path) -> String {
        self.name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "map".to_string())
    }
}

/// Output folder for a map file: its file stem. Stems that are not a
/// single plain path component are rejected.
pub fn output_folder_name(path: &Path) -> ExportResult<String> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut components = Path::new(&stem).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(stem),
        _ => Err(ExportError::map_read(
            path,
            format!("'{}' cannot be used as an output folder name", stem),
        )),
    }
}

/// A decoded map ready for compositing.
#[derive(Debug)]
pub struct LoadedMap {
    /// Declared map name, reported in the manifest
    pub name: String,
    /// Output folder name, unique per map file
    pub folder: String,
    pub document: MapDocument,
    pub grid: TerrainGrid,
}

/// Source of decoded maps.
pub trait MapReader: Send + Sync {
    /// File extension (without the dot) this reader accepts.
    fn extension(&self) -> &str;

    fn read(&self, path: &Path) -> ExportResult<LoadedMap>;
}

/// Reads `*.json` map documents.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonMapReader;

impl JsonMapReader {
    pub fn parse(&self, path: &Path, text: &str) -> ExportResult<LoadedMap> {
        let document: MapDocument =
            serde_json::from_str(text).map_err(|e| ExportError::map_read(path, e.to_string()))?;
        let grid = document
            .to_grid()
            .map_err(|e| ExportError::map_read(path, e.to_string()))?;
        Ok(LoadedMap {
            name: document.display_name(path),
            folder: output_folder_name(path)?,
            document,
            grid,
        })
    }
}

impl MapReader for JsonMapReader {
    fn extension(&self) -> &str {
        "json"
    }

    fn read(&self, path: &Path) -> ExportResult<LoadedMap> {
        let text = std::fs::read_to_string(path).map_err(|e| ExportError::map_read(path, e.to_string()))?;
        self.parse(path, &text)
    }
}
