//! Per-map tile manifest
//!
//! Describes which atlas cell and blend state produced each tile of the
//! preview raster. Keys are PascalCase for the engine-side importer.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::atlas::{TextureAtlas, TextureCache};
use crate::blend::{BlendDirection, EffectiveDirection};
use crate::compositor::TileRecord;
use crate::error::{ExportError, ExportResult};
use crate::map_source::MapDocument;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Manifest {
    pub map_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub dimensions: Dimensions,
    /// Sum of the cell ranges of all loaded textures
    pub texture_cell_count: u32,
    pub tiles: Vec<TileEntry>,
    pub textures: Vec<TextureEntry>,
    pub blend_descriptions: Vec<BlendDescription>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Dimensions {
    pub width: usize,
    pub height: usize,
    pub tile_size: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TileEntry {
    pub cell: Point,
    pub tile_value: u16,
    pub texture_index: usize,
    pub texture_offset: Point,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blend: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub three_way_blend: Option<u32>,
}

impl From<&TileRecord> for TileEntry {
    fn from(record: &TileRecord) -> Self {
        Self {
            cell: Point {
                x: i64::from(record.coord.x),
                y: i64::from(record.coord.y),
            },
            tile_value: record.tile_value,
            texture_index: record.texture_index,
            texture_offset: Point {
                x: i64::from(record.cell_offset.0),
                y: i64::from(record.cell_offset.1),
            },
            blend: record.blend,
            three_way_blend: record.three_way_blend,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TextureEntry {
    pub index: usize,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normal_map_file_name: Option<String>,
    /// Atlas image width in pixels, 0 when the image did not load
    pub size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell_start: Option<u32>,
    pub cell_count: u32,
    pub cell_size: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BlendDescription {
    pub direction: BlendDirection,
    pub flipped: bool,
    pub secondary_texture_tile: u32,
    pub effective_direction: EffectiveDirection,
}

/// `grass.tga` -> `grass_nrm.tga`; names without an extension get the suffix appended.
pub fn normal_map_name(file: &str) -> String {
    match file.rfind('.') {
        Some(dot) if dot > 0 => format!("{}_nrm{}", &file[..dot], &file[dot..]),
        _ => format!("{}_nrm", file),
    }
}

impl Manifest {
    pub fn build(
        map_name: &str,
        document: &MapDocument,
        tile_size: u32,
        atlas: &TextureAtlas,
        cache: &TextureCache,
        tiles: &[TileRecord],
    ) -> Self {
        let textures = document
            .textures
            .iter()
            .enumerate()
            .map(|(index, decl)| {
                let file_name = cache.file_name(&decl.name).map(str::to_lowercase);
                let entry = atlas.entry_for_declared(index);
                TextureEntry {
                    index,
                    name: decl.name.clone(),
                    normal_map_file_name: file_name.as_deref().map(normal_map_name),
                    file_name,
                    size: entry.map_or(0, |e| e.image.width()),
                    cell_start: entry.map(|e| e.cell_start),
                    cell_count: entry.map_or(0, |e| e.cell_count),
                    cell_size: if decl.cell_size > 0 { decl.cell_size } else { tile_size },
                }
            })
            .collect();

        let blend_descriptions = document
            .blend_descriptors
            .iter()
            .map(|d| BlendDescription {
                direction: d.direction,
                flipped: d.flipped,
                secondary_texture_tile: d.secondary_tile,
                effective_direction: d.effective_direction(),
            })
            .collect();

        Self {
            map_name: map_name.to_string(),
            description: document.description.clone(),
            dimensions: Dimensions {
                width: document.width,
                height: document.height,
                tile_size,
            },
            texture_cell_count: atlas.total_cells(),
            tiles: tiles.iter().map(TileEntry::from).collect(),
            textures,
            blend_descriptions,
        }
    }

    pub fn write(&self, path: &Path) -> ExportResult<()> {
        write_json(path, self)
    }
}

/// Pretty-print a value to a JSON file.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> ExportResult<()> {
    let file = File::create(path).map_err(|e| ExportError::io_write(path, e))?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::{TextureDecl, TileAddressing};
    use crate::blend::DescriptorTable;
    use crate::compositor::Compositor;
    use crate::terrain_ini::TerrainMappings;
    use image::{Rgba, RgbaImage};
    use std::sync::Arc;

    #[test]
    fn test_normal_map_name() {
        assert_eq!(normal_map_name("grass.tga"), "grass_nrm.tga");
        assert_eq!(normal_map_name("rock.v2.png"), "rock.v2_nrm.png");
        assert_eq!(normal_map_name("sand"), "sand_nrm");
    }

    fn document() -> MapDocument {
        serde_json::from_str(
            r#"{
                "name": "delta",
                "description": "river mouth",
                "width": 3, "height": 2,
                "tiles": [0, 1, 2, 3, 9, 5],
                "blends": [0, 1, 0, 0, 0, 0],
                "blend_descriptors": [{"direction": "top", "flipped": true, "secondary_tile": 2}],
                "textures": [
                    {"name": "Grass", "cell_size": 4},
                    {"name": "Missing", "cell_size": 4},
                    {"name": "Sand", "cell_size": 4}
                ]
            }"#,
        )
        .unwrap()
    }

    fn build() -> Manifest {
        let doc = document();
        let mappings = TerrainMappings::from_pairs([("Grass", "Grass.TGA"), ("Sand", "sand")]);
        let cache = TextureCache::new("unused", Arc::new(mappings));
        cache.insert("Grass", RgbaImage::from_pixel(8, 4, Rgba([1, 2, 3, 255])));
        cache.insert("Sand", RgbaImage::from_pixel(8, 8, Rgba([4, 5, 6, 255])));

        let (atlas, warnings) =
            TextureAtlas::build(&doc.textures, 4, TileAddressing::Cell, |d| cache.get_or_load(&d.name));
        assert_eq!(warnings.len(), 1);

        let grid = doc.to_grid().unwrap();
        let descriptors = DescriptorTable::new(&doc.blend_descriptors);
        let result = Compositor::new(&grid, &descriptors, &atlas, None, 4).composite();
        Manifest::build("delta", &doc, 4, &atlas, &cache, &result.tiles)
    }

    #[test]
    fn test_tile_count_excludes_unresolved_values() {
        let manifest = build();
        // Grass owns [0, 2), Sand (shifted down) owns [2, 6); 9 is outside.
        assert_eq!(manifest.texture_cell_count, 6);
        assert_eq!(manifest.tiles.len(), 3 * 2 - 1);
        for tile in &manifest.tiles {
            let expected = if tile.tile_value < 2 { 0 } else { 2 };
            assert_eq!(tile.texture_index, expected, "tile {:?}", tile.cell);
        }
    }

    #[test]
    fn test_textures_list_every_declaration() {
        let manifest = build();
        let grass = &manifest.textures[0];
        assert_eq!(grass.file_name.as_deref(), Some("grass.tga"));
        assert_eq!(grass.normal_map_file_name.as_deref(), Some("grass_nrm.tga"));
        assert_eq!(grass.size, 8);

        let missing = &manifest.textures[1];
        assert_eq!(missing.file_name, None);
        assert_eq!(missing.size, 0);
        assert_eq!(missing.cell_start, None);

        assert_eq!(manifest.textures[2].cell_start, Some(2));
        assert_eq!(manifest.textures[2].normal_map_file_name.as_deref(), Some("sand_nrm"));
    }

    #[test]
    fn test_serialized_keys_are_pascal_case() {
        let manifest = build();
        let value = serde_json::to_value(&manifest).unwrap();
        assert_eq!(value["MapName"], "delta");
        assert_eq!(value["Dimensions"]["TileSize"], 4);
        assert_eq!(value["BlendDescriptions"][0]["EffectiveDirection"], "bottom");
        assert_eq!(value["Tiles"][1]["Cell"]["Y"], 1);
        // Only the tile carrying a blend has the key.
        let with_blend = value["Tiles"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|t| t.get("Blend").is_some())
            .count();
        assert_eq!(with_blend, 1);
    }
}
