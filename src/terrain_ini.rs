//! Terrain mapping loader
//!
//! Reads the text file that binds terrain names to texture image files:
//!
//! ```text
//! Terrain GrassLight
//!   Texture = grass_light.tga
//! End
//!
//! ; Terrain OldGrass        <- commented-out block, skipped up to its End
//! ;   Texture = old.tga
//! ; End
//! ```

use std::collections::HashMap;
use std::path::Path;

use crate::error::{ExportError, ExportResult};

/// One `Terrain` block with a bound texture file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureMapping {
    pub index: usize,
    pub terrain: String,
    pub file: String,
}

/// Ordered terrain -> file mappings with name lookup.
#[derive(Clone, Debug, Default)]
pub struct TerrainMappings {
    mappings: Vec<TextureMapping>,
    by_name: HashMap<String, usize>,
}

impl TerrainMappings {
    /// Load a mapping file. A missing file yields an empty table.
    pub fn load(path: &Path) -> ExportResult<Self> {
        if !path.exists() {
            log::warn!("terrain mapping file not found at {}", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            ExportError::configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok(Self::parse(&text))
    }

    pub fn parse(text: &str) -> Self {
        let mut parser = Parser::default();
        for line in text.lines() {
            parser.line(line.trim());
        }
        parser.finish()
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        let mut table = Self::default();
        for (terrain, file) in pairs {
            table.push(terrain.into(), file.into());
        }
        table
    }

    fn push(&mut self, terrain: String, file: String) {
        let index = self.mappings.len();
        // Later declarations of the same terrain win the lookup.
        self.by_name.insert(terrain.clone(), index);
        self.mappings.push(TextureMapping {
            index,
            terrain,
            file,
        });
    }

    pub fn file_for(&self, terrain: &str) -> Option<&str> {
        self.by_name
            .get(terrain)
            .map(|&i| self.mappings[i].file.as_str())
    }

    pub fn mappings(&self) -> &[TextureMapping] {
        &self.mappings
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

#[derive(Default)]
struct Parser {
    table: TerrainMappings,
    current: Option<String>,
    in_comment_block: bool,
}

impl Parser {
    fn line(&mut self, line: &str) {
        if line.is_empty() {
            return;
        }

        if let Some(comment) = line.strip_prefix(';') {
            let comment = comment.trim_start();
            if comment.starts_with("Terrain ") {
                self.in_comment_block = true;
            } else if comment.starts_with("End") {
                self.in_comment_block = false;
            }
            return;
        }

        let line = strip_trailing_comment(line);

        if self.in_comment_block {
            if line.starts_with("End") {
                self.in_comment_block = false;
            }
            return;
        }

        if let Some(name) = line.strip_prefix("Terrain ") {
            self.current = Some(name.trim().to_string());
        } else if line == "End" {
            self.current = None;
        } else if let Some(value) = key_value(line, "Texture") {
            if let Some(terrain) = &self.current {
                self.table.push(terrain.clone(), value.to_string());
            }
        }
    }

    fn finish(self) -> TerrainMappings {
        self.table
    }
}

fn strip_trailing_comment(line: &str) -> &str {
    match line.find(';') {
        Some(pos) => line[..pos].trim_end(),
        None => line,
    }
}

fn key_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let (k, v) = line.split_once('=')?;
    (k.trim() == key).then(|| v.trim()).filter(|v| !v.is_empty())
}
