//! Map export pipeline
//!
//! `export_map` turns one decoded map into its output folder:
//! - `tilemap.png`: composited preview (when previews are enabled)
//! - `tilemap.json`: per-tile manifest
//! - `blocks/` + `blocks.json`: split preview (when block splitting is enabled)
//!
//! `run_batch` exports every map in the maps folder in parallel. Each map runs
//! behind its own isolation boundary, so one failing or panicking map only
//! produces an error line and an entry in `export-report.json`.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use colored::Colorize;
use rayon::prelude::*;
use serde::Serialize;

use crate::atlas::{TextureAtlas, TextureCache};
use crate::blocks::{save_png, write_blocks};
use crate::compositor::{CompositeStats, Compositor};
use crate::config::ExportConfig;
use crate::error::{ExportError, ExportResult};
use crate::manifest::{write_json, Manifest};
use crate::map_source::{JsonMapReader, MapReader};
use crate::masks::MaskLibrary;
use crate::terrain_ini::TerrainMappings;

pub const PREVIEW_FILE: &str = "tilemap.png";
pub const MANIFEST_FILE: &str = "tilemap.json";
pub const REPORT_FILE: &str = "export-report.json";

/// What one successful map export produced.
#[derive(Clone, Debug, Serialize)]
pub struct MapSummary {
    pub name: String,
    pub output_dir: PathBuf,
    pub width: usize,
    pub height: usize,
    /// Tiles listed in the manifest
    pub tiles: usize,
    pub blocks: usize,
    pub stats: CompositeStats,
}

/// Export one map file into `<output>/<file stem>/`.
///
/// With blending enabled but no mask library, the blend passes are skipped
/// and the map still exports with a warning.
pub fn export_map(
    path: &Path,
    config: &ExportConfig,
    cache: &TextureCache,
    masks: Option<&MaskLibrary>,
    reader: &dyn MapReader,
) -> ExportResult<MapSummary> {
    let map = reader.read(path)?;
    let out_dir = config.output_dir.join(&map.folder);
    std::fs::create_dir_all(&out_dir).map_err(|e| ExportError::io_write(&out_dir, e))?;

    let mut summary = MapSummary {
        name: map.name.clone(),
        output_dir: out_dir.clone(),
        width: map.grid.width(),
        height: map.grid.height(),
        tiles: 0,
        blocks: 0,
        stats: CompositeStats::default(),
    };
    if !config.generate_tilemap {
        log::warn!("{}: nothing exported, generate_tilemap is off", map.name);
        return Ok(summary);
    }

    let (atlas, texture_errors) = TextureAtlas::build(
        &map.document.textures,
        config.tile_size,
        config.addressing,
        |decl| cache.get_or_load(&decl.name),
    );
    log::debug!(
        "{}: {} of {} textures loaded, {} cells",
        map.name,
        atlas.entries().len(),
        map.document.textures.len(),
        atlas.total_cells()
    );

    let descriptors = map.document.descriptor_table();
    let masks = masks.filter(|_| config.blend_tiles);
    let result = Compositor::new(
        &map.grid,
        &descriptors,
        &atlas,
        masks,
        config.preview_tile_size,
    )
    .composite();

    summary.stats = result.stats;
    for (i, error) in texture_errors.into_iter().enumerate() {
        summary.stats.warnings.insert(i, error.to_string());
        log::warn!("{}: {}", map.name, error);
    }
    if config.blend_tiles && masks.is_none() {
        summary
            .stats
            .warn(format!("{}: blend masks unavailable, blend passes skipped", map.name));
    }

    if config.generate_previews {
        save_png(&result.raster, &out_dir.join(PREVIEW_FILE))?;
        if config.split_image_by_blocks {
            let index = write_blocks(&result.raster, &out_dir, config.block_size, config.preview_tile_size)?;
            summary.blocks = index.blocks.len();
        }
    }

    let manifest = Manifest::build(
        &map.name,
        &map.document,
        config.tile_size,
        &atlas,
        cache,
        &result.tiles,
    );
    manifest.write(&out_dir.join(MANIFEST_FILE))?;
    summary.tiles = manifest.tiles.len();

    Ok(summary)
}

/// Outcome for one map in the batch report.
#[derive(Clone, Debug, Serialize)]
pub struct MapReport {
    pub map: String,
    pub success: bool,
    pub error: Option<String>,
    pub elapsed_seconds: f64,
    pub summary: Option<MapSummary>,
}

#[derive(Clone, Debug, Serialize)]
pub struct BatchReport {
    pub generated_at: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub maps: Vec<MapReport>,
}

impl BatchReport {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Map files with the reader's extension, sorted by path.
pub fn discover_maps(dir: &Path, extension: &str) -> ExportResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        ExportError::configuration(format!("cannot list maps folder {}: {}", dir.display(), e))
    })?;
    let mut maps: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .map(|e| e.eq_ignore_ascii_case(extension))
                .unwrap_or(false)
        })
        .collect();
    maps.sort();
    Ok(maps)
}

/// Export every map in the configured folder and write the batch report.
///
/// Only configuration problems (unreadable maps folder, bad `jobs`) fail the
/// run itself. Blend masks that fail to load disable blending for every map.
pub fn run_batch(config: &ExportConfig, jobs: Option<usize>) -> ExportResult<BatchReport> {
    println!("Maps folder:     {}", config.maps_dir.display());
    println!("Textures folder: {}", config.textures_dir.display());
    println!("Output folder:   {}", config.output_dir.display());
    println!("Terrain ini:     {}", config.terrain_ini.display());

    let mappings = Arc::new(TerrainMappings::load(&config.terrain_ini)?);
    println!("Loaded {} terrain texture mappings", mappings.len());

    let masks = if config.blend_tiles {
        match MaskLibrary::load(&config.masks_dir, config.tile_size) {
            Ok(masks) => Some(masks),
            Err(e) => {
                log::warn!("{}", e);
                println!("{} {}; exporting without blending", "warning:".yellow().bold(), e);
                None
            }
        }
    } else {
        None
    };

    let reader = JsonMapReader;
    let maps = discover_maps(&config.maps_dir, reader.extension())?;
    std::fs::create_dir_all(&config.output_dir)
        .map_err(|e| ExportError::io_write(&config.output_dir, e))?;

    if maps.is_empty() {
        println!("No .{} maps found in {}", reader.extension(), config.maps_dir.display());
    } else {
        println!("Exporting {} maps...", maps.len());
    }

    let (maps, duplicates) = claim_output_folders(maps);
    let cache = TextureCache::new(&config.textures_dir, mappings);
    let batch_start = Instant::now();
    let export_all = || -> Vec<MapReport> {
        maps.par_iter()
            .map(|path| export_isolated(path, config, &cache, masks.as_ref(), &reader))
            .collect()
    };
    let mut reports = match jobs {
        Some(n) => rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build()
            .map_err(|e| ExportError::configuration(format!("cannot start {} workers: {}", n, e)))?
            .install(export_all),
        None => export_all(),
    };
    reports.extend(duplicates.into_iter().map(|(path, first)| {
        let error = format!("output folder is already used by {}", first.display());
        report_outcome(&path, 0.0, Err(error))
    }));
    reports.sort_by(|a, b| a.map.cmp(&b.map));

    let failed = reports.iter().filter(|r| !r.success).count();
    let report = BatchReport {
        generated_at: Local::now().to_rfc3339(),
        total: reports.len(),
        succeeded: reports.len() - failed,
        failed,
        maps: reports,
    };
    let report_path = config.output_dir.join(REPORT_FILE);
    write_json(&report_path, &report)?;

    print_summary(&report, batch_start.elapsed().as_secs_f64(), &report_path);
    Ok(report)
}

/// Split maps into those that own their output folder and those whose file
/// stem repeats an earlier one (case-insensitively), paired with that map.
fn claim_output_folders(maps: Vec<PathBuf>) -> (Vec<PathBuf>, Vec<(PathBuf, PathBuf)>) {
    let mut owners: HashMap<String, PathBuf> = HashMap::new();
    let mut unique = Vec::with_capacity(maps.len());
    let mut duplicates = Vec::new();
    for path in maps {
        let key = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match owners.get(&key) {
            Some(first) => duplicates.push((path, first.clone())),
            None => {
                owners.insert(key, path.clone());
                unique.push(path);
            }
        }
    }
    (unique, duplicates)
}

fn export_isolated(
    path: &Path,
    config: &ExportConfig,
    cache: &TextureCache,
    masks: Option<&MaskLibrary>,
    reader: &dyn MapReader,
) -> MapReport {
    let start = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        export_map(path, config, cache, masks, reader)
    }));
    let outcome = match outcome {
        Ok(Ok(summary)) => Ok(summary),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => Err(format!("export panicked: {}", panic_message(payload.as_ref()))),
    };
    report_outcome(path, start.elapsed().as_secs_f64(), outcome)
}

/// Print the summary line for one map and turn it into a report entry.
fn report_outcome(path: &Path, elapsed: f64, outcome: Result<MapSummary, String>) -> MapReport {
    let map = path.display().to_string();
    let time_str = format!("{:.1}s", elapsed).dimmed();

    match &outcome {
        Ok(s) => {
            let warnings = if s.stats.warnings.is_empty() {
                String::new()
            } else {
                format!(" ({} warnings)", s.stats.warnings.len()).yellow().to_string()
            };
            println!(
                "  {} {} {} {} tiles, {} blends{} {}",
                "✓ OK".green().bold(),
                s.name,
                "•".dimmed(),
                s.tiles,
                s.stats.primary_blends + s.stats.three_way_blends,
                warnings,
                time_str
            );
        }
        Err(e) => {
            println!("  {} {} {} {}: {}", "✗ ERROR".red().bold(), map, "•".dimmed(), time_str, e);
        }
    }

    let (summary, error) = match outcome {
        Ok(summary) => (Some(summary), None),
        Err(e) => (None, Some(e)),
    };
    MapReport {
        map,
        success: error.is_none(),
        error,
        elapsed_seconds: elapsed,
        summary,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn print_summary(report: &BatchReport, elapsed: f64, report_path: &Path) {
    println!("\n{}", "=".repeat(60));
    println!(
        "{} {} {}",
        "Export Summary".bold(),
        "•".dimmed(),
        format!("{:.1}s total", elapsed).dimmed()
    );
    println!("  Total:     {}", report.total);
    println!(
        "  Succeeded: {}",
        if report.failed == 0 {
            report.succeeded.to_string().green()
        } else {
            report.succeeded.to_string().normal()
        }
    );
    println!(
        "  Failed:    {}",
        if report.failed > 0 {
            report.failed.to_string().red()
        } else {
            report.failed.to_string().normal()
        }
    );
    println!("Report: {}", report_path.display());
}
