use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;

use tilemap_exporter::config::{ExportConfig, DEFAULT_CONFIG_FILE};
use tilemap_exporter::export::run_batch;
use tilemap_exporter::ExportResult;

#[derive(Parser, Debug)]
#[command(name = "tilemap-exporter")]
#[command(about = "Export terrain tile maps to blended preview images and tile manifests")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Write a default configuration file and exit
    #[arg(long)]
    init_config: bool,

    /// Folder with decoded map documents (overrides path_to_maps_folder)
    #[arg(long)]
    maps: Option<PathBuf>,

    /// Folder with terrain texture images (overrides path_to_textures_folder)
    #[arg(long)]
    textures: Option<PathBuf>,

    /// Output folder (overrides path_to_output)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Terrain mapping file (overrides path_to_terrain_ini)
    #[arg(long)]
    terrain_ini: Option<PathBuf>,

    /// Folder with the four blend mask images (overrides path_to_blend_masks)
    #[arg(long)]
    masks: Option<PathBuf>,

    /// Skip the blend passes
    #[arg(long)]
    no_blend: bool,

    /// Also split previews into blocks
    #[arg(long)]
    split_blocks: bool,

    /// Number of maps exported in parallel (default: one per core)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply_overrides(&self, config: &mut ExportConfig) {
        if let Some(dir) = &self.maps {
            config.maps_dir = dir.clone();
        }
        if let Some(dir) = &self.textures {
            config.textures_dir = dir.clone();
        }
        if let Some(dir) = &self.output {
            config.output_dir = dir.clone();
        }
        if let Some(path) = &self.terrain_ini {
            config.terrain_ini = path.clone();
        }
        if let Some(dir) = &self.masks {
            config.masks_dir = dir.clone();
        }
        if self.no_blend {
            config.blend_tiles = false;
        }
        if self.split_blocks {
            config.split_image_by_blocks = true;
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::from(2)
        }
    }
}

fn run(args: &Args) -> ExportResult<ExitCode> {
    if args.init_config {
        ExportConfig::write_default(&args.config)?;
        println!("Wrote default configuration to {}", args.config.display());
        return Ok(ExitCode::SUCCESS);
    }

    if !args.config.exists() {
        ExportConfig::write_default(&args.config)?;
        println!(
            "No configuration found. Created {}; review the paths and run again.",
            args.config.display()
        );
        return Ok(ExitCode::from(1));
    }

    let mut config = ExportConfig::load(&args.config)?;
    args.apply_overrides(&mut config);
    log::debug!("{:?}", config);

    let report = run_batch(&config, args.jobs)?;
    if report.has_failures() {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
