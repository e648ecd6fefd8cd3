//! Fortune Teller CLI - Bridge interface for the upload service
//!
//! Commands: extract, composites, split, reconstruct, reconstruct-composites,
//! clean, catalog
//! Outputs JSON to stdout, logs to stderr
//! Returns non-zero on failure

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use fortuneteller_core::{
    encode_data_uri, raster::RasterOptions, DebugDirObserver, Extractor, ProcessError,
    ProcessorConfig, Reconstruction, Reconstructor, RunManifest,
};

#[derive(Parser)]
#[command(name = "fortuneteller-cli")]
#[command(about = "Fortune Teller CLI - puzzle segmentation and reconstruction")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a JSON processor config
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write intermediate images into this directory
    #[arg(long)]
    debug_dir: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract every segment from a source image
    Extract {
        image: PathBuf,
        out_dir: PathBuf,

        /// Embed each PNG as a data URI in the output
        #[arg(long)]
        inline: bool,
    },

    /// Generate every composite from a source image
    Composites { image: PathBuf, out_dir: PathBuf },

    /// Split composites back into segments
    Split { composites_dir: PathBuf, out_dir: PathBuf },

    /// Rebuild the puzzle from segment files
    Reconstruct {
        segments_dir: PathBuf,
        output: PathBuf,

        /// Canvas size, overrides the config
        #[arg(short, long)]
        size: Option<u32>,
    },

    /// Rebuild the puzzle from composite files
    ReconstructComposites {
        composites_dir: PathBuf,
        output: PathBuf,

        /// Canvas size, overrides the config
        #[arg(short, long)]
        size: Option<u32>,
    },

    /// Rotate, crop and edge-clean one segment image
    Clean {
        image: PathBuf,
        output: PathBuf,

        #[arg(short, long, default_value_t = 0.0, allow_negative_numbers = true)]
        rotation: f64,

        #[arg(long)]
        no_clean_edges: bool,
    },

    /// Print the corrected catalog
    Catalog {
        #[arg(short, long)]
        size: Option<u32>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
            ExitCode::SUCCESS
        }
        Err(e) => {
            let output = serde_json::json!({
                "success": false,
                "error": e.to_string(),
            });
            println!("{}", output);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<serde_json::Value, ProcessError> {
    let config = match &cli.config {
        Some(path) => ProcessorConfig::load(path)?,
        None => ProcessorConfig::default(),
    };

    match &cli.command {
        Commands::Extract { image, out_dir, inline } => {
            let extractor = open_extractor(cli, image, &config)?;
            let manifest = extractor.extract_all(out_dir)?;
            let mut output = serde_json::json!({ "success": true, "manifest": manifest });
            if *inline {
                output["segments"] = inline_files(out_dir, &manifest)?;
            }
            Ok(output)
        }

        Commands::Composites { image, out_dir } => {
            let extractor = open_extractor(cli, image, &config)?;
            let manifest = extractor.generate_all_composites(out_dir)?;
            Ok(serde_json::json!({
                "success": manifest.failures.is_empty(),
                "manifest": manifest,
            }))
        }

        Commands::Split { composites_dir, out_dir } => {
            let reconstructor = build_reconstructor(cli, &config, None)?;
            let manifest = reconstructor.layout().split_all_composites(composites_dir, out_dir)?;
            Ok(serde_json::json!({ "success": true, "manifest": manifest }))
        }

        Commands::Reconstruct { segments_dir, output, size } => {
            let reconstructor = build_reconstructor(cli, &config, *size)?;
            let result = reconstructor.reconstruct(segments_dir, Some(output.as_path()))?;
            reconstruction_report(&result, output)
        }

        Commands::ReconstructComposites { composites_dir, output, size } => {
            let reconstructor = build_reconstructor(cli, &config, *size)?;
            let result =
                reconstructor.reconstruct_from_composites(composites_dir, Some(output.as_path()))?;
            reconstruction_report(&result, output)
        }

        Commands::Clean { image: input, output, rotation, no_clean_edges } => {
            let segment = image::open(input)?.into_rgba8();
            let cleaned =
                RasterOptions::from(&config).process_segment(&segment, *rotation, !no_clean_edges);
            let written = fortuneteller_core::manifest::write_png("cleaned", &cleaned, output)?;
            Ok(serde_json::json!({ "success": true, "file": written }))
        }

        Commands::Catalog { size } => {
            let reconstructor = build_reconstructor(cli, &config, *size)?;
            Ok(serde_json::json!({
                "size": reconstructor.layout().size(),
                "catalog": reconstructor.layout().catalog(),
            }))
        }
    }
}

fn open_extractor(
    cli: &Cli,
    image: &Path,
    config: &ProcessorConfig,
) -> Result<Extractor, ProcessError> {
    let mut extractor = Extractor::open(image, config)?;
    if let Some(dir) = &cli.debug_dir {
        extractor.layout_mut().set_observer(Box::new(DebugDirObserver::new(dir)?));
    }
    Ok(extractor)
}

fn build_reconstructor(
    cli: &Cli,
    config: &ProcessorConfig,
    size: Option<u32>,
) -> Result<Reconstructor, ProcessError> {
    let config = match size {
        Some(size) => config.clone().with_template_size(size),
        None => config.clone(),
    };
    let mut reconstructor = Reconstructor::new(&config)?;
    if let Some(dir) = &cli.debug_dir {
        reconstructor.layout_mut().set_observer(Box::new(DebugDirObserver::new(dir)?));
    }
    Ok(reconstructor)
}

fn inline_files(dir: &Path, manifest: &RunManifest) -> Result<serde_json::Value, ProcessError> {
    let mut segments = serde_json::Map::new();
    for file in &manifest.files {
        let bytes = fs::read(dir.join(&file.filename))?;
        segments.insert(file.id.clone(), encode_data_uri(&bytes).into());
    }
    Ok(segments.into())
}

fn reconstruction_report(
    result: &Reconstruction,
    output: &Path,
) -> Result<serde_json::Value, ProcessError> {
    let bytes = fs::read(output)?;
    Ok(serde_json::json!({
        "success": true,
        "placed": result.placed,
        "missing": result.missing,
        "file": result.saved,
        "image": encode_data_uri(&bytes),
    }))
}
