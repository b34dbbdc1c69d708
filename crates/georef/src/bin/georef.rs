use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use georef::{
    image_from_rgb, rgb_from_image, GeorefConfig, Georeferencer, MatcherStrategy, SidecarRecord,
    SidecarStore,
};
use georef_core::{init_with_level, BoundingBox, GroundControlPoint};
use georef_tiles::{HttpTileService, ReferenceFetcher};
use log::{error, info, LevelFilter};

#[derive(Parser, Debug)]
#[command(name = "georef", version, about = "Georeference historical aerial photographs")]
struct Cli {
    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Strategy {
    Classical,
    Vision,
    Auto,
}

impl From<Strategy> for MatcherStrategy {
    fn from(s: Strategy) -> Self {
        match s {
            Strategy::Classical => MatcherStrategy::Classical,
            Strategy::Vision => MatcherStrategy::Vision,
            Strategy::Auto => MatcherStrategy::VisionWithClassicalFallback,
        }
    }
}

#[derive(Clone, Copy, Debug, clap::Args)]
struct BboxArgs {
    /// Northern latitude of the search area, degrees
    #[arg(long)]
    north: f64,
    /// Southern latitude of the search area, degrees
    #[arg(long)]
    south: f64,
    /// Eastern longitude of the search area, degrees
    #[arg(long)]
    east: f64,
    /// Western longitude of the search area, degrees
    #[arg(long)]
    west: f64,
}

impl From<BboxArgs> for BoundingBox {
    fn from(b: BboxArgs) -> Self {
        BoundingBox::new(b.north, b.south, b.east, b.west)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download the reference mosaic for a bounding box
    Tiles {
        #[command(flatten)]
        bbox: BboxArgs,

        /// Tile zoom level
        #[arg(long, default_value_t = 17)]
        zoom: u8,

        /// Output image path (format from extension)
        #[arg(long, short)]
        output: PathBuf,
    },

    /// Automatically find ground control points for a photo
    Auto {
        /// Input aerial photograph
        #[arg(long, short)]
        image: PathBuf,

        #[command(flatten)]
        bbox: BboxArgs,

        /// Matcher strategy
        #[arg(long, value_enum, default_value_t = Strategy::Auto)]
        strategy: Strategy,

        /// Output GCP JSON path
        #[arg(long, short)]
        output: PathBuf,
    },

    /// Fit a transform from GCPs and warp the photo
    Fit {
        /// Input aerial photograph
        #[arg(long, short)]
        image: PathBuf,

        /// GCP JSON (list of points, or `auto` command output)
        #[arg(long)]
        gcps: PathBuf,

        /// Output warped image path (format from extension)
        #[arg(long, short)]
        output: PathBuf,

        /// Side-car store directory; the fit is persisted there
        #[arg(long)]
        store: Option<PathBuf>,

        /// Image id for the side-car record (defaults to the file stem)
        #[arg(long)]
        id: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if init_with_level(level).is_err() {
        eprintln!("failed to install logger");
    }

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Tiles { bbox, zoom, output } => {
            let mut config = GeorefConfig::default();
            config.fetch.zoom = zoom;
            let bbox: BoundingBox = bbox.into();
            bbox.validate(&config.limits)?;

            let service = HttpTileService::new(&config.fetch)?;
            let fetcher = ReferenceFetcher::new(service, config.fetch.clone());
            let imagery = fetcher.fetch(&bbox)?;
            let encoded = image_from_rgb(&imagery.raster.pixels)
                .ok_or("mosaic buffer has inconsistent dimensions")?;
            encoded.save(&output)?;
            info!(
                "wrote {}x{} mosaic ({} tiles, {} failures) to {}",
                imagery.raster.pixels.width,
                imagery.raster.pixels.height,
                imagery.tile_count,
                imagery.failures,
                output.display()
            );
            Ok(())
        }

        Command::Auto {
            image,
            bbox,
            strategy,
            output,
        } => {
            let decoded = image::ImageReader::open(&image)?.decode()?.to_rgb8();
            let source = rgb_from_image(&decoded);

            let config = GeorefConfig {
                strategy: strategy.into(),
                ..GeorefConfig::default()
            };
            let set = Georeferencer::new(config).run_auto(&source, bbox.into())?;
            std::fs::write(&output, serde_json::to_vec_pretty(&set)?)?;
            info!(
                "wrote {} GCPs (confidence {:.2}) to {}",
                set.gcps.len(),
                set.confidence,
                output.display()
            );
            Ok(())
        }

        Command::Fit {
            image,
            gcps,
            output,
            store,
            id,
        } => {
            let decoded = image::ImageReader::open(&image)?.decode()?.to_rgb8();
            let source = rgb_from_image(&decoded);
            let points = read_gcps(&gcps)?;

            let runner = Georeferencer::new(GeorefConfig::default());
            let artifact = runner.run_manual(&source, &points)?;
            info!(
                "fit over {} GCPs: RMS {:.1} m",
                points.len(),
                artifact.residuals.rms_m
            );

            let encoded = image_from_rgb(&artifact.warped.pixels)
                .ok_or("warped buffer has inconsistent dimensions")?;
            encoded.save(&output)?;
            info!("wrote warped image to {}", output.display());

            if let Some(dir) = store {
                let image_id = match id {
                    Some(id) => id,
                    None => image
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .ok_or("cannot derive an image id from the input path; pass --id")?
                        .to_owned(),
                };
                let store = SidecarStore::open(dir)?;
                store.save(&image_id, &SidecarRecord::from_artifact(&artifact, &points))?;
                info!("persisted side-car record {image_id}");
            }
            Ok(())
        }
    }
}

/// Accept either a bare GCP array or the `auto` command's full output.
fn read_gcps(path: &PathBuf) -> Result<Vec<GroundControlPoint>, Box<dyn std::error::Error>> {
    let bytes = std::fs::read(path)?;
    if let Ok(points) = serde_json::from_slice::<Vec<GroundControlPoint>>(&bytes) {
        return Ok(points);
    }
    let set: georef_match::GcpSet = serde_json::from_slice(&bytes)?;
    Ok(set.gcps)
}
