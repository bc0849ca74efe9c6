//! coastcam-merge - CoastCam multi-camera merge tool
//!
//! Aligns the time-exposure captures of a station's cameras by timestamp
//! and writes one rectified, merged image per timestamp to
//! `cameras/{station}/cx/merge/{year}/{day}/`.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use coastcam_common::config::{CalibrationSourceKind, TomlConfig};
use coastcam_merge::db;
use coastcam_merge::paths::CaptureVariant;
use coastcam_merge::services::{
    build_roster, cameras_from_database, classify_location, plan, run_days, run_timestamp,
    CalibrationSource, CameraRegistry, CommandRectifier, DatabaseSource, DayMerger,
    MergeDispatcher, PlannedWork, RunSummary, Scope, StoreYamlSource, UploadIngestor,
    YamlDirSource,
};
use coastcam_merge::storage::{LocalStore, ObjectStore, RetryingStore};
use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "coastcam-merge", version, about = "Merge CoastCam time-exposure images")]
struct Args {
    /// Configuration file
    #[arg(long, env = "COASTCAM_CONFIG")]
    config: Option<PathBuf>,

    /// Local directory holding the bucket
    #[arg(long, env = "COASTCAM_STORE_ROOT")]
    store_root: Option<PathBuf>,

    /// Concurrent day-units for year and station scopes
    #[arg(long, env = "COASTCAM_WORKERS")]
    workers: Option<usize>,

    /// Local copies of merged images
    #[arg(long, env = "COASTCAM_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge a station, year, day or single capture
    Merge {
        /// e.g. s3://bucket/cameras/caco-01/c1/2019/347_Dec.13
        location: Option<String>,
    },
    /// Copy an upload into the raw layout and merge it if it is a time exposure
    Ingest {
        /// e.g. cameras/caco-01/products/1576270801.c1.timex.jpg
        upload_key: String,

        /// Copy only
        #[arg(long)]
        no_merge: bool,
    },
    /// Copy unpadded day folders to their canonical names
    NormalizeDays { station: String },
    /// Count capture variants in a day folder
    Census {
        station: String,
        camera: String,
        year: String,
        day: String,
    },
}

/// Everything a command needs
struct AppContext {
    config: TomlConfig,
    store: Arc<dyn ObjectStore>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let (mut config, config_path) = TomlConfig::load_or_default(args.config.as_deref())?;
    if args.store_root.is_some() {
        config.store_root = args.store_root.clone();
    }
    if args.workers.is_some() {
        config.workers = args.workers;
    }
    if args.scratch_dir.is_some() {
        config.scratch_dir = args.scratch_dir.clone();
    }
    if config.workers == Some(0) {
        bail!("--workers must be at least 1");
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting coastcam-merge v{}", env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => info!(path = %path.display(), "Loaded configuration"),
        None => warn!("No configuration file found, using compiled defaults"),
    }

    let store_root = config.store_root.clone().ok_or_else(|| {
        anyhow!("No store root configured (--store-root, COASTCAM_STORE_ROOT or store_root)")
    })?;
    info!("Store root: {}", store_root.display());

    let store: Arc<dyn ObjectStore> = Arc::new(RetryingStore::new(
        LocalStore::new(store_root),
        config.retry.into(),
    ));
    let ctx = AppContext { config, store };

    match args.command {
        Command::Merge { location } => {
            let scope = read_location(location)?;
            let summary = run_merge(&ctx, &scope).await?;
            Ok(report(&summary))
        }
        Command::Ingest {
            upload_key,
            no_merge,
        } => {
            let ingestor = UploadIngestor::new(ctx.store.clone());
            let ingested = ingestor
                .ingest(&upload_key)
                .await
                .with_context(|| format!("Failed to ingest {}", upload_key))?;
            println!("{}", ingested.raw_key);

            match ingested.merge_scope {
                Some(scope) if !no_merge => {
                    let summary = run_merge(&ctx, &scope).await?;
                    Ok(report(&summary))
                }
                _ => Ok(ExitCode::SUCCESS),
            }
        }
        Command::NormalizeDays { station } => {
            let normalized = UploadIngestor::new(ctx.store.clone())
                .normalize_station_days(&station)
                .await?;
            println!(
                "{} day folders normalized, {} objects copied, {} folders ignored",
                normalized.folders_normalized, normalized.objects_copied, normalized.folders_ignored
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Census {
            station,
            camera,
            year,
            day,
        } => {
            let census = UploadIngestor::new(ctx.store.clone())
                .census(&station, &camera, &year, &day)
                .await?;
            for variant in CaptureVariant::ALL {
                println!("{:>8}  {}", variant.token(), census.count(variant));
            }
            println!("{:>8}  {}", "unparsed", census.unparseable);
            println!("{:>8}  {}", "total", census.total());
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Build the roster, plan the scope and run it
async fn run_merge(ctx: &AppContext, scope: &Scope) -> Result<RunSummary> {
    let station = scope.station();
    info!(scope = %scope, "Merging");

    let registry = CameraRegistry::new(ctx.store.clone());
    let calibration = &ctx.config.calibration;

    let (cameras, source) = match calibration.source {
        CalibrationSourceKind::Database => {
            let pool = db::init_database_pool(&calibration.database_path)
                .await
                .context("Failed to open calibration database")?;
            let cameras = cameras_from_database(&pool, station).await?;
            let source: Box<dyn CalibrationSource> = Box::new(DatabaseSource::new(pool));
            (cameras, source)
        }
        CalibrationSourceKind::Yaml => {
            let source: Box<dyn CalibrationSource> =
                Box::new(YamlDirSource::new(calibration.yaml_dir.clone()));
            (registry.discover_cameras(station).await?, source)
        }
        CalibrationSourceKind::StoreYaml => {
            let source: Box<dyn CalibrationSource> =
                Box::new(StoreYamlSource::new(ctx.store.clone()));
            (registry.discover_cameras(station).await?, source)
        }
    };

    let roster = build_roster(station, &cameras, source.as_ref())
        .await
        .with_context(|| format!("Failed to load calibration for {}", station))?;
    let scope_plan = plan(&registry, &roster.plain_cameras(), scope).await?;

    let dispatcher = MergeDispatcher::new(
        ctx.store.clone(),
        Arc::new(CommandRectifier::from_config(&ctx.config.rectifier)),
        ctx.config.rectifier.grid,
    )
    .with_output_format(ctx.config.output_format)
    .with_scratch_dir(ctx.config.scratch_dir.clone());

    let merger = Arc::new(DayMerger::new(
        ctx.store.clone(),
        dispatcher,
        Arc::new(roster),
        Arc::new(scope_plan.presence),
        ctx.config.duplicate_policy,
    ));

    let summary = match scope_plan.work {
        PlannedWork::Timestamp { day, timestamp } => run_timestamp(&merger, &day, timestamp).await,
        PlannedWork::Days(days) => run_days(merger, days, ctx.config.effective_workers()).await,
    };
    Ok(summary)
}

fn report(summary: &RunSummary) -> ExitCode {
    println!("{}", summary);
    if summary.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Classify the location, prompting again while stdin is a terminal
fn read_location(initial: Option<String>) -> Result<Scope> {
    let interactive = std::io::stdin().is_terminal();
    let mut candidate = initial;

    loop {
        let location = match candidate.take() {
            Some(location) => location,
            None if interactive => prompt("Enter the S3 location to merge: ")?,
            None => bail!("No location given"),
        };

        match classify_location(&location) {
            Ok(scope) => return Ok(scope),
            Err(e) if interactive => eprintln!("Invalid location: {}", e),
            Err(e) => return Err(e.into()),
        }
    }
}

fn prompt(message: &str) -> Result<String> {
    print!("{}", message);
    std::io::stdout().flush()?;

    let mut line = String::new();
    if std::io::stdin().lock().read_line(&mut line)? == 0 {
        bail!("No location given");
    }
    Ok(line.trim().to_string())
}
