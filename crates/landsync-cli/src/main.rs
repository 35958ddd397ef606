//! Watch-folder driver for a tangible landscape terrain scene.
//!
//! Loads `settings.json`, builds the scene, empties the watch folder and then
//! polls it on a fixed interval until Ctrl-C.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use landsync::{Engine, FileImporter, PollReport, Prefs, RasterOptions, Settings};

#[derive(Parser)]
#[command(about = "Keep a terrain scene in sync with a tangible landscape watch folder")]
struct CliArgs {
    /// Settings file.
    #[arg(long, default_value = "settings.json")]
    settings: PathBuf,

    /// Watch folder, instead of `<folder>/Watch` from the settings.
    #[arg(long)]
    watch_folder: Option<PathBuf>,

    /// Poll interval in seconds, instead of `timer` from the settings.
    #[arg(long)]
    interval: Option<f64>,

    /// Ground distance between raster pixels.
    #[arg(long, default_value_t = 1.0)]
    cell_size: f64,

    /// Load vegetation prototypes before watching.
    #[arg(long)]
    init_assets: bool,

    /// Stop after this many ticks.
    #[arg(long)]
    max_ticks: Option<u64>,
}

fn main() -> ExitCode {
    {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    let args = CliArgs::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &CliArgs) -> landsync::Result<()> {
    let settings = Settings::load(&args.settings)?;
    let mut prefs = match &args.watch_folder {
        Some(folder) => Prefs::with_watch_folder(&settings, folder.clone()),
        None => Prefs::from_settings(&settings),
    };
    if let Some(seconds) = args.interval {
        if !(seconds.is_finite() && seconds > 0.0) {
            return Err(landsync::Error::Config {
                detail: format!("interval must be a positive number of seconds, got {seconds}"),
            });
        }
        prefs.poll_interval = Duration::from_secs_f64(seconds);
    }

    let importer = FileImporter::new(RasterOptions {
        cell_size: args.cell_size,
        ..RasterOptions::default()
    });
    let mut engine = Engine::new(prefs, importer.clone());
    if args.init_assets {
        let report = engine.initialize_assets(&importer);
        tracing::info!(
            "Prototypes loaded: {}, already present: {}",
            report.loaded.len(),
            report.present.len()
        );
        for (class, error) in &report.failed {
            tracing::warn!("Prototype {class} not loaded: {error}");
        }
    }

    runtime()?.block_on(watch(&mut engine, args.max_ticks))
}

fn runtime() -> landsync::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .enable_io()
        .build()
        .map_err(|e| landsync::Error::Config {
            detail: format!("cannot start async runtime: {e}"),
        })
}

/// Poll on every timer tick until Ctrl-C or the tick limit.
async fn watch(engine: &mut Engine, max_ticks: Option<u64>) -> landsync::Result<()> {
    let mut watch = engine.arm()?;
    let mut interval = tokio::time::interval(engine.prefs().poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut tick = 0u64;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                tick += 1;
                if let Some(report) = watch.on_tick(tick, engine) {
                    log_report(&report);
                }
                if max_ticks.is_some_and(|max| tick >= max) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }
    watch.cancel();
    Ok(())
}

fn log_report(report: &PollReport) {
    if let Some(update) = &report.terrain {
        tracing::info!(
            "Terrain {:.0} x {:.0}",
            update.dimensions.x,
            update.dimensions.y
        );
    }
    if !report.planted.is_empty() {
        tracing::info!("Vegetation: {}", report.planted.join(", "));
    }
    for (artifact, error) in &report.failures {
        tracing::warn!("{artifact} not applied: {error}");
    }
}
