//! headtrackd - face tracker daemon
//!
//! This daemon:
//! 1. Loads the tracker configuration (HEADTRACKER_CONFIG + env overrides)
//! 2. Runs a synthetic camera on its own thread, handing frames over keep-only-latest
//! 3. Runs the frame analyzer on a worker thread
//! 4. Repaints the overlay on the main thread whenever the face position changes
//! 5. Optionally writes the last painted overlay as a JPEG snapshot

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use head_tracker::{
    AnalyzerWorker, BackendRegistry, FrameAnalyzer, LatestFrameSlot, OverlayRenderer,
    RasterCanvas, SharedViewGeometry, SourceStats, SyntheticConfig, SyntheticSource,
    TrackerConfig,
};

const REPAINT_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Run time in seconds (0 runs until Ctrl-C).
    #[arg(long, default_value_t = 10)]
    seconds: u64,
    /// Write the last painted overlay to this JPEG file on exit.
    #[arg(long)]
    snapshot: Option<PathBuf>,
    /// Seed for the synthetic camera.
    #[arg(long)]
    seed: Option<u64>,
    /// Every n-th synthetic frame arrives without pixel data.
    #[arg(long)]
    empty_every: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = TrackerConfig::load()?;

    let registry = BackendRegistry::with_builtin();
    let mut detector = registry.create(&cfg.detector.backend, &cfg.detector.options)?;
    detector.warm_up()?;
    log::info!(
        "detector backend={} mode={:?} min_face_size={} tracking={}",
        detector.name(),
        cfg.detector.options.performance_mode,
        cfg.detector.options.min_face_size,
        cfg.detector.options.tracking
    );

    let mapper = cfg.mapper();
    log::info!(
        "camera facing={:?} frame rotation={} transform={:?} pinned={} scale={:?}",
        cfg.camera.facing,
        cfg.frame_rotation(),
        cfg.orientation_transform(),
        mapper.transform_override.is_some(),
        mapper.scale_mode
    );

    let view = Arc::new(SharedViewGeometry::new(cfg.view));
    let mut renderer = OverlayRenderer::new(cfg.marker);
    let analyzer = FrameAnalyzer::new(detector, mapper, view.clone(), renderer.handle());
    let slot = Arc::new(LatestFrameSlot::new());
    let worker = AnalyzerWorker::spawn(analyzer, slot.clone())?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;
    }

    let source_config = SyntheticConfig {
        width: cfg.camera.width,
        height: cfg.camera.height,
        rotation: cfg.frame_rotation(),
        target_fps: cfg.camera.target_fps,
        empty_every: args.empty_every,
        ..SyntheticConfig::default()
    };
    let source = match args.seed {
        Some(seed) => SyntheticSource::with_seed(source_config, seed)?,
        None => SyntheticSource::new(source_config)?,
    };
    let camera = spawn_camera(source, slot.clone(), running.clone())?;

    let deadline = (args.seconds > 0).then(|| Instant::now() + Duration::from_secs(args.seconds));
    let mut canvas = RasterCanvas::new(cfg.view.width, cfg.view.height);
    let mut last_stats_log = Instant::now();
    let mut repaints = 0u64;

    log::info!("headtrackd running. view {}x{}", cfg.view.width, cfg.view.height);

    while running.load(Ordering::SeqCst) && deadline.map_or(true, |d| Instant::now() < d) {
        if renderer.take_redraw_request() {
            let current = view.get();
            if canvas.width() != current.width || canvas.height() != current.height {
                canvas = RasterCanvas::new(current.width, current.height);
            } else {
                canvas.clear();
            }
            renderer.render(&mut canvas, current.width, current.height);
            repaints += 1;
            match renderer.marker(current) {
                Some(marker) => log::debug!(
                    "marker at ({:.0}, {:.0}) r={:.1}",
                    marker.x,
                    marker.y,
                    marker.radius
                ),
                None => log::debug!("no face"),
            }
        }

        if last_stats_log.elapsed() >= Duration::from_secs(1) {
            let stats = worker.stats();
            log::info!(
                "analyzed={} faces={} empty={} failures={} dropped={} repaints={}",
                stats.frames_analyzed,
                stats.faces_detected,
                stats.empty_frames,
                stats.detector_failures,
                slot.dropped_frames(),
                repaints
            );
            last_stats_log = Instant::now();
        }

        std::thread::sleep(REPAINT_INTERVAL);
    }

    log::info!("shutting down...");
    running.store(false, Ordering::SeqCst);
    let source_stats = camera
        .join()
        .map_err(|_| anyhow!("camera thread panicked"))??;
    worker.stop()?;

    log::info!(
        "camera captured={} released={}",
        source_stats.frames_captured,
        source_stats.frames_released
    );

    if let Some(path) = &args.snapshot {
        canvas.save_jpeg(path)?;
        log::info!("overlay snapshot written to {}", path.display());
    }
    Ok(())
}

fn spawn_camera(
    mut source: SyntheticSource,
    slot: Arc<LatestFrameSlot>,
    running: Arc<AtomicBool>,
) -> Result<std::thread::JoinHandle<Result<SourceStats>>> {
    std::thread::Builder::new()
        .name("camera".to_string())
        .spawn(move || {
            let interval = source.frame_interval();
            while running.load(Ordering::SeqCst) {
                if !slot.offer(source.next_frame())? {
                    break;
                }
                std::thread::sleep(interval);
            }
            Ok(source.stats())
        })
        .map_err(|e| anyhow!("failed to spawn camera thread: {}", e))
}
