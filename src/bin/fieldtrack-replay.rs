//! fieldtrack-replay - run the tracking pipeline over a recorded detection dump
//! and write the overlay document consumed by the player frontend.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use image::DynamicImage;
use serde_derive::Serialize;

use fieldtrack::{
    CachedRoster, Config, FieldSideClassifier, Frame, Pipeline, RegionClassifier, ReplayDetector,
    StaticRoster, TeamColorClassifier, TextLine, TextRecognizer, TrackRecord,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ClassifierKind {
    FieldSide,
    TeamColor,
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Detection dump, one `<frame>:<json array>` line per frame.
    dump: PathBuf,
    /// Frame width in pixels.
    #[arg(long, default_value_t = 1280)]
    width: u32,
    /// Frame height in pixels.
    #[arg(long, default_value_t = 720)]
    height: u32,
    #[arg(long, default_value_t = 30.0)]
    fps: f64,
    /// Source video path recorded in the overlay header.
    #[arg(long)]
    video: Option<String>,
    /// Config file (TOML or JSON). Falls back to FIELDTRACK_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Roster file (TOML or JSON).
    #[arg(long)]
    roster: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = ClassifierKind::FieldSide)]
    classifier: ClassifierKind,
    /// Output file, stdout when omitted.
    #[arg(long, short)]
    output: Option<PathBuf>,
}

/// No OCR engine is available offline.
struct NoText;

impl TextRecognizer for NoText {
    fn recognize(&mut self, _image: &DynamicImage) -> Result<Vec<TextLine>, fieldtrack::Error> {
        Ok(Vec::new())
    }
}

#[derive(Serialize)]
struct VideoInfo {
    path: Option<String>,
    fps: f64,
    width: u32,
    height: u32,
}

#[derive(Serialize)]
struct OverlayFrame {
    t: f64,
    boxes: Vec<TrackRecord>,
}

#[derive(Serialize)]
struct Overlay {
    video: VideoInfo,
    frames: Vec<OverlayFrame>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if !(args.fps > 0.0) {
        return Err(anyhow!("--fps must be positive"));
    }

    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load_from_env()?,
    };

    let detector = ReplayDetector::from_file(&args.dump)
        .with_context(|| format!("failed to load dump {}", args.dump.display()))?;
    let last = detector
        .last_frame()
        .ok_or_else(|| anyhow!("dump {} has no frames", args.dump.display()))?;

    let roster = match &args.roster {
        Some(path) => StaticRoster::from_file(path)
            .with_context(|| format!("failed to load roster {}", path.display()))?,
        None => StaticRoster::new(),
    };
    let roster = CachedRoster::new(roster, Duration::from_secs(config.roster.cache_ttl_secs));

    let classifier: Box<dyn RegionClassifier> = match args.classifier {
        ClassifierKind::FieldSide => Box::new(FieldSideClassifier::default()),
        ClassifierKind::TeamColor => Box::new(TeamColorClassifier::default()),
    };

    let mut pipeline = Pipeline::new(
        config,
        Box::new(detector),
        classifier,
        Box::new(NoText),
        Box::new(roster),
    )?;

    log::info!(
        "replaying {} frames at {}x{} @ {} fps",
        last + 1,
        args.width,
        args.height,
        args.fps
    );

    let mut frames = Vec::with_capacity(last as usize + 1);
    for index in 0..=last {
        let t = index as f64 / args.fps;
        let frame = Frame::blank(index, t, args.width, args.height)?;
        let out = pipeline.process(&frame)?;

        frames.push(OverlayFrame {
            t,
            boxes: out.detections,
        });
    }

    let stats = pipeline.stats();
    log::info!(
        "done: {} frames, {:.1} ms/frame, {} tracks alive",
        stats.frames,
        stats.latency_ms().unwrap_or_default(),
        pipeline.tracker().len()
    );

    let overlay = Overlay {
        video: VideoInfo {
            path: args.video,
            fps: args.fps,
            width: args.width,
            height: args.height,
        },
        frames,
    };

    match &args.output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            serde_json::to_writer_pretty(std::io::BufWriter::new(file), &overlay)?;
            log::info!("overlay written to {}", path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            serde_json::to_writer_pretty(&mut lock, &overlay)?;
            writeln!(lock)?;
        }
    }

    Ok(())
}
