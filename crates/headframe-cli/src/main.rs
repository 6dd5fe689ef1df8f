mod config;
mod replay;
mod snapshot;
mod trace;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use headframe_capture::sequencer::{
    COUNTDOWN_TICK, MIN_TIME_BETWEEN_CAPTURES, SETTLE_DELAY, STABILITY_DELAY,
};
use headframe_core::{
    evaluate_frame, geometry, landmarks, lighting, render_surface, status, CaptureStep,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "headframe", about = "Guided front and top head photo capture")]
struct Cli {
    /// TOML config file (overridden by HEADFRAME_* variables)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive a capture session from a landmark trace and save the result
    Replay {
        /// JSON landmark trace
        #[arg(long)]
        trace: PathBuf,
        /// Output directory for the snapshot
        #[arg(long)]
        out: Option<PathBuf>,
        /// Surface width in pixels
        #[arg(long)]
        width: Option<u32>,
        /// Surface height in pixels
        #[arg(long)]
        height: Option<u32>,
    },
    /// Print the verdict for a single trace frame
    Check {
        /// JSON landmark trace
        #[arg(long)]
        trace: PathBuf,
        /// Frame index within the trace
        #[arg(long, default_value_t = 0)]
        frame: usize,
        /// Capture step to evaluate against (face or top)
        #[arg(long, default_value = "face")]
        step: CaptureStep,
    },
    /// Print the design constants
    Thresholds,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = config::Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Replay {
            trace,
            out,
            width,
            height,
        } => {
            if let Some(out) = out {
                config.output_dir = out;
            }
            if let Some(width) = width {
                config.surface_width = width;
            }
            if let Some(height) = height {
                config.surface_height = height;
            }

            let trace = trace::Trace::load(&trace)?;
            tracing::info!(frames = trace.frames.len(), "replaying trace");

            let outcome = replay::replay(&trace, &config, |s| println!("{s}")).await?;
            let Some(pair) = outcome.pair else {
                bail!("capture incomplete: {}", outcome.status);
            };

            let (record, dir) = snapshot::write_snapshot(&config.output_dir, &pair)
                .with_context(|| {
                    format!("writing snapshot under {}", config.output_dir.display())
                })?;
            println!("Snapshot {} written to {}", record.id, dir.display());
            println!(
                "{} frame(s) submitted, {} dropped while the session was busy",
                outcome.frames_submitted, outcome.frames_dropped
            );
        }
        Commands::Check { trace, frame, step } => {
            let trace = trace::Trace::load(&trace)?;
            let rendered = trace.render(frame)?;
            let surface = render_surface(&rendered, config.surface())?;
            let lms = trace.frame(frame)?.face.map(|face| face.landmarks());

            let eval = evaluate_frame(step, &surface, lms.as_deref());
            let analysis = eval
                .points
                .as_ref()
                .and_then(|points| lighting::analyze_lighting(&surface, step, points, &eval.oval));
            let verdict = eval.verdict;
            let message = status::status_message(
                step,
                verdict.valid_position,
                verdict.lighting_good,
                verdict.has_face,
                false,
                None,
            );

            let report = serde_json::json!({
                "frame": frame,
                "step": step,
                "verdict": verdict,
                "ready": verdict.is_ready(),
                "oval": eval.oval,
                "points": eval.points,
                "lighting": analysis,
                "status": message,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Thresholds => {
            let constants = serde_json::json!({
                "landmarks": {
                    "forehead": landmarks::FOREHEAD,
                    "chin": landmarks::CHIN,
                    "left_cheek": landmarks::LEFT_CHEEK,
                    "right_cheek": landmarks::RIGHT_CHEEK,
                    "top_of_head_estimate": landmarks::TOP_OF_HEAD_ESTIMATE,
                },
                "margins": { "x": geometry::MARGIN_X, "y": geometry::MARGIN_Y },
                "face": {
                    "distance": geometry::FACE_DISTANCE,
                    "size_ratio_min": geometry::FACE_SIZE_MIN,
                    "size_ratio_max": geometry::FACE_SIZE_MAX,
                },
                "top": {
                    "distance": geometry::TOP_DISTANCE,
                    "head_tilt": geometry::HEAD_TILT_THRESHOLD,
                    "face_visibility": geometry::FACE_VISIBILITY_THRESHOLD,
                },
                "lighting": {
                    "min_brightness": lighting::MIN_BRIGHTNESS,
                    "max_brightness": lighting::MAX_BRIGHTNESS,
                },
                "timing_ms": {
                    "stability": STABILITY_DELAY.as_millis() as u64,
                    "countdown_tick": COUNTDOWN_TICK.as_millis() as u64,
                    "settle": SETTLE_DELAY.as_millis() as u64,
                    "min_between_captures": MIN_TIME_BETWEEN_CAPTURES.as_millis() as u64,
                },
            });
            println!("{}", serde_json::to_string_pretty(&constants)?);
        }
    }

    Ok(())
}
