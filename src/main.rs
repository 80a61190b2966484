//! Framepace capture driver
//!
//! Runs a synthetic render loop at `--render-fps` and captures it through
//! FFmpeg at `--fps`, with optional stalls to exercise catch-up.
//!
//! Usage:
//!   framepace [OPTIONS]
//!   framepace --seconds 10 --render-fps 144 --fps 60 --stall-every 90
//!   framepace --offline --preset pro_res4444 --folder captures --json

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use serde::Serialize;

use framepace::capture::FrameView;
use framepace::clock::{Clock, ManualClock, SystemClock};
use framepace::config::{default_config_path, CaptureSettings};
use framepace::encoding::presets::available_presets;
use framepace::encoding::{FfmpegSessionFactory, Preset};
use framepace::overlay::{CameraRenderRegistry, OverlayCompositor, TextureId};
use framepace::{CaptureStats, VideoCapture};

/// Output intervals a simulated stall lasts
const STALL_INTERVALS: f64 = 5.0;

#[derive(Parser)]
#[command(name = "framepace", about = "framepace: fixed-rate capture of a render loop into FFmpeg")]
struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Capture width in pixels
    #[arg(long)]
    width: Option<u32>,
    /// Capture height in pixels
    #[arg(long)]
    height: Option<u32>,
    /// Output frame rate
    #[arg(long)]
    fps: Option<f64>,
    /// Codec/container preset, e.g. h264_default or pro_res4444
    #[arg(long)]
    preset: Option<Preset>,
    /// Output folder
    #[arg(long)]
    folder: Option<PathBuf>,
    /// Capture name, used for the output file name
    #[arg(short, long, default_value = "capture")]
    name: String,
    /// How long to render for, in seconds of render time
    #[arg(short, long, default_value = "5")]
    seconds: f64,
    /// Rate of the synthetic render loop
    #[arg(long, default_value = "90")]
    render_fps: f64,
    /// Stall the render loop every N ticks
    #[arg(long)]
    stall_every: Option<u64>,
    /// FFmpeg binary
    #[arg(long)]
    ffmpeg: Option<PathBuf>,
    /// Drive the loop from a manual clock instead of sleeping
    #[arg(long)]
    offline: bool,
    /// Write the effective settings back to the config file
    #[arg(long)]
    save_config: bool,
    /// List presets the FFmpeg binary can encode and exit
    #[arg(long)]
    list_presets: bool,
    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
    /// Extra debug output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct RunSummary {
    name: String,
    preset: Preset,
    render_ticks: u64,
    overlay_draws: usize,
    capture: Option<CaptureStats>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut settings = CaptureSettings::load_or_default(&config_path);
    apply_overrides(&cli, &mut settings);

    if cli.list_presets {
        for preset in available_presets(&settings.ffmpeg_path) {
            println!("{:<20} {} ({})", preset.name(), preset.display_name(), preset.suffix());
        }
        return Ok(());
    }

    if cli.save_config {
        settings
            .save(&config_path)
            .with_context(|| format!("saving settings to {}", config_path.display()))?;
        log::info!("Settings saved to {}", config_path.display());
    }

    if !(cli.render_fps.is_finite() && cli.render_fps > 0.0) {
        bail!("--render-fps must be positive");
    }

    let summary = run(&cli, settings)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn apply_overrides(cli: &Cli, settings: &mut CaptureSettings) {
    if let Some(width) = cli.width {
        settings.width = width;
    }
    if let Some(height) = cli.height {
        settings.height = height;
    }
    if let Some(fps) = cli.fps {
        settings.frame_rate = fps;
    }
    if let Some(preset) = cli.preset {
        settings.preset = preset;
    }
    if let Some(folder) = &cli.folder {
        settings.folder = Some(folder.clone());
    }
    if let Some(ffmpeg) = &cli.ffmpeg {
        settings.ffmpeg_path = ffmpeg.clone();
    }
    settings.clamp_dimensions();
}

fn run(cli: &Cli, settings: CaptureSettings) -> anyhow::Result<RunSummary> {
    let preset = settings.preset;
    let (width, height) = (settings.width, settings.height);
    let render_interval = 1.0 / cli.render_fps;
    let stall = STALL_INTERVALS / settings.frame_rate;

    let factory =
        FfmpegSessionFactory::new(&settings.ffmpeg_path).with_queue_limit(settings.queue_limit);

    let mut registry = CameraRenderRegistry::new();
    let mut overlay = OverlayCompositor::new(&mut registry, settings.overlay_layer, 0)?;
    let overlay_handle = overlay.attach(&mut registry, TextureId(0));

    let mut capture = VideoCapture::new(cli.name.clone(), settings, factory);

    let manual = ManualClock::new(0.0);
    let system = SystemClock::new();
    let clock: &dyn Clock = if cli.offline { &manual } else { &system };

    let mut pixels = vec![0u8; width as usize * height as usize * 4];
    let mut frame_index = 0u64;
    let mut overlay_draws = 0;

    while clock.now() < cli.seconds {
        render_pattern(&mut pixels, width, height, frame_index);

        let view = FrameView::new(width, height, &pixels);
        let report = capture
            .on_render_image(clock.now(), &view)
            .context("capturing frame")?;
        log::debug!(
            "tick {}: {:?}, {} pushes, {} emitted",
            frame_index,
            report.decision,
            report.pushes,
            report.emitted
        );

        overlay_draws += registry.dispatch(overlay.camera().id).len();
        capture.end_of_frame(frame_index).context("flushing frame")?;

        let mut wait = render_interval;
        if cli.stall_every.is_some_and(|n| n > 0 && (frame_index + 1) % n == 0) {
            wait += stall;
        }
        if cli.offline {
            manual.advance(wait);
        } else {
            std::thread::sleep(Duration::from_secs_f64(wait));
        }
        frame_index += 1;
    }

    overlay.detach(&mut registry, overlay_handle);
    let stats = capture.disable().context("closing capture")?;

    Ok(RunSummary {
        name: cli.name.clone(),
        preset,
        render_ticks: frame_index,
        overlay_draws,
        capture: stats,
    })
}

/// Moving diagonal gradient so consecutive frames differ
fn render_pattern(pixels: &mut [u8], width: u32, height: u32, frame_index: u64) {
    let w = width as usize;
    let h = height as usize;
    let shift = (frame_index * 4) as usize;
    for y in 0..h {
        for x in 0..w {
            let i = (y * w + x) * 4;
            pixels[i] = ((x * 255 / w + shift) % 256) as u8;
            pixels[i + 1] = ((y * 255 / h + shift / 2) % 256) as u8;
            pixels[i + 2] = (shift % 256) as u8;
            pixels[i + 3] = 255;
        }
    }
}

fn print_summary(summary: &RunSummary) {
    println!("\n=== Framepace Summary ===\n");
    println!("  Name:          {}", summary.name);
    println!("  Preset:        {}", summary.preset.display_name());
    println!("  Render ticks:  {}", summary.render_ticks);
    println!("  Overlay draws: {}", summary.overlay_draws);

    let Some(stats) = &summary.capture else {
        println!("  No frames captured");
        return;
    };
    println!("  Output:        {}", stats.output_path.display());
    println!("  Frame rate:    {}", stats.frame_rate);
    println!("  Emitted:       {}", stats.frames_emitted);
    println!("  Pushed:        {}", stats.frames_pushed);
    println!("  Skipped ticks: {}", stats.skips);
    println!("  Catch-ups:     {}", stats.catch_ups);
    if stats.frames_omitted > 0 {
        println!("  Omitted:       {}", stats.frames_omitted);
    }
    println!();
}
