//! FFmpeg arguments for each output preset
//!
//! Every preset starts from the same raw RGBA input (see
//! [`super::ffmpeg::build_command_args`]) and only differs in what follows the
//! `-i -` input. Presets are fixed: they pick an encoder and a pixel format
//! suitable for real-time capture, nothing more.
//!
//! ## Adding a new preset
//!
//! 1. Add the variant in `encoding/mod.rs`.
//! 2. Add a match arm in [`output_args()`] listing the encoder and pixel format.
//! 3. Add the encoder name in [`encoder_name()`] so availability detection
//!    can find it in `ffmpeg -encoders`.

use std::path::Path;
use std::process::{Command, Stdio};

use super::Preset;

/// Arguments placed between the input (`-i -`) and the output path
pub fn output_args(preset: Preset) -> &'static [&'static str] {
    match preset {
        // ── H.264 ───────────────────────────────────────────────────────
        Preset::H264Default => &["-pix_fmt", "yuv420p"],
        Preset::H264Nvidia => &["-c:v", "h264_nvenc", "-pix_fmt", "yuv420p"],
        Preset::H264Lossless420 => &["-pix_fmt", "yuv420p", "-preset", "ultrafast", "-crf", "0"],
        Preset::H264Lossless444 => &["-pix_fmt", "yuv444p", "-preset", "ultrafast", "-crf", "0"],

        // ── HEVC ────────────────────────────────────────────────────────
        Preset::HevcDefault => &["-c:v", "libx265", "-pix_fmt", "yuv420p"],
        Preset::HevcNvidia => &["-c:v", "hevc_nvenc", "-pix_fmt", "yuv420p"],

        // ── ProRes ──────────────────────────────────────────────────────
        Preset::ProRes422 => &["-c:v", "prores_ks", "-pix_fmt", "yuv422p10le"],
        Preset::ProRes4444 => &["-c:v", "prores_ks", "-pix_fmt", "yuva444p10le"],

        // ── VPx ─────────────────────────────────────────────────────────
        Preset::Vp8Default => &["-c:v", "libvpx", "-pix_fmt", "yuv420p"],
        Preset::Vp9Default => &["-c:v", "libvpx-vp9"],

        // ── HAP ─────────────────────────────────────────────────────────
        Preset::Hap => &["-c:v", "hap"],
        Preset::HapAlpha => &["-c:v", "hap", "-format", "hap_alpha"],
        Preset::HapQ => &["-c:v", "hap", "-format", "hap_q"],
    }
}

/// Name of the FFmpeg encoder a preset relies on
///
/// Presets without an explicit `-c:v` use FFmpeg's default for the container,
/// which is libx264 for MP4.
pub fn encoder_name(preset: Preset) -> &'static str {
    let args = output_args(preset);
    args.iter()
        .position(|a| *a == "-c:v")
        .and_then(|i| args.get(i + 1))
        .copied()
        .unwrap_or("libx264")
}

/// List the presets whose encoder is compiled into the given FFmpeg binary
///
/// Runs `ffmpeg -hide_banner -encoders` once. Returns an empty list when the
/// binary can't be launched.
pub fn available_presets(ffmpeg_path: &Path) -> Vec<Preset> {
    let output = match Command::new(ffmpeg_path)
        .args(["-hide_banner", "-encoders"])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
    {
        Ok(output) => output,
        Err(e) => {
            log::warn!("Failed to query encoders from {}: {}", ffmpeg_path.display(), e);
            return Vec::new();
        }
    };

    let listing = String::from_utf8_lossy(&output.stdout);
    let available = parse_encoder_listing(&listing);

    Preset::ALL
        .iter()
        .copied()
        .filter(|p| available.iter().any(|name| name == encoder_name(*p)))
        .collect()
}

/// Pull encoder names out of `ffmpeg -encoders` output
///
/// Lines look like ` V....D libx264              libx264 H.264 / AVC ...`;
/// the header block above the `------` separator is skipped.
fn parse_encoder_listing(listing: &str) -> Vec<String> {
    listing
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("------"))
        .skip(1)
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let flags = fields.next()?;
            if !flags.starts_with('V') {
                return None;
            }
            fields.next().map(str::to_string)
        })
        .collect()
}
