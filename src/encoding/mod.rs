// Output presets and encoder sessions
//
// This module defines the supported output presets and their container mappings.
// To add a new preset:
// 1. Add variant to Preset enum (and to Preset::ALL)
// 2. Add display name and container mapping below
// 3. Add the FFmpeg output arguments in presets.rs
// 4. Add the FFmpeg encoder name in presets::encoder_name()

pub mod ffmpeg;
pub mod presets;
pub mod session;

pub use ffmpeg::{FfmpegSession, FfmpegSessionFactory, DEFAULT_QUEUE_LIMIT};
pub use session::{EncoderError, EncoderSession, Result, SessionFactory, SessionRequest};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Output presets for captured video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// libx264, yuv420p
    H264Default,
    /// NVENC H.264
    H264Nvidia,
    /// libx264 lossless, 4:2:0 chroma
    H264Lossless420,
    /// libx264 lossless, 4:4:4 chroma
    H264Lossless444,
    /// libx265, yuv420p
    HevcDefault,
    /// NVENC HEVC
    HevcNvidia,
    /// Apple ProRes 422 (10-bit)
    ProRes422,
    /// Apple ProRes 4444 with alpha (10-bit)
    ProRes4444,
    /// libvpx VP8
    Vp8Default,
    /// libvpx VP9
    Vp9Default,
    /// HAP
    Hap,
    /// HAP with alpha channel
    HapAlpha,
    /// HAP Q (higher quality)
    HapQ,
}

impl Preset {
    /// All supported presets (for iteration)
    pub const ALL: &'static [Preset] = &[
        Preset::H264Default,
        Preset::H264Nvidia,
        Preset::H264Lossless420,
        Preset::H264Lossless444,
        Preset::HevcDefault,
        Preset::HevcNvidia,
        Preset::ProRes422,
        Preset::ProRes4444,
        Preset::Vp8Default,
        Preset::Vp9Default,
        Preset::Hap,
        Preset::HapAlpha,
        Preset::HapQ,
    ];

    /// Human-readable display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Preset::H264Default => "H.264 Default (MP4)",
            Preset::H264Nvidia => "H.264 NVIDIA (MP4)",
            Preset::H264Lossless420 => "H.264 Lossless 420 (MP4)",
            Preset::H264Lossless444 => "H.264 Lossless 444 (MP4)",
            Preset::HevcDefault => "HEVC Default (MP4)",
            Preset::HevcNvidia => "HEVC NVIDIA (MP4)",
            Preset::ProRes422 => "ProRes 422 (QuickTime)",
            Preset::ProRes4444 => "ProRes 4444 (QuickTime)",
            Preset::Vp8Default => "VP8 (WebM)",
            Preset::Vp9Default => "VP9 (WebM)",
            Preset::Hap => "HAP (QuickTime)",
            Preset::HapAlpha => "HAP Alpha (QuickTime)",
            Preset::HapQ => "HAP Q (QuickTime)",
        }
    }

    /// Short identifier, matching the serialized form
    pub fn name(&self) -> &'static str {
        match self {
            Preset::H264Default => "h264_default",
            Preset::H264Nvidia => "h264_nvidia",
            Preset::H264Lossless420 => "h264_lossless420",
            Preset::H264Lossless444 => "h264_lossless444",
            Preset::HevcDefault => "hevc_default",
            Preset::HevcNvidia => "hevc_nvidia",
            Preset::ProRes422 => "pro_res422",
            Preset::ProRes4444 => "pro_res4444",
            Preset::Vp8Default => "vp8_default",
            Preset::Vp9Default => "vp9_default",
            Preset::Hap => "hap",
            Preset::HapAlpha => "hap_alpha",
            Preset::HapQ => "hap_q",
        }
    }

    /// Get the container format this preset writes
    pub fn container(&self) -> ContainerFormat {
        match self {
            Preset::H264Default
            | Preset::H264Nvidia
            | Preset::H264Lossless420
            | Preset::H264Lossless444
            | Preset::HevcDefault
            | Preset::HevcNvidia => ContainerFormat::Mp4,
            Preset::ProRes422 | Preset::ProRes4444 => ContainerFormat::QuickTime,
            Preset::Vp8Default | Preset::Vp9Default => ContainerFormat::WebM,
            Preset::Hap | Preset::HapAlpha | Preset::HapQ => ContainerFormat::QuickTime,
        }
    }

    /// File suffix including the leading dot
    pub fn suffix(&self) -> &'static str {
        self.container().suffix()
    }
}

impl Default for Preset {
    fn default() -> Self {
        Self::H264Default
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        Preset::ALL
            .iter()
            .copied()
            .find(|p| p.name() == wanted)
            .ok_or_else(|| {
                let names: Vec<_> = Preset::ALL.iter().map(|p| p.name()).collect();
                format!("unknown preset '{}' (expected one of: {})", s, names.join(", "))
            })
    }
}

/// Supported container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    /// MP4 (.mp4) - widely compatible, good for H.264/H.265
    Mp4,
    /// QuickTime (.mov) - ProRes and HAP
    QuickTime,
    /// WebM (.webm) - web-optimized, VP8/VP9
    WebM,
}

impl ContainerFormat {
    /// Extension with the leading dot, for appending to a path prefix
    pub fn suffix(&self) -> &'static str {
        match self {
            ContainerFormat::Mp4 => ".mp4",
            ContainerFormat::QuickTime => ".mov",
            ContainerFormat::WebM => ".webm",
        }
    }
}
