//! Types for encoder capability detection and selection.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::request::VideoCodec;

/// Hardware backends, in the order they are tried after the platform's own.
pub const HARDWARE_BACKENDS: [&str; 5] = ["videotoolbox", "mediacodec", "nvenc", "qsv", "vaapi"];

/// Platform family the engine runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// iOS / macOS (VideoToolbox)
    Apple,
    /// Android (MediaCodec)
    Android,
    /// Linux / Windows desktops
    Desktop,
}

impl Platform {
    /// Detects the platform from the compile target.
    pub fn current() -> Self {
        if cfg!(any(target_os = "macos", target_os = "ios")) {
            Self::Apple
        } else if cfg!(target_os = "android") {
            Self::Android
        } else {
            Self::Desktop
        }
    }

    /// The hardware backend this platform prefers.
    pub fn preferred_backend(&self) -> &'static str {
        match self {
            Self::Apple => "videotoolbox",
            Self::Android => "mediacodec",
            Self::Desktop => "nvenc",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Apple => "apple",
            Self::Android => "android",
            Self::Desktop => "desktop",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One encoder reported as usable by the platform layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncoderCapability {
    /// ffmpeg encoder name, e.g. `h264_videotoolbox`.
    pub name: String,
    /// Whether this encoder runs on dedicated hardware.
    pub hardware: bool,
}

impl EncoderCapability {
    /// Creates a capability, classifying it by its backend suffix.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let hardware = HARDWARE_BACKENDS
            .iter()
            .any(|backend| name.ends_with(&format!("_{}", backend)));
        Self { name, hardware }
    }
}

/// The encoder chosen for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderSelection {
    /// Codec the request asked for.
    pub requested_codec: VideoCodec,
    /// Concrete ffmpeg encoder passed to `-c:v`.
    pub video_encoder: String,
    /// Codec actually produced; differs from the request on the mpeg4 fallback.
    pub effective_codec: VideoCodec,
    /// Why the preferred encoder was not used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

impl EncoderSelection {
    /// Whether rate control must use `-q:v` and fast-start.
    pub fn is_mpeg4_fallback(&self) -> bool {
        self.effective_codec == VideoCodec::Mpeg4
    }
}
