//! Encoder capability detection and fallback resolution.
//!
//! The platform layer is hidden behind [`CapabilityProvider`]; the
//! [`CapabilityProbe`] queries it once and resolves a concrete encoder for a
//! requested codec along a fixed fallback chain:
//!
//! 1. the platform's own hardware encoder (`h264_videotoolbox` on Apple,
//!    `h264_mediacodec` on Android, `h264_nvenc` on desktops),
//! 2. the other hardware encoders of the same family,
//! 3. the family's software encoders,
//! 4. `mpeg4`, for builds that exclude the family altogether.

mod ffmpeg;
mod probe;
mod traits;
mod types;

pub use ffmpeg::FfmpegCapabilityProvider;
pub use probe::{fallback_chain, resolve_encoder, CapabilityProbe, MPEG4_ENCODER};
pub use traits::{CapabilityProvider, StaticCapabilityProvider};
pub use types::{EncoderCapability, EncoderSelection, Platform, HARDWARE_BACKENDS};
