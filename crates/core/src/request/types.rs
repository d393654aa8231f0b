//! Types for processing requests.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::RequestError;

/// Highest CRF accepted by the x264/x265 family.
pub const MAX_CRF: u8 = 51;

/// Encoding profile, trading file size and speed against quality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Small, widely playable output.
    Compatibility,
    /// Reasonable defaults.
    #[default]
    Balanced,
    /// Larger, higher quality output.
    Quality,
}

impl Profile {
    /// CRF used when a re-encode does not specify bitrate or CRF.
    pub fn default_crf(&self) -> u8 {
        match self {
            Self::Compatibility => 28,
            Self::Balanced => 23,
            Self::Quality => 18,
        }
    }

    /// `-q:v` value for the mpeg4 fallback encoder (lower = better).
    pub fn mpeg4_quality(&self) -> u8 {
        match self {
            Self::Compatibility => 6,
            Self::Balanced => 4,
            Self::Quality => 2,
        }
    }

    /// Audio bitrate used when a video re-encode also re-encodes audio.
    pub fn audio_bitrate_kbps(&self) -> u32 {
        match self {
            Self::Compatibility => 96,
            Self::Balanced => 128,
            Self::Quality => 192,
        }
    }

    /// Video codec picked for transcodes that leave the codec unset.
    pub fn default_video_codec(&self) -> VideoCodec {
        match self {
            Self::Compatibility | Self::Balanced => VideoCodec::H264,
            Self::Quality => VideoCodec::Hevc,
        }
    }
}

/// Video codec family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoCodec {
    /// H.264 / AVC
    H264,
    /// H.265 / HEVC
    Hevc,
    /// MPEG-4 Part 2, always present in ffmpeg builds
    Mpeg4,
}

impl VideoCodec {
    /// Short family name, also the prefix of hardware encoder names.
    pub fn name(&self) -> &'static str {
        match self {
            Self::H264 => "h264",
            Self::Hevc => "hevc",
            Self::Mpeg4 => "mpeg4",
        }
    }

    /// Software encoders of this family, most preferred first.
    pub fn software_encoders(&self) -> &'static [&'static str] {
        match self {
            Self::H264 => &["libx264", "libopenh264"],
            Self::Hevc => &["libx265"],
            Self::Mpeg4 => &["mpeg4"],
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Audio codec for audio extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioCodec {
    /// Advanced Audio Coding
    #[default]
    Aac,
    /// MPEG Audio Layer III
    Mp3,
    /// Opus
    Opus,
    /// Free Lossless Audio Codec
    Flac,
    /// Keep the source audio stream
    Copy,
}

impl AudioCodec {
    /// Returns the ffmpeg codec name.
    pub fn ffmpeg_codec(&self) -> &'static str {
        match self {
            Self::Aac => "aac",
            Self::Mp3 => "libmp3lame",
            Self::Opus => "libopus",
            Self::Flac => "flac",
            Self::Copy => "copy",
        }
    }

    /// Returns the output file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Aac => "m4a",
            Self::Mp3 => "mp3",
            Self::Opus => "opus",
            Self::Flac => "flac",
            Self::Copy => "mka",
        }
    }

    /// Whether a target bitrate applies to this codec.
    pub fn accepts_bitrate(&self) -> bool {
        !matches!(self, Self::Flac | Self::Copy)
    }
}

/// Resolution preset used to cap output dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Preset {
    P2160,
    P1080,
    P720,
    P480,
    P360,
}

impl Preset {
    /// Maximum (width, height) for this preset.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::P2160 => (3840, 2160),
            Self::P1080 => (1920, 1080),
            Self::P720 => (1280, 720),
            Self::P480 => (854, 480),
            Self::P360 => (640, 360),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::P2160 => "2160p",
            Self::P1080 => "1080p",
            Self::P720 => "720p",
            Self::P480 => "480p",
            Self::P360 => "360p",
        }
    }
}

impl FromStr for Preset {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "2160p" | "4k" => Ok(Self::P2160),
            "1080p" => Ok(Self::P1080),
            "720p" => Ok(Self::P720),
            "480p" => Ok(Self::P480),
            "360p" => Ok(Self::P360),
            _ => Err(RequestError::UnknownPreset(s.to_string())),
        }
    }
}

impl TryFrom<String> for Preset {
    type Error = RequestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Preset> for String {
    fn from(preset: Preset) -> Self {
        preset.name().to_string()
    }
}

/// The operation to perform, with its operation-specific payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "kebab-case")]
pub enum Operation {
    /// Cut `[start_ms, end_ms)` out of the source.
    Trim {
        start_ms: u64,
        end_ms: u64,
        #[serde(default)]
        reencode: bool,
    },
    /// Re-encode to a smaller file.
    Compress {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_preset: Option<Preset>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_bitrate_kbps: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        crf: Option<u8>,
    },
    /// Re-encode into another video codec.
    Transcode {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        video_codec: Option<VideoCodec>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_preset: Option<Preset>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_bitrate_kbps: Option<u32>,
    },
    /// Join several inputs with the concat demuxer.
    Merge { input_uris: Vec<String> },
    /// Drop the video and keep the audio.
    ExtractAudio {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        audio_codec: Option<AudioCodec>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bitrate_kbps: Option<u32>,
    },
    /// Drop the audio and keep the video.
    Mute,
    /// Grab a single frame as an image.
    Cover { time_ms: u64 },
}

impl Operation {
    /// Stable operation name, used in file names and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Trim { .. } => "trim",
            Self::Compress { .. } => "compress",
            Self::Transcode { .. } => "transcode",
            Self::Merge { .. } => "merge",
            Self::ExtractAudio { .. } => "extract-audio",
            Self::Mute => "mute",
            Self::Cover { .. } => "cover",
        }
    }

    /// Video codec this operation encodes to, if it re-encodes video at all.
    pub fn requested_codec(&self, profile: Profile) -> Option<VideoCodec> {
        match self {
            Self::Trim { reencode: true, .. } | Self::Compress { .. } => Some(VideoCodec::H264),
            Self::Transcode { video_codec, .. } => {
                Some(video_codec.unwrap_or_else(|| profile.default_video_codec()))
            }
            _ => None,
        }
    }
}

/// A validated request to process one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingRequest {
    /// Id of the source in the host application's file registry.
    pub source_id: String,
    /// Display file name of the source, used to name outputs.
    pub source_filename: String,
    /// Input location handed to the encoder.
    pub input_uri: String,
    /// Encoding profile.
    #[serde(default)]
    pub profile: Profile,
    /// Source duration, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_duration_ms: Option<u64>,
    /// Operation and its payload.
    #[serde(flatten)]
    pub operation: Operation,
}

impl ProcessingRequest {
    /// Creates a request, rejecting malformed payloads.
    pub fn new(
        source_id: impl Into<String>,
        source_filename: impl Into<String>,
        input_uri: impl Into<String>,
        profile: Profile,
        source_duration_ms: Option<u64>,
        operation: Operation,
    ) -> Result<Self, RequestError> {
        let request = Self {
            source_id: source_id.into(),
            source_filename: source_filename.into(),
            input_uri: input_uri.into(),
            profile,
            source_duration_ms,
            operation,
        };
        request.validate()?;
        Ok(request)
    }

    /// Checks request shape and numeric consistency.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.source_id.trim().is_empty() {
            return Err(RequestError::MissingField { field: "source_id" });
        }
        if self.source_filename.trim().is_empty() {
            return Err(RequestError::MissingField {
                field: "source_filename",
            });
        }
        if self.input_uri.trim().is_empty() {
            return Err(RequestError::MissingField { field: "input_uri" });
        }

        match &self.operation {
            Operation::Trim {
                start_ms, end_ms, ..
            } => {
                if start_ms >= end_ms {
                    return Err(RequestError::InvalidRange {
                        start_ms: *start_ms,
                        end_ms: *end_ms,
                    });
                }
                self.check_within_duration("start_ms", *start_ms)?;
            }
            Operation::Compress {
                target_bitrate_kbps,
                crf,
                ..
            } => {
                if target_bitrate_kbps.is_some() && crf.is_some() {
                    return Err(RequestError::ConflictingRateControl);
                }
                check_bitrate("target_bitrate_kbps", *target_bitrate_kbps)?;
                if let Some(crf) = crf {
                    if *crf > MAX_CRF {
                        return Err(RequestError::out_of_range(
                            "crf",
                            format!("must be between 0 and {}", MAX_CRF),
                        ));
                    }
                }
            }
            Operation::Transcode {
                target_bitrate_kbps,
                ..
            } => check_bitrate("target_bitrate_kbps", *target_bitrate_kbps)?,
            Operation::Merge { input_uris } => {
                if input_uris.len() < 2 {
                    return Err(RequestError::NotEnoughInputs(input_uris.len()));
                }
                if input_uris.iter().any(|u| u.trim().is_empty()) {
                    return Err(RequestError::MissingField {
                        field: "input_uris",
                    });
                }
            }
            Operation::ExtractAudio { bitrate_kbps, .. } => {
                check_bitrate("bitrate_kbps", *bitrate_kbps)?
            }
            Operation::Mute => {}
            Operation::Cover { time_ms } => self.check_within_duration("time_ms", *time_ms)?,
        }

        Ok(())
    }

    /// Expected length of the encoder's output timeline, for progress ratios.
    pub fn expected_duration_ms(&self) -> Option<u64> {
        match &self.operation {
            Operation::Trim {
                start_ms, end_ms, ..
            } => Some(end_ms.saturating_sub(*start_ms)),
            Operation::Cover { .. } | Operation::Merge { .. } => None,
            _ => self.source_duration_ms,
        }
    }

    fn check_within_duration(&self, field: &'static str, value_ms: u64) -> Result<(), RequestError> {
        match self.source_duration_ms {
            Some(duration_ms) if duration_ms > 0 && value_ms >= duration_ms => {
                Err(RequestError::BeyondDuration {
                    field,
                    value_ms,
                    duration_ms,
                })
            }
            _ => Ok(()),
        }
    }
}

fn check_bitrate(field: &'static str, bitrate: Option<u32>) -> Result<(), RequestError> {
    match bitrate {
        Some(0) => Err(RequestError::out_of_range(field, "must be greater than 0")),
        _ => Ok(()),
    }
}
