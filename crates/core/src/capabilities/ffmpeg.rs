//! Encoder detection by asking the ffmpeg binary.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::traits::CapabilityProvider;
use super::types::{EncoderCapability, Platform};

/// Upper bound for one hardware test encode.
const TEST_ENCODE_TIMEOUT: Duration = Duration::from_secs(15);

/// Driver and device errors printed by hardware encoders that are compiled
/// in but cannot run.
const HARDWARE_FAILURE_MARKERS: [&str; 5] = [
    "Cannot load",
    "No capable devices found",
    "Driver does not support",
    "not found",
    "Codec not currently supported",
];

/// Lists encoders compiled into the configured ffmpeg binary.
///
/// Hardware encoders are kept only when a short test encode succeeds; builds
/// routinely list them on machines without the device or driver.
#[derive(Debug, Clone)]
pub struct FfmpegCapabilityProvider {
    ffmpeg_path: PathBuf,
    platform: Platform,
}

impl FfmpegCapabilityProvider {
    /// Creates a provider; `platform` overrides compile-target detection.
    pub fn new(ffmpeg_path: impl Into<PathBuf>, platform: Option<Platform>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            platform: platform.unwrap_or_else(Platform::current),
        }
    }

    /// Extracts video encoder names from `ffmpeg -encoders` output.
    ///
    /// Entries look like ` V....D h264_videotoolbox    VideoToolbox H.264 Encoder`;
    /// everything up to the `------` separator is legend.
    pub(crate) fn parse_encoder_list(stdout: &str) -> Vec<EncoderCapability> {
        stdout
            .lines()
            .skip_while(|line| !line.trim_start().starts_with("---"))
            .skip(1)
            .filter_map(|line| {
                let mut parts = line.split_whitespace();
                let flags = parts.next()?;
                let name = parts.next()?;
                (flags.len() == 6 && flags.starts_with('V')).then(|| EncoderCapability::new(name))
            })
            .collect()
    }

    /// Runs a tiny synthetic encode with `encoder` and reports whether it worked.
    async fn encoder_initializes(&self, encoder: &str) -> bool {
        let run = Command::new(&self.ffmpeg_path)
            .args([
                "-hide_banner",
                "-f",
                "lavfi",
                "-i",
                "color=black:s=64x64:d=0.1",
                "-c:v",
                encoder,
                "-f",
                "null",
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(TEST_ENCODE_TIMEOUT, run).await {
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let failed = HARDWARE_FAILURE_MARKERS.iter().any(|m| stderr.contains(m));
                if !output.status.success() || failed {
                    debug!("Test encode with {} failed: {}", encoder, stderr.trim());
                    return false;
                }
                true
            }
            Ok(Err(e)) => {
                warn!("Failed to run test encode with {}: {}", encoder, e);
                false
            }
            Err(_) => {
                warn!("Test encode with {} timed out", encoder);
                false
            }
        }
    }
}

#[async_trait]
impl CapabilityProvider for FfmpegCapabilityProvider {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn list_available_encoders(&self) -> Vec<EncoderCapability> {
        let output = Command::new(&self.ffmpeg_path)
            .args(["-hide_banner", "-encoders"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await;

        let stdout = match output {
            Ok(o) if o.status.success() => String::from_utf8_lossy(&o.stdout).to_string(),
            Ok(o) => {
                warn!("ffmpeg -encoders exited with {:?}", o.status.code());
                return Vec::new();
            }
            Err(e) => {
                warn!("Failed to run {:?}: {}", self.ffmpeg_path, e);
                return Vec::new();
            }
        };

        let listed = Self::parse_encoder_list(&stdout);
        debug!("ffmpeg lists {} video encoders", listed.len());

        let mut encoders = Vec::with_capacity(listed.len());
        for encoder in listed {
            if encoder.hardware && !self.encoder_initializes(&encoder.name).await {
                info!("Hardware encoder {} is listed but unusable", encoder.name);
                continue;
            }
            encoders.push(encoder);
        }
        encoders
    }
}
