//! Maps a processing request onto an ffmpeg argument list.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::capabilities::EncoderSelection;
use crate::progress::format_timestamp;
use crate::request::{Operation, Preset, ProcessingRequest, Profile};

use super::error::CommandError;

/// Global knobs shared by every synthesized command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOptions {
    /// Value for `-loglevel`. Progress stat lines are printed at any level.
    pub log_level: String,
    /// Extra global arguments placed before the inputs.
    pub extra_args: Vec<String>,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            extra_args: Vec::new(),
        }
    }
}

/// A synthesized encoder invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FfmpegCommand {
    args: Vec<String>,
    /// Indices into `args` holding file paths or URIs.
    path_args: Vec<usize>,
}

impl FfmpegCommand {
    fn new() -> Self {
        Self {
            args: Vec::new(),
            path_args: Vec::new(),
        }
    }

    fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    fn path(&mut self, path: impl Into<String>) -> &mut Self {
        self.path_args.push(self.args.len());
        self.args.push(path.into());
        self
    }

    fn input(&mut self, input: impl Into<String>) -> &mut Self {
        self.arg("-i").path(input)
    }

    /// Arguments as passed to the process, without shell quoting.
    pub fn argv(&self) -> &[String] {
        &self.args
    }

    pub fn into_argv(self) -> Vec<String> {
        self.args
    }

    /// Human-readable command line with every path single-quoted.
    pub fn render(&self, program: &str) -> String {
        let mut rendered = shell_quote(program, false);
        for (idx, arg) in self.args.iter().enumerate() {
            rendered.push(' ');
            rendered.push_str(&shell_quote(arg, self.path_args.contains(&idx)));
        }
        rendered
    }
}

fn shell_quote(arg: &str, force: bool) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_+.,:=/".contains(c));
    if plain && !force {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// How the video bitstream size is controlled.
enum RateControl {
    Bitrate(u32),
    Crf(u8),
    EncoderDefault,
}

/// Builds the `scale` filter capping output dimensions to a preset.
pub fn scale_filter(preset: Preset) -> String {
    let (width, height) = preset.dimensions();
    format!(
        "scale='min(iw,{})':'min(ih,{})':force_original_aspect_ratio=decrease",
        width, height
    )
}

fn push_video_encode(
    cmd: &mut FfmpegCommand,
    selection: &EncoderSelection,
    profile: Profile,
    rate: RateControl,
) {
    cmd.args(["-c:v", selection.video_encoder.as_str()]);

    if selection.is_mpeg4_fallback() {
        // mpeg4 has no CRF mode; quantizer scale replaces bitrate and CRF
        cmd.args(["-q:v".to_string(), profile.mpeg4_quality().to_string()]);
        cmd.args(["-movflags", "+faststart"]);
        return;
    }

    match rate {
        RateControl::Bitrate(kbps) => {
            cmd.args(["-b:v".to_string(), format!("{}k", kbps)]);
        }
        RateControl::Crf(crf) => {
            cmd.args(["-crf".to_string(), crf.to_string()]);
        }
        RateControl::EncoderDefault => {}
    }
}

fn push_audio_reencode(cmd: &mut FfmpegCommand, profile: Profile) {
    cmd.args([
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        format!("{}k", profile.audio_bitrate_kbps()),
    ]);
}

fn require_encoder<'a>(
    request: &ProcessingRequest,
    selection: Option<&'a EncoderSelection>,
) -> Result<&'a EncoderSelection, CommandError> {
    selection.ok_or(CommandError::MissingEncoder {
        operation: request.operation.name(),
    })
}

/// Synthesizes the full argument list for `request`.
///
/// The output path is always the last argument. `concat_list` must be set
/// for merges; `selection` must be set for operations that re-encode video.
pub fn synthesize(
    request: &ProcessingRequest,
    selection: Option<&EncoderSelection>,
    output_path: &Path,
    concat_list: Option<&Path>,
    options: &CommandOptions,
) -> Result<FfmpegCommand, CommandError> {
    let mut cmd = FfmpegCommand::new();
    cmd.args(["-hide_banner", "-y", "-loglevel"])
        .arg(options.log_level.as_str())
        .args(options.extra_args.iter().cloned());

    let profile = request.profile;

    match &request.operation {
        Operation::Trim {
            start_ms,
            end_ms,
            reencode,
        } => {
            cmd.input(request.input_uri.as_str())
                .arg("-ss")
                .arg(format_timestamp(*start_ms))
                .arg("-to")
                .arg(format_timestamp(*end_ms));
            if *reencode {
                let selection = require_encoder(request, selection)?;
                push_video_encode(
                    &mut cmd,
                    selection,
                    profile,
                    RateControl::Crf(profile.default_crf()),
                );
                push_audio_reencode(&mut cmd, profile);
            } else {
                cmd.args(["-c", "copy"]);
            }
        }
        Operation::Compress {
            target_preset,
            target_bitrate_kbps,
            crf,
        } => {
            let selection = require_encoder(request, selection)?;
            cmd.input(request.input_uri.as_str());
            if let Some(preset) = target_preset {
                cmd.arg("-vf").arg(scale_filter(*preset));
            }
            let rate = match (target_bitrate_kbps, crf) {
                (Some(kbps), _) => RateControl::Bitrate(*kbps),
                (None, Some(crf)) => RateControl::Crf(*crf),
                (None, None) => RateControl::Crf(profile.default_crf()),
            };
            push_video_encode(&mut cmd, selection, profile, rate);
            push_audio_reencode(&mut cmd, profile);
        }
        Operation::Transcode {
            target_preset,
            target_bitrate_kbps,
            ..
        } => {
            let selection = require_encoder(request, selection)?;
            cmd.input(request.input_uri.as_str());
            if let Some(preset) = target_preset {
                cmd.arg("-vf").arg(scale_filter(*preset));
            }
            let rate = match target_bitrate_kbps {
                Some(kbps) => RateControl::Bitrate(*kbps),
                None => RateControl::EncoderDefault,
            };
            push_video_encode(&mut cmd, selection, profile, rate);
            push_audio_reencode(&mut cmd, profile);
        }
        Operation::Merge { .. } => {
            let list = concat_list.ok_or(CommandError::MissingConcatList)?;
            cmd.args(["-f", "concat", "-safe", "0"])
                .input(list.to_string_lossy())
                .args(["-c", "copy"]);
        }
        Operation::ExtractAudio {
            audio_codec,
            bitrate_kbps,
        } => {
            let codec = audio_codec.unwrap_or_default();
            cmd.input(request.input_uri.as_str())
                .arg("-vn")
                .args(["-c:a", codec.ffmpeg_codec()]);
            if let (Some(kbps), true) = (bitrate_kbps, codec.accepts_bitrate()) {
                cmd.arg("-b:a").arg(format!("{}k", kbps));
            }
        }
        Operation::Mute => {
            cmd.input(request.input_uri.as_str())
                .arg("-an")
                .args(["-c:v", "copy"]);
        }
        Operation::Cover { time_ms } => {
            cmd.arg("-ss")
                .arg(format_timestamp(*time_ms))
                .input(request.input_uri.as_str())
                .args(["-frames:v", "1", "-q:v", "2"]);
        }
    }

    cmd.path(output_path.to_string_lossy());
    Ok(cmd)
}

/// File extension of the artifact an operation produces.
pub fn output_extension(operation: &Operation) -> &'static str {
    match operation {
        Operation::Cover { .. } => "jpg",
        Operation::ExtractAudio { audio_codec, .. } => audio_codec.unwrap_or_default().extension(),
        _ => "mp4",
    }
}

/// Output file name: `<stem>_<operation>_<short task id>.<ext>`.
pub fn output_file_name(request: &ProcessingRequest, task_id: &str) -> String {
    let stem = Path::new(&request.source_filename)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let stem: String = stem
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let stem = if stem.is_empty() { "output".to_string() } else { stem };
    let short_id: String = task_id.chars().filter(|c| *c != '-').take(8).collect();

    format!(
        "{}_{}_{}.{}",
        stem,
        request.operation.name(),
        short_id,
        output_extension(&request.operation)
    )
}
