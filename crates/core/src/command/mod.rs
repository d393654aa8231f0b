//! Command synthesis: processing request + resolved encoder → ffmpeg argv.
//!
//! Synthesis is pure; paths are supplied by the caller and a concat
//! manifest must already exist for merges. Times use three-decimal seconds,
//! the same format the progress parser reads back.

mod builder;
mod error;

pub use builder::{
    output_extension, output_file_name, scale_filter, synthesize, CommandOptions, FfmpegCommand,
};
pub use error::CommandError;
