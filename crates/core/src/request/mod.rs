//! Processing requests: what a caller asks the engine to do to one source.

mod error;
mod types;

pub use error::RequestError;
pub use types::{
    AudioCodec, Operation, Preset, ProcessingRequest, Profile, VideoCodec, MAX_CRF,
};
