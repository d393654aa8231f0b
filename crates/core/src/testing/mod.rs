//! Testing utilities and mock implementations.
//!
//! Mocks for the orchestrator's outbound collaborators, so the queue can be
//! driven end to end without an encoder binary.
//!
//! # Example
//!
//! ```rust,ignore
//! use mediatask_core::testing::{fixtures, MockFileRegistry, MockSpawner};
//!
//! let spawner = MockSpawner::new();
//! spawner.set_lines(["time=00:00:05.000"]).await;
//! let registry = MockFileRegistry::new();
//!
//! let request = fixtures::trim_request(1200, 6400);
//! ```

mod mock_registry;
mod mock_spawner;

pub use mock_registry::{MockFileRegistry, RecordedOutput};
pub use mock_spawner::MockSpawner;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::request::{Operation, Preset, ProcessingRequest, Profile, VideoCodec};

    fn request(operation: Operation) -> ProcessingRequest {
        ProcessingRequest {
            source_id: "source-1".to_string(),
            source_filename: "holiday clip.mp4".to_string(),
            input_uri: "/media/holiday clip.mp4".to_string(),
            profile: Profile::Balanced,
            source_duration_ms: Some(20_000),
            operation,
        }
    }

    pub fn trim_request(start_ms: u64, end_ms: u64) -> ProcessingRequest {
        request(Operation::Trim {
            start_ms,
            end_ms,
            reencode: false,
        })
    }

    pub fn compress_request(preset: Preset) -> ProcessingRequest {
        request(Operation::Compress {
            target_preset: Some(preset),
            target_bitrate_kbps: None,
            crf: None,
        })
    }

    pub fn transcode_request(codec: VideoCodec) -> ProcessingRequest {
        request(Operation::Transcode {
            video_codec: Some(codec),
            target_preset: None,
            target_bitrate_kbps: None,
        })
    }

    pub fn merge_request(input_uris: &[&str]) -> ProcessingRequest {
        let mut request = request(Operation::Merge {
            input_uris: input_uris.iter().map(|s| s.to_string()).collect(),
        });
        request.source_duration_ms = None;
        request
    }

    pub fn mute_request() -> ProcessingRequest {
        request(Operation::Mute)
    }
}
