pub mod capabilities;
pub mod command;
pub mod config;
pub mod manifest;
pub mod orchestrator;
pub mod process;
pub mod progress;
pub mod registry;
pub mod request;
pub mod testing;

pub use capabilities::{
    CapabilityProbe, CapabilityProvider, EncoderCapability, EncoderSelection,
    FfmpegCapabilityProvider, Platform, StaticCapabilityProvider,
};
pub use command::{synthesize, CommandError, CommandOptions, FfmpegCommand};
pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use orchestrator::{
    EngineAvailability, EngineErrorCode, EnqueueError, OrchestratorConfig, OrchestratorError,
    QueueStatus, TaskEvent, TaskOrchestrator, TaskRecord, TaskStatus,
};
pub use process::{ProcessError, ProcessExit, ProcessSpawner, RunningProcess, SystemProcessSpawner};
pub use progress::{format_timestamp, parse_progress, parse_timestamp, ProgressSample, ProgressTracker};
pub use registry::{FileRegistry, RegistryError};
pub use request::{
    AudioCodec, Operation, Preset, ProcessingRequest, Profile, RequestError, VideoCodec,
};
