//! Subprocess primitive used to run the encoder.
//!
//! The orchestrator only sees [`ProcessSpawner`] and [`RunningProcess`], so it
//! stays agnostic of the concrete binary and can be driven by mocks.

mod error;
mod system;
mod traits;

pub use error::ProcessError;
pub use system::SystemProcessSpawner;
pub use traits::{ProcessExit, ProcessSpawner, RunningProcess};
