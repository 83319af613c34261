//! chunkrec Common Library
//!
//! Stop-condition scheduling and chunk lifecycle shared by every capture mode.
//! A capture mode only has to provide a [`CaptureSession`]; deciding when a
//! chunk ends and where each chunk is written lives here.

pub mod completion;
pub mod config;
pub mod controller;
pub mod error;
pub mod evaluator;
pub mod interrupt;
pub mod keys;
pub mod logging;
pub mod output;
pub mod session;
pub mod terminal;
pub mod timeline;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{PauseMode, RecordingConfiguration, RecordingOptions, ValidationError};
pub use controller::{ChunkRecord, ChunkState, ControllerState, RecordingEvent, RecordingLoopController};
pub use error::RecordError;
pub use evaluator::{StopConditionEvaluator, StopReason};
pub use interrupt::Interrupt;
pub use keys::{parse_key, KeyError, KeyPress, KeySet};
pub use output::{OutputError, OutputPathResolver};
pub use session::{CaptureError, CaptureSession};
pub use terminal::{KeyInput, KeyStream, NoKeys, RawModeGuard, TerminalKeys};
pub use timeline::RecordingTimeline;
