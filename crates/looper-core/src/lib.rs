//! Looper Core - Real-time loop playback engine
//!
//! Everything that runs inside the audio callback lives here: the phase
//! accumulator, loop region arbitration, crossfade sessions and the
//! fixed-point filters. Platform code (audio devices, file loading, UI)
//! talks to the engine through the traits in [`engine::control`] and
//! [`output`].

pub mod buffer;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod fixed;
pub mod output;
pub mod types;

pub use buffer::SampleBuffer;
pub use error::{EngineError, EngineResult};
pub use types::*;
