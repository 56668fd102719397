//! Audio engine - sampler voice, controls, crossfades and telemetry
//!
//! - Sampler: phase accumulator, region arbitration and the per-block render
//! - Controls: lock-free control snapshot plus the reset handshake
//! - Crossfade: equal-power tail-to-head sessions at loop boundaries
//! - Telemetry: seqlock snapshot published once per block
//! - Commands: transport and buffer changes over an SPSC queue

mod command;
pub mod control;
pub mod crossfade;
pub mod gc;
pub mod interpolate;
pub mod rate;
pub mod region;
mod sampler;
mod telemetry;

pub use command::*;
pub use control::{Control, ControlSmoother, ControlSnapshot, ControlSource, SharedControls};
pub use crossfade::CrossfadeSession;
pub use rate::RateCalculator;
pub use region::{LoopRegion, RegionManager};
pub use sampler::*;
pub use telemetry::{Telemetry, TelemetrySnapshot};
