//! Lock-free transport commands
//!
//! The control context pushes commands into an `rtrb` ring buffer; the
//! audio context drains it at the top of each block. Neither side blocks,
//! and the queue is allocated once at startup.
//!
//! Buffer replacement travels through here too. The old buffer is dropped
//! on the audio thread, but [`SampleBuffer`] is a `basedrop::Shared`, so the
//! actual free happens later on the collector thread.

use crate::buffer::SampleBuffer;
use crate::types::PlaybackMode;

/// Commands sent from the control context to the engine
#[derive(Debug, Clone)]
pub enum EngineCommand {
    // ─────────────────────────────────────────────────────────────
    // Buffer
    // ─────────────────────────────────────────────────────────────
    /// Bind a new sample buffer, replacing the current one
    Bind(SampleBuffer),
    /// Drop the current buffer; the engine goes idle
    Unbind,

    // ─────────────────────────────────────────────────────────────
    // Transport
    // ─────────────────────────────────────────────────────────────
    /// Arm (or disarm) the engine for playback
    Arm(bool),
    /// Start or pause playback
    Play(bool),
    /// Toggle between playing and paused
    TogglePlay,
    /// Change the playback mode
    SetMode(PlaybackMode),
}

/// Capacity of the command queue
///
/// Transport commands come from a human at a console or a panel, so a small
/// queue is plenty.
pub const COMMAND_QUEUE_CAPACITY: usize = 64;

/// Create a new command channel (producer/consumer pair)
pub fn command_channel() -> (rtrb::Producer<EngineCommand>, rtrb::Consumer<EngineCommand>) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}

/// Control-side handle that hands commands back when the queue is full
pub struct CommandSender {
    producer: rtrb::Producer<EngineCommand>,
}

impl CommandSender {
    pub fn new(producer: rtrb::Producer<EngineCommand>) -> Self {
        Self { producer }
    }

    /// Push a command; a full queue returns it unchanged
    pub fn send(&mut self, command: EngineCommand) -> Result<(), EngineCommand> {
        self.producer.push(command).map_err(|err| match err {
            rtrb::PushError::Full(cmd) => cmd,
        })
    }

    /// Free slots left in the queue
    pub fn capacity_left(&self) -> usize {
        self.producer.slots()
    }

    /// Whether the engine side has been dropped
    pub fn is_disconnected(&self) -> bool {
        self.producer.is_abandoned()
    }
}
