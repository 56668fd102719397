//! Audio output for the looper engine
//!
//! The device callback asks for however many frames the driver wants; the
//! engine renders fixed-size blocks. [`BlockPump`] sits in between: it owns
//! the sampler, drains the command queue once per engine block and hands
//! out samples one at a time. Nothing in the pump locks or allocates after
//! construction, so the whole thing moves into the stream closure.

mod cpal_backend;
mod device;
mod error;

use std::sync::Arc;

use looper_core::engine::{EngineCommand, Sampler, SharedControls};
pub use cpal_backend::{start_output, AudioHandle, AudioOutput};
pub use device::{list_output_devices, OutputDevice};
pub use error::{AudioError, AudioResult};

/// Adapts fixed engine blocks to arbitrary host buffer sizes
pub struct BlockPump {
    sampler: Sampler,
    commands: rtrb::Consumer<EngineCommand>,
    controls: Arc<SharedControls>,
    block: Vec<i16>,
    cursor: usize,
}

impl BlockPump {
    pub fn new(
        sampler: Sampler,
        commands: rtrb::Consumer<EngineCommand>,
        controls: Arc<SharedControls>,
    ) -> Self {
        let block = vec![0; sampler.config().block_size];
        let cursor = block.len();
        Self {
            sampler,
            commands,
            controls,
            block,
            cursor,
        }
    }

    /// Next mono sample, rendering a new block when the current one is spent
    #[inline]
    pub fn next_sample(&mut self) -> i16 {
        if self.cursor >= self.block.len() {
            self.sampler.process_commands(&mut self.commands);
            self.sampler.render(&*self.controls, &mut self.block[..]);
            self.cursor = 0;
        }
        let sample = self.block[self.cursor];
        self.cursor += 1;
        sample
    }

    /// Fill an interleaved f32 device buffer, copying mono to every channel
    pub fn fill_interleaved(&mut self, data: &mut [f32], channels: usize) {
        for frame in data.chunks_mut(channels.max(1)) {
            let value = self.next_sample() as f32 / 32768.0;
            frame.fill(value);
        }
    }

    #[cfg(test)]
    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use looper_core::config::EngineConfig;
    use looper_core::engine::{command_channel, CommandSender};
    use looper_core::{DiagFlags, SampleBuffer, TransportState};

    fn pump() -> (BlockPump, CommandSender) {
        let config = EngineConfig {
            output_sample_rate: 8000,
            min_loop_len: 64,
            ..EngineConfig::default()
        };
        let sampler = Sampler::new(config).unwrap();
        let (tx, rx) = command_channel();
        let pump = BlockPump::new(sampler, rx, Arc::new(SharedControls::new()));
        (pump, CommandSender::new(tx))
    }

    #[test]
    fn test_silent_until_commanded() {
        let (mut pump, _sender) = pump();
        let mut data = vec![1.0f32; 256];
        pump.fill_interleaved(&mut data, 2);
        assert!(data.iter().all(|&s| s == 0.0));
        let diag = pump.sampler().telemetry().read().diag;
        assert!(diag.contains(DiagFlags::NO_BUFFER));
    }

    #[test]
    fn test_commands_applied_at_block_boundary() {
        let (mut pump, mut sender) = pump();
        let samples: Vec<i16> = (0..1024).map(|i| i as i16 * 16).collect();
        let buffer = SampleBuffer::new(samples, 8000).unwrap();
        sender.send(EngineCommand::Bind(buffer)).unwrap();
        sender.send(EngineCommand::Arm(true)).unwrap();
        sender.send(EngineCommand::Play(true)).unwrap();

        // Unity rate, full-range loop: the output is the buffer itself
        let rendered: Vec<i16> = (0..200).map(|_| pump.next_sample()).collect();
        let expected: Vec<i16> = (0..200).map(|i| i as i16 * 16).collect();
        assert_eq!(rendered, expected);
        assert_eq!(pump.sampler().state(), TransportState::Playing);
    }

    #[test]
    fn test_interleaved_copies_mono_to_all_channels() {
        let (mut pump, mut sender) = pump();
        let buffer = SampleBuffer::new(vec![16384; 512], 8000).unwrap();
        sender.send(EngineCommand::Bind(buffer)).unwrap();
        sender.send(EngineCommand::Arm(true)).unwrap();
        sender.send(EngineCommand::Play(true)).unwrap();

        let mut data = vec![0.0f32; 3 * 10];
        pump.fill_interleaved(&mut data, 3);
        for frame in data.chunks(3) {
            assert_eq!(frame[0], frame[1]);
            assert_eq!(frame[1], frame[2]);
        }
        assert_eq!(data[0], 0.5);
    }
}
