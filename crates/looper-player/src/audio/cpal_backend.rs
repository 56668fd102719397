//! CPAL output stream
//!
//! ```text
//! ┌──────────────────┐   push()    ┌─────────────────────┐
//! │  Console thread  │────────────►│   Command Queue     │
//! └──────────────────┘             │  (lock-free SPSC)   │
//!         │                        └──────────┬──────────┘
//!         │ atomics                           │ pop() per block
//!         ▼                                   ▼
//! ┌──────────────────┐             ┌─────────────────────┐
//! │  SharedControls  │────────────►│  CPAL Audio Thread  │
//! └──────────────────┘  snapshot   │   (owns BlockPump)  │
//!                                  └──────────┬──────────┘
//!                                             │ seqlock
//!                                             ▼
//!                                  ┌─────────────────────┐
//!                                  │      Telemetry      │
//!                                  └─────────────────────┘
//! ```

use std::sync::Arc;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, SampleFormat, Stream, StreamConfig};

use looper_core::config::EngineConfig;
use looper_core::engine::{command_channel, CommandSender, Sampler, SharedControls, Telemetry};

use super::device::{default_output_device, find_output_device};
use super::error::{AudioError, AudioResult};
use super::BlockPump;
use crate::config::AudioSettings;

/// Keeps the output stream alive; dropping it stops playback
pub struct AudioHandle {
    _stream: Stream,
    sample_rate: u32,
    channels: u16,
    buffer_frames: Option<u32>,
}

impl AudioHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Device buffer latency, if a fixed buffer size was requested
    pub fn latency_ms(&self) -> Option<f32> {
        self.buffer_frames
            .map(|frames| frames as f32 / self.sample_rate as f32 * 1000.0)
    }
}

/// A running output plus the control-side ends of the engine
pub struct AudioOutput {
    pub handle: AudioHandle,
    pub commands: CommandSender,
    pub telemetry: Arc<Telemetry>,
}

/// Open the configured device and start rendering the engine into it.
///
/// The engine runs at the device rate, so `engine.output_sample_rate` is
/// overridden by whatever the device accepts.
pub fn start_output(
    settings: &AudioSettings,
    engine: &EngineConfig,
    controls: Arc<SharedControls>,
) -> AudioResult<AudioOutput> {
    let device = match settings.device.as_deref() {
        Some(name) => find_output_device(name)?,
        None => default_output_device()?,
    };
    let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

    let (supported, sample_rate) = get_output_config(&device, engine.output_sample_rate)?;
    if supported.sample_format() != SampleFormat::F32 {
        return Err(AudioError::UnsupportedFormat(format!(
            "{:?} on {}",
            supported.sample_format(),
            device_name
        )));
    }
    let channels = supported.channels();

    let stream_config = StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: match settings.buffer_frames {
            Some(frames) => CpalBufferSize::Fixed(frames),
            None => CpalBufferSize::Default,
        },
    };

    let engine_config = EngineConfig {
        output_sample_rate: sample_rate,
        ..engine.clone()
    };
    let sampler = Sampler::new(engine_config)?;
    let telemetry = sampler.telemetry();
    let (producer, consumer) = command_channel();
    let mut pump = BlockPump::new(sampler, consumer, controls);

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                pump.fill_interleaved(data, channels as usize);
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

    let handle = AudioHandle {
        _stream: stream,
        sample_rate,
        channels,
        buffer_frames: settings.buffer_frames,
    };

    log::info!(
        "Audio output started on '{}': {} ch @ {} Hz, buffer {}",
        device_name,
        channels,
        sample_rate,
        match handle.latency_ms() {
            Some(ms) => format!("{:.1} ms", ms),
            None => "default".to_string(),
        }
    );

    Ok(AudioOutput {
        handle,
        commands: CommandSender::new(producer),
        telemetry,
    })
}

/// Pick a stream config: f32, stereo, at the target rate when possible
fn get_output_config(
    device: &cpal::Device,
    target_sample_rate: u32,
) -> AudioResult<(cpal::SupportedStreamConfig, u32)> {
    let supported_configs: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    let supports_rate = |c: &cpal::SupportedStreamConfigRange| {
        target_sample_rate >= c.min_sample_rate().0 && target_sample_rate <= c.max_sample_rate().0
    };

    let best_config = supported_configs
        .iter()
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .filter(|c| c.channels() >= 2)
        .find(|c| supports_rate(c))
        .or_else(|| {
            supported_configs
                .iter()
                .find(|c| c.sample_format() == SampleFormat::F32)
        })
        .or_else(|| supported_configs.first())
        .ok_or_else(|| AudioError::ConfigError("No supported output configurations".to_string()))?;

    let sample_rate = if supports_rate(best_config) {
        target_sample_rate
    } else {
        let fallback = best_config.max_sample_rate().0;
        log::warn!(
            "Audio device doesn't support {}Hz, falling back to {}Hz",
            target_sample_rate,
            fallback
        );
        fallback
    };

    let config = best_config.clone().with_sample_rate(cpal::SampleRate(sample_rate));
    Ok((config, sample_rate))
}
