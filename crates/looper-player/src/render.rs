//! Offline rendering to a WAV file

use std::path::Path;

use anyhow::{Context, Result};

use looper_core::config::EngineConfig;
use looper_core::engine::{Sampler, SharedControls};
use looper_core::{DiagFlags, PlaybackMode, SampleBuffer};

/// What an offline render produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSummary {
    pub frames: u64,
    pub loop_events: u32,
    /// Every diagnostic raised during the render
    pub diag: DiagFlags,
}

/// Play `buffer` for `seconds` with fixed controls and write 16-bit mono
pub fn render_to_wav(
    buffer: SampleBuffer,
    engine: &EngineConfig,
    controls: &SharedControls,
    mode: PlaybackMode,
    seconds: f64,
    out: &Path,
) -> Result<RenderSummary> {
    let mut sampler = Sampler::new(engine.clone()).context("Invalid engine config")?;
    sampler.set_mode(mode);
    sampler.bind_buffer(Some(buffer));
    sampler.arm(true);
    sampler.play(true);

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: engine.output_sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(out, spec)
        .with_context(|| format!("Failed to create {:?}", out))?;

    let total = (seconds.max(0.0) * engine.output_sample_rate as f64).round() as u64;
    let mut block = vec![0i16; engine.block_size];
    let mut written = 0u64;
    let mut diag = DiagFlags::empty();

    while written < total {
        diag |= sampler.render(controls, &mut block[..]);
        let take = (total - written).min(block.len() as u64) as usize;
        for &sample in &block[..take] {
            writer.write_sample(sample).context("Failed to write sample")?;
        }
        written += take as u64;
    }
    writer.finalize().context("Failed to finalize WAV file")?;

    let summary = RenderSummary {
        frames: written,
        loop_events: sampler.loop_events(),
        diag,
    };
    log::info!(
        "Rendered {} frames to {:?} ({} loop events)",
        summary.frames,
        out,
        summary.loop_events
    );
    Ok(summary)
}
