//! Read-only sample buffer shared with the audio thread

use basedrop::Shared;

use crate::engine::gc::collector_handle;
use crate::error::{EngineError, EngineResult};

/// Mono Q15 sample data plus the rate it was recorded at.
///
/// Cloning only bumps a reference count. The samples are never mutated;
/// a new load produces a new buffer that replaces the old one wholesale.
#[derive(Clone)]
pub struct SampleBuffer {
    samples: Shared<Vec<i16>>,
    source_rate: u32,
}

impl SampleBuffer {
    /// Wrap decoded samples for playback.
    ///
    /// Fails on a zero source rate or on data the 32-bit phase index cannot
    /// address. Empty and very short buffers are accepted; the engine plays
    /// them as silence.
    pub fn new(samples: Vec<i16>, source_rate: u32) -> EngineResult<Self> {
        if source_rate == 0 {
            return Err(EngineError::ZeroSampleRate("source"));
        }
        if samples.len() > u32::MAX as usize {
            return Err(EngineError::BufferTooLarge(samples.len()));
        }
        let handle = collector_handle()?;
        Ok(Self {
            samples: Shared::new(&handle, samples),
            source_rate,
        })
    }

    #[inline]
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn source_rate(&self) -> u32 {
        self.source_rate
    }

    /// Duration in seconds at the source rate
    pub fn duration_secs(&self) -> f64 {
        self.len() as f64 / self.source_rate as f64
    }
}

impl std::fmt::Debug for SampleBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleBuffer")
            .field("len", &self.len())
            .field("source_rate", &self.source_rate)
            .finish()
    }
}
