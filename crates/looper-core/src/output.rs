//! Output sinks
//!
//! The engine writes Q15 samples into anything implementing [`OutputSink`]:
//! a plain `[i16]` block, or a PWM duty buffer for hardware without a DAC.

use crate::types::SILENCE;

/// Destination for one rendered block
pub trait OutputSink {
    /// Samples in the block
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store one sample. Indices past the end are ignored.
    fn write(&mut self, index: usize, sample: i16);

    fn fill_silence(&mut self) {
        for i in 0..self.len() {
            self.write(i, SILENCE);
        }
    }
}

impl OutputSink for [i16] {
    #[inline]
    fn len(&self) -> usize {
        <[i16]>::len(self)
    }

    #[inline]
    fn write(&mut self, index: usize, sample: i16) {
        if let Some(slot) = self.get_mut(index) {
            *slot = sample;
        }
    }
}

/// Map a Q15 sample to a PWM duty value for a counter of `resolution` steps.
///
/// Full negative scale is 0, silence is mid-scale, full positive scale is
/// just under `resolution - 1`.
#[inline]
pub fn q15_to_pwm(sample: i16, resolution: u32) -> u16 {
    let unsigned = (sample as u16 ^ 0x8000) as u32;
    let top = resolution.clamp(1, u16::MAX as u32 + 1) - 1;
    ((unsigned * top) >> 16) as u16
}

/// Duty-cycle buffer for a PWM output stage
pub struct PwmSink<'a> {
    duty: &'a mut [u16],
    resolution: u32,
}

impl<'a> PwmSink<'a> {
    pub fn new(duty: &'a mut [u16], resolution: u32) -> Self {
        Self { duty, resolution }
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }
}

impl OutputSink for PwmSink<'_> {
    #[inline]
    fn len(&self) -> usize {
        self.duty.len()
    }

    #[inline]
    fn write(&mut self, index: usize, sample: i16) {
        let resolution = self.resolution;
        if let Some(slot) = self.duty.get_mut(index) {
            *slot = q15_to_pwm(sample, resolution);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_sink() {
        let mut block = [7i16; 4];
        let sink: &mut [i16] = &mut block;
        assert_eq!(OutputSink::len(sink), 4);
        sink.write(1, -3);
        sink.write(99, 5);
        assert_eq!(block, [7, -3, 7, 7]);

        let sink: &mut [i16] = &mut block;
        sink.fill_silence();
        assert_eq!(block, [0; 4]);
    }

    #[test]
    fn test_pwm_mapping() {
        assert_eq!(q15_to_pwm(i16::MIN, 4096), 0);
        assert_eq!(q15_to_pwm(0, 4096), 2047);
        assert_eq!(q15_to_pwm(i16::MAX, 4096), 4094);
        assert_eq!(q15_to_pwm(0, 1), 0);
    }

    #[test]
    fn test_pwm_sink_silence_is_midscale() {
        let mut duty = [0u16; 8];
        let mut sink = PwmSink::new(&mut duty, 1024);
        sink.fill_silence();
        assert!(duty.iter().all(|&d| d == 511));
    }
}
