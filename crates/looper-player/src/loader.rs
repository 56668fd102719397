//! WAV file loading
//!
//! Any bit depth and channel count `hound` can read. Channels are averaged
//! to mono and the result is peak-normalised to full Q15 scale, so quiet
//! recordings still drive the filters properly.

use std::path::Path;

use thiserror::Error;

use looper_core::{EngineError, SampleBuffer};

/// Errors from loading a WAV file
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read WAV file {path}: {source}")]
    Wav {
        path: String,
        #[source]
        source: hound::Error,
    },

    #[error("WAV file {0} contains no audio")]
    Empty(String),

    #[error("Unsupported WAV format in {path}: {reason}")]
    Unsupported { path: String, reason: String },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Result type for loading operations
pub type LoadResult<T> = Result<T, LoadError>;

/// Decoded mono audio before it is handed to the engine
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    /// Channel count of the source file
    pub channels: u16,
}

/// Load a WAV file as an engine buffer
pub fn load_wav(path: &Path) -> LoadResult<SampleBuffer> {
    let decoded = decode_wav(path)?;
    let channels = decoded.channels;
    let buffer = SampleBuffer::new(decoded.samples, decoded.sample_rate)?;
    log::info!(
        "Loaded {:?}: {} samples @ {} Hz, {:.2} s ({} ch mixed to mono)",
        path,
        buffer.len(),
        buffer.source_rate(),
        buffer.duration_secs(),
        channels
    );
    Ok(buffer)
}

/// Decode, mix to mono and normalise a WAV file
pub fn decode_wav(path: &Path) -> LoadResult<DecodedAudio> {
    let display = path.display().to_string();
    let wav_error = |source| LoadError::Wav {
        path: display.clone(),
        source,
    };

    let reader = hound::WavReader::open(path).map_err(wav_error)?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(LoadError::Unsupported {
            path: display.clone(),
            reason: "zero channels".to_string(),
        });
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(wav_error)?,
        hound::SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(LoadError::Unsupported {
                    path: display.clone(),
                    reason: format!("{} bits per sample", spec.bits_per_sample),
                });
            }
            let scale = (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(wav_error)?
        }
    };

    let mono = mix_to_mono(&interleaved, spec.channels as usize);
    if mono.is_empty() {
        return Err(LoadError::Empty(display));
    }

    Ok(DecodedAudio {
        samples: normalize_to_q15(&mono),
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

/// Average interleaved frames; a trailing partial frame is dropped
fn mix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Scale so the loudest sample hits full Q15 scale. Silence stays silent.
fn normalize_to_q15(mono: &[f32]) -> Vec<i16> {
    let peak = mono
        .iter()
        .filter(|s| s.is_finite())
        .fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak <= f32::EPSILON {
        return vec![0; mono.len()];
    }
    let gain = i16::MAX as f32 / peak;
    mono.iter()
        .map(|&s| {
            let s = if s.is_finite() { s } else { 0.0 };
            (s * gain).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_wav<S: hound::Sample + Copy>(
        path: &Path,
        channels: u16,
        bits: u16,
        format: hound::SampleFormat,
        samples: &[S],
    ) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 22_050,
            bits_per_sample: bits,
            sample_format: format,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_stereo_16bit_mixed_and_normalised() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stereo.wav");
        // Frames: (1000, 3000), (-2000, -2000), (0, 0)
        write_wav(&path, 2, 16, hound::SampleFormat::Int, &[1000i16, 3000, -2000, -2000, 0, 0]);

        let decoded = decode_wav(&path).unwrap();
        assert_eq!(decoded.channels, 2);
        assert_eq!(decoded.sample_rate, 22_050);
        // Both non-zero frames average to magnitude 2000, the peak
        assert_eq!(decoded.samples, vec![i16::MAX, -i16::MAX, 0]);
    }

    #[test]
    fn test_float_and_24bit_inputs() {
        let dir = TempDir::new().unwrap();

        let float_path = dir.path().join("float.wav");
        write_wav(&float_path, 1, 32, hound::SampleFormat::Float, &[0.25f32, -0.5, 0.125]);
        let decoded = decode_wav(&float_path).unwrap();
        assert_eq!(decoded.samples, vec![16384, -i16::MAX, 8192]);

        let int24_path = dir.path().join("int24.wav");
        write_wav(&int24_path, 1, 24, hound::SampleFormat::Int, &[4_000_000i32, -1_000_000]);
        let decoded = decode_wav(&int24_path).unwrap();
        assert_eq!(decoded.samples, vec![i16::MAX, -8192]);
    }

    #[test]
    fn test_silence_stays_silent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("silence.wav");
        write_wav(&path, 1, 16, hound::SampleFormat::Int, &[0i16; 32]);
        let decoded = decode_wav(&path).unwrap();
        assert_eq!(decoded.samples, vec![0; 32]);
    }

    #[test]
    fn test_empty_file_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.wav");
        write_wav::<i16>(&path, 1, 16, hound::SampleFormat::Int, &[]);
        assert!(matches!(decode_wav(&path), Err(LoadError::Empty(_))));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.wav");
        let err = load_wav(&path).unwrap_err();
        assert!(matches!(err, LoadError::Wav { .. }));
        assert!(err.to_string().contains("missing.wav"));
    }

    #[test]
    fn test_load_wav_builds_buffer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tone.wav");
        let samples: Vec<i16> = (0..4096).map(|i| ((i % 64) as i16 - 32) * 100).collect();
        write_wav(&path, 1, 16, hound::SampleFormat::Int, &samples);

        let buffer = load_wav(&path).unwrap();
        assert_eq!(buffer.len(), 4096);
        assert_eq!(buffer.source_rate(), 22_050);
        assert_eq!(buffer.samples()[0], -i16::MAX);
    }

    #[test]
    fn test_load_wav_duration_at_source_rate() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stereo_second.wav");
        // One second of stereo frames at 22.05 kHz
        let samples: Vec<i16> = (0..2 * 22_050).map(|i| (i % 200) as i16 * 50).collect();
        write_wav(&path, 2, 16, hound::SampleFormat::Int, &samples);

        let buffer = load_wav(&path).unwrap();
        assert_eq!(buffer.len(), 22_050);
        assert!((buffer.duration_secs() - 1.0).abs() < 1e-9);
    }
}
