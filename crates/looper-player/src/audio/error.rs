//! Audio output error types

use thiserror::Error;

/// Errors that can occur while opening or running the output stream
#[derive(Error, Debug)]
pub enum AudioError {
    /// No output devices available on the host
    #[error("No audio output devices found")]
    NoDevices,

    /// The host has no default output device
    #[error("No default output device: {0}")]
    NoDefaultDevice(String),

    /// Named device does not exist
    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),

    /// Could not query or select a stream configuration
    #[error("Failed to query device config: {0}")]
    ConfigError(String),

    /// Device offers no format we can drive
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// Failed to build the audio stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start playback on the stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),

    /// The engine rejected its configuration
    #[error(transparent)]
    Engine(#[from] looper_core::EngineError),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
