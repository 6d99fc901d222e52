//! Error taxonomy for the capture pipeline.
//!
//! Every variant carries enough context (capability, device, remediation
//! text) to be shown directly in a UI without further lookup.

use livecap_types::{Capability, SessionStatus};
use thiserror::Error;

/// Result type for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Error types for the capture library
#[derive(Error, Debug)]
pub enum CaptureError {
    /// A required OS permission is missing
    #[error("permission denied for {capability}: {remediation}")]
    PermissionDenied {
        capability: Capability,
        remediation: String,
    },

    /// A requested device does not exist or cannot be opened
    #[error("device not available: {device}. {instructions}")]
    DeviceNotAvailable { device: String, instructions: String },

    /// Another session already owns the device
    #[error("device is already in use by another capture session: {device}")]
    DeviceConflict { device: String },

    /// A device disappeared mid-session
    #[error("device disconnected: {device}")]
    DeviceDisconnected { device: String },

    /// Encoder could not be created; fatal to session start
    #[error("encoder initialization failed: {0}")]
    EncoderInitFailed(String),

    /// A single segment failed to encode; the session continues
    #[error("failed to encode segment {sequence}: {reason}")]
    EncodeSegmentFailed { sequence: u64, reason: String },

    /// An operation was called in the wrong session state
    #[error("invalid session state: expected {expected}, session is {actual}")]
    SessionStateViolation {
        expected: &'static str,
        actual: SessionStatus,
    },

    /// System audio capture has no working mechanism on this platform
    #[error("system audio capture not supported: {0}")]
    NotSupported(String),

    /// Configuration rejected at session creation
    #[error("invalid configuration: {0}")]
    ConfigurationInvalid(String),

    /// Audio-subsystem errors
    #[error("audio error: {0}")]
    Audio(#[from] AudioError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// General errors
    #[error(transparent)]
    General(#[from] anyhow::Error),
}

/// Audio-specific errors
#[derive(Error, Debug)]
pub enum AudioError {
    /// Failed to initialize the audio backend
    #[error("failed to initialize audio backend: {0}")]
    InitializationFailed(String),

    /// Audio device not found
    #[error("audio device not found: {0}")]
    DeviceNotFound(String),

    /// Audio stream error
    #[error("audio stream error: {0}")]
    StreamError(String),

    /// Audio encoding error
    #[error("audio encoding error: {0}")]
    EncodingError(String),
}

impl From<cpal::DevicesError> for CaptureError {
    fn from(err: cpal::DevicesError) -> Self {
        CaptureError::Audio(AudioError::DeviceNotFound(err.to_string()))
    }
}

impl From<cpal::DeviceNameError> for CaptureError {
    fn from(err: cpal::DeviceNameError) -> Self {
        CaptureError::Audio(AudioError::DeviceNotFound(err.to_string()))
    }
}

impl From<cpal::DefaultStreamConfigError> for CaptureError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        CaptureError::Audio(AudioError::StreamError(err.to_string()))
    }
}

impl From<cpal::BuildStreamError> for CaptureError {
    fn from(err: cpal::BuildStreamError) -> Self {
        let context = match &err {
            cpal::BuildStreamError::DeviceNotAvailable => {
                "audio device not available - check if another app is using it"
            }
            cpal::BuildStreamError::InvalidArgument => {
                "invalid audio configuration - check sample rate and channel count"
            }
            _ => "audio stream creation failed",
        };
        CaptureError::Audio(AudioError::StreamError(format!("{context}: {err}")))
    }
}

impl From<cpal::PlayStreamError> for CaptureError {
    fn from(err: cpal::PlayStreamError) -> Self {
        CaptureError::Audio(AudioError::StreamError(err.to_string()))
    }
}

impl From<cpal::PauseStreamError> for CaptureError {
    fn from(err: cpal::PauseStreamError) -> Self {
        CaptureError::Audio(AudioError::StreamError(err.to_string()))
    }
}
