//! Capture-session pipeline for LiveCap
//!
//! Captures live audio (system output mixed with microphone input) and
//! turns it into a continuous stream of fixed-duration encoded segments
//! suitable for real-time transcription, recording, or HLS distribution.
//!
//! # Pipeline
//! - **Sources** deliver mono PCM at the session rate from platform devices
//!   (cpal microphone, monitor/WASAPI loopback, virtual drivers).
//! - **Mixer + segmenter** run on the delivery path, cutting fixed-duration
//!   windows with session-scoped sequence numbers.
//! - **Encoder worker** turns windows into WAV/raw/AAC/MP3 payloads behind
//!   a bounded queue that sheds load instead of stalling the audio thread.
//!
//! # Boundary surface
//! The functions below are the contract with an embedding UI/IPC layer;
//! configuration crosses it as a typed [`CaptureConfig`], never as loose
//! JSON field access.

pub mod devices;
pub mod encoder;
pub mod error;
pub mod mixer;
pub mod permissions;
pub mod platform;
pub mod segmenter;
pub mod session;
pub mod source;

pub(crate) mod queue;

pub use error::{AudioError, CaptureError, CaptureResult};
pub use permissions::PermissionGate;
pub use session::{CaptureSession, SegmentStream};
pub use source::{AudioSource, PlatformSourceFactory, SourceFactory};

pub use livecap_types::{
    AudioCaptureConfig, AudioDevice, AudioFormat, AudioSegment, CaptureConfig, Capability,
    Display, PermissionState, PermissionStatus, PlatformCapabilities, ScreenCaptureConfig,
    SegmentSource, SessionStatus,
};

use std::sync::Arc;

/// Query what this machine can capture. Side-effect free.
pub fn init() -> PlatformCapabilities {
    platform::get_platform_capabilities()
}

/// Snapshot of available audio devices (inputs and outputs).
pub fn get_audio_devices() -> Vec<AudioDevice> {
    devices::list_audio_devices()
}

/// Snapshot of available displays.
pub fn get_displays() -> Vec<Display> {
    devices::list_displays()
}

/// Last-known permission state; never prompts.
pub async fn check_permissions() -> PermissionStatus {
    PermissionGate::global().check()
}

/// Request all undecided permissions, suspending until the user decides.
pub async fn request_permissions() -> PermissionStatus {
    PermissionGate::global().request().await
}

/// Platform-keyed guidance for enabling system audio capture.
pub fn get_system_audio_setup_instructions() -> &'static str {
    permissions::system_audio_setup_instructions()
}

/// Create a session against the real platform devices.
pub fn create_capture_session(config: CaptureConfig) -> CaptureResult<CaptureSession> {
    CaptureSession::new(config, Arc::new(PlatformSourceFactory))
}

/// Create a session against an injected source backend (fakes in tests,
/// alternative capture strategies in embedders).
pub fn create_capture_session_with_factory(
    config: CaptureConfig,
    factory: Arc<dyn SourceFactory>,
) -> CaptureResult<CaptureSession> {
    CaptureSession::new(config, factory)
}

/// Parse a configuration arriving over the embedder boundary as JSON.
/// Unknown values fail here instead of deep inside the pipeline.
pub fn parse_capture_config(json: &str) -> CaptureResult<CaptureConfig> {
    Ok(serde_json::from_str(json)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_reports_capabilities() {
        let capabilities = init();
        assert!(!capabilities.system_version.is_empty());
    }

    #[test]
    fn parse_config_accepts_boundary_json() {
        let config = parse_capture_config(
            r#"{"audio":{"microphone":true,"systemAudio":false,"segmentDurationMs":1000}}"#,
        )
        .unwrap();
        assert_eq!(config.audio.segment_duration_ms, 1000);
        assert!(!config.audio.system_audio);
    }

    #[test]
    fn parse_config_rejects_malformed_json() {
        assert!(matches!(
            parse_capture_config("{\"audio\":"),
            Err(CaptureError::Serialization(_))
        ));
    }

    #[test]
    fn session_creation_validates_config() {
        let mut config = CaptureConfig::default();
        config.audio.channels = 0;
        assert!(matches!(
            create_capture_session(config),
            Err(CaptureError::ConfigurationInvalid(_))
        ));
    }
}
