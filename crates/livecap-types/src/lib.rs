//! Shared types for LiveCap
//!
//! This crate contains the plain-data structures exchanged between the
//! capture pipeline and its embedders: configuration, device and display
//! descriptors, permission states, platform capabilities, and the segment
//! record emitted by a running session.
//!
//! Everything serializes with a single canonical `camelCase` naming
//! convention.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Configuration
// ============================================================================

/// Top-level configuration for a capture session.
///
/// Immutable once a session has been created; changing any field requires
/// creating a new session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureConfig {
    /// Audio capture configuration
    pub audio: AudioCaptureConfig,
    /// Screen capture configuration
    pub screen: ScreenCaptureConfig,
    /// Output format settings
    pub output: OutputConfig,
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioCaptureConfig {
    /// Enable audio capture
    pub enabled: bool,
    /// Capture system audio (computer output)
    pub system_audio: bool,
    /// Capture microphone input
    pub microphone: bool,
    /// Target sample rate in Hz (e.g. 44100, 48000)
    pub sample_rate: u32,
    /// Channel count of emitted segments (1 = mono, 2 = stereo)
    pub channels: u16,
    /// Segment duration in milliseconds for real-time processing
    pub segment_duration_ms: u32,
    /// Microphone device id (None = default input device)
    pub microphone_device_id: Option<String>,
    /// Encoding applied to emitted segments
    pub format: AudioFormat,
    /// Linear gain applied to the microphone before mixing
    pub microphone_gain: f32,
    /// Linear gain applied to system audio before mixing
    pub system_audio_gain: f32,
}

impl Default for AudioCaptureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            system_audio: true,
            microphone: true,
            sample_rate: 44100,
            channels: 2,
            segment_duration_ms: 2000,
            microphone_device_id: None,
            format: AudioFormat::Aac,
            microphone_gain: 1.0,
            system_audio_gain: 1.0,
        }
    }
}

/// Screen capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ScreenCaptureConfig {
    /// Enable screen capture
    pub enabled: bool,
    /// Display id to capture (None = primary display)
    pub display_id: Option<u32>,
    /// Capture frame rate
    pub fps: u32,
    /// Capture quality (0-100)
    pub quality: u8,
    /// Include cursor in capture
    pub include_cursor: bool,
    /// Capture a specific window id (None = full screen)
    pub window_id: Option<i64>,
}

impl Default for ScreenCaptureConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            display_id: None,
            fps: 30,
            quality: 80,
            include_cursor: true,
            window_id: None,
        }
    }
}

/// Output format configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct OutputConfig {
    /// Audio output format
    pub audio: AudioFormat,
    /// Video output format (if screen capture is enabled)
    pub video: VideoFormat,
    /// Output directory for an external segment sink (None = in-memory only)
    pub output_dir: Option<String>,
    /// Enable real-time streaming delivery
    pub real_time: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            audio: AudioFormat::Aac,
            video: VideoFormat::Mp4,
            output_dir: None,
            real_time: true,
        }
    }
}

/// Supported audio segment encodings
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// AAC in ADTS framing (recommended for transcription and HLS)
    #[default]
    Aac,
    /// MP3 frames
    Mp3,
    /// WAV container, 32-bit float samples
    Wav,
    /// Raw interleaved little-endian f32 samples, no container
    Raw,
}

/// Supported video formats
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VideoFormat {
    /// MP4 container with H.264
    #[default]
    Mp4,
    /// WebM container
    WebM,
    /// Raw frames
    Raw,
}

// ============================================================================
// Devices and displays
// ============================================================================

/// Audio device snapshot.
///
/// Refreshed on each enumeration call; ids are not guaranteed stable across
/// device hot-plug events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AudioDevice {
    /// Platform device id
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Input or output
    pub device_type: AudioDeviceType,
    /// Whether this is the platform default for its type
    pub is_default: bool,
    /// Supported sample rates
    pub sample_rates: Vec<u32>,
    /// Supported channel counts
    pub channels: Vec<u16>,
}

/// Audio device type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AudioDeviceType {
    Input,
    Output,
}

/// Display snapshot for the screen-capture configuration surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Display {
    /// Display id
    pub id: u32,
    /// Display name
    pub name: String,
    /// Resolution (width, height)
    pub resolution: (u32, u32),
    /// Position of the top-left corner in the virtual desktop
    pub position: (i32, i32),
    /// Whether this is the primary display
    pub is_primary: bool,
    /// Display scale factor
    pub scale_factor: f64,
}

// ============================================================================
// Permissions
// ============================================================================

/// OS-level capability that capture may require.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    Microphone,
    ScreenRecording,
    SystemAudio,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Microphone => write!(f, "microphone"),
            Capability::ScreenRecording => write!(f, "screen recording"),
            Capability::SystemAudio => write!(f, "system audio"),
        }
    }
}

/// State of a single capability.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum PermissionState {
    /// Permission granted
    Granted,
    /// Permission denied
    Denied,
    /// Permission not yet requested
    #[default]
    NotRequested,
    /// Permission request in progress
    Requesting,
    /// No gating required on this platform
    NotApplicable,
}

impl PermissionState {
    /// Whether this state allows capture to proceed.
    pub fn allows_capture(self) -> bool {
        matches!(self, PermissionState::Granted | PermissionState::NotApplicable)
    }
}

/// Permission snapshot across all capture capabilities.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PermissionStatus {
    /// Microphone permission status
    pub microphone: PermissionState,
    /// Screen recording permission status
    pub screen_recording: PermissionState,
    /// System audio permission status (varies by platform)
    pub system_audio: PermissionState,
}

impl PermissionStatus {
    /// State for one capability.
    pub fn state(&self, capability: Capability) -> PermissionState {
        match capability {
            Capability::Microphone => self.microphone,
            Capability::ScreenRecording => self.screen_recording,
            Capability::SystemAudio => self.system_audio,
        }
    }

    /// Replace the state for one capability.
    pub fn set_state(&mut self, capability: Capability, state: PermissionState) {
        match capability {
            Capability::Microphone => self.microphone = state,
            Capability::ScreenRecording => self.screen_recording = state,
            Capability::SystemAudio => self.system_audio = state,
        }
    }
}

// ============================================================================
// Sessions and segments
// ============================================================================

/// Lifecycle state of a capture session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Created,
    Started,
    Stopped,
    Failed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Created => write!(f, "created"),
            SessionStatus::Started => write!(f, "started"),
            SessionStatus::Stopped => write!(f, "stopped"),
            SessionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Origin of the audio in a segment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SegmentSource {
    Microphone,
    SystemAudio,
    Mixed,
}

/// One encoded slice of captured audio.
///
/// Immutable once emitted. Sequence numbers start at 0 and increase strictly
/// within the owning session; timestamps are capture-relative and monotonic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AudioSegment {
    /// Encoded payload
    pub data: Vec<u8>,
    /// Encoding of the payload
    pub format: AudioFormat,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Origin of the audio
    pub source: SegmentSource,
    /// Capture-relative start time in milliseconds
    pub start_ms: u64,
    /// Duration in milliseconds
    pub duration_ms: u32,
    /// Session-scoped sequence number
    pub sequence: u64,
}

// ============================================================================
// Platform capabilities
// ============================================================================

/// Operating system family.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Platform {
    MacOs,
    Windows,
    Linux,
    Unknown,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::MacOs => write!(f, "macOS"),
            Platform::Windows => write!(f, "Windows"),
            Platform::Linux => write!(f, "Linux"),
            Platform::Unknown => write!(f, "Unknown"),
        }
    }
}

/// What the current machine can capture.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlatformCapabilities {
    /// Operating system
    pub platform: Platform,
    /// Audio capture capabilities
    pub audio: AudioCapabilities,
    /// Screen capture capabilities
    pub screen: ScreenCapabilities,
    /// OS version string
    pub system_version: String,
    /// Current permission snapshot
    pub permissions: PermissionStatus,
}

/// Audio side of [`PlatformCapabilities`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AudioCapabilities {
    /// System audio capture supported (native loopback or virtual device)
    pub system_audio: bool,
    /// Microphone capture supported
    pub microphone: bool,
    /// Commonly supported sample rates
    pub sample_rates: Vec<u32>,
    /// Supported segment encodings
    pub formats: Vec<AudioFormat>,
    /// Number of input devices
    pub input_devices: usize,
    /// Number of output devices
    pub output_devices: usize,
}

/// Screen side of [`PlatformCapabilities`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScreenCapabilities {
    /// Screen capture supported
    pub supported: bool,
    /// Number of displays
    pub display_count: usize,
    /// Window capture supported
    pub window_capture: bool,
    /// Supported frame rates
    pub frame_rates: Vec<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_documented_defaults() {
        let config: CaptureConfig = serde_json::from_str("{}").unwrap();
        assert!(config.audio.enabled);
        assert!(config.audio.system_audio);
        assert!(config.audio.microphone);
        assert_eq!(config.audio.sample_rate, 44100);
        assert_eq!(config.audio.channels, 2);
        assert_eq!(config.audio.segment_duration_ms, 2000);
        assert_eq!(config.audio.format, AudioFormat::Aac);
        assert!(!config.screen.enabled);
        assert!(config.output.real_time);
    }

    #[test]
    fn partial_json_overrides_only_named_fields() {
        let config: CaptureConfig = serde_json::from_str(
            r#"{"audio":{"systemAudio":false,"segmentDurationMs":1000,"format":"wav"}}"#,
        )
        .unwrap();
        assert!(!config.audio.system_audio);
        assert_eq!(config.audio.segment_duration_ms, 1000);
        assert_eq!(config.audio.format, AudioFormat::Wav);
        // untouched fields keep their defaults
        assert!(config.audio.microphone);
        assert_eq!(config.audio.sample_rate, 44100);
    }

    #[test]
    fn config_round_trips_camel_case() {
        let config = CaptureConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("segmentDurationMs"));
        assert!(json.contains("systemAudio"));
        assert!(!json.contains("segment_duration_ms"));
        let back: CaptureConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn permission_status_accessors() {
        let mut status = PermissionStatus::default();
        assert_eq!(status.state(Capability::Microphone), PermissionState::NotRequested);
        status.set_state(Capability::Microphone, PermissionState::Granted);
        assert_eq!(status.state(Capability::Microphone), PermissionState::Granted);
        assert!(status.microphone.allows_capture());
        assert!(!status.system_audio.allows_capture());
        assert!(PermissionState::NotApplicable.allows_capture());
    }

    #[test]
    fn segment_serializes_with_source_tag() {
        let segment = AudioSegment {
            data: vec![1, 2, 3],
            format: AudioFormat::Raw,
            sample_rate: 48000,
            channels: 1,
            source: SegmentSource::SystemAudio,
            start_ms: 4000,
            duration_ms: 2000,
            sequence: 2,
        };
        let json = serde_json::to_string(&segment).unwrap();
        assert!(json.contains(r#""source":"systemAudio""#));
        assert!(json.contains(r#""sequence":2"#));
    }
}
