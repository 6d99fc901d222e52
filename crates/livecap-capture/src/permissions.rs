//! Permission gate for capture capabilities.
//!
//! Tracks one state machine per capability:
//! `NotRequested --request()--> Requesting --> Granted | Denied`, with
//! `NotApplicable` as a terminal state for capabilities that need no gating
//! on the current platform.
//!
//! The gate never shows OS UI itself; prompts happen when the OS mediates
//! device access. `check` is a non-blocking probe, `request` may suspend and
//! is idempotent while a request wave is in flight. Cancelling a `request`
//! future stops waiting without affecting any OS prompt already shown.

use livecap_types::{Capability, PermissionState, PermissionStatus};
use parking_lot::Mutex;
use std::sync::OnceLock;

const ALL_CAPABILITIES: [Capability; 3] = [
    Capability::Microphone,
    Capability::ScreenRecording,
    Capability::SystemAudio,
];

/// Per-process permission state machine.
pub struct PermissionGate {
    state: Mutex<PermissionStatus>,
    request_lock: tokio::sync::Mutex<()>,
}

impl Default for PermissionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl PermissionGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PermissionStatus::default()),
            request_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// The process-wide gate used by the boundary functions.
    pub fn global() -> &'static PermissionGate {
        static GATE: OnceLock<PermissionGate> = OnceLock::new();
        GATE.get_or_init(PermissionGate::new)
    }

    /// Last-known state refreshed with a non-blocking probe. Never prompts.
    ///
    /// Decided states (`Granted`, `NotApplicable`) and an in-flight
    /// `Requesting` are kept as-is; everything else is re-probed so the
    /// snapshot follows changes the user made in system settings.
    pub fn check(&self) -> PermissionStatus {
        let mut state = self.state.lock();
        for capability in ALL_CAPABILITIES {
            match state.state(capability) {
                PermissionState::Granted
                | PermissionState::NotApplicable
                | PermissionState::Requesting => {}
                PermissionState::Denied | PermissionState::NotRequested => {
                    state.set_state(capability, probe_capability(capability));
                }
            }
        }
        state.clone()
    }

    /// Request all undecided capabilities, suspending until each resolves.
    ///
    /// Concurrent callers serialize on one in-flight wave: a second call made
    /// while the first is `Requesting` waits for the same outcome instead of
    /// triggering another round of prompts.
    pub async fn request(&self) -> PermissionStatus {
        let _guard = self.request_lock.lock().await;

        let pending: Vec<Capability> = {
            let state = self.state.lock();
            ALL_CAPABILITIES
                .into_iter()
                .filter(|cap| !is_decided(state.state(*cap)))
                .collect()
        };

        if pending.is_empty() {
            return self.state.lock().clone();
        }

        {
            let mut state = self.state.lock();
            for capability in &pending {
                state.set_state(*capability, PermissionState::Requesting);
            }
        }

        for capability in pending {
            let outcome = request_capability(capability).await;
            tracing::info!("permission {capability}: {outcome:?}");
            self.state.lock().set_state(capability, outcome);
        }

        self.state.lock().clone()
    }

    /// Current state without probing.
    pub fn snapshot(&self) -> PermissionStatus {
        self.state.lock().clone()
    }
}

fn is_decided(state: PermissionState) -> bool {
    matches!(
        state,
        PermissionState::Granted | PermissionState::NotApplicable
    )
}

/// One-shot probe of every capability, independent of gate state.
pub(crate) fn probe_status() -> PermissionStatus {
    let mut status = PermissionStatus::default();
    for capability in ALL_CAPABILITIES {
        status.set_state(capability, probe_capability(capability));
    }
    status
}

fn probe_capability(capability: Capability) -> PermissionState {
    match capability {
        Capability::Microphone => probe_microphone(),
        Capability::ScreenRecording => probe_screen_recording(),
        // System audio goes through ordinary input devices (monitor sources,
        // WASAPI loopback, virtual drivers); a missing driver surfaces as
        // DeviceNotAvailable at source selection, not as a permission.
        Capability::SystemAudio => PermissionState::NotApplicable,
    }
}

fn probe_microphone() -> PermissionState {
    use cpal::traits::HostTrait;

    // Device visibility is the strongest signal available without prompting.
    match cpal::default_host().default_input_device() {
        Some(_) => PermissionState::Granted,
        None => PermissionState::Denied,
    }
}

fn probe_screen_recording() -> PermissionState {
    #[cfg(target_os = "macos")]
    {
        // macOS 10.15+ gates screen capture; it cannot be verified without
        // attempting a capture, so stay undecided until requested.
        PermissionState::NotRequested
    }

    #[cfg(not(target_os = "macos"))]
    {
        PermissionState::NotApplicable
    }
}

async fn request_capability(capability: Capability) -> PermissionState {
    match capability {
        Capability::Microphone => request_microphone(),
        Capability::ScreenRecording => request_screen_recording(),
        Capability::SystemAudio => PermissionState::NotApplicable,
    }
}

fn request_microphone() -> PermissionState {
    use cpal::traits::{DeviceTrait, HostTrait};

    // Touching the device is what makes the OS show its consent prompt.
    match cpal::default_host().default_input_device() {
        Some(device) => match device.name() {
            Ok(_) => PermissionState::Granted,
            Err(_) => {
                tracing::warn!("microphone access appears to be restricted");
                PermissionState::Denied
            }
        },
        None => {
            tracing::warn!("no default input device found");
            PermissionState::Denied
        }
    }
}

fn request_screen_recording() -> PermissionState {
    #[cfg(target_os = "macos")]
    {
        // The system prompts when capture is first attempted; treat the
        // request as granted and let the first capture surface a denial.
        PermissionState::Granted
    }

    #[cfg(not(target_os = "macos"))]
    {
        PermissionState::NotApplicable
    }
}

/// Platform-keyed guidance for enabling system audio capture.
pub fn system_audio_setup_instructions() -> &'static str {
    #[cfg(target_os = "macos")]
    {
        "macOS system audio setup:\n\
         1. Install the BlackHole virtual audio driver: https://existential.audio/blackhole/\n\
         2. In Audio MIDI Setup, create a multi-output device so audio still reaches your speakers\n\
         3. Restart the application after setup"
    }

    #[cfg(target_os = "windows")]
    {
        "Windows system audio setup:\n\
         System output is captured through WASAPI loopback and needs no setup.\n\
         If loopback is unavailable, enable 'Stereo Mix' under\n\
         Sound Control Panel > Recording > Show Disabled Devices."
    }

    #[cfg(target_os = "linux")]
    {
        "Linux system audio setup:\n\
         System output is captured from a PulseAudio/PipeWire monitor source.\n\
         1. Check available monitors with: pactl list sources\n\
         2. If none exist, load one with: pactl load-module module-loopback"
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
    {
        "System audio capture is not supported on this platform"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_instructions_are_present() {
        assert!(!system_audio_setup_instructions().is_empty());
    }

    #[test]
    fn probe_leaves_nothing_requesting() {
        let status = probe_status();
        for capability in ALL_CAPABILITIES {
            assert_ne!(status.state(capability), PermissionState::Requesting);
        }
    }

    #[test]
    fn system_audio_needs_no_gating() {
        assert_eq!(
            probe_capability(Capability::SystemAudio),
            PermissionState::NotApplicable
        );
    }

    #[tokio::test]
    async fn request_resolves_every_capability() {
        let gate = PermissionGate::new();
        let status = gate.request().await;
        for capability in ALL_CAPABILITIES {
            assert_ne!(status.state(capability), PermissionState::Requesting);
            assert_ne!(status.state(capability), PermissionState::NotRequested);
        }
    }

    #[tokio::test]
    async fn repeated_requests_are_idempotent() {
        let gate = PermissionGate::new();
        let first = gate.request().await;
        let second = gate.request().await;
        assert_eq!(first, second);
    }
}
