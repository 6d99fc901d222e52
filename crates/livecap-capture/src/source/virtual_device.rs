//! System audio through a user-installed virtual audio driver.
//!
//! The driver reroutes system output back as an input device; detection is
//! by well-known device names. When no driver is present, opening fails
//! with setup instructions the UI can show verbatim.

use super::{SourceKind, StreamSource};
use crate::error::{CaptureError, CaptureResult};
use crate::permissions;
use cpal::traits::{DeviceTrait, HostTrait};
use livecap_types::AudioCaptureConfig;

/// Name fragments of known virtual loopback drivers, lowercase.
const VIRTUAL_DEVICE_MARKERS: [&str; 7] = [
    "blackhole",
    "soundflower",
    "vb-audio",
    "vb-cable",
    "cable output",
    "stereo mix",
    "what u hear",
];

/// Find an input device backed by a known virtual driver.
pub fn find_virtual_input() -> Option<(cpal::Device, String)> {
    let host = cpal::default_host();
    for device in host.input_devices().ok()? {
        let Ok(name) = device.name() else { continue };
        let lowered = name.to_lowercase();
        if VIRTUAL_DEVICE_MARKERS
            .iter()
            .any(|marker| lowered.contains(marker))
        {
            return Some((device, name));
        }
    }
    None
}

/// Open a virtual-driver input as a system-audio source.
pub fn open(config: &AudioCaptureConfig) -> CaptureResult<StreamSource> {
    let (device, name) =
        find_virtual_input().ok_or_else(|| CaptureError::DeviceNotAvailable {
            device: "virtual audio device".to_string(),
            instructions: permissions::system_audio_setup_instructions().to_string(),
        })?;

    let supported = device.default_input_config()?;

    tracing::info!(
        "virtual loopback device: {} @ {} Hz, {} channels",
        name,
        supported.sample_rate().0,
        supported.channels()
    );

    Ok(StreamSource::new(
        SourceKind::System,
        device,
        supported,
        name,
        config.sample_rate,
    ))
}
