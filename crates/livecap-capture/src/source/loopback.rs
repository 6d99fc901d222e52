//! Native system-audio loopback capture.
//!
//! - **Linux**: PulseAudio/PipeWire expose a `.monitor` input for every
//!   output sink; opening it captures whatever the system plays.
//! - **Windows**: WASAPI supports loopback capture on the default output
//!   device.
//! - **macOS**: no cpal-native loopback; callers fall back to a virtual
//!   device.

use super::{SourceKind, StreamSource};
use crate::error::{CaptureError, CaptureResult};
use livecap_types::AudioCaptureConfig;

/// Whether this platform has a native loopback mechanism at all.
pub fn is_supported() -> bool {
    cfg!(any(target_os = "linux", target_os = "windows"))
}

/// Whether a loopback stream could be opened right now.
pub fn is_available() -> bool {
    #[cfg(target_os = "linux")]
    {
        find_monitor_device().is_some()
    }

    #[cfg(target_os = "windows")]
    {
        use cpal::traits::HostTrait;

        cpal::host_from_id(cpal::HostId::Wasapi)
            .map(|host| host.default_output_device().is_some())
            .unwrap_or(false)
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        false
    }
}

/// Open the platform loopback as a system-audio source.
pub fn open(config: &AudioCaptureConfig) -> CaptureResult<StreamSource> {
    #[cfg(target_os = "linux")]
    {
        use cpal::traits::DeviceTrait;

        let device = find_monitor_device().ok_or_else(|| CaptureError::DeviceNotAvailable {
            device: "monitor source".to_string(),
            instructions: crate::permissions::system_audio_setup_instructions().to_string(),
        })?;

        let name = device.name().unwrap_or_else(|_| "monitor".to_string());
        let supported = device.default_input_config()?;

        tracing::info!(
            "system loopback: {} @ {} Hz, {} channels",
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

    #[cfg(target_os = "windows")]
    {
        use anyhow::Context;
        use cpal::traits::{DeviceTrait, HostTrait};

        let host =
            cpal::host_from_id(cpal::HostId::Wasapi).context("failed to get WASAPI host")?;

        // Loopback opens an input stream against the default output device.
        let device = host
            .default_output_device()
            .ok_or_else(|| CaptureError::DeviceNotAvailable {
                device: "default output".to_string(),
                instructions: crate::permissions::system_audio_setup_instructions().to_string(),
            })?;

        let name = device.name().unwrap_or_else(|_| "loopback".to_string());
        let supported = device.default_output_config()?;

        tracing::info!(
            "WASAPI loopback: {} @ {} Hz, {} channels",
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

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        let _ = config;
        Err(CaptureError::NotSupported(
            "native loopback capture is not available on this platform".to_string(),
        ))
    }
}

/// PulseAudio/PipeWire monitor sources carry a ".monitor" suffix.
#[cfg(target_os = "linux")]
fn find_monitor_device() -> Option<cpal::Device> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let host = cpal::default_host();
    host.input_devices().ok()?.find(|device| {
        device
            .name()
            .map(|name| name.contains(".monitor") || name.contains("Monitor"))
            .unwrap_or(false)
    })
}
