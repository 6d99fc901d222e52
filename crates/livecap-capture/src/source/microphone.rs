//! Direct microphone capture.

use super::{SourceKind, StreamSource};
use crate::error::{AudioError, CaptureError, CaptureResult};
use cpal::traits::{DeviceTrait, HostTrait};
use livecap_types::AudioCaptureConfig;

/// Open the configured (or default) input device as a microphone source.
pub fn open(config: &AudioCaptureConfig) -> CaptureResult<StreamSource> {
    let host = cpal::default_host();

    let device = if let Some(ref device_id) = config.microphone_device_id {
        host.input_devices()?
            .find(|d| d.name().map(|n| n == *device_id).unwrap_or(false))
            .ok_or_else(|| {
                CaptureError::Audio(AudioError::DeviceNotFound(device_id.clone()))
            })?
    } else {
        host.default_input_device().ok_or_else(|| {
            CaptureError::Audio(AudioError::DeviceNotFound("default input".to_string()))
        })?
    };

    let name = device.name().unwrap_or_else(|_| "unknown input".to_string());
    // The device keeps its native rate and layout; the stream thread
    // downmixes and resamples to the session target.
    let supported = device.default_input_config()?;

    tracing::info!(
        "microphone: {} @ {} Hz, {} channels",
        name,
        supported.sample_rate().0,
        supported.channels()
    );

    Ok(StreamSource::new(
        SourceKind::Microphone,
        device,
        supported,
        name,
        config.sample_rate,
    ))
}
