//! Audio source abstraction.
//!
//! Every source variant delivers mono f32 samples at the session's target
//! sample rate over one shared channel, tagged with the originating side
//! (microphone or system audio). Variants:
//!
//! - **Microphone**: ordinary input capture via cpal.
//! - **Loopback**: native system-output capture where the platform has it,
//!   meaning PulseAudio/PipeWire monitor sources on Linux and WASAPI
//!   loopback on Windows.
//! - **Virtual device**: a well-known virtual audio driver (BlackHole,
//!   VB-Cable, Stereo Mix) opened as an input; requires out-of-band driver
//!   setup.
//!
//! Selection prefers native loopback and falls back to a virtual device; a
//! missing driver surfaces as `DeviceNotAvailable` with setup instructions.
//!
//! Backends are chosen through [`SourceFactory`], injected once at session
//! creation. Tests run the real pipeline against [`synthetic`] sources
//! through the same interface.

pub mod loopback;
pub mod microphone;
pub mod synthetic;
pub mod virtual_device;

use crate::error::{AudioError, CaptureError, CaptureResult};
use crate::permissions::PermissionGate;
use cpal::traits::{DeviceTrait, StreamTrait};
use livecap_types::{AudioCaptureConfig, PermissionStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Which side of the capture a chunk belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Microphone,
    System,
}

/// A chunk of live PCM from one source.
#[derive(Debug, Clone)]
pub struct SourceChunk {
    pub kind: SourceKind,
    /// Mono f32 samples at the session's target rate
    pub samples: Vec<f32>,
}

/// Everything a source can deliver to the pipeline.
#[derive(Debug, Clone)]
pub enum SourceEvent {
    Chunk(SourceChunk),
    /// Stream-level failure, typically device disconnection. The source is
    /// dead after sending this.
    Error {
        kind: SourceKind,
        device: String,
        message: String,
    },
    /// The source ran to completion on its own (finite synthetic sources).
    Finished { kind: SourceKind },
}

/// Identity of an opened source, used for exclusive device claims and error
/// reporting.
#[derive(Debug, Clone)]
pub struct SourceDescriptor {
    pub kind: SourceKind,
    pub device_id: String,
}

/// A live PCM producer.
///
/// `start` may be called once; the source owns whatever thread or OS stream
/// feeds `tx` and tears it down in `stop`.
pub trait AudioSource: Send {
    fn start(&mut self, tx: Sender<SourceEvent>) -> CaptureResult<()>;
    fn stop(&mut self);
    fn is_running(&self) -> bool;
    fn descriptor(&self) -> &SourceDescriptor;
}

/// Strategy object deciding how sources are opened and gated.
///
/// Chosen once at session creation; there is no global backend switch.
pub trait SourceFactory: Send + Sync {
    /// Permission snapshot this backend is subject to.
    fn permissions(&self) -> PermissionStatus;

    fn open_microphone(&self, config: &AudioCaptureConfig) -> CaptureResult<Box<dyn AudioSource>>;

    fn open_system_audio(&self, config: &AudioCaptureConfig)
        -> CaptureResult<Box<dyn AudioSource>>;
}

/// Default backend: real platform devices, process-wide permission gate.
pub struct PlatformSourceFactory;

impl SourceFactory for PlatformSourceFactory {
    fn permissions(&self) -> PermissionStatus {
        PermissionGate::global().check()
    }

    fn open_microphone(&self, config: &AudioCaptureConfig) -> CaptureResult<Box<dyn AudioSource>> {
        Ok(Box::new(microphone::open(config)?))
    }

    fn open_system_audio(
        &self,
        config: &AudioCaptureConfig,
    ) -> CaptureResult<Box<dyn AudioSource>> {
        select_system_source(config)
    }
}

/// Pick the best system-audio mechanism: native loopback first, virtual
/// device second.
pub fn select_system_source(config: &AudioCaptureConfig) -> CaptureResult<Box<dyn AudioSource>> {
    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
    {
        let _ = config;
        return Err(CaptureError::NotSupported(
            "no system audio capture mechanism exists on this platform".to_string(),
        ));
    }

    #[cfg(any(target_os = "macos", target_os = "windows", target_os = "linux"))]
    {
        if loopback::is_supported() {
            match loopback::open(config) {
                Ok(source) => return Ok(Box::new(source)),
                Err(err) => {
                    tracing::warn!("native loopback unavailable, trying virtual device: {err}");
                }
            }
        }
        Ok(Box::new(virtual_device::open(config)?))
    }
}

/// Whether any system-audio mechanism is present on this machine.
pub fn system_audio_available() -> bool {
    loopback::is_available() || virtual_device::find_virtual_input().is_some()
}

/// Shared cpal-backed source. The variants differ only in which device and
/// stream config they resolve at open time.
pub struct StreamSource {
    descriptor: SourceDescriptor,
    device: Option<(cpal::Device, cpal::SupportedStreamConfig)>,
    target_rate: u32,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl StreamSource {
    pub(crate) fn new(
        kind: SourceKind,
        device: cpal::Device,
        supported: cpal::SupportedStreamConfig,
        device_id: String,
        target_rate: u32,
    ) -> Self {
        Self {
            descriptor: SourceDescriptor { kind, device_id },
            device: Some((device, supported)),
            target_rate,
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }
}

impl AudioSource for StreamSource {
    fn start(&mut self, tx: Sender<SourceEvent>) -> CaptureResult<()> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CaptureError::Audio(AudioError::StreamError(
                "source already running".to_string(),
            )));
        }

        let (device, supported) = self.device.take().ok_or_else(|| {
            CaptureError::Audio(AudioError::StreamError(
                "source stream already consumed".to_string(),
            ))
        })?;

        self.running.store(true, Ordering::SeqCst);
        self.thread = Some(spawn_stream_thread(
            device,
            supported,
            self.descriptor.clone(),
            self.target_rate,
            self.running.clone(),
            tx,
        ));

        Ok(())
    }

    fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        tracing::debug!(device = %self.descriptor.device_id, "source stopped");
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }
}

impl Drop for StreamSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Run one cpal input stream on a dedicated thread until `running` clears.
///
/// The audio callback only downmixes, resamples, and forwards; everything
/// heavier happens downstream.
fn spawn_stream_thread(
    device: cpal::Device,
    supported: cpal::SupportedStreamConfig,
    descriptor: SourceDescriptor,
    target_rate: u32,
    running: Arc<AtomicBool>,
    tx: Sender<SourceEvent>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let device_rate = supported.sample_rate().0;
        let device_channels = supported.channels() as usize;
        let stream_config: cpal::StreamConfig = supported.into();
        let kind = descriptor.kind;

        tracing::info!(
            device = %descriptor.device_id,
            "opening stream: {device_rate} Hz, {device_channels} channels -> {target_rate} Hz mono"
        );

        let data_tx = tx.clone();
        let data_running = running.clone();
        let error_tx = tx;
        let error_device = descriptor.device_id.clone();

        let stream_result = device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if !data_running.load(Ordering::SeqCst) {
                    return;
                }

                let mono = downmix_to_mono(data, device_channels);
                let samples = if device_rate != target_rate {
                    resample_linear(&mono, device_rate, target_rate)
                } else {
                    mono
                };

                let _ = data_tx.send(SourceEvent::Chunk(SourceChunk { kind, samples }));
            },
            move |err| {
                tracing::error!("stream error on {error_device}: {err}");
                let _ = error_tx.send(SourceEvent::Error {
                    kind,
                    device: error_device.clone(),
                    message: err.to_string(),
                });
            },
            None,
        );

        match stream_result {
            Ok(stream) => {
                if let Err(err) = stream.play() {
                    running.store(false, Ordering::SeqCst);
                    tracing::error!(device = %descriptor.device_id, "failed to start stream: {err}");
                    return;
                }

                // Keep the stream alive while the source runs.
                while running.load(Ordering::SeqCst) {
                    thread::sleep(std::time::Duration::from_millis(50));
                }
            }
            Err(err) => {
                running.store(false, Ordering::SeqCst);
                tracing::error!(device = %descriptor.device_id, "failed to build stream: {err}");
            }
        }
    })
}

/// Average interleaved frames down to mono.
pub(crate) fn downmix_to_mono(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Linear-interpolation resampling, cheap enough for the delivery path.
pub(crate) fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let new_len = (samples.len() as f64 / ratio) as usize;
    let mut result = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_pos = i as f64 * ratio;
        let src_idx = src_pos as usize;
        let frac = (src_pos - src_idx as f64) as f32;

        let sample = if src_idx + 1 < samples.len() {
            samples[src_idx] * (1.0 - frac) + samples[src_idx + 1] * frac
        } else if src_idx < samples.len() {
            samples[src_idx]
        } else {
            0.0
        };

        result.push(sample);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_frames() {
        let stereo = [0.2, 0.8, -0.4, 0.4];
        let mono = downmix_to_mono(&stereo, 2);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.5).abs() < 1e-6);
        assert!(mono[1].abs() < 1e-6);
    }

    #[test]
    fn downmix_mono_is_passthrough() {
        let samples = [0.1, 0.2, 0.3];
        assert_eq!(downmix_to_mono(&samples, 1), samples);
    }

    #[test]
    fn resample_same_rate_is_passthrough() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(resample_linear(&samples, 48000, 48000), samples);
    }

    #[test]
    fn resample_halves_sample_count() {
        let samples: Vec<f32> = (0..100).map(|i| i as f32 / 100.0).collect();
        let out = resample_linear(&samples, 48000, 24000);
        assert_eq!(out.len(), 50);
    }

    #[test]
    fn resample_doubles_and_interpolates() {
        let out = resample_linear(&[0.0, 1.0], 24000, 48000);
        assert_eq!(out.len(), 4);
        assert!((out[0] - 0.0).abs() < 1e-6);
        assert!((out[2] - 1.0).abs() < 1e-6);
    }
}
