//! Synthetic audio sources for driving the real pipeline in tests and
//! demos.
//!
//! A [`SyntheticSource`] implements the same [`AudioSource`] contract as the
//! platform sources, so segmenter, encoder, and session logic run unchanged
//! against scripted PCM input, including scripted mid-stream device loss.

use super::{AudioSource, SourceChunk, SourceDescriptor, SourceEvent, SourceFactory, SourceKind};
use crate::error::{AudioError, CaptureError, CaptureResult};
use livecap_types::{AudioCaptureConfig, PermissionState, PermissionStatus};
use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Signal shape produced by a synthetic source.
#[derive(Debug, Clone, Copy)]
pub enum Waveform {
    Sine { frequency: f32, amplitude: f32 },
    Silence,
}

/// Script for one synthetic source.
#[derive(Debug, Clone)]
pub struct SyntheticPlan {
    pub waveform: Waveform,
    /// Total audio to produce before finishing
    pub total_ms: u64,
    /// Delivery granularity
    pub chunk_ms: u64,
    /// Emit a stream-level error once this much audio has been delivered
    pub fail_after_ms: Option<u64>,
    /// Sleep between chunks to mimic live delivery
    pub realtime: bool,
}

impl Default for SyntheticPlan {
    fn default() -> Self {
        Self {
            waveform: Waveform::Sine {
                frequency: 440.0,
                amplitude: 0.5,
            },
            total_ms: 5000,
            chunk_ms: 100,
            fail_after_ms: None,
            realtime: false,
        }
    }
}

/// Scripted PCM producer behind the standard source contract.
pub struct SyntheticSource {
    descriptor: SourceDescriptor,
    plan: SyntheticPlan,
    sample_rate: u32,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SyntheticSource {
    /// Source with a unique device id, so concurrent sessions don't contend
    /// on the exclusive-ownership registry.
    pub fn new(kind: SourceKind, sample_rate: u32, plan: SyntheticPlan) -> Self {
        let side = match kind {
            SourceKind::Microphone => "microphone",
            SourceKind::System => "system-audio",
        };
        let device_id = format!("synthetic-{side}-{}", uuid::Uuid::new_v4().simple());
        Self::with_device_id(kind, sample_rate, plan, device_id)
    }

    /// Source with an explicit device id, for exercising device-ownership
    /// conflicts.
    pub fn with_device_id(
        kind: SourceKind,
        sample_rate: u32,
        plan: SyntheticPlan,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            descriptor: SourceDescriptor {
                kind,
                device_id: device_id.into(),
            },
            plan,
            sample_rate,
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }
}

impl AudioSource for SyntheticSource {
    fn start(&mut self, tx: Sender<SourceEvent>) -> CaptureResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::Audio(AudioError::StreamError(
                "source already running".to_string(),
            )));
        }

        let plan = self.plan.clone();
        let sample_rate = self.sample_rate;
        let kind = self.descriptor.kind;
        let device = self.descriptor.device_id.clone();
        let running = self.running.clone();

        self.thread = Some(thread::spawn(move || {
            let chunk_frames = (sample_rate as u64 * plan.chunk_ms / 1000) as usize;
            let total_frames = (sample_rate as u64 * plan.total_ms / 1000) as u64;
            let fail_after_frame = plan
                .fail_after_ms
                .map(|ms| sample_rate as u64 * ms / 1000);
            let mut position: u64 = 0;

            while running.load(Ordering::SeqCst) && position < total_frames {
                if let Some(fail_at) = fail_after_frame {
                    if position >= fail_at {
                        let _ = tx.send(SourceEvent::Error {
                            kind,
                            device: device.clone(),
                            message: "synthetic device unplugged".to_string(),
                        });
                        running.store(false, Ordering::SeqCst);
                        return;
                    }
                }

                let frames = chunk_frames.min((total_frames - position) as usize);
                let samples: Vec<f32> = (0..frames)
                    .map(|i| match plan.waveform {
                        Waveform::Sine {
                            frequency,
                            amplitude,
                        } => {
                            let t = (position + i as u64) as f32 / sample_rate as f32;
                            amplitude * (TAU * frequency * t).sin()
                        }
                        Waveform::Silence => 0.0,
                    })
                    .collect();
                position += frames as u64;

                if tx.send(SourceEvent::Chunk(SourceChunk { kind, samples })).is_err() {
                    break;
                }

                if plan.realtime {
                    thread::sleep(std::time::Duration::from_millis(plan.chunk_ms));
                }
            }

            let _ = tx.send(SourceEvent::Finished { kind });
            running.store(false, Ordering::SeqCst);
        }));

        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Backend producing [`SyntheticSource`]s, with controllable permissions.
pub struct SyntheticSourceFactory {
    permissions: PermissionStatus,
    microphone_plan: SyntheticPlan,
    system_plan: SyntheticPlan,
    microphone_device_id: Option<String>,
    system_device_id: Option<String>,
}

impl SyntheticSourceFactory {
    /// Factory with the given plan on both sides and everything granted.
    pub fn new(plan: SyntheticPlan) -> Self {
        Self {
            permissions: granted_permissions(),
            microphone_plan: plan.clone(),
            system_plan: plan,
            microphone_device_id: None,
            system_device_id: None,
        }
    }

    pub fn with_permissions(mut self, permissions: PermissionStatus) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_system_plan(mut self, plan: SyntheticPlan) -> Self {
        self.system_plan = plan;
        self
    }

    /// Pin the device ids instead of generating unique ones, so two
    /// factories can contend for the same (fake) hardware.
    pub fn with_device_ids(
        mut self,
        microphone: impl Into<String>,
        system: impl Into<String>,
    ) -> Self {
        self.microphone_device_id = Some(microphone.into());
        self.system_device_id = Some(system.into());
        self
    }
}

impl SourceFactory for SyntheticSourceFactory {
    fn permissions(&self) -> PermissionStatus {
        self.permissions.clone()
    }

    fn open_microphone(&self, config: &AudioCaptureConfig) -> CaptureResult<Box<dyn AudioSource>> {
        let source = match &self.microphone_device_id {
            Some(id) => SyntheticSource::with_device_id(
                SourceKind::Microphone,
                config.sample_rate,
                self.microphone_plan.clone(),
                id.clone(),
            ),
            None => SyntheticSource::new(
                SourceKind::Microphone,
                config.sample_rate,
                self.microphone_plan.clone(),
            ),
        };
        Ok(Box::new(source))
    }

    fn open_system_audio(
        &self,
        config: &AudioCaptureConfig,
    ) -> CaptureResult<Box<dyn AudioSource>> {
        let source = match &self.system_device_id {
            Some(id) => SyntheticSource::with_device_id(
                SourceKind::System,
                config.sample_rate,
                self.system_plan.clone(),
                id.clone(),
            ),
            None => SyntheticSource::new(
                SourceKind::System,
                config.sample_rate,
                self.system_plan.clone(),
            ),
        };
        Ok(Box::new(source))
    }
}

fn granted_permissions() -> PermissionStatus {
    PermissionStatus {
        microphone: PermissionState::Granted,
        screen_recording: PermissionState::NotApplicable,
        system_audio: PermissionState::NotApplicable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn produces_expected_amount_of_audio() {
        let plan = SyntheticPlan {
            total_ms: 300,
            chunk_ms: 100,
            ..Default::default()
        };
        let mut source = SyntheticSource::new(SourceKind::Microphone, 16000, plan);
        let (tx, rx) = mpsc::channel();
        source.start(tx).unwrap();

        let mut frames = 0usize;
        let mut finished = false;
        for event in rx.iter() {
            match event {
                SourceEvent::Chunk(chunk) => frames += chunk.samples.len(),
                SourceEvent::Finished { .. } => {
                    finished = true;
                    break;
                }
                SourceEvent::Error { message, .. } => panic!("unexpected error: {message}"),
            }
        }

        assert!(finished);
        assert_eq!(frames, 16000 * 300 / 1000);
        source.stop();
    }

    #[test]
    fn scripted_failure_emits_stream_error() {
        let plan = SyntheticPlan {
            total_ms: 1000,
            chunk_ms: 100,
            fail_after_ms: Some(300),
            ..Default::default()
        };
        let mut source = SyntheticSource::new(SourceKind::System, 16000, plan);
        let (tx, rx) = mpsc::channel();
        source.start(tx).unwrap();

        let mut frames = 0usize;
        let mut failed = false;
        for event in rx.iter() {
            match event {
                SourceEvent::Chunk(chunk) => frames += chunk.samples.len(),
                SourceEvent::Error { .. } => {
                    failed = true;
                    break;
                }
                SourceEvent::Finished { .. } => break,
            }
        }

        assert!(failed);
        assert_eq!(frames, 16000 * 300 / 1000);
        source.stop();
    }

    #[test]
    fn sine_respects_amplitude() {
        let plan = SyntheticPlan {
            waveform: Waveform::Sine {
                frequency: 440.0,
                amplitude: 0.25,
            },
            total_ms: 100,
            ..Default::default()
        };
        let mut source = SyntheticSource::new(SourceKind::Microphone, 48000, plan);
        let (tx, rx) = mpsc::channel();
        source.start(tx).unwrap();

        let mut peak = 0.0f32;
        for event in rx.iter() {
            match event {
                SourceEvent::Chunk(chunk) => {
                    peak = chunk.samples.iter().fold(peak, |p, s| p.max(s.abs()));
                }
                _ => break,
            }
        }

        assert!(peak <= 0.25 + 1e-6);
        assert!(peak > 0.2);
        source.stop();
    }
}
