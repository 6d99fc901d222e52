//! Capture session lifecycle and pipeline wiring.
//!
//! A session owns its sources, one mixer/segmenter pair running on the
//! delivery path, and one encoder worker fed through a bounded queue. The
//! state machine is `Created -> Started -> Stopped`, with `Failed` reached
//! from a rejected start or an unrecoverable source error. Hardware devices
//! are owned exclusively: a second session on the same device is refused.

use crate::encoder::SegmentEncoder;
use crate::error::{CaptureError, CaptureResult};
use crate::mixer::{interleave, Mixer};
use crate::permissions;
use crate::queue::SegmentQueue;
use crate::segmenter::Segmenter;
use crate::source::{AudioSource, SourceEvent, SourceFactory, SourceKind};
use livecap_types::{
    AudioFormat, AudioSegment, CaptureConfig, Capability, PermissionState, SegmentSource,
    SessionStatus,
};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::pin::Pin;
use std::sync::{mpsc, Arc};
use std::task::{Context, Poll};
use std::thread::JoinHandle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Encoder backlog bound; beyond it the oldest unencoded segment is dropped
/// rather than stalling the delivery path.
const ENCODER_QUEUE_CAPACITY: usize = 8;

/// Live stream of encoded segments and stream-level errors.
pub struct SegmentStream {
    rx: UnboundedReceiver<CaptureResult<AudioSegment>>,
}

impl SegmentStream {
    /// Next segment or error; `None` once the session pipeline has ended.
    pub async fn next_segment(&mut self) -> Option<CaptureResult<AudioSegment>> {
        self.rx.recv().await
    }
}

impl futures::Stream for SegmentStream {
    type Item = CaptureResult<AudioSegment>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Process-wide registry of exclusively-owned device ids.
static DEVICE_CLAIMS: Mutex<BTreeSet<String>> = Mutex::new(BTreeSet::new());

/// RAII claim on one hardware device; released on drop so no exit path can
/// leak a handle.
struct DeviceClaim {
    device_id: String,
}

impl DeviceClaim {
    fn acquire(device_id: &str) -> CaptureResult<Self> {
        let mut claims = DEVICE_CLAIMS.lock();
        if !claims.insert(device_id.to_string()) {
            return Err(CaptureError::DeviceConflict {
                device: device_id.to_string(),
            });
        }
        Ok(Self {
            device_id: device_id.to_string(),
        })
    }
}

impl Drop for DeviceClaim {
    fn drop(&mut self) {
        DEVICE_CLAIMS.lock().remove(&self.device_id);
    }
}

struct Pipeline {
    sources: Vec<Box<dyn AudioSource>>,
    pump: Option<JoinHandle<()>>,
    worker: Option<JoinHandle<()>>,
    queue: Arc<SegmentQueue>,
    _claims: Vec<DeviceClaim>,
}

/// One capture session: immutable config, exclusive sources, one pipeline.
pub struct CaptureSession {
    id: String,
    config: CaptureConfig,
    status: Arc<Mutex<SessionStatus>>,
    factory: Arc<dyn SourceFactory>,
    pipeline: Mutex<Option<Pipeline>>,
}

impl CaptureSession {
    pub(crate) fn new(
        config: CaptureConfig,
        factory: Arc<dyn SourceFactory>,
    ) -> CaptureResult<Self> {
        validate_config(&config)?;
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            config,
            status: Arc::new(Mutex::new(SessionStatus::Created)),
            factory,
            pipeline: Mutex::new(None),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.lock()
    }

    pub fn is_active(&self) -> bool {
        self.status() == SessionStatus::Started
    }

    /// Acquire sources and start the pipeline, returning the segment stream.
    ///
    /// Serialized through the status word: only a `Created` session starts,
    /// so a concurrent second call observes the new state and returns a
    /// state violation without side effects. Permission or acquisition
    /// failures leave the session `Failed`.
    pub async fn start(&self) -> CaptureResult<SegmentStream> {
        // The lock is held across acquisition, so a concurrent start blocks
        // until the first one resolves and then observes the final state;
        // the session is never visibly Started while acquisition can still
        // fail.
        let mut status = self.status.lock();
        if *status != SessionStatus::Created {
            return Err(CaptureError::SessionStateViolation {
                expected: "created",
                actual: *status,
            });
        }

        match self.start_pipeline() {
            Ok(stream) => {
                *status = SessionStatus::Started;
                tracing::info!(session = %self.id, "capture session started");
                Ok(stream)
            }
            Err(err) => {
                *status = SessionStatus::Failed;
                tracing::error!(session = %self.id, "session start failed: {err}");
                Err(err)
            }
        }
    }

    fn start_pipeline(&self) -> CaptureResult<SegmentStream> {
        let audio = &self.config.audio;

        let permissions = self.factory.permissions();
        for capability in required_capabilities(&self.config) {
            let state = permissions.state(capability);
            if !state.allows_capture() {
                return Err(CaptureError::PermissionDenied {
                    capability,
                    remediation: remediation_for(capability, state),
                });
            }
        }

        let mut sources: Vec<Box<dyn AudioSource>> = Vec::new();
        if audio.microphone {
            sources.push(self.factory.open_microphone(audio)?);
        }
        if audio.system_audio {
            sources.push(self.factory.open_system_audio(audio)?);
        }

        // Claims drop on any early return below, releasing the devices.
        let mut claims = Vec::with_capacity(sources.len());
        for source in &sources {
            claims.push(DeviceClaim::acquire(&source.descriptor().device_id)?);
        }

        let encoder = SegmentEncoder::new(audio.format, audio.sample_rate, audio.channels)?;

        let source_tag = match (audio.microphone, audio.system_audio) {
            (true, true) => SegmentSource::Mixed,
            (true, false) => SegmentSource::Microphone,
            _ => SegmentSource::SystemAudio,
        };

        let (event_tx, event_rx) = mpsc::channel();
        let (segment_tx, segment_rx) = unbounded_channel();
        let queue = Arc::new(SegmentQueue::new(ENCODER_QUEUE_CAPACITY));

        for i in 0..sources.len() {
            if let Err(err) = sources[i].start(event_tx.clone()) {
                for source in sources.iter_mut().take(i) {
                    source.stop();
                }
                return Err(err);
            }
        }
        // The pipeline's copy; the sources hold the only remaining senders.
        drop(event_tx);

        let pump = spawn_pump(PumpContext {
            event_rx,
            segmenter: Segmenter::new(audio.sample_rate, audio.channels, audio.segment_duration_ms),
            mixer: (audio.microphone && audio.system_audio)
                .then(|| Mixer::new(audio.microphone_gain, audio.system_audio_gain)),
            channels: audio.channels,
            queue: queue.clone(),
            segment_tx: segment_tx.clone(),
            status: self.status.clone(),
            session_id: self.id.clone(),
            active_sources: sources.len(),
        });

        let worker = spawn_encoder_worker(
            queue.clone(),
            encoder,
            SegmentStamp {
                format: audio.format,
                sample_rate: audio.sample_rate,
                channels: audio.channels,
                source: source_tag,
            },
            segment_tx,
            self.id.clone(),
        );

        *self.pipeline.lock() = Some(Pipeline {
            sources,
            pump: Some(pump),
            worker: Some(worker),
            queue,
            _claims: claims,
        });

        Ok(SegmentStream { rx: segment_rx })
    }

    /// Stop capture, flush the partial tail segment, and release devices.
    ///
    /// Safe to call from any state; only one caller performs the actual
    /// teardown.
    pub async fn stop(&self) -> CaptureResult<()> {
        {
            let mut status = self.status.lock();
            match *status {
                SessionStatus::Started | SessionStatus::Created => {
                    *status = SessionStatus::Stopped;
                }
                // Failed sessions still need their resources released.
                SessionStatus::Stopped | SessionStatus::Failed => {}
            }
        }

        let pipeline = self.pipeline.lock().take();
        if let Some(mut pipeline) = pipeline {
            teardown(&mut pipeline, &self.id);
        }
        Ok(())
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if let Some(mut pipeline) = self.pipeline.get_mut().take() {
            teardown(&mut pipeline, &self.id);
        }
    }
}

fn teardown(pipeline: &mut Pipeline, session_id: &str) {
    for source in &mut pipeline.sources {
        source.stop();
    }
    if let Some(pump) = pipeline.pump.take() {
        let _ = pump.join();
    }
    if let Some(worker) = pipeline.worker.take() {
        let _ = worker.join();
    }

    let dropped = pipeline.queue.dropped();
    if dropped > 0 {
        tracing::warn!(session = %session_id, "{dropped} segments were dropped to encoder backpressure");
    }
    tracing::info!(session = %session_id, "capture session stopped");
}

struct PumpContext {
    event_rx: mpsc::Receiver<SourceEvent>,
    segmenter: Segmenter,
    /// Present only when both sources are enabled; single-source capture
    /// bypasses mixing entirely.
    mixer: Option<Mixer>,
    channels: u16,
    queue: Arc<SegmentQueue>,
    segment_tx: UnboundedSender<CaptureResult<AudioSegment>>,
    status: Arc<Mutex<SessionStatus>>,
    session_id: String,
    active_sources: usize,
}

/// Delivery-path thread: receives tagged chunks, aligns and mixes the two
/// sides, and feeds the segmenter. Everything here is O(chunk) per event.
fn spawn_pump(mut ctx: PumpContext) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut mic_pending: Vec<f32> = Vec::new();
        let mut system_pending: Vec<f32> = Vec::new();

        loop {
            let event = match ctx.event_rx.recv() {
                Ok(event) => event,
                // All sources hung up.
                Err(_) => break,
            };

            match event {
                SourceEvent::Chunk(chunk) => {
                    let mono = match &ctx.mixer {
                        Some(mixer) => {
                            match chunk.kind {
                                SourceKind::Microphone => {
                                    mic_pending.extend_from_slice(&chunk.samples)
                                }
                                SourceKind::System => {
                                    system_pending.extend_from_slice(&chunk.samples)
                                }
                            }
                            // Mix only the frames both sides have delivered;
                            // the remainder waits for its counterpart.
                            let ready = mic_pending.len().min(system_pending.len());
                            if ready == 0 {
                                continue;
                            }
                            let mixed = mixer.mix(&mic_pending[..ready], &system_pending[..ready]);
                            mic_pending.drain(..ready);
                            system_pending.drain(..ready);
                            mixed
                        }
                        None => chunk.samples,
                    };

                    let completed = if ctx.channels > 1 {
                        ctx.segmenter.push(&interleave(&mono, ctx.channels))
                    } else {
                        ctx.segmenter.push(&mono)
                    };
                    for segment in completed {
                        ctx.queue.push(segment);
                    }
                }
                SourceEvent::Error {
                    device, message, ..
                } => {
                    tracing::error!(
                        session = %ctx.session_id,
                        device = %device,
                        "source failed mid-session: {message}"
                    );
                    *ctx.status.lock() = SessionStatus::Failed;
                    let _ = ctx
                        .segment_tx
                        .send(Err(CaptureError::DeviceDisconnected { device }));
                    break;
                }
                SourceEvent::Finished { .. } => {
                    ctx.active_sources = ctx.active_sources.saturating_sub(1);
                    if ctx.active_sources == 0 {
                        break;
                    }
                }
            }
        }

        // Tail audio matters to transcription consumers: emit the partial
        // window even after a failure.
        if let Some(tail) = ctx.segmenter.flush() {
            ctx.queue.push(tail);
        }
        ctx.queue.close();
    })
}

#[derive(Clone, Copy)]
struct SegmentStamp {
    format: AudioFormat,
    sample_rate: u32,
    channels: u16,
    source: SegmentSource,
}

/// Encoder worker: pops completed PCM windows and emits encoded segments.
/// A failed segment is logged and skipped; its sequence number is already
/// consumed, so consumers can detect the gap.
fn spawn_encoder_worker(
    queue: Arc<SegmentQueue>,
    mut encoder: SegmentEncoder,
    stamp: SegmentStamp,
    segment_tx: UnboundedSender<CaptureResult<AudioSegment>>,
    session_id: String,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut last_sequence = 0u64;
        let mut last_end_ms = 0u64;
        let mut emitted_any = false;

        while let Some(pcm) = queue.pop() {
            last_sequence = pcm.sequence;
            last_end_ms = pcm.start_ms + pcm.duration_ms as u64;

            match encoder.encode(&pcm.samples) {
                Ok(data) => {
                    emitted_any = true;
                    let segment = AudioSegment {
                        data,
                        format: stamp.format,
                        sample_rate: stamp.sample_rate,
                        channels: stamp.channels,
                        source: stamp.source,
                        start_ms: pcm.start_ms,
                        duration_ms: pcm.duration_ms,
                        sequence: pcm.sequence,
                    };
                    if segment_tx.send(Ok(segment)).is_err() {
                        // Consumer dropped the stream; nothing left to feed.
                        break;
                    }
                }
                Err(err) => {
                    let failure = CaptureError::EncodeSegmentFailed {
                        sequence: pcm.sequence,
                        reason: err.to_string(),
                    };
                    tracing::error!(session = %session_id, "{failure}");
                    let _ = segment_tx.send(Err(failure));
                }
            }
        }

        match encoder.finish() {
            // Frames still buffered in the codec after the last cut; ship
            // them as a residual continuation so no audio is lost.
            Ok(tail) if !tail.is_empty() && emitted_any => {
                let _ = segment_tx.send(Ok(AudioSegment {
                    data: tail,
                    format: stamp.format,
                    sample_rate: stamp.sample_rate,
                    channels: stamp.channels,
                    source: stamp.source,
                    start_ms: last_end_ms,
                    duration_ms: 0,
                    sequence: last_sequence + 1,
                }));
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(session = %session_id, "encoder finalize failed: {err}")
            }
        }
    })
}

fn required_capabilities(config: &CaptureConfig) -> Vec<Capability> {
    let mut capabilities = Vec::new();
    if config.audio.enabled && config.audio.microphone {
        capabilities.push(Capability::Microphone);
    }
    if config.audio.enabled && config.audio.system_audio {
        capabilities.push(Capability::SystemAudio);
    }
    if config.screen.enabled {
        capabilities.push(Capability::ScreenRecording);
    }
    capabilities
}

fn remediation_for(capability: Capability, state: PermissionState) -> String {
    match (capability, state) {
        (Capability::SystemAudio, _) => {
            permissions::system_audio_setup_instructions().to_string()
        }
        (_, PermissionState::Requesting) => {
            format!("a permission request for {capability} is still pending")
        }
        (_, PermissionState::NotRequested) => {
            format!("request {capability} access before starting the session")
        }
        _ => format!("grant {capability} access in the system privacy settings"),
    }
}

fn validate_config(config: &CaptureConfig) -> CaptureResult<()> {
    let audio = &config.audio;

    if !audio.enabled {
        return Err(CaptureError::ConfigurationInvalid(
            "audio.enabled must be true; the pipeline has no video-only mode".to_string(),
        ));
    }
    if !audio.microphone && !audio.system_audio {
        return Err(CaptureError::ConfigurationInvalid(
            "at least one of audio.microphone and audio.systemAudio must be enabled".to_string(),
        ));
    }
    if !(8000..=192_000).contains(&audio.sample_rate) {
        return Err(CaptureError::ConfigurationInvalid(format!(
            "unsupported sample rate {} (expected 8000-192000 Hz)",
            audio.sample_rate
        )));
    }
    if audio.channels == 0 || audio.channels > 2 {
        return Err(CaptureError::ConfigurationInvalid(format!(
            "unsupported channel count {} (expected 1 or 2)",
            audio.channels
        )));
    }
    if !(100..=600_000).contains(&audio.segment_duration_ms) {
        return Err(CaptureError::ConfigurationInvalid(format!(
            "segmentDurationMs {} out of range (expected 100-600000)",
            audio.segment_duration_ms
        )));
    }
    for (gain, name) in [
        (audio.microphone_gain, "microphoneGain"),
        (audio.system_audio_gain, "systemAudioGain"),
    ] {
        if !gain.is_finite() || !(0.0..=4.0).contains(&gain) {
            return Err(CaptureError::ConfigurationInvalid(format!(
                "{name} {gain} out of range (expected 0.0-4.0)"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> CaptureConfig {
        CaptureConfig::default()
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn rejects_disabled_audio() {
        let mut config = valid_config();
        config.audio.enabled = false;
        assert!(matches!(
            validate_config(&config),
            Err(CaptureError::ConfigurationInvalid(_))
        ));
    }

    #[test]
    fn rejects_no_sources() {
        let mut config = valid_config();
        config.audio.microphone = false;
        config.audio.system_audio = false;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut config = valid_config();
        config.audio.sample_rate = 1000;
        assert!(validate_config(&config).is_err());

        let mut config = valid_config();
        config.audio.channels = 6;
        assert!(validate_config(&config).is_err());

        let mut config = valid_config();
        config.audio.segment_duration_ms = 10;
        assert!(validate_config(&config).is_err());

        let mut config = valid_config();
        config.audio.microphone_gain = f32::NAN;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn required_capabilities_follow_the_config() {
        let mut config = valid_config();
        config.audio.system_audio = false;
        assert_eq!(required_capabilities(&config), vec![Capability::Microphone]);

        config.screen.enabled = true;
        assert_eq!(
            required_capabilities(&config),
            vec![Capability::Microphone, Capability::ScreenRecording]
        );
    }

    #[test]
    fn device_claims_are_exclusive_until_dropped() {
        let id = format!("claim-test-{}", uuid::Uuid::new_v4());

        let first = DeviceClaim::acquire(&id).unwrap();
        assert!(matches!(
            DeviceClaim::acquire(&id),
            Err(CaptureError::DeviceConflict { .. })
        ));

        drop(first);
        assert!(DeviceClaim::acquire(&id).is_ok());
    }
}
