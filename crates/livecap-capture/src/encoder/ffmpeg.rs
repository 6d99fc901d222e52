//! Compressed segment encoding through an FFmpeg pipe.
//!
//! One FFmpeg child lives for the whole session: PCM goes into stdin as raw
//! f32le, encoded frames come back on stdout (ADTS for AAC, bare frames for
//! MP3) and are drained by a reader thread. Keeping the child alive carries
//! the codec state (frame continuity, bit reservoir) across segment
//! boundaries; the process exits with the session.

use crate::error::{AudioError, CaptureError, CaptureResult};
use parking_lot::Mutex;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const BITRATE: &str = "128k";

/// How long `encode` waits for the codec to emit frames for a write before
/// letting them carry over to the next segment.
const DRAIN_WAIT: Duration = Duration::from_millis(200);
const DRAIN_POLL: Duration = Duration::from_millis(5);

/// Codec selection for the pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamCodec {
    /// AAC with ADTS framing
    Aac,
    /// MP3 frames via libmp3lame
    Mp3,
}

impl StreamCodec {
    fn output_args(self) -> [&'static str; 4] {
        match self {
            StreamCodec::Aac => ["-c:a", "aac", "-f", "adts"],
            StreamCodec::Mp3 => ["-c:a", "libmp3lame", "-f", "mp3"],
        }
    }
}

/// Streaming encoder bound to one session.
pub struct FfmpegEncoder {
    child: Child,
    stdin: Option<ChildStdin>,
    reader: Option<JoinHandle<()>>,
    encoded: Arc<Mutex<Vec<u8>>>,
}

impl FfmpegEncoder {
    /// Spawn the FFmpeg child. Failure here is fatal to session start.
    pub fn spawn(codec: StreamCodec, sample_rate: u32, channels: u16) -> CaptureResult<Self> {
        let ffmpeg_path = find_ffmpeg();

        tracing::info!(
            "starting ffmpeg encoder: {:?}, {} Hz, {} channels, {:?}",
            ffmpeg_path,
            sample_rate,
            channels,
            codec
        );

        let mut child = Command::new(&ffmpeg_path)
            .args(["-hide_banner", "-loglevel", "error"])
            .args(["-f", "f32le"])
            .args(["-ar", &sample_rate.to_string()])
            .args(["-ac", &channels.to_string()])
            .args(["-i", "pipe:0"])
            .args(codec.output_args())
            .args(["-b:a", BITRATE])
            .arg("pipe:1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                CaptureError::EncoderInitFailed(format!(
                    "failed to start FFmpeg ({}): {e}",
                    ffmpeg_path.display()
                ))
            })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            CaptureError::EncoderInitFailed("failed to open FFmpeg stdin".to_string())
        })?;
        let mut stdout = child.stdout.take().ok_or_else(|| {
            CaptureError::EncoderInitFailed("failed to open FFmpeg stdout".to_string())
        })?;

        let encoded = Arc::new(Mutex::new(Vec::new()));
        let reader_buffer = encoded.clone();
        let reader = thread::spawn(move || {
            let mut buf = [0u8; 8192];
            loop {
                match stdout.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => reader_buffer.lock().extend_from_slice(&buf[..n]),
                }
            }
        });

        Ok(Self {
            child,
            stdin: Some(stdin),
            reader: Some(reader),
            encoded,
        })
    }

    /// Feed one segment of PCM and collect the frames the codec emits for
    /// it. Frames still inside the codec after the wait carry over to the
    /// next call, so decoded duration stays aligned within one frame.
    pub fn encode(&mut self, samples: &[f32]) -> CaptureResult<Vec<u8>> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| AudioError::EncodingError("encoder already closed".to_string()))?;

        let mut pcm = Vec::with_capacity(samples.len() * 4);
        for &sample in samples {
            pcm.extend_from_slice(&sample.to_le_bytes());
        }
        stdin
            .write_all(&pcm)
            .and_then(|_| stdin.flush())
            .map_err(|e| AudioError::EncodingError(format!("FFmpeg stdin write failed: {e}")))?;

        let deadline = Instant::now() + DRAIN_WAIT;
        loop {
            let ready = std::mem::take(&mut *self.encoded.lock());
            if !ready.is_empty() || Instant::now() >= deadline {
                return Ok(ready);
            }
            thread::sleep(DRAIN_POLL);
        }
    }

    /// Close stdin, wait for the child, and return the codec's trailing
    /// frames.
    pub fn finish(&mut self) -> CaptureResult<Vec<u8>> {
        if let Some(stdin) = self.stdin.take() {
            drop(stdin);
        }

        let status = self
            .child
            .wait()
            .map_err(|e| AudioError::EncodingError(format!("failed to wait for FFmpeg: {e}")))?;
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }

        if !status.success() {
            tracing::warn!("FFmpeg exited with {status}");
        }

        Ok(std::mem::take(&mut *self.encoded.lock()))
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        if self.stdin.is_some() {
            let _ = self.child.kill();
        }
    }
}

/// Locate the FFmpeg binary.
///
/// Search order: next to the executable, working directory, vendored copy,
/// then system PATH.
fn find_ffmpeg() -> PathBuf {
    let mut search_paths = Vec::new();

    if let Ok(exe_path) = std::env::current_exe() {
        let exe_dir = exe_path.parent().unwrap_or(Path::new("."));
        search_paths.push(exe_dir.join("ffmpeg"));
    }

    if let Ok(cwd) = std::env::current_dir() {
        search_paths.push(cwd.join("ffmpeg"));
        search_paths.push(cwd.join("vendor/ffmpeg/ffmpeg"));
    }

    for path in &search_paths {
        if path.exists() {
            tracing::info!("found FFmpeg: {:?}", path);
            return path.clone();
        }
    }

    if let Ok(path) = which::which("ffmpeg") {
        tracing::info!("using system FFmpeg: {:?}", path);
        return path;
    }

    tracing::warn!("FFmpeg not found in search paths or PATH, trying 'ffmpeg'");
    PathBuf::from("ffmpeg")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_ffmpeg_does_not_panic() {
        let _ = find_ffmpeg();
    }

    #[test]
    fn codec_args_select_container() {
        assert_eq!(StreamCodec::Aac.output_args()[3], "adts");
        assert_eq!(StreamCodec::Mp3.output_args()[1], "libmp3lame");
    }
}
