//! Per-session segment encoding.
//!
//! One encoder instance belongs to exactly one session; compressed codecs
//! keep state across segments inside their FFmpeg child, so instances are
//! never shared. Encoder construction failure is fatal to session start; a
//! failure on an individual segment is reported per-segment and the session
//! keeps running.

mod ffmpeg;
mod wav;

pub use ffmpeg::{FfmpegEncoder, StreamCodec};
pub use wav::{encode_raw, encode_wav};

use crate::error::CaptureResult;
use livecap_types::AudioFormat;

/// Encoder for one session's segments.
pub enum SegmentEncoder {
    Wav { sample_rate: u32, channels: u16 },
    Raw,
    Stream(FfmpegEncoder),
}

impl SegmentEncoder {
    pub fn new(format: AudioFormat, sample_rate: u32, channels: u16) -> CaptureResult<Self> {
        Ok(match format {
            AudioFormat::Wav => SegmentEncoder::Wav {
                sample_rate,
                channels,
            },
            AudioFormat::Raw => SegmentEncoder::Raw,
            AudioFormat::Aac => SegmentEncoder::Stream(FfmpegEncoder::spawn(
                StreamCodec::Aac,
                sample_rate,
                channels,
            )?),
            AudioFormat::Mp3 => SegmentEncoder::Stream(FfmpegEncoder::spawn(
                StreamCodec::Mp3,
                sample_rate,
                channels,
            )?),
        })
    }

    /// Encode one segment's interleaved samples.
    pub fn encode(&mut self, samples: &[f32]) -> CaptureResult<Vec<u8>> {
        match self {
            SegmentEncoder::Wav {
                sample_rate,
                channels,
            } => encode_wav(samples, *sample_rate, *channels),
            SegmentEncoder::Raw => Ok(encode_raw(samples)),
            SegmentEncoder::Stream(encoder) => encoder.encode(samples),
        }
    }

    /// Release codec state; compressed codecs may return trailing frames.
    pub fn finish(&mut self) -> CaptureResult<Vec<u8>> {
        match self {
            SegmentEncoder::Wav { .. } | SegmentEncoder::Raw => Ok(Vec::new()),
            SegmentEncoder::Stream(encoder) => encoder.finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_encoder_produces_a_riff_container() {
        let mut encoder = SegmentEncoder::new(AudioFormat::Wav, 48000, 2).unwrap();
        let bytes = encoder.encode(&[0.0; 96]).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert!(encoder.finish().unwrap().is_empty());
    }

    #[test]
    fn raw_encoder_is_container_free() {
        let mut encoder = SegmentEncoder::new(AudioFormat::Raw, 48000, 1).unwrap();
        let bytes = encoder.encode(&[0.5, -0.5]).unwrap();
        assert_eq!(bytes.len(), 8);
    }
}
