//! Uncompressed segment framing: WAV container and raw f32 frames.
//!
//! WAV output uses 32-bit float samples so a decode returns the captured
//! samples bit-for-bit.

use crate::error::{AudioError, CaptureResult};
use std::io::Cursor;

/// Wrap interleaved f32 samples in a WAV container.
pub fn encode_wav(samples: &[f32], sample_rate: u32, channels: u16) -> CaptureResult<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| AudioError::EncodingError(e.to_string()))?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| AudioError::EncodingError(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| AudioError::EncodingError(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

/// Interleaved little-endian f32 frames, no container.
pub fn encode_raw(samples: &[f32]) -> Vec<u8> {
    let mut data = Vec::with_capacity(samples.len() * 4);
    for &sample in samples {
        data.extend_from_slice(&sample.to_le_bytes());
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_round_trip_is_lossless() {
        let samples: Vec<f32> = (0..480)
            .map(|i| (i as f32 / 480.0 * std::f32::consts::TAU).sin() * 0.7)
            .collect();

        let bytes = encode_wav(&samples, 48000, 1).unwrap();
        let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();

        let spec = reader.spec();
        assert_eq!(spec.sample_rate, 48000);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_format, hound::SampleFormat::Float);

        let decoded: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn wav_preserves_stereo_interleaving() {
        let samples = vec![0.1, -0.1, 0.2, -0.2];
        let bytes = encode_wav(&samples, 44100, 2).unwrap();
        let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().channels, 2);
        let decoded: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn raw_round_trip_is_lossless() {
        let samples = vec![0.0f32, 1.0, -1.0, 0.25, -0.75];
        let bytes = encode_raw(&samples);
        assert_eq!(bytes.len(), samples.len() * 4);

        let decoded: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        assert_eq!(decoded, samples);
    }
}
