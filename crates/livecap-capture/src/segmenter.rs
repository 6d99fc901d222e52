//! Fixed-duration PCM segmentation.
//!
//! Accumulates interleaved samples in arrival order and cuts a segment the
//! moment exactly one segment's worth is buffered; a trailing partial chunk
//! carries into the next window. Sequence numbers start at 0 and increase
//! without gaps for the lifetime of the segmenter; timestamps are
//! capture-relative and derived from the emitted frame count, so they stay
//! monotonic without touching the wall clock.

/// One uncut slice of PCM ready for encoding.
#[derive(Debug, Clone)]
pub struct PcmSegment {
    /// Interleaved f32 samples
    pub samples: Vec<f32>,
    /// Capture-relative start in milliseconds
    pub start_ms: u64,
    /// Duration in milliseconds
    pub duration_ms: u32,
    /// Session-scoped sequence number
    pub sequence: u64,
}

/// Single-threaded accumulator cutting fixed-duration windows.
pub struct Segmenter {
    sample_rate: u32,
    channels: u16,
    samples_per_segment: usize,
    buffer: Vec<f32>,
    emitted_frames: u64,
    next_sequence: u64,
}

impl Segmenter {
    pub fn new(sample_rate: u32, channels: u16, segment_duration_ms: u32) -> Self {
        let frames_per_segment =
            (sample_rate as u64 * segment_duration_ms as u64 / 1000) as usize;
        let samples_per_segment = frames_per_segment * channels as usize;
        Self {
            sample_rate,
            channels,
            samples_per_segment,
            buffer: Vec::with_capacity(samples_per_segment),
            emitted_frames: 0,
            next_sequence: 0,
        }
    }

    /// Append interleaved samples, returning every segment completed by this
    /// chunk. Runs on the delivery path: O(chunk), no locks, no I/O.
    pub fn push(&mut self, samples: &[f32]) -> Vec<PcmSegment> {
        self.buffer.extend_from_slice(samples);

        let mut completed = Vec::new();
        while self.buffer.len() >= self.samples_per_segment {
            let rest = self.buffer.split_off(self.samples_per_segment);
            let window = std::mem::replace(&mut self.buffer, rest);
            completed.push(self.cut(window));
        }
        completed
    }

    /// Emit the remaining partial window as a final short segment.
    pub fn flush(&mut self) -> Option<PcmSegment> {
        if self.buffer.is_empty() {
            return None;
        }
        let tail = std::mem::take(&mut self.buffer);
        Some(self.cut(tail))
    }

    /// Samples currently buffered, always less than one segment.
    pub fn pending_samples(&self) -> usize {
        self.buffer.len()
    }

    fn cut(&mut self, samples: Vec<f32>) -> PcmSegment {
        let frames = (samples.len() / self.channels as usize) as u64;
        let start_ms = self.emitted_frames * 1000 / self.sample_rate as u64;
        let end_ms = (self.emitted_frames + frames) * 1000 / self.sample_rate as u64;
        self.emitted_frames += frames;

        let segment = PcmSegment {
            samples,
            start_ms,
            duration_ms: (end_ms - start_ms) as u32,
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;

        tracing::debug!(
            "segment {} cut: {} ms - {} ms",
            segment.sequence,
            segment.start_ms,
            end_ms
        );
        segment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cuts_exactly_at_the_configured_duration() {
        let mut segmenter = Segmenter::new(16000, 1, 1000);
        let segments = segmenter.push(&vec![0.0; 16000 * 3]);

        assert_eq!(segments.len(), 3);
        for (i, segment) in segments.iter().enumerate() {
            assert_eq!(segment.samples.len(), 16000);
            assert_eq!(segment.sequence, i as u64);
            assert_eq!(segment.start_ms, i as u64 * 1000);
            assert_eq!(segment.duration_ms, 1000);
        }
        assert_eq!(segmenter.pending_samples(), 0);
    }

    #[test]
    fn partial_chunks_carry_into_the_next_window() {
        let mut segmenter = Segmenter::new(16000, 1, 1000);

        assert!(segmenter.push(&vec![0.0; 12000]).is_empty());
        assert_eq!(segmenter.pending_samples(), 12000);

        let segments = segmenter.push(&vec![0.0; 12000]);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].samples.len(), 16000);
        assert_eq!(segmenter.pending_samples(), 8000);
    }

    #[test]
    fn buffer_stays_below_one_segment_between_pushes() {
        let mut segmenter = Segmenter::new(8000, 2, 500);
        let samples_per_segment = 4000 * 2; // 500 ms of stereo frames
        for _ in 0..50 {
            segmenter.push(&vec![0.0; 1234]);
            assert!(segmenter.pending_samples() < samples_per_segment);
        }
    }

    #[test]
    fn flush_emits_the_short_tail() {
        let mut segmenter = Segmenter::new(16000, 1, 1000);
        segmenter.push(&vec![0.0; 16000 + 4000]);

        let tail = segmenter.flush().expect("tail expected");
        assert_eq!(tail.sequence, 1);
        assert_eq!(tail.samples.len(), 4000);
        assert_eq!(tail.start_ms, 1000);
        assert_eq!(tail.duration_ms, 250);
        assert!(segmenter.flush().is_none());
    }

    #[test]
    fn interleaved_stereo_counts_frames_not_samples() {
        let mut segmenter = Segmenter::new(16000, 2, 1000);
        let segments = segmenter.push(&vec![0.0; 16000 * 2]);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].samples.len(), 32000);
        assert_eq!(segments[0].duration_ms, 1000);
    }

    #[test]
    fn sequence_numbers_have_no_gaps_across_flush() {
        let mut segmenter = Segmenter::new(16000, 1, 250);
        let mut sequences = Vec::new();
        for segment in segmenter.push(&vec![0.0; 16000]) {
            sequences.push(segment.sequence);
        }
        segmenter.push(&vec![0.0; 1000]);
        sequences.push(segmenter.flush().unwrap().sequence);
        assert_eq!(sequences, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn odd_sample_rates_stay_within_one_frame_of_the_target() {
        let mut segmenter = Segmenter::new(44100, 2, 1000);
        let segments = segmenter.push(&vec![0.0; 44100 * 2 * 2]);
        assert_eq!(segments.len(), 2);
        for segment in segments {
            assert_eq!(segment.duration_ms, 1000);
        }
    }
}
