//! Bounded hand-off queue between the delivery path and the encoder worker.
//!
//! `push` never blocks: when the encoder falls behind and the queue is full,
//! the oldest unencoded segment is dropped and counted, keeping the audio
//! thread real-time. `pop` blocks the worker until a segment arrives or the
//! queue is closed.

use crate::segmenter::PcmSegment;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

pub struct SegmentQueue {
    inner: Mutex<Inner>,
    ready: Condvar,
    capacity: usize,
}

struct Inner {
    segments: VecDeque<PcmSegment>,
    closed: bool,
    dropped: u64,
}

impl SegmentQueue {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0);
        Self {
            inner: Mutex::new(Inner {
                segments: VecDeque::with_capacity(capacity),
                closed: false,
                dropped: 0,
            }),
            ready: Condvar::new(),
            capacity,
        }
    }

    /// Non-blocking enqueue with drop-oldest backpressure.
    pub fn push(&self, segment: PcmSegment) {
        {
            let mut inner = self.inner.lock();
            if inner.closed {
                return;
            }
            if inner.segments.len() == self.capacity {
                if let Some(oldest) = inner.segments.pop_front() {
                    inner.dropped += 1;
                    tracing::warn!(
                        "encoder backlog full, dropping oldest unencoded segment {}",
                        oldest.sequence
                    );
                }
            }
            inner.segments.push_back(segment);
        }
        self.ready.notify_one();
    }

    /// Blocking dequeue; `None` once the queue is closed and drained.
    pub fn pop(&self) -> Option<PcmSegment> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(segment) = inner.segments.pop_front() {
                return Some(segment);
            }
            if inner.closed {
                return None;
            }
            self.ready.wait(&mut inner);
        }
    }

    /// Close the queue; queued segments remain poppable.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.ready.notify_all();
    }

    /// Number of segments dropped to backpressure.
    pub fn dropped(&self) -> u64 {
        self.inner.lock().dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn segment(sequence: u64) -> PcmSegment {
        PcmSegment {
            samples: vec![0.0; 4],
            start_ms: sequence * 100,
            duration_ms: 100,
            sequence,
        }
    }

    #[test]
    fn pops_in_push_order() {
        let queue = SegmentQueue::new(4);
        queue.push(segment(0));
        queue.push(segment(1));
        queue.close();

        assert_eq!(queue.pop().unwrap().sequence, 0);
        assert_eq!(queue.pop().unwrap().sequence, 1);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn full_queue_drops_the_oldest() {
        let queue = SegmentQueue::new(2);
        queue.push(segment(0));
        queue.push(segment(1));
        queue.push(segment(2));
        queue.close();

        assert_eq!(queue.dropped(), 1);
        assert_eq!(queue.pop().unwrap().sequence, 1);
        assert_eq!(queue.pop().unwrap().sequence, 2);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn push_after_close_is_ignored() {
        let queue = SegmentQueue::new(2);
        queue.close();
        queue.push(segment(0));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn blocked_pop_wakes_on_push() {
        let queue = Arc::new(SegmentQueue::new(2));
        let popper = {
            let queue = queue.clone();
            std::thread::spawn(move || queue.pop())
        };

        std::thread::sleep(std::time::Duration::from_millis(20));
        queue.push(segment(7));

        let popped = popper.join().unwrap();
        assert_eq!(popped.unwrap().sequence, 7);
    }

    #[test]
    fn blocked_pop_wakes_on_close() {
        let queue = Arc::new(SegmentQueue::new(2));
        let popper = {
            let queue = queue.clone();
            std::thread::spawn(move || queue.pop())
        };

        std::thread::sleep(std::time::Duration::from_millis(20));
        queue.close();

        assert!(popper.join().unwrap().is_none());
    }
}
