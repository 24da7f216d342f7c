//! Non-blocking capture handoff buffer
//!
//! Sample blocks arrive from a real-time audio callback that must never
//! block. The write path is best-effort: a contended lock drops the block,
//! a full buffer evicts the oldest samples first.

use parking_lot::Mutex;
use ringbuf::{traits::*, HeapRb};
use std::sync::Arc;

/// Thread-safe ring buffer between the capture callback and the analyzers.
pub struct CaptureBuffer {
    buffer: Arc<Mutex<HeapRb<f32>>>,
}

impl CaptureBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(HeapRb::new(capacity.max(1)))),
        }
    }

    /// Best-effort write for the real-time callback.
    ///
    /// Returns the number of samples accepted, or `None` without blocking
    /// if the lock is contended. Oldest samples are evicted on overflow.
    pub fn try_write(&self, samples: &[f32]) -> Option<usize> {
        let mut buffer = self.buffer.try_lock()?;
        Some(Self::push_all(&mut buffer, samples))
    }

    /// Blocking write for non-realtime producers (tests, playback taps).
    pub fn write(&self, samples: &[f32]) -> usize {
        let mut buffer = self.buffer.lock();
        Self::push_all(&mut buffer, samples)
    }

    fn push_all(buffer: &mut HeapRb<f32>, samples: &[f32]) -> usize {
        let mut written = 0;
        for &sample in samples {
            if buffer.try_push(sample).is_ok() {
                written += 1;
            } else {
                // Full: drop the oldest sample to make room.
                let _ = buffer.try_pop();
                let _ = buffer.try_push(sample);
                written += 1;
            }
        }
        written
    }

    /// Read up to `count` samples.
    pub fn read(&self, count: usize) -> Vec<f32> {
        let mut buffer = self.buffer.lock();
        let mut samples = Vec::with_capacity(count);
        for _ in 0..count {
            match buffer.try_pop() {
                Some(sample) => samples.push(sample),
                None => break,
            }
        }
        samples
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }

    pub fn clear(&self) {
        self.buffer.lock().clear();
    }

    pub fn capacity(&self) -> usize {
        self.buffer.lock().capacity().get()
    }
}

impl Clone for CaptureBuffer {
    fn clone(&self) -> Self {
        Self {
            buffer: Arc::clone(&self.buffer),
        }
    }
}
