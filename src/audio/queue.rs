use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};

use crate::error::PipelineError;
use crate::pipeline::worker::StopHandle;

/// How often a blocked `push` re-checks for a failed stream or a stop request.
const SEND_POLL: Duration = Duration::from_millis(20);
const DRAIN_POLL: Duration = Duration::from_millis(5);
/// Shortest time `drain` waits without progress before giving up.
const MIN_STALL: Duration = Duration::from_millis(500);

/// Bounded hand-off of PCM chunks from the worker to an output callback.
///
/// The callback side owns the `Receiver`, decrements [`ChunkQueue::in_flight`]
/// as each chunk finishes playing, and raises [`ChunkQueue::failure_flag`] when
/// the stream errors. A full queue blocks `push`, but never past a stream
/// failure or a stop request.
pub struct ChunkQueue {
    tx: Sender<Vec<i16>>,
    in_flight: Arc<AtomicUsize>,
    failed: Arc<AtomicBool>,
    longest_chunk: Duration,
}

impl ChunkQueue {
    pub fn new(depth: usize) -> (Self, Receiver<Vec<i16>>) {
        let (tx, rx) = bounded(depth.max(1));
        let queue = Self {
            tx,
            in_flight: Arc::new(AtomicUsize::new(0)),
            failed: Arc::new(AtomicBool::new(false)),
            longest_chunk: Duration::ZERO,
        };
        (queue, rx)
    }

    /// Chunks queued or still being played.
    pub fn in_flight(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.in_flight)
    }

    pub fn failure_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.failed)
    }

    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Queues one chunk of `duration` playback time.
    ///
    /// Returns `Ok(false)` when `stop` was requested while waiting for room;
    /// the chunk is dropped.
    pub fn push(
        &mut self,
        samples: Vec<i16>,
        duration: Duration,
        stop: Option<&StopHandle>,
    ) -> Result<bool, PipelineError> {
        self.longest_chunk = self.longest_chunk.max(duration);
        self.in_flight.fetch_add(1, Ordering::AcqRel);

        let mut pending = samples;
        loop {
            if self.has_failed() {
                self.in_flight.fetch_sub(1, Ordering::AcqRel);
                return Err(PipelineError::Playback("audio output stream failed".into()));
            }
            if stop.is_some_and(|s| s.is_stopped()) {
                self.in_flight.fetch_sub(1, Ordering::AcqRel);
                return Ok(false);
            }
            match self.tx.send_timeout(pending, SEND_POLL) {
                Ok(()) => return Ok(true),
                Err(SendTimeoutError::Timeout(back)) => pending = back,
                Err(SendTimeoutError::Disconnected(_)) => {
                    self.in_flight.fetch_sub(1, Ordering::AcqRel);
                    return Err(PipelineError::Playback("audio output stream is gone".into()));
                }
            }
        }
    }

    /// Waits until every queued chunk has played.
    ///
    /// Gives up early if the stream fails or stops consuming for twice the
    /// longest chunk (at least [`MIN_STALL`]).
    pub fn drain(&self, timeout: Duration) -> Result<(), PipelineError> {
        let stall_limit = (self.longest_chunk * 2).max(MIN_STALL);
        let deadline = Instant::now() + timeout;
        let mut last_left = self.in_flight.load(Ordering::Acquire);
        let mut last_progress = Instant::now();

        loop {
            let left = self.in_flight.load(Ordering::Acquire);
            if left == 0 {
                return Ok(());
            }
            if self.has_failed() {
                return Err(PipelineError::Playback(format!(
                    "audio output failed with {} chunk(s) unplayed",
                    left
                )));
            }

            let now = Instant::now();
            if left != last_left {
                last_left = left;
                last_progress = now;
            } else if now.duration_since(last_progress) >= stall_limit {
                return Err(PipelineError::Playback(format!(
                    "audio output stalled with {} chunk(s) unplayed",
                    left
                )));
            }
            if now >= deadline {
                return Err(PipelineError::Playback(format!(
                    "drain timed out with {} chunk(s) unplayed",
                    left
                )));
            }
            thread::sleep(DRAIN_POLL);
        }
    }
}
