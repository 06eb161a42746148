//! In-memory collaborators for pipeline tests.

use std::collections::VecDeque;
use std::f32::consts::PI;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;

use crate::analysis::bands::BandReader;
use crate::audio::listener::{ListenerId, ListenerRegistry, SinkEvent, SinkListener};
use crate::audio::queue::ChunkQueue;
use crate::audio::sink::AudioSink;
use crate::audio::source::PcmSource;
use crate::audio::stream::StreamDescriptor;
use crate::error::PipelineError;
use crate::pipeline::worker::StopHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkCall {
    Open,
    Start,
    Write(usize),
    Drain,
    Stop,
    Close,
    ClearListeners,
}

#[derive(Default)]
struct Recorded {
    calls: Vec<SinkCall>,
    sequences_at_write: Vec<u64>,
    watched: Option<BandReader>,
    listeners: ListenerRegistry,
    fail_open: bool,
    fail_drain: bool,
}

/// Sink that records every call. Clones share the same record.
#[derive(Clone, Default)]
pub struct RecordingSink {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_open() -> Self {
        let sink = Self::new();
        sink.inner.lock().fail_open = true;
        sink
    }

    pub fn failing_drain() -> Self {
        let sink = Self::new();
        sink.inner.lock().fail_drain = true;
        sink
    }

    /// Records the reader's sequence number at every write.
    pub fn watch(&self, reader: BandReader) {
        self.inner.lock().watched = Some(reader);
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.inner.lock().calls.clone()
    }

    pub fn sequences_at_write(&self) -> Vec<u64> {
        self.inner.lock().sequences_at_write.clone()
    }

    pub fn written_bytes(&self) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .map(|call| match call {
                SinkCall::Write(n) => *n,
                _ => 0,
            })
            .sum()
    }
}

impl AudioSink for RecordingSink {
    fn add_listener(&mut self, listener: SinkListener) -> ListenerId {
        self.inner.lock().listeners.register(listener)
    }

    fn open(&mut self, _descriptor: &StreamDescriptor) -> Result<(), PipelineError> {
        let mut inner = self.inner.lock();
        if inner.fail_open {
            return Err(PipelineError::SinkUnavailable("test device missing".into()));
        }
        inner.calls.push(SinkCall::Open);
        inner.listeners.notify(SinkEvent::Opened);
        Ok(())
    }

    fn start(&mut self) -> Result<(), PipelineError> {
        let mut inner = self.inner.lock();
        inner.calls.push(SinkCall::Start);
        inner.listeners.notify(SinkEvent::Started);
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, PipelineError> {
        let mut inner = self.inner.lock();
        inner.calls.push(SinkCall::Write(bytes.len()));
        if let Some(sequence) = inner.watched.as_ref().map(|r| r.sequence()) {
            inner.sequences_at_write.push(sequence);
        }
        Ok(bytes.len())
    }

    fn drain(&mut self) -> Result<(), PipelineError> {
        let mut inner = self.inner.lock();
        inner.calls.push(SinkCall::Drain);
        if inner.fail_drain {
            return Err(PipelineError::Playback("test drain failure".into()));
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PipelineError> {
        let mut inner = self.inner.lock();
        inner.calls.push(SinkCall::Stop);
        inner.listeners.notify(SinkEvent::Stopped);
        Ok(())
    }

    fn close(&mut self) -> Result<(), PipelineError> {
        let mut inner = self.inner.lock();
        inner.calls.push(SinkCall::Close);
        inner.listeners.notify(SinkEvent::Closed);
        Ok(())
    }

    fn clear_listeners(&mut self) {
        let mut inner = self.inner.lock();
        inner.calls.push(SinkCall::ClearListeners);
        inner.listeners.clear();
    }
}

/// Sink whose output never consumes anything, like a device that hung.
///
/// Writes go through the same bounded queue as a real output, so once it is
/// full only a stop request or a stream failure releases them.
pub struct StalledSink {
    queue: Option<ChunkQueue>,
    _consumer: Option<Receiver<Vec<i16>>>,
    stop: Option<StopHandle>,
    listeners: ListenerRegistry,
}

impl StalledSink {
    pub fn new() -> Self {
        Self {
            queue: None,
            _consumer: None,
            stop: None,
            listeners: ListenerRegistry::new(),
        }
    }
}

impl AudioSink for StalledSink {
    fn add_listener(&mut self, listener: SinkListener) -> ListenerId {
        self.listeners.register(listener)
    }

    fn open(&mut self, _descriptor: &StreamDescriptor) -> Result<(), PipelineError> {
        let (queue, rx) = ChunkQueue::new(2);
        self.queue = Some(queue);
        self._consumer = Some(rx);
        Ok(())
    }

    fn start(&mut self) -> Result<(), PipelineError> {
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, PipelineError> {
        let queue = self
            .queue
            .as_mut()
            .ok_or_else(|| PipelineError::Playback("write to a closed sink".into()))?;
        let samples = vec![0i16; bytes.len() / 2];
        let queued = queue.push(samples, Duration::from_millis(3), self.stop.as_ref())?;
        Ok(if queued { bytes.len() } else { 0 })
    }

    fn drain(&mut self) -> Result<(), PipelineError> {
        match self.queue {
            Some(ref queue) => queue.drain(Duration::from_secs(10)),
            None => Ok(()),
        }
    }

    fn stop(&mut self) -> Result<(), PipelineError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), PipelineError> {
        self.queue = None;
        self._consumer = None;
        Ok(())
    }

    fn clear_listeners(&mut self) {
        self.listeners.clear();
    }

    fn set_stop_handle(&mut self, stop: StopHandle) {
        self.stop = Some(stop);
    }
}

/// Source that replays a fixed list of chunks, optionally ending in a fault.
pub struct VecSource {
    descriptor: StreamDescriptor,
    chunks: VecDeque<Vec<u8>>,
    current: Vec<u8>,
    fault: Option<PipelineError>,
}

impl VecSource {
    pub fn new(descriptor: StreamDescriptor, chunks: Vec<Vec<u8>>) -> Self {
        Self {
            descriptor,
            chunks: chunks.into(),
            current: Vec::new(),
            fault: None,
        }
    }

    pub fn with_fault(mut self, fault: PipelineError) -> Self {
        self.fault = Some(fault);
        self
    }
}

impl PcmSource for VecSource {
    fn descriptor(&self) -> StreamDescriptor {
        self.descriptor
    }

    fn next_chunk(&mut self) -> Result<Option<&[u8]>, PipelineError> {
        match self.chunks.pop_front() {
            Some(chunk) => {
                self.current = chunk;
                Ok(Some(&self.current))
            }
            None => match self.fault.take() {
                Some(fault) => Err(fault),
                None => Ok(None),
            },
        }
    }
}

/// Stereo 16-bit chunk with a sinusoid at `bin` on the left and silence on the right.
pub fn stereo_chunk(frames: usize, bin: usize, amplitude: f32) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(frames * 4);
    for i in 0..frames {
        let phase = 2.0 * PI * bin as f32 * i as f32 / frames as f32;
        let left = (amplitude * phase.sin()).round() as i16;
        bytes.extend_from_slice(&left.to_le_bytes());
        bytes.extend_from_slice(&0i16.to_le_bytes());
    }
    bytes
}
