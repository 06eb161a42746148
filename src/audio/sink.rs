use std::thread;
use std::time::{Duration, Instant};

use super::listener::{ListenerId, ListenerRegistry, SinkEvent, SinkListener};
use super::stream::StreamDescriptor;
use crate::error::PipelineError;
use crate::pipeline::worker::StopHandle;

/// Playback side of the pipeline.
///
/// `write` may block; that backpressure is what paces decoding to real time.
pub trait AudioSink {
    fn add_listener(&mut self, listener: SinkListener) -> ListenerId;
    fn open(&mut self, descriptor: &StreamDescriptor) -> Result<(), PipelineError>;
    fn start(&mut self) -> Result<(), PipelineError>;
    /// Queues raw interleaved PCM; returns the number of bytes accepted.
    fn write(&mut self, bytes: &[u8]) -> Result<usize, PipelineError>;
    /// Blocks until everything written so far has been played.
    fn drain(&mut self) -> Result<(), PipelineError>;
    fn stop(&mut self) -> Result<(), PipelineError>;
    fn close(&mut self) -> Result<(), PipelineError>;
    fn clear_listeners(&mut self);

    /// Lets a blocked `write` give up once `stop` is requested.
    fn set_stop_handle(&mut self, _stop: StopHandle) {}
}

/// Discards audio but keeps real-time pacing, for runs without an output device.
pub struct NullSink {
    listeners: ListenerRegistry,
    descriptor: Option<StreamDescriptor>,
    started: bool,
    /// Wall-clock instant at which everything written so far has "played".
    played_until: Option<Instant>,
}

impl NullSink {
    pub fn new() -> Self {
        Self {
            listeners: ListenerRegistry::new(),
            descriptor: None,
            started: false,
            played_until: None,
        }
    }
}

impl Default for NullSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSink for NullSink {
    fn add_listener(&mut self, listener: SinkListener) -> ListenerId {
        self.listeners.register(listener)
    }

    fn open(&mut self, descriptor: &StreamDescriptor) -> Result<(), PipelineError> {
        self.descriptor = Some(*descriptor);
        self.listeners.notify(SinkEvent::Opened);
        Ok(())
    }

    fn start(&mut self) -> Result<(), PipelineError> {
        if self.descriptor.is_none() {
            return Err(PipelineError::Playback("sink started before open".into()));
        }
        self.started = true;
        self.listeners.notify(SinkEvent::Started);
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, PipelineError> {
        let descriptor = self
            .descriptor
            .ok_or_else(|| PipelineError::Playback("write to a closed sink".into()))?;

        let now = Instant::now();
        let from = self.played_until.map_or(now, |t| t.max(now));
        let until = from + descriptor.duration_of(bytes.len());
        self.played_until = Some(until);

        // Keep at most one chunk buffered, like a device queue would.
        if let Some(wait) = from.checked_duration_since(now) {
            thread::sleep(wait);
        }
        Ok(bytes.len())
    }

    fn drain(&mut self) -> Result<(), PipelineError> {
        if let Some(wait) = self
            .played_until
            .take()
            .and_then(|t| t.checked_duration_since(Instant::now()))
        {
            thread::sleep(wait.min(Duration::from_secs(5)));
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PipelineError> {
        if self.started {
            self.started = false;
            self.listeners.notify(SinkEvent::Stopped);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), PipelineError> {
        if self.descriptor.take().is_some() {
            self.listeners.notify(SinkEvent::Closed);
        }
        Ok(())
    }

    fn clear_listeners(&mut self) {
        if !self.listeners.is_empty() {
            log::debug!("Detaching {} sink listener(s)", self.listeners.len());
        }
        self.listeners.clear();
    }
}
