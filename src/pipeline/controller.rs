use crate::analysis::analyzer::Analyzer;
use crate::analysis::bands::{BandBuffer, BandReader};
use crate::analysis::AnalysisSettings;
use crate::audio::listener::{ListenerId, ListenerRegistry, SinkListener};
use crate::audio::sink::AudioSink;
use crate::audio::stream::StreamDescriptor;
use crate::error::{PipelineError, SkipReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Uninitialized,
    Ready,
    Draining,
    Closed,
}

/// What happened to one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Analyzed and published under this sequence number, then played.
    Analyzed { sequence: u64 },
    /// Played (when non-empty) without analysis; no publish.
    Skipped(SkipReason),
}

/// Drives one stream through analysis and playback.
///
/// Per chunk: split → window → transform → extract → smooth → publish →
/// sink write. The bands are published before the chunk reaches the sink,
/// so audio never runs ahead of the bars computed for it.
pub struct ChunkPipeline<S: AudioSink> {
    state: PipelineState,
    settings: AnalysisSettings,
    sink: S,
    descriptor: Option<StreamDescriptor>,
    analyzer: Option<Analyzer>,
    bands: BandBuffer,
    pending_listeners: ListenerRegistry,
}

impl<S: AudioSink> ChunkPipeline<S> {
    pub fn new(sink: S, settings: AnalysisSettings) -> Result<Self, PipelineError> {
        settings.validate()?;
        Ok(Self {
            state: PipelineState::Uninitialized,
            settings,
            sink,
            descriptor: None,
            analyzer: None,
            bands: BandBuffer::new(),
            pending_listeners: ListenerRegistry::new(),
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn reader(&self) -> BandReader {
        self.bands.reader()
    }

    /// Queues a sink listener; it is attached just before the sink opens.
    pub fn add_listener(&mut self, listener: SinkListener) -> Result<ListenerId, PipelineError> {
        self.expect_state(PipelineState::Uninitialized)?;
        Ok(self.pending_listeners.register(listener))
    }

    /// Withdraws a queued listener. Returns whether `id` was still queued.
    #[allow(dead_code)]
    pub fn remove_listener(&mut self, id: ListenerId) -> Result<bool, PipelineError> {
        self.expect_state(PipelineState::Uninitialized)?;
        Ok(self.pending_listeners.remove(id))
    }

    /// Configures the sink and allocates working buffers for the stream.
    ///
    /// On failure the pipeline stays `Uninitialized` and never plays audio.
    pub fn on_stream_info(&mut self, descriptor: StreamDescriptor) -> Result<(), PipelineError> {
        self.expect_state(PipelineState::Uninitialized)?;
        descriptor.validate()?;
        let analyzer = Analyzer::new(&self.settings)?;

        for listener in self.pending_listeners.take_all() {
            self.sink.add_listener(listener);
        }
        self.sink.open(&descriptor)?;
        if let Err(e) = self.sink.start() {
            if let Err(close_err) = self.sink.close() {
                log::warn!("Closing sink after failed start: {}", close_err);
            }
            return Err(e);
        }

        log::info!("{}", descriptor);
        self.bands.allocate(analyzer.band_count());
        self.analyzer = Some(analyzer);
        self.descriptor = Some(descriptor);
        self.state = PipelineState::Ready;
        Ok(())
    }

    pub fn on_chunk(&mut self, bytes: &[u8]) -> Result<ChunkOutcome, PipelineError> {
        self.expect_state(PipelineState::Ready)?;
        let (Some(descriptor), Some(analyzer)) = (self.descriptor, self.analyzer.as_mut()) else {
            return Err(PipelineError::InvalidState {
                actual: self.state,
                expected: PipelineState::Ready,
            });
        };

        let outcome = match classify(bytes.len(), &descriptor, analyzer.size()) {
            Ok(()) => {
                let bands = analyzer.analyze_chunk(bytes, descriptor.frame_size);
                let sequence = self.bands.publish(bands);
                ChunkOutcome::Analyzed { sequence }
            }
            Err(reason) => {
                log::debug!("Skipping analysis of degenerate chunk: {}", reason);
                ChunkOutcome::Skipped(reason)
            }
        };

        if !bytes.is_empty() {
            self.sink.write(bytes)?;
        }
        Ok(outcome)
    }

    /// Drains, stops and closes the sink, then detaches listeners.
    ///
    /// Every step runs even if an earlier one failed; the first failure is
    /// returned. Runs at most once; later calls are no-ops.
    pub fn finish(&mut self) -> Result<(), PipelineError> {
        match self.state {
            PipelineState::Closed => return Ok(()),
            PipelineState::Uninitialized => {
                self.pending_listeners.clear();
                self.sink.clear_listeners();
                self.state = PipelineState::Closed;
                return Ok(());
            }
            PipelineState::Ready | PipelineState::Draining => {}
        }

        self.state = PipelineState::Draining;
        let steps = [
            ("drain", self.sink.drain()),
            ("stop", self.sink.stop()),
            ("close", self.sink.close()),
        ];
        self.sink.clear_listeners();
        self.analyzer = None;
        self.state = PipelineState::Closed;

        let mut first_err = None;
        for (step, result) in steps {
            if let Err(e) = result {
                log::warn!("Sink {} failed during teardown: {}", step, e);
                first_err = first_err.or(Some(e));
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn expect_state(&self, expected: PipelineState) -> Result<(), PipelineError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(PipelineError::InvalidState {
                actual: self.state,
                expected,
            })
        }
    }
}

impl<S: AudioSink> Drop for ChunkPipeline<S> {
    fn drop(&mut self) {
        if self.state != PipelineState::Closed {
            if let Err(e) = self.finish() {
                log::warn!("Pipeline teardown on drop: {}", e);
            }
        }
    }
}

/// Decides whether a chunk can be analyzed at the configured size.
fn classify(len: usize, descriptor: &StreamDescriptor, expected: usize) -> Result<(), SkipReason> {
    if len == 0 {
        return Err(SkipReason::Empty);
    }
    let frames = descriptor.frames_in(len).ok_or(SkipReason::PartialFrame {
        len,
        frame_size: descriptor.frame_size,
    })?;
    if frames != expected {
        return Err(SkipReason::FrameCount { frames, expected });
    }
    Ok(())
}
