use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::bounded;

use super::controller::{ChunkOutcome, ChunkPipeline};
use crate::analysis::bands::BandReader;
use crate::analysis::AnalysisSettings;
use crate::audio::listener::SinkListener;
use crate::audio::sink::AudioSink;
use crate::audio::source::PcmSource;
use crate::audio::stream::StreamDescriptor;
use crate::error::PipelineError;

/// Asks the analysis worker to stop pulling chunks.
#[derive(Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// Counters for one finished stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub chunks: u64,
    pub analyzed: u64,
    pub skipped: u64,
    pub stopped: bool,
    /// Fault that ended the stream early, if any.
    pub fault: Option<PipelineError>,
}

/// Feeds chunks from `source` through a `Ready` pipeline until end of stream,
/// a fault or a stop request, then tears the pipeline down.
pub fn pump<P, S>(source: &mut P, pipeline: &mut ChunkPipeline<S>, stop: &StopHandle) -> RunSummary
where
    P: PcmSource,
    S: AudioSink,
{
    let mut summary = RunSummary::default();
    loop {
        if stop.is_stopped() {
            log::info!("Stop requested after {} chunk(s)", summary.chunks);
            summary.stopped = true;
            break;
        }

        let chunk = match source.next_chunk() {
            Ok(Some(chunk)) => chunk,
            Ok(None) => {
                log::info!("End of stream after {} chunk(s)", summary.chunks);
                break;
            }
            Err(e) => {
                log::error!("{}; ending stream", e);
                summary.fault = Some(e);
                break;
            }
        };

        summary.chunks += 1;
        match pipeline.on_chunk(chunk) {
            Ok(ChunkOutcome::Analyzed { .. }) => summary.analyzed += 1,
            Ok(ChunkOutcome::Skipped(_)) => summary.skipped += 1,
            Err(e) => {
                log::error!("{}; ending stream", e);
                summary.fault = Some(e);
                break;
            }
        }
    }

    if let Err(e) = pipeline.finish() {
        log::warn!("Teardown incomplete: {}", e);
    }
    summary
}

/// Decode/analysis thread plus the handles the presentation side needs.
pub struct AnalysisWorker {
    stop: StopHandle,
    reader: BandReader,
    descriptor: StreamDescriptor,
    handle: Option<JoinHandle<RunSummary>>,
}

impl AnalysisWorker {
    /// Starts the worker and waits until the stream is ready to play.
    ///
    /// The sink is built on the worker thread by `make_sink`, since output
    /// streams are often tied to the thread that created them. Stream or
    /// sink failures during setup are returned here and nothing plays.
    pub fn spawn<P, S, F>(
        mut source: P,
        make_sink: F,
        settings: AnalysisSettings,
        listeners: Vec<SinkListener>,
    ) -> Result<Self, PipelineError>
    where
        P: PcmSource + Send + 'static,
        S: AudioSink,
        F: FnOnce() -> S + Send + 'static,
    {
        settings.validate()?;
        let descriptor = source.descriptor();
        let stop = StopHandle::new();
        let worker_stop = stop.clone();
        let (ready_tx, ready_rx) = bounded::<Result<BandReader, PipelineError>>(1);

        let handle = thread::Builder::new()
            .name("analysis-worker".to_string())
            .spawn(move || {
                let mut sink = make_sink();
                sink.set_stop_handle(worker_stop.clone());
                let setup = ChunkPipeline::new(sink, settings).and_then(|mut pipeline| {
                    for listener in listeners {
                        pipeline.add_listener(listener)?;
                    }
                    pipeline.on_stream_info(source.descriptor())?;
                    Ok(pipeline)
                });

                let mut pipeline = match setup {
                    Ok(pipeline) => pipeline,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return RunSummary::default();
                    }
                };

                log::debug!("Analysis worker ready ({:?})", pipeline.state());
                let _ = ready_tx.send(Ok(pipeline.reader()));
                pump(&mut source, &mut pipeline, &worker_stop)
            })
            .map_err(|e| PipelineError::Worker(format!("failed to spawn analysis worker: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(reader)) => Ok(Self {
                stop,
                reader,
                descriptor,
                handle: Some(handle),
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(PipelineError::Worker(
                    "analysis worker exited before the stream was ready".into(),
                ))
            }
        }
    }

    pub fn reader(&self) -> BandReader {
        self.reader.clone()
    }

    pub fn descriptor(&self) -> StreamDescriptor {
        self.descriptor
    }

    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Waits for the worker to finish its stream and teardown.
    pub fn join(mut self) -> Result<RunSummary, PipelineError> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| PipelineError::Worker("analysis worker already joined".into()))?;
        handle
            .join()
            .map_err(|_| PipelineError::Worker("analysis worker panicked".into()))
    }
}

impl Drop for AnalysisWorker {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.stop.stop();
            if handle.join().is_err() {
                log::warn!("Analysis worker panicked during shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::levels::ScaleMode;
    use crate::audio::sink::NullSink;
    use crate::pipeline::testing::{stereo_chunk, RecordingSink, SinkCall, StalledSink, VecSource};
    use std::time::Duration;

    const FRAMES: usize = 128;

    fn settings() -> AnalysisSettings {
        AnalysisSettings {
            chunk_frames: FRAMES,
            scale: ScaleMode::Decibel,
            decay_step: 0.5,
        }
    }

    fn stereo() -> StreamDescriptor {
        StreamDescriptor::pcm16(44_100, 2)
    }

    #[test]
    fn plays_stream_to_the_end_then_tears_down() {
        let chunks = vec![
            stereo_chunk(FRAMES, 4, 8_000.0),
            stereo_chunk(FRAMES, 9, 8_000.0),
            stereo_chunk(40, 2, 8_000.0),
        ];
        let sink = RecordingSink::new();
        let probe = sink.clone();

        let worker = AnalysisWorker::spawn(VecSource::new(stereo(), chunks), move || sink, settings(), Vec::new())
            .unwrap();
        let reader = worker.reader();
        let summary = worker.join().unwrap();

        assert_eq!(summary.chunks, 3);
        assert_eq!(summary.analyzed, 2);
        assert_eq!(summary.skipped, 1);
        assert!(summary.fault.is_none());
        assert_eq!(reader.sequence(), 2);

        let calls = probe.calls();
        assert_eq!(calls.iter().filter(|c| **c == SinkCall::Drain).count(), 1);
        assert!(calls.ends_with(&[SinkCall::Drain, SinkCall::Stop, SinkCall::Close, SinkCall::ClearListeners]));
    }

    #[test]
    fn decode_fault_ends_stream_like_end_of_stream() {
        let source = VecSource::new(stereo(), vec![stereo_chunk(FRAMES, 4, 8_000.0)])
            .with_fault(PipelineError::DecodeFault("bad frame header".into()));
        let sink = RecordingSink::new();
        let probe = sink.clone();

        let worker = AnalysisWorker::spawn(source, move || sink, settings(), Vec::new()).unwrap();
        let summary = worker.join().unwrap();

        assert_eq!(summary.chunks, 1);
        assert_eq!(summary.fault, Some(PipelineError::DecodeFault("bad frame header".into())));
        assert!(probe.calls().ends_with(&[SinkCall::Drain, SinkCall::Stop, SinkCall::Close, SinkCall::ClearListeners]));
    }

    #[test]
    fn unavailable_sink_is_reported_to_caller() {
        let source = VecSource::new(stereo(), vec![stereo_chunk(FRAMES, 4, 8_000.0)]);
        let result = AnalysisWorker::spawn(source, RecordingSink::failing_open, settings(), Vec::new());
        assert!(matches!(result, Err(PipelineError::SinkUnavailable(_))));
    }

    #[test]
    fn invalid_settings_fail_before_spawning() {
        let source = VecSource::new(stereo(), Vec::new());
        let bad = AnalysisSettings {
            chunk_frames: 3,
            ..settings()
        };
        let result = AnalysisWorker::spawn(source, RecordingSink::new, bad, Vec::new());
        assert_eq!(result.err(), Some(PipelineError::InvalidAnalysisSize(3)));
    }

    #[test]
    fn stop_request_halts_before_next_chunk() {
        let mut source = VecSource::new(stereo(), vec![stereo_chunk(FRAMES, 4, 8_000.0); 5]);
        let sink = RecordingSink::new();
        let probe = sink.clone();
        let mut pipeline = ChunkPipeline::new(sink, settings()).unwrap();
        pipeline.on_stream_info(stereo()).unwrap();

        let stop = StopHandle::new();
        stop.stop();
        let summary = pump(&mut source, &mut pipeline, &stop);

        assert!(summary.stopped);
        assert_eq!(summary.chunks, 0);
        assert_eq!(probe.written_bytes(), 0);
        assert!(probe.calls().ends_with(&[SinkCall::Drain, SinkCall::Stop, SinkCall::Close, SinkCall::ClearListeners]));
    }

    #[test]
    fn stopping_a_paced_worker_cuts_the_stream_short() {
        // 128 frames at 1 kHz: each chunk takes 128 ms of playback.
        let desc = StreamDescriptor::pcm16(1_000, 2);
        let source = VecSource::new(desc, vec![stereo_chunk(FRAMES, 4, 8_000.0); 50]);
        let worker = AnalysisWorker::spawn(source, NullSink::new, settings(), Vec::new()).unwrap();

        worker.stop();
        let summary = worker.join().unwrap();
        assert!(summary.stopped);
        assert!(summary.chunks < 50);
    }

    #[test]
    fn stop_releases_a_write_blocked_on_a_stalled_output() {
        let source = VecSource::new(stereo(), vec![stereo_chunk(FRAMES, 4, 8_000.0); 20]);
        let worker = AnalysisWorker::spawn(source, StalledSink::new, settings(), Vec::new()).unwrap();

        thread::sleep(Duration::from_millis(100));
        worker.stop();

        let (done_tx, done_rx) = bounded(1);
        thread::spawn(move || {
            let _ = done_tx.send(worker.join());
        });
        let summary = done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("worker did not finish after stop")
            .unwrap();

        assert!(summary.stopped);
        assert!(summary.fault.is_none());
        assert!(summary.chunks < 20);
    }
}
