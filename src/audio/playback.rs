use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SampleRate, SizedSample, Stream, StreamConfig};
use crossbeam_channel::Receiver;

use super::listener::{ListenerId, ListenerRegistry, SinkEvent, SinkListener};
use super::queue::ChunkQueue;
use super::sink::AudioSink;
use super::stream::StreamDescriptor;
use crate::error::PipelineError;
use crate::pipeline::worker::StopHandle;

pub const DEFAULT_QUEUE_DEPTH: usize = 4;
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Plays PCM chunks on a cpal output device.
///
/// Chunks travel to the device callback through a bounded queue, so `write`
/// blocks once `queue_depth` chunks are waiting. A stream error or a stop
/// request releases a blocked `write`. `cpal::Stream` is not `Send`; create
/// the sink on the thread that drives it.
pub struct CpalSink {
    device_name: Option<String>,
    queue_depth: usize,
    listeners: ListenerRegistry,
    stream: Option<Stream>,
    queue: Option<ChunkQueue>,
    descriptor: Option<StreamDescriptor>,
    stop: Option<StopHandle>,
    started: bool,
}

/// Information about an available output device.
#[derive(Debug)]
pub struct OutputDeviceInfo {
    pub name: String,
    pub is_default: bool,
}

impl CpalSink {
    pub fn new(device_name: Option<String>, queue_depth: usize) -> Self {
        Self {
            device_name,
            queue_depth: queue_depth.max(1),
            listeners: ListenerRegistry::new(),
            stream: None,
            queue: None,
            descriptor: None,
            stop: None,
            started: false,
        }
    }

    fn pick_device(&self, host: &cpal::Host) -> Result<cpal::Device, PipelineError> {
        match self.device_name {
            Some(ref wanted) => host
                .output_devices()
                .map_err(|e| PipelineError::SinkUnavailable(e.to_string()))?
                .find(|d| d.name().map(|n| n == *wanted).unwrap_or(false))
                .ok_or_else(|| PipelineError::SinkUnavailable(format!("no output device named '{}'", wanted))),
            None => host
                .default_output_device()
                .ok_or_else(|| PipelineError::SinkUnavailable("no default output device".into())),
        }
    }
}

impl AudioSink for CpalSink {
    fn add_listener(&mut self, listener: SinkListener) -> ListenerId {
        self.listeners.register(listener)
    }

    fn set_stop_handle(&mut self, stop: StopHandle) {
        self.stop = Some(stop);
    }

    fn open(&mut self, descriptor: &StreamDescriptor) -> Result<(), PipelineError> {
        let host = cpal::default_host();
        let device = self.pick_device(&host)?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let (config, sample_format) = select_stream_config(&device, &device_name, descriptor)?;
        let (queue, rx) = ChunkQueue::new(self.queue_depth);
        let in_flight = queue.in_flight();
        let failed = queue.failure_flag();

        let stream = match sample_format {
            SampleFormat::F32 => build_output_stream::<f32>(&device, &config, rx, in_flight, failed),
            SampleFormat::I16 => build_output_stream::<i16>(&device, &config, rx, in_flight, failed),
            SampleFormat::U16 => build_output_stream::<u16>(&device, &config, rx, in_flight, failed),
            other => Err(PipelineError::SinkUnavailable(format!(
                "unsupported output sample format: {:?}",
                other
            ))),
        }?;

        log::info!(
            "Audio output on '{}' ({} ch @ {} Hz, {:?})",
            device_name,
            config.channels,
            config.sample_rate.0,
            sample_format
        );

        self.descriptor = Some(*descriptor);
        self.stream = Some(stream);
        self.queue = Some(queue);
        self.listeners.notify(SinkEvent::Opened);
        Ok(())
    }

    fn start(&mut self) -> Result<(), PipelineError> {
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| PipelineError::Playback("sink started before open".into()))?;
        stream
            .play()
            .map_err(|e| PipelineError::SinkUnavailable(format!("failed to start audio stream: {}", e)))?;
        self.started = true;
        self.listeners.notify(SinkEvent::Started);
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, PipelineError> {
        let (Some(queue), Some(descriptor)) = (self.queue.as_mut(), self.descriptor) else {
            return Err(PipelineError::Playback("write to a closed sink".into()));
        };

        let whole = bytes.len() - bytes.len() % descriptor.frame_size;
        if whole == 0 {
            return Ok(0);
        }
        let samples: Vec<i16> = bytes[..whole]
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();

        if queue.push(samples, descriptor.duration_of(whole), self.stop.as_ref())? {
            Ok(whole)
        } else {
            log::debug!("Stop requested, dropping {} queued bytes", whole);
            Ok(0)
        }
    }

    fn drain(&mut self) -> Result<(), PipelineError> {
        match self.queue {
            Some(ref queue) if self.started => queue.drain(DRAIN_TIMEOUT),
            _ => Ok(()),
        }
    }

    fn stop(&mut self) -> Result<(), PipelineError> {
        if !self.started {
            return Ok(());
        }
        self.started = false;
        let result = match self.stream {
            Some(ref stream) => stream
                .pause()
                .map_err(|e| PipelineError::Playback(format!("failed to pause audio stream: {}", e))),
            None => Ok(()),
        };
        self.listeners.notify(SinkEvent::Stopped);
        result
    }

    fn close(&mut self) -> Result<(), PipelineError> {
        self.queue = None;
        if self.stream.take().is_some() {
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

/// Finds an output configuration matching the stream's rate and channel count.
fn select_stream_config(
    device: &cpal::Device,
    device_name: &str,
    descriptor: &StreamDescriptor,
) -> Result<(StreamConfig, SampleFormat), PipelineError> {
    let supported = device
        .supported_output_configs()
        .map_err(|e| PipelineError::SinkUnavailable(e.to_string()))?
        .collect::<Vec<_>>();

    let rate = SampleRate(descriptor.sample_rate);
    let matching = |format: SampleFormat| {
        supported.iter().find(|range| {
            range.channels() == descriptor.channels
                && range.sample_format() == format
                && range.min_sample_rate() <= rate
                && range.max_sample_rate() >= rate
        })
    };

    [SampleFormat::F32, SampleFormat::I16, SampleFormat::U16]
        .into_iter()
        .find_map(|format| matching(format).map(|range| (range.clone().with_sample_rate(rate), format)))
        .map(|(cfg, format)| (cfg.config(), format))
        .ok_or_else(|| {
            let offered: Vec<String> = supported
                .iter()
                .map(|range| {
                    format!(
                        "{} ch {}-{} Hz",
                        range.channels(),
                        range.min_sample_rate().0,
                        range.max_sample_rate().0
                    )
                })
                .collect();
            unsupported_stream(device_name, descriptor, &offered)
        })
}

/// No output configuration plays the stream as-is; nothing is resampled.
fn unsupported_stream(device_name: &str, descriptor: &StreamDescriptor, offered: &[String]) -> PipelineError {
    let offered = if offered.is_empty() {
        "none".to_string()
    } else {
        offered.join(", ")
    };
    PipelineError::SinkUnavailable(format!(
        "output device '{}' cannot play {} Hz with {} channel(s) (offers: {}); \
         pick another one with --device (see --list-devices) or run with --no-playback",
        device_name, descriptor.sample_rate, descriptor.channels, offered
    ))
}

fn build_output_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    rx: Receiver<Vec<i16>>,
    in_flight: Arc<AtomicUsize>,
    failed: Arc<AtomicBool>,
) -> Result<Stream, PipelineError>
where
    T: SizedSample + FromSample<i16>,
{
    let mut current: Vec<i16> = Vec::new();
    let mut cursor = 0usize;

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                for out in data.iter_mut() {
                    if cursor == current.len() {
                        if !current.is_empty() {
                            current.clear();
                            in_flight.fetch_sub(1, Ordering::AcqRel);
                        }
                        cursor = 0;
                        match rx.try_recv() {
                            Ok(next) => current = next,
                            Err(_) => {
                                *out = T::EQUILIBRIUM;
                                continue;
                            }
                        }
                    }
                    *out = <T as cpal::Sample>::from_sample(current[cursor]);
                    cursor += 1;
                }
            },
            move |err| {
                log::error!("Audio output stream error: {}", err);
                failed.store(true, Ordering::Release);
            },
            None,
        )
        .map_err(|e| PipelineError::SinkUnavailable(format!("failed to build output stream: {}", e)))
}

/// Lists output devices for `--list-devices`.
pub fn list_output_devices() -> anyhow::Result<Vec<OutputDeviceInfo>> {
    let host = cpal::default_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());

    let mut infos = Vec::new();
    for device in host.output_devices()? {
        let name = device.name().unwrap_or_else(|_| "Unknown Device".to_string());
        let is_default = default_name.as_deref() == Some(name.as_str());
        infos.push(OutputDeviceInfo { name, is_default });
    }
    Ok(infos)
}
