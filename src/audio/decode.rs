use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::source::PcmSource;
use super::stream::StreamDescriptor;
use crate::error::PipelineError;

/// Decodes a compressed audio file into fixed-size chunks of 16-bit PCM.
///
/// Decoded packets are re-chunked so every chunk except possibly the last
/// holds exactly `chunk_frames` frames. A decode fault is held back until the
/// samples decoded before it have been delivered.
pub struct SymphoniaSource {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    descriptor: StreamDescriptor,
    chunk_frames: usize,
    sample_buf: Option<SampleBuffer<i16>>,
    pending: Vec<i16>,
    chunk: Vec<u8>,
    finished: bool,
    fault: Option<PipelineError>,
}

impl SymphoniaSource {
    pub fn open(path: &Path, chunk_frames: usize) -> Result<Self, PipelineError> {
        let file = std::fs::File::open(path).map_err(|e| {
            PipelineError::StreamUnavailable(format!(
                "Failed to open audio file ({}): {}",
                path.display(),
                e
            ))
        })?;

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }
        Self::from_media_source(Box::new(file), hint, &path.display().to_string(), chunk_frames)
    }

    /// Probes and opens any byte source; `label` names it in logs and errors.
    pub fn from_media_source(
        source: Box<dyn MediaSource>,
        hint: Hint,
        label: &str,
        chunk_frames: usize,
    ) -> Result<Self, PipelineError> {
        let unavailable = |what: &str, err: &dyn std::fmt::Display| {
            PipelineError::StreamUnavailable(format!("{} ({}): {}", what, label, err))
        };

        let mss = MediaSourceStream::new(source, Default::default());

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| unavailable("Failed to probe audio format", &e))?;

        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| unavailable("No audio tracks found", &"no decodable track"))?;

        let track_id = track.id;
        let channels = track.codec_params.channels.map_or(1, |c| c.count());
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| unavailable("Unknown sample rate", &"missing from codec parameters"))?;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| unavailable("Failed to create audio decoder", &e))?;

        let channels = u16::try_from(channels)
            .map_err(|_| unavailable("Unsupported channel layout", &channels))?;
        let descriptor = StreamDescriptor::pcm16(sample_rate, channels);

        log::info!(
            "Opened {}: {} Hz, {} channel(s), {}-frame chunks",
            label,
            sample_rate,
            channels,
            chunk_frames
        );

        Ok(Self {
            format,
            decoder,
            track_id,
            descriptor,
            chunk_frames,
            sample_buf: None,
            pending: Vec::with_capacity(chunk_frames * channels as usize * 2),
            chunk: Vec::with_capacity(chunk_frames * descriptor.frame_size),
            finished: false,
            fault: None,
        })
    }

    /// Decodes one packet into `pending`, setting `finished` at end of stream.
    fn decode_packet(&mut self) -> Result<(), PipelineError> {
        let packet = match self.format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                self.finished = true;
                return Ok(());
            }
            Err(e) => {
                self.finished = true;
                return Err(PipelineError::DecodeFault(e.to_string()));
            }
        };

        if packet.track_id() != self.track_id {
            return Ok(());
        }

        let decoded = match self.decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(msg)) => {
                log::warn!("Skipping corrupt packet: {}", msg);
                return Ok(());
            }
            Err(e) => {
                self.finished = true;
                return Err(PipelineError::DecodeFault(e.to_string()));
            }
        };

        let spec = *decoded.spec();
        if spec.channels.count() != self.descriptor.channels as usize {
            self.finished = true;
            return Err(PipelineError::DecodeFault(format!(
                "channel count changed mid-stream from {} to {}",
                self.descriptor.channels,
                spec.channels.count()
            )));
        }

        let needed = decoded.capacity() * spec.channels.count();
        if self.sample_buf.as_ref().map_or(true, |buf| buf.capacity() < needed) {
            self.sample_buf = Some(SampleBuffer::<i16>::new(decoded.capacity() as u64, spec));
        }
        if let Some(buf) = self.sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            self.pending.extend_from_slice(buf.samples());
        }
        Ok(())
    }
}

impl PcmSource for SymphoniaSource {
    fn descriptor(&self) -> StreamDescriptor {
        self.descriptor
    }

    fn next_chunk(&mut self) -> Result<Option<&[u8]>, PipelineError> {
        let chunk_samples = self.chunk_frames * self.descriptor.channels as usize;
        while self.pending.len() < chunk_samples && !self.finished {
            if let Err(e) = self.decode_packet() {
                log::warn!("{}; flushing {} decoded sample(s) first", e, self.pending.len());
                self.fault = Some(e);
            }
        }

        if self.pending.is_empty() {
            return match self.fault.take() {
                Some(fault) => Err(fault),
                None => Ok(None),
            };
        }

        let take = chunk_samples.min(self.pending.len());
        self.chunk.clear();
        for sample in self.pending.drain(..take) {
            self.chunk.extend_from_slice(&sample.to_le_bytes());
        }
        Ok(Some(&self.chunk))
    }
}
