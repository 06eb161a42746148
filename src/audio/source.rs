use super::stream::StreamDescriptor;
use crate::error::PipelineError;

/// Codec side of the pipeline: stream metadata first, then PCM chunks in order.
pub trait PcmSource {
    /// Known before the first chunk and fixed for the stream.
    fn descriptor(&self) -> StreamDescriptor;

    /// Next chunk of interleaved little-endian 16-bit PCM.
    ///
    /// `Ok(None)` marks the normal end of the stream. An `Err` is a decode
    /// fault; the caller ends the stream as if it had finished.
    fn next_chunk(&mut self) -> Result<Option<&[u8]>, PipelineError>;
}
