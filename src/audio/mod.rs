pub mod decode;
pub mod listener;
pub mod playback;
pub mod queue;
pub mod sink;
pub mod source;
pub mod stream;
