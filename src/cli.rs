use clap::Parser;
use std::path::PathBuf;

use crate::analysis::levels::DEFAULT_LINEAR_GAIN;
use crate::analysis::smoothing::DEFAULT_DECAY_STEP;
use crate::analysis::DEFAULT_CHUNK_FRAMES;
use crate::config::{ScaleKind, DEFAULT_COLUMNS, DEFAULT_FPS};

#[derive(Parser, Debug)]
#[command(name = "bandscope", about = "Real-time terminal spectrum visualizer for audio files")]
pub struct Cli {
    /// Input audio file (FLAC, MP3, OGG, WAV, AAC)
    pub input: Option<PathBuf>,

    /// Config file (defaults to bandscope.toml or the user config directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Display frames per second
    #[arg(long, default_value_t = DEFAULT_FPS)]
    pub fps: u32,

    /// How far a falling band drops per analyzed chunk. Applied once per
    /// chunk, not per drawn frame: 0.5 at 4096 frames and 44.1 kHz falls
    /// about 5.4 dB per second. Raise it for snappier bars
    #[arg(long, default_value_t = DEFAULT_DECAY_STEP)]
    pub decay: f32,

    /// Band scale: decibel level or linear magnitude
    #[arg(long, value_enum, default_value_t = ScaleKind::Decibel)]
    pub scale: ScaleKind,

    /// Magnitude gain for the linear scale
    #[arg(long, default_value_t = DEFAULT_LINEAR_GAIN)]
    pub gain: f32,

    /// Frames per analysis chunk (FFT size)
    #[arg(long, default_value_t = DEFAULT_CHUNK_FRAMES)]
    pub chunk_frames: usize,

    /// Number of bar columns drawn
    #[arg(long, default_value_t = DEFAULT_COLUMNS)]
    pub columns: usize,

    /// Output device name (see --list-devices)
    #[arg(short, long)]
    pub device: Option<String>,

    /// Analyze and draw without opening an output device
    #[arg(long)]
    pub no_playback: bool,

    /// Stop playback after this many seconds
    #[arg(long)]
    pub max_seconds: Option<f32>,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,
}
