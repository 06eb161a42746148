use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::analysis::levels::{ScaleMode, DEFAULT_LINEAR_GAIN};
use crate::analysis::smoothing::DEFAULT_DECAY_STEP;
use crate::analysis::DEFAULT_CHUNK_FRAMES;
use crate::audio::playback::DEFAULT_QUEUE_DEPTH;

pub const DEFAULT_FPS: u32 = 60;
pub const DEFAULT_COLUMNS: usize = 64;
/// Top of the bar scale in decibel mode; a full-scale sine at 4096 frames peaks near 150 dB.
pub const DEFAULT_CEILING_DB: f32 = 150.0;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ScaleKind {
    #[default]
    Decibel,
    Linear,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_chunk_frames")]
    pub chunk_frames: usize,
    #[serde(default = "default_decay_step")]
    pub decay_step: f32,
    #[serde(default)]
    pub scale: ScaleKind,
    #[serde(default = "default_linear_gain")]
    pub linear_gain: f32,
}

#[derive(Debug, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_columns")]
    pub columns: usize,
    #[serde(default = "default_ceiling_db")]
    pub ceiling_db: f32,
}

#[derive(Debug, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            chunk_frames: default_chunk_frames(),
            decay_step: default_decay_step(),
            scale: ScaleKind::default(),
            linear_gain: default_linear_gain(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            columns: default_columns(),
            ceiling_db: default_ceiling_db(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            device: None,
            queue_depth: default_queue_depth(),
        }
    }
}

fn default_chunk_frames() -> usize { DEFAULT_CHUNK_FRAMES }
fn default_decay_step() -> f32 { DEFAULT_DECAY_STEP }
fn default_linear_gain() -> f32 { DEFAULT_LINEAR_GAIN }
fn default_fps() -> u32 { DEFAULT_FPS }
fn default_columns() -> usize { DEFAULT_COLUMNS }
fn default_ceiling_db() -> f32 { DEFAULT_CEILING_DB }
fn default_queue_depth() -> usize { DEFAULT_QUEUE_DEPTH }

pub fn scale_mode(kind: ScaleKind, linear_gain: f32) -> ScaleMode {
    match kind {
        ScaleKind::Decibel => ScaleMode::Decibel,
        ScaleKind::Linear => ScaleMode::Linear { gain: linear_gain },
    }
}

/// Explicit path, then `./bandscope.toml`, then the user config directories.
pub fn resolve_config_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| {
        let local = PathBuf::from("bandscope.toml");
        if local.exists() {
            return Some(local);
        }
        if let Some(home) = dirs::home_dir() {
            let xdg = home.join(".config").join("bandscope").join("config.toml");
            if xdg.exists() {
                return Some(xdg);
            }
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join("bandscope").join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    })
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Invalid config file: {}", path.display()))
}

pub fn parse_config(content: &str) -> Result<Config> {
    Ok(toml::from_str(content)?)
}
