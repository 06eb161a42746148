mod analysis;
mod audio;
mod cli;
mod config;
mod display;
mod error;
mod pipeline;

use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;

use analysis::levels::DEFAULT_LINEAR_GAIN;
use analysis::smoothing::DEFAULT_DECAY_STEP;
use analysis::{AnalysisSettings, DEFAULT_CHUNK_FRAMES};
use audio::decode::SymphoniaSource;
use audio::listener::{SinkEvent, SinkListener};
use audio::playback::{self, CpalSink, DEFAULT_QUEUE_DEPTH};
use audio::sink::NullSink;
use cli::Cli;
use config::{ScaleKind, DEFAULT_CEILING_DB, DEFAULT_COLUMNS, DEFAULT_FPS};
use display::bars::{Ceiling, TerminalBars};
use pipeline::worker::AnalysisWorker;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();
    let mut ceiling_db = DEFAULT_CEILING_DB;
    let mut queue_depth = DEFAULT_QUEUE_DEPTH;

    // Load config: explicit --config path, or auto-detect bandscope.toml / global config
    if let Some(path) = config::resolve_config_path(cli.config.clone()) {
        match config::load_config(&path) {
            Ok(cfg) => {
                log::info!("Loaded config from {}", path.display());
                // Merge: config values apply only when CLI is at its default
                if cli.fps == DEFAULT_FPS { cli.fps = cfg.display.fps; }
                if cli.columns == DEFAULT_COLUMNS { cli.columns = cfg.display.columns; }
                if cli.decay == DEFAULT_DECAY_STEP { cli.decay = cfg.analysis.decay_step; }
                if cli.scale == ScaleKind::Decibel { cli.scale = cfg.analysis.scale; }
                if cli.gain == DEFAULT_LINEAR_GAIN { cli.gain = cfg.analysis.linear_gain; }
                if cli.chunk_frames == DEFAULT_CHUNK_FRAMES {
                    cli.chunk_frames = cfg.analysis.chunk_frames;
                }
                if cli.device.is_none() {
                    cli.device = cfg.playback.device;
                }
                ceiling_db = cfg.display.ceiling_db;
                queue_depth = cfg.playback.queue_depth;
            }
            Err(e) => log::warn!("{:#}", e),
        }
    }

    if cli.list_devices {
        let devices = playback::list_output_devices()?;
        println!("Available output devices:");
        for device in &devices {
            let marker = if device.is_default { " (default)" } else { "" };
            println!("  {}{}", device.name, marker);
        }
        return Ok(());
    }

    let input = cli.input.as_ref().context("Input audio file is required")?;
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }
    if cli.fps == 0 {
        anyhow::bail!("--fps must be greater than zero");
    }
    if cli.columns == 0 {
        anyhow::bail!("--columns must be greater than zero");
    }

    let settings = AnalysisSettings {
        chunk_frames: cli.chunk_frames,
        scale: config::scale_mode(cli.scale, cli.gain),
        decay_step: cli.decay,
    };
    settings.validate().context("Invalid analysis settings")?;

    log::info!("bandscope - real-time spectrum analyzer");
    log::info!("Input: {}", input.display());
    log::info!(
        "Analysis: {} frames per chunk, {:?} scale, decay {}",
        settings.chunk_frames, settings.scale, settings.decay_step
    );

    // 1. Open the decoder
    let source = SymphoniaSource::open(input, settings.chunk_frames)
        .with_context(|| format!("Failed to open {}", input.display()))?;

    // 2. Start the decode/analysis worker
    let listeners: Vec<SinkListener> = vec![Box::new(|event: SinkEvent| {
        log::debug!("Sink event: {:?}", event);
    })];
    let spawned = if cli.no_playback {
        log::info!("Playback disabled, pacing without an output device");
        AnalysisWorker::spawn(source, NullSink::new, settings, listeners)
    } else {
        let device = cli.device.clone();
        AnalysisWorker::spawn(source, move || CpalSink::new(device, queue_depth), settings, listeners)
    };
    let worker = spawned.context("Failed to start playback")?;
    log::info!("Playing {}", worker.descriptor());
    log::info!(
        "Bands fall {:.1} units/s (decay {} per {}-frame chunk)",
        settings.decay_per_second(worker.descriptor().sample_rate),
        settings.decay_step,
        settings.chunk_frames
    );

    // 3. Present bands until the stream ends
    let ceiling = match cli.scale {
        ScaleKind::Decibel => Ceiling::Fixed(ceiling_db),
        ScaleKind::Linear => Ceiling::RunningPeak,
    };
    let mut bars = TerminalBars::new(cli.columns, ceiling);
    let max_duration = cli
        .max_seconds
        .and_then(|secs| Duration::try_from_secs_f32(secs).ok());
    let stdout = std::io::stdout();
    let frames = display::present(&worker, &mut bars, &mut stdout.lock(), cli.fps, max_duration)?;

    // 4. Wait for teardown
    let summary = worker.join()?;
    log::info!(
        "Done: {} chunk(s), {} analyzed, {} skipped, {} frame(s) drawn",
        summary.chunks, summary.analyzed, summary.skipped, frames
    );
    if let Some(fault) = summary.fault {
        log::warn!("Stream ended early: {}", fault);
    }
    Ok(())
}
