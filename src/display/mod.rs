pub mod bars;

use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::pipeline::worker::AnalysisWorker;
use bars::TerminalBars;

/// Redraws the latest band snapshot at `fps` until the worker finishes.
///
/// Never waits for new analysis: if no chunk was analyzed since the previous
/// frame the same values are drawn again. Stops the worker once
/// `max_duration` has elapsed. Returns the number of frames drawn.
pub fn present<W: Write>(
    worker: &AnalysisWorker,
    bars: &mut TerminalBars,
    out: &mut W,
    fps: u32,
    max_duration: Option<Duration>,
) -> Result<u64> {
    let frame_interval = Duration::from_secs_f64(1.0 / fps as f64);
    let reader = worker.reader();
    let started = Instant::now();
    let mut values = Vec::with_capacity(reader.len());
    let mut frames = 0u64;
    let mut last_sequence = 0u64;
    let mut stop_sent = false;

    while !worker.is_finished() {
        let frame_start = Instant::now();

        let sequence = reader.read_into(&mut values);
        if sequence != last_sequence {
            log::trace!("Frame {} shows analysis #{}", frames, sequence);
            last_sequence = sequence;
        }
        bars.draw(out, &values)?;
        frames += 1;

        if !stop_sent && max_duration.is_some_and(|limit| started.elapsed() >= limit) {
            log::info!("Time limit reached, stopping playback");
            worker.stop();
            stop_sent = true;
        }

        if let Some(rest) = frame_interval.checked_sub(frame_start.elapsed()) {
            thread::sleep(rest);
        }
    }

    writeln!(out)?;
    Ok(frames)
}
