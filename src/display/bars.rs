use std::io::Write;
use std::ops::Range;

const GLYPHS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// What a full-height bar corresponds to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ceiling {
    /// Fixed top of scale, e.g. a decibel level.
    Fixed(f32),
    /// Tallest value seen so far; for the open-ended linear scale.
    RunningPeak,
}

/// Draws the band snapshot as one line of bar glyphs.
///
/// Bands are grouped into columns by index; each column shows the largest
/// band in its range.
pub struct TerminalBars {
    columns: usize,
    ceiling: Ceiling,
    peak: f32,
    heights: Vec<f32>,
    line: String,
}

impl TerminalBars {
    pub fn new(columns: usize, ceiling: Ceiling) -> Self {
        Self {
            columns,
            ceiling,
            peak: 0.0,
            heights: vec![0.0; columns],
            line: String::with_capacity(columns * 3 + 2),
        }
    }

    /// Column heights in `0.0..=1.0` for the current values.
    pub fn layout(&mut self, values: &[f32]) -> &[f32] {
        let bands = values.len();
        for (column, height) in self.heights.iter_mut().enumerate() {
            *height = if bands == 0 {
                0.0
            } else {
                values[column_span(column, self.columns, bands)]
                    .iter()
                    .copied()
                    .fold(0.0f32, f32::max)
            };
        }

        let top = match self.ceiling {
            Ceiling::Fixed(top) => top,
            Ceiling::RunningPeak => {
                let frame_max = self.heights.iter().copied().fold(0.0f32, f32::max);
                self.peak = self.peak.max(frame_max);
                self.peak
            }
        };
        for height in &mut self.heights {
            *height = if top > 0.0 { (*height / top).clamp(0.0, 1.0) } else { 0.0 };
        }
        &self.heights
    }

    pub fn render(&mut self, values: &[f32]) -> &str {
        self.layout(values);
        self.line.clear();
        for &height in &self.heights {
            let level = (height * (GLYPHS.len() - 1) as f32).round() as usize;
            self.line.push(GLYPHS[level.min(GLYPHS.len() - 1)]);
        }
        &self.line
    }

    /// Redraws the bar line in place.
    pub fn draw<W: Write>(&mut self, out: &mut W, values: &[f32]) -> std::io::Result<()> {
        let line = self.render(values);
        write!(out, "\r|{}|", line)?;
        out.flush()
    }
}

/// Band indices shown by `column` when `bands` are spread over `columns`.
pub fn column_span(column: usize, columns: usize, bands: usize) -> Range<usize> {
    let start = column * bands / columns;
    let end = ((column + 1) * bands / columns).max(start + 1).min(bands);
    start.min(bands - 1)..end
}
