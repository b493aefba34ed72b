use crate::ink::tiles::TileDrawStats;
use std::collections::VecDeque;
use std::time::Duration;

pub const FRAME_BUDGET_MS: f64 = 16.0;
const DEFAULT_WINDOW_SIZE: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameSnapshot {
    pub avg_ms: f64,
    pub worst_ms: f64,
    pub p95_ms: f64,
    pub tiles_rendered: usize,
    pub tiles_blitted: usize,
    pub overruns: u64,
    pub frame_samples: usize,
}

/// Rolling record of recent draw calls.
#[derive(Debug, Clone)]
pub struct FrameStats {
    window_size: usize,
    frame_ms_window: VecDeque<f64>,
    rendered_window: VecDeque<usize>,
    blitted_window: VecDeque<usize>,
    overruns: u64,
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}

impl FrameStats {
    pub fn new(rolling_window: usize) -> Self {
        let window_size = rolling_window.max(1);
        Self {
            window_size,
            frame_ms_window: VecDeque::with_capacity(window_size),
            rendered_window: VecDeque::with_capacity(window_size),
            blitted_window: VecDeque::with_capacity(window_size),
            overruns: 0,
        }
    }

    pub fn reset(&mut self) {
        self.frame_ms_window.clear();
        self.rendered_window.clear();
        self.blitted_window.clear();
        self.overruns = 0;
    }

    pub fn record(&mut self, elapsed: Duration, draw: TileDrawStats) {
        let frame_ms = elapsed.as_secs_f64() * 1000.0;
        if frame_ms > FRAME_BUDGET_MS {
            self.overruns = self.overruns.saturating_add(1);
            tracing::warn!(
                frame_ms,
                tiles_rendered = draw.tiles_rendered,
                strokes_drawn = draw.strokes_drawn,
                "frame over budget"
            );
        }
        push_window(&mut self.frame_ms_window, frame_ms, self.window_size);
        push_window(&mut self.rendered_window, draw.tiles_rendered, self.window_size);
        push_window(&mut self.blitted_window, draw.tiles_blitted, self.window_size);
    }

    pub fn snapshot(&self) -> FrameSnapshot {
        FrameSnapshot {
            avg_ms: avg(&self.frame_ms_window),
            worst_ms: self.frame_ms_window.iter().copied().fold(0.0, f64::max),
            p95_ms: p95(&self.frame_ms_window),
            tiles_rendered: self.rendered_window.iter().sum(),
            tiles_blitted: self.blitted_window.iter().sum(),
            overruns: self.overruns,
            frame_samples: self.frame_ms_window.len(),
        }
    }
}

fn push_window<T>(window: &mut VecDeque<T>, sample: T, window_size: usize) {
    window.push_back(sample);
    while window.len() > window_size {
        let _ = window.pop_front();
    }
}

fn avg(window: &VecDeque<f64>) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    window.iter().sum::<f64>() / window.len() as f64
}

fn p95(window: &VecDeque<f64>) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    let mut values: Vec<f64> = window.iter().copied().collect();
    values.sort_by(|a, b| a.total_cmp(b));
    let idx = ((values.len() as f64 * 0.95).ceil() as usize).saturating_sub(1);
    values[idx.min(values.len() - 1)]
}
