use std::time::{Duration, Instant};

use crate::bench::Benchmark;
use crate::config::UpdatePath;
use crate::graphics::{Canvas, Rgba};

/// Window background behind the cell gutters.
pub const BACKGROUND_COLOR: Rgba = Rgba::new(73, 94, 53, 255);

const PANEL_COLOR: Rgba = Rgba::new(0, 0, 0, 255);
const TRACK_COLOR: Rgba = Rgba::new(255, 255, 255, 255);
const PROGRESS_COLOR: Rgba = Rgba::new(0, 228, 48, 255);
const PROGRESS_WIDTH: i32 = 290;

const FPS_WINDOW: Duration = Duration::from_secs(2);
const FPS_REFRESH: Duration = Duration::from_millis(250);

pub struct FpsTracker {
    frame_times: Vec<Instant>,
    last_fps_update: Instant,
    current_fps: f32,
    fps_1_percent_low: f32,
}

impl FpsTracker {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    fn starting_at(now: Instant) -> Self {
        Self {
            frame_times: Vec::with_capacity(240),
            last_fps_update: now,
            current_fps: 0.0,
            fps_1_percent_low: 0.0,
        }
    }

    pub fn current_fps(&self) -> f32 {
        self.current_fps
    }

    pub fn one_percent_low(&self) -> f32 {
        self.fps_1_percent_low
    }

    pub fn update(&mut self) {
        self.record_frame(Instant::now());
    }

    /// Records a presented frame; the averages refresh at most every 250ms
    /// over the last two seconds of frames.
    pub fn record_frame(&mut self, now: Instant) {
        self.frame_times.push(now);
        if let Some(cutoff) = now.checked_sub(FPS_WINDOW) {
            self.frame_times.retain(|&time| time > cutoff);
        }

        if now.duration_since(self.last_fps_update) < FPS_REFRESH {
            return;
        }
        self.last_fps_update = now;

        let Some(&first) = self.frame_times.first() else {
            return;
        };
        let total = now.duration_since(first).as_secs_f32();
        if self.frame_times.len() < 2 || total <= 0.0 {
            return;
        }
        self.current_fps = (self.frame_times.len() - 1) as f32 / total;

        let mut durations: Vec<f32> = self
            .frame_times
            .windows(2)
            .map(|pair| pair[1].duration_since(pair[0]).as_secs_f32())
            .collect();
        durations.sort_by(|a, b| b.total_cmp(a));
        let index = ((durations.len() as f32 * 0.01).ceil() as usize).min(durations.len() - 1);
        if durations[index] > 0.0 {
            self.fps_1_percent_low = 1.0 / durations[index];
        }
    }
}

impl Default for FpsTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Benchmark panel in the bottom-left corner of a `frame_height` tall canvas.
pub fn draw_benchmark_progress<C: Canvas + ?Sized>(canvas: &mut C, frame_height: u32, bench: &Benchmark) {
    let bottom = frame_height as i32;
    canvas.fill_rect(10, bottom - 60, 300, 50, PANEL_COLOR);
    canvas.fill_rect(15, bottom - 25, PROGRESS_WIDTH, 10, TRACK_COLOR);
    let filled = (PROGRESS_WIDTH as f32 * bench.progress().clamp(0.0, 1.0)) as i32;
    canvas.fill_rect(15, bottom - 25, filled, 10, PROGRESS_COLOR);
}

/// What the window title reports each frame.
#[derive(Clone, Copy, Debug)]
pub struct Status {
    pub running: bool,
    pub path: UpdatePath,
    pub generation: u32,
    pub steps_per_second: u32,
    pub fps: f32,
    pub fps_low: f32,
    pub avg_update_us: f64,
    pub benchmark: Option<Benchmark>,
}

impl Status {
    pub fn title(&self) -> String {
        let state = if self.running { "running" } else { "stopped" };
        let mut title = format!(
            "Game of Life [{state}] | {} | Generation {} | Target {}/s | {:.0} fps (1% low {:.0}) | Update {:.1} us",
            self.path, self.generation, self.steps_per_second, self.fps, self.fps_low, self.avg_update_us,
        );
        if let Some(bench) = self.benchmark {
            title.push_str(&format!(
                " | Benchmarking {} {}/{}",
                bench.path, bench.completed, bench.target
            ));
        }
        title
    }
}

pub const CONTROLS: &str = "\
Controls:
  Enter / Space  start or stop the simulation
  F / S          raise or lower the generation rate
  R              randomize the board (stopped only)
  C              clear the board (stopped only)
  G              switch between CPU and GPU updates
  B              benchmark the active update path
  Left mouse     toggle cells (stopped only)
  Right mouse    kill cells
  Escape         quit";
