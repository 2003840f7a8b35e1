use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use lifegpu::bench::{Benchmark, PerfMonitor};
use lifegpu::config::{AppConfig, ConfigError, UpdatePath, MIN_STEPS_PER_SECOND, USAGE};
use lifegpu::graphics::{Frame, FramePresenter, GraphicsContext};
use lifegpu::simulation::Simulation;
use lifegpu::ui::{self, FpsTracker, Status, BACKGROUND_COLOR, CONTROLS};

const RATE_STEP: u32 = 2;
/// Steps averaged for the title's update time outside benchmarks.
const STATUS_SAMPLES: usize = 60;

struct State {
    window: Arc<Window>,
    simulation: Simulation,
    graphics: GraphicsContext,
    presenter: FramePresenter,
    frame: Frame,

    generation: u32,
    path: UpdatePath,
    steps_per_second: u32,
    next_step: Instant,

    perf: PerfMonitor,
    avg_update_us: f64,
    benchmark: Option<Benchmark>,
    bench_generations: u32,
    bench_log: PathBuf,

    fps: FpsTracker,
    title: String,

    cursor: Option<(f64, f64)>,
    painting: bool,
    erasing: bool,
    last_painted: Option<(i32, i32)>,
}

impl State {
    fn new(window: Arc<Window>, config: &AppConfig) -> anyhow::Result<Self> {
        let graphics = pollster::block_on(GraphicsContext::new(window.clone()))
            .context("failed to initialize the GPU")?;
        let presenter = FramePresenter::new(&graphics, config.width, config.height)
            .context("failed to build the frame presenter")?;
        let frame = Frame::new(config.width, config.height);

        let simulation = match config.seed {
            Some(seed) => Simulation::with_seed(config.width, config.height, config.cell_size, seed),
            None => Simulation::new(config.width, config.height, config.cell_size),
        };
        tracing::info!(
            rows = simulation.rows(),
            columns = simulation.columns(),
            cell_size = config.cell_size,
            path = %config.path,
            "board created"
        );

        Ok(Self {
            window,
            simulation,
            graphics,
            presenter,
            frame,
            generation: 1,
            path: config.path,
            steps_per_second: config.steps_per_second,
            next_step: Instant::now(),
            perf: PerfMonitor::new(),
            avg_update_us: 0.0,
            benchmark: None,
            bench_generations: config.bench_generations,
            bench_log: config.bench_log.clone(),
            fps: FpsTracker::new(),
            title: String::new(),
            cursor: None,
            painting: false,
            erasing: false,
            last_painted: None,
        })
    }

    fn step_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.steps_per_second as f64)
    }

    fn step(&mut self) {
        self.perf.start_timing();
        let result = match self.path {
            UpdatePath::Cpu => Ok(self.simulation.update(self.generation)),
            UpdatePath::Gpu => self.simulation.update_gpu(&self.graphics.gpu, self.generation),
        };
        self.perf.end_timing();

        match result {
            Ok(generation) => self.generation = generation,
            Err(err) => {
                tracing::error!(error = %err, "GPU update failed, falling back to the CPU");
                self.simulation.release_gpu();
                self.path = UpdatePath::Cpu;
                self.benchmark = None;
                self.perf.reset();
                return;
            }
        }

        if let Some(bench) = self.benchmark.as_mut() {
            if bench.record_generation() {
                self.finish_benchmark();
            }
        } else if self.perf.samples() >= STATUS_SAMPLES {
            self.avg_update_us = self.perf.results(self.path.implementation_label()).avg_update_us;
            self.perf.reset();
        }
    }

    /// Only while stopped; a running board ignores both. A paused benchmark
    /// starts counting again so the report matches its timings.
    fn reset_board(&mut self, randomize: bool) {
        if self.simulation.is_running() {
            return;
        }
        if let Some(bench) = self.benchmark.as_mut() {
            bench.restart();
        }
        if randomize {
            self.simulation.create_random_state();
        } else {
            self.simulation.clear_grid();
        }
        self.generation = 1;
        self.avg_update_us = 0.0;
        self.perf.reset();
    }

    fn start_benchmark(&mut self) {
        if self.benchmark.is_some() {
            return;
        }
        tracing::info!(path = %self.path, generations = self.bench_generations, "benchmark started");
        self.simulation.stop();
        self.reset_board(true);
        self.benchmark = Some(Benchmark::new(self.path, self.bench_generations));
        self.simulation.start();
    }

    fn finish_benchmark(&mut self) {
        let Some(bench) = self.benchmark.take() else {
            return;
        };
        let results = self.perf.results(bench.path.implementation_label());
        self.avg_update_us = results.avg_update_us;
        self.perf.reset();

        tracing::info!(
            implementation = %results.implementation,
            generations = results.generations_tested,
            avg_us = results.avg_update_us,
            min_us = results.min_update_us,
            max_us = results.max_update_us,
            "benchmark finished"
        );
        if let Err(err) = results.append_to(&self.bench_log) {
            tracing::warn!(path = %self.bench_log.display(), error = %err, "could not write benchmark results");
        }
    }

    fn toggle_path(&mut self) {
        if self.benchmark.is_some() {
            tracing::warn!("update path is locked while a benchmark runs");
            return;
        }
        if self.path == UpdatePath::Gpu {
            self.simulation.release_gpu();
        }
        self.path = self.path.toggled();
        self.perf.reset();
        tracing::info!(path = %self.path, "update path switched");
    }

    fn change_rate(&mut self, faster: bool) {
        self.steps_per_second = if faster {
            self.steps_per_second.saturating_add(RATE_STEP)
        } else {
            self.steps_per_second.saturating_sub(RATE_STEP).max(MIN_STEPS_PER_SECOND)
        };
        tracing::debug!(steps_per_second = self.steps_per_second, "rate changed");
    }

    fn handle_key(&mut self, event: &KeyEvent) -> bool {
        if event.state != ElementState::Pressed {
            return false;
        }
        let PhysicalKey::Code(code) = event.physical_key else {
            return false;
        };

        match code {
            KeyCode::Escape => return true,
            KeyCode::KeyF => self.change_rate(true),
            KeyCode::KeyS => self.change_rate(false),
            _ if event.repeat => {}
            KeyCode::Enter | KeyCode::NumpadEnter | KeyCode::Space => {
                if self.simulation.is_running() {
                    self.simulation.stop();
                } else {
                    self.simulation.start();
                }
            }
            KeyCode::KeyR => self.reset_board(true),
            KeyCode::KeyC => self.reset_board(false),
            KeyCode::KeyG => self.toggle_path(),
            KeyCode::KeyB => self.start_benchmark(),
            _ => {}
        }
        false
    }

    /// Board cell under the cursor, scaling window pixels to frame pixels.
    fn cell_under_cursor(&self) -> Option<(i32, i32)> {
        let (x, y) = self.cursor?;
        let size = self.graphics.size;
        if size.width == 0 || size.height == 0 {
            return None;
        }
        let cell = self.simulation.cell_size().max(1) as f64;
        let frame_x = x * self.frame.width() as f64 / size.width as f64;
        let frame_y = y * self.frame.height() as f64 / size.height as f64;
        Some(((frame_y / cell).floor() as i32, (frame_x / cell).floor() as i32))
    }

    fn apply_mouse(&mut self) {
        let Some((row, column)) = self.cell_under_cursor() else {
            return;
        };
        if self.erasing {
            self.simulation.set_cell_status(row, column, 0);
        }
        if self.painting && self.last_painted != Some((row, column)) {
            self.simulation.flip_cell(row, column);
            self.last_painted = Some((row, column));
        }
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let now = Instant::now();
        if self.simulation.is_running() && (self.benchmark.is_some() || now >= self.next_step) {
            self.step();
            self.next_step = now + self.step_interval();
        }

        self.frame.clear(BACKGROUND_COLOR);
        self.simulation.draw(&mut self.frame);
        if let Some(bench) = &self.benchmark {
            let height = self.frame.height();
            ui::draw_benchmark_progress(&mut self.frame, height, bench);
        }
        self.presenter.present(&self.graphics, &self.frame)?;

        self.fps.update();
        let title = Status {
            running: self.simulation.is_running(),
            path: self.path,
            generation: self.generation,
            steps_per_second: self.steps_per_second,
            fps: self.fps.current_fps(),
            fps_low: self.fps.one_percent_low(),
            avg_update_us: self.avg_update_us,
            benchmark: self.benchmark,
        }
        .title();
        if title != self.title {
            self.window.set_title(&title);
            self.title = title;
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        self.simulation.stop();
        self.simulation.release_gpu();
        tracing::info!(generation = self.generation, "shutting down");
    }
}

struct App {
    config: AppConfig,
    state: Option<State>,
    error: Option<anyhow::Error>,
}

impl App {
    fn new(config: AppConfig) -> Self {
        Self {
            config,
            state: None,
            error: None,
        }
    }

    fn create_state(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<State> {
        let attributes = Window::default_attributes()
            .with_title("Game of Life")
            .with_inner_size(winit::dpi::PhysicalSize::new(self.config.width, self.config.height));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .context("failed to create the window")?,
        );
        State::new(window, &self.config)
    }

    fn exit(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(state) = self.state.as_mut() {
            state.shutdown();
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        match self.create_state(event_loop) {
            Ok(state) => {
                state.window.request_redraw();
                self.state = Some(state);
            }
            Err(err) => {
                self.error = Some(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let Some(state) = self.state.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                self.exit(event_loop);
                return;
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if state.handle_key(&event) {
                    self.exit(event_loop);
                    return;
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                state.cursor = Some((position.x, position.y));
                state.apply_mouse();
            }
            WindowEvent::CursorLeft { .. } => {
                state.cursor = None;
                state.last_painted = None;
            }
            WindowEvent::MouseInput { state: button_state, button, .. } => {
                let pressed = button_state == ElementState::Pressed;
                match button {
                    MouseButton::Left => {
                        state.painting = pressed;
                        state.last_painted = None;
                    }
                    MouseButton::Right => state.erasing = pressed,
                    _ => {}
                }
                if pressed {
                    state.apply_mouse();
                }
            }
            WindowEvent::Resized(physical_size) => {
                tracing::debug!(width = physical_size.width, height = physical_size.height, "window resized");
                state.graphics.resize(physical_size);
            }
            WindowEvent::RedrawRequested => match state.render() {
                Ok(()) => {}
                Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                    let size = state.graphics.size;
                    state.graphics.resize(size);
                }
                Err(wgpu::SurfaceError::OutOfMemory) => {
                    self.error = Some(anyhow::anyhow!("surface ran out of memory"));
                    self.exit(event_loop);
                    return;
                }
                Err(err) => tracing::warn!(error = %err, "frame skipped"),
            },
            _ => {}
        }

        state.window.request_redraw();
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match AppConfig::from_args(std::env::args().skip(1)) {
        Ok(config) => config,
        Err(ConfigError::HelpRequested) => {
            println!("{USAGE}");
            return Ok(());
        }
        Err(err) => return Err(anyhow::Error::new(err).context("invalid command line")),
    };

    println!("{CONTROLS}");

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
