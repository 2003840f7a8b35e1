//! Step timing and the benchmark report the driver appends to disk.

use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::config::UpdatePath;

/// Collects the wall-clock duration of each simulation step, in microseconds.
#[derive(Debug, Default)]
pub struct PerfMonitor {
    update_times: Vec<f64>,
    started: Option<Instant>,
}

impl PerfMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_timing(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Ignored unless a matching `start_timing` is pending.
    pub fn end_timing(&mut self) {
        if let Some(start) = self.started.take() {
            self.record_micros(start.elapsed().as_secs_f64() * 1_000_000.0);
        }
    }

    pub fn record_micros(&mut self, micros: f64) {
        self.update_times.push(micros);
    }

    pub fn reset(&mut self) {
        self.update_times.clear();
        self.started = None;
    }

    pub fn samples(&self) -> usize {
        self.update_times.len()
    }

    pub fn results(&self, implementation: impl Into<String>) -> BenchmarkResults {
        let implementation = implementation.into();
        if self.update_times.is_empty() {
            return BenchmarkResults {
                implementation,
                generations_tested: 0,
                avg_update_us: 0.0,
                min_update_us: 0.0,
                max_update_us: 0.0,
            };
        }

        let sum: f64 = self.update_times.iter().sum();
        let min = self.update_times.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self.update_times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        BenchmarkResults {
            implementation,
            generations_tested: self.update_times.len(),
            avg_update_us: sum / self.update_times.len() as f64,
            min_update_us: min,
            max_update_us: max,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BenchmarkResults {
    pub implementation: String,
    pub generations_tested: usize,
    pub avg_update_us: f64,
    pub min_update_us: f64,
    pub max_update_us: f64,
}

impl BenchmarkResults {
    /// Steps per second the average update time would allow; 0 with no samples.
    pub fn equivalent_fps(&self) -> f64 {
        if self.avg_update_us > 0.0 {
            1_000_000.0 / self.avg_update_us
        } else {
            0.0
        }
    }

    pub fn report(&self, timestamp_secs: u64) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== {} Performance Results ===", self.implementation);
        let _ = writeln!(out, "Generations tested: {}", self.generations_tested);
        let _ = writeln!(out, "Average update time: {:.2} microseconds", self.avg_update_us);
        let _ = writeln!(out, "Minimum update time: {:.2} microseconds", self.min_update_us);
        let _ = writeln!(out, "Maximum update time: {:.2} microseconds", self.max_update_us);
        let _ = writeln!(out, "Average FPS equivalent: {:.2}", self.equivalent_fps());
        let _ = writeln!(out, "Timestamp: {timestamp_secs}");
        let _ = writeln!(out, "----------------------------------------");
        out
    }

    /// Appends the report to `path`, creating the file if needed.
    pub fn append_to(&self, path: &Path) -> io::Result<()> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(self.report(timestamp).as_bytes())
    }
}

/// Progress of a fixed-length benchmark run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Benchmark {
    pub path: UpdatePath,
    pub target: u32,
    pub completed: u32,
}

impl Benchmark {
    pub fn new(path: UpdatePath, target: u32) -> Self {
        Self {
            path,
            target: target.max(1),
            completed: 0,
        }
    }

    /// Counts one finished generation; true once the target is reached.
    pub fn record_generation(&mut self) -> bool {
        self.completed = self.completed.saturating_add(1);
        self.is_done()
    }

    /// Drops the generations counted so far; pair with `PerfMonitor::reset`.
    pub fn restart(&mut self) {
        self.completed = 0;
    }

    pub fn is_done(&self) -> bool {
        self.completed >= self.target
    }

    pub fn progress(&self) -> f32 {
        self.completed as f32 / self.target as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_monitor_reports_zeros() {
        let results = PerfMonitor::new().results("CPU Implementation");
        assert_eq!(results.generations_tested, 0);
        assert_eq!(results.avg_update_us, 0.0);
        assert_eq!(results.equivalent_fps(), 0.0);
    }

    #[test]
    fn statistics_over_samples() {
        let mut monitor = PerfMonitor::new();
        for t in [100.0, 300.0, 200.0] {
            monitor.record_micros(t);
        }
        let results = monitor.results("GPU Implementation");
        assert_eq!(results.generations_tested, 3);
        assert_eq!(results.avg_update_us, 200.0);
        assert_eq!(results.min_update_us, 100.0);
        assert_eq!(results.max_update_us, 300.0);
        assert_eq!(results.equivalent_fps(), 5000.0);

        monitor.reset();
        assert_eq!(monitor.samples(), 0);
    }

    #[test]
    fn end_without_start_records_nothing() {
        let mut monitor = PerfMonitor::new();
        monitor.end_timing();
        assert_eq!(monitor.samples(), 0);
        monitor.start_timing();
        monitor.end_timing();
        monitor.end_timing();
        assert_eq!(monitor.samples(), 1);
    }

    #[test]
    fn report_layout() {
        let results = BenchmarkResults {
            implementation: "CPU Implementation".into(),
            generations_tested: 1000,
            avg_update_us: 250.0,
            min_update_us: 120.5,
            max_update_us: 900.0,
        };
        let expected = "\
=== CPU Implementation Performance Results ===
Generations tested: 1000
Average update time: 250.00 microseconds
Minimum update time: 120.50 microseconds
Maximum update time: 900.00 microseconds
Average FPS equivalent: 4000.00
Timestamp: 1700000000
----------------------------------------
";
        assert_eq!(results.report(1_700_000_000), expected);
    }

    #[test]
    fn append_accumulates_reports() {
        let path = std::env::temp_dir().join(format!("lifegpu-bench-{}.txt", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let mut monitor = PerfMonitor::new();
        monitor.record_micros(10.0);
        let results = monitor.results("CPU Implementation");
        results.append_to(&path).unwrap();
        results.append_to(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("=== CPU Implementation Performance Results ===").count(), 2);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn restarted_run_reports_its_full_length() {
        let mut monitor = PerfMonitor::new();
        let mut bench = Benchmark::new(UpdatePath::Cpu, 4);
        for _ in 0..3 {
            monitor.record_micros(50.0);
            bench.record_generation();
        }

        // Board reset while the run is paused.
        monitor.reset();
        bench.restart();
        assert_eq!(bench.completed, 0);

        let mut done = false;
        while !done {
            monitor.record_micros(50.0);
            done = bench.record_generation();
        }
        let results = monitor.results(bench.path.implementation_label());
        assert_eq!(results.generations_tested, bench.target as usize);
    }

    #[test]
    fn benchmark_progress() {
        let mut bench = Benchmark::new(UpdatePath::Cpu, 3);
        assert!(!bench.record_generation());
        assert!(!bench.record_generation());
        assert!(bench.record_generation());
        assert_eq!(bench.progress(), 1.0);

        let zero = Benchmark::new(UpdatePath::Gpu, 0);
        assert_eq!(zero.target, 1);
    }
}
