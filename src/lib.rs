//! Conway's Game of Life on a wrapping board, stepped either on the CPU with
//! rayon or on the GPU with a wgpu compute shader.

pub mod bench;
pub mod config;
pub mod graphics;
pub mod grid;
pub mod simulation;
pub mod ui;

pub use config::{AppConfig, UpdatePath};
pub use graphics::{GpuContext, GpuError};
pub use grid::Grid;
pub use simulation::Simulation;
