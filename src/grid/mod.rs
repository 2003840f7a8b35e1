//! Cell storage for one Game of Life board.
//!
//! Cells live in a single row-major `Vec<u8>` holding 0 (dead) or 1 (alive).
//! Every coordinate accessor takes signed indices and treats anything outside
//! `[0, rows) x [0, columns)` as a dead, read-only cell.

mod gpu;

use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::graphics::{Canvas, GpuContext, GpuError, Rgba};
use gpu::GridCompute;

pub const ALIVE_COLOR: Rgba = Rgba::new(255, 128, 164, 255);
pub const DEAD_COLOR: Rgba = Rgba::new(89, 115, 65, 255);

/// `fill_random` draws from `0..=RANDOM_RANGE_MAX`; only the top value is alive.
const RANDOM_RANGE_MAX: u32 = 4;

pub struct Grid {
    rows: usize,
    columns: usize,
    cell_size: u32,
    cells: Vec<u8>,
    rng: StdRng,
    compute: Option<GridCompute>,
}

impl Grid {
    /// Board covering `width x height` pixels with square cells of `cell_size` pixels.
    pub fn new(width: u32, height: u32, cell_size: u32) -> Self {
        Self::with_rng(width, height, cell_size, StdRng::from_os_rng())
    }

    pub fn with_seed(width: u32, height: u32, cell_size: u32, seed: u64) -> Self {
        Self::with_rng(width, height, cell_size, StdRng::seed_from_u64(seed))
    }

    fn with_rng(width: u32, height: u32, cell_size: u32, rng: StdRng) -> Self {
        let rows = height.checked_div(cell_size).unwrap_or(0) as usize;
        let columns = width.checked_div(cell_size).unwrap_or(0) as usize;
        Self {
            rows,
            columns,
            cell_size,
            cells: vec![0; rows * columns],
            rng,
            compute: None,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn cell_size(&self) -> u32 {
        self.cell_size
    }

    /// Row-major view of every cell.
    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    pub(crate) fn cells_mut(&mut self) -> &mut [u8] {
        &mut self.cells
    }

    pub fn population(&self) -> usize {
        self.cells.iter().filter(|&&c| c != 0).count()
    }

    #[inline]
    fn index(&self, row: i32, column: i32) -> Option<usize> {
        if row < 0 || column < 0 {
            return None;
        }
        let (row, column) = (row as usize, column as usize);
        if row >= self.rows || column >= self.columns {
            return None;
        }
        Some(row * self.columns + column)
    }

    pub fn get_status(&self, row: i32, column: i32) -> u8 {
        self.index(row, column).map_or(0, |i| self.cells[i])
    }

    /// Any non-zero `status` stores an alive cell.
    pub fn set_status(&mut self, row: i32, column: i32, status: u8) {
        if let Some(i) = self.index(row, column) {
            self.cells[i] = u8::from(status != 0);
        }
    }

    pub fn flip_cell(&mut self, row: i32, column: i32) {
        if let Some(i) = self.index(row, column) {
            self.cells[i] ^= 1;
        }
    }

    pub fn clear(&mut self) {
        self.cells.fill(0);
    }

    /// Each cell independently alive with probability 1/5.
    pub fn fill_random(&mut self) {
        for cell in self.cells.iter_mut() {
            let value = self.rng.random_range(0..=RANDOM_RANGE_MAX);
            *cell = u8::from(value == RANDOM_RANGE_MAX);
        }
    }

    /// Exchanges cell buffers with a board of the same shape. GPU resources
    /// and the random source stay with their owner.
    pub(crate) fn swap_cells(&mut self, other: &mut Grid) {
        debug_assert_eq!((self.rows, self.columns), (other.rows, other.columns));
        std::mem::swap(&mut self.cells, &mut other.cells);
    }

    /// One rectangle per cell, leaving a one pixel gutter on the right and bottom.
    pub fn draw<C: Canvas + ?Sized>(&self, canvas: &mut C) {
        let size = self.cell_size as i32;
        for (row, line) in self.cells.chunks_exact(self.columns.max(1)).enumerate() {
            for (column, &cell) in line.iter().enumerate() {
                let color = if cell != 0 { ALIVE_COLOR } else { DEAD_COLOR };
                canvas.fill_rect(column as i32 * size, row as i32 * size, size - 1, size - 1, color);
            }
        }
    }

    pub fn is_gpu_initialized(&self) -> bool {
        self.compute.is_some()
    }

    /// Allocates the compute textures and pipeline and uploads the current
    /// cells. Calling it again while initialized does nothing.
    pub fn init_gpu_compute(&mut self, gpu: &GpuContext) -> Result<(), GpuError> {
        if self.compute.is_some() || self.cells.is_empty() {
            return Ok(());
        }
        let compute = GridCompute::new(gpu, self.columns as u32, self.rows as u32, &self.cells)?;
        tracing::debug!(rows = self.rows, columns = self.columns, "grid compute resources created");
        self.compute = Some(compute);
        Ok(())
    }

    /// Advances the board one generation on the GPU and reads the result back
    /// into `cells` before returning.
    pub fn update_with_gpu(&mut self, gpu: &GpuContext) -> Result<(), GpuError> {
        self.init_gpu_compute(gpu)?;
        match self.compute.as_mut() {
            Some(compute) => compute.step(gpu, &mut self.cells),
            None => Ok(()),
        }
    }

    /// Releases textures, buffers and the compute pipeline. Safe to call at
    /// any time, including when the GPU path was never used.
    pub fn cleanup_gpu(&mut self) {
        if self.compute.take().is_some() {
            tracing::debug!(rows = self.rows, columns = self.columns, "grid compute resources released");
        }
    }
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grid")
            .field("rows", &self.rows)
            .field("columns", &self.columns)
            .field("cell_size", &self.cell_size)
            .field("population", &self.population())
            .field("gpu_initialized", &self.compute.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::Frame;

    #[test]
    fn dimensions_floor_pixel_size() {
        let grid = Grid::with_seed(105, 47, 10, 1);
        assert_eq!(grid.rows(), 4);
        assert_eq!(grid.columns(), 10);
        assert_eq!(grid.cells().len(), 40);
        assert_eq!(grid.population(), 0);
    }

    #[test]
    fn zero_cell_size_gives_empty_board() {
        let mut grid = Grid::with_seed(100, 100, 0, 1);
        assert_eq!((grid.rows(), grid.columns()), (0, 0));
        grid.fill_random();
        grid.flip_cell(0, 0);
        assert_eq!(grid.get_status(0, 0), 0);
    }

    #[test]
    fn out_of_range_access_is_inert() {
        let mut grid = Grid::with_seed(30, 20, 10, 1);
        for (row, column) in [(-1, 0), (0, -1), (2, 0), (0, 3), (i32::MAX, i32::MAX), (i32::MIN, 1)] {
            grid.set_status(row, column, 1);
            grid.flip_cell(row, column);
            assert_eq!(grid.get_status(row, column), 0);
            assert!(grid.index(row, column).is_none());
        }
        assert_eq!(grid.population(), 0);
    }

    #[test]
    fn set_and_flip() {
        let mut grid = Grid::with_seed(30, 30, 10, 1);
        grid.set_status(1, 2, 7);
        assert_eq!(grid.get_status(1, 2), 1);
        grid.flip_cell(1, 2);
        assert_eq!(grid.get_status(1, 2), 0);
        grid.flip_cell(0, 0);
        assert_eq!(grid.get_status(0, 0), 1);
        assert_eq!(grid.cells()[0], 1);
        assert_eq!(grid.population(), 1);
    }

    #[test]
    fn clear_twice_equals_clear_once() {
        let mut grid = Grid::with_seed(200, 200, 10, 9);
        grid.fill_random();
        grid.clear();
        let once = grid.cells().to_vec();
        grid.clear();
        assert_eq!(grid.cells(), once.as_slice());
        assert!(once.iter().all(|&c| c == 0));
    }

    #[test]
    fn fill_random_density_is_about_one_fifth() {
        let mut grid = Grid::with_seed(1000, 1000, 5, 42);
        grid.fill_random();
        let density = grid.population() as f64 / grid.cells().len() as f64;
        assert!((0.18..0.22).contains(&density), "density {density}");
        assert!(grid.cells().iter().all(|&c| c <= 1));
    }

    #[test]
    fn seeded_fill_is_deterministic() {
        let mut a = Grid::with_seed(300, 200, 10, 7);
        let mut b = Grid::with_seed(300, 200, 10, 7);
        a.fill_random();
        b.fill_random();
        assert_eq!(a.cells(), b.cells());
    }

    #[test]
    fn draw_places_cells_with_gutter() {
        let mut grid = Grid::with_seed(20, 10, 10, 1);
        grid.set_status(0, 1, 1);

        let mut frame = Frame::new(20, 10);
        frame.clear(Rgba::BLACK);
        grid.draw(&mut frame);

        assert_eq!(frame.pixel(0, 0), Some(DEAD_COLOR));
        assert_eq!(frame.pixel(8, 8), Some(DEAD_COLOR));
        assert_eq!(frame.pixel(9, 0), Some(Rgba::BLACK));
        assert_eq!(frame.pixel(0, 9), Some(Rgba::BLACK));
        assert_eq!(frame.pixel(10, 0), Some(ALIVE_COLOR));
        assert_eq!(frame.pixel(18, 8), Some(ALIVE_COLOR));
        assert_eq!(frame.pixel(19, 5), Some(Rgba::BLACK));
    }

    #[test]
    fn swap_cells_exchanges_state_only() {
        let mut a = Grid::with_seed(30, 30, 10, 1);
        let mut b = Grid::with_seed(30, 30, 10, 2);
        a.set_status(2, 2, 1);
        a.swap_cells(&mut b);
        assert_eq!(a.population(), 0);
        assert_eq!(b.get_status(2, 2), 1);
    }

    #[test]
    fn cleanup_without_init_is_noop() {
        let mut grid = Grid::with_seed(30, 30, 10, 1);
        assert!(!grid.is_gpu_initialized());
        grid.cleanup_gpu();
        grid.cleanup_gpu();
        assert!(!grid.is_gpu_initialized());
    }
}
