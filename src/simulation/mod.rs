//! Generation stepping over a pair of grids.
//!
//! `grid` is the board everyone sees; `temp_grid` is scratch space the CPU
//! step writes the next generation into before the two buffers trade places.
//! Mutators other than [`Simulation::set_cell_status`] only apply while the
//! simulation is stopped.

use rayon::prelude::*;

use crate::graphics::{Canvas, GpuContext, GpuError};
use crate::grid::Grid;

#[rustfmt::skip]
const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (-1, -1), (-1, 0), (-1, 1),
    ( 0, -1),          ( 0, 1),
    ( 1, -1), ( 1, 0), ( 1, 1),
];

/// Live cells among the eight neighbors of `(row, column)`, with rows and
/// columns wrapping around the board edges.
pub fn count_live_neighbors(grid: &Grid, row: i32, column: i32) -> u8 {
    let rows = grid.rows() as i64;
    let columns = grid.columns() as i64;
    if rows == 0 || columns == 0 {
        return 0;
    }
    NEIGHBOR_OFFSETS
        .iter()
        .map(|&(dr, dc)| {
            // Widened so coordinates at the i32 extremes cannot overflow.
            let neighbor_row = (row as i64 + dr as i64).rem_euclid(rows);
            let neighbor_column = (column as i64 + dc as i64).rem_euclid(columns);
            grid.get_status(neighbor_row as i32, neighbor_column as i32)
        })
        .sum()
}

/// B3/S23.
#[inline]
pub fn next_state(alive: bool, live_neighbors: u8) -> u8 {
    match (alive, live_neighbors) {
        (true, 2) | (true, 3) | (false, 3) => 1,
        _ => 0,
    }
}

pub struct Simulation {
    grid: Grid,
    temp_grid: Grid,
    running: bool,
}

impl Simulation {
    pub fn new(width: u32, height: u32, cell_size: u32) -> Self {
        Self {
            grid: Grid::new(width, height, cell_size),
            temp_grid: Grid::new(width, height, cell_size),
            running: false,
        }
    }

    /// Same as [`Simulation::new`] but with a reproducible random source.
    pub fn with_seed(width: u32, height: u32, cell_size: u32, seed: u64) -> Self {
        Self {
            grid: Grid::with_seed(width, height, cell_size, seed),
            temp_grid: Grid::with_seed(width, height, cell_size, seed),
            running: false,
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn rows(&self) -> usize {
        self.grid.rows()
    }

    pub fn columns(&self) -> usize {
        self.grid.columns()
    }

    pub fn cell_size(&self) -> u32 {
        self.grid.cell_size()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn start(&mut self) {
        if !self.running {
            tracing::debug!("simulation started");
        }
        self.running = true;
    }

    pub fn stop(&mut self) {
        if self.running {
            tracing::debug!("simulation stopped");
        }
        self.running = false;
    }

    pub fn count_live_neighbors(&self, row: i32, column: i32) -> u8 {
        count_live_neighbors(&self.grid, row, column)
    }

    pub fn clear_grid(&mut self) {
        if !self.running {
            self.grid.clear();
        }
    }

    pub fn create_random_state(&mut self) {
        if !self.running {
            self.grid.fill_random();
        }
    }

    pub fn flip_cell(&mut self, row: i32, column: i32) {
        if !self.running {
            self.grid.flip_cell(row, column);
        }
    }

    /// Applies regardless of the running state.
    pub fn set_cell_status(&mut self, row: i32, column: i32, status: u8) {
        self.grid.set_status(row, column, status);
    }

    /// One CPU generation. Returns the new generation count, or `generation`
    /// unchanged when stopped.
    pub fn update(&mut self, generation: u32) -> u32 {
        if !self.running {
            return generation;
        }

        let columns = self.grid.columns();
        if columns > 0 {
            let current = &self.grid;
            self.temp_grid
                .cells_mut()
                .par_chunks_mut(columns)
                .enumerate()
                .for_each(|(row, line)| {
                    let row = row as i32;
                    for (column, cell) in line.iter_mut().enumerate() {
                        let column = column as i32;
                        let alive = current.get_status(row, column) != 0;
                        *cell = next_state(alive, count_live_neighbors(current, row, column));
                    }
                });
        }

        self.grid.swap_cells(&mut self.temp_grid);
        generation + 1
    }

    /// One GPU generation; the result is read back into the display grid
    /// before this returns.
    pub fn update_gpu(&mut self, gpu: &GpuContext, generation: u32) -> Result<u32, GpuError> {
        if !self.running {
            return Ok(generation);
        }
        self.grid.update_with_gpu(gpu)?;
        Ok(generation + 1)
    }

    /// Frees the GPU-side state of the display grid.
    pub fn release_gpu(&mut self) {
        self.grid.cleanup_gpu();
    }

    pub fn draw<C: Canvas + ?Sized>(&self, canvas: &mut C) {
        self.grid.draw(canvas);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn three_by_three() -> Simulation {
        Simulation::with_seed(3, 3, 1, 0)
    }

    fn live_cells(sim: &Simulation) -> Vec<(i32, i32)> {
        let mut out = Vec::new();
        for row in 0..sim.rows() as i32 {
            for column in 0..sim.columns() as i32 {
                if sim.grid().get_status(row, column) == 1 {
                    out.push((row, column));
                }
            }
        }
        out
    }

    #[test]
    fn corner_neighbors_wrap_around() {
        let mut sim = Simulation::with_seed(50, 40, 10, 0);
        sim.set_cell_status(3, 4, 1);
        assert_eq!(sim.count_live_neighbors(0, 0), 1);
        assert_eq!(sim.count_live_neighbors(3, 0), 1);
        assert_eq!(sim.count_live_neighbors(0, 4), 1);
        assert_eq!(sim.count_live_neighbors(1, 1), 0);
        assert_eq!(sim.count_live_neighbors(3, 4), 0);
    }

    #[test]
    fn rule_table() {
        for n in 0..=8u8 {
            let survive = if n == 2 || n == 3 { 1 } else { 0 };
            let born = if n == 3 { 1 } else { 0 };
            assert_eq!(next_state(true, n), survive, "alive with {n}");
            assert_eq!(next_state(false, n), born, "dead with {n}");
        }
    }

    #[test]
    fn isolated_center_cell_dies() {
        let mut sim = three_by_three();
        sim.set_cell_status(1, 1, 1);
        for row in 0..3 {
            for column in 0..3 {
                if (row, column) != (1, 1) {
                    assert_eq!(sim.count_live_neighbors(row, column), 1);
                }
            }
        }

        sim.start();
        let generation = sim.update(1);
        assert_eq!(generation, 2);
        assert!(live_cells(&sim).is_empty());
    }

    #[test]
    fn blinker_on_minimal_torus() {
        // On a 3x3 torus the eight wrapped neighbors of any cell are the other
        // eight cells, so every dead cell sees the three live ones and is born
        // while the live ones keep exactly two neighbors.
        let mut sim = three_by_three();
        for column in 0..3 {
            sim.set_cell_status(1, column, 1);
        }
        assert_eq!(sim.count_live_neighbors(0, 0), 3);
        assert_eq!(sim.count_live_neighbors(1, 1), 2);
        sim.start();
        sim.update(0);
        assert_eq!(sim.grid().population(), 9);
    }

    #[test]
    fn blinker_oscillates_on_open_board() {
        let mut sim = Simulation::with_seed(10, 10, 1, 0);
        for column in 3..6 {
            sim.set_cell_status(4, column, 1);
        }
        let horizontal = live_cells(&sim);
        sim.start();
        let generation = sim.update(1);
        assert_eq!(live_cells(&sim), vec![(3, 4), (4, 4), (5, 4)]);
        let generation = sim.update(generation);
        assert_eq!(live_cells(&sim), horizontal);
        assert_eq!(generation, 3);
    }

    #[test]
    fn glider_crosses_the_seam() {
        let mut sim = Simulation::with_seed(6, 6, 1, 0);
        for (row, column) in [(0, 1), (1, 2), (2, 0), (2, 1), (2, 2)] {
            sim.set_cell_status(row, column, 1);
        }
        let start = live_cells(&sim);
        sim.start();
        let mut generation = 0;
        // A glider returns to its shape shifted by (1, 1) every 4 generations;
        // 24 generations moves it 6 cells, once around this 6x6 torus.
        for _ in 0..24 {
            generation = sim.update(generation);
        }
        assert_eq!(generation, 24);
        assert_eq!(live_cells(&sim), start);
    }

    #[test]
    fn stopped_update_changes_nothing() {
        let mut sim = three_by_three();
        sim.set_cell_status(1, 1, 1);
        assert_eq!(sim.update(5), 5);
        assert_eq!(live_cells(&sim), vec![(1, 1)]);
    }

    #[test]
    fn mutators_are_guarded_while_running() {
        let mut sim = Simulation::with_seed(100, 100, 10, 3);
        sim.create_random_state();
        let before = sim.grid().cells().to_vec();

        sim.start();
        sim.flip_cell(0, 0);
        sim.clear_grid();
        sim.create_random_state();
        assert_eq!(sim.grid().cells(), before.as_slice());

        sim.stop();
        sim.clear_grid();
        assert_eq!(sim.grid().population(), 0);
    }

    #[test]
    fn set_cell_status_ignores_running_state() {
        let mut sim = three_by_three();
        sim.start();
        sim.set_cell_status(2, 2, 1);
        assert_eq!(sim.grid().get_status(2, 2), 1);
    }

    #[test]
    fn start_stop_transitions() {
        let mut sim = three_by_three();
        assert!(!sim.is_running());
        sim.start();
        sim.start();
        assert!(sim.is_running());
        sim.stop();
        assert!(!sim.is_running());
    }

    #[test]
    fn neighbor_count_at_coordinate_extremes() {
        let mut sim = Simulation::with_seed(30, 30, 10, 0);
        sim.set_cell_status(0, 0, 1);
        // i32::MAX wraps to row 1 on a 3-row board and i32::MIN to row 1 as well.
        assert_eq!(sim.count_live_neighbors(i32::MAX, 0), 1);
        assert_eq!(sim.count_live_neighbors(i32::MIN, i32::MIN), 1);
        assert_eq!(sim.count_live_neighbors(i32::MAX, i32::MAX), 1);
    }

    #[test]
    fn empty_board_steps_without_panicking() {
        let mut sim = Simulation::with_seed(5, 5, 10, 0);
        sim.start();
        assert_eq!(sim.update(0), 1);
        assert_eq!(sim.count_live_neighbors(0, 0), 0);
    }

    fn reference_step(sim: &Simulation) -> Vec<u8> {
        let mut next = Vec::with_capacity(sim.rows() * sim.columns());
        for row in 0..sim.rows() as i32 {
            for column in 0..sim.columns() as i32 {
                let alive = sim.grid().get_status(row, column) == 1;
                next.push(next_state(alive, sim.count_live_neighbors(row, column)));
            }
        }
        next
    }

    proptest! {
        #[test]
        fn step_matches_cell_by_cell_rule(
            rows in 1u32..12,
            columns in 1u32..12,
            seed in any::<u64>(),
        ) {
            let mut sim = Simulation::with_seed(columns, rows, 1, seed);
            sim.create_random_state();
            let expected = reference_step(&sim);
            sim.start();
            let generation = sim.update(0);
            prop_assert_eq!(generation, 1);
            prop_assert_eq!(sim.grid().cells(), expected.as_slice());
        }

        #[test]
        fn out_of_range_coordinates_never_mutate(
            row in prop_oneof![i32::MIN..0, 4i32..i32::MAX],
            column in any::<i32>(),
        ) {
            let mut sim = Simulation::with_seed(4, 4, 1, 1);
            sim.set_cell_status(row, column, 1);
            sim.flip_cell(row, column);
            prop_assert_eq!(sim.grid().get_status(row, column), 0);
            prop_assert_eq!(sim.grid().population(), 0);
        }

        #[test]
        fn neighbor_count_wraps_any_coordinate(
            row in any::<i32>(),
            column in any::<i32>(),
            seed in any::<u64>(),
        ) {
            let mut sim = Simulation::with_seed(7, 5, 1, seed);
            sim.create_random_state();
            let count = sim.count_live_neighbors(row, column);
            prop_assert!(count <= 8);
            let expected = sim.count_live_neighbors(row.rem_euclid(5), column.rem_euclid(7));
            prop_assert_eq!(count, expected);
        }
    }
}
