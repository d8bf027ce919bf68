use std::collections::HashSet;

use super::grid::Grid;
use super::types::{Color, Position, Token, MIN_RUN};

/// Counts consecutive cells holding `color`, starting one step away from
/// `pos` and walking by `(dx, dy)` until the color changes or the board ends.
fn count_run(grid: &Grid, pos: Position, color: Color, dx: isize, dy: isize) -> usize {
    let mut count = 0;
    let mut x = pos.x;
    let mut y = pos.y;

    loop {
        let (Some(next_x), Some(next_y)) = (x.checked_add_signed(dx), y.checked_add_signed(dy))
        else {
            return count;
        };
        match grid.get(Position::new(next_x, next_y)) {
            Some(token) if token.color() == color => {
                count += 1;
                x = next_x;
                y = next_y;
            }
            _ => return count,
        }
    }
}

fn horizontal_run(grid: &Grid, pos: Position, color: Color) -> usize {
    1 + count_run(grid, pos, color, 1, 0) + count_run(grid, pos, color, -1, 0)
}

fn vertical_run(grid: &Grid, pos: Position, color: Color) -> usize {
    1 + count_run(grid, pos, color, 0, 1) + count_run(grid, pos, color, 0, -1)
}

/// Every token that sits in a horizontal or vertical run of at least
/// `MIN_RUN` equal colors. Each cell is judged by the run through it, so a
/// token on two runs appears once and scan order does not matter.
pub fn find_matches(grid: &Grid) -> HashSet<Token> {
    let mut matches = HashSet::new();

    for placement in grid.occupied() {
        let color = placement.token.color();
        if horizontal_run(grid, placement.position, color) >= MIN_RUN
            || vertical_run(grid, placement.position, color) >= MIN_RUN
        {
            matches.insert(placement.token);
        }
    }

    matches
}

/// Whether putting `color` at `pos` would complete a run, judged against the
/// current neighbours only. The cell's own content is ignored.
pub fn would_match(grid: &Grid, color: Color, pos: Position) -> bool {
    horizontal_run(grid, pos, color) >= MIN_RUN || vertical_run(grid, pos, color) >= MIN_RUN
}
