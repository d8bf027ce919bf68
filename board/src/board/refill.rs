use super::grid::Grid;
use super::matcher::would_match;
use super::types::{Placement, Token, MAX_FILL_ATTEMPTS};
use crate::id_generator::TokenIdGenerator;
use crate::session_rng::SessionRng;

/// Fills every empty cell row-major with a fresh token.
///
/// With `allow_matches == false` each cell gets up to `MAX_FILL_ATTEMPTS`
/// draws to find a color that does not complete a run against what is
/// already on the grid; if all draws would match, the last one is kept. The
/// result is match-free in the common case only.
pub fn fill(
    grid: &mut Grid,
    rng: &mut SessionRng,
    ids: &mut TokenIdGenerator,
    palette_size: u8,
    allow_matches: bool,
) -> Vec<Placement> {
    let mut placed = Vec::new();

    for pos in grid.empty_positions() {
        let mut color = rng.random_color(palette_size);
        if !allow_matches {
            for _ in 1..MAX_FILL_ATTEMPTS {
                if !would_match(grid, color, pos) {
                    break;
                }
                color = rng.random_color(palette_size);
            }
        }

        let token = Token::new(ids.generate(), color);
        grid.place(pos, Some(token));
        placed.push(Placement::new(pos, token));
    }

    placed
}
