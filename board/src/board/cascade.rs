use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{BoxFuture, FutureExt, Shared};

use super::error::BoardError;
use super::grid::Grid;
use super::matcher::find_matches;
use super::refill::fill;
use super::settle::{Immediate, Settle};
use super::snapshot::BoardSnapshot;
use super::types::{
    BoardEvent, Color, Direction, Placement, Position, Token, MAX_DIMENSION, MAX_PALETTE_SIZE,
    MIN_DIMENSION, MIN_PALETTE_SIZE,
};
use crate::config::BoardConfig;
use crate::id_generator::TokenIdGenerator;
use crate::log;
use crate::session_rng::SessionRng;

/// Completion of an in-flight cascade (or drain). Resolves to the number of
/// tokens removed; every clone resolves to the same value.
pub type CycleHandle = Shared<BoxFuture<'static, usize>>;

struct BoardState {
    grid: Grid,
    palette_size: u8,
    rng: SessionRng,
    ids: TokenIdGenerator,
    pending_events: Vec<BoardEvent>,
}

impl BoardState {
    fn check_token(&self, token: &Token) -> Result<(), BoardError> {
        if token.color().index() >= self.palette_size {
            return Err(BoardError::InvalidColor {
                color: token.color().index(),
                palette_size: self.palette_size,
            });
        }
        if !self.ids.was_issued(token.id()) {
            return Err(BoardError::UnknownToken(token.id()));
        }
        Ok(())
    }

    fn fill(&mut self, allow_matches: bool) -> Vec<Placement> {
        let Self {
            grid,
            palette_size,
            rng,
            ids,
            ..
        } = self;
        fill(grid, rng, ids, *palette_size, allow_matches)
    }

    /// Clears the cells of every matched token. Order follows set iteration
    /// and carries no meaning.
    fn remove(&mut self, matches: HashSet<Token>) -> Vec<Placement> {
        let mut removed = Vec::with_capacity(matches.len());
        for token in matches {
            if let Some(pos) = self.grid.position_of(token.id()) {
                self.grid.place(pos, None);
                removed.push(Placement::new(pos, token));
            }
        }
        removed
    }
}

enum RunState {
    Idle,
    Cycling(CycleHandle),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn check_dimension(dimension: usize) -> Result<(), BoardError> {
    if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&dimension) {
        return Err(BoardError::InvalidDimension(dimension));
    }
    Ok(())
}

/// Match-3 board handle. Clones share the same grid and the same run gate.
///
/// At most one cascade runs per board. `move_token`, `tick` and `destroy`
/// start work on the ambient tokio runtime and must be called from inside
/// one.
#[derive(Clone)]
pub struct GemBoard<S: Settle = Immediate> {
    state: Arc<Mutex<BoardState>>,
    run: Arc<Mutex<RunState>>,
    settle: S,
}

impl<S: Settle> GemBoard<S> {
    /// Builds an empty board from `config`; call `configure` to populate it.
    pub fn new(config: &BoardConfig, settle: S) -> Result<Self, BoardError> {
        let rng = config
            .seed
            .map(SessionRng::new)
            .unwrap_or_else(SessionRng::from_random);
        Self::with_rng(config.dimension, config.palette_size, rng, settle)
    }

    pub fn with_rng(
        dimension: usize,
        palette_size: u8,
        rng: SessionRng,
        settle: S,
    ) -> Result<Self, BoardError> {
        check_dimension(dimension)?;
        if !(MIN_PALETTE_SIZE..=MAX_PALETTE_SIZE).contains(&palette_size) {
            return Err(BoardError::InvalidPaletteSize(palette_size));
        }

        log!(
            "Created {0}x{0} board, {1} colors, seed {2}",
            dimension,
            palette_size,
            rng.seed()
        );

        let state = BoardState {
            grid: Grid::new(dimension),
            palette_size,
            rng,
            ids: TokenIdGenerator::new(),
            pending_events: Vec::new(),
        };

        Ok(Self {
            state: Arc::new(Mutex::new(state)),
            run: Arc::new(Mutex::new(RunState::Idle)),
            settle,
        })
    }

    fn state(&self) -> MutexGuard<'_, BoardState> {
        lock(&self.state)
    }

    fn run_state(&self) -> MutexGuard<'_, RunState> {
        lock(&self.run)
    }

    pub fn is_cycling(&self) -> bool {
        matches!(*self.run_state(), RunState::Cycling(_))
    }

    /// Resets to an empty grid of `dimension` and fills it, avoiding
    /// matches where the bounded retries allow. Returns `Ok(false)` without
    /// touching the board while a cycle is running.
    pub fn configure(&self, dimension: usize) -> Result<bool, BoardError> {
        check_dimension(dimension)?;

        let run = self.run_state();
        if matches!(*run, RunState::Cycling(_)) {
            return Ok(false);
        }

        let mut state = self.state();
        state.grid.resize(dimension);
        let placed = state.fill(false);
        log!("Configured {0}x{0} board with {1} tokens", dimension, placed.len());
        state.pending_events.push(BoardEvent::Refilled { tokens: placed });
        drop(state);
        drop(run);

        Ok(true)
    }

    pub fn create_token(&self, color: Color) -> Result<Token, BoardError> {
        let mut state = self.state();
        if color.index() >= state.palette_size {
            return Err(BoardError::InvalidColor {
                color: color.index(),
                palette_size: state.palette_size,
            });
        }
        let id = state.ids.generate();
        Ok(Token::new(id, color))
    }

    /// Direct placement. Returns the token evicted from `pos`. Off-board
    /// positions are ignored and yield `Ok(None)`, and so does any call made
    /// while a cycle is running.
    pub fn place_at(
        &self,
        pos: Position,
        token: Option<Token>,
    ) -> Result<Option<Token>, BoardError> {
        let run = self.run_state();
        let mut state = self.state();
        if let Some(token) = token.as_ref() {
            state.check_token(token)?;
        }
        if matches!(*run, RunState::Cycling(_)) {
            return Ok(None);
        }
        Ok(state.grid.place(pos, token))
    }

    /// Moves `token` one cell towards `direction`, swapping with whatever
    /// occupies the destination. Returns false (and changes nothing) when the
    /// token is not on the board, the destination is off the board, or a
    /// cycle is running. A successful move always starts a cascade, and the
    /// move stays committed even if nothing matches.
    pub fn move_token(&self, token: Token, direction: Direction) -> bool {
        {
            let run = self.run_state();
            if matches!(*run, RunState::Cycling(_)) {
                return false;
            }

            let mut state = self.state();
            if !state.grid.contains(&token) {
                return false;
            }
            let Some(from) = state.grid.position_of(token.id()) else {
                return false;
            };
            let Some(to) = from.step(direction, state.grid.dimension()) else {
                return false;
            };

            let event = match state.grid.get(to) {
                Some(other) => {
                    state.grid.swap(from, to);
                    BoardEvent::Swapped {
                        first: Placement::new(to, token),
                        second: Placement::new(from, other),
                    }
                }
                None => {
                    state.grid.place(to, Some(token));
                    BoardEvent::Moved { token, from, to }
                }
            };
            state.pending_events.push(event);
        }

        let _cycle = self.tick();
        true
    }

    /// Starts a cascade, or joins the one already running.
    pub fn tick(&self) -> CycleHandle {
        let mut run = self.run_state();
        if let RunState::Cycling(handle) = &*run {
            return handle.clone();
        }

        let cycle = run_cycle(self.state.clone(), self.run.clone(), self.settle.clone());
        self.launch(&mut run, cycle.boxed())
    }

    /// Takes every token off the board as one removal pass and settles. Returns
    /// `None` if a cycle is already running.
    pub fn destroy(&self) -> Option<CycleHandle> {
        let mut run = self.run_state();
        if matches!(*run, RunState::Cycling(_)) {
            return None;
        }

        let drain = drain_board(self.state.clone(), self.run.clone(), self.settle.clone());
        Some(self.launch(&mut run, drain.boxed()))
    }

    fn launch(&self, run: &mut RunState, work: BoxFuture<'static, usize>) -> CycleHandle {
        let handle = work.shared();
        *run = RunState::Cycling(handle.clone());
        tokio::spawn(handle.clone());
        handle
    }

    /// Fills every empty cell. Returns how many tokens were placed, which is
    /// zero while a cycle is running.
    pub fn fill(&self, allow_matches: bool) -> usize {
        let run = self.run_state();
        if matches!(*run, RunState::Cycling(_)) {
            return 0;
        }

        let mut state = self.state();
        let placed = state.fill(allow_matches);
        let count = placed.len();
        if count > 0 {
            state.pending_events.push(BoardEvent::Refilled { tokens: placed });
        }
        count
    }

    pub fn find_matches(&self) -> HashSet<Token> {
        find_matches(&self.state().grid)
    }

    pub fn get(&self, pos: Position) -> Option<Token> {
        self.state().grid.get(pos)
    }

    pub fn position_of(&self, token: &Token) -> Option<Position> {
        let state = self.state();
        if !state.grid.contains(token) {
            return None;
        }
        state.grid.position_of(token.id())
    }

    pub fn dimension(&self) -> usize {
        self.state().grid.dimension()
    }

    pub fn palette_size(&self) -> u8 {
        self.state().palette_size
    }

    pub fn seed(&self) -> u64 {
        self.state().rng.seed()
    }

    pub fn occupied_count(&self) -> usize {
        self.state().grid.occupied_count()
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        let state = self.state();
        BoardSnapshot::new(state.grid.dimension(), state.grid.cells().to_vec())
    }

    pub fn take_events(&self) -> Vec<BoardEvent> {
        std::mem::take(&mut self.state().pending_events)
    }
}

/// Puts the run gate back to `Idle` when a cycle or drain finishes, including
/// when a settle hook panics part way through.
struct IdleOnDrop(Arc<Mutex<RunState>>);

impl Drop for IdleOnDrop {
    fn drop(&mut self) {
        *lock(&self.0) = RunState::Idle;
    }
}

fn record(state: &Mutex<BoardState>, event: &BoardEvent) {
    lock(state).pending_events.push(event.clone());
}

/// Detect, remove, settle, refill, settle, until a detection pass comes up
/// empty. Each stage commits its grid changes under the lock before the
/// settle hook runs, so the next stage never sees a half-applied pass.
async fn run_cycle<S: Settle>(
    state: Arc<Mutex<BoardState>>,
    run: Arc<Mutex<RunState>>,
    settle: S,
) -> usize {
    let idle = IdleOnDrop(run);
    let mut total = 0;
    let mut passes = 0;

    loop {
        let removed = {
            let mut board = lock(&state);
            let matches = find_matches(&board.grid);
            if matches.is_empty() {
                break;
            }
            board.remove(matches)
        };

        passes += 1;
        total += removed.len();
        log!("Cascade pass {}: removed {} tokens", passes, removed.len());

        let event = BoardEvent::Removed { tokens: removed };
        record(&state, &event);
        settle.settle(&event).await;

        let refilled = lock(&state).fill(false);
        let event = BoardEvent::Refilled { tokens: refilled };
        record(&state, &event);
        settle.settle(&event).await;
    }

    drop(idle);
    if passes > 0 {
        log!("Cascade finished after {} passes, {} tokens cleared", passes, total);
    }
    total
}

async fn drain_board<S: Settle>(
    state: Arc<Mutex<BoardState>>,
    run: Arc<Mutex<RunState>>,
    settle: S,
) -> usize {
    let idle = IdleOnDrop(run);
    let drained = lock(&state).grid.drain();
    let count = drained.len();
    log!("Draining board: {} tokens", count);

    let event = BoardEvent::Cleared { tokens: drained };
    record(&state, &event);
    settle.settle(&event).await;

    drop(idle);
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::settle::FixedDelay;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct RecordingSettle {
        events: Arc<Mutex<Vec<BoardEvent>>>,
    }

    impl Settle for RecordingSettle {
        async fn settle(&self, event: &BoardEvent) {
            lock(&self.events).push(event.clone());
            tokio::task::yield_now().await;
        }
    }

    fn test_board(dimension: usize) -> GemBoard {
        GemBoard::with_rng(dimension, 4, SessionRng::new(11), Immediate).unwrap()
    }

    /// Places one fresh token per letter; `A` is color 0, `B` color 1 and so
    /// on, `.` leaves the cell empty.
    fn seed_rows<S: Settle>(board: &GemBoard<S>, rows: &[&str]) -> Vec<Vec<Option<Token>>> {
        rows.iter()
            .enumerate()
            .map(|(y, row)| {
                row.chars()
                    .enumerate()
                    .map(|(x, symbol)| {
                        let token = (symbol != '.')
                            .then(|| board.create_token(Color::new(symbol as u8 - b'A')).unwrap());
                        board.place_at(Position::new(x, y), token).unwrap();
                        token
                    })
                    .collect()
            })
            .collect()
    }

    fn assert_consistent<S: Settle>(board: &GemBoard<S>) {
        assert!(board.state().grid.is_consistent());
    }

    #[test]
    fn test_new_board_is_empty() {
        let board = test_board(5);

        assert_eq!(board.dimension(), 5);
        assert_eq!(board.occupied_count(), 0);
        assert!(!board.is_cycling());
    }

    #[test]
    fn test_invalid_construction_arguments() {
        assert_eq!(
            GemBoard::with_rng(2, 4, SessionRng::new(0), Immediate).err(),
            Some(BoardError::InvalidDimension(2))
        );
        assert_eq!(
            GemBoard::with_rng(6, 1, SessionRng::new(0), Immediate).err(),
            Some(BoardError::InvalidPaletteSize(1))
        );
    }

    #[test]
    fn test_configure_fills_every_cell() {
        let board = test_board(4);

        assert_eq!(board.configure(6), Ok(true));

        assert_eq!(board.dimension(), 6);
        assert_eq!(board.occupied_count(), 36);
        assert_eq!(board.snapshot().empty_count(), 0);
        assert_consistent(&board);
    }

    #[test]
    fn test_configure_rejects_bad_dimension() {
        let board = test_board(4);

        assert_eq!(board.configure(0), Err(BoardError::InvalidDimension(0)));
        assert_eq!(board.dimension(), 4);
    }

    #[test]
    fn test_configure_discards_old_tokens() {
        let board = test_board(4);
        board.configure(4).unwrap();
        let old = board.get(Position::new(0, 0)).unwrap();

        board.configure(4).unwrap();

        assert_eq!(board.position_of(&old), None);
        assert_ne!(board.get(Position::new(0, 0)), Some(old));
        assert_consistent(&board);
    }

    #[test]
    fn test_create_token_rejects_color_outside_palette() {
        let board = test_board(4);

        assert_eq!(
            board.create_token(Color::new(4)),
            Err(BoardError::InvalidColor {
                color: 4,
                palette_size: 4
            })
        );
    }

    #[test]
    fn test_place_at_rejects_foreign_token() {
        let board = test_board(4);
        let other = GemBoard::with_rng(4, 8, SessionRng::new(1), Immediate).unwrap();
        other.create_token(Color::new(0)).unwrap();
        let wide = other.create_token(Color::new(7)).unwrap();

        assert_eq!(
            board.place_at(Position::new(0, 0), Some(wide)),
            Err(BoardError::InvalidColor {
                color: 7,
                palette_size: 4
            })
        );

        let unknown = other.create_token(Color::new(1)).unwrap();
        assert_eq!(
            board.place_at(Position::new(0, 0), Some(unknown)),
            Err(BoardError::UnknownToken(unknown.id()))
        );
        assert_eq!(board.occupied_count(), 0);
    }

    #[test]
    fn test_place_at_out_of_bounds_is_ignored() {
        let board = test_board(4);
        let token = board.create_token(Color::new(0)).unwrap();

        assert_eq!(board.place_at(Position::new(4, 4), Some(token)), Ok(None));
        assert_eq!(board.position_of(&token), None);
    }

    #[test]
    fn test_place_at_returns_previous_token() {
        let board = test_board(4);
        let a = board.create_token(Color::new(0)).unwrap();
        let b = board.create_token(Color::new(1)).unwrap();

        board.place_at(Position::new(1, 2), Some(a)).unwrap();

        assert_eq!(board.place_at(Position::new(1, 2), Some(b)), Ok(Some(a)));
        assert_eq!(board.place_at(Position::new(1, 2), None), Ok(Some(b)));
        assert_consistent(&board);
    }

    #[test]
    fn test_fill_only_targets_gaps() {
        let board = test_board(3);
        #[rustfmt::skip]
        let _rows = seed_rows(&board, &[
            "AB.",
            "...",
            "BA.",
        ]);

        assert_eq!(board.fill(true), 5);
        assert_eq!(board.fill(true), 0);

        let rows = board.snapshot().rows();
        assert!(rows[0].starts_with("AB"));
        assert!(rows[2].starts_with("BA"));
        assert_eq!(board.snapshot().empty_count(), 0);
        let events = board.take_events();
        assert!(matches!(&events[..], [BoardEvent::Refilled { tokens }] if tokens.len() == 5));
    }

    #[test]
    fn test_snapshot_renders_rows() {
        let board = test_board(3);
        #[rustfmt::skip]
        let _rows = seed_rows(&board, &[
            "ABC",
            ".D.",
            "A..",
        ]);

        assert_eq!(board.snapshot().to_string(), "ABC\n.D.\nA..\n");
        assert_eq!(
            board.snapshot().get(Position::new(1, 1)).map(|t| t.color()),
            Some(Color::new(3))
        );
        assert_eq!(board.snapshot().get(Position::new(5, 1)), None);
    }

    #[tokio::test]
    async fn test_move_off_board_is_rejected() {
        let board = test_board(4);
        board.configure(4).unwrap();
        let token = board.get(Position::new(2, 0)).unwrap();
        let before = board.snapshot();

        assert!(!board.move_token(token, Direction::Up));

        assert_eq!(board.snapshot(), before);
        assert!(!board.is_cycling());
    }

    #[tokio::test]
    async fn test_move_of_token_not_on_board_is_rejected() {
        let board = test_board(4);
        let token = board.create_token(Color::new(0)).unwrap();

        assert!(!board.move_token(token, Direction::Down));
        assert!(!board.is_cycling());
    }

    #[tokio::test]
    async fn test_move_into_empty_cell_relocates() {
        let board = test_board(4);
        let rows = seed_rows(&board, &["A...", "....", "....", "...."]);
        let token = rows[0][0].unwrap();

        assert!(board.move_token(token, Direction::Right));
        assert_eq!(board.tick().await, 0);

        assert_eq!(board.position_of(&token), Some(Position::new(1, 0)));
        assert_eq!(board.get(Position::new(0, 0)), None);
        assert_consistent(&board);
        assert_eq!(
            board.take_events(),
            vec![BoardEvent::Moved {
                token,
                from: Position::new(0, 0),
                to: Position::new(1, 0),
            }]
        );
    }

    #[tokio::test]
    async fn test_non_matching_swap_is_kept() {
        let board = test_board(4);
        #[rustfmt::skip]
        let rows = seed_rows(&board, &[
            "ABAB",
            "BABA",
            "ABAB",
            "BABA",
        ]);
        let a = rows[0][0].unwrap();
        let b = rows[0][1].unwrap();

        assert!(board.move_token(a, Direction::Right));
        assert_eq!(board.tick().await, 0);

        assert_eq!(board.snapshot().rows()[0], "BAAB");
        assert_eq!(board.position_of(&a), Some(Position::new(1, 0)));
        assert_eq!(board.position_of(&b), Some(Position::new(0, 0)));
        assert!(!board.is_cycling());
        assert_consistent(&board);
    }

    #[tokio::test]
    async fn test_swap_back_restores_grid() {
        let board = test_board(4);
        #[rustfmt::skip]
        let rows = seed_rows(&board, &[
            "ABAB",
            "BABA",
            "ABAB",
            "BABA",
        ]);
        let before = board.snapshot();
        let a = rows[0][0].unwrap();

        assert!(board.move_token(a, Direction::Right));
        assert_eq!(board.tick().await, 0);
        assert!(board.move_token(a, Direction::Left));
        assert_eq!(board.tick().await, 0);

        assert_eq!(board.snapshot(), before);
    }

    #[tokio::test]
    async fn test_matching_swap_clears_the_run_and_refills() {
        let board = test_board(4);
        #[rustfmt::skip]
        let rows = seed_rows(&board, &[
            "AABA",
            "BABA",
            "ABAB",
            "BABA",
        ]);
        let first = rows[0][0].unwrap();
        let second = rows[0][1].unwrap();
        let mover = rows[0][3].unwrap();
        let displaced = rows[0][2].unwrap();

        assert!(board.find_matches().is_empty());
        assert!(board.move_token(mover, Direction::Left));
        let cleared = board.tick().await;

        let events = board.take_events();
        let removed_total: usize = events
            .iter()
            .map(|event| match event {
                BoardEvent::Removed { tokens } => tokens.len(),
                _ => 0,
            })
            .sum();
        assert_eq!(cleared, removed_total);
        assert!(matches!(events[0], BoardEvent::Swapped { .. }));
        let BoardEvent::Removed { tokens } = &events[1] else {
            panic!("expected a removal after the swap, got {:?}", events[1]);
        };
        let removed: HashSet<Token> = tokens.iter().map(|p| p.token).collect();
        assert_eq!(removed, HashSet::from([first, second, mover]));
        if events.len() == 3 {
            assert_eq!(cleared, 3);
        }
        let BoardEvent::Refilled { tokens } = &events[2] else {
            panic!("expected a refill after the removal, got {:?}", events[2]);
        };
        let mut refilled: Vec<Position> = tokens.iter().map(|p| p.position).collect();
        refilled.sort();
        assert_eq!(
            refilled,
            vec![Position::new(0, 0), Position::new(1, 0), Position::new(2, 0)]
        );

        assert_eq!(board.position_of(&displaced), Some(Position::new(3, 0)));
        assert_eq!(board.snapshot().empty_count(), 0);
        assert!(board.find_matches().is_empty());
        assert_consistent(&board);
    }

    #[tokio::test]
    async fn test_move_rejected_while_cycle_in_flight() {
        let board = test_board(4);
        #[rustfmt::skip]
        let rows = seed_rows(&board, &[
            "ABAB",
            "BABA",
            "ABAB",
            "BABA",
        ]);

        assert!(board.move_token(rows[0][0].unwrap(), Direction::Right));
        assert!(board.is_cycling());
        let in_flight = board.snapshot();

        assert!(!board.move_token(rows[3][3].unwrap(), Direction::Up));
        assert_eq!(board.snapshot(), in_flight);
        assert!(board.destroy().is_none());
        assert_eq!(board.configure(4), Ok(false));

        board.tick().await;
        assert!(!board.is_cycling());
        assert!(board.move_token(rows[3][3].unwrap(), Direction::Up));
        board.tick().await;
    }

    #[tokio::test]
    async fn test_tick_joins_running_cycle() {
        let board = test_board(4);
        seed_rows(&board, &["AAA.", "....", "....", "...."]);

        let first = board.tick();
        let second = board.tick();

        assert!(first.ptr_eq(&second));
        let (a, b) = tokio::join!(first, second);
        assert_eq!(a, b);
        assert!(a >= 3);
        assert!(!board.is_cycling());
    }

    #[tokio::test]
    async fn test_tick_on_idle_board_without_matches_resolves_zero() {
        let board = test_board(4);
        board.configure(4).unwrap();
        if !board.find_matches().is_empty() {
            board.tick().await;
        }

        assert_eq!(board.tick().await, 0);
        assert!(!board.is_cycling());
    }

    #[tokio::test]
    async fn test_cycle_alternates_removal_and_refill() {
        let settle = RecordingSettle::default();
        let board = GemBoard::with_rng(5, 3, SessionRng::new(5), settle.clone()).unwrap();
        #[rustfmt::skip]
        let _rows = seed_rows(&board, &[
            "AAABC",
            "BCCAB",
            "CABCA",
            "ABCAB",
            "BCABC",
        ]);

        let cleared = board.tick().await;

        let events = lock(&settle.events).clone();
        assert!(!events.is_empty());
        assert_eq!(events.len() % 2, 0);
        let mut removed_total = 0;
        for pair in events.chunks(2) {
            let BoardEvent::Removed { tokens: removed } = &pair[0] else {
                panic!("expected removal first, got {:?}", pair[0]);
            };
            let BoardEvent::Refilled { tokens: refilled } = &pair[1] else {
                panic!("expected refill second, got {:?}", pair[1]);
            };
            assert_eq!(removed.len(), refilled.len());
            removed_total += removed.len();
        }
        assert_eq!(removed_total, cleared);
        assert!(board.find_matches().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_waits_for_removal_to_settle() {
        let settle = FixedDelay::new(Duration::from_millis(300), Duration::from_millis(100));
        let board = GemBoard::with_rng(4, 4, SessionRng::new(3), settle).unwrap();
        #[rustfmt::skip]
        let _rows = seed_rows(&board, &[
            "AAAB",
            "BCDC",
            "CDCD",
            "DCDB",
        ]);

        let handle = board.tick();
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(board.is_cycling());
        assert_eq!(board.snapshot().empty_count(), 3);
        assert_consistent(&board);

        assert!(handle.await >= 3);
        assert_eq!(board.snapshot().empty_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fill_and_place_at_wait_for_the_cycle() {
        let settle = FixedDelay::new(Duration::from_millis(300), Duration::from_millis(100));
        let board = GemBoard::with_rng(4, 4, SessionRng::new(3), settle).unwrap();
        #[rustfmt::skip]
        let _rows = seed_rows(&board, &[
            "AAAB",
            "BCDC",
            "CDCD",
            "DCDB",
        ]);
        let spare = board.create_token(Color::new(1)).unwrap();

        let handle = board.tick();
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(board.is_cycling());
        let during_removal = board.snapshot();
        assert_eq!(during_removal.empty_count(), 3);
        assert_eq!(board.fill(true), 0);
        assert_eq!(board.place_at(Position::new(0, 0), Some(spare)), Ok(None));
        assert_eq!(board.place_at(Position::new(3, 0), None), Ok(None));
        assert_eq!(board.snapshot(), during_removal);
        assert_consistent(&board);

        handle.await;
        let events = board.take_events();
        let BoardEvent::Refilled { tokens } = &events[1] else {
            panic!("expected the cycle's own refill, got {:?}", events[1]);
        };
        assert_eq!(tokens.len(), 3);
        assert_eq!(board.position_of(&spare), None);
        assert_eq!(board.snapshot().empty_count(), 0);
    }

    #[derive(Clone)]
    struct PanickingSettle;

    impl Settle for PanickingSettle {
        async fn settle(&self, event: &BoardEvent) {
            if let BoardEvent::Removed { .. } = event {
                panic!("settle hook failed");
            }
        }
    }

    #[tokio::test]
    async fn test_panicking_settle_releases_the_gate() {
        let board = GemBoard::with_rng(4, 4, SessionRng::new(11), PanickingSettle).unwrap();
        seed_rows(&board, &["AAA.", "....", "....", "...."]);

        let joined = tokio::spawn(board.tick()).await;

        assert!(joined.is_err());
        assert!(!board.is_cycling());
        assert_eq!(board.tick().await, 0);
        assert!(!board.is_cycling());
    }

    #[tokio::test]
    async fn test_destroy_drains_every_token() {
        let board = test_board(4);
        board.configure(4).unwrap();
        board.take_events();

        let handle = board.destroy().expect("idle board accepts destroy");
        assert!(board.is_cycling());
        assert_eq!(handle.await, 16);

        assert_eq!(board.occupied_count(), 0);
        assert!(!board.is_cycling());
        let events = board.take_events();
        assert!(matches!(&events[..], [BoardEvent::Cleared { tokens }] if tokens.len() == 16));
        assert_consistent(&board);
    }

    #[tokio::test]
    async fn test_cascades_reach_fixpoint() {
        for seed in 0..20u64 {
            let board = GemBoard::with_rng(6, 3, SessionRng::new(seed), Immediate).unwrap();
            board.configure(6).unwrap();
            board.tick().await;
            let mut rng = SessionRng::new(seed ^ 0xA5A5);

            for _ in 0..10 {
                let pos = Position::new(rng.random_range(0..6), rng.random_range(0..6));
                let direction = Direction::ALL[rng.random_range(0..4)];
                let token = board.get(pos).unwrap();

                board.move_token(token, direction);
                board.tick().await;

                assert!(board.find_matches().is_empty(), "seed {}", seed);
                assert_eq!(board.occupied_count(), 36, "seed {}", seed);
                assert_consistent(&board);
            }
        }
    }
}
