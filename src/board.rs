//! Incrementally scored Connect6 board.
//!
//! Every cell carries the sum, over all six-cell windows through it in the
//! four line directions, of a window value that depends on how many stones
//! of each color the window holds (see [`LINE_VALUES`]). Placing or removing
//! a stone only touches the windows through that stone, at most six per
//! direction, so an update costs O(line length) instead of O(board).
//!
//! Alongside the scores the board counts, per cell, the windows holding five
//! stones of one color and nothing else. An empty cell in such a window wins
//! for that color, which makes win detection a constant-time lookup.

use std::fmt;

use crate::constants::{LINE_VALUES, MAX_STONES, SIZE, WIN_SCORE};
use crate::error::{InvariantViolation, MoveFormatError};
use crate::heap::BoundedHeap;

pub type Score = i32;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Color {
    /// Moves first.
    Black,
    White,
}

impl Color {
    #[inline]
    pub fn opponent(self) -> Color {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
        }
    }

    #[inline]
    fn index(self) -> usize {
        match self {
            Color::Black => 0,
            Color::White => 1,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Black => f.write_str("Black"),
            Color::White => f.write_str("White"),
        }
    }
}

/// An empty cell and its score at the time it was scanned.
///
/// Ordered by score; ties prefer the cell scanned first (lower `y`, then
/// lower `x`) so that the order is total.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Place {
    pub x: usize,
    pub y: usize,
    pub score: Score,
}

impl Ord for Place {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.score
            .cmp(&other.score)
            .then_with(|| other.y.cmp(&self.y))
            .then_with(|| other.x.cmp(&self.x))
    }
}

impl PartialOrd for Place {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Board operations the move generator relies on.
pub trait Scoreable: Clone {
    /// Place a stone on an empty cell. Returns `true` if it completes six in a row.
    fn place_stone(&mut self, color: Color, x: usize, y: usize) -> bool;

    /// Remove a stone, exactly undoing its placement. Returns its color.
    fn remove_stone(&mut self, x: usize, y: usize) -> Color;

    fn stone(&self, x: usize, y: usize) -> Option<Color>;

    fn score(&self, x: usize, y: usize) -> Score;

    /// Whether placing `color` on the empty cell completes six in a row.
    fn is_winning(&self, color: Color, x: usize, y: usize) -> bool;

    /// Feed every empty cell into `places`, which keeps the best of them.
    fn top_places(&self, places: &mut BoundedHeap<Place>);

    /// The highest scoring empty cell and whether it wins for `turn`.
    fn best_place(&self, turn: Color, rng: &mut fastrand::Rng) -> Option<(Place, bool)>;
}

/// Line directions: horizontal, vertical, diagonal, anti-diagonal.
const DIRECTIONS: [(isize, isize); 4] = [(1, 0), (0, 1), (1, 1), (1, -1)];

/// Stone counts of one window.
#[derive(Copy, Clone, Default, Debug)]
struct Occupancy {
    black: u8,
    white: u8,
}

impl Occupancy {
    #[inline]
    fn add(&mut self, stone: Option<Color>) {
        match stone {
            Some(Color::Black) => self.black += 1,
            Some(Color::White) => self.white += 1,
            None => {}
        }
    }

    #[inline]
    fn remove(&mut self, stone: Option<Color>) {
        match stone {
            Some(Color::Black) => self.black -= 1,
            Some(Color::White) => self.white -= 1,
            None => {}
        }
    }

    #[inline]
    fn with(mut self, color: Color) -> Self {
        self.add(Some(color));
        self
    }

    #[inline]
    fn count(self, color: Color) -> usize {
        match color {
            Color::Black => self.black as usize,
            Color::White => self.white as usize,
        }
    }

    #[inline]
    fn value(self) -> Score {
        if self.black > 0 && self.white > 0 {
            0
        } else {
            LINE_VALUES[(self.black + self.white) as usize]
        }
    }

    /// The color owning an open five, if any.
    #[inline]
    fn five(self) -> Option<Color> {
        match (self.black as usize, self.white as usize) {
            (5, 0) => Some(Color::Black),
            (0, 5) => Some(Color::White),
            _ => None,
        }
    }
}

/// Cells a line through `(x, y)` can extend in direction `(dx, dy)`,
/// capped at one window length.
#[inline]
fn reach(x: usize, y: usize, dx: isize, dy: isize) -> usize {
    let limit = |p: usize, d: isize| match d {
        0 => MAX_STONES - 1,
        d if d > 0 => SIZE - 1 - p,
        _ => p,
    };
    limit(x, dx).min(limit(y, dy)).min(MAX_STONES - 1)
}

/// The cells around `(x, y)` in one direction that can hold a window
/// containing `(x, y)`.
#[derive(Copy, Clone)]
struct Segment {
    x: isize,
    y: isize,
    dx: isize,
    dy: isize,
    /// Number of windows in the segment.
    windows: usize,
}

impl Segment {
    fn new(x: usize, y: usize, dx: isize, dy: isize) -> Self {
        let back = reach(x, y, -dx, -dy);
        let fwd = reach(x, y, dx, dy);
        Self {
            x: x as isize - back as isize * dx,
            y: y as isize - back as isize * dy,
            dx,
            dy,
            windows: (back + fwd + 2).saturating_sub(MAX_STONES),
        }
    }

    #[inline]
    fn at(&self, i: usize) -> (usize, usize) {
        let i = i as isize;
        ((self.x + i * self.dx) as usize, (self.y + i * self.dy) as usize)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Board {
    stones: [[Option<Color>; SIZE]; SIZE],
    scores: [[Score; SIZE]; SIZE],
    fives: [[[i8; 2]; SIZE]; SIZE],
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// An empty board with every cell scored.
    pub fn new() -> Self {
        let mut board = Self {
            stones: [[None; SIZE]; SIZE],
            scores: [[0; SIZE]; SIZE],
            fives: [[[0; 2]; SIZE]; SIZE],
        };
        for y in 0..SIZE {
            for x in 0..SIZE {
                board.scores[y][x] = board.rescore(x, y);
            }
        }
        board
    }

    /// Whether the cell decides the game: someone wins by playing it.
    #[inline]
    pub fn is_decisive(&self, x: usize, y: usize) -> bool {
        self.scores[y][x] >= WIN_SCORE
    }

    pub fn empty_count(&self) -> usize {
        self.stones.iter().flatten().filter(|s| s.is_none()).count()
    }

    pub fn is_full(&self) -> bool {
        self.stones.iter().flatten().all(|s| s.is_some())
    }

    /// Score of a cell recomputed from scratch.
    pub fn rescore(&self, x: usize, y: usize) -> Score {
        DIRECTIONS
            .iter()
            .map(|&(dx, dy)| {
                let seg = Segment::new(x, y, dx, dy);
                (0..seg.windows)
                    .map(|w| {
                        let mut occ = Occupancy::default();
                        for j in 0..MAX_STONES {
                            let (cx, cy) = seg.at(w + j);
                            occ.add(self.stones[cy][cx]);
                        }
                        occ.value()
                    })
                    .sum::<Score>()
            })
            .sum()
    }

    /// Compare every maintained score against a full rescan.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        for y in 0..SIZE {
            for x in 0..SIZE {
                let expected = self.rescore(x, y);
                if self.scores[y][x] != expected {
                    return Err(InvariantViolation {
                        x,
                        y,
                        expected,
                        actual: self.scores[y][x],
                    });
                }
            }
        }
        Ok(())
    }

    #[cfg(feature = "validate")]
    fn validate(&self) {
        if let Err(violation) = self.check_invariants() {
            log::error!("{violation}\n{self:?}");
            panic!("{violation}");
        }
    }

    /// Apply the change caused by `color` appearing (`sign` = 1) or
    /// disappearing (`sign` = -1) at the empty cell `(x, y)` to every window
    /// through it in one direction. Returns whether a window became six of
    /// `color`.
    fn update_line(&mut self, color: Color, x: usize, y: usize, dir: (isize, isize), sign: i8) -> bool {
        let seg = Segment::new(x, y, dir.0, dir.1);
        if seg.windows == 0 {
            return false;
        }

        let mut occ = Occupancy::default();
        for i in 0..MAX_STONES - 1 {
            let (cx, cy) = seg.at(i);
            occ.add(self.stones[cy][cx]);
        }

        let mut won = false;
        for w in 0..seg.windows {
            let (lx, ly) = seg.at(w + MAX_STONES - 1);
            occ.add(self.stones[ly][lx]);

            let after = occ.with(color);
            let delta = (after.value() - occ.value()) * Score::from(sign);
            let five_before = occ.five();
            let five_after = after.five();
            won |= after.count(color) == MAX_STONES;

            if delta != 0 || five_before != five_after {
                for j in 0..MAX_STONES {
                    let (cx, cy) = seg.at(w + j);
                    self.scores[cy][cx] += delta;
                    if let Some(c) = five_before {
                        self.fives[cy][cx][c.index()] -= sign;
                    }
                    if let Some(c) = five_after {
                        self.fives[cy][cx][c.index()] += sign;
                    }
                }
            }

            let (tx, ty) = seg.at(w);
            occ.remove(self.stones[ty][tx]);
        }
        won
    }

    fn write_header(f: &mut fmt::Formatter<'_>, width: usize) -> fmt::Result {
        write!(f, "   ")?;
        for x in 0..SIZE {
            write!(f, "{:>width$}", (b'a' + x as u8) as char)?;
        }
        writeln!(f)
    }

    fn write_scores(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Self::write_header(f, 6)?;
        for y in 0..SIZE {
            write!(f, "{:>2} ", SIZE - y)?;
            for x in 0..SIZE {
                match self.stones[y][x] {
                    Some(Color::Black) => write!(f, "{:>6}", "X")?,
                    Some(Color::White) => write!(f, "{:>6}", "O")?,
                    None if self.is_winning(Color::Black, x, y) => write!(f, "{:>6}", "(B)")?,
                    None if self.is_winning(Color::White, x, y) => write!(f, "{:>6}", "(W)")?,
                    None if self.scores[y][x] == 0 => write!(f, "{:>6}", "(D)")?,
                    None => write!(f, "{:>6}", self.scores[y][x])?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl Scoreable for Board {
    fn place_stone(&mut self, color: Color, x: usize, y: usize) -> bool {
        assert!(
            x < SIZE && y < SIZE && self.stones[y][x].is_none(),
            "place_stone: ({x}, {y}) is off the board or occupied"
        );
        let mut won = false;
        for dir in DIRECTIONS {
            won |= self.update_line(color, x, y, dir, 1);
        }
        self.stones[y][x] = Some(color);
        #[cfg(feature = "validate")]
        self.validate();
        won
    }

    fn remove_stone(&mut self, x: usize, y: usize) -> Color {
        let Some(color) = self.stones[y][x].take() else {
            panic!("remove_stone: ({x}, {y}) is empty");
        };
        for dir in DIRECTIONS.into_iter().rev() {
            self.update_line(color, x, y, dir, -1);
        }
        #[cfg(feature = "validate")]
        self.validate();
        color
    }

    #[inline]
    fn stone(&self, x: usize, y: usize) -> Option<Color> {
        self.stones[y][x]
    }

    #[inline]
    fn score(&self, x: usize, y: usize) -> Score {
        self.scores[y][x]
    }

    #[inline]
    fn is_winning(&self, color: Color, x: usize, y: usize) -> bool {
        self.stones[y][x].is_none() && self.fives[y][x][color.index()] > 0
    }

    fn top_places(&self, places: &mut BoundedHeap<Place>) {
        places.clear();
        for y in 0..SIZE {
            for x in 0..SIZE {
                if self.stones[y][x].is_none() {
                    places.add(Place {
                        x,
                        y,
                        score: self.scores[y][x],
                    });
                }
            }
        }
    }

    fn best_place(&self, turn: Color, rng: &mut fastrand::Rng) -> Option<(Place, bool)> {
        let mut best: Option<Place> = None;
        let mut ties = 1;
        for y in 0..SIZE {
            for x in 0..SIZE {
                if self.stones[y][x].is_some() {
                    continue;
                }
                let place = Place {
                    x,
                    y,
                    score: self.scores[y][x],
                };
                if self.fives[y][x][turn.index()] > 0 {
                    return Some((place, true));
                }
                match best {
                    Some(b) if place.score < b.score => {}
                    Some(b) if place.score == b.score => {
                        // Reservoir sampling over equal scores.
                        ties += 1;
                        if rng.u32(0..ties) == 0 {
                            best = Some(place);
                        }
                    }
                    _ => {
                        best = Some(place);
                        ties = 1;
                    }
                }
            }
        }
        best.map(|place| (place, false))
    }
}

/// Parse a cell such as `j10` into board coordinates.
pub fn parse_cell(text: &str) -> Result<(usize, usize), MoveFormatError> {
    let bytes = text.as_bytes();
    let Some((&file, rank)) = bytes.split_first() else {
        return Err(MoveFormatError::new(text, "empty cell"));
    };
    if !(b'a'..b'a' + SIZE as u8).contains(&file) {
        return Err(MoveFormatError::new(text, "file letter out of range"));
    }
    if rank.is_empty() {
        return Err(MoveFormatError::new(text, "missing rank"));
    }
    if rank.len() > 2 || !rank.iter().all(u8::is_ascii_digit) {
        return Err(MoveFormatError::new(text, "rank must be one or two digits"));
    }
    let rank = rank.iter().fold(0, |acc, &b| acc * 10 + (b - b'0') as usize);
    if rank == 0 || rank > SIZE {
        return Err(MoveFormatError::new(text, "rank off the board"));
    }
    Ok(((file - b'a') as usize, SIZE - rank))
}

/// Format board coordinates as a cell such as `j10`.
pub fn cell_str(x: usize, y: usize) -> String {
    format!("{}{}", (b'a' + x as u8) as char, SIZE - y)
}

/// Plain form draws the stones; the alternate form (`{:#}`) adds the score
/// grid.
impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Self::write_header(f, 2)?;
        for y in 0..SIZE {
            write!(f, "{:>2} ", SIZE - y)?;
            for x in 0..SIZE {
                let ch = match self.stones[y][x] {
                    Some(Color::Black) => 'X',
                    Some(Color::White) => 'O',
                    None => '.',
                };
                write!(f, " {ch}")?;
            }
            writeln!(f, " {:>2}", SIZE - y)?;
        }
        Self::write_header(f, 2)?;
        if f.alternate() {
            writeln!(f)?;
            self.write_scores(f)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:#}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const C: usize = SIZE / 2;

    fn random_fill(board: &mut Board, rng: &mut fastrand::Rng, attempts: usize) -> Vec<(usize, usize)> {
        let mut placed = Vec::new();
        for _ in 0..attempts {
            let x = rng.usize(0..SIZE);
            let y = rng.usize(0..SIZE);
            if board.stone(x, y).is_some() {
                continue;
            }
            let color = if rng.bool() { Color::Black } else { Color::White };
            board.place_stone(color, x, y);
            placed.push((x, y));
        }
        placed
    }

    #[test]
    fn test_empty_board_scores() {
        let board = Board::new();
        // Corner: one horizontal, one vertical, one diagonal window.
        assert_eq!(board.score(0, 0), 3);
        // Edge middle: six horizontal windows, one vertical, one per diagonal.
        assert_eq!(board.score(C, 0), 9);
        // Far from every edge: six windows in each direction.
        assert_eq!(board.score(C, C), 24);
        assert_eq!(board.empty_count(), SIZE * SIZE);
        assert!(!board.is_full());
        assert!(board.check_invariants().is_ok());
    }

    #[test]
    fn test_place_updates_neighbours() {
        let mut board = Board::new();
        board.place_stone(Color::Black, C, C);
        // Each of the six horizontal windows through (C+1, C) except the one
        // starting at C+1 now holds one stone: 5 windows * (6 - 1).
        assert_eq!(board.score(C + 1, C), 24 + 5 * 5);
        assert!(board.check_invariants().is_ok());

        board.place_stone(Color::White, C + 2, C);
        assert!(board.check_invariants().is_ok());
    }

    #[test]
    fn test_six_in_a_row_wins_in_every_direction() {
        for (dx, dy) in DIRECTIONS {
            let mut board = Board::new();
            let start_y = if dy < 0 { C + 3 } else { C - 3 };
            let cell = |i: usize| {
                (
                    (C as isize - 3 + dx * i as isize) as usize,
                    (start_y as isize + dy * i as isize) as usize,
                )
            };
            for i in 0..5 {
                let (x, y) = cell(i);
                assert!(!board.place_stone(Color::White, x, y));
            }
            let (x, y) = cell(5);
            assert!(board.is_winning(Color::White, x, y));
            assert!(!board.is_winning(Color::Black, x, y));
            assert!(board.place_stone(Color::White, x, y), "direction ({dx}, {dy})");
        }
    }

    #[test]
    fn test_open_five_is_decisive_but_not_a_win() {
        let mut board = Board::new();
        for x in 3..8 {
            assert!(!board.place_stone(Color::Black, x, C));
        }
        assert!(board.is_decisive(2, C));
        assert!(board.is_decisive(8, C));
        assert!(board.score(2, C) >= WIN_SCORE);
        assert!(board.is_winning(Color::Black, 2, C));
        assert!(board.is_winning(Color::Black, 8, C));
        assert!(!board.is_decisive(2, C + 2));
    }

    #[test]
    fn test_blocked_five_is_not_winning() {
        let mut board = Board::new();
        for x in 3..8 {
            board.place_stone(Color::Black, x, C);
        }
        board.place_stone(Color::White, 8, C);
        assert!(!board.is_winning(Color::Black, 8, C));
        assert!(board.is_winning(Color::Black, 2, C));
    }

    #[test]
    fn test_incremental_matches_rescan() {
        let mut rng = fastrand::Rng::with_seed(3);
        let mut board = Board::new();
        random_fill(&mut board, &mut rng, 300);
        assert_eq!(board.check_invariants(), Ok(()));
    }

    #[test]
    fn test_place_remove_is_exact_inverse() {
        let mut rng = fastrand::Rng::with_seed(11);
        let mut board = Board::new();
        random_fill(&mut board, &mut rng, 120);
        let snapshot = board.clone();

        let placed = random_fill(&mut board, &mut rng, 80);
        for &(x, y) in placed.iter().rev() {
            board.remove_stone(x, y);
        }
        assert!(board == snapshot);
    }

    #[test]
    fn test_remove_out_of_order_keeps_invariant() {
        let mut rng = fastrand::Rng::with_seed(5);
        let mut board = Board::new();
        let mut placed = random_fill(&mut board, &mut rng, 150);
        rng.shuffle(&mut placed);
        for &(x, y) in placed.iter().take(placed.len() / 2) {
            board.remove_stone(x, y);
        }
        assert_eq!(board.check_invariants(), Ok(()));
    }

    #[test]
    fn test_best_place_prefers_win() {
        let mut board = Board::new();
        for y in 2..7 {
            board.place_stone(Color::White, 0, y);
        }
        let mut rng = fastrand::Rng::with_seed(1);
        let (place, win) = board.best_place(Color::White, &mut rng).unwrap();
        assert!(win);
        assert_eq!(place.x, 0);
        assert!(place.y == 1 || place.y == 7);

        // Black cannot win there but must see it as the top cell.
        let (place, win) = board.best_place(Color::Black, &mut rng).unwrap();
        assert!(!win);
        assert!(place.score >= WIN_SCORE);
    }

    #[test]
    fn test_top_places_scan() {
        let board = Board::new();
        let mut places = BoundedHeap::new(4);
        board.top_places(&mut places);
        assert_eq!(places.len(), 4);
        assert!(places.iter().all(|p| p.score == 24));
    }

    #[test]
    fn test_parse_cell() {
        assert_eq!(parse_cell("a1"), Ok((0, SIZE - 1)));
        assert_eq!(parse_cell(&format!("a{SIZE}")), Ok((0, 0)));
        assert_eq!(cell_str(0, 0), format!("a{SIZE}"));
        assert_eq!(parse_cell(&cell_str(C, 3)), Ok((C, 3)));

        assert!(parse_cell("").is_err());
        assert!(parse_cell("a").is_err());
        assert!(parse_cell("z5").is_err());
        assert!(parse_cell("A5").is_err());
        assert!(parse_cell("a0").is_err());
        assert!(parse_cell("a123").is_err());
        assert!(parse_cell("a1x").is_err());
        assert!(parse_cell(&format!("a{}", SIZE + 1)).is_err());
    }

    #[test]
    fn test_display_marks_stones() {
        let mut board = Board::new();
        board.place_stone(Color::Black, 0, 0);
        board.place_stone(Color::White, 1, 0);
        let text = board.to_string();
        assert!(text.contains(" X O"));
        let detailed = format!("{board:#}");
        assert!(detailed.starts_with(&text));
        assert!(detailed.lines().count() > text.lines().count() + SIZE);
    }
}
