//! Connect6 rules on top of the scored board.
//!
//! Black opens with a single stone; afterwards each turn places two. The
//! first player to get six (or more) in a row wins.
//!
//! Candidate moves pair up the best scoring cells and are valued by greedy
//! rollouts: both sides repeatedly take the highest scoring cell until
//! someone completes six, the board goes dead, or a step budget runs out.
//! Rollouts play on the shared board and remove their stones afterwards.

use std::fmt;
use std::str::FromStr;

use log::trace;

use crate::board::{Board, Color, Place, Score, Scoreable, cell_str, parse_cell};
use crate::constants::{EXP_FACTOR, MAX_MOVES, MAX_PLACES, ROLLOUT_STEP_LIMIT, STONES_PER_MOVE};
use crate::error::MoveFormatError;
use crate::heap::BoundedHeap;
use crate::tree::{Game, MoveValue, PlayableMove};
use crate::value::Value;

/// One turn: two cells, or a single cell when only one stone is placed.
///
/// The cells are stored in canonical order (smallest `(x, y)` first) so that
/// a move and its mirror compare equal.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Move {
    x1: u8,
    y1: u8,
    x2: u8,
    y2: u8,
}

impl Move {
    pub fn new(x1: usize, y1: usize, x2: usize, y2: usize) -> Self {
        let (a, b) = if (x2, y2) < (x1, y1) {
            ((x2, y2), (x1, y1))
        } else {
            ((x1, y1), (x2, y2))
        };
        Self {
            x1: a.0 as u8,
            y1: a.1 as u8,
            x2: b.0 as u8,
            y2: b.1 as u8,
        }
    }

    /// A single stone.
    pub fn single(x: usize, y: usize) -> Self {
        Self::new(x, y, x, y)
    }

    #[inline]
    pub fn first(&self) -> (usize, usize) {
        (self.x1 as usize, self.y1 as usize)
    }

    #[inline]
    pub fn second(&self) -> (usize, usize) {
        (self.x2 as usize, self.y2 as usize)
    }

    #[inline]
    pub fn is_single(&self) -> bool {
        self.first() == self.second()
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (x1, y1) = self.first();
        if self.is_single() {
            return f.write_str(&cell_str(x1, y1));
        }
        let (x2, y2) = self.second();
        write!(f, "{}-{}", cell_str(x1, y1), cell_str(x2, y2))
    }
}

/// Parses `j10-k11`, `j10+k11` or a single cell `j10`.
impl FromStr for Move {
    type Err = MoveFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut cells = s.split(['-', '+']);
        let first = cells.next().unwrap_or_default();
        let second = cells.next();
        if cells.next().is_some() {
            return Err(MoveFormatError::new(s, "more than two cells"));
        }

        let cell = |text: &str| parse_cell(text).map_err(|e| MoveFormatError::new(s, e.reason));
        let (x1, y1) = cell(first)?;
        let (x2, y2) = match second {
            Some(text) => cell(text)?,
            None => (x1, y1),
        };
        Ok(Move::new(x1, y1, x2, y2))
    }
}

impl PlayableMove for Move {}

/// Candidate pair ranked by combined static score.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Candidate {
    score: Score,
    mv: Move,
}

/// A game in progress.
pub struct Connect6<B = Board> {
    board: B,
    turn: Color,
    moves_played: usize,
    winner: Option<Color>,
    exp_factor: f64,
    rng: fastrand::Rng,
    places: BoundedHeap<Place>,
    candidates: BoundedHeap<Candidate>,
}

impl Default for Connect6<Board> {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_SEED)
    }
}

impl Connect6<Board> {
    /// A new game on an empty board. `seed` drives rollout tie-breaking.
    pub fn new(seed: u64) -> Self {
        Self::from_position(Board::new(), Color::Black, 0, seed)
    }
}

impl<B: Scoreable> Connect6<B> {
    /// A game continuing from an arbitrary board.
    pub fn from_position(board: B, turn: Color, moves_played: usize, seed: u64) -> Self {
        Self {
            board,
            turn,
            moves_played,
            winner: None,
            exp_factor: EXP_FACTOR,
            rng: fastrand::Rng::with_seed(seed),
            places: BoundedHeap::new(MAX_PLACES),
            candidates: BoundedHeap::new(MAX_MOVES),
        }
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    /// Side to move.
    pub fn turn(&self) -> Color {
        self.turn
    }

    pub fn moves_played(&self) -> usize {
        self.moves_played
    }

    /// Stones the side to move places this turn.
    pub fn stones_this_turn(&self) -> usize {
        if self.moves_played == 0 { 1 } else { STONES_PER_MOVE }
    }

    /// The side that completed six in a row with the last move.
    pub fn winner(&self) -> Option<Color> {
        self.winner
    }

    pub fn set_exp_factor(&mut self, exp_factor: f64) {
        self.exp_factor = exp_factor;
    }

    /// Whether the game has ended: six in a row, or no empty cell can still
    /// become part of one.
    pub fn is_over(&self) -> bool {
        if self.winner.is_some() {
            return true;
        }
        let mut best = BoundedHeap::new(1);
        self.board.top_places(&mut best);
        best.peek_min().is_none_or(|p| p.score == 0)
    }

    /// Play the game out greedily from the current board with `turn` to
    /// place `stones_per_move` stones, then alternating.
    ///
    /// Returns 1 if `turn` wins, -1 if the opponent wins and 0 for a draw,
    /// a full board, or hitting [`ROLLOUT_STEP_LIMIT`]. The board is left
    /// as it was.
    pub fn rollout(&mut self, turn: Color, stones_per_move: usize) -> f64 {
        let stones_per_move = stones_per_move.max(1);
        let mut placed = Vec::new();
        let mut current = turn;
        let mut left = stones_per_move;

        let result = loop {
            if placed.len() >= ROLLOUT_STEP_LIMIT {
                break 0.0;
            }
            let Some((place, win)) = self.board.best_place(current, &mut self.rng) else {
                break 0.0;
            };
            if win {
                break if current == turn { 1.0 } else { -1.0 };
            }
            if place.score == 0 {
                break 0.0;
            }
            self.board.place_stone(current, place.x, place.y);
            placed.push((place.x, place.y));
            left -= 1;
            if left == 0 {
                current = current.opponent();
                left = stones_per_move;
            }
        };

        for &(x, y) in placed.iter().rev() {
            self.board.remove_stone(x, y);
        }
        trace!("rollout for {turn}: {result} after {} stones", placed.len());
        result
    }

    /// Best places, highest score first.
    fn ranked_places(&mut self) -> Vec<Place> {
        self.board.top_places(&mut self.places);
        let mut places: Vec<Place> = self.places.iter().copied().collect();
        places.sort_by(|a, b| b.cmp(a));
        places
    }

    /// Candidate moves by combined static score, highest first.
    fn ranked_candidates(&mut self, places: &[Place]) -> Vec<Move> {
        self.candidates.clear();
        if self.stones_this_turn() == 1 {
            for p in places.iter().filter(|p| p.score != 0) {
                self.candidates.add(Candidate {
                    score: p.score,
                    mv: Move::single(p.x, p.y),
                });
            }
        } else {
            for (i, a) in places.iter().enumerate() {
                // Two dead cells make a dead move; those collapse into the draw move.
                if a.score == 0 {
                    continue;
                }
                for b in &places[i + 1..] {
                    self.candidates.add(Candidate {
                        score: a.score + b.score,
                        mv: Move::new(a.x, a.y, b.x, b.y),
                    });
                }
            }
            // Only one live cell left on the board.
            if self.candidates.is_empty() {
                if let Some(a) = places.iter().find(|p| p.score != 0) {
                    self.candidates.add(Candidate {
                        score: a.score,
                        mv: Move::single(a.x, a.y),
                    });
                }
            }
        }

        let mut ranked: Vec<Candidate> = self.candidates.iter().copied().collect();
        ranked.sort_by(|a, b| b.cmp(a));
        ranked.into_iter().map(|c| c.mv).collect()
    }
}

impl<B: Scoreable> Game for Connect6<B> {
    type Move = Move;

    /// Candidates from the current position, each valued for the side to
    /// move after it.
    ///
    /// A move that wins on the spot is returned alone, valued as a loss for
    /// the opponent. When no live cell is left a single draw move is
    /// returned.
    fn top_moves(&mut self, moves: &mut Vec<MoveValue<Move>>) {
        moves.clear();
        let turn = self.turn;

        if let Some((p, true)) = self.board.best_place(turn, &mut self.rng) {
            moves.push(MoveValue {
                mv: Move::single(p.x, p.y),
                value: Value::LOSS,
            });
            return;
        }

        let places = self.ranked_places();
        for mv in self.ranked_candidates(&places) {
            let won = self.play_move(mv);
            let value = if won {
                Value::LOSS
            } else {
                Value::Estimate(self.rollout(self.turn, STONES_PER_MOVE))
            };
            self.undo_move(mv);
            if won {
                moves.clear();
                moves.push(MoveValue { mv, value });
                return;
            }
            moves.push(MoveValue { mv, value });
        }

        if moves.is_empty() {
            let mut dead = places.iter().filter(|p| p.score == 0);
            let mv = match (dead.next(), dead.next()) {
                (Some(a), Some(b)) => Move::new(a.x, a.y, b.x, b.y),
                (Some(a), None) => Move::single(a.x, a.y),
                _ => Move::default(),
            };
            moves.push(MoveValue {
                mv,
                value: Value::DRAW,
            });
        }
    }

    fn play_move(&mut self, mv: Move) -> bool {
        let (x1, y1) = mv.first();
        let mut won = self.board.place_stone(self.turn, x1, y1);
        if !mv.is_single() {
            let (x2, y2) = mv.second();
            won |= self.board.place_stone(self.turn, x2, y2);
        }
        if won {
            self.winner = Some(self.turn);
        }
        self.turn = self.turn.opponent();
        self.moves_played += 1;
        won
    }

    fn undo_move(&mut self, mv: Move) {
        self.turn = self.turn.opponent();
        self.moves_played -= 1;
        self.winner = None;
        if !mv.is_single() {
            let (x2, y2) = mv.second();
            self.board.remove_stone(x2, y2);
        }
        let (x1, y1) = mv.first();
        self.board.remove_stone(x1, y1);
    }

    fn exp_factor(&self) -> f64 {
        self.exp_factor
    }
}

impl<B: Scoreable + fmt::Display> fmt::Display for Connect6<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.board)?;
        writeln!(f, "move {}, {} to play", self.moves_played + 1, self.turn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SIZE;

    const C: usize = SIZE / 2;

    fn midgame(black: &[(usize, usize)], white: &[(usize, usize)], turn: Color) -> Connect6 {
        let mut board = Board::new();
        for &(x, y) in black {
            board.place_stone(Color::Black, x, y);
        }
        for &(x, y) in white {
            board.place_stone(Color::White, x, y);
        }
        Connect6::from_position(board, turn, 3, 1)
    }

    #[test]
    fn test_move_is_unordered() {
        assert_eq!(Move::new(3, 4, 1, 2), Move::new(1, 2, 3, 4));
        assert_eq!(Move::new(3, 4, 1, 2).first(), (1, 2));
        assert!(Move::single(5, 5).is_single());
        assert!(!Move::new(5, 5, 5, 6).is_single());
    }

    #[test]
    fn test_move_notation() {
        let mv: Move = "j10-k11".parse().unwrap();
        assert_eq!(mv, "k11+j10".parse().unwrap());
        assert_eq!(mv, Move::new(9, SIZE - 10, 10, SIZE - 11));
        assert_eq!(mv.to_string(), "j10-k11");

        let single: Move = "j10".parse().unwrap();
        assert!(single.is_single());
        assert_eq!(single.to_string(), "j10");
        assert_eq!("j10-j10".parse::<Move>().unwrap(), single);
    }

    #[test]
    fn test_move_notation_errors() {
        for bad in ["", "j10-", "-j10", "j10-k11-l12", "z1", "j", "j10k11", "j0"] {
            let err = bad.parse::<Move>().unwrap_err();
            assert_eq!(err.text, bad);
        }
    }

    #[test]
    fn test_play_and_undo_restore_position() {
        let mut game = Connect6::new(7);
        let before = game.board().clone();
        let opening = Move::single(C, C);
        game.play_move(opening);
        assert_eq!(game.turn(), Color::White);
        assert_eq!(game.stones_this_turn(), 2);

        let reply = Move::new(C - 1, C - 1, C + 1, C - 1);
        game.play_move(reply);
        assert_eq!(game.board().stone(C + 1, C - 1), Some(Color::White));

        game.undo_move(reply);
        game.undo_move(opening);
        assert!(*game.board() == before);
        assert_eq!(game.turn(), Color::Black);
        assert_eq!(game.moves_played(), 0);
    }

    #[test]
    fn test_opening_candidates_are_single_stones() {
        let mut game = Connect6::new(7);
        let before = game.board().clone();
        let mut moves = Vec::new();
        game.top_moves(&mut moves);
        assert_eq!(moves.len(), MAX_PLACES);
        assert!(moves.iter().all(|m| m.mv.is_single()));
        assert!(moves.iter().all(|m| !m.value.is_decided()));
        assert!(*game.board() == before);
    }

    #[test]
    fn test_candidates_are_pairs_and_leave_board_alone() {
        let mut game = midgame(&[(C, C), (C + 1, C + 1)], &[(C - 1, C), (C, C - 1)], Color::Black);
        let before = game.board().clone();
        let mut moves = Vec::new();
        game.top_moves(&mut moves);
        assert_eq!(moves.len(), MAX_MOVES);
        assert!(moves.iter().all(|m| !m.mv.is_single()));
        for m in &moves {
            let Value::Estimate(v) = m.value else {
                panic!("unexpected decided value for {}", m.mv);
            };
            assert!((-1.0..=1.0).contains(&v));
        }
        assert!(*game.board() == before);
        assert_eq!(game.turn(), Color::Black);
    }

    #[test]
    fn test_single_stone_win_is_only_candidate() {
        let black: Vec<_> = (C - 2..C + 3).map(|x| (x, C)).collect();
        let mut game = midgame(&black, &[(0, 0)], Color::Black);
        let mut moves = Vec::new();
        game.top_moves(&mut moves);
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].value, Value::LOSS);
        assert!(moves[0].mv.is_single());
        assert!(game.play_move(moves[0].mv));
        assert_eq!(game.winner(), Some(Color::Black));
        assert!(game.is_over());
    }

    #[test]
    fn test_two_stone_win_is_found() {
        let black: Vec<_> = (C - 2..C + 2).map(|x| (x, C)).collect();
        let mut game = midgame(&black, &[(0, 0), (SIZE - 1, SIZE - 1)], Color::Black);
        let mut moves = Vec::new();
        game.top_moves(&mut moves);
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].mv, Move::new(C - 3, C, C + 2, C));
        assert_eq!(moves[0].value, Value::LOSS);
    }

    #[test]
    fn test_rollout_restores_board() {
        let mut game = midgame(&[(C, C), (C + 1, C)], &[(C, C + 1), (C + 1, C + 1)], Color::Black);
        let before = game.board().clone();
        for _ in 0..4 {
            let result = game.rollout(Color::Black, 2);
            assert!([-1.0, 0.0, 1.0].contains(&result));
            assert!(*game.board() == before);
        }
    }

    #[test]
    fn test_rollout_takes_open_win() {
        let black: Vec<_> = (C - 2..C + 3).map(|x| (x, C)).collect();
        let mut game = midgame(&black, &[], Color::Black);
        assert_eq!(game.rollout(Color::Black, 2), 1.0);
    }

    #[test]
    fn test_rollout_loses_to_unstoppable_threat() {
        // Two separate open fives: White can block only two of the four ends
        // and Black completes six on the following turn.
        let mut black: Vec<_> = (C - 2..C + 3).map(|x| (x, C - 3)).collect();
        black.extend((C - 2..C + 3).map(|x| (x, C + 3)));
        let mut game = midgame(&black, &[], Color::White);
        assert_eq!(game.rollout(Color::White, 2), -1.0);
    }

    /// Board where every empty cell is already dead.
    #[derive(Clone)]
    struct DeadBoard {
        empty: Vec<(usize, usize)>,
    }

    impl Scoreable for DeadBoard {
        fn place_stone(&mut self, _: Color, x: usize, y: usize) -> bool {
            self.empty.retain(|&c| c != (x, y));
            false
        }

        fn remove_stone(&mut self, x: usize, y: usize) -> Color {
            self.empty.push((x, y));
            Color::Black
        }

        fn stone(&self, x: usize, y: usize) -> Option<Color> {
            (!self.empty.contains(&(x, y))).then_some(Color::Black)
        }

        fn score(&self, _: usize, _: usize) -> Score {
            0
        }

        fn is_winning(&self, _: Color, _: usize, _: usize) -> bool {
            false
        }

        fn top_places(&self, places: &mut BoundedHeap<Place>) {
            places.clear();
            for &(x, y) in &self.empty {
                places.add(Place { x, y, score: 0 });
            }
        }

        fn best_place(&self, _: Color, _: &mut fastrand::Rng) -> Option<(Place, bool)> {
            self.empty.first().map(|&(x, y)| (Place { x, y, score: 0 }, false))
        }
    }

    #[test]
    fn test_dead_board_yields_single_draw_move() {
        let board = DeadBoard {
            empty: vec![(1, 1), (2, 2), (3, 3)],
        };
        let mut game = Connect6::from_position(board, Color::White, 10, 1);
        assert!(game.is_over());
        let mut moves = Vec::new();
        game.top_moves(&mut moves);
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].value, Value::DRAW);
        assert_eq!(moves[0].mv, Move::new(1, 1, 2, 2));
        assert_eq!(game.rollout(Color::White, 2), 0.0);
    }

    #[test]
    fn test_full_board_draw_move() {
        let mut game = Connect6::from_position(DeadBoard { empty: vec![] }, Color::Black, 10, 1);
        let mut moves = Vec::new();
        game.top_moves(&mut moves);
        assert_eq!(moves, vec![MoveValue { mv: Move::default(), value: Value::DRAW }]);
    }
}
