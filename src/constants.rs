//! Constants for board dimensions, scoring, and search parameters.
//!
//! # Board Size Configuration
//!
//! The board size is controlled by Cargo features:
//! - `board19x19` (default): 19x19 board
//! - `board15x15`: 15x15 board
//!
//! ```sh
//! cargo build                                               # 19x19 (default)
//! cargo build --no-default-features --features board15x15   # 15x15
//! ```

use crate::board::Score;

// =============================================================================
// Board Geometry
// =============================================================================

/// Board size (SIZE x SIZE).
#[cfg(feature = "board19x19")]
pub const SIZE: usize = 19;

#[cfg(feature = "board15x15")]
pub const SIZE: usize = 15;

#[cfg(all(feature = "board19x19", feature = "board15x15"))]
compile_error!("Cannot enable both 'board19x19' and 'board15x15' features at the same time");

#[cfg(not(any(feature = "board19x19", feature = "board15x15")))]
compile_error!("Must enable exactly one board size feature: 'board19x19' or 'board15x15'");

/// Stones in a row needed to win, and the length of every scored window.
pub const MAX_STONES: usize = 6;

// =============================================================================
// Window Values
// =============================================================================

/// Value of a window indexed by the number of stones it holds, when all of
/// them belong to one color. A window holding both colors is dead and scores 0.
///
/// Five stones in a window is decisive: the remaining cell wins the game.
pub const LINE_VALUES: [Score; MAX_STONES + 1] = [1, 6, 30, 120, 360, WIN_SCORE, WIN_SCORE];

/// Cell score at or above which a cell decides the game.
///
/// Non-decisive cell scores are bounded by 4 directions * 6 windows * 360.
pub const WIN_SCORE: Score = 10_000;

// =============================================================================
// Move Generation
// =============================================================================

/// Number of top-scoring places paired into candidate moves.
pub const MAX_PLACES: usize = 20;

/// Number of candidate moves kept per expansion.
pub const MAX_MOVES: usize = 60;

/// Stones placed per turn (except the opening move).
pub const STONES_PER_MOVE: usize = 2;

/// Placement budget for a single rollout. This is a safety cutoff against
/// runaway simulations, not a rule of the game: a rollout that hits it
/// scores as a draw.
pub const ROLLOUT_STEP_LIMIT: usize = SIZE * SIZE;

// =============================================================================
// Search Parameters
// =============================================================================

/// UCB1 exploration factor.
pub const EXP_FACTOR: f64 = 1.4;

/// Default number of tree expansions per `go` command.
pub const N_EXPANSIONS: usize = 400;

/// Default seed for the rollout tie-breaking generator.
pub const DEFAULT_SEED: u64 = 0x6c6f_6e67;

// =============================================================================
// Protocol Scores
// =============================================================================

/// Reported score for a decided win by the first player (negated for the second).
pub const PROTOCOL_WIN_SCORE: i32 = 1200;

/// Reported scores strictly inside this bound are non-terminal.
pub const PROTOCOL_DECISIVE: i32 = 1000;
