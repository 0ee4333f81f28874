//! connect6-mcts: a Connect6 engine built on Monte Carlo tree search.
//!
//! Connect6 is played on a square board; Black opens with one stone, then
//! each side places two stones per turn, and six in a row wins. The engine
//! grows a search tree whose leaves are valued by greedy rollouts over an
//! incrementally maintained score grid.
//!
//! ## Modules
//!
//! - [`constants`] - Board size and engine parameters
//! - [`board`] - Score grid with incremental line scoring and win detection
//! - [`heap`] - Fixed-capacity selector keeping the best K items
//! - [`value`] - Decided outcomes and rollout estimates
//! - [`tree`] - Game-agnostic search tree
//! - [`connect6`] - Rules, move generation and rollouts
//! - [`protocol`] - Text protocol commands and events
//! - [`engine`] - Protocol loop driving a game and a tree
//! - [`error`] - Error types
//!
//! ## Example
//!
//! ```
//! use connect6_mcts::connect6::Connect6;
//! use connect6_mcts::tree::Tree;
//!
//! let mut game = Connect6::new(1);
//! let mut tree = Tree::new();
//! for _ in 0..3 {
//!     tree.expand(&mut game);
//! }
//! let (mv, value) = tree.best_move().unwrap();
//! println!("best opening: {mv} ({value})");
//! ```

pub mod board;
pub mod connect6;
pub mod constants;
pub mod engine;
pub mod error;
pub mod heap;
pub mod protocol;
pub mod tree;
pub mod value;
