//! Monte Carlo Tree Search over a flat node arena.
//!
//! All nodes live in one `Vec`, children of a node occupy a contiguous index
//! range, and the move leading to each node is kept in a parallel `Vec` with
//! the same indices. Index 0 is always the root.
//!
//! Every expansion:
//! - descends from the root through undecided children picked by UCB1,
//!   playing their moves on the game,
//! - materialises the children of the leaf it reaches from the game's
//!   candidate moves (each already valued by the game),
//! - undoes the moves on the way back up and recomputes every node on the
//!   path from its children.
//!
//! Values are always seen from the side to move at the node, so they flip
//! sign between levels. Exact outcomes (win/loss/draw) propagate and take
//! decided subtrees out of the search.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use log::{debug, error};

use crate::constants::EXP_FACTOR;
use crate::error::MoveFormatError;
use crate::value::{Outcome, Value};

/// Move type the tree can store and compare.
///
/// Equality must be that of the physical move, which for Connect6 means an
/// unordered pair of cells, so implementors keep a canonical form.
pub trait PlayableMove:
    Copy + Eq + Ord + Default + fmt::Display + fmt::Debug + FromStr<Err = MoveFormatError>
{
}

/// A candidate move and the value of the position it leads to, seen from
/// the side to move there.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MoveValue<M> {
    pub mv: M,
    pub value: Value,
}

/// What the tree needs from the game it searches.
pub trait Game {
    type Move: PlayableMove;

    /// Candidate moves from the current position. Must never be empty.
    fn top_moves(&mut self, moves: &mut Vec<MoveValue<Self::Move>>);

    /// Play a move for the side to move. Returns `true` if it won the game.
    fn play_move(&mut self, mv: Self::Move) -> bool;

    /// Exactly undo the last `play_move(mv)`.
    fn undo_move(&mut self, mv: Self::Move);

    fn exp_factor(&self) -> f64 {
        EXP_FACTOR
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
struct Node {
    first_child: u32,
    last_child: u32,
    sims: u32,
    value: Value,
}

impl Node {
    /// The root sits at index 0, so a child range never starts there.
    #[inline]
    fn is_expanded(&self) -> bool {
        self.first_child != 0
    }

    #[inline]
    fn children(&self) -> Range<usize> {
        self.first_child as usize..self.last_child as usize
    }
}

pub struct Tree<M> {
    nodes: Vec<Node>,
    moves: Vec<M>,
    top_moves: Vec<MoveValue<M>>,
}

impl<M: PlayableMove> Default for Tree<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: PlayableMove> Tree<M> {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::default()],
            moves: vec![M::default()],
            top_moves: Vec::new(),
        }
    }

    /// Grow the tree by one leaf expansion. Does nothing once the root is decided.
    ///
    /// `game` must be at the root position; it is returned there.
    pub fn expand<G: Game<Move = M>>(&mut self, game: &mut G) {
        if !self.nodes[0].value.is_decided() {
            self.expand_node(game, 0);
        }
    }

    fn expand_node<G: Game<Move = M>>(&mut self, game: &mut G, idx: usize) {
        if self.nodes[idx].is_expanded() {
            let child = self.select_child(idx, game.exp_factor());
            let mv = self.moves[child];
            game.play_move(mv);
            self.expand_node(game, child);
            game.undo_move(mv);
        } else {
            self.top_moves.clear();
            game.top_moves(&mut self.top_moves);
            if self.top_moves.is_empty() {
                error!("top_moves returned no candidates after {}", self.moves[idx]);
                panic!("top_moves returned no candidates after {}", self.moves[idx]);
            }

            let first = self.nodes.len();
            for candidate in self.top_moves.drain(..) {
                self.nodes.push(Node {
                    sims: 1,
                    value: candidate.value,
                    ..Node::default()
                });
                self.moves.push(candidate.mv);
            }
            let last = self.nodes.len() as u32;
            let node = &mut self.nodes[idx];
            node.first_child = first as u32;
            node.last_child = last;
        }

        let (sims, value) = self.aggregate(idx);
        let node = &mut self.nodes[idx];
        node.sims = sims;
        node.value = value;
    }

    /// UCB1 over the undecided children, exploiting the value the parent's
    /// mover gets from each child.
    fn select_child(&self, idx: usize, exp_factor: f64) -> usize {
        let parent = self.nodes[idx];
        let parent_sims = f64::from(parent.sims);
        let log_sims = parent_sims.ln();

        let mut selected = None;
        let mut best = f64::NEG_INFINITY;
        for i in parent.children() {
            let child = &self.nodes[i];
            let Value::Estimate(v) = child.value else {
                continue;
            };
            let urgency = -v / parent_sims + exp_factor * (log_sims / f64::from(child.sims)).sqrt();
            if selected.is_none() || urgency > best {
                best = urgency;
                selected = Some(i);
            }
        }
        match selected {
            Some(i) => i,
            None => unreachable!("undecided node {idx} has no undecided child"),
        }
    }

    /// Recompute a node from its children.
    fn aggregate(&self, idx: usize) -> (u32, Value) {
        let node = self.nodes[idx];
        let mut total = 0;
        let mut sims = 0;
        let mut sum = 0.0;
        let mut undecided = false;
        let mut has_draw = false;
        let mut lost = false;
        for child in &self.nodes[node.children()] {
            total += child.sims;
            match child.value {
                // The opponent has a winning reply.
                Value::Decided(Outcome::Win) => lost = true,
                Value::Decided(Outcome::Draw) => has_draw = true,
                Value::Decided(Outcome::Loss) => {}
                Value::Estimate(v) => {
                    sims += child.sims;
                    sum += v;
                    undecided = true;
                }
            }
        }

        // Decided nodes count every simulation below them.
        if lost {
            return (total, Value::LOSS);
        }
        if !undecided {
            return (total, if has_draw { Value::DRAW } else { Value::WIN });
        }
        let value = -sum;
        if has_draw && value < 0.0 {
            (sims, Value::DRAW)
        } else {
            (sims, Value::Estimate(value))
        }
    }

    /// Make `mv` the new root, keeping the search below it.
    ///
    /// The kept subtree is copied breadth first into a fresh arena. A move
    /// that was never explored resets the tree to a bare root.
    pub fn commit_move(&mut self, mv: M) {
        let root = self.nodes[0];
        let Some(idx) = root.children().find(|&i| self.moves[i] == mv) else {
            debug!("commit {mv}: not in tree, resetting");
            self.nodes.clear();
            self.nodes.push(Node::default());
            self.moves.clear();
            self.moves.push(mv);
            return;
        };

        let mut nodes = vec![self.nodes[idx]];
        let mut moves = vec![self.moves[idx]];
        let mut next = 0;
        while next < nodes.len() {
            let old = nodes[next];
            if old.is_expanded() {
                let first = nodes.len();
                nodes.extend_from_slice(&self.nodes[old.children()]);
                moves.extend_from_slice(&self.moves[old.children()]);
                nodes[next].first_child = first as u32;
                nodes[next].last_child = nodes.len() as u32;
            }
            next += 1;
        }
        debug!("commit {mv}: kept {} of {} nodes", nodes.len(), self.nodes.len());
        self.nodes = nodes;
        self.moves = moves;
    }

    /// The root child best for the side to move at the root, with its value
    /// from that side's point of view. Ties keep the first child.
    pub fn best_move(&self) -> Option<(M, Value)> {
        let mut best: Option<(M, Value, f64)> = None;
        for i in self.nodes[0].children() {
            let child = &self.nodes[i];
            let value = -child.value;
            let score = value.mean(child.sims);
            if best.is_none_or(|(_, _, s)| score > s) {
                best = Some((self.moves[i], value, score));
            }
        }
        best.map(|(mv, value, _)| (mv, value))
    }

    /// The move that led to the root position.
    pub fn root_move(&self) -> M {
        self.moves[0]
    }

    pub fn root_value(&self) -> Value {
        self.nodes[0].value
    }

    pub fn root_sims(&self) -> u32 {
        self.nodes[0].sims
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: the root is never removed.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Root children as (move, value, sims), values seen by the side to move
    /// after the move.
    pub fn children(&self) -> impl Iterator<Item = (M, Value, u32)> + '_ {
        self.nodes[0]
            .children()
            .map(|i| (self.moves[i], self.nodes[i].value, self.nodes[i].sims))
    }

    fn write_node(&self, f: &mut fmt::Formatter<'_>, idx: usize, depth: usize) -> fmt::Result {
        let node = &self.nodes[idx];
        writeln!(
            f,
            "{}{} [{idx}] n={} v={}",
            "|   ".repeat(depth),
            self.moves[idx],
            node.sims,
            node.value
        )?;
        for child in node.children() {
            self.write_node(f, child, depth + 1)?;
        }
        Ok(())
    }
}

impl<M: PlayableMove> fmt::Display for Tree<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_node(f, 0, 0)
    }
}
